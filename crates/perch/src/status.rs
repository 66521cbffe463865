// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `perch status` command implementation.
//!
//! Queries a running service's public health endpoint and reports state
//! and uptime. Degrades gracefully when nothing is listening.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use perch_config::model::PerchConfig;
use perch_core::PerchError;

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
    version: String,
    uptime_secs: u64,
}

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub running: bool,
    pub status: String,
    pub version: Option<String>,
    pub uptime_secs: Option<u64>,
    pub uptime_human: Option<String>,
    pub host: String,
    pub port: u16,
}

fn format_uptime(secs: u64) -> String {
    let days = secs / 86400;
    let hours = (secs % 86400) / 3600;
    let minutes = (secs % 3600) / 60;

    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Run the `perch status` command.
pub async fn run_status(config: &PerchConfig, json: bool) -> Result<(), PerchError> {
    let url = format!(
        "http://{}:{}/health",
        config.server.host, config.server.port
    );

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(3))
        .build()
        .map_err(|e| PerchError::Internal(format!("http client: {e}")))?;

    let report = match client.get(&url).send().await {
        Ok(response) if response.status().is_success() => {
            match response.json::<HealthResponse>().await {
                Ok(health) => StatusReport {
                    running: true,
                    status: health.status,
                    version: Some(health.version),
                    uptime_secs: Some(health.uptime_secs),
                    uptime_human: Some(format_uptime(health.uptime_secs)),
                    host: config.server.host.clone(),
                    port: config.server.port,
                },
                Err(e) => StatusReport {
                    running: false,
                    status: format!("unreadable health response: {e}"),
                    version: None,
                    uptime_secs: None,
                    uptime_human: None,
                    host: config.server.host.clone(),
                    port: config.server.port,
                },
            }
        }
        Ok(response) => StatusReport {
            running: false,
            status: format!("health endpoint returned {}", response.status()),
            version: None,
            uptime_secs: None,
            uptime_human: None,
            host: config.server.host.clone(),
            port: config.server.port,
        },
        Err(_) => StatusReport {
            running: false,
            status: "not running".to_string(),
            version: None,
            uptime_secs: None,
            uptime_human: None,
            host: config.server.host.clone(),
            port: config.server.port,
        },
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report)
                .map_err(|e| PerchError::Internal(e.to_string()))?
        );
    } else if report.running {
        println!(
            "perch is running on {}:{} (version {}, up {})",
            report.host,
            report.port,
            report.version.as_deref().unwrap_or("unknown"),
            report.uptime_human.as_deref().unwrap_or("unknown"),
        );
    } else {
        println!(
            "perch is not running on {}:{} ({})",
            report.host, report.port, report.status
        );
    }

    Ok(())
}
