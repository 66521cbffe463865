// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `perch serve` command implementation.
//!
//! Wires storage, the auth gate, the lifecycle registry, the ledger,
//! the sync scheduler, and the HTTP gateway together, then serves until
//! a shutdown signal arrives.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use perch_auth::{AuthGate, AuthGateConfig, DeviceFlow};
use perch_config::model::PerchConfig;
use perch_core::{PerchError, PlatformClient, StorageAdapter};
use perch_gateway::GatewayState;
use perch_ledger::{JobLedger, Wallet};
use perch_registry::WatchRegistry;
use perch_scheduler::{policy_from_config, StubPlatform, SyncDriver, SyncRunner, SyncSlots};
use perch_storage::SqliteStorage;

/// Run the `perch serve` command.
pub async fn run_serve(config: PerchConfig) -> Result<(), PerchError> {
    init_tracing(&config.service.log_level);
    info!(service = %config.service.name, "starting perch serve");

    let storage: Arc<dyn StorageAdapter> =
        Arc::new(SqliteStorage::new(config.storage.clone()));
    storage.initialize().await?;

    let gate = Arc::new(AuthGate::new(
        AuthGateConfig {
            issuer: config.auth.issuer.clone(),
            audience: config.auth.audience.clone(),
            leeway_secs: config.auth.leeway_secs,
            pat_enabled: config.auth.pat_enabled,
            action_url: config.auth.action_url.clone(),
            starting_balance: config.ledger.starting_balance,
        },
        &config.auth.keys,
        storage.clone(),
    )?);
    if config.auth.keys.is_empty() {
        info!("no issuer keys configured -- session tokens will be rejected");
    }

    let registry = Arc::new(WatchRegistry::new(
        storage.clone(),
        config.scheduler.clone(),
    ));
    let platform: Arc<dyn PlatformClient> = Arc::new(StubPlatform);
    let policy = policy_from_config(&config.scheduler);
    let runner = SyncRunner::new(
        storage.clone(),
        platform.clone(),
        registry.clone(),
        policy,
        SyncSlots::new(),
        config.scheduler.clone(),
    );

    let shutdown = install_signal_handler();

    let driver = SyncDriver::new(storage.clone(), runner.clone(), config.scheduler.tick_secs);
    let driver_task = tokio::spawn(driver.run(shutdown.clone()));

    let state = GatewayState {
        gate,
        device: Arc::new(DeviceFlow::new(
            storage.clone(),
            config.auth.device_code_ttl_secs,
        )),
        registry,
        runner,
        ledger: Arc::new(JobLedger::new(storage.clone())),
        wallet: Arc::new(Wallet::new(storage.clone(), config.ledger.clone())),
        storage: storage.clone(),
        platform,
        service_name: config.service.name.clone(),
        start_time: Instant::now(),
        scheduler: config.scheduler.clone(),
    };

    tokio::select! {
        result = perch_gateway::start_server(&config.server, state) => {
            result?;
        }
        _ = shutdown.cancelled() => {
            info!("shutdown signal received");
        }
    }

    driver_task.abort();
    storage.close().await?;
    info!("perch serve shutdown complete");
    Ok(())
}

/// Install SIGINT/SIGTERM handlers that cancel the returned token.
fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm =
                signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

            tokio::select! {
                _ = ctrl_c => {
                    info!("received SIGINT (Ctrl+C), initiating shutdown");
                }
                _ = sigterm.recv() => {
                    info!("received SIGTERM, initiating shutdown");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl+C, initiating shutdown");
        }

        token_clone.cancel();
        debug!("shutdown signal handler completed");
    });

    token
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("perch={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn signal_handler_returns_live_token() {
        let token = install_signal_handler();
        assert!(!token.is_cancelled());
        token.cancel();
    }
}
