// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed open metadata map for jobs and content.
//!
//! Metadata is a mapping of string keys to a closed set of JSON-like
//! value variants, updated by merge-by-key: incoming keys win, keys not
//! mentioned by the update are preserved.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A metadata value: scalar, list, or nested map.
///
/// Untagged so the wire format is plain JSON. Variant order matters for
/// deserialization: integers are tried before floats so `3` parses as
/// `Int(3)` and `3.5` as `Float(3.5)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<MetadataValue>),
    Map(BTreeMap<String, MetadataValue>),
}

/// An open key-value metadata mapping.
pub type MetadataMap = BTreeMap<String, MetadataValue>;

/// Merge `incoming` into `base` by key: incoming keys overwrite, keys
/// absent from `incoming` are left untouched.
pub fn merge_metadata(base: &mut MetadataMap, incoming: MetadataMap) {
    for (key, value) in incoming {
        base.insert(key, value);
    }
}
