//! acb-config
//!
//! Layered YAML configuration.
//! - Documents merge in order; later documents override earlier ones
//! - The merged tree is serialized with keys sorted at every level and hashed
//!   with SHA-256 so a replay can record exactly which settings it ran with
//! - Credential-looking string literals abort the load
//! - [`report_unused_keys`] flags keys [`ReplayConfig`] never reads
//!
//! [`ReplayConfig`] is the typed view the CLI consumes.

mod replay;
mod unused;

pub use replay::{
    AccountsConfig, AmbiguityConfig, PathsConfig, ReplayConfig, ReplaySection, ENV_BATCH_SIZE,
    ENV_CASH_ACCOUNT, ENV_EQUITIES_ACCOUNT,
};
pub use unused::{report_unused_keys, UnusedKeyPolicy, UnusedKeyReport, KNOWN_KEYS};

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Prefixes of well-known credential formats.  Bookkeeping-system tokens
/// belong in the environment, never in a config file.
const SECRET_PREFIXES: &[&str] = &[
    "sk-",
    "sk_live",
    "AKIA",
    "-----BEGIN",
    "ghp_",
    "glpat-",
    "xoxb-",
    "Bearer ",
];

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// SHA-256 hex of `canonical_json`.
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

pub fn load_layered_yaml<P: AsRef<Path>>(paths: &[P]) -> Result<LoadedConfig> {
    let docs = paths
        .iter()
        .map(|p| {
            let p = p.as_ref();
            fs::read_to_string(p).with_context(|| format!("read config layer {}", p.display()))
        })
        .collect::<Result<Vec<String>>>()?;
    let refs: Vec<&str> = docs.iter().map(String::as_str).collect();
    load_layered_yaml_from_strings(&refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = Value::Object(serde_json::Map::new());
    for (i, raw) in yaml_docs.iter().enumerate() {
        let layer: Value = serde_yaml::from_str::<serde_yaml::Value>(raw)
            .with_context(|| format!("config layer {} is not valid yaml", i + 1))
            .and_then(|y| {
                serde_json::to_value(y)
                    .with_context(|| format!("config layer {} has non-JSON values", i + 1))
            })?;
        // An empty document is an empty layer, not a null override.
        if !layer.is_null() {
            overlay(&mut merged, layer);
        }
    }

    if let Some(path) = find_secret_literal(&merged, "") {
        bail!("config value at '{path}' looks like a credential; supply it through the environment");
    }

    let canonical_json =
        serde_json::to_string(&sorted(&merged)).context("serialize canonical config")?;
    let config_hash = hex::encode(Sha256::digest(canonical_json.as_bytes()));
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

/// Objects merge key by key; anything else in `top` replaces `base`.
fn overlay(base: &mut Value, top: Value) {
    match (base, top) {
        (Value::Object(into), Value::Object(from)) => {
            for (key, value) in from {
                match into.get_mut(&key) {
                    Some(slot) => overlay(slot, value),
                    None => {
                        into.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Copy of `v` with every object's keys in ascending order.
fn sorted(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let ordered: BTreeMap<&String, Value> =
                map.iter().map(|(k, child)| (k, sorted(child))).collect();
            Value::Object(ordered.into_iter().map(|(k, child)| (k.clone(), child)).collect())
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

/// Dotted path (`sink.token`, `keys[0]`) of the first credential-looking
/// string, if any.
fn find_secret_literal(v: &Value, path: &str) -> Option<String> {
    match v {
        Value::String(s) if looks_like_secret(s) => Some(path.to_string()),
        Value::Object(map) => map.iter().find_map(|(k, child)| {
            let next = if path.is_empty() {
                k.clone()
            } else {
                format!("{path}.{k}")
            };
            find_secret_literal(child, &next)
        }),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .find_map(|(i, child)| find_secret_literal(child, &format!("{path}[{i}]"))),
        _ => None,
    }
}

fn looks_like_secret(s: &str) -> bool {
    let t = s.trim_start();
    t.len() >= 8 && SECRET_PREFIXES.iter().any(|p| t.starts_with(p))
}
