//! Unused-key check.
//!
//! The replay config is two levels deep: sections, then settings.  Any key
//! outside [`KNOWN_KEYS`] is reported by its dotted name, so a misspelt key
//! (`acounts.cash`) does not silently fall back to a default.

use anyhow::{bail, Result};
use serde_json::Value;

/// Sections and settings read by [`crate::ReplayConfig`].  Keep in step with
/// that struct.
pub const KNOWN_KEYS: &[(&str, &[&str])] = &[
    (
        "accounts",
        &["cash", "equities", "realized_gains", "dividend_income"],
    ),
    ("paths", &["transactions_csv", "holdings_json", "journal_jsonl"]),
    ("replay", &["batch_size", "hash_chain"]),
    ("ambiguity", &["order_sensitive_kinds"]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnusedKeyReport {
    /// Dotted names, sorted.  An unknown section is reported once, not per
    /// setting inside it.
    pub unused_keys: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_keys.is_empty()
    }
}

/// With `Fail`, unused keys are an error.  With `Warn`, the report is always
/// returned and the caller decides how loudly to complain.
pub fn report_unused_keys(config_json: &Value, policy: UnusedKeyPolicy) -> Result<UnusedKeyReport> {
    let mut unused = Vec::new();
    if let Value::Object(sections) = config_json {
        for (name, body) in sections {
            let Some((_, settings)) = KNOWN_KEYS.iter().find(|(s, _)| *s == name.as_str()) else {
                unused.push(name.clone());
                continue;
            };
            if let Value::Object(entries) = body {
                unused.extend(
                    entries
                        .keys()
                        .filter(|k| !settings.contains(&k.as_str()))
                        .map(|k| format!("{name}.{k}")),
                );
            }
        }
    }
    unused.sort();

    let report = UnusedKeyReport {
        unused_keys: unused,
    };
    if policy == UnusedKeyPolicy::Fail && !report.is_clean() {
        bail!(
            "config has {} key(s) nothing reads: {}",
            report.unused_keys.len(),
            report.unused_keys.join(", ")
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn array_setting_is_not_descended() {
        let v = json!({"ambiguity": {"order_sensitive_kinds": ["BUY", "SELL"]}});
        assert!(report_unused_keys(&v, UnusedKeyPolicy::Fail).unwrap().is_clean());
    }

    #[test]
    fn unknown_section_reported_once() {
        let v = json!({"sink": {"url": "x", "token_env": "T"}, "replay": {"batch": 3}});
        let report = report_unused_keys(&v, UnusedKeyPolicy::Warn).unwrap();
        assert_eq!(report.unused_keys, vec!["replay.batch", "sink"]);
    }

    #[test]
    fn every_known_key_is_clean() {
        let mut v = serde_json::Map::new();
        for (section, settings) in KNOWN_KEYS {
            let body: serde_json::Map<String, Value> =
                settings.iter().map(|k| (k.to_string(), json!(1))).collect();
            v.insert(section.to_string(), Value::Object(body));
        }
        assert!(report_unused_keys(&Value::Object(v), UnusedKeyPolicy::Fail)
            .unwrap()
            .is_clean());
    }
}
