//! Config hash stability.
//!
//! GREEN when:
//! - Loading the same layers twice yields the same hash.
//! - Reordering keys within a YAML document does not change the hash.
//! - Changing a value changes the hash.
//! - An overlay changes the hash and its values win.

use acb_config::load_layered_yaml_from_strings;

const BASE_YAML: &str = r#"
accounts:
  cash: "Brokerage Cash"
  equities: "Brokerage Equities"
paths:
  transactions_csv: "data/trades.csv"
  holdings_json: "data/holdings.json"
replay:
  batch_size: 0
"#;

const BASE_YAML_REORDERED: &str = r#"
replay:
  batch_size: 0
paths:
  holdings_json: "data/holdings.json"
  transactions_csv: "data/trades.csv"
accounts:
  equities: "Brokerage Equities"
  cash: "Brokerage Cash"
"#;

const OVERLAY_YAML: &str = r#"
replay:
  batch_size: 25
"#;

#[test]
fn same_input_same_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.config_hash.len(), 64);
}

#[test]
fn key_order_does_not_matter() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();
    assert_eq!(a.canonical_json, b.canonical_json);
    assert_eq!(a.config_hash, b.config_hash);
}

#[test]
fn different_values_different_hash() {
    let changed = BASE_YAML.replace("Brokerage Cash", "Other Cash");
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[changed.as_str()]).unwrap();
    assert_ne!(a.config_hash, b.config_hash);
}

#[test]
fn overlay_wins_and_changes_hash() {
    let base = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let merged = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_ne!(base.config_hash, merged.config_hash);
    assert_eq!(merged.config_json["replay"]["batch_size"], 25);
    assert_eq!(merged.config_json["accounts"]["cash"], "Brokerage Cash");
}
