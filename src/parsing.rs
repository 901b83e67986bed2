use std::collections::BTreeMap;

use crate::types::ProfileKind;

/// Splits a comma-separated environment value, trimming entries and dropping empty ones.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

pub fn parse_flag(raw: Option<&str>) -> bool {
    matches!(raw, Some("true"))
}

pub fn profile_file_name(target: &str, kind: ProfileKind) -> String {
    format!("{}_{}.prof", target, kind.file_suffix())
}

/// Whole seconds of a profiling duration, when it is numeric.
pub fn profiling_seconds(raw: &str) -> Option<u64> {
    raw.trim().parse::<u64>().ok()
}

/// Renders labels as an equality-based selector (`k=v,k2=v2`).
pub fn label_selector(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}
