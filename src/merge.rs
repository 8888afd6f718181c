//! Order-preserving, deduplicating merge of per-chunk analysis results.
//!
//! Each chunk of a contract is analyzed independently, so every chunk
//! produces a partial JSON analysis where fields absent from that chunk
//! carry the sentinel value `"not_found_in_chunk"`. This module folds those
//! partials, in chunk order, into one complete analysis object:
//!
//! - sentinel values never overwrite anything;
//! - a field the accumulator lacks takes the new value verbatim;
//! - two sequences concatenate and deduplicate (case-insensitive for
//!   strings, by JSON representation otherwise), first occurrence wins;
//! - two records merge recursively under the same rules;
//! - two scalars keep the accumulator's value unless it is null or an
//!   empty string, so the first seen value wins.
//!
//! A partial that fails to parse is logged and skipped; the merge only
//! fails with [`Error::NoValidAnalysis`] when *every* partial is
//! unparseable. After folding, [`promote`] lifts the accumulator into the
//! typed [`ContractAnalysis`], defaulting any still-missing sub-field to
//! its zero value. Completeness of shape is guaranteed even when
//! completeness of content is not.

use crate::error::{Error, Result};
use crate::gateway::assistant_text;
use crate::models::ContractAnalysis;
use serde_json::{json, Map, Value};
use tracing::warn;

/// Distinguished placeholder for "field not present in this chunk".
pub const NOT_FOUND_SENTINEL: &str = "not_found_in_chunk";

/// Top-level sections that must exist in a merged analysis.
pub const REQUIRED_SECTIONS: [&str; 8] = [
    "metadata",
    "classification",
    "compensation",
    "termination",
    "intellectualProperty",
    "restrictiveCovenants",
    "confidentiality",
    "liability",
];

/// Empty accumulator with every section pre-seeded, so no top-level key can
/// be missing from the final object regardless of what the chunks return.
fn merged_skeleton() -> Value {
    json!({
        "metadata": {},
        "classification": { "type": null, "primaryCharacteristics": [] },
        "compensation": {
            "baseCompensation": {},
            "commission": { "tiers": [], "caps": {} }
        },
        "termination": {
            "noticePeriod": {},
            "immediateTerminationClauses": [],
            "postTerminationObligations": []
        },
        "intellectualProperty": { "ownership": {}, "moralRights": {} },
        "restrictiveCovenants": { "nonCompete": {}, "nonSolicitation": {} },
        "confidentiality": { "scope": [], "duration": {}, "exceptions": [] },
        "liability": { "indemnification": {}, "limitations": {} }
    })
}

/// Recover a JSON object from model output, tolerating surrounding prose
/// and Markdown code fences.
pub fn extract_json(text: &str) -> Result<Value> {
    let trimmed = text.trim().trim_start_matches('\u{feff}');

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Ok(value);
    }

    if let Some(start) = trimmed.find("```json") {
        if let Some(end) = trimmed[start + 7..].find("```") {
            let block = &trimmed[start + 7..start + 7 + end];
            if let Ok(value) = serde_json::from_str::<Value>(block) {
                return Ok(value);
            }
        }
    }

    if let (Some(open), Some(close)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if open < close {
            if let Ok(value) = serde_json::from_str::<Value>(&trimmed[open..=close]) {
                return Ok(value);
            }
        }
    }

    Err(Error::Parse("no valid JSON found in model output".to_string()))
}

/// Parse one raw response envelope into its inner partial-analysis JSON.
pub fn parse_envelope(envelope: &Value) -> Result<Value> {
    let text = assistant_text(envelope)?;
    extract_json(text)
}

/// Fold raw chunk envelopes, in chunk order, into one merged analysis value.
pub fn merge_partials(envelopes: &[Value]) -> Result<Value> {
    if envelopes.is_empty() {
        return Err(Error::NoValidAnalysis);
    }

    let mut merged = merged_skeleton();
    let mut any_valid = false;

    for (index, envelope) in envelopes.iter().enumerate() {
        match parse_envelope(envelope) {
            Ok(partial) => {
                merge_value(&mut merged, &partial);
                any_valid = true;
            }
            Err(e) => {
                warn!(chunk = index, error = %e, "skipping unparseable chunk analysis");
            }
        }
    }

    if !any_valid {
        return Err(Error::NoValidAnalysis);
    }
    Ok(merged)
}

/// Promote a merged accumulator into the typed analysis.
///
/// Fails with [`Error::Validation`] if a required section is entirely
/// absent or the merged content cannot inhabit the canonical shape.
/// Sub-fields that are merely missing default to their zero values.
pub fn promote(mut merged: Value) -> Result<ContractAnalysis> {
    let obj = merged
        .as_object()
        .ok_or_else(|| Error::Validation("merged analysis is not an object".to_string()))?;

    for section in REQUIRED_SECTIONS {
        if !obj.contains_key(section) {
            return Err(Error::Validation(format!(
                "incomplete contract data: missing {section}"
            )));
        }
    }

    // A field a chunk reported as null is treated the same as one it
    // omitted: the typed default applies instead of failing promotion.
    strip_nulls(&mut merged);

    serde_json::from_value(merged)
        .map_err(|e| Error::Validation(format!("incomplete contract data: {e}")))
}

fn strip_nulls(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|_, v| !v.is_null());
            for v in map.values_mut() {
                strip_nulls(v);
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                strip_nulls(item);
            }
        }
        _ => {}
    }
}

fn is_sentinel(value: &Value) -> bool {
    value.as_str() == Some(NOT_FOUND_SENTINEL)
}

/// Merge `new` into `acc` under the fold rules. Only record/record pairs
/// recurse; mismatched shapes keep the accumulator's value.
fn merge_value(acc: &mut Value, new: &Value) {
    match (acc, new) {
        (Value::Object(acc_map), Value::Object(new_map)) => merge_records(acc_map, new_map),
        (Value::Array(acc_list), Value::Array(new_list)) => {
            let merged = merge_lists(acc_list, new_list);
            *acc_list = merged;
        }
        (acc_scalar, new_value) => {
            let replaceable = matches!(acc_scalar, Value::Null)
                || acc_scalar.as_str() == Some("");
            if replaceable && !is_sentinel(new_value) {
                *acc_scalar = new_value.clone();
            }
        }
    }
}

fn merge_records(acc: &mut Map<String, Value>, new: &Map<String, Value>) {
    for (key, new_value) in new {
        if is_sentinel(new_value) {
            continue;
        }
        match acc.get_mut(key) {
            None => {
                acc.insert(key.clone(), new_value.clone());
            }
            Some(existing) => merge_value(existing, new_value),
        }
    }
}

/// Concatenate then deduplicate, preserving first-occurrence order.
/// Strings compare case-insensitively; other items by JSON representation.
fn merge_lists(existing: &[Value], new: &[Value]) -> Vec<Value> {
    let mut seen = std::collections::HashSet::new();
    let mut merged = Vec::new();
    for item in existing.iter().chain(new.iter()) {
        let key = match item.as_str() {
            Some(s) => s.to_lowercase(),
            None => item.to_string(),
        };
        if seen.insert(key) {
            merged.push(item.clone());
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(inner: &Value) -> Value {
        json!({ "content": [{ "type": "text", "text": inner.to_string() }] })
    }

    #[test]
    fn sentinel_never_overwrites() {
        let chunks = [
            envelope(&json!({ "classification": { "type": NOT_FOUND_SENTINEL } })),
            envelope(&json!({ "classification": { "type": "employment" } })),
        ];
        let merged = merge_partials(&chunks).unwrap();
        assert_eq!(merged["classification"]["type"], "employment");
    }

    #[test]
    fn scalar_conflicts_are_first_seen_wins() {
        let chunks = [
            envelope(&json!({ "compensation": { "baseCompensation": { "amount": 5000 } } })),
            envelope(&json!({ "compensation": { "baseCompensation": { "amount": 6000 } } })),
        ];
        let merged = merge_partials(&chunks).unwrap();
        assert_eq!(merged["compensation"]["baseCompensation"]["amount"], 5000);
    }

    #[test]
    fn empty_string_is_replaceable() {
        let chunks = [
            envelope(&json!({ "metadata": { "title": "" } })),
            envelope(&json!({ "metadata": { "title": "Consulting Agreement" } })),
        ];
        let merged = merge_partials(&chunks).unwrap();
        assert_eq!(merged["metadata"]["title"], "Consulting Agreement");
    }

    #[test]
    fn false_is_not_replaceable() {
        let chunks = [
            envelope(&json!({ "metadata": { "signed": false } })),
            envelope(&json!({ "metadata": { "signed": true } })),
        ];
        let merged = merge_partials(&chunks).unwrap();
        assert_eq!(merged["metadata"]["signed"], false);
    }

    #[test]
    fn lists_union_case_insensitively() {
        let chunks = [
            envelope(&json!({ "confidentiality": { "scope": ["NDA", "nda"] } })),
            envelope(&json!({ "confidentiality": { "scope": ["Confidentiality"] } })),
        ];
        let merged = merge_partials(&chunks).unwrap();
        let scope = merged["confidentiality"]["scope"].as_array().unwrap();
        assert_eq!(scope.len(), 2);
        assert_eq!(scope[0], "NDA");
        assert_eq!(scope[1], "Confidentiality");
    }

    #[test]
    fn records_merge_recursively() {
        let chunks = [
            envelope(&json!({ "termination": { "noticePeriod": { "employer": "30 days" } } })),
            envelope(&json!({ "termination": { "noticePeriod": { "employee": "14 days" } } })),
        ];
        let merged = merge_partials(&chunks).unwrap();
        assert_eq!(merged["termination"]["noticePeriod"]["employer"], "30 days");
        assert_eq!(merged["termination"]["noticePeriod"]["employee"], "14 days");
    }

    #[test]
    fn one_bad_chunk_is_skipped() {
        let chunks = [
            json!({ "content": [{ "type": "text", "text": "sorry, I cannot" }] }),
            envelope(&json!({ "classification": { "type": "employment" } })),
        ];
        let merged = merge_partials(&chunks).unwrap();
        assert_eq!(merged["classification"]["type"], "employment");
    }

    #[test]
    fn all_bad_chunks_fail_the_merge() {
        let chunks = [
            json!({ "content": [{ "type": "text", "text": "not json" }] }),
            json!({ "content": [{ "type": "text", "text": "also not json" }] }),
        ];
        assert!(matches!(
            merge_partials(&chunks),
            Err(Error::NoValidAnalysis)
        ));
    }

    #[test]
    fn empty_input_fails() {
        assert!(matches!(merge_partials(&[]), Err(Error::NoValidAnalysis)));
    }

    #[test]
    fn every_section_present_even_for_empty_partials() {
        let chunks = [envelope(&json!({}))];
        let merged = merge_partials(&chunks).unwrap();
        for section in REQUIRED_SECTIONS {
            assert!(merged.get(section).is_some(), "missing section {section}");
        }
    }

    #[test]
    fn extract_json_strips_code_fences() {
        let fenced = "Here you go:\n```json\n{\"a\": 1}\n```\n";
        assert_eq!(extract_json(fenced).unwrap(), json!({ "a": 1 }));
        let braces = "Sure! {\"b\": 2} Let me know if you need more.";
        assert_eq!(extract_json(braces).unwrap(), json!({ "b": 2 }));
        assert!(extract_json("no json here").is_err());
    }

    #[test]
    fn promote_defaults_missing_subfields() {
        let merged = merge_partials(&[envelope(&json!({
            "compensation": { "baseCompensation": { "amount": 5000.0 } }
        }))])
        .unwrap();
        let analysis = promote(merged).unwrap();
        assert_eq!(analysis.compensation.base_compensation.amount, Some(5000.0));
        assert!(!analysis.compensation.base_compensation.is_guaranteed);
        assert!(analysis.confidentiality.scope.is_empty());
    }

    #[test]
    fn promote_defaults_null_subfields() {
        let merged = merge_partials(&[envelope(&json!({
            "compensation": {
                "baseCompensation": { "amount": 5000.0, "isGuaranteed": null },
                "commission": { "baseRate": null }
            }
        }))])
        .unwrap();
        let analysis = promote(merged).unwrap();
        assert_eq!(analysis.compensation.base_compensation.amount, Some(5000.0));
        assert!(!analysis.compensation.base_compensation.is_guaranteed);
        assert_eq!(analysis.compensation.commission.base_rate, 0.0);
    }

    #[test]
    fn promote_rejects_missing_section() {
        let value = json!({ "metadata": {} });
        assert!(matches!(promote(value), Err(Error::Validation(_))));
    }
}
