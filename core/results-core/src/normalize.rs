//! Normalization of raw harness results.
//!
//! The test harness reports numeric status codes, a `tests` array of sub-tests
//! and stack traces at both levels. Stored records use status labels, a
//! `subtests` array and carry no stack traces.
//!
//! Normalization is idempotent: a status that is already a label is accepted
//! as-is, and an existing `subtests` array is kept.

use serde_json::{Map, Value};

use crate::error::{Result, ResultsError};
use crate::types::{HarnessStatus, ResultRecord, SubtestStatus};

const STACK_FIELD: &str = "stack";
const HARNESS_TESTS_FIELD: &str = "tests";
const SUBTESTS_FIELD: &str = "subtests";
const STATUS_FIELD: &str = "status";

/// Converts a raw harness payload into a [`ResultRecord`].
pub fn normalize(raw: Value) -> Result<ResultRecord> {
    let mut object = match raw {
        Value::Object(map) => map,
        other => {
            return Err(ResultsError::InvalidRecord(format!(
                "expected a JSON object, got {}",
                value_kind(&other)
            )))
        }
    };

    object.remove(STACK_FIELD);
    relabel(&mut object, "harness", harness_label)?;

    if let Some(tests) = object.remove(HARNESS_TESTS_FIELD) {
        if !object.contains_key(SUBTESTS_FIELD) {
            object.insert(SUBTESTS_FIELD.to_string(), tests);
        }
    }

    if let Some(subtests) = object.get_mut(SUBTESTS_FIELD) {
        if subtests.is_null() {
            *subtests = Value::Array(Vec::new());
        }
        match subtests {
            Value::Array(entries) => {
                for entry in entries {
                    let Value::Object(subtest) = entry else {
                        return Err(ResultsError::InvalidRecord(
                            "subtest entry is not an object".to_string(),
                        ));
                    };
                    subtest.remove(STACK_FIELD);
                    relabel(subtest, "subtest", subtest_label)?;
                }
            }
            other => {
                return Err(ResultsError::InvalidRecord(format!(
                    "subtests must be an array, got {}",
                    value_kind(other)
                )))
            }
        }
    }

    serde_json::from_value(Value::Object(object))
        .map_err(|e| ResultsError::InvalidRecord(e.to_string()))
}

fn relabel(
    object: &mut Map<String, Value>,
    level: &'static str,
    label_for: fn(&Value) -> Option<&'static str>,
) -> Result<()> {
    let slot = object
        .get_mut(STATUS_FIELD)
        .ok_or_else(|| ResultsError::InvalidRecord(format!("missing {} status", level)))?;
    let label = label_for(slot).ok_or_else(|| ResultsError::InvalidStatus {
        level,
        value: slot.to_string(),
    })?;
    *slot = Value::String(label.to_string());
    Ok(())
}

fn harness_label(value: &Value) -> Option<&'static str> {
    let status = match value {
        Value::Number(n) => n.as_u64().and_then(HarnessStatus::from_code),
        Value::String(s) => HarnessStatus::from_label(s),
        _ => None,
    };
    status.map(|s| s.as_str())
}

fn subtest_label(value: &Value) -> Option<&'static str> {
    let status = match value {
        Value::Number(n) => n.as_u64().and_then(SubtestStatus::from_code),
        Value::String(s) => SubtestStatus::from_label(s),
        _ => None,
    };
    status.map(|s| s.as_str())
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw_result(harness: u64, subtests: &[u64]) -> Value {
        let tests: Vec<Value> = subtests
            .iter()
            .enumerate()
            .map(|(i, code)| {
                json!({
                    "name": format!("subtest {}", i),
                    "status": code,
                    "message": null,
                    "stack": "at foo.js:1"
                })
            })
            .collect();
        json!({
            "test": "/dom/a.html",
            "status": harness,
            "message": null,
            "stack": "harness stack",
            "tests": tests
        })
    }

    #[test]
    fn test_harness_codes_map_to_labels() {
        let expected = [
            HarnessStatus::Ok,
            HarnessStatus::Error,
            HarnessStatus::Timeout,
            HarnessStatus::NotRun,
        ];
        for (code, status) in expected.iter().enumerate() {
            let record = normalize(raw_result(code as u64, &[])).unwrap();
            assert_eq!(record.status, *status);
        }
    }

    #[test]
    fn test_subtest_codes_map_to_labels() {
        let record = normalize(raw_result(0, &[0, 1, 2, 3])).unwrap();
        let statuses: Vec<&str> = record.subtests.iter().map(|s| s.status.as_str()).collect();
        assert_eq!(statuses, vec!["PASS", "FAIL", "TIMEOUT", "NOTRUN"]);
    }

    #[test]
    fn test_stack_fields_removed_and_tests_renamed() {
        let record = normalize(raw_result(1, &[1])).unwrap();
        let value = serde_json::to_value(&record).unwrap();
        assert!(value.get("stack").is_none());
        assert!(value.get("tests").is_none());
        assert_eq!(value["status"], json!("ERROR"));
        assert_eq!(value["subtests"][0]["status"], json!("FAIL"));
        assert!(value["subtests"][0].get("stack").is_none());
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize(raw_result(2, &[0, 1])).unwrap();
        let twice = normalize(serde_json::to_value(&once).unwrap()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_missing_subtests_become_empty() {
        let record = normalize(json!({"test": "/a/b.html", "status": 3})).unwrap();
        assert_eq!(record.status, HarnessStatus::NotRun);
        assert!(record.subtests.is_empty());
    }

    #[test]
    fn test_unknown_status_code_is_rejected() {
        let err = normalize(raw_result(9, &[])).unwrap_err();
        assert!(matches!(err, ResultsError::InvalidStatus { level: "harness", .. }));

        let err = normalize(raw_result(0, &[5])).unwrap_err();
        assert!(matches!(err, ResultsError::InvalidStatus { level: "subtest", .. }));
    }

    #[test]
    fn test_non_object_payload_is_rejected() {
        let err = normalize(json!([1, 2])).unwrap_err();
        assert!(matches!(err, ResultsError::InvalidRecord(_)));
    }
}
