//! Signatures of known-bad historical merges

use serde_json::Value;
use std::fmt;

/// A recognized pattern of stub values in a persisted record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorruptionSignature {
    /// `timestamp: 0` together with `license: ""`: written when URL-derived
    /// stubs overwrote the manifest
    StubTimestampAndLicense,
}

impl fmt::Display for CorruptionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StubTimestampAndLicense => write!(f, "timestamp 0 with empty license"),
        }
    }
}

/// Find the corruption signature a record carries, if any.
///
/// Both keys must be explicitly present. A missing key is not a stub: a
/// record without `timestamp` or `license` is simply sparse.
#[must_use]
pub fn corruption_signature(record: &Value) -> Option<CorruptionSignature> {
    let object = record.as_object()?;

    let zero_timestamp = object.get("timestamp").is_some_and(|ts| {
        ts.as_u64() == Some(0) || ts.as_i64() == Some(0) || ts.as_f64() == Some(0.0)
    });
    let empty_license = object
        .get("license")
        .and_then(Value::as_str)
        .is_some_and(str::is_empty);

    (zero_timestamp && empty_license).then_some(CorruptionSignature::StubTimestampAndLicense)
}

/// Whether a persisted record was produced by the faulty merge
#[must_use]
pub fn is_corrupted(record: &Value) -> bool {
    corruption_signature(record).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn requires_both_stub_values() {
        assert!(!is_corrupted(&json!({"timestamp": 0, "license": "MIT"})));
        assert!(!is_corrupted(
            &json!({"timestamp": 1_700_000_000, "license": ""})
        ));
        assert!(is_corrupted(&json!({"timestamp": 0, "license": ""})));
        assert!(!is_corrupted(&json!({})));
    }

    #[test]
    fn missing_keys_are_not_stubs() {
        assert!(!is_corrupted(&json!({"timestamp": 0})));
        assert!(!is_corrupted(&json!({"license": ""})));
        assert!(!is_corrupted(&json!({"timestamp": null, "license": ""})));
    }

    #[test]
    fn float_zero_counts_and_non_objects_do_not() {
        assert!(is_corrupted(&json!({"timestamp": 0.0, "license": ""})));
        assert!(!is_corrupted(&json!([0, ""])));
        assert!(!is_corrupted(&Value::Null));
    }

    #[test]
    fn signature_is_named() {
        let signature = corruption_signature(&json!({
            "name": "xtensor", "timestamp": 0, "license": "", "depends": []
        }));
        assert_eq!(
            signature,
            Some(CorruptionSignature::StubTimestampAndLicense)
        );
    }
}
