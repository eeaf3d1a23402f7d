//! Tolerant field deserializers.
//!
//! Model output and hand-edited payloads mix up numbers and strings
//! (`"total": "119.00"`, `"number": 10045`). These coerce the obvious cases
//! and reject the rest.

use serde::de::Error;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub(super) fn string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(opt_string(deserializer)?.unwrap_or_default())
}

pub(super) fn opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected a string, found {}",
            other
        ))),
    }
}

pub(super) fn number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    opt_number(deserializer)?.ok_or_else(|| D::Error::custom("expected a number, found null"))
}

pub(super) fn opt_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_f64()
            .filter(|v| v.is_finite())
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("number out of range: {}", n))),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            // f64 parsing also accepts "NaN" and "inf", which cannot be stored
            trimmed
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid number: {:?}", s)))
        }
        Some(other) => Err(D::Error::custom(format!(
            "expected a number, found {}",
            other
        ))),
    }
}

/// A list where `null` means empty
pub(super) fn seq<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Amounts {
        #[serde(default, deserialize_with = "opt_number")]
        amount: Option<f64>,
        #[serde(default, deserialize_with = "string")]
        label: String,
    }

    #[test]
    fn test_numeric_strings_are_coerced() {
        let parsed: Amounts = serde_json::from_value(json!({ "amount": " 12.5 ", "label": 42 })).unwrap();
        assert_eq!(parsed.amount, Some(12.5));
        assert_eq!(parsed.label, "42");
    }

    #[test]
    fn test_blank_and_null_numbers_are_absent() {
        let parsed: Amounts = serde_json::from_value(json!({ "amount": "", "label": null })).unwrap();
        assert_eq!(parsed.amount, None);
        assert_eq!(parsed.label, "");

        let parsed: Amounts = serde_json::from_value(json!({})).unwrap();
        assert_eq!(parsed.amount, None);
    }

    #[test]
    fn test_non_finite_numbers_are_rejected() {
        for value in ["NaN", "nan", "inf", "-inf", "Infinity", " infinity "] {
            let err = serde_json::from_value::<Amounts>(json!({ "amount": value })).unwrap_err();
            assert!(err.to_string().contains("invalid number"), "{value}: {err}");
        }
        assert!(serde_json::from_value::<Amounts>(json!({ "amount": "1e400" })).is_err());
    }

    #[test]
    fn test_objects_are_rejected() {
        assert!(serde_json::from_value::<Amounts>(json!({ "amount": { "value": 1 } })).is_err());
        assert!(serde_json::from_value::<Amounts>(json!({ "label": ["a"] })).is_err());
    }
}
