// API response models

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Successful order creation. The backend has returned the id both as a string and as an
/// integer, so both are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderReceipt {
    #[serde(deserialize_with = "order_id_string")]
    pub order_id: String,
}

fn order_id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) if !s.trim().is_empty() => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "order_id must be a non-empty string or number, got {}",
            other
        ))),
    }
}

/// Error body of a non-2xx order response (`{"detail": "..."}`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<Value>,
}

impl ErrorBody {
    pub fn detail_text(&self) -> Option<String> {
        match self.detail.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_numeric_and_string_ids() {
        let a: OrderReceipt = serde_json::from_str(r#"{"order_id": 42}"#).expect("numeric id");
        assert_eq!(a.order_id, "42");
        let b: OrderReceipt =
            serde_json::from_str(r#"{"order_id": "ord_7"}"#).expect("string id");
        assert_eq!(b.order_id, "ord_7");
    }

    #[test]
    fn rejects_missing_or_empty_id() {
        assert!(serde_json::from_str::<OrderReceipt>(r#"{}"#).is_err());
        assert!(serde_json::from_str::<OrderReceipt>(r#"{"order_id": ""}"#).is_err());
        assert!(serde_json::from_str::<OrderReceipt>(r#"{"order_id": null}"#).is_err());
    }

    #[test]
    fn error_detail_handles_structured_values() {
        let body: ErrorBody =
            serde_json::from_str(r#"{"detail": [{"msg": "bad email"}]}"#).expect("parse");
        assert!(body.detail_text().unwrap_or_default().contains("bad email"));
    }
}
