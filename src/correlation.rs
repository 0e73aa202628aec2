//! The business-correlation blob the carrier round-trips for us.
//!
//! Set as `CustomField` on the outbound call, echoed verbatim into every
//! callback query string. Kept small: just enough to rebuild a session when
//! a callback beats (or outlives) the record it belongs to.

use crate::session::state::{CallKind, Language};
use crate::Result;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Correlation {
    pub kind: CallKind,
    pub order_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rider_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callee_name: Option<String>,
    pub language: Language,
}

impl Correlation {
    /// Compact JSON, no embedded control characters, safe inside a query
    /// string once percent-encoded by the carrier.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Tolerates one layer of surrounding double quotes, which the carrier
    /// is known to add around individual query parameter values.
    pub fn decode(raw: &str) -> Option<Self> {
        let trimmed = strip_quote_wrap(raw.trim());
        match serde_json::from_str(trimmed) {
            Ok(correlation) => Some(correlation),
            Err(error) => {
                tracing::warn!(%error, raw, "undecodable CustomField");
                None
            }
        }
    }
}

/// Strips at most one layer of surrounding double quotes.
pub fn strip_quote_wrap(value: &str) -> &str {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Correlation {
        Correlation {
            kind: CallKind::VendorOrderConfirmation,
            order_id: 12345,
            vendor_id: Some("V001".into()),
            rider_id: None,
            callee_name: Some("Sharma Snacks".into()),
            language: Language::Hi,
        }
    }

    #[test]
    fn encode_decode_round_trips() {
        let encoded = sample().encode().unwrap();
        assert!(!encoded.contains('\n'));
        assert_eq!(Correlation::decode(&encoded), Some(sample()));
    }

    #[test]
    fn decode_tolerates_quote_wrapping() {
        let encoded = format!("\"{}\"", sample().encode().unwrap());
        assert_eq!(Correlation::decode(&encoded), Some(sample()));
    }

    #[test]
    fn strip_quote_wrap_removes_exactly_one_layer() {
        assert_eq!(strip_quote_wrap("\"1\""), "1");
        assert_eq!(strip_quote_wrap("\"\"2\"\""), "\"2\"");
        assert_eq!(strip_quote_wrap("3"), "3");
        assert_eq!(strip_quote_wrap("\""), "\"");
        assert_eq!(strip_quote_wrap(""), "");
    }

    #[test]
    fn garbage_custom_field_decodes_to_none() {
        assert_eq!(Correlation::decode("not-json"), None);
        assert_eq!(Correlation::decode(""), None);
    }
}
