//! Listing-endpoint page schema.
//!
//! Every listing endpoint answers with an object carrying the reserved
//! bookkeeping keys `items` (total count, as a decimal string), `current`,
//! and `last`, plus exactly one endpoint-specific key holding the item
//! array (`contacts`, `listings`, ...). The parser pins that shape down;
//! any deviation is a `Contract` error, which aborts the retrieval rather
//! than being retried.

use agentbox_common::{AgentboxError, Result};
use serde_json::Value;

use crate::constants::RESERVED_LIST_KEYS;

/// One parsed page of a listing endpoint.
#[derive(Debug, Clone)]
pub struct ListPage {
    /// Expected total across all pages, from the reserved `items` key
    pub total: u64,
    /// 1-based index of this page, when the backend reports it
    pub current: Option<u64>,
    /// Index of the final page, when the backend reports it
    pub last: Option<u64>,
    /// Name of the endpoint-specific key the items came from
    pub item_key: String,
    pub items: Vec<Value>,
}

impl ListPage {
    /// Parse an unwrapped envelope payload into a page.
    ///
    /// # Errors
    /// `Contract` when the payload is not an object, the `items` total is
    /// missing or not a decimal count, or there is not exactly one
    /// non-reserved key holding an array.
    pub fn parse(payload: &Value) -> Result<Self> {
        let object = payload.as_object().ok_or_else(|| {
            AgentboxError::Contract("listing page is not a JSON object".into())
        })?;

        let total = object
            .get("items")
            .and_then(parse_count)
            .ok_or_else(|| {
                AgentboxError::Contract(
                    "listing page is missing a decimal `items` total".into(),
                )
            })?;
        let current = object.get("current").and_then(parse_count);
        let last = object.get("last").and_then(parse_count);

        let mut item_entries =
            object.iter().filter(|(key, _)| !RESERVED_LIST_KEYS.contains(&key.as_str()));
        let (item_key, item_value) = item_entries.next().ok_or_else(|| {
            AgentboxError::Contract("listing page has no item key besides the reserved ones".into())
        })?;
        if let Some((extra_key, _)) = item_entries.next() {
            return Err(AgentboxError::Contract(format!(
                "listing page has ambiguous item keys `{item_key}` and `{extra_key}`"
            )));
        }
        let items = item_value
            .as_array()
            .ok_or_else(|| {
                AgentboxError::Contract(format!("listing key `{item_key}` is not an array"))
            })?
            .clone();

        Ok(Self { total, current, last, item_key: item_key.clone(), items })
    }
}

/// The backend renders counts as decimal strings; tolerate plain numbers
/// too.
fn parse_count(value: &Value) -> Option<u64> {
    match value {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_a_regular_page() {
        let payload = json!({
            "items": "250",
            "current": "1",
            "last": "3",
            "contacts": [{"id": 1}, {"id": 2}]
        });
        let page = ListPage::parse(&payload).unwrap();
        assert_eq!(page.total, 250);
        assert_eq!(page.current, Some(1));
        assert_eq!(page.last, Some(3));
        assert_eq!(page.item_key, "contacts");
        assert_eq!(page.items.len(), 2);
    }

    #[test]
    fn tolerates_numeric_counts() {
        let payload = json!({ "items": 7, "current": 1, "last": 1, "listings": [] });
        let page = ListPage::parse(&payload).unwrap();
        assert_eq!(page.total, 7);
        assert!(page.items.is_empty());
    }

    #[test]
    fn missing_total_is_a_contract_error() {
        let payload = json!({ "current": "1", "last": "1", "contacts": [] });
        assert!(matches!(ListPage::parse(&payload), Err(AgentboxError::Contract(_))));
    }

    #[test]
    fn garbage_total_is_a_contract_error() {
        let payload = json!({ "items": "lots", "contacts": [] });
        assert!(matches!(ListPage::parse(&payload), Err(AgentboxError::Contract(_))));
    }

    #[test]
    fn ambiguous_item_keys_are_rejected() {
        let payload = json!({ "items": "2", "contacts": [], "listings": [] });
        assert!(matches!(ListPage::parse(&payload), Err(AgentboxError::Contract(_))));
    }

    #[test]
    fn missing_item_key_is_rejected() {
        let payload = json!({ "items": "2", "current": "1", "last": "1" });
        assert!(matches!(ListPage::parse(&payload), Err(AgentboxError::Contract(_))));
    }

    #[test]
    fn non_array_item_key_is_rejected() {
        let payload = json!({ "items": "2", "contacts": {"id": 1} });
        assert!(matches!(ListPage::parse(&payload), Err(AgentboxError::Contract(_))));
    }
}
