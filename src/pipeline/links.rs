//! Linked-record traversal.
//!
//! Several contract fields do not live on the contract row itself: payment
//! terms, the quantity unit, and the product image usually come from the SKU
//! row the contract links to. Link cells arrive in several shapes depending
//! on the client that wrote them, so extraction is defensive: anything that
//! is not a `{ table_id, record_ids }` object (bare or inside an array) is
//! silently ignored.
//!
//! Resolution is ordered and short-circuiting. Candidate field names are
//! tried first on each linked record; only when none of them yields text do
//! we fall back to scanning every field of that record. The first non-empty
//! hit wins and no further records are fetched.

use crate::bitable::TableStore;
use crate::error::ContractError;
use crate::pipeline::normalize::to_text;
use serde_json::Value;
use tracing::debug;

/// One link cell entry: a target table and the record ids it points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRef {
    pub table_id: String,
    pub record_ids: Vec<String>,
}

/// Extract well-formed link references from a raw field value.
///
/// Accepts a bare object or an array of objects. Entries missing a string
/// `table_id` or a non-empty `record_ids` array are dropped.
pub fn extract_link_items(value: &Value) -> Vec<LinkRef> {
    let candidates: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        Value::Object(_) => vec![value],
        _ => return Vec::new(),
    };

    candidates
        .into_iter()
        .filter_map(|item| {
            let table_id = item.get("table_id")?.as_str()?.to_string();
            let ids = item.get("record_ids")?.as_array()?;
            let record_ids: Vec<String> = ids.iter().map(id_text).collect();
            if record_ids.is_empty() {
                return None;
            }
            Some(LinkRef {
                table_id,
                record_ids,
            })
        })
        .collect()
}

/// Record ids are normally strings, but numbers have been seen in the wild.
fn id_text(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => to_text(other),
    }
}

/// Pull a media token out of an attachment cell.
///
/// Attachment values vary by writer: `file_token`, camel-cased `fileToken`,
/// bare `token`, or a `file_token_list` array. The cell itself may be the
/// object or an array of them; every array element is inspected and the
/// first token found anywhere wins.
pub fn pick_file_token(value: &Value) -> Option<String> {
    match value {
        Value::Array(items) => items.iter().find_map(object_file_token),
        Value::Object(_) => object_file_token(value),
        _ => None,
    }
}

fn object_file_token(obj: &Value) -> Option<String> {
    for key in ["file_token", "fileToken", "token"] {
        if let Some(token) = obj.get(key).and_then(Value::as_str) {
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
    }

    obj.get("file_token_list")
        .and_then(Value::as_array)
        .and_then(|list| list.first())
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Resolve the first non-empty text value reachable through `links`.
///
/// For each linked record, `candidates` are tried in order before falling
/// back to a scan of all fields. Returns an empty string when nothing is
/// found; record fetch failures propagate.
pub async fn resolve_text_from_linked_records(
    store: &dyn TableStore,
    links: &[LinkRef],
    candidates: &[&str],
) -> Result<String, ContractError> {
    for link in links {
        for record_id in &link.record_ids {
            let record = store.get_record(&link.table_id, record_id).await?;

            for name in candidates {
                if let Some(value) = record.fields.get(*name) {
                    let text = to_text(value);
                    if !text.is_empty() {
                        return Ok(text);
                    }
                }
            }
            for (name, value) in &record.fields {
                let text = to_text(value);
                if !text.is_empty() {
                    debug!(field = %name, "linked text resolved by full scan");
                    return Ok(text);
                }
            }
        }
    }
    Ok(String::new())
}

/// Resolve the first attachment token reachable through `links`.
///
/// Same traversal order as [`resolve_text_from_linked_records`], but the
/// predicate is "this field parses as an attachment" rather than non-empty
/// text.
pub async fn resolve_attachment_from_linked_records(
    store: &dyn TableStore,
    links: &[LinkRef],
    candidates: &[&str],
) -> Result<Option<String>, ContractError> {
    for link in links {
        for record_id in &link.record_ids {
            let record = store.get_record(&link.table_id, record_id).await?;

            for name in candidates {
                if let Some(token) = record.fields.get(*name).and_then(pick_file_token) {
                    return Ok(Some(token));
                }
            }
            for (name, value) in &record.fields {
                if let Some(token) = pick_file_token(value) {
                    debug!(field = %name, "linked attachment resolved by full scan");
                    return Ok(Some(token));
                }
            }
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_bare_object() {
        let v = json!({ "table_id": "tblSKU", "record_ids": ["recA", "recB"] });
        assert_eq!(
            extract_link_items(&v),
            vec![LinkRef {
                table_id: "tblSKU".into(),
                record_ids: vec!["recA".into(), "recB".into()],
            }]
        );
    }

    #[test]
    fn extracts_array_and_drops_malformed_entries() {
        let v = json!([
            { "table_id": "tblSKU", "record_ids": ["recA"] },
            { "table_id": "tblSKU" },                        // no ids
            { "table_id": "tblSKU", "record_ids": [] },      // empty ids
            { "record_ids": ["recB"] },                      // no table
            "garbage",
            { "table_id": "tblOther", "record_ids": ["recC"] },
        ]);
        let items = extract_link_items(&v);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].record_ids, vec!["recA"]);
        assert_eq!(items[1].table_id, "tblOther");
    }

    #[test]
    fn malformed_scalar_yields_nothing() {
        assert!(extract_link_items(&json!("recA")).is_empty());
        assert!(extract_link_items(&json!(42)).is_empty());
        assert!(extract_link_items(&Value::Null).is_empty());
    }

    #[test]
    fn picks_token_from_each_shape() {
        assert_eq!(
            pick_file_token(&json!({ "file_token": "tokA" })).as_deref(),
            Some("tokA")
        );
        assert_eq!(
            pick_file_token(&json!({ "fileToken": "tokB" })).as_deref(),
            Some("tokB")
        );
        assert_eq!(
            pick_file_token(&json!({ "token": "tokC" })).as_deref(),
            Some("tokC")
        );
        assert_eq!(
            pick_file_token(&json!({ "file_token_list": ["tokD", "tokE"] })).as_deref(),
            Some("tokD")
        );
        assert_eq!(
            pick_file_token(&json!([{ "file_token": "tokF" }, { "file_token": "tokG" }]))
                .as_deref(),
            Some("tokF")
        );
    }

    #[test]
    fn token_in_later_array_element_is_found() {
        // Some writers put metadata-only entries before the attachment.
        let v = json!([{ "name": "x" }, { "file_token": "tokB" }]);
        assert_eq!(pick_file_token(&v).as_deref(), Some("tokB"));

        let v = json!([
            { "token": "" },
            { "file_token_list": [] },
            { "file_token_list": ["tokC"] },
        ]);
        assert_eq!(pick_file_token(&v).as_deref(), Some("tokC"));
    }

    #[test]
    fn token_lookup_prefers_snake_case() {
        let v = json!({ "fileToken": "camel", "file_token": "snake" });
        assert_eq!(pick_file_token(&v).as_deref(), Some("snake"));
    }

    #[test]
    fn no_token_in_unrelated_value() {
        assert!(pick_file_token(&json!({ "text": "hello" })).is_none());
        assert!(pick_file_token(&json!("tokX")).is_none());
        assert!(pick_file_token(&json!([])).is_none());
        assert!(pick_file_token(&json!({ "file_token": "" })).is_none());
    }
}
