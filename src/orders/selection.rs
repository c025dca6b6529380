//! Selection payload codec.
//!
//! A selection event stores its payload in the free-text `comment` column
//! of the status history. Current writers store a JSON object:
//!
//! ```json
//! {"selectedRowIds":["r1","r2"],"machineId":4,"machineName":"Laser 2","threeCheckbox":true}
//! ```
//!
//! Optional fields are omitted rather than written as `null`. Rows written
//! before the JSON format carry free text with a bracketed list such as
//! `Selected: ["r1", "r2"]`; [`decode`] still reads those.
//!
//! Decoding never fails. Anything unreadable is the empty selection, so one
//! bad history row cannot break reads of the rest.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Decoded form of a selection event's payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionPayload {
    pub selected_row_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_name: Option<String>,
    /// Set by the multi-department form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub three_checkbox: Option<bool>,
}

impl SelectionPayload {
    pub fn new(selected_row_ids: Vec<String>) -> Self {
        Self {
            selected_row_ids,
            ..Self::default()
        }
    }

    pub fn with_machine(mut self, machine_id: Option<i64>, machine_name: Option<String>) -> Self {
        self.machine_id = machine_id;
        self.machine_name = machine_name;
        self
    }

    pub fn with_marker(mut self, three_checkbox: Option<bool>) -> Self {
        self.three_checkbox = three_checkbox;
        self
    }

    /// Whether the payload was produced by the multi-department form.
    pub fn is_marked(&self) -> bool {
        self.three_checkbox.unwrap_or(false)
    }

    /// Serialize to the string stored in the event's comment.
    pub fn encode(&self) -> String {
        // A struct of strings, integers and booleans always serializes.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Recover a selection from a stored comment. Blank input, JSON of the
/// wrong shape and unparsable text all yield the empty selection.
pub fn decode(comment: &str) -> SelectionPayload {
    if comment.trim().is_empty() {
        return SelectionPayload::default();
    }
    match serde_json::from_str::<Value>(comment) {
        Ok(root) => decode_json(&root),
        Err(e) => {
            tracing::debug!(error = %e, "selection comment is not JSON, using legacy parser");
            SelectionPayload::new(decode_legacy(comment))
        }
    }
}

fn decode_json(root: &Value) -> SelectionPayload {
    let Some(obj) = root.as_object() else {
        return SelectionPayload::default();
    };

    let selected_row_ids = obj
        .get("selectedRowIds")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(row_id_text).collect())
        .unwrap_or_default();

    let machine_id = obj.get("machineId").and_then(|v| match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    });

    let machine_name = obj.get("machineName").and_then(|v| match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    });

    let three_checkbox = obj.get("threeCheckbox").and_then(Value::as_bool);

    SelectionPayload {
        selected_row_ids,
        machine_id,
        machine_name,
        three_checkbox,
    }
}

/// Text of one `selectedRowIds` element. Scalars are coerced, containers
/// and nulls are skipped, and so are blank ids.
fn row_id_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    if text.trim().is_empty() { None } else { Some(text) }
}

/// Pre-JSON format: the ids between the first `[` and the first `]`,
/// comma separated, each optionally wrapped in double quotes.
fn decode_legacy(comment: &str) -> Vec<String> {
    let (Some(start), Some(end)) = (comment.find('['), comment.find(']')) else {
        return Vec::new();
    };
    if end <= start {
        return Vec::new();
    }
    comment[start + 1..end]
        .split(',')
        .map(|part| {
            let id = part.trim();
            let id = id.strip_prefix('"').unwrap_or(id);
            id.strip_suffix('"').unwrap_or(id)
        })
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_encode_omits_absent_fields() {
        let encoded = SelectionPayload::new(ids(&["1", "2"])).encode();
        assert_eq!(encoded, r#"{"selectedRowIds":["1","2"]}"#);
        assert!(!encoded.contains("null"));
    }

    #[test]
    fn test_encode_writes_present_fields() {
        let encoded = SelectionPayload::new(ids(&["7"]))
            .with_machine(Some(3), Some("Laser 2".into()))
            .with_marker(Some(true))
            .encode();
        let v: Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(v["selectedRowIds"], serde_json::json!(["7"]));
        assert_eq!(v["machineId"], 3);
        assert_eq!(v["machineName"], "Laser 2");
        assert_eq!(v["threeCheckbox"], true);
    }

    #[test]
    fn test_round_trip_preserves_every_field() {
        let cases = [
            SelectionPayload::new(ids(&["a", "a", "b"])),
            SelectionPayload::new(ids(&["x"])).with_marker(Some(false)),
            SelectionPayload::new(ids(&["r 1", "quote\"d", "comma,id"]))
                .with_machine(Some(12), Some("Bender".into()))
                .with_marker(Some(true)),
        ];
        for payload in cases {
            assert_eq!(decode(&payload.encode()), payload);
        }
    }

    #[test]
    fn test_legacy_bracket_list() {
        let decoded = decode(r#"Selected: ["r1", "r2"]"#);
        assert_eq!(decoded.selected_row_ids, ids(&["r1", "r2"]));
        assert_eq!(decoded.machine_id, None);
        assert!(!decoded.is_marked());
    }

    #[test]
    fn test_legacy_unquoted_and_empty_pieces() {
        let decoded = decode("rows [ 4, ,\"5\" ,6 ] sent");
        assert_eq!(decoded.selected_row_ids, ids(&["4", "5", "6"]));
    }

    #[test]
    fn test_legacy_requires_ordered_brackets() {
        assert!(decode("no brackets here").selected_row_ids.is_empty());
        assert!(decode("closing ] before [ opening").selected_row_ids.is_empty());
        assert!(decode("only [ opening").selected_row_ids.is_empty());
        assert!(decode("[]").selected_row_ids.is_empty());
    }

    #[test]
    fn test_malformed_input_never_panics() {
        let inputs = [
            "",
            "   ",
            "{",
            r#"{"selectedRowIds": ["a", "b""#,
            r#"{"selectedRowIds": "not-an-array"}"#,
            r#"{"selectedRowIds": [null, {"x": 1}, ["nested"], "  "]}"#,
            r#""just a string""#,
            "42",
            "null",
            "no selection data",
        ];
        for input in inputs {
            let decoded = decode(input);
            assert!(
                decoded.selected_row_ids.is_empty(),
                "expected empty selection for {:?}",
                input
            );
            assert!(!decoded.is_marked());
        }
    }

    #[test]
    fn test_truncated_json_falls_back_to_legacy_parser() {
        // Invalid JSON, but the bracketed list is intact.
        let decoded = decode(r#"{"selectedRowIds":["a","b"],"machineId":"#);
        assert_eq!(decoded.selected_row_ids, ids(&["a", "b"]));
        assert_eq!(decoded.machine_id, None);
    }

    #[test]
    fn test_scalar_elements_are_coerced() {
        let decoded = decode(r#"{"selectedRowIds": [1, "two", true, null]}"#);
        assert_eq!(decoded.selected_row_ids, ids(&["1", "two", "true"]));
    }

    #[test]
    fn test_json_array_root_is_empty_selection() {
        // Valid JSON takes the JSON path even when it has no object root.
        assert!(decode(r#"["r1","r2"]"#).selected_row_ids.is_empty());
    }

    #[test]
    fn test_optional_fields_handle_nulls_and_strings() {
        let decoded = decode(
            r#"{"selectedRowIds":["1"],"machineId":null,"machineName":null,"threeCheckbox":"yes"}"#,
        );
        assert_eq!(decoded.machine_id, None);
        assert_eq!(decoded.machine_name, None);
        assert_eq!(decoded.three_checkbox, None);

        let decoded = decode(r#"{"selectedRowIds":["1"],"machineId":"9"}"#);
        assert_eq!(decoded.machine_id, Some(9));
    }

    #[test]
    fn test_machine_name_keeps_scalars_and_drops_containers() {
        let decoded = decode(r#"{"selectedRowIds":["1"],"machineName":42}"#);
        assert_eq!(decoded.machine_name.as_deref(), Some("42"));

        for name in [r#"{"model":"X"}"#, r#"["Laser"]"#] {
            let comment = format!(r#"{{"selectedRowIds":["1"],"machineName":{}}}"#, name);
            let decoded = decode(&comment);
            assert_eq!(decoded.machine_name, None, "machineName {}", name);
            assert_eq!(decoded.selected_row_ids, vec!["1".to_string()]);
        }
    }
}
