//! Wire types for the line-delimited JSON protocol.
//!
//! One request per input line, one response line per request. Request body
//! keys are normalized from camelCase to snake_case before dispatch so
//! clients in either convention work.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One decoded request line.
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    /// Correlation id, echoed on the response when present.
    #[serde(default)]
    pub id: Option<String>,

    pub kind: String,

    #[serde(default)]
    pub body: Option<Value>,
}

/// One response line.
#[derive(Debug, Clone, Serialize)]
pub struct Response {
    pub status: &'static str,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub traceback: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl Response {
    pub fn ok(payload: impl Serialize) -> Self {
        match serde_json::to_value(payload) {
            Ok(value) => Self {
                status: "ok",
                payload: Some(value),
                error: None,
                traceback: None,
                id: None,
            },
            Err(e) => Self::err(format!("failed to serialize payload: {e}")),
        }
    }

    pub fn pending(payload: impl Serialize) -> Self {
        let mut response = Self::ok(payload);
        if response.status == "ok" {
            response.status = "pending";
        }
        response
    }

    /// Precondition-style failure: an error message without a traceback.
    pub fn err(error: impl Into<String>) -> Self {
        Self {
            status: "error",
            payload: None,
            error: Some(error.into()),
            traceback: None,
            id: None,
        }
    }

    /// Unexpected failure carrying diagnostics.
    pub fn err_trace(error: impl Into<String>, traceback: impl Into<String>) -> Self {
        Self {
            status: "error",
            payload: None,
            error: Some(error.into()),
            traceback: Some(traceback.into()),
            id: None,
        }
    }
}

/// camelCase (or PascalCase) to snake_case: an underscore lands before
/// every uppercase letter that is not at the start, then everything is
/// lowercased.
pub fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_uppercase() && i != 0 {
            out.push('_');
        }
        for lower in c.to_lowercase() {
            out.push(lower);
        }
    }
    out
}

/// Normalizes every object key in a JSON tree to snake_case.
///
/// Runs as an explicit-stack walk rather than recursion so arbitrarily
/// deep client payloads cannot exhaust the call stack.
pub fn normalize_keys(value: Value) -> Value {
    enum Frame {
        Obj {
            src: serde_json::map::IntoIter,
            dst: serde_json::Map<String, Value>,
            key: Option<String>,
        },
        Arr {
            src: std::vec::IntoIter<Value>,
            dst: Vec<Value>,
        },
    }

    let mut stack: Vec<Frame> = Vec::new();
    let mut input: Option<Value> = Some(value);
    let mut output: Option<Value> = None;

    loop {
        if let Some(value) = input.take() {
            match value {
                Value::Object(map) => stack.push(Frame::Obj {
                    src: map.into_iter(),
                    dst: serde_json::Map::new(),
                    key: None,
                }),
                Value::Array(items) => stack.push(Frame::Arr {
                    src: items.into_iter(),
                    dst: Vec::new(),
                }),
                leaf => output = Some(leaf),
            }
        }

        match stack.last_mut() {
            None => return output.take().unwrap_or(Value::Null),
            Some(Frame::Obj { src, dst, key }) => {
                if let Some(done) = output.take() {
                    if let Some(key) = key.take() {
                        dst.insert(key, done);
                    }
                }
                match src.next() {
                    Some((name, child)) => {
                        *key = Some(snake_case(&name));
                        input = Some(child);
                    }
                    None => {
                        if let Some(Frame::Obj { dst, .. }) = stack.pop() {
                            output = Some(Value::Object(dst));
                        }
                    }
                }
            }
            Some(Frame::Arr { src, dst }) => {
                if let Some(done) = output.take() {
                    dst.push(done);
                }
                match src.next() {
                    Some(child) => input = Some(child),
                    None => {
                        if let Some(Frame::Arr { dst, .. }) = stack.pop() {
                            output = Some(Value::Array(dst));
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn snake_case_matches_wire_convention() {
        assert_eq!(snake_case("pageSize"), "page_size");
        assert_eq!(snake_case("noOfEntries"), "no_of_entries");
        assert_eq!(snake_case("already_snake"), "already_snake");
        assert_eq!(snake_case("Name"), "name");
        assert_eq!(snake_case("x"), "x");
    }

    #[test]
    fn normalizes_nested_objects_and_arrays() {
        let input = json!({
            "tableName": "teachers",
            "noOfEntries": 50,
            "columns": [
                {"columnName": "full_name", "type": "faker"},
                {"columnName": "salary", "orderHint": 1}
            ],
            "nested": {"innerKey": {"deepKey": null}}
        });
        let expected = json!({
            "table_name": "teachers",
            "no_of_entries": 50,
            "columns": [
                {"column_name": "full_name", "type": "faker"},
                {"column_name": "salary", "order_hint": 1}
            ],
            "nested": {"inner_key": {"deep_key": null}}
        });
        assert_eq!(normalize_keys(input), expected);
    }

    #[test]
    fn leaves_scalars_alone() {
        assert_eq!(normalize_keys(json!(42)), json!(42));
        assert_eq!(normalize_keys(json!(null)), json!(null));
        assert_eq!(normalize_keys(json!(["aB", 1])), json!(["aB", 1]));
    }

    #[test]
    fn survives_deep_nesting() {
        let mut value = json!({"leafKey": 1});
        for _ in 0..5_000 {
            value = json!({ "wrapKey": value });
        }
        // Must not blow the stack.
        let normalized = normalize_keys(value);
        assert!(normalized.get("wrap_key").is_some());
    }

    #[test]
    fn response_shapes() {
        let ok = Response::ok("pong");
        assert_eq!(ok.status, "ok");
        assert_eq!(ok.payload, Some(json!("pong")));

        let err = Response::err("nope");
        let text = serde_json::to_string(&err).unwrap();
        assert!(!text.contains("payload"));
        assert!(!text.contains("traceback"));

        let pending = Response::pending(json!({"job_id": "j1"}));
        assert_eq!(pending.status, "pending");
    }
}
