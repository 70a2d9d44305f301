//! Request/response envelopes exchanged over the IPC socket.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An inbound IPC request. `action` selects the handler; everything else
/// rides along as an opaque JSON object, deserialized by the handler once
/// the action is known to be valid.
#[derive(Debug, Clone, Deserialize)]
pub struct IpcRequest {
    pub action: String,
    #[serde(flatten)]
    pub payload: Value,
}

/// An outbound IPC response. Mirrors spec's wire contract:
/// `{ok: true, ...result}` or `{ok: false, error, taintBlocked?}`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum IpcResponse {
    Ok(Value),
    Err {
        ok: bool,
        error: String,
        #[serde(rename = "taintBlocked", skip_serializing_if = "std::ops::Not::not")]
        taint_blocked: bool,
    },
}

impl IpcResponse {
    /// Build a success response, merging `result` fields alongside `ok: true`.
    pub fn ok(result: Value) -> Self {
        let mut obj = match result {
            Value::Object(map) => map,
            other => {
                let mut map = serde_json::Map::new();
                map.insert("result".to_string(), other);
                map
            }
        };
        obj.insert("ok".to_string(), Value::Bool(true));
        IpcResponse::Ok(Value::Object(obj))
    }

    pub fn err(error: impl Into<String>) -> Self {
        IpcResponse::Err {
            ok: false,
            error: error.into(),
            taint_blocked: false,
        }
    }

    pub fn taint_blocked(error: impl Into<String>) -> Self {
        IpcResponse::Err {
            ok: false,
            error: error.into(),
            taint_blocked: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_response_sets_ok_true() {
        let resp = IpcResponse::ok(serde_json::json!({"id": "abc"}));
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["ok"], serde_json::json!(true));
        assert_eq!(value["id"], serde_json::json!("abc"));
    }

    #[test]
    fn err_response_omits_taint_blocked_when_false() {
        let resp = IpcResponse::err("bad request");
        let value = serde_json::to_value(&resp).unwrap();
        assert!(value.get("taintBlocked").is_none());
        assert_eq!(value["error"], serde_json::json!("bad request"));
    }

    #[test]
    fn taint_blocked_response_sets_flag() {
        let resp = IpcResponse::taint_blocked("ratio too high");
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["taintBlocked"], serde_json::json!(true));
        assert_eq!(value["ok"], serde_json::json!(false));
    }

    #[test]
    fn request_deserializes_action_and_payload() {
        let raw = r#"{"action":"llm_call","model":"gpt-4","messages":[]}"#;
        let req: IpcRequest = serde_json::from_str(raw).unwrap();
        assert_eq!(req.action, "llm_call");
        assert_eq!(req.payload["model"], serde_json::json!("gpt-4"));
    }
}
