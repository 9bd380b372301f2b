use serde::Serialize;
use serde_json::{Map, Value};

pub const JSONRPC_VERSION: &str = "2.0";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

#[derive(Debug, Clone, PartialEq)]
pub struct RpcRequest {
    /// `None` for notifications, which never get a response
    pub id: Option<Value>,
    pub method: String,
    pub params: Value,
}

impl RpcRequest {
    /// Validate the envelope of an already-parsed message.
    pub fn from_value(value: Value) -> Result<Self, (Value, RpcError)> {
        let Value::Object(mut map) = value else {
            return Err((Value::Null, RpcError::invalid_request("expected an object")));
        };

        let id = match map.remove("id") {
            None | Some(Value::Null) => None,
            Some(id @ (Value::String(_) | Value::Number(_))) => Some(id),
            Some(_) => {
                return Err((
                    Value::Null,
                    RpcError::invalid_request("id must be a string or number"),
                ));
            }
        };
        let reply_id = id.clone().unwrap_or(Value::Null);

        if map.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
            return Err((reply_id, RpcError::invalid_request("jsonrpc must be \"2.0\"")));
        }

        let method = match map.remove("method") {
            Some(Value::String(method)) => method,
            _ => return Err((reply_id, RpcError::invalid_request("method must be a string"))),
        };

        let params = map
            .remove("params")
            .unwrap_or_else(|| Value::Object(Map::new()));

        Ok(Self { id, method, params })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    fn invalid_request(reason: &str) -> Self {
        Self::new(INVALID_REQUEST, format!("Invalid request: {}", reason))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: None,
            error: Some(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_envelope() {
        let request = RpcRequest::from_value(json!({
            "jsonrpc": "2.0", "id": 7, "method": "tools/list"
        }))
        .unwrap();

        assert_eq!(request.id, Some(json!(7)));
        assert_eq!(request.method, "tools/list");
        assert_eq!(request.params, json!({}));
    }

    #[test]
    fn test_notification_has_no_id() {
        let request = RpcRequest::from_value(json!({
            "jsonrpc": "2.0", "method": "notifications/initialized"
        }))
        .unwrap();

        assert_eq!(request.id, None);
    }

    #[test]
    fn test_invalid_envelopes() {
        let (id, error) = RpcRequest::from_value(json!([1, 2])).unwrap_err();
        assert_eq!(id, Value::Null);
        assert_eq!(error.code, INVALID_REQUEST);

        let (id, error) =
            RpcRequest::from_value(json!({"jsonrpc": "1.0", "id": "a", "method": "ping"}))
                .unwrap_err();
        assert_eq!(id, json!("a"));
        assert_eq!(error.code, INVALID_REQUEST);

        let (_, error) = RpcRequest::from_value(json!({"jsonrpc": "2.0", "id": 1})).unwrap_err();
        assert_eq!(error.code, INVALID_REQUEST);
    }

    #[test]
    fn test_response_omits_absent_members() {
        let response = RpcResponse::success(json!(1), json!({}));
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"jsonrpc": "2.0", "id": 1, "result": {}})
        );

        let response = RpcResponse::failure(Value::Null, RpcError::new(PARSE_ERROR, "Parse error"));
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"jsonrpc": "2.0", "id": null, "error": {"code": -32700, "message": "Parse error"}})
        );
    }
}
