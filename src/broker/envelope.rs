//! broker 报文信封：请求参数编码 + `{result}` / `{error}` 响应解码。

use crate::error::BrokerError;
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

/// GET 请求不带 body：全部参数序列化成一个 JSON 字符串，放进这个 query 参数。
pub const PAYLOAD_PARAM: &str = "__payload";

/// 非 2xx 响应在错误信息里最多保留的原始字节数。
pub const SNIPPET_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// `?__payload=<json>`
    Query(String),
    /// JSON 请求体。
    Json(Vec<u8>),
}

impl Payload {
    pub fn body(&self) -> Option<&[u8]> {
        match self {
            Self::Query(_) => None,
            Self::Json(body) => Some(body),
        }
    }
}

pub fn encode<P>(method: &Method, params: &P) -> Result<Payload, BrokerError>
where
    P: Serialize + ?Sized,
{
    if *method == Method::GET {
        let json = sonic_rs::to_string(params).map_err(|e| BrokerError::Encode(e.to_string()))?;
        Ok(Payload::Query(json))
    } else {
        let body = sonic_rs::to_vec(params).map_err(|e| BrokerError::Encode(e.to_string()))?;
        Ok(Payload::Json(body))
    }
}

/// 解码 broker 响应。
///
/// 2xx 时 `result` 缺失也算成功（返回 `Value::Null`）；body 不是合法 JSON 时按缺失处理。
pub fn decode(status: u16, body: &[u8]) -> Result<Value, BrokerError> {
    let json = serde_json::from_slice::<Value>(body).ok();
    let error = json
        .as_ref()
        .and_then(|v| v.get("error"))
        .filter(|e| is_truthy(e))
        .map(error_message);

    if (200..300).contains(&status) {
        if let Some(result) = json.and_then(|mut v| v.get_mut("result").map(Value::take)) {
            return Ok(result);
        }
        // 2xx 但只有 error：仍视为业务失败。
        return match error {
            Some(message) => Err(BrokerError::Remote(message)),
            None => Ok(Value::Null),
        };
    }

    match error {
        Some(message) => Err(BrokerError::Remote(message)),
        None => Err(BrokerError::UnexpectedStatus {
            status,
            snippet: body_snippet(body),
        }),
    }
}

fn body_snippet(body: &[u8]) -> String {
    let end = body.len().min(SNIPPET_LIMIT);
    String::from_utf8_lossy(&body[..end]).into_owned()
}

fn error_message(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `false`、`null`、`0`、`""`、`"0"`、空数组/空对象视为「没有错误」。
fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_params_go_into_single_query_json() {
        let payload = encode(
            &Method::GET,
            &json!({"service": "openai", "preferredId": null}),
        )
        .unwrap();
        let Payload::Query(q) = payload else {
            panic!("GET must not carry a body");
        };
        let v: Value = serde_json::from_str(&q).unwrap();
        assert_eq!(v, json!({"service": "openai", "preferredId": null}));
    }

    #[test]
    fn non_get_params_go_into_body() {
        for method in [Method::POST, Method::PATCH, Method::PUT, Method::DELETE] {
            let payload = encode(&method, &json!({"time": 1.5})).unwrap();
            let body = payload.body().expect("body");
            let v: Value = serde_json::from_slice(body).unwrap();
            assert_eq!(v, json!({"time": 1.5}));
        }
    }

    #[test]
    fn success_returns_result() {
        let v = decode(200, br#"{"result":{"id":7}}"#).unwrap();
        assert_eq!(v, json!({"id": 7}));
    }

    #[test]
    fn success_without_result_is_null() {
        assert_eq!(decode(204, b"").unwrap(), Value::Null);
        assert_eq!(decode(200, br#"{"ok":true}"#).unwrap(), Value::Null);
        assert_eq!(decode(200, br#"{"result":null}"#).unwrap(), Value::Null);
    }

    #[test]
    fn malformed_success_body_is_null() {
        assert_eq!(decode(200, br#"{"result":{"id":"#).unwrap(), Value::Null);
    }

    #[test]
    fn error_envelope_is_remote_error() {
        let err = decode(200, br#"{"error":"quota exceeded"}"#).unwrap_err();
        assert!(matches!(err, BrokerError::Remote(ref m) if m == "quota exceeded"));

        let err = decode(429, br#"{"error":"no free accounts"}"#).unwrap_err();
        assert!(matches!(err, BrokerError::Remote(ref m) if m == "no free accounts"));
    }

    #[test]
    fn falsy_error_field_is_not_remote_error() {
        let err = decode(400, br#"{"error":false}"#).unwrap_err();
        assert!(matches!(err, BrokerError::UnexpectedStatus { status: 400, .. }));
        let err = decode(400, br#"{"error":""}"#).unwrap_err();
        assert!(matches!(err, BrokerError::UnexpectedStatus { status: 400, .. }));
    }

    #[test]
    fn non_string_error_is_rendered_as_json() {
        let err = decode(422, br#"{"error":{"field":"service"}}"#).unwrap_err();
        assert!(matches!(err, BrokerError::Remote(ref m) if m == r#"{"field":"service"}"#));
    }

    #[test]
    fn unexpected_status_keeps_short_snippet() {
        let err = decode(500, b"internal error").unwrap_err();
        match err {
            BrokerError::UnexpectedStatus { status, snippet } => {
                assert_eq!(status, 500);
                assert!(snippet.contains("internal error"));
            }
            other => panic!("unexpected {other:?}"),
        }

        let long = "y".repeat(500);
        let err = decode(502, long.as_bytes()).unwrap_err();
        let BrokerError::UnexpectedStatus { snippet, .. } = err else {
            panic!("expected UnexpectedStatus");
        };
        assert_eq!(snippet.len(), SNIPPET_LIMIT);
    }
}
