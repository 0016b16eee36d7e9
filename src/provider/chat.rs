//! OpenAI 兼容的 `/v1/chat/completions` 调用，DeepSeek 与 OpenAI 共用。

use super::{Message, ProviderError, ProviderSettings};
use crate::logging;
use crate::model::Account;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap};
use serde::Serialize;
use serde_json::Value;
use std::time::{Duration, Instant};

pub(super) const COMPLETIONS_PATH: &str = "v1/chat/completions";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
}

#[derive(Debug)]
pub(super) struct ChatOutcome {
    pub content: String,
    pub usage: Value,
    pub elapsed: Duration,
}

pub(super) async fn complete(
    provider: &'static str,
    settings: &ProviderSettings,
    account: &Account,
    model: &str,
    messages: &[Message],
) -> Result<ChatOutcome, ProviderError> {
    let url = settings.url(COMPLETIONS_PATH)?;
    let http = settings.client_for(account, HeaderMap::new())?;
    let body = sonic_rs::to_vec(&ChatRequest { model, messages })
        .map_err(|e| ProviderError::upstream(provider, 0, format!("编码请求失败: {e}")))?;
    logging::provider_request(settings.log_level, "POST", url.as_str(), &body);

    let start = Instant::now();
    let resp = http
        .post(url)
        .header(AUTHORIZATION, format!("Bearer {}", account.credential))
        .header(CONTENT_TYPE, "application/json")
        .body(body)
        .send()
        .await?;
    let status = resp.status();
    let bytes = resp.bytes().await?;
    let elapsed = start.elapsed();
    logging::provider_response(settings.log_level, status.as_u16(), elapsed, &bytes);

    let json = serde_json::from_slice::<Value>(&bytes).unwrap_or(Value::Null);
    if !status.is_success() {
        return Err(ProviderError::upstream(
            provider,
            status.as_u16(),
            upstream_message(&json, &bytes),
        ));
    }

    let Some(content) = json
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
    else {
        return Err(ProviderError::upstream(
            provider,
            status.as_u16(),
            "响应中缺少 choices[0].message.content",
        ));
    };

    Ok(ChatOutcome {
        content: content.to_string(),
        usage: json.get("usage").cloned().unwrap_or(Value::Null),
        elapsed,
    })
}

/// 下游错误信息：优先取 `error.message`，否则截取原始 body。
pub(super) fn upstream_message(json: &Value, raw: &[u8]) -> String {
    if let Some(m) = json.pointer("/error/message").and_then(Value::as_str) {
        return m.to_string();
    }
    if let Some(m) = json.get("error").and_then(Value::as_str) {
        return m.to_string();
    }
    let end = raw.len().min(200);
    String::from_utf8_lossy(&raw[..end]).into_owned()
}
