use super::{ProviderError, ProviderSettings, chat};
use crate::broker::Botobase;
use crate::config::Config;
use crate::error::BrokerError;
use crate::logging;
use crate::model::Service;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::multipart::{Form, Part};
use serde_json::{Value, json};
use std::path::Path;
use std::time::Instant;

pub const MATHPIX_BASE_URL: &str = "https://snip-api.mathpix.com/";
const SNIPS_MULTIPART_PATH: &str = "v1/snips-multipart";
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/117.0.0.0 Safari/537.36";
const OPTIONS_JSON: &str = r#"{"config":{"math_inline_delimiters":["$","$"],"math_display_delimiters":["$$\n","\n$$"],"idiomatic_eqn_arrays":true,"ocr_version":2},"metadata":{"input_type":"web_editor"}}"#;

/// 图片公式识别。Mathpix 的 token 放在账号的 `extra.token` 里，而不是 `credential`。
#[derive(Debug, Clone)]
pub struct Mathpix {
    botobase: Botobase,
    settings: ProviderSettings,
}

impl Mathpix {
    pub fn new(botobase: Botobase, cfg: &Config) -> Self {
        Self {
            botobase,
            settings: ProviderSettings::new(MATHPIX_BASE_URL, cfg, cfg.timeout),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.settings.base_url = base_url.into();
        self
    }

    pub async fn parse_image(&self, path: impl AsRef<Path>) -> Result<String, ProviderError> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "开始识别图片");
        let image = tokio::fs::read(path).await.inspect_err(|e| {
            tracing::error!(path = %path.display(), error = %e, "图片路径无效");
        })?;

        let account = self.botobase.allocate_account(Service::Mathpix, None).await?;
        tracing::debug!(account_id = account.id, "账号已分配");
        let token = account
            .extra_str("token")
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ProviderError::InvalidAccount("Mathpix 账号缺少 extra.token".to_string()))?
            .to_string();

        let http = self.settings.client_for(&account, default_headers())?;
        let url = self.settings.url(SNIPS_MULTIPART_PATH)?;
        let form = Form::new()
            .part(
                "file",
                Part::bytes(image)
                    .file_name("image.png")
                    .mime_str("image/png")?,
            )
            .text("options_json", OPTIONS_JSON);
        logging::provider_request(self.settings.log_level, "POST", url.as_str(), OPTIONS_JSON.as_bytes());

        let start = Instant::now();
        let resp = http
            .post(url)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .multipart(form)
            .send()
            .await?;
        let status = resp.status();
        let bytes = resp.bytes().await?;
        let elapsed = start.elapsed();
        logging::provider_response(self.settings.log_level, status.as_u16(), elapsed, &bytes);

        let Ok(json) = serde_json::from_slice::<Value>(&bytes) else {
            tracing::error!(status = status.as_u16(), "Mathpix 返回的不是合法 JSON");
            return Err(ProviderError::upstream(
                "Mathpix",
                status.as_u16(),
                "Failed to request image AI",
            ));
        };

        // snip 计数只要返回就要上报，哪怕本次识别失败。
        let mut usage_failure: Option<BrokerError> = None;
        if json.get("snip_count").is_some_and(|v| !v.is_null()) {
            let usage = json!({
                "snip_count": json["snip_count"],
                "snip_limit": json["snip_limit"],
            });
            if let Err(e) = self.botobase.report_elapsed(&account, elapsed, &usage).await {
                usage_failure = Some(e);
            }
        }

        if let Some(message) = first_error(&json) {
            if let Some(e) = &usage_failure {
                tracing::warn!(account_id = account.id, error = %e, "用量上报失败");
            }
            tracing::error!(account_id = account.id, error = %message, "Mathpix 识别失败");
            return Err(ProviderError::upstream("Mathpix", status.as_u16(), message));
        }

        let Some(text) = json.get("text").and_then(Value::as_str).map(str::to_string) else {
            return Err(ProviderError::upstream(
                "Mathpix",
                status.as_u16(),
                chat::upstream_message(&json, &bytes),
            ));
        };

        if let Some(id) = json.get("id").and_then(Value::as_str) {
            self.delete_snip(&http, &token, id).await;
        }

        match usage_failure {
            None => Ok(text),
            Some(source) => {
                tracing::warn!(account_id = account.id, error = %source, "识别已成功，但用量上报失败");
                Err(ProviderError::UsageReport {
                    output: text,
                    source,
                })
            }
        }
    }

    /// 清理服务端保存的 snip。失败只记日志，不影响识别结果。
    async fn delete_snip(&self, http: &reqwest::Client, token: &str, id: &str) {
        let url = match self.settings.url(&format!("v1/snips/{id}")) {
            Ok(u) => u,
            Err(e) => {
                tracing::warn!(snip_id = id, error = %e, "清理 snip 失败");
                return;
            }
        };
        match http
            .delete(url)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => {
                tracing::debug!(snip_id = id, "snip 已清理");
            }
            Ok(resp) => {
                tracing::warn!(snip_id = id, status = resp.status().as_u16(), "清理 snip 失败");
            }
            Err(e) => tracing::warn!(snip_id = id, error = %e, "清理 snip 失败"),
        }
    }
}

fn default_headers() -> HeaderMap {
    let mut h = HeaderMap::new();
    h.insert(ACCEPT, HeaderValue::from_static("application/json"));
    h.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    h
}

fn first_error(json: &Value) -> Option<String> {
    let errors = json.get("errors")?;
    let non_empty = match errors {
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Null | Value::Bool(false) => false,
        _ => true,
    };
    if !non_empty {
        return None;
    }
    Some(
        errors
            .pointer("/0/message")
            .and_then(Value::as_str)
            .unwrap_or("Unknown error")
            .to_string(),
    )
}
