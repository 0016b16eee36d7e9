use super::{Prompt, ProviderError, ProviderSettings, chat, finish_with_usage};
use crate::broker::Botobase;
use crate::config::Config;
use crate::logging;
use crate::model::Service;
use reqwest::header::{AUTHORIZATION, HeaderMap};
use reqwest::multipart::{Form, Part};
use serde_json::{Value, json};
use std::path::Path;
use std::time::Instant;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
const TRANSCRIPTION_MODEL: &str = "whisper-1";
const TRANSCRIPTIONS_PATH: &str = "v1/audio/transcriptions";

#[derive(Debug, Clone)]
pub struct OpenAi {
    botobase: Botobase,
    settings: ProviderSettings,
}

impl OpenAi {
    pub fn new(botobase: Botobase, cfg: &Config) -> Self {
        Self {
            botobase,
            settings: ProviderSettings::new(OPENAI_BASE_URL, cfg, cfg.provider_timeout),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.settings.base_url = base_url.into();
        self
    }

    pub async fn query(
        &self,
        prompt: impl Into<Prompt>,
        model: Option<&str>,
    ) -> Result<String, ProviderError> {
        let model = model.unwrap_or(DEFAULT_CHAT_MODEL);
        let messages = prompt.into().into_messages();
        let account = self.botobase.allocate_account(Service::OpenAI, None).await?;

        let outcome = chat::complete("OpenAI", &self.settings, &account, model, &messages)
            .await
            .inspect_err(|e| tracing::error!(account_id = account.id, error = %e, "OpenAI 请求失败"))?;

        let usage = json!({"model": model, "usage": outcome.usage});
        finish_with_usage(&self.botobase, &account, outcome.elapsed, &usage, outcome.content)
            .await
    }

    /// 语音转文字（whisper-1）。用量按返回文本的字节长度计。
    pub async fn speech_to_text(&self, path: impl AsRef<Path>) -> Result<String, ProviderError> {
        let path = path.as_ref();
        // 先读文件再借账号：本地文件有问题时不占用账号。
        let audio = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string());

        let account = self.botobase.allocate_account(Service::OpenAI, None).await?;
        let url = self.settings.url(TRANSCRIPTIONS_PATH)?;
        let http = self.settings.client_for(&account, HeaderMap::new())?;
        let form = Form::new()
            .text("model", TRANSCRIPTION_MODEL)
            .part("file", Part::bytes(audio).file_name(file_name));
        logging::provider_request(
            self.settings.log_level,
            "POST",
            url.as_str(),
            path.display().to_string().as_bytes(),
        );

        let start = Instant::now();
        let resp = http
            .post(url)
            .header(AUTHORIZATION, format!("Bearer {}", account.credential))
            .multipart(form)
            .send()
            .await?;
        let status = resp.status();
        let bytes = resp.bytes().await?;
        let elapsed = start.elapsed();
        logging::provider_response(self.settings.log_level, status.as_u16(), elapsed, &bytes);

        let json = serde_json::from_slice::<Value>(&bytes).unwrap_or(Value::Null);
        let text = match json.get("text").and_then(Value::as_str) {
            Some(text) if status.is_success() => text.to_string(),
            _ => {
                let err = ProviderError::upstream(
                    "OpenAI",
                    status.as_u16(),
                    chat::upstream_message(&json, &bytes),
                );
                tracing::error!(account_id = account.id, error = %err, "OpenAI 转写失败");
                return Err(err);
            }
        };

        let usage = json!({"model": TRANSCRIPTION_MODEL, "length": text.len()});
        finish_with_usage(&self.botobase, &account, elapsed, &usage, text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::Method::{GET, POST};
    use httpmock::MockServer;
    use std::io::Write;

    fn openai(server: &MockServer) -> OpenAi {
        let cfg = Config::new("broker-key").with_base_url(server.base_url());
        OpenAi::new(Botobase::new(&cfg).unwrap(), &cfg).with_base_url(server.url("/openai"))
    }

    async fn mock_allocate(server: &MockServer) {
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/accounts/allocate")
                    .query_param("__payload", r#"{"service":"openai","preferredId":null}"#);
                then.status(200).json_body(json!({
                    "result": {"id": 8, "proxy": null, "credential": "sk-oa", "extra": {}}
                }));
            })
            .await;
    }

    #[tokio::test]
    async fn query_reports_model_and_usage() {
        let server = MockServer::start_async().await;
        mock_allocate(&server).await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/openai/v1/chat/completions")
                    .header("authorization", "Bearer sk-oa")
                    .json_body_partial(r#"{"model":"gpt-4o-mini"}"#);
                then.status(200).json_body(json!({
                    "choices": [{"message": {"content": "hello"}}],
                    "usage": {"total_tokens": 9}
                }));
            })
            .await;
        let usage = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/accounts/8/usage")
                    .json_body_partial(
                        r#"{"data":{"model":"gpt-4o-mini","usage":{"total_tokens":9}}}"#,
                    );
                then.status(200).json_body(json!({"result": null}));
            })
            .await;

        let answer = openai(&server).query("hi", None).await.unwrap();
        assert_eq!(answer, "hello");
        usage.assert_async().await;
    }

    #[tokio::test]
    async fn query_uses_requested_model() {
        let server = MockServer::start_async().await;
        mock_allocate(&server).await;
        let completion = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/openai/v1/chat/completions")
                    .json_body_partial(r#"{"model":"gpt-4o"}"#);
                then.status(200)
                    .json_body(json!({"choices": [{"message": {"content": "x"}}]}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/accounts/8/usage");
                then.status(200);
            })
            .await;

        openai(&server).query("hi", Some("gpt-4o")).await.unwrap();
        completion.assert_async().await;
    }

    #[tokio::test]
    async fn speech_to_text_uploads_file_and_reports_length() {
        let server = MockServer::start_async().await;
        mock_allocate(&server).await;
        let transcription = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/openai/v1/audio/transcriptions")
                    .header("authorization", "Bearer sk-oa")
                    .body_contains("whisper-1");
                then.status(200).json_body(json!({"text": "hello world"}));
            })
            .await;
        let usage = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/accounts/8/usage")
                    .json_body_partial(r#"{"data":{"model":"whisper-1","length":11}}"#);
                then.status(200);
            })
            .await;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"RIFF....WAVE").unwrap();

        let text = openai(&server).speech_to_text(file.path()).await.unwrap();
        assert_eq!(text, "hello world");
        transcription.assert_async().await;
        usage.assert_async().await;
    }

    #[tokio::test]
    async fn missing_audio_file_does_not_allocate() {
        let server = MockServer::start_async().await;
        let allocate = server
            .mock_async(|when, then| {
                when.method(GET).path("/accounts/allocate");
                then.status(200);
            })
            .await;

        let err = openai(&server)
            .speech_to_text("/definitely/not/here.wav")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Io(_)));
        allocate.assert_hits_async(0).await;
    }
}
