use super::{Prompt, ProviderError, ProviderSettings, chat, finish_with_usage};
use crate::broker::Botobase;
use crate::config::Config;
use crate::model::Service;

pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com/";
const DEEPSEEK_MODEL: &str = "deepseek-chat";

#[derive(Debug, Clone)]
pub struct DeepSeek {
    botobase: Botobase,
    settings: ProviderSettings,
}

impl DeepSeek {
    pub fn new(botobase: Botobase, cfg: &Config) -> Self {
        Self {
            botobase,
            settings: ProviderSettings::new(DEEPSEEK_BASE_URL, cfg, cfg.provider_timeout),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.settings.base_url = base_url.into();
        self
    }

    /// 单轮对话补全。`preferred_account_id` 用于尽量复用同一个账号（broker 可以不采纳）。
    pub async fn query(
        &self,
        prompt: impl Into<Prompt>,
        preferred_account_id: Option<i64>,
    ) -> Result<String, ProviderError> {
        let messages = prompt.into().into_messages();
        let account = self
            .botobase
            .allocate_account(Service::DeepSeek, preferred_account_id)
            .await?;

        let outcome = chat::complete(
            "DeepSeek",
            &self.settings,
            &account,
            DEEPSEEK_MODEL,
            &messages,
        )
        .await
        .inspect_err(|e| tracing::error!(account_id = account.id, error = %e, "DeepSeek 请求失败"))?;

        finish_with_usage(
            &self.botobase,
            &account,
            outcome.elapsed,
            &outcome.usage,
            outcome.content,
        )
        .await
    }
}
