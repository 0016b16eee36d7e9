//! 下游服务适配器：向 broker 借账号 -> 经账号的代理/凭证调用下游 -> 上报用量。
//!
//! 每个适配器在构造时显式拿到一个 [`Botobase`] 句柄，不使用全局单例。

mod chat;
pub mod deepseek;
pub mod mathpix;
pub mod openai;

pub use deepseek::DeepSeek;
pub use mathpix::Mathpix;
pub use openai::OpenAi;

use crate::broker::Botobase;
use crate::config::Config;
use crate::error::BrokerError;
use crate::logging::LogLevel;
use crate::model::Account;
use reqwest::Url;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// 分配账号失败（或其他 broker 错误）。
    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error("下游请求失败: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} 返回错误 {status}: {message}")]
    Upstream {
        provider: &'static str,
        status: u16,
        message: String,
    },

    #[error("账号缺少必要字段: {0}")]
    InvalidAccount(String),

    #[error("读取本地文件失败: {0}")]
    Io(#[from] std::io::Error),

    /// 下游已经成功返回，只有用量上报失败。`output` 是已经拿到的结果。
    #[error("用量上报失败（下游结果已获取）: {source}")]
    UsageReport {
        output: String,
        #[source]
        source: BrokerError,
    },
}

impl ProviderError {
    /// 用量上报失败时取回下游结果；其他错误原样返回。
    pub fn recover_output(self) -> Result<String, Self> {
        match self {
            Self::UsageReport { output, source } => {
                tracing::warn!(error = %source, "忽略用量上报失败，继续使用下游结果");
                Ok(output)
            }
            other => Err(other),
        }
    }

    fn upstream(provider: &'static str, status: u16, message: impl Into<String>) -> Self {
        Self::Upstream {
            provider,
            status,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }
}

/// 对话输入：一段文本（作为单条 user 消息），或完整的消息列表。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    Text(String),
    Messages(Vec<Message>),
}

impl Prompt {
    pub fn into_messages(self) -> Vec<Message> {
        match self {
            Self::Text(text) => vec![Message::user(text)],
            Self::Messages(messages) => messages,
        }
    }
}

impl From<&str> for Prompt {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Prompt {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Vec<Message>> for Prompt {
    fn from(messages: Vec<Message>) -> Self {
        Self::Messages(messages)
    }
}

/// 适配器共用的下游连接参数。
#[derive(Debug, Clone)]
struct ProviderSettings {
    base_url: String,
    connect_timeout: Duration,
    timeout: Duration,
    log_level: LogLevel,
}

impl ProviderSettings {
    fn new(base_url: &str, cfg: &Config, timeout: Duration) -> Self {
        Self {
            base_url: base_url.to_string(),
            connect_timeout: cfg.connect_timeout,
            timeout,
            log_level: cfg.log_level(),
        }
    }

    fn url(&self, path: &str) -> Result<Url, ProviderError> {
        let base = if self.base_url.ends_with('/') {
            self.base_url.clone()
        } else {
            format!("{}/", self.base_url)
        };
        Url::parse(&base)
            .and_then(|b| b.join(path))
            .map_err(|e| BrokerError::config(format!("下游地址无效 {base}{path}: {e}")).into())
    }

    /// 每个工作单元用自己账号的代理，因此按账号现建客户端；状态码交给调用方判断。
    fn client_for(
        &self,
        account: &Account,
        default_headers: HeaderMap,
    ) -> Result<reqwest::Client, ProviderError> {
        let mut builder = reqwest::Client::builder()
            .default_headers(default_headers)
            .connect_timeout(self.connect_timeout)
            .timeout(self.timeout);
        if let Some(proxy) = account.proxy_url() {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }
        Ok(builder.build()?)
    }
}

/// 上报用量并交回下游结果；上报失败时把结果塞进 [`ProviderError::UsageReport`]。
async fn finish_with_usage<D>(
    botobase: &Botobase,
    account: &Account,
    elapsed: Duration,
    usage: &D,
    output: String,
) -> Result<String, ProviderError>
where
    D: Serialize + ?Sized,
{
    match botobase.report_elapsed(account, elapsed, usage).await {
        Ok(()) => Ok(output),
        Err(source) => {
            tracing::warn!(account_id = account.id, error = %source, "下游调用已成功，但用量上报失败");
            Err(ProviderError::UsageReport { output, source })
        }
    }
}
