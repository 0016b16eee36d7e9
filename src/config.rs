use crate::error::BrokerError;
use crate::logging::{LogFormat, LogLevel};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.botobase.com/";
const DEFAULT_CONFIG_FILE: &str = "botobase.toml";
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_PROVIDER_TIMEOUT_MS: u64 = 300_000;
/// broker 请求的超时只能调小，不能超过默认值。
pub const MAX_CONNECT_TIMEOUT: Duration = Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS);
pub const MAX_TIMEOUT: Duration = Duration::from_millis(DEFAULT_TIMEOUT_MS);

#[derive(Debug, Clone)]
pub struct Config {
    /// broker 的 API key，只用于 broker 请求的 `Authorization` 头。
    pub api_key: String,
    pub base_url: String,

    pub connect_timeout: Duration,
    /// broker 请求的整体超时。
    pub timeout: Duration,
    /// 下游服务请求的整体超时（对话补全/转写可能很慢）。
    pub provider_timeout: Duration,

    pub debug: String,
    pub log_format: LogFormat,
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    api_key: Option<String>,
    base_url: Option<String>,
    connect_timeout_ms: Option<u64>,
    timeout_ms: Option<u64>,
    provider_timeout_ms: Option<u64>,
    debug: Option<String>,
    log_format: Option<String>,
}

impl Config {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            provider_timeout: Duration::from_millis(DEFAULT_PROVIDER_TIMEOUT_MS),
            debug: "off".to_string(),
            log_format: LogFormat::Text,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = normalize_base_url(&base_url.into());
        self
    }

    pub fn with_timeouts(mut self, connect: Duration, total: Duration) -> Self {
        self.connect_timeout = connect;
        self.timeout = total;
        self
    }

    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    pub fn with_debug(mut self, debug: impl Into<String>) -> Self {
        self.debug = debug.into();
        self
    }

    /// 依次合并：默认值 -> `botobase.toml`（可用 `BOTOBASE_CONFIG` 指定路径）-> `BOTOBASE_*` 环境变量。
    pub fn load() -> Result<Self, BrokerError> {
        let path = std::env::var("BOTOBASE_CONFIG")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());

        let figment = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("BOTOBASE_").ignore(&["config"]));
        let mut cfg = Self::from_figment(figment)?;

        // 命令行覆盖：-debug <level>
        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            if arg == "-debug"
                && let Some(v) = args.next()
            {
                cfg.debug = v;
            }
        }

        Ok(cfg)
    }

    pub fn from_figment(figment: Figment) -> Result<Self, BrokerError> {
        let raw = figment
            .extract::<RawConfig>()
            .map_err(|e| BrokerError::config(format!("读取配置失败: {e}")))?;

        let mut cfg = Self::new(raw.api_key.unwrap_or_default());
        if let Some(url) = raw.base_url.filter(|u| !u.trim().is_empty()) {
            cfg.base_url = normalize_base_url(&url);
        }
        cfg.connect_timeout =
            Duration::from_millis(raw.connect_timeout_ms.unwrap_or(DEFAULT_CONNECT_TIMEOUT_MS));
        cfg.timeout = Duration::from_millis(raw.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS));
        cfg.provider_timeout =
            Duration::from_millis(raw.provider_timeout_ms.unwrap_or(DEFAULT_PROVIDER_TIMEOUT_MS));
        if let Some(debug) = raw.debug {
            cfg.debug = debug;
        }
        cfg.log_format = LogFormat::parse(raw.log_format.as_deref().unwrap_or_default());

        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), BrokerError> {
        if self.api_key.trim().is_empty() {
            return Err(BrokerError::config("缺少 API key（BOTOBASE_API_KEY）"));
        }
        let url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| BrokerError::config(format!("base_url 无效 {:?}: {e}", self.base_url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(BrokerError::config(format!(
                "base_url 只支持 http/https: {}",
                self.base_url
            )));
        }
        if self.timeout.is_zero() || self.connect_timeout.is_zero() {
            return Err(BrokerError::config("超时时间必须大于 0"));
        }
        if self.connect_timeout > MAX_CONNECT_TIMEOUT || self.timeout > MAX_TIMEOUT {
            return Err(BrokerError::config(format!(
                "broker 超时不能超过 连接 {}s / 整体 {}s，实际为 {:?} / {:?}",
                MAX_CONNECT_TIMEOUT.as_secs(),
                MAX_TIMEOUT.as_secs(),
                self.connect_timeout,
                self.timeout
            )));
        }
        Ok(())
    }

    pub fn log_level(&self) -> LogLevel {
        LogLevel::parse(&self.debug)
    }
}

/// 保证以 `/` 结尾，否则相对路径会替换掉 base 的最后一段。
pub(crate) fn normalize_base_url(url: &str) -> String {
    let url = url.trim();
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{url}/")
    }
}
