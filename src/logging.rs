use crate::config::Config;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// 请求/响应日志等级：
/// - off：只输出事件（分配成功、上报失败等），不输出报文
/// - low：额外输出 broker 请求/响应报文（截断）
/// - medium：再加上下游服务的请求/响应报文（截断）
/// - high：报文不截断
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Off = 0,
    Low = 1,
    Medium = 2,
    High = 3,
}

impl LogLevel {
    pub fn parse(debug: &str) -> Self {
        match debug.trim().to_lowercase().as_str() {
            "low" | "broker" => Self::Low,
            "medium" | "provider" => Self::Medium,
            "high" | "all" | "raw" => Self::High,
            _ => Self::Off,
        }
    }

    pub fn broker_enabled(self) -> bool {
        self >= Self::Low
    }

    pub fn provider_enabled(self) -> bool {
        self >= Self::Medium
    }

    pub fn raw_enabled(self) -> bool {
        self >= Self::High
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        }
    }
}

/// 安装全局 subscriber。库本身只产生 tracing 事件，装不装、装成什么样由调用方决定。
pub fn init_tracing(cfg: &Config) {
    // 默认把依赖库压到 warn，本 crate 至少 info；RUST_LOG 未提到本 crate 时补上。
    let env = std::env::var("RUST_LOG").unwrap_or_default();
    let env = env.trim();
    let filter = if env.is_empty() {
        let own = if cfg.log_level() == LogLevel::Off {
            "info"
        } else {
            "debug"
        };
        EnvFilter::new(format!("warn,botobase={own}"))
    } else if env.contains("botobase") {
        EnvFilter::new(env)
    } else {
        EnvFilter::new(format!("{env},botobase=info"))
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr);

    let _ = match cfg.log_format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };
}

pub fn format_duration_ms(d: Duration) -> i64 {
    d.as_millis().min(i64::MAX as u128) as i64
}

pub fn broker_request(level: LogLevel, method: &str, url: &str, body: Option<&[u8]>) {
    if !level.broker_enabled() {
        return;
    }
    tracing::debug!(
        "\n====================== broker 请求 ======================\n{method} {url}\nAuthorization: Bearer ***\n{}\n==========================================================",
        format_body(level, body.unwrap_or_default())
    );
}

pub fn broker_response(level: LogLevel, status: u16, duration: Duration, body: &[u8]) {
    if !level.broker_enabled() {
        return;
    }
    tracing::debug!(
        "\n====================== broker 响应 ======================\n{} {}ms\n{}\n==========================================================",
        status,
        format_duration_ms(duration),
        format_body(level, body)
    );
}

pub fn provider_request(level: LogLevel, method: &str, url: &str, body: &[u8]) {
    if !level.provider_enabled() {
        return;
    }
    tracing::debug!(
        "\n====================== 下游请求 ========================\n{method} {url}\n{}\n==========================================================",
        format_body(level, body)
    );
}

pub fn provider_response(level: LogLevel, status: u16, duration: Duration, body: &[u8]) {
    if !level.provider_enabled() {
        return;
    }
    tracing::debug!(
        "\n====================== 下游响应 ========================\n{} {}ms\n{}\n==========================================================",
        status,
        format_duration_ms(duration),
        format_body(level, body)
    );
}

fn format_body(level: LogLevel, bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return String::new();
    }
    let text = String::from_utf8_lossy(bytes);
    if level.raw_enabled() {
        return text.into_owned();
    }
    match sonic_rs::from_slice::<sonic_rs::Value>(bytes) {
        Ok(v) => truncate_text_for_log(&sonic_rs::to_string_pretty(&v).unwrap_or_else(|_| text.into_owned())),
        Err(_) => truncate_text_for_log(&text),
    }
}

fn truncate_text_for_log(s: &str) -> String {
    const MAX_CHARS: usize = 4 * 1024;
    if s.chars().count() <= MAX_CHARS {
        return s.to_string();
    }
    let mut out: String = s.chars().take(MAX_CHARS).collect();
    out.push_str("...[TRUNCATED]");
    out
}
