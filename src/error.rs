use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrokerError {
    /// 连接/超时等在拿到 HTTP 响应之前发生的失败。
    #[error("broker 请求失败: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API: {0}")]
    Remote(String),

    #[error("API: Unexpected error {status}: {snippet}")]
    UnexpectedStatus { status: u16, snippet: String },

    #[error("未知的 {kind} 取值: {value:?}")]
    UnknownEnumValue { kind: &'static str, value: String },

    #[error("解析 broker 响应失败: {0}")]
    Decode(String),

    #[error("编码请求参数失败: {0}")]
    Encode(String),

    #[error("配置错误: {0}")]
    Config(String),
}

impl BrokerError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    pub fn unknown_enum_value(kind: &'static str, value: impl Into<String>) -> Self {
        Self::UnknownEnumValue {
            kind,
            value: value.into(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::UnexpectedStatus { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unexpected_status_exposes_code() {
        let err = BrokerError::UnexpectedStatus {
            status: 503,
            snippet: "down".to_string(),
        };
        assert_eq!(err.status(), Some(503));
        assert!(!err.is_remote());
        assert_eq!(err.to_string(), "API: Unexpected error 503: down");
    }

    #[test]
    fn remote_error_has_no_status() {
        let err = BrokerError::Remote("quota exceeded".to_string());
        assert!(err.is_remote());
        assert_eq!(err.status(), None);
        assert_eq!(err.to_string(), "API: quota exceeded");
    }
}
