use crate::broker::envelope::{PAYLOAD_PARAM, Payload};
use crate::config::{self, Config};
use crate::error::BrokerError;
use crate::logging::{self, LogLevel};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Method, Url};
use std::time::{Duration, Instant};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// broker 的原始响应：状态码不在这里判断，交给信封解码。
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// 一次调用 = 一次 HTTP 请求：不重试；4xx/5xx 不当作错误。
///
/// 内部的 `reqwest::Client` 自带连接池，clone 开销很小，可在多个任务间并发复用。
#[derive(Debug, Clone)]
pub struct Transport {
    http: reqwest::Client,
    base_url: Url,
    log_level: LogLevel,
}

impl Transport {
    pub fn new(cfg: &Config) -> Result<Self, BrokerError> {
        cfg.validate()?;
        let base_url = Url::parse(&config::normalize_base_url(&cfg.base_url))
            .map_err(|e| BrokerError::config(format!("base_url 无效: {e}")))?;

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", cfg.api_key.trim()))
            .map_err(|_| BrokerError::config("API key 含有非法字符"))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(concat!("botobase-rust/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(cfg.connect_timeout)
            .timeout(cfg.timeout)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| BrokerError::config(format!("初始化 HTTP 客户端失败: {e}")))?;

        Ok(Self {
            http,
            base_url,
            log_level: cfg.log_level(),
        })
    }

    /// `accounts/allocate` 这类相对路径挂在 base_url 下；`/bots/users` 这类绝对路径从主机根开始。
    pub fn url(&self, path: &str) -> Result<Url, BrokerError> {
        self.base_url
            .join(path)
            .map_err(|e| BrokerError::config(format!("无法拼接路径 {path:?}: {e}")))
    }

    pub async fn send(
        &self,
        method: Method,
        path: &str,
        payload: Payload,
        request_id: &str,
    ) -> Result<RawResponse, BrokerError> {
        let mut url = self.url(path)?;
        logging::broker_request(self.log_level, method.as_str(), url.as_str(), payload.body());

        let builder = match payload {
            Payload::Query(json) => {
                url.query_pairs_mut().append_pair(PAYLOAD_PARAM, &json);
                self.http.request(method, url)
            }
            Payload::Json(body) => self
                .http
                .request(method, url)
                .header(CONTENT_TYPE, "application/json")
                .body(body),
        };

        let start = Instant::now();
        let resp = builder
            .header(REQUEST_ID_HEADER, request_id)
            .send()
            .await?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await?.to_vec();

        logging::broker_response(self.log_level, status, start.elapsed(), &body);
        tracing::debug!(
            status,
            elapsed_ms = logging::format_duration_ms(start.elapsed()),
            "broker 响应"
        );

        Ok(RawResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(base: &str) -> Transport {
        Transport::new(&Config::new("k").with_base_url(base)).unwrap()
    }

    #[test]
    fn relative_paths_stay_under_base() {
        let t = transport("https://example.com/api");
        assert_eq!(
            t.url("accounts/allocate").unwrap().as_str(),
            "https://example.com/api/accounts/allocate"
        );
        assert_eq!(
            t.url("accounts/42/usage").unwrap().as_str(),
            "https://example.com/api/accounts/42/usage"
        );
    }

    #[test]
    fn absolute_paths_start_at_host_root() {
        let t = transport("https://example.com/api/");
        assert_eq!(
            t.url("/bots/users").unwrap().as_str(),
            "https://example.com/bots/users"
        );
    }

    #[test]
    fn struct_literal_base_url_keeps_its_last_segment() {
        let cfg = Config {
            base_url: "https://example.com/api".to_string(),
            ..Config::new("k")
        };
        let t = Transport::new(&cfg).unwrap();
        assert_eq!(
            t.url("accounts/allocate").unwrap().as_str(),
            "https://example.com/api/accounts/allocate"
        );
    }

    #[test]
    fn timeouts_above_ceiling_are_rejected() {
        let cfg = Config::new("k").with_timeouts(Duration::from_secs(60), Duration::from_secs(600));
        assert!(matches!(Transport::new(&cfg), Err(BrokerError::Config(_))));
    }

    #[test]
    fn empty_api_key_is_rejected() {
        let err = Transport::new(&Config::new("  ")).unwrap_err();
        assert!(matches!(err, BrokerError::Config(_)));
    }

    #[test]
    fn api_key_with_newline_is_rejected() {
        let err = Transport::new(&Config::new("abc\ndef")).unwrap_err();
        assert!(matches!(err, BrokerError::Config(_)));
    }
}
