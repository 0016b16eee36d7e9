use crate::broker::envelope;
use crate::broker::transport::Transport;
use crate::config::Config;
use crate::error::BrokerError;
use crate::model::{Account, NewUser, Service, UserUpdate};
use crate::util::id;
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::Instrument;

const ALLOCATE_PATH: &str = "accounts/allocate";
const USERS_PATH: &str = "/bots/users";

/// broker 客户端：分配账号、上报用量、登记用户。
///
/// 不缓存账号、不重试、不持锁；每次调用恰好发出一个请求。需要共享时直接 clone
/// （或包一层 `Arc`）注入给各个下游适配器。
#[derive(Debug, Clone)]
pub struct Botobase {
    transport: Transport,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AllocateParams {
    service: Service,
    /// 没有偏好时编码为 `null`，不省略。
    preferred_id: Option<i64>,
}

#[derive(Debug, Serialize)]
struct UsageParams<'a, D: ?Sized> {
    time: f64,
    data: &'a D,
}

impl Botobase {
    pub fn new(cfg: &Config) -> Result<Self, BrokerError> {
        Ok(Self {
            transport: Transport::new(cfg)?,
        })
    }

    pub fn from_env() -> Result<Self, BrokerError> {
        Self::new(&Config::load()?)
    }

    /// 向 broker 申请一个 `service` 的账号。`preferred_id` 只是提示，broker 可以忽略。
    ///
    /// 失败直接返回给调用方：账号池耗尽等信号不能被本地重试掩盖。
    pub async fn allocate_account(
        &self,
        service: Service,
        preferred_id: Option<i64>,
    ) -> Result<Account, BrokerError> {
        let params = AllocateParams {
            service,
            preferred_id,
        };
        let result = match self.request(Method::GET, ALLOCATE_PATH, &params).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(%service, ?preferred_id, error = %e, "分配账号失败");
                return Err(e);
            }
        };
        if result.is_null() {
            return Err(BrokerError::decode("accounts/allocate 没有返回账号"));
        }

        let account: Account = serde_json::from_value(result)
            .map_err(|e| BrokerError::decode(format!("账号结构不符合预期: {e}")))?;
        tracing::debug!(
            %service,
            account_id = account.id,
            proxied = account.proxy.is_some(),
            "账号分配成功"
        );
        Ok(account)
    }

    /// 上报一次用量。不做幂等/去重：调用两次就是两条计费记录。
    pub async fn report_usage<D>(
        &self,
        account: &Account,
        elapsed_seconds: f64,
        data: &D,
    ) -> Result<(), BrokerError>
    where
        D: Serialize + ?Sized,
    {
        if !elapsed_seconds.is_finite() || elapsed_seconds < 0.0 {
            return Err(BrokerError::Encode(format!(
                "耗时必须是非负有限数，实际为 {elapsed_seconds}"
            )));
        }
        let path = format!("accounts/{}/usage", account.id);
        let params = UsageParams {
            time: elapsed_seconds,
            data,
        };
        self.request(Method::POST, &path, &params)
            .await
            .inspect_err(|e| {
                tracing::warn!(account_id = account.id, error = %e, "上报用量失败");
            })?;
        Ok(())
    }

    pub async fn report_elapsed<D>(
        &self,
        account: &Account,
        elapsed: Duration,
        data: &D,
    ) -> Result<(), BrokerError>
    where
        D: Serialize + ?Sized,
    {
        self.report_usage(account, elapsed.as_secs_f64(), data).await
    }

    pub async fn add_user(&self, user: &NewUser) -> Result<(), BrokerError> {
        self.request(Method::POST, USERS_PATH, &user.to_params())
            .await?;
        Ok(())
    }

    pub async fn update_user(&self, update: &UserUpdate) -> Result<(), BrokerError> {
        self.request(Method::PATCH, USERS_PATH, update).await?;
        Ok(())
    }

    /// 通用的 broker 调用：编码参数 -> 发送 -> 解码信封。成功时返回 `result`（可能为 `null`）。
    pub async fn request<P>(&self, method: Method, path: &str, params: &P) -> Result<Value, BrokerError>
    where
        P: Serialize + ?Sized,
    {
        let request_id = id::request_id();
        let span = tracing::debug_span!("broker", %method, path, %request_id);
        async {
            let payload = envelope::encode(&method, params)?;
            let resp = self
                .transport
                .send(method.clone(), path, payload, &request_id)
                .await?;
            envelope::decode(resp.status, &resp.body)
        }
        .instrument(span)
        .await
    }
}
