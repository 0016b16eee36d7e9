use uuid::Uuid;

/// 每次 broker 往返的关联 id：写进 tracing span，同时作为 `X-Request-Id` 发送。
pub fn request_id() -> String {
    format!("bb-{}", Uuid::new_v4().simple())
}
