//! Botobase 客户端：从中心 broker 借用共享的第三方 API 账号（凭证 + 代理），
//! 调用完成后回报用量，由 broker 统一做限流、轮换与计费。

pub mod broker;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod provider;
pub mod util;

pub use broker::Botobase;
pub use config::Config;
pub use error::BrokerError;
pub use model::{Account, Gender, NewUser, Proxy, Service, UserUpdate, WireEnum};
pub use provider::{DeepSeek, Mathpix, Message, OpenAi, Prompt, ProviderError};
