//! broker 协议：信封编解码、单次请求的传输层，以及账号分配/用量上报客户端。

pub mod client;
pub mod envelope;
pub mod transport;

pub use client::Botobase;
pub use envelope::Payload;
pub use transport::{RawResponse, Transport};
