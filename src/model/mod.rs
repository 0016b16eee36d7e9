mod account;
mod service;
mod user;
pub(crate) mod wire_enum;

pub use account::{Account, Proxy};
pub use service::Service;
pub use user::{Gender, NewUser, UserUpdate};
pub use wire_enum::WireEnum;
