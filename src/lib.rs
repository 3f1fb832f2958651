pub mod broadcast;
pub mod client;
pub mod config;
pub mod error;
pub mod framing;
pub mod server;

pub use crate::config::RelayConfig;
pub use crate::server::Server;
