pub mod client_config;

pub use client_config::{AssetsConfig, ClientConfig, GuestConfig, NetworkConfig};
pub use crate::utils::logger::{LogFormat, LoggingConfig};
