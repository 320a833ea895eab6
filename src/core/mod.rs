pub mod assets;
pub mod auth;
pub mod client;
pub mod network;

pub use crate::domain::ports::{CoreAuth, Storage};
pub use crate::utils::error::Result;
pub use assets::GameAssets;
pub use client::Client;
pub use network::{ApiRequest, NetworkSession, VersionConfig};
