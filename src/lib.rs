//! Client library for the Arknights game servers.
//!
//! Covers login on every regional backend, private account data, public
//! player profiles, and optional static game data for annotating records.

pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use crate::adapters::LocalStorage;
pub use crate::config::ClientConfig;
pub use crate::core::auth::{
    Auth, AuthSession, BilibiliAuth, ChannelCredentials, GuestAuth, GuestCache, HypergryphAuth,
    YostarAuth,
};
pub use crate::core::{ApiRequest, Client, GameAssets, NetworkSession};
pub use crate::domain::model;
pub use crate::domain::ports::{CoreAuth, Storage};
pub use crate::domain::server::{ArknightsDistributor, ArknightsDomain, ArknightsServer};
pub use crate::utils::error::{ArkError, Result};
