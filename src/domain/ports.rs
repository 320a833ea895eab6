use crate::core::network::{ApiRequest, NetworkSession};
use crate::domain::server::ArknightsServer;
use crate::utils::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::SystemTime;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    /// Last modification time, `None` if the file does not exist.
    fn modified(
        &self,
        path: &str,
    ) -> impl std::future::Future<Output = Result<Option<SystemTime>>> + Send;
}

/// Anything able to send authenticated requests to the game server.
#[async_trait]
pub trait CoreAuth: Send + Sync {
    fn network(&self) -> &Arc<NetworkSession>;

    /// Server the auth is bound to, if any.
    fn server(&self) -> Option<ArknightsServer> {
        None
    }

    /// Whether requests act on a real player's account.
    fn is_private(&self) -> bool {
        false
    }

    async fn auth_request(
        &self,
        request: ApiRequest,
        server: Option<ArknightsServer>,
    ) -> Result<Value>;
}
