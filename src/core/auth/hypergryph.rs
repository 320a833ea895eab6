//! Hypergryph accounts (cn).
//!
//! The plain username and password are exchanged for an access token, and
//! the access token for a channel uid. Both requests are u8-signed.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use super::session::ChannelCredentials;
use super::sign::signed;
use super::single::{string_field, Auth};
use crate::core::network::{ApiRequest, NetworkSession};
use crate::domain::ports::CoreAuth;
use crate::domain::server::{ArknightsDomain, ArknightsServer};
use crate::utils::error::Result;

pub struct HypergryphAuth {
    auth: Auth,
}

impl HypergryphAuth {
    pub fn new(network: Arc<NetworkSession>) -> Self {
        Self {
            auth: Auth::new(ArknightsServer::Cn, network),
        }
    }

    pub fn auth(&self) -> &Auth {
        &self.auth
    }

    pub fn into_auth(self) -> Auth {
        self.auth
    }

    async fn get_access_token(&self, username: &str, password: &str) -> Result<String> {
        let mut body = Map::new();
        body.insert("account".into(), json!(username));
        body.insert("password".into(), json!(password));
        body.insert("deviceId".into(), json!(self.auth.device_ids().device_id));
        body.insert("platform".into(), json!(1));

        let data = self
            .auth
            .request(
                ArknightsDomain::As,
                ApiRequest::new("user/login").json(signed(body)?),
                None,
            )
            .await?;
        string_field(&data, "token")
    }

    async fn get_channel_uid(&self, access_token: &str) -> Result<String> {
        let mut body = Map::new();
        body.insert("token".into(), json!(access_token));

        let data = self
            .auth
            .request(
                ArknightsDomain::As,
                ApiRequest::new("user/auth").json(signed(body)?),
                None,
            )
            .await?;
        string_field(&data, "uid")
    }

    pub async fn get_token_from_password(
        &self,
        username: &str,
        password: &str,
    ) -> Result<ChannelCredentials> {
        let access_token = self.get_access_token(username, password).await?;
        let channel_uid = self.get_channel_uid(&access_token).await?;
        Ok(ChannelCredentials::new(
            ArknightsServer::Cn,
            channel_uid,
            access_token,
        ))
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<ChannelCredentials> {
        let credentials = self.get_token_from_password(username, password).await?;
        self.login_with_token(&credentials.channel_uid, &credentials.token)
            .await?;
        Ok(credentials)
    }

    pub async fn login_with_token(&self, channel_uid: &str, access_token: &str) -> Result<()> {
        self.auth.login_with_token(channel_uid, access_token).await
    }
}

#[async_trait]
impl CoreAuth for HypergryphAuth {
    fn network(&self) -> &Arc<NetworkSession> {
        self.auth.network()
    }

    fn server(&self) -> Option<ArknightsServer> {
        Some(ArknightsServer::Cn)
    }

    fn is_private(&self) -> bool {
        true
    }

    async fn auth_request(
        &self,
        request: ApiRequest,
        server: Option<ArknightsServer>,
    ) -> Result<Value> {
        self.auth.auth_request(request, server).await
    }
}
