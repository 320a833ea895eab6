//! Yostar accounts (en, jp, kr).
//!
//! A permanent token is obtained by email code: request a code, submit it
//! for a Yostar uid and token, then exchange those for a channel uid and
//! token. Guest accounts only need a device id, but must bind a nickname
//! before they can make any other request.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use super::session::ChannelCredentials;
use super::single::{string_field, Auth};
use crate::core::network::{ApiRequest, NetworkSession};
use crate::domain::ports::CoreAuth;
use crate::domain::server::{ArknightsDistributor, ArknightsServer};
use crate::utils::error::{ArkError, Result};

pub const DEFAULT_GUEST_NICKNAME: &str = "Doctor";

pub struct YostarAuth {
    auth: Auth,
    server: ArknightsServer,
}

impl YostarAuth {
    pub fn new(server: ArknightsServer, network: Arc<NetworkSession>) -> Result<Self> {
        if server.distributor() != ArknightsDistributor::Yostar {
            return Err(ArkError::UnsupportedServer {
                server: server.to_string(),
                reason: "Yostar login is only available on en, jp and kr".to_string(),
            });
        }
        Ok(Self {
            auth: Auth::new(server, network),
            server,
        })
    }

    pub fn auth(&self) -> &Auth {
        &self.auth
    }

    pub fn into_auth(self) -> Auth {
        self.auth
    }

    /// Ask Yostar to email a login code.
    pub async fn request_email_code(&self, email: &str) -> Result<()> {
        tracing::debug!("Sending code to {}", email);
        let body = json!({"platform": "android", "account": email, "authlang": "en"});
        self.auth
            .request_passport("account/yostar_auth_request", body)
            .await?;
        Ok(())
    }

    async fn submit_yostar_auth(&self, email: &str, code: &str) -> Result<(String, String)> {
        let body = json!({"account": email, "code": code});
        let data = self
            .auth
            .request_passport("account/yostar_auth_submit", body)
            .await?;
        Ok((
            string_field(&data, "yostar_uid")?,
            string_field(&data, "yostar_token")?,
        ))
    }

    async fn get_yostar_token(
        &self,
        email: &str,
        yostar_uid: &str,
        yostar_token: &str,
    ) -> Result<ChannelCredentials> {
        let body = json!({
            "yostar_username": email,
            "yostar_uid": yostar_uid,
            "yostar_token": yostar_token,
            "deviceId": self.auth.device_ids().device_id,
            "createNew": "0",
        });
        let data = self
            .auth
            .request_passport("user/yostar_createlogin", body)
            .await?;
        Ok(ChannelCredentials::new(
            self.server,
            string_field(&data, "uid")?,
            string_field(&data, "token")?,
        ))
    }

    /// Turn an emailed code into a permanent channel uid and token.
    pub async fn get_token_from_email_code(
        &self,
        email: &str,
        code: &str,
    ) -> Result<ChannelCredentials> {
        let (yostar_uid, yostar_token) = self.submit_yostar_auth(email, code).await?;
        self.get_yostar_token(email, &yostar_uid, &yostar_token).await
    }

    pub async fn login_with_email_code(
        &self,
        email: &str,
        code: &str,
    ) -> Result<ChannelCredentials> {
        let credentials = self.get_token_from_email_code(email, code).await?;
        self.login_with_token(&credentials.channel_uid, &credentials.token)
            .await?;
        Ok(credentials)
    }

    pub async fn login_with_token(&self, channel_uid: &str, yostar_token: &str) -> Result<()> {
        self.auth.login_with_token(channel_uid, yostar_token).await
    }

    pub async fn create_guest_account(&self) -> Result<ChannelCredentials> {
        let body = json!({"deviceId": self.auth.device_ids().device_id});
        let data = self.auth.request_passport("user/create", body).await?;
        let credentials = ChannelCredentials::new(
            self.server,
            string_field(&data, "uid")?,
            string_field(&data, "token")?,
        );
        tracing::debug!("Created guest account {}", credentials.channel_uid);
        Ok(credentials)
    }

    /// Required once for new accounts.
    pub async fn bind_nickname(&self, nickname: &str) -> Result<()> {
        tracing::debug!("Binding nickname {:?}", nickname);
        self.auth
            .auth_request(
                ApiRequest::new("user/bindNickName").json(json!({"nickName": nickname})),
                None,
            )
            .await?;
        Ok(())
    }

    /// Create a guest account, log in and bind a nickname.
    pub async fn login_as_guest(&self, nickname: Option<&str>) -> Result<ChannelCredentials> {
        let credentials = self.create_guest_account().await?;
        self.login_with_token(&credentials.channel_uid, &credentials.token)
            .await?;
        self.bind_nickname(nickname.unwrap_or(DEFAULT_GUEST_NICKNAME))
            .await?;
        Ok(credentials)
    }
}

#[async_trait]
impl CoreAuth for YostarAuth {
    fn network(&self) -> &Arc<NetworkSession> {
        self.auth.network()
    }

    fn server(&self) -> Option<ArknightsServer> {
        Some(self.server)
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
