use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::session::{AuthSession, ChannelCredentials, DeviceIds, SharedSession};
use super::sign::signed;
use crate::core::network::{ApiRequest, NetworkSession};
use crate::domain::ports::CoreAuth;
use crate::domain::server::{ArknightsDistributor, ArknightsDomain, ArknightsServer};
use crate::utils::error::{ArkError, Result};

/// Authentication client bound to a single session on one server.
///
/// Requests through it act on the logged-in player's own account.
pub struct Auth {
    server: ArknightsServer,
    network: Arc<NetworkSession>,
    device_ids: DeviceIds,
    session: SharedSession,
    credentials: Mutex<Option<ChannelCredentials>>,
    /// Completed logins, used to tell whether an expired session was renewed.
    logins: AtomicU64,
    relogin: Mutex<()>,
}

impl Auth {
    pub fn new(server: ArknightsServer, network: Arc<NetworkSession>) -> Self {
        Self {
            server,
            network,
            device_ids: DeviceIds::random(),
            session: AuthSession::new(server, "", "").shared(),
            credentials: Mutex::new(None),
            logins: AtomicU64::new(0),
            relogin: Mutex::new(()),
        }
    }

    /// Create a client and log in with a channel uid and token.
    pub async fn from_token(
        server: ArknightsServer,
        channel_uid: &str,
        token: &str,
        network: Arc<NetworkSession>,
    ) -> Result<Self> {
        let auth = Self::new(server, network);
        auth.login_with_token(channel_uid, token).await?;
        Ok(auth)
    }

    pub fn device_ids(&self) -> &DeviceIds {
        &self.device_ids
    }

    pub fn session(&self) -> SharedSession {
        Arc::clone(&self.session)
    }

    /// Player uid, empty before login.
    pub async fn uid(&self) -> String {
        self.session.lock().await.uid.clone()
    }

    pub async fn secret(&self) -> String {
        self.session.lock().await.secret.clone()
    }

    pub async fn credentials(&self) -> Option<ChannelCredentials> {
        self.credentials.lock().await.clone()
    }

    fn check_server(&self, server: Option<ArknightsServer>) -> Result<()> {
        match server {
            Some(requested) if requested != self.server => Err(ArkError::ServerMismatch {
                bound: self.server.to_string(),
                requested: requested.to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Unauthenticated request to a domain of the bound server.
    pub async fn request(
        &self,
        domain: ArknightsDomain,
        request: ApiRequest,
        server: Option<ArknightsServer>,
    ) -> Result<Value> {
        self.check_server(server)?;
        self.network.request(domain, request, Some(self.server)).await
    }

    pub(crate) async fn request_passport(&self, endpoint: &str, body: Value) -> Result<Value> {
        let url = self.network.passport_url(self.server)?;
        self.network
            .request_url(&url, ApiRequest::new(endpoint).json(body))
            .await
    }

    /// Exchange a Yostar channel token for a passport access token.
    async fn get_access_token(&self, channel_uid: &str, yostar_token: &str) -> Result<String> {
        let body = json!({
            "platform": "android",
            "uid": channel_uid,
            "token": yostar_token,
            "deviceId": self.device_ids.device_id,
        });
        let data = self.request_passport("user/login", body).await?;
        string_field(&data, "accessToken")
    }

    /// Exchange a channel uid and access token for a player uid and u8 token.
    async fn get_u8_token(&self, channel_uid: &str, access_token: &str) -> Result<(String, String)> {
        tracing::debug!("Getting u8 token for {}", channel_uid);
        let distributor = self.server.distributor();
        let channel_id = distributor
            .channel_id()
            .ok_or_else(|| unsupported(self.server))?;

        let extension = if distributor == ArknightsDistributor::Yostar {
            json!({"uid": channel_uid, "token": access_token})
        } else {
            json!({"uid": channel_uid, "access_token": access_token})
        };

        let mut body = Map::new();
        body.insert("appId".into(), json!("1"));
        body.insert("platform".into(), json!(1));
        body.insert("channelId".into(), json!(channel_id));
        body.insert("subChannel".into(), json!(channel_id));
        body.insert("extension".into(), json!(extension.to_string()));
        body.insert("worldId".into(), json!(channel_id));
        body.insert("deviceId".into(), json!(self.device_ids.device_id));
        body.insert("deviceId2".into(), json!(self.device_ids.device_id2));
        body.insert("deviceId3".into(), json!(self.device_ids.device_id3));

        let data = self
            .request(
                ArknightsDomain::U8,
                ApiRequest::new("user/v1/getToken").json(signed(body)?),
                None,
            )
            .await?;

        Ok((string_field(&data, "uid")?, string_field(&data, "token")?))
    }

    /// Exchange a player uid and u8 token for a session secret.
    async fn get_secret(&self, uid: &str, u8_token: &str) -> Result<String> {
        tracing::debug!("Getting session secret for {}", uid);
        let versions = self.network.versions(self.server).await?;
        let network_version = self
            .server
            .distributor()
            .network_version()
            .ok_or_else(|| unsupported(self.server))?;

        let body = json!({
            "platform": 1,
            "networkVersion": network_version,
            "assetsVersion": versions.res_version,
            "clientVersion": versions.client_version,
            "token": u8_token,
            "uid": uid,
            "deviceId": self.device_ids.device_id,
            "deviceId2": self.device_ids.device_id2,
            "deviceId3": self.device_ids.device_id3,
        });
        let request = ApiRequest::new("account/login")
            .json(body)
            .header("secret", "")
            .header("seqnum", "1")
            .header("uid", uid);

        let data = self.request(ArknightsDomain::Gs, request, None).await?;
        string_field(&data, "secret")
    }

    /// Log in with a channel uid and a distributor token.
    ///
    /// For Yostar servers the token is the Yostar token, for Hypergryph the
    /// access token and for Bilibili the access key.
    pub async fn login_with_token(&self, channel_uid: &str, token: &str) -> Result<()> {
        let access_token = match self.server.distributor() {
            ArknightsDistributor::Yostar => self.get_access_token(channel_uid, token).await?,
            ArknightsDistributor::Hypergryph | ArknightsDistributor::Bilibili => token.to_string(),
            ArknightsDistributor::Longcheng => return Err(unsupported(self.server)),
        };

        let (uid, u8_token) = self.get_u8_token(channel_uid, &access_token).await?;
        let secret = self.get_secret(&uid, &u8_token).await?;

        {
            // seqnum keeps counting across logins
            let mut session = self.session.lock().await;
            session.uid = uid.clone();
            session.secret = secret;
            self.logins.fetch_add(1, Ordering::SeqCst);
        }
        *self.credentials.lock().await =
            Some(ChannelCredentials::new(self.server, channel_uid, token));

        tracing::info!("🔐 Logged in with UID {} on {}", uid, self.server);
        Ok(())
    }

    /// Send with the current session. Also returns the login the request was
    /// sent under.
    async fn send(&self, mut request: ApiRequest) -> (u64, Result<Value>) {
        let mut session = self.session.lock().await;
        let login = self.logins.load(Ordering::SeqCst);
        if !session.is_logged_in() {
            return (login, Err(ArkError::NotLoggedIn));
        }

        let headers = session.next_headers();
        tracing::debug!(
            "[UID: {}] Sending request #{} to {}",
            session.uid,
            session.seqnum,
            request.endpoint.as_deref().unwrap_or_default()
        );
        request.headers.extend(headers);

        let result = self
            .network
            .request(ArknightsDomain::Gs, request, Some(self.server))
            .await;
        (login, result)
    }

    /// Log in again unless another request already did since `expired_login`.
    async fn renew_session(&self, expired_login: u64, credentials: &ChannelCredentials) -> Result<()> {
        let _relogin = self.relogin.lock().await;
        if self.logins.load(Ordering::SeqCst) != expired_login {
            tracing::debug!("Session on {} was already renewed", self.server);
            return Ok(());
        }

        tracing::warn!("Session expired on {}, logging in again", self.server);
        self.login_with_token(&credentials.channel_uid, &credentials.token)
            .await
    }
}

#[async_trait]
impl CoreAuth for Auth {
    fn network(&self) -> &Arc<NetworkSession> {
        &self.network
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
        self.check_server(server)?;

        let (login, result) = self.send(request.clone()).await;
        match result {
            Err(e) if e.is_session_expired() => {
                let Some(credentials) = self.credentials().await else {
                    return Err(e);
                };
                self.renew_session(login, &credentials).await?;
                self.send(request).await.1
            }
            other => other,
        }
    }
}

fn unsupported(server: ArknightsServer) -> ArkError {
    ArkError::UnsupportedServer {
        server: server.to_string(),
        reason: "login channel is unknown".to_string(),
    }
}

pub(crate) fn string_field(data: &Value, name: &str) -> Result<String> {
    match data.get(name) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(ArkError::unexpected(format!("response is missing {name}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network() -> Arc<NetworkSession> {
        Arc::new(NetworkSession::new(Some(ArknightsServer::En)).unwrap())
    }

    #[tokio::test]
    async fn test_auth_request_requires_login() {
        let auth = Auth::new(ArknightsServer::En, network());
        let err = auth
            .auth_request(ApiRequest::new("account/syncData"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ArkError::NotLoggedIn));
    }

    #[tokio::test]
    async fn test_auth_request_rejects_other_server() {
        let auth = Auth::new(ArknightsServer::En, network());
        let err = auth
            .auth_request(ApiRequest::new("x"), Some(ArknightsServer::Jp))
            .await
            .unwrap_err();
        assert!(matches!(err, ArkError::ServerMismatch { .. }));
    }

    #[tokio::test]
    async fn test_taiwan_login_is_unsupported() {
        let err = Auth::from_token(ArknightsServer::Tw, "1", "t", network())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ArkError::UnsupportedServer { .. }));
    }

    #[test]
    fn test_string_field_accepts_numbers() {
        let data = serde_json::json!({"uid": 123, "token": "abc"});
        assert_eq!(string_field(&data, "uid").unwrap(), "123");
        assert_eq!(string_field(&data, "token").unwrap(), "abc");
        assert!(string_field(&data, "secret").is_err());
    }
}
