//! Bilibili accounts (bili).
//!
//! The bilibili SDK center hands out an RSA key and a password prefix. The
//! prefixed password is encrypted with that key and exchanged for an access
//! key, which then logs in like any other channel token. SDK bodies are
//! form-encoded and MD5-signed.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use md5::{Digest, Md5};
use rand::Rng;
use rsa::pkcs8::DecodePublicKey;
use rsa::rand_core::OsRng;
use rsa::{Pkcs1v15Encrypt, RsaPublicKey};
use serde_json::Value;
use std::sync::Arc;

use super::session::ChannelCredentials;
use super::single::{string_field, Auth};
use crate::core::network::{ApiRequest, NetworkSession};
use crate::domain::ports::CoreAuth;
use crate::domain::server::ArknightsServer;
use crate::utils::error::{ArkError, Result};

pub const BILIBILI_SDK_URL: &str = "https://line1-sdk-center-login-sh.biligame.net";

const BODY_SIGN_SALT: &str = "8783abfb533544c59e598cddc933d1bf";
const BD_ID_GROUPS: [usize; 10] = [8, 4, 4, 4, 12, 8, 4, 4, 4, 3];

/// Sign an SDK body: MD5 over the key-sorted values and a fixed salt.
pub fn sign_body(body: &[(String, String)]) -> String {
    let mut pairs: Vec<&(String, String)> = body.iter().collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    let mut hasher = Md5::new();
    for (_, value) in pairs {
        hasher.update(value.as_bytes());
    }
    hasher.update(BODY_SIGN_SALT.as_bytes());

    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

/// Random device fingerprint in the SDK's dashed hex layout.
pub fn random_bd_id() -> String {
    let mut rng = rand::rng();
    BD_ID_GROUPS
        .iter()
        .map(|&len| {
            (0..len)
                .map(|_| char::from_digit(rng.random_range(0..16u32), 16).unwrap_or('0'))
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// Password encryption parameters issued by the SDK center.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BilibiliCipher {
    /// PEM encoded RSA public key.
    pub cipher_key: String,
    /// Prefix put in front of the password before encryption.
    pub hash: String,
}

impl BilibiliCipher {
    /// RSA PKCS#1 v1.5 encrypt `hash + password`, base64 encoded.
    pub fn encrypt_password(&self, password: &str) -> Result<String> {
        let key = RsaPublicKey::from_public_key_pem(&self.cipher_key)
            .map_err(|e| ArkError::unexpected(format!("invalid bilibili cipher key: {e}")))?;
        let plain = format!("{}{}", self.hash, password);
        let encrypted = key
            .encrypt(&mut OsRng, Pkcs1v15Encrypt, plain.as_bytes())
            .map_err(|e| ArkError::unexpected(format!("bilibili password encryption failed: {e}")))?;

        Ok(STANDARD.encode(encrypted))
    }
}

pub struct BilibiliAuth {
    auth: Auth,
    sdk_url: String,
}

impl BilibiliAuth {
    pub fn new(network: Arc<NetworkSession>) -> Self {
        Self {
            auth: Auth::new(ArknightsServer::Bili, network),
            sdk_url: BILIBILI_SDK_URL.to_string(),
        }
    }

    /// Replace the SDK center base URL.
    pub fn with_sdk_url(mut self, url: impl Into<String>) -> Self {
        self.sdk_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn auth(&self) -> &Auth {
        &self.auth
    }

    pub fn into_auth(self) -> Auth {
        self.auth
    }

    fn base_body() -> Vec<(String, String)> {
        [
            ("merchant_id", "328".to_string()),
            ("game_id", "952".to_string()),
            ("server_id", "1178".to_string()),
            ("version", "3".to_string()),
            ("timestamp", chrono::Utc::now().timestamp().to_string()),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
    }

    async fn sdk_request(&self, endpoint: &str, mut body: Vec<(String, String)>) -> Result<Value> {
        let sign = sign_body(&body);
        body.push(("sign".to_string(), sign));

        let url = format!("{}/api/external/{}", self.sdk_url, endpoint);
        let data = self.auth.network().form_request(&url, &body).await?;

        match data.get("code").and_then(Value::as_i64) {
            Some(code) if code != 0 => Err(ArkError::ResultCode { result: code, data }),
            _ => Ok(data),
        }
    }

    pub async fn load_cipher(&self) -> Result<BilibiliCipher> {
        let mut body = Self::base_body();
        body.push(("cipher_type".to_string(), "bili_login_rsa".to_string()));

        let data = self.sdk_request("issue/cipher/v3", body).await?;
        Ok(BilibiliCipher {
            cipher_key: string_field(&data, "cipher_key")?,
            hash: string_field(&data, "hash")?,
        })
    }

    /// Exchange a username and password for a channel uid and access key.
    pub async fn get_token_from_password(
        &self,
        username: &str,
        password: &str,
        bd_id: Option<&str>,
    ) -> Result<ChannelCredentials> {
        let cipher = self.load_cipher().await?;
        let bd_id = bd_id.map_or_else(random_bd_id, str::to_string);

        let mut body = Self::base_body();
        body.push(("bd_id".to_string(), bd_id));
        body.push(("user_id".to_string(), username.to_string()));
        body.push(("pwd".to_string(), cipher.encrypt_password(password)?));

        let data = self.sdk_request("login/v3", body).await?;
        Ok(ChannelCredentials::new(
            ArknightsServer::Bili,
            string_field(&data, "uid")?,
            string_field(&data, "access_key")?,
        ))
    }

    pub async fn login(
        &self,
        username: &str,
        password: &str,
        bd_id: Option<&str>,
    ) -> Result<ChannelCredentials> {
        let credentials = self.get_token_from_password(username, password, bd_id).await?;
        self.login_with_token(&credentials.channel_uid, &credentials.token)
            .await?;
        Ok(credentials)
    }

    pub async fn login_with_token(&self, channel_uid: &str, access_key: &str) -> Result<()> {
        self.auth.login_with_token(channel_uid, access_key).await
    }
}

#[async_trait]
impl CoreAuth for BilibiliAuth {
    fn network(&self) -> &Arc<NetworkSession> {
        self.auth.network()
    }

    fn server(&self) -> Option<ArknightsServer> {
        Some(ArknightsServer::Bili)
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
