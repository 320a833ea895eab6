//! Pool of guest sessions for public data.
//!
//! Guest accounts are cheap to create on Yostar servers. Each session can
//! only run one request at a time, so requests are spread over up to
//! `max_sessions` sessions per server. Created accounts are remembered in a
//! JSON cache file and reused on the next run.

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::session::{AuthSession, ChannelCredentials, SharedSession};
use super::single::Auth;
use super::yostar::YostarAuth;
use crate::config::GuestConfig;
use crate::core::network::{ApiRequest, NetworkSession};
use crate::domain::ports::CoreAuth;
use crate::domain::server::{ArknightsDistributor, ArknightsDomain, ArknightsServer};
use crate::utils::error::{ArkError, Result};

pub const DEFAULT_MAX_SESSIONS: usize = 6;
pub const CACHE_FILE_NAME: &str = "arkprts_auth_cache.json";

const FREE_SESSION_POLL: Duration = Duration::from_millis(100);

/// Where guest credentials come from and are saved to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GuestCache {
    /// `arkprts_auth_cache.json` in the system temp directory.
    #[default]
    Default,
    Path(PathBuf),
    Disabled,
    /// Fixed credentials, nothing is written back.
    Credentials(Vec<ChannelCredentials>),
}

impl GuestCache {
    pub fn default_path() -> PathBuf {
        std::env::temp_dir().join(CACHE_FILE_NAME)
    }
}

pub struct GuestAuth {
    network: Arc<NetworkSession>,
    max_sessions: usize,
    sessions: Mutex<Vec<(ArknightsServer, SharedSession)>>,
    upcoming: Mutex<Vec<ChannelCredentials>>,
    cache_path: Option<PathBuf>,
}

impl GuestAuth {
    pub fn new(network: Arc<NetworkSession>, max_sessions: usize, cache: GuestCache) -> Result<Self> {
        let (cache_path, mut upcoming) = match cache {
            GuestCache::Default => (Some(GuestCache::default_path()), Vec::new()),
            GuestCache::Path(path) => (Some(path), Vec::new()),
            GuestCache::Disabled => (None, Vec::new()),
            GuestCache::Credentials(credentials) => (None, credentials),
        };

        if let Some(path) = &cache_path {
            upcoming.extend(read_cache_file(path)?);
        }

        Ok(Self {
            network,
            max_sessions: max_sessions.max(1),
            sessions: Mutex::new(Vec::new()),
            upcoming: Mutex::new(upcoming),
            cache_path,
        })
    }

    pub fn from_config(network: Arc<NetworkSession>, config: &GuestConfig) -> Result<Self> {
        Self::new(network, config.max_sessions(), config.cache())
    }

    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    pub fn cache_path(&self) -> Option<&Path> {
        self.cache_path.as_deref()
    }

    /// Number of sessions currently held for a server.
    pub async fn session_count(&self, server: ArknightsServer) -> usize {
        self.sessions
            .lock()
            .await
            .iter()
            .filter(|(s, _)| *s == server)
            .count()
    }

    /// Add a session created elsewhere, for example by a logged-in [`Auth`].
    pub async fn add_session(&self, session: SharedSession) {
        let server = session.lock().await.server;
        self.sessions.lock().await.push((server, session));
    }

    pub async fn add_auth(&self, auth: &Auth) {
        self.add_session(auth.session()).await;
    }

    async fn acquire(&self, server: ArknightsServer) -> Result<OwnedMutexGuard<AuthSession>> {
        loop {
            {
                let sessions = self.sessions.lock().await;
                let mut count = 0;
                for (_, session) in sessions.iter().filter(|(s, _)| *s == server) {
                    count += 1;
                    if let Ok(guard) = Arc::clone(session).try_lock_owned() {
                        return Ok(guard);
                    }
                }
                if count < self.max_sessions {
                    break;
                }
            }
            tokio::time::sleep(FREE_SESSION_POLL).await;
        }

        // concurrent callers may briefly exceed max_sessions here
        let session = self.create_session(server).await?;
        let guard = Arc::clone(&session).lock_owned().await;
        self.sessions.lock().await.push((server, session));
        tracing::debug!("Created new guest session {} for {}", guard.uid, server);
        Ok(guard)
    }

    async fn create_session(&self, server: ArknightsServer) -> Result<SharedSession> {
        if server.distributor() != ArknightsDistributor::Yostar {
            return Err(ArkError::UnsupportedServer {
                server: server.to_string(),
                reason: "guest accounts are only available on en, jp and kr".to_string(),
            });
        }

        if let Some(session) = self.load_upcoming_session(server).await? {
            return Ok(session);
        }

        let auth = YostarAuth::new(server, Arc::clone(&self.network))?;
        let credentials = auth.login_as_guest(None).await?;
        self.append_to_cache(credentials).await?;
        Ok(auth.auth().session())
    }

    /// Log in with the next cached credentials of the server. Broken entries
    /// are dropped from the cache file.
    async fn load_upcoming_session(&self, server: ArknightsServer) -> Result<Option<SharedSession>> {
        loop {
            let next = {
                let mut upcoming = self.upcoming.lock().await;
                match upcoming.iter().position(|c| c.server == server) {
                    Some(index) => upcoming.remove(index),
                    None => return Ok(None),
                }
            };

            tracing::debug!("Loading cached auth {} for {}", next.channel_uid, server);
            match Auth::from_token(server, &next.channel_uid, &next.token, Arc::clone(&self.network)).await {
                Ok(auth) => return Ok(Some(auth.session())),
                Err(e) => {
                    tracing::warn!("Failed to load cached auth {}: {}", next.channel_uid, e);
                    self.remove_from_cache(&next).await?;
                }
            }
        }
    }

    async fn append_to_cache(&self, credentials: ChannelCredentials) -> Result<()> {
        let Some(path) = &self.cache_path else {
            return Ok(());
        };
        let mut cached = load_cache(path).await?;
        cached.push(credentials);
        save_cache(path, &cached).await
    }

    async fn remove_from_cache(&self, credentials: &ChannelCredentials) -> Result<()> {
        let Some(path) = &self.cache_path else {
            return Ok(());
        };
        let mut cached = load_cache(path).await?;
        cached.retain(|c| !(c.server == credentials.server && c.channel_uid == credentials.channel_uid));
        save_cache(path, &cached).await
    }

    async fn send(&self, server: ArknightsServer, mut request: ApiRequest) -> Result<Value> {
        let mut session = self.acquire(server).await?;
        request.headers.extend(session.next_headers());
        tracing::debug!(
            "[GUEST UID: {} {}] Sending request #{} to {}",
            session.uid,
            server,
            session.seqnum,
            request.endpoint.as_deref().unwrap_or_default()
        );

        let result = self
            .network
            .request(ArknightsDomain::Gs, request, Some(server))
            .await;

        if matches!(&result, Err(e) if e.is_session_expired()) {
            let expired = Arc::clone(OwnedMutexGuard::mutex(&session));
            drop(session);
            self.sessions
                .lock()
                .await
                .retain(|(_, s)| !Arc::ptr_eq(s, &expired));
        }
        result
    }
}

#[async_trait]
impl CoreAuth for GuestAuth {
    fn network(&self) -> &Arc<NetworkSession> {
        &self.network
    }

    async fn auth_request(
        &self,
        request: ApiRequest,
        server: Option<ArknightsServer>,
    ) -> Result<Value> {
        let server = server
            .or(self.network.default_server())
            .ok_or(ArkError::NoDefaultServer)?;

        match self.send(server, request.clone()).await {
            Err(e) if e.is_session_expired() => {
                tracing::warn!("Guest session expired on {}, retrying with another", server);
                self.send(server, request).await
            }
            other => other,
        }
    }
}

fn read_cache_file(path: &Path) -> Result<Vec<ChannelCredentials>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)?;
    parse_cache(&content)
}

async fn load_cache(path: &Path) -> Result<Vec<ChannelCredentials>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => parse_cache(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

fn parse_cache(content: &str) -> Result<Vec<ChannelCredentials>> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(content)?)
}

async fn save_cache(path: &Path, credentials: &[ChannelCredentials]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, serde_json::to_vec(credentials)?).await?;
    Ok(())
}
