use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::domain::server::ArknightsServer;

/// An authenticated game server session.
///
/// The server rejects requests whose `seqnum` does not increase, so a
/// session must never send two requests at once. Sessions are shared as
/// [`SharedSession`] and the lock is held for the whole request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub server: ArknightsServer,
    pub uid: String,
    pub secret: String,
    pub seqnum: u64,
}

pub type SharedSession = Arc<Mutex<AuthSession>>;

impl AuthSession {
    pub fn new(server: ArknightsServer, uid: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            server,
            uid: uid.into(),
            secret: secret.into(),
            seqnum: 1,
        }
    }

    pub fn shared(self) -> SharedSession {
        Arc::new(Mutex::new(self))
    }

    pub fn is_logged_in(&self) -> bool {
        !self.uid.is_empty()
    }

    /// Advance the sequence number and return the headers for the next request.
    pub fn next_headers(&mut self) -> Vec<(String, String)> {
        self.seqnum += 1;
        vec![
            ("secret".to_string(), self.secret.clone()),
            ("seqnum".to_string(), self.seqnum.to_string()),
            ("uid".to_string(), self.uid.clone()),
        ]
    }
}

/// The three device identifiers sent on login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIds {
    pub device_id: String,
    pub device_id2: String,
    pub device_id3: String,
}

impl DeviceIds {
    pub fn random() -> Self {
        let mut rng = rand::rng();
        let digits: String = (0..13)
            .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
            .collect();

        Self {
            device_id: uuid::Uuid::new_v4().simple().to_string(),
            device_id2: format!("86{digits}"),
            device_id3: uuid::Uuid::new_v4().simple().to_string(),
        }
    }
}

/// Permanent login token pair of a distributor account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelCredentials {
    pub server: ArknightsServer,
    pub channel_uid: String,
    pub token: String,
}

impl ChannelCredentials {
    pub fn new(server: ArknightsServer, channel_uid: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            server,
            channel_uid: channel_uid.into(),
            token: token.into(),
        }
    }
}
