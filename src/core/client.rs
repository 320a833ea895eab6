//! High-level client returning typed records.
//!
//! A client over [`GuestAuth`] can only read public data (player search and
//! profiles). Account data, friends and battle replays need a private auth
//! such as [`Auth`].

use base64::Engine;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::cmp::Ordering;
use std::io::{Cursor, Read};
use std::sync::Arc;

use crate::adapters::storage::LocalStorage;
use crate::config::ClientConfig;
use crate::core::assets::GameAssets;
use crate::core::auth::{Auth, GuestAuth};
use crate::core::network::{ApiRequest, NetworkSession};
use crate::domain::model::{BattleReplay, PartialPlayer, Player, User};
use crate::domain::ports::{CoreAuth, Storage};
use crate::domain::server::ArknightsServer;
use crate::utils::error::{ArkError, Result};

const REPLAY_ENTRY: &str = "default_entry";

pub struct Client<S: Storage = LocalStorage> {
    auth: Arc<dyn CoreAuth>,
    assets: Option<Arc<GameAssets<S>>>,
}

impl Client<LocalStorage> {
    pub fn new(auth: Arc<dyn CoreAuth>) -> Self {
        Self { auth, assets: None }
    }

    /// Public client backed by a guest session pool.
    pub fn guest(network: Arc<NetworkSession>) -> Result<Self> {
        let guest = GuestAuth::new(
            network,
            crate::core::auth::guest::DEFAULT_MAX_SESSIONS,
            Default::default(),
        )?;
        Ok(Self::new(Arc::new(guest)))
    }

    /// Private client logged in with a channel uid and token.
    pub async fn from_token(
        server: ArknightsServer,
        channel_uid: &str,
        token: &str,
        network: Arc<NetworkSession>,
    ) -> Result<Self> {
        let auth = Auth::from_token(server, channel_uid, token, network).await?;
        Ok(Self::new(Arc::new(auth)))
    }

    /// Public client with network, guest pool and assets built from config.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let network = Arc::new(NetworkSession::from_config(&config.network)?);
        let default_server = network.default_server().unwrap_or(ArknightsServer::En);
        let guest = GuestAuth::from_config(network, &config.guest)?;
        let client = Self::new(Arc::new(guest));

        if !config.assets.enabled() {
            return Ok(client);
        }
        let assets = GameAssets::from_config(&config.assets, default_server)?;
        Ok(client.with_assets(Arc::new(assets)))
    }
}

impl<S: Storage> Client<S> {
    /// Attach static game data. It is downloaded before the first request.
    pub fn with_assets<T: Storage>(self, assets: Arc<GameAssets<T>>) -> Client<T> {
        Client {
            auth: self.auth,
            assets: Some(assets),
        }
    }

    pub fn auth(&self) -> &Arc<dyn CoreAuth> {
        &self.auth
    }

    pub fn network(&self) -> &Arc<NetworkSession> {
        self.auth.network()
    }

    /// Server used when none is given: the auth's own, else the network default.
    pub fn server(&self) -> Option<ArknightsServer> {
        self.auth.server().or(self.network().default_server())
    }

    pub fn assets(&self) -> Option<&Arc<GameAssets<S>>> {
        self.assets.as_ref()
    }

    pub async fn update_assets(&self, force: bool) -> Result<()> {
        match &self.assets {
            Some(assets) => assets.update_assets(force).await,
            None => Ok(()),
        }
    }

    /// Authenticated request to the game server.
    pub async fn request(&self, request: ApiRequest, server: Option<ArknightsServer>) -> Result<Value> {
        if let Some(assets) = &self.assets {
            if !assets.is_loaded() {
                if let Err(e) = assets.update_assets(false).await {
                    tracing::warn!("Failed to update game data: {}", e);
                }
            }
        }

        self.auth.auth_request(request, server).await
    }

    fn assert_private(&self) -> Result<()> {
        if !self.auth.is_private() {
            return Err(ArkError::PrivateDataRequired);
        }
        Ok(())
    }

    /// Raw `account/syncData` response.
    pub async fn get_raw_data(&self) -> Result<Value> {
        self.assert_private()?;
        self.request(
            ApiRequest::new("account/syncData").json(json!({"platform": 1})),
            None,
        )
        .await
    }

    async fn get_social_sort_list(
        &self,
        list_type: i64,
        sort_keys: &[&str],
        param: Value,
        server: Option<ArknightsServer>,
    ) -> Result<Value> {
        let body = json!({"type": list_type, "sortKeyList": sort_keys, "param": param});
        let mut data = self
            .request(ApiRequest::new("social/getSortListInfo").json(body), server)
            .await?;

        if let Some(Value::Array(entries)) = data.get_mut("result") {
            entries.sort_by(|a, b| compare_sort_keys(b, a, sort_keys));
        }
        Ok(data)
    }

    /// Detailed player info. The players do not have to be friends.
    pub async fn get_raw_friend_info(
        &self,
        ids: &[String],
        server: Option<ArknightsServer>,
    ) -> Result<Value> {
        self.request(
            ApiRequest::new("social/getFriendList").json(json!({"idList": ids})),
            server,
        )
        .await
    }

    pub async fn get_raw_player_info(
        &self,
        ids: &[String],
        server: Option<ArknightsServer>,
    ) -> Result<Value> {
        self.request(
            ApiRequest::new("social/searchPlayer").json(json!({"idList": ids})),
            server,
        )
        .await
    }

    pub async fn get_raw_friend_ids(&self, server: Option<ArknightsServer>) -> Result<Value> {
        self.assert_private()?;
        self.get_social_sort_list(1, &["level", "infoShare"], json!({}), server)
            .await
    }

    pub async fn search_raw_player_ids(
        &self,
        nickname: &str,
        nicknumber: &str,
        server: Option<ArknightsServer>,
    ) -> Result<Value> {
        self.get_social_sort_list(
            0,
            &["level"],
            json!({"nickName": nickname, "nickNumber": nicknumber}),
            server,
        )
        .await
    }

    /// Battle replay JSON of a stage, e.g. `("quest", "main_01-07")`.
    pub async fn get_raw_battle_replay(&self, battle_type: &str, stage_id: &str) -> Result<Value> {
        self.assert_private()?;
        let data = self
            .request(
                ApiRequest::new(format!("{battle_type}/getBattleReplay"))
                    .json(json!({"stageId": stage_id})),
                None,
            )
            .await?;
        decode_battle_replay(&data)
    }

    /// Search by nickname. `name#1234` searches for an exact tag.
    pub async fn search_players(
        &self,
        nickname: &str,
        server: Option<ArknightsServer>,
        limit: Option<usize>,
    ) -> Result<Vec<Player>> {
        let (nickname, nicknumber) = nickname.split_once('#').unwrap_or((nickname, ""));

        let uid_data = self
            .search_raw_player_ids(nickname, nicknumber, server)
            .await?;
        let ids = sort_list_uids(&uid_data, limit);
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let data = self.get_raw_friend_info(&ids, server).await?;
        parse_list(&data, "friends")
    }

    pub async fn get_players(
        &self,
        ids: &[String],
        server: Option<ArknightsServer>,
    ) -> Result<Vec<Player>> {
        let data = self.get_raw_friend_info(ids, server).await?;
        parse_list(&data, "friends")
    }

    pub async fn get_partial_players(
        &self,
        ids: &[String],
        server: Option<ArknightsServer>,
    ) -> Result<Vec<PartialPlayer>> {
        let data = self.get_raw_player_info(ids, server).await?;
        parse_list(&data, "players")
    }

    pub async fn get_friends(
        &self,
        server: Option<ArknightsServer>,
        limit: Option<usize>,
    ) -> Result<Vec<Player>> {
        let uid_data = self.get_raw_friend_ids(server).await?;
        let ids = sort_list_uids(&uid_data, limit);
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let data = self.get_raw_friend_info(&ids, server).await?;
        parse_list(&data, "friends")
    }

    pub async fn get_data(&self) -> Result<User> {
        let data = self.get_raw_data().await?;
        let user = data
            .get("user")
            .cloned()
            .ok_or_else(|| ArkError::unexpected("syncData response has no user"))?;
        Ok(serde_json::from_value(user)?)
    }

    pub async fn get_battle_replay(&self, battle_type: &str, stage_id: &str) -> Result<BattleReplay> {
        let data = self.get_raw_battle_replay(battle_type, stage_id).await?;
        Ok(serde_json::from_value(data)?)
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        _ => Ordering::Equal,
    }
}

/// Lexicographic comparison over the values of `keys`.
fn compare_sort_keys(a: &Value, b: &Value, keys: &[&str]) -> Ordering {
    keys.iter()
        .map(|key| compare_values(a.get(*key), b.get(*key)))
        .find(|ordering| *ordering != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

fn sort_list_uids(data: &Value, limit: Option<usize>) -> Vec<String> {
    let entries = data
        .get("result")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    entries
        .iter()
        .take(limit.unwrap_or(usize::MAX))
        .filter_map(|entry| match entry.get("uid") {
            Some(Value::String(uid)) => Some(uid.clone()),
            Some(Value::Number(uid)) => Some(uid.to_string()),
            _ => None,
        })
        .collect()
}

fn parse_list<T: DeserializeOwned>(data: &Value, key: &str) -> Result<Vec<T>> {
    match data.get(key) {
        Some(list) => Ok(serde_json::from_value(list.clone())?),
        None => Err(ArkError::unexpected(format!("response has no {key}"))),
    }
}

/// `battleReplay` is a base64 zip archive holding the replay JSON.
fn decode_battle_replay(data: &Value) -> Result<Value> {
    let encoded = data
        .get("battleReplay")
        .and_then(Value::as_str)
        .ok_or_else(|| ArkError::unexpected("response has no battleReplay"))?;
    let bytes = base64::engine::general_purpose::STANDARD.decode(encoded)?;

    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut entry = archive.by_name(REPLAY_ENTRY)?;
    let mut content = String::new();
    entry.read_to_string(&mut content)?;

    Ok(serde_json::from_str(&content)?)
}
