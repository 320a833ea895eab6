//! Static game data from the community game data repositories.
//!
//! Excel tables are downloaded per language into
//! `<language>/gamedata/excel/<table>.json` of a [`Storage`], with the
//! downloaded commit recorded in `<language>/commit.txt`.

use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;

use crate::adapters::storage::LocalStorage;
use crate::config::AssetsConfig;
use crate::domain::ports::Storage;
use crate::domain::server::ArknightsServer;
use crate::utils::error::{ArkError, Result};

pub const CN_GAMEDATA_REPOSITORY: &str = "Kengxxiao/ArknightsGameData";
pub const GLOBAL_GAMEDATA_REPOSITORY: &str = "Kengxxiao/ArknightsGameData_YoStar";
pub const TW_GAMEDATA_REPOSITORY: &str = "aelurum/ArknightsGameData";

pub const GITHUB_API_URL: &str = "https://api.github.com";
pub const GITHUB_RAW_URL: &str = "https://raw.githubusercontent.com";

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(6 * 60 * 60);

/// Tables needed by the lookup helpers.
pub const DEFAULT_TABLES: &[&str] = &[
    "character_table",
    "item_table",
    "medal_table",
    "skill_table",
    "uniequip_table",
    "favor_table",
];

const USER_AGENT: &str = concat!("arkprts/", env!("CARGO_PKG_VERSION"));

pub struct GameAssets<S: Storage = LocalStorage> {
    storage: S,
    client: Client,
    default_server: ArknightsServer,
    repository: Option<String>,
    branch: String,
    api_url: String,
    raw_url: String,
    tables: Vec<String>,
    refresh_interval: Duration,
    loaded: AtomicBool,
    excel_cache: RwLock<HashMap<(String, String), Arc<Value>>>,
}

impl GameAssets<LocalStorage> {
    pub fn from_config(config: &AssetsConfig, default_server: ArknightsServer) -> Result<Self> {
        let mut assets = Self::new(LocalStorage::new(config.directory()), default_server)?
            .with_api_url(config.github_api_url())
            .with_raw_url(config.raw_url())
            .with_branch(config.branch())
            .with_tables(config.tables())
            .with_refresh_interval(config.refresh_interval());
        if let Some(repository) = config.repository() {
            assets = assets.with_repository(repository);
        }
        Ok(assets)
    }
}

impl<S: Storage> GameAssets<S> {
    pub fn new(storage: S, default_server: ArknightsServer) -> Result<Self> {
        // the GitHub API rejects requests without a user agent
        let client = Client::builder().user_agent(USER_AGENT).build()?;

        Ok(Self {
            storage,
            client,
            default_server,
            repository: None,
            branch: "HEAD".to_string(),
            api_url: GITHUB_API_URL.to_string(),
            raw_url: GITHUB_RAW_URL.to_string(),
            tables: DEFAULT_TABLES.iter().map(|t| t.to_string()).collect(),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            loaded: AtomicBool::new(false),
            excel_cache: RwLock::new(HashMap::new()),
        })
    }

    /// Use one repository for every server instead of the per-server default.
    pub fn with_repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = Some(repository.into());
        self
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_raw_url(mut self, url: impl Into<String>) -> Self {
        self.raw_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_tables<I, T>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tables = tables.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn default_server(&self) -> ArknightsServer {
        self.default_server
    }

    /// Whether an update ran at least once.
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    /// Skip downloading, for example when the storage is filled externally.
    pub fn mark_loaded(&self) {
        self.loaded.store(true, Ordering::SeqCst);
    }

    pub fn repository(&self, server: ArknightsServer) -> String {
        if let Some(repository) = &self.repository {
            return repository.clone();
        }
        match server {
            ArknightsServer::Cn | ArknightsServer::Bili => CN_GAMEDATA_REPOSITORY,
            ArknightsServer::Tw => TW_GAMEDATA_REPOSITORY,
            _ => GLOBAL_GAMEDATA_REPOSITORY,
        }
        .to_string()
    }

    fn language(&self, server: Option<ArknightsServer>) -> &'static str {
        server.unwrap_or(self.default_server).gamedata_language()
    }

    /// Update the tables of the default server.
    pub async fn update_assets(&self, force: bool) -> Result<()> {
        self.update_server(self.default_server, force).await
    }

    pub async fn update_server(&self, server: ArknightsServer, force: bool) -> Result<()> {
        let result = self.download_tables(server, force).await;
        self.mark_loaded();
        result
    }

    async fn download_tables(&self, server: ArknightsServer, force: bool) -> Result<()> {
        let repository = self.repository(server);
        let language = server.gamedata_language();
        let commit_path = format!("{language}/commit.txt");

        if !force {
            if let Some(modified) = self.storage.modified(&commit_path).await? {
                let age = SystemTime::now()
                    .duration_since(modified)
                    .unwrap_or_default();
                if age < self.refresh_interval {
                    tracing::debug!("{} was updated recently, skipping download", repository);
                    return Ok(());
                }
            }
        }

        let commit = match self.fetch_commit(&repository).await {
            Ok(commit) => commit,
            Err(e) => {
                tracing::warn!("Failed to get {} commit, skipping download: {}", repository, e);
                return Ok(());
            }
        };

        let current = self.storage.read_file(&commit_path).await.ok();
        if !force && current.as_deref() == Some(commit.as_bytes()) {
            tracing::debug!("{} is up to date [{}]", repository, commit);
            // refresh the mtime so the next check waits a full interval
            self.storage.write_file(&commit_path, commit.as_bytes()).await?;
            return Ok(());
        }

        tracing::info!("📥 Downloading {} tables from {} [{}]", language, repository, commit);
        for table in &self.tables {
            let path = format!("{language}/gamedata/excel/{table}.json");
            let data = self.download_raw(&repository, &commit, &path).await?;
            self.storage.write_file(&path, &data).await?;
            tracing::debug!("Downloaded {} ({} bytes)", path, data.len());
        }
        self.storage.write_file(&commit_path, commit.as_bytes()).await?;

        self.excel_cache
            .write()
            .await
            .retain(|(cached_language, _), _| cached_language != language);

        tracing::info!("📥 Downloaded {} tables for {}", self.tables.len(), language);
        Ok(())
    }

    async fn fetch_commit(&self, repository: &str) -> Result<String> {
        let url = format!("{}/repos/{}/commits/{}", self.api_url, repository, self.branch);
        let data: Value = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        data.get("sha")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ArkError::unexpected(format!("no commit sha for {repository}")))
    }

    async fn download_raw(&self, repository: &str, reference: &str, path: &str) -> Result<Vec<u8>> {
        let url = format!("{}/{}/{}/{}", self.raw_url, repository, reference, path);
        let bytes = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(bytes.to_vec())
    }

    /// Read a downloaded file, relative to the language directory.
    pub async fn get_file(&self, path: &str, server: Option<ArknightsServer>) -> Result<Vec<u8>> {
        let language = self.language(server);
        self.storage.read_file(&format!("{language}/{path}")).await
    }

    /// Parsed excel table, cached per language.
    pub async fn get_excel(&self, name: &str, server: Option<ArknightsServer>) -> Result<Arc<Value>> {
        let key = (self.language(server).to_string(), name.to_string());
        if let Some(table) = self.excel_cache.read().await.get(&key) {
            return Ok(Arc::clone(table));
        }

        let data = self
            .get_file(&format!("gamedata/excel/{name}.json"), server)
            .await
            .map_err(|e| match e {
                ArkError::IoError(_) => ArkError::StaticDataNotFound {
                    message: format!("table {name} for {} is not downloaded", key.0),
                },
                other => other,
            })?;
        let table = Arc::new(serde_json::from_slice::<Value>(&data)?);

        self.excel_cache
            .write()
            .await
            .insert(key, Arc::clone(&table));
        Ok(table)
    }

    /// Download a file directly, without a prior update.
    pub async fn aget_file(&self, path: &str, server: Option<ArknightsServer>) -> Result<Vec<u8>> {
        let server = server.unwrap_or(self.default_server);
        let path = format!("{}/{}", server.gamedata_language(), path);
        self.download_raw(&self.repository(server), &self.branch, &path)
            .await
    }

    pub async fn aget_excel(&self, name: &str, server: Option<ArknightsServer>) -> Result<Value> {
        let data = self
            .aget_file(&format!("gamedata/excel/{name}.json"), server)
            .await?;
        Ok(serde_json::from_slice(&data)?)
    }

    pub async fn get_operator(&self, id: &str, server: Option<ArknightsServer>) -> Result<Value> {
        let table = self.get_excel("character_table", server).await?;
        lookup(table.get(id), "operator", id)
    }

    pub async fn get_item(&self, id: &str, server: Option<ArknightsServer>) -> Result<Value> {
        let table = self.get_excel("item_table", server).await?;
        lookup(table.get("items").and_then(|items| items.get(id)), "item", id)
    }

    pub async fn get_medal(&self, id: &str, server: Option<ArknightsServer>) -> Result<Value> {
        let table = self.get_excel("medal_table", server).await?;
        let medal = match table.get("medalList") {
            Some(Value::Array(medals)) => medals
                .iter()
                .find(|medal| medal.get("medalId").and_then(Value::as_str) == Some(id)),
            Some(medals) => medals.get(id),
            None => None,
        };
        lookup(medal, "medal", id)
    }

    pub async fn get_medal_group(&self, id: &str, server: Option<ArknightsServer>) -> Result<Value> {
        let table = self.get_excel("medal_table", server).await?;
        let group = table
            .pointer("/medalTypeData/activityMedal/groupData")
            .and_then(Value::as_array)
            .and_then(|groups| {
                groups
                    .iter()
                    .find(|group| group.get("groupId").and_then(Value::as_str) == Some(id))
            });
        lookup(group, "medal group", id)
    }

    pub async fn get_skill(&self, id: &str, server: Option<ArknightsServer>) -> Result<Value> {
        let table = self.get_excel("skill_table", server).await?;
        lookup(table.get(id), "skill", id)
    }

    pub async fn get_module(&self, id: &str, server: Option<ArknightsServer>) -> Result<Value> {
        let table = self.get_excel("uniequip_table", server).await?;
        lookup(
            table.get("equipDict").and_then(|equips| equips.get(id)),
            "module",
            id,
        )
    }

    /// Trust level for raw trust points: the number of favor key frames
    /// requiring fewer points than `trust`.
    pub async fn calculate_trust_level(&self, trust: i64) -> Result<usize> {
        let table = self.get_excel("favor_table", None).await?;
        let frames = table
            .get("favorFrames")
            .and_then(Value::as_array)
            .ok_or_else(|| ArkError::StaticDataNotFound {
                message: "favor_table has no favorFrames".to_string(),
            })?;

        let key_frames: Vec<i64> = frames
            .iter()
            .filter_map(|frame| frame.pointer("/data/favorPoint").and_then(Value::as_i64))
            .collect();

        Ok(key_frames.partition_point(|points| *points < trust))
    }
}

fn lookup(value: Option<&Value>, kind: &str, id: &str) -> Result<Value> {
    value.cloned().ok_or_else(|| ArkError::StaticDataNotFound {
        message: format!("{kind} {id} not found"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    async fn seeded_assets(dir: &TempDir) -> GameAssets {
        let storage = LocalStorage::new(dir.path());
        let tables = [
            ("character_table", json!({"char_002_amiya": {"name": "Amiya", "rarity": "TIER_5"}})),
            ("item_table", json!({"items": {"4001": {"name": "LMD"}}})),
            (
                "medal_table",
                json!({
                    "medalList": [{"medalId": "medal_1", "medalName": "First"}],
                    "medalTypeData": {"activityMedal": {"groupData": [{"groupId": "act_1", "medalId": ["medal_1"]}]}}
                }),
            ),
            ("skill_table", json!({"skchr_amiya_1": {"levels": []}})),
            ("uniequip_table", json!({"equipDict": {"uniequip_001_amiya": {"uniEquipName": "Standard"}}})),
            (
                "favor_table",
                json!({"favorFrames": [
                    {"level": 0, "data": {"favorPoint": 0}},
                    {"level": 1, "data": {"favorPoint": 8}},
                    {"level": 2, "data": {"favorPoint": 16}},
                    {"level": 3, "data": {"favorPoint": 27}}
                ]}),
            ),
        ];
        for (name, table) in tables {
            storage
                .write_file(
                    &format!("en_US/gamedata/excel/{name}.json"),
                    table.to_string().as_bytes(),
                )
                .await
                .unwrap();
        }
        GameAssets::new(storage, ArknightsServer::En).unwrap()
    }

    #[tokio::test]
    async fn test_lookups_resolve_entries() {
        let dir = TempDir::new().unwrap();
        let assets = seeded_assets(&dir).await;

        assert_eq!(assets.get_operator("char_002_amiya", None).await.unwrap()["name"], "Amiya");
        assert_eq!(assets.get_item("4001", None).await.unwrap()["name"], "LMD");
        assert_eq!(assets.get_medal("medal_1", None).await.unwrap()["medalName"], "First");
        assert_eq!(assets.get_medal_group("act_1", None).await.unwrap()["groupId"], "act_1");
        assert!(assets.get_skill("skchr_amiya_1", None).await.is_ok());
        assert!(assets.get_module("uniequip_001_amiya", None).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_entry_is_static_data_not_found() {
        let dir = TempDir::new().unwrap();
        let assets = seeded_assets(&dir).await;

        let err = assets.get_operator("char_unknown", None).await.unwrap_err();
        assert!(matches!(err, ArkError::StaticDataNotFound { .. }));

        let err = assets
            .get_operator("char_002_amiya", Some(ArknightsServer::Jp))
            .await
            .unwrap_err();
        assert!(matches!(err, ArkError::StaticDataNotFound { .. }));
    }

    #[tokio::test]
    async fn test_trust_level_is_bisect_left() {
        let dir = TempDir::new().unwrap();
        let assets = seeded_assets(&dir).await;

        assert_eq!(assets.calculate_trust_level(0).await.unwrap(), 0);
        assert_eq!(assets.calculate_trust_level(8).await.unwrap(), 1);
        assert_eq!(assets.calculate_trust_level(9).await.unwrap(), 2);
        assert_eq!(assets.calculate_trust_level(1000).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_medal_list_keyed_by_id() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path());
        storage
            .write_file(
                "ja_JP/gamedata/excel/medal_table.json",
                br#"{"medalList": {"medal_2": {"medalName": "Second"}}}"#,
            )
            .await
            .unwrap();
        let assets = GameAssets::new(storage, ArknightsServer::Jp).unwrap();

        assert_eq!(assets.get_medal("medal_2", None).await.unwrap()["medalName"], "Second");
    }

    #[test]
    fn test_repository_per_server() {
        let dir = TempDir::new().unwrap();
        let assets = GameAssets::new(LocalStorage::new(dir.path()), ArknightsServer::En).unwrap();

        assert_eq!(assets.repository(ArknightsServer::Cn), CN_GAMEDATA_REPOSITORY);
        assert_eq!(assets.repository(ArknightsServer::Tw), TW_GAMEDATA_REPOSITORY);
        assert_eq!(assets.repository(ArknightsServer::Kr), GLOBAL_GAMEDATA_REPOSITORY);

        let assets = assets.with_repository("someone/fork");
        assert_eq!(assets.repository(ArknightsServer::Cn), "someone/fork");
    }
}
