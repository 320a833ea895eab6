mod common;

use anyhow::Result;
use arkprts::utils::validation::Validate;
use arkprts::{ArknightsServer, ChannelCredentials, Client, ClientConfig};
use httpmock::prelude::*;
use serde_json::json;
use std::io::Write;
use tempfile::{NamedTempFile, TempDir};

use common::{mock_yostar_login, player_json, CHANNEL_UID, YOSTAR_TOKEN};

/// A client built from a config file reaches the configured servers
#[tokio::test]
async fn test_client_from_config_file() -> Result<()> {
    let server = MockServer::start_async().await;
    mock_yostar_login(&server, "en").await;
    let search = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/en/gs/social/searchPlayer")
                .header("seqnum", "2");
            then.status(200)
                .json_body(json!({"players": [player_json("42", "Doctor", 1)]}));
        })
        .await;

    let dir = TempDir::new()?;
    let cache_path = dir.path().join("guests.json");
    std::fs::write(
        &cache_path,
        serde_json::to_string(&[ChannelCredentials::new(
            ArknightsServer::En,
            CHANNEL_UID,
            YOSTAR_TOKEN,
        )])?,
    )?;

    let toml_content = format!(
        r#"
[network]
default_server = "en"
timeout_seconds = 5

[network.routes]
en = "{route}"

[network.passports]
en = "{passport}"

[guest]
max_sessions = 2
cache_path = "{cache}"

[logging]
level = "debug"
requests = true
"#,
        route = server.url("/en/network_config"),
        passport = server.url("/en/passport"),
        cache = cache_path.display(),
    );
    let mut config_file = NamedTempFile::new()?;
    config_file.write_all(toml_content.as_bytes())?;

    let config = ClientConfig::from_toml_str(&toml_content)?;
    config.validate()?;
    let config = ClientConfig::from_file(config_file.path())?;
    assert!(config.init_logging()?);
    let client = Client::from_config(&config)?;

    assert_eq!(client.server(), Some(ArknightsServer::En));
    assert!(client.assets().is_none());

    let players = client.get_partial_players(&["42".to_string()], None).await?;

    search.assert_async().await;
    assert_eq!(players[0].uid, "42");
    Ok(())
}

#[test]
fn test_invalid_server_is_rejected() -> Result<()> {
    let config = ClientConfig::from_toml_str(
        r#"
[network]
default_server = "na"
"#,
    )?;

    assert!(config.validate().is_err());
    assert!(Client::from_config(&config).is_err());
    Ok(())
}

#[test]
fn test_enabled_assets_are_attached() -> Result<()> {
    let dir = TempDir::new()?;
    let config = ClientConfig::from_toml_str(&format!(
        r#"
[assets]
enabled = true
directory = "{}"
tables = ["character_table"]

[guest]
cache_enabled = false
"#,
        dir.path().display()
    ))?;

    let client = Client::from_config(&config)?;

    let assets = client.assets().expect("assets are enabled");
    assert_eq!(assets.storage().base_path(), dir.path());
    assert!(!assets.is_loaded());
    Ok(())
}
