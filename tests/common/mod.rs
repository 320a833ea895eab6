#![allow(dead_code)]

use arkprts::{ArknightsServer, NetworkSession};
use httpmock::prelude::*;
use httpmock::Mock;
use serde_json::json;
use std::sync::Arc;

pub const CHANNEL_UID: &str = "yostar_100";
pub const YOSTAR_TOKEN: &str = "yostar_token";
pub const PLAYER_UID: &str = "80000001";
pub const SECRET: &str = "session_secret";

/// Network configuration pointing every domain of a server at the mock server.
pub async fn mock_network_config<'a>(server: &'a MockServer, slug: &str) -> Mock<'a> {
    let content = json!({
        "funcVer": "V042",
        "configs": {
            "V041": {"network": {"gs": "http://unused"}},
            "V042": {
                "override": false,
                "network": {
                    "gs": server.url(format!("/{slug}/gs")),
                    "as": server.url(format!("/{slug}/as")),
                    "u8": server.url(format!("/{slug}/u8")),
                    "hv": server.url(format!("/{slug}/hv/{{0}}/version")),
                    "hu": server.url(format!("/{slug}/hu")),
                    "pkgAd": null
                }
            }
        }
    });

    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/{slug}/network_config"));
            then.status(200)
                .json_body(json!({"sign": "unused", "content": content.to_string()}));
        })
        .await
}

pub async fn mock_versions<'a>(server: &'a MockServer, slug: &str) -> Mock<'a> {
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/{slug}/hv/Android/version"));
            then.status(200).json_body(json!({
                "resVersion": "24-01-01-00-00-00-abcdef",
                "clientVersion": "2.1.41"
            }));
        })
        .await
}

/// Network session for one server, routed to the mock server.
pub fn network_for(server: &MockServer, arknights_server: ArknightsServer) -> Arc<NetworkSession> {
    let slug = arknights_server.as_str();
    Arc::new(
        NetworkSession::new(Some(arknights_server))
            .unwrap()
            .with_route(arknights_server, server.url(format!("/{slug}/network_config")))
            .with_passport(arknights_server, server.url(format!("/{slug}/passport"))),
    )
}

pub struct LoginMocks<'a> {
    pub passport: Mock<'a>,
    pub u8: Mock<'a>,
    pub login: Mock<'a>,
}

/// Mocks for the Yostar token login chain of `slug`.
pub async fn mock_yostar_login<'a>(server: &'a MockServer, slug: &str) -> LoginMocks<'a> {
    mock_network_config(server, slug).await;
    mock_versions(server, slug).await;

    let passport = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("/{slug}/passport/user/login"))
                .body_contains(format!("\"token\":\"{YOSTAR_TOKEN}\""));
            then.status(200)
                .json_body(json!({"result": 0, "accessToken": "access_token"}));
        })
        .await;

    let u8 = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("/{slug}/u8/user/v1/getToken"))
                .body_contains("\"channelId\":\"3\"")
                .body_contains("\"sign\":");
            then.status(200)
                .json_body(json!({"result": 0, "uid": PLAYER_UID, "token": "u8_token"}));
        })
        .await;

    let login = mock_game_login(server, slug).await;

    LoginMocks { passport, u8, login }
}

pub async fn mock_game_login<'a>(server: &'a MockServer, slug: &str) -> Mock<'a> {
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("/{slug}/gs/account/login"))
                .header("seqnum", "1")
                .header("secret", "")
                .body_contains("\"token\":\"u8_token\"")
                .body_contains("\"assetsVersion\":\"24-01-01-00-00-00-abcdef\"");
            then.status(200)
                .json_body(json!({"result": 0, "uid": PLAYER_UID, "secret": SECRET}));
        })
        .await
}

pub fn player_json(uid: &str, nickname: &str, level: i64) -> serde_json::Value {
    json!({
        "nickName": nickname,
        "nickNumber": "1234",
        "uid": uid,
        "friendNumLimit": 50,
        "serverName": "Terra",
        "level": level,
        "avatarId": "0",
        "avatar": {"type": "ICON", "id": "avatar_def_01"},
        "assistCharList": [null, null, null],
        "lastOnlineTime": 1_700_000_000,
        "medalBoard": {"type": "EMPTY", "custom": null, "template": null},
        "registerTs": 1_560_000_000,
        "mainStageProgress": "main_09-01",
        "charCnt": 100,
        "furnCnt": 400,
        "secretary": "char_002_amiya",
        "secretarySkinId": "char_002_amiya#1",
        "resume": "",
        "teamV2": {},
        "board": [],
        "infoShare": null,
        "recentVisited": 0
    })
}
