mod common;

use anyhow::Result;
use arkprts::{
    ApiRequest, ArkError, ArknightsServer, Auth, AuthSession, BilibiliAuth, ChannelCredentials,
    CoreAuth, GuestAuth, GuestCache, HypergryphAuth, YostarAuth,
};
use httpmock::prelude::*;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

use common::{
    mock_game_login, mock_network_config, mock_versions, mock_yostar_login, network_for,
    CHANNEL_UID, PLAYER_UID, SECRET, YOSTAR_TOKEN,
};

fn search_request() -> ApiRequest {
    ApiRequest::new("social/searchPlayer").json(json!({"idList": [PLAYER_UID]}))
}

/// Yostar token goes through passport, u8 and game login
#[tokio::test]
async fn test_yostar_token_login() -> Result<()> {
    let server = MockServer::start_async().await;
    let mocks = mock_yostar_login(&server, "en").await;
    let network = network_for(&server, ArknightsServer::En);

    let auth = Auth::from_token(ArknightsServer::En, CHANNEL_UID, YOSTAR_TOKEN, network).await?;

    mocks.passport.assert_async().await;
    mocks.u8.assert_async().await;
    mocks.login.assert_async().await;
    assert_eq!(auth.uid().await, PLAYER_UID);
    assert_eq!(auth.secret().await, SECRET);
    assert_eq!(
        auth.credentials().await,
        Some(ChannelCredentials::new(ArknightsServer::En, CHANNEL_UID, YOSTAR_TOKEN))
    );
    assert_eq!(auth.session().lock().await.seqnum, 1);
    Ok(())
}

#[tokio::test]
async fn test_yostar_email_code_login() -> Result<()> {
    let server = MockServer::start_async().await;
    let mocks = mock_yostar_login(&server, "jp").await;

    let code_request = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/jp/passport/account/yostar_auth_request")
                .body_contains("\"account\":\"doctor@example.com\"");
            then.status(200).json_body(json!({"result": 0}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/jp/passport/account/yostar_auth_submit")
                .body_contains("\"code\":\"123456\"");
            then.status(200).json_body(json!({
                "result": 0,
                "yostar_uid": "555",
                "yostar_token": "submit_token"
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/jp/passport/user/yostar_createlogin")
                .body_contains("\"yostar_uid\":\"555\"")
                .body_contains("\"yostar_token\":\"submit_token\"");
            then.status(200).json_body(json!({
                "result": 0,
                "uid": CHANNEL_UID,
                "token": YOSTAR_TOKEN
            }));
        })
        .await;

    let auth = YostarAuth::new(
        ArknightsServer::Jp,
        network_for(&server, ArknightsServer::Jp),
    )?;
    auth.request_email_code("doctor@example.com").await?;
    let credentials = auth
        .login_with_email_code("doctor@example.com", "123456")
        .await?;

    code_request.assert_async().await;
    mocks.login.assert_async().await;
    assert_eq!(credentials.channel_uid, CHANNEL_UID);
    assert_eq!(credentials.token, YOSTAR_TOKEN);
    assert_eq!(auth.auth().uid().await, PLAYER_UID);
    Ok(())
}

/// Passport errors surface as result codes
#[tokio::test]
async fn test_yostar_login_failure() -> Result<()> {
    let server = MockServer::start_async().await;
    mock_network_config(&server, "en").await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/en/passport/user/login");
            then.status(200).json_body(json!({"result": 100}));
        })
        .await;

    let err = Auth::from_token(
        ArknightsServer::En,
        CHANNEL_UID,
        "expired_token",
        network_for(&server, ArknightsServer::En),
    )
    .await
    .err()
    .expect("login should fail");

    assert!(matches!(err, ArkError::ResultCode { result: 100, .. }));
    Ok(())
}

#[tokio::test]
async fn test_hypergryph_password_login() -> Result<()> {
    let server = MockServer::start_async().await;
    mock_network_config(&server, "cn").await;
    mock_versions(&server, "cn").await;

    let password_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/cn/as/user/login")
                .body_contains("\"account\":\"doctor\"")
                .body_contains("\"password\":\"hunter2\"")
                .body_contains("\"sign\":");
            then.status(200)
                .json_body(json!({"result": 0, "token": "hg_token"}));
        })
        .await;
    let auth_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/cn/as/user/auth")
                .body_contains("\"token\":\"hg_token\"");
            then.status(200).json_body(json!({"result": 0, "uid": 3001}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/cn/u8/user/v1/getToken")
                .body_contains("\"channelId\":\"1\"");
            then.status(200)
                .json_body(json!({"result": 0, "uid": PLAYER_UID, "token": "u8_token"}));
        })
        .await;
    let login_mock = mock_game_login(&server, "cn").await;

    let auth = HypergryphAuth::new(network_for(&server, ArknightsServer::Cn));
    let credentials = auth.login("doctor", "hunter2").await?;

    password_mock.assert_async().await;
    auth_mock.assert_async().await;
    login_mock.assert_async().await;
    assert_eq!(credentials.channel_uid, "3001");
    assert_eq!(credentials.token, "hg_token");
    assert_eq!(auth.auth().secret().await, SECRET);
    assert_eq!(auth.server(), Some(ArknightsServer::Cn));
    Ok(())
}

#[tokio::test]
async fn test_bilibili_token_login() -> Result<()> {
    let server = MockServer::start_async().await;
    mock_network_config(&server, "bili").await;
    mock_versions(&server, "bili").await;
    let u8_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/bili/u8/user/v1/getToken")
                .body_contains("\"channelId\":\"2\"");
            then.status(200)
                .json_body(json!({"result": 0, "uid": PLAYER_UID, "token": "u8_token"}));
        })
        .await;
    let login_mock = mock_game_login(&server, "bili").await;

    let auth = Auth::from_token(
        ArknightsServer::Bili,
        "bili_uid",
        "access_key",
        network_for(&server, ArknightsServer::Bili),
    )
    .await?;

    u8_mock.assert_async().await;
    login_mock.assert_async().await;
    assert_eq!(auth.uid().await, PLAYER_UID);
    Ok(())
}

const BILIBILI_PUBLIC_KEY: &str = "-----BEGIN PUBLIC KEY-----
MIGfMA0GCSqGSIb3DQEBAQUAA4GNADCBiQKBgQC2uCwVD6Fu4MWtnw8O9DB6VySc
qUrS0szg17WmhpvKQPK86QPcTIvVLIJdnULCNUuztd10rAutHLgVqnAlC5o/vA2F
X9lG5VAISDyLexzGgJRcByH5LP+HwmRXn333UXB5XIRnaufDwk+Q3GurkoJ9ETP/
pBntXy9B3HzmLwT0DQIDAQAB
-----END PUBLIC KEY-----";

/// Password login fetches the cipher, then logs in with the access key
#[tokio::test]
async fn test_bilibili_password_login() -> Result<()> {
    let server = MockServer::start_async().await;
    mock_network_config(&server, "bili").await;
    mock_versions(&server, "bili").await;

    let cipher_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/sdk/api/external/issue/cipher/v3")
                .header("content-type", "application/x-www-form-urlencoded")
                .body_contains("cipher_type=bili_login_rsa")
                .body_contains("merchant_id=328")
                .body_contains("sign=");
            then.status(200).json_body(json!({
                "code": 0,
                "cipher_key": BILIBILI_PUBLIC_KEY,
                "hash": "ab12"
            }));
        })
        .await;
    let login_sdk_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/sdk/api/external/login/v3")
                .body_contains("user_id=doctor")
                .body_contains("bd_id=0123-abcd")
                .body_contains("pwd=");
            then.status(200).json_body(json!({
                "code": 0,
                "uid": 7001,
                "access_key": "bili_access_key"
            }));
        })
        .await;
    let u8_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/bili/u8/user/v1/getToken")
                .body_contains("\"channelId\":\"2\"")
                .body_contains("bili_access_key");
            then.status(200)
                .json_body(json!({"result": 0, "uid": PLAYER_UID, "token": "u8_token"}));
        })
        .await;
    let login_mock = mock_game_login(&server, "bili").await;

    let auth = BilibiliAuth::new(network_for(&server, ArknightsServer::Bili))
        .with_sdk_url(server.url("/sdk"));
    let credentials = auth.login("doctor", "hunter2", Some("0123-abcd")).await?;

    cipher_mock.assert_async().await;
    login_sdk_mock.assert_async().await;
    u8_mock.assert_async().await;
    login_mock.assert_async().await;
    assert_eq!(
        credentials,
        ChannelCredentials::new(ArknightsServer::Bili, "7001", "bili_access_key")
    );
    assert_eq!(auth.auth().uid().await, PLAYER_UID);
    assert_eq!(auth.server(), Some(ArknightsServer::Bili));
    assert!(auth.is_private());
    Ok(())
}

#[tokio::test]
async fn test_bilibili_sdk_error_code() -> Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/sdk/api/external/issue/cipher/v3");
            then.status(200)
                .json_body(json!({"code": 500002, "message": "sign error"}));
        })
        .await;

    let auth = BilibiliAuth::new(network_for(&server, ArknightsServer::Bili))
        .with_sdk_url(server.url("/sdk"));
    let err = auth
        .get_token_from_password("doctor", "hunter2", None)
        .await
        .unwrap_err();

    assert!(matches!(err, ArkError::ResultCode { result: 500002, .. }));
    Ok(())
}

/// An expired secret triggers one new login and one retry
#[tokio::test]
async fn test_expired_session_logs_in_again() -> Result<()> {
    let server = MockServer::start_async().await;
    let mocks = mock_yostar_login(&server, "en").await;

    let expired = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/en/gs/account/syncData")
                .header("seqnum", "2")
                .header("secret", SECRET)
                .header("uid", PLAYER_UID);
            then.status(401).json_body(json!({
                "statusCode": 401,
                "error": "Unauthorized",
                "msg": "login expired"
            }));
        })
        .await;
    let retried = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/en/gs/account/syncData")
                .header("seqnum", "3");
            then.status(200).json_body(json!({"result": 0, "user": {}}));
        })
        .await;

    let auth = Auth::from_token(
        ArknightsServer::En,
        CHANNEL_UID,
        YOSTAR_TOKEN,
        network_for(&server, ArknightsServer::En),
    )
    .await?;
    let data = auth
        .auth_request(
            ApiRequest::new("account/syncData").json(json!({"platform": 1})),
            None,
        )
        .await?;

    assert_eq!(data["result"], 0);
    expired.assert_async().await;
    retried.assert_async().await;
    mocks.login.assert_hits_async(2).await;
    Ok(())
}

/// Requests failing on the same expired secret share one new login
#[tokio::test]
async fn test_concurrent_expiry_logs_in_once() -> Result<()> {
    let server = MockServer::start_async().await;
    let mut mocks = mock_yostar_login(&server, "en").await;
    let auth = Auth::from_token(
        ArknightsServer::En,
        CHANNEL_UID,
        YOSTAR_TOKEN,
        network_for(&server, ArknightsServer::En),
    )
    .await?;

    mocks.login.delete_async().await;
    let renewed_login = server
        .mock_async(|when, then| {
            when.method(POST).path("/en/gs/account/login");
            then.status(200)
                .json_body(json!({"result": 0, "uid": PLAYER_UID, "secret": "renewed_secret"}));
        })
        .await;
    let expired = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/en/gs/social/searchPlayer")
                .header("secret", SECRET);
            then.status(401).json_body(json!({
                "statusCode": 401,
                "error": "Unauthorized",
                "msg": "login expired"
            }));
        })
        .await;
    let renewed = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/en/gs/social/searchPlayer")
                .header("secret", "renewed_secret");
            then.status(200).json_body(json!({"players": []}));
        })
        .await;

    let (first, second) = tokio::join!(
        auth.auth_request(search_request(), None),
        auth.auth_request(search_request(), None)
    );

    assert_eq!(first?, json!({"players": []}));
    assert_eq!(second?, json!({"players": []}));
    assert!(expired.hits_async().await >= 1);
    renewed.assert_hits_async(2).await;
    renewed_login.assert_hits_async(1).await;
    assert_eq!(auth.secret().await, "renewed_secret");
    Ok(())
}

/// A pool at its limit waits for the busy session instead of creating one
#[tokio::test]
async fn test_guest_waits_for_busy_session() -> Result<()> {
    let server = MockServer::start_async().await;
    mock_network_config(&server, "en").await;
    let create = server
        .mock_async(|when, then| {
            when.method(POST).path("/en/passport/user/create");
            then.status(200)
                .json_body(json!({"result": 0, "uid": "unused", "token": "unused"}));
        })
        .await;
    let search = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/en/gs/social/searchPlayer")
                .header("uid", PLAYER_UID)
                .header("secret", SECRET)
                .header("seqnum", "2");
            then.status(200).json_body(json!({"players": []}));
        })
        .await;

    let guest = GuestAuth::new(
        network_for(&server, ArknightsServer::En),
        1,
        GuestCache::Disabled,
    )?;
    let session = AuthSession::new(ArknightsServer::En, PLAYER_UID, SECRET).shared();
    guest.add_session(Arc::clone(&session)).await;

    let busy = Arc::clone(&session).lock_owned().await;
    let release = async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        drop(busy);
    };
    let started = Instant::now();
    let (data, ()) = tokio::join!(guest.auth_request(search_request(), None), release);

    assert_eq!(data?, json!({"players": []}));
    assert!(started.elapsed() >= Duration::from_millis(300));
    search.assert_async().await;
    create.assert_hits_async(0).await;
    assert_eq!(guest.session_count(ArknightsServer::En).await, 1);
    assert_eq!(session.lock().await.seqnum, 2);
    Ok(())
}

/// A new guest account is created, bound and written to the cache
#[tokio::test]
async fn test_guest_account_is_created_and_cached() -> Result<()> {
    let server = MockServer::start_async().await;
    let mocks = mock_yostar_login(&server, "en").await;

    let create = server
        .mock_async(|when, then| {
            when.method(POST).path("/en/passport/user/create");
            then.status(200).json_body(json!({
                "result": 0,
                "uid": CHANNEL_UID,
                "token": YOSTAR_TOKEN
            }));
        })
        .await;
    let bind = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/en/gs/user/bindNickName")
                .header("seqnum", "2")
                .body_contains("\"nickName\":\"Doctor\"");
            then.status(200).json_body(json!({"result": 0}));
        })
        .await;
    let search = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/en/gs/social/searchPlayer")
                .header("seqnum", "3")
                .header("uid", PLAYER_UID);
            then.status(200).json_body(json!({"players": []}));
        })
        .await;

    let dir = TempDir::new()?;
    let cache_path = dir.path().join("guests.json");
    let guest = GuestAuth::new(
        network_for(&server, ArknightsServer::En),
        2,
        GuestCache::Path(cache_path.clone()),
    )?;

    let data = guest.auth_request(search_request(), None).await?;

    assert_eq!(data, json!({"players": []}));
    create.assert_async().await;
    mocks.login.assert_async().await;
    bind.assert_async().await;
    search.assert_async().await;
    assert!(!guest.is_private());
    assert_eq!(guest.session_count(ArknightsServer::En).await, 1);

    let cached: Vec<ChannelCredentials> =
        serde_json::from_str(&std::fs::read_to_string(&cache_path)?)?;
    assert_eq!(
        cached,
        vec![ChannelCredentials::new(ArknightsServer::En, CHANNEL_UID, YOSTAR_TOKEN)]
    );
    Ok(())
}

/// Broken cached credentials are skipped before a new account is made
#[tokio::test]
async fn test_guest_uses_cached_credentials() -> Result<()> {
    let server = MockServer::start_async().await;
    mock_yostar_login(&server, "en").await;

    let create = server
        .mock_async(|when, then| {
            when.method(POST).path("/en/passport/user/create");
            then.status(200).json_body(json!({"result": 0}));
        })
        .await;
    let search = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/en/gs/social/searchPlayer")
                .header("seqnum", "2");
            then.status(200).json_body(json!({"players": []}));
        })
        .await;

    let guest = GuestAuth::new(
        network_for(&server, ArknightsServer::En),
        1,
        GuestCache::Credentials(vec![
            ChannelCredentials::new(ArknightsServer::En, "broken", "revoked_token"),
            ChannelCredentials::new(ArknightsServer::En, CHANNEL_UID, YOSTAR_TOKEN),
        ]),
    )?;

    guest.auth_request(search_request(), None).await?;

    search.assert_async().await;
    create.assert_hits_async(0).await;
    Ok(())
}

/// An expired guest session is dropped and the request retried on a new one
#[tokio::test]
async fn test_expired_guest_session_is_replaced() -> Result<()> {
    let server = MockServer::start_async().await;
    mock_yostar_login(&server, "en").await;

    let stale = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/en/gs/social/searchPlayer")
                .header("uid", "stale_uid");
            then.status(401)
                .json_body(json!({"statusCode": 401, "error": "Unauthorized"}));
        })
        .await;
    let fresh = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/en/gs/social/searchPlayer")
                .header("uid", PLAYER_UID);
            then.status(200).json_body(json!({"players": []}));
        })
        .await;

    let guest = GuestAuth::new(
        network_for(&server, ArknightsServer::En),
        2,
        GuestCache::Credentials(vec![ChannelCredentials::new(
            ArknightsServer::En,
            CHANNEL_UID,
            YOSTAR_TOKEN,
        )]),
    )?;
    guest
        .add_session(AuthSession::new(ArknightsServer::En, "stale_uid", "old").shared())
        .await;

    guest.auth_request(search_request(), None).await?;

    stale.assert_async().await;
    fresh.assert_async().await;
    assert_eq!(guest.session_count(ArknightsServer::En).await, 1);
    Ok(())
}
