//! Config-aware network session.
//!
//! Every server publishes a network configuration listing the URLs of its
//! domains (`gs`, `as`, `u8`, `hv`, ...). The session loads it on first use
//! and resolves domain-relative requests against it.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, Method};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinSet;

use crate::config::NetworkConfig;
use crate::domain::model::convert;
use crate::domain::server::{ArknightsDomain, ArknightsServer};
use crate::utils::error::{ArkError, Result};

const UNITY_VERSION: &str = "2017.4.39f1";
const DEVICE_USER_AGENT: &str = "Dalvik/2.1.0 (Linux; U; Android 11; KB2000 Build/RP1A.201005.001)";
const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// A request to a game domain or absolute URL.
#[derive(Debug, Clone, Default)]
pub struct ApiRequest {
    pub endpoint: Option<String>,
    pub body: Option<Value>,
    pub headers: Vec<(String, String)>,
    /// Defaults to POST with a body and GET without.
    pub method: Option<Method>,
}

impl ApiRequest {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            ..Default::default()
        }
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    fn resolved_method(&self) -> Method {
        match (&self.method, &self.body) {
            (Some(method), _) => method.clone(),
            (None, Some(_)) => Method::POST,
            (None, None) => Method::GET,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionConfig {
    pub res_version: String,
    pub client_version: String,
}

impl VersionConfig {
    fn from_value(data: &Value) -> Result<Self> {
        let field = |name: &str| {
            data.get(name)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| ArkError::unexpected(format!("version config is missing {name}")))
        };
        Ok(Self {
            res_version: field("resVersion")?,
            client_version: field("clientVersion")?,
        })
    }
}

#[derive(Debug)]
pub struct NetworkSession {
    client: Client,
    default_server: Option<ArknightsServer>,
    routes: HashMap<ArknightsServer, String>,
    passports: HashMap<ArknightsServer, String>,
    domains: RwLock<HashMap<ArknightsServer, HashMap<String, String>>>,
    versions: RwLock<HashMap<ArknightsServer, VersionConfig>>,
}

impl NetworkSession {
    pub fn new(default_server: Option<ArknightsServer>) -> Result<Self> {
        Self::build(default_server, DEFAULT_TIMEOUT_SECONDS)
    }

    pub fn from_config(config: &NetworkConfig) -> Result<Self> {
        let mut session = Self::build(config.default_server()?, config.timeout_seconds())?;
        session.routes.extend(config.route_overrides()?);
        session.passports.extend(config.passport_overrides()?);
        Ok(session)
    }

    fn build(default_server: Option<ArknightsServer>, timeout_seconds: u64) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            HeaderName::from_static("x-unity-version"),
            HeaderValue::from_static(UNITY_VERSION),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static(DEVICE_USER_AGENT));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            default_server,
            routes: HashMap::new(),
            passports: HashMap::new(),
            domains: RwLock::new(HashMap::new()),
            versions: RwLock::new(HashMap::new()),
        })
    }

    /// Replace the network configuration URL of a server.
    pub fn with_route(mut self, server: ArknightsServer, url: impl Into<String>) -> Self {
        self.routes.insert(server, url.into());
        self
    }

    /// Replace the Yostar passport URL of a server.
    pub fn with_passport(mut self, server: ArknightsServer, url: impl Into<String>) -> Self {
        self.passports.insert(server, url.into());
        self
    }

    pub fn default_server(&self) -> Option<ArknightsServer> {
        self.default_server
    }

    pub fn route(&self, server: ArknightsServer) -> String {
        self.routes
            .get(&server)
            .cloned()
            .unwrap_or_else(|| server.network_route().to_string())
    }

    pub fn passport_url(&self, server: ArknightsServer) -> Result<String> {
        self.passports
            .get(&server)
            .cloned()
            .or_else(|| server.passport_route().map(str::to_string))
            .ok_or_else(|| ArkError::UnsupportedServer {
                server: server.to_string(),
                reason: "no Yostar passport for this server".to_string(),
            })
    }

    fn resolve_server(&self, server: Option<ArknightsServer>) -> Result<ArknightsServer> {
        server
            .or(self.default_server)
            .ok_or(ArkError::NoDefaultServer)
    }

    /// Send a request to an arbitrary URL with the game client headers.
    pub async fn raw_request(
        &self,
        method: Method,
        url: &str,
        headers: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let mut builder = self.client.request(method, url);
        for (name, value) in headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        read_response(builder).await
    }

    /// POST a form-encoded body to an arbitrary URL, as the distributor SDKs do.
    pub async fn form_request(&self, url: &str, form: &[(String, String)]) -> Result<Value> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(form)
            .finish();

        tracing::debug!("📡 POST {} (form)", url);
        let builder = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body);
        read_response(builder).await
    }

    /// Send a request to a domain of a game server.
    pub async fn request(
        &self,
        domain: ArknightsDomain,
        request: ApiRequest,
        server: Option<ArknightsServer>,
    ) -> Result<Value> {
        let server = self.resolve_server(server)?;
        let url = self.domain_url(server, domain).await?;
        self.request_url(&url, request).await
    }

    /// Send a request to an absolute URL and check the game `result` code.
    pub async fn request_url(&self, url: &str, request: ApiRequest) -> Result<Value> {
        let mut url = url.replace("{0}", "Android");
        if let Some(endpoint) = &request.endpoint {
            url = format!("{url}/{endpoint}");
        }
        let method = request.resolved_method();

        tracing::debug!("📡 {} {}", method, url);
        let data = self
            .raw_request(method, &url, &request.headers, request.body.as_ref())
            .await?;

        check_result(data)
    }

    async fn domain_url(&self, server: ArknightsServer, domain: ArknightsDomain) -> Result<String> {
        let loaded = self.domains.read().await.contains_key(&server);
        if !loaded {
            self.load_network_config(server).await?;
        }

        self.domains
            .read()
            .await
            .get(&server)
            .and_then(|domains| domains.get(domain.as_str()))
            .cloned()
            .ok_or_else(|| ArkError::InvalidDomain {
                server: server.to_string(),
                domain: domain.to_string(),
            })
    }

    pub async fn load_network_config(&self, server: ArknightsServer) -> Result<()> {
        tracing::debug!("Loading network configuration for {}", server);
        let data = self.request_url(&self.route(server), ApiRequest::default()).await?;

        let content = data
            .get("content")
            .and_then(Value::as_str)
            .ok_or_else(|| ArkError::unexpected("network config has no content"))?;
        let content: Value = serde_json::from_str(content)?;

        let func_ver = content
            .get("funcVer")
            .and_then(Value::as_str)
            .ok_or_else(|| ArkError::unexpected("network config has no funcVer"))?;
        let network = content
            .get("configs")
            .and_then(|configs| configs.get(func_ver))
            .and_then(|config| config.get("network"))
            .and_then(Value::as_object)
            .ok_or_else(|| {
                ArkError::unexpected(format!("network config has no network for {func_ver}"))
            })?;

        let routes: HashMap<String, String> = network
            .iter()
            .filter_map(|(key, value)| value.as_str().map(|url| (key.clone(), url.to_string())))
            .collect();

        self.domains
            .write()
            .await
            .entry(server)
            .or_default()
            .extend(routes);
        Ok(())
    }

    /// Load every server concurrently. Failures are logged and skipped.
    pub async fn load_all_network_configs(self: &Arc<Self>) {
        let mut tasks = JoinSet::new();
        for server in ArknightsServer::ALL {
            let network = Arc::clone(self);
            tasks.spawn(async move { (server, network.load_network_config(server).await) });
        }
        while let Some(joined) = tasks.join_next().await {
            if let Ok((server, Err(e))) = joined {
                tracing::warn!("Failed to load network config for {}: {}", server, e);
            }
        }
    }

    pub async fn load_version_config(&self, server: ArknightsServer) -> Result<VersionConfig> {
        tracing::debug!("Loading version configuration for {}", server);
        let data = self
            .request(ArknightsDomain::Hv, ApiRequest::default(), Some(server))
            .await?;
        let versions = VersionConfig::from_value(&data)?;

        self.versions.write().await.insert(server, versions.clone());
        Ok(versions)
    }

    pub async fn load_all_version_configs(self: &Arc<Self>) {
        let mut tasks = JoinSet::new();
        for server in ArknightsServer::ALL {
            let network = Arc::clone(self);
            tasks.spawn(async move { (server, network.load_version_config(server).await) });
        }
        while let Some(joined) = tasks.join_next().await {
            if let Ok((server, Err(e))) = joined {
                tracing::warn!("Failed to load version config for {}: {}", server, e);
            }
        }
    }

    /// Domain routes of a server, loading them on first use.
    pub async fn domains(&self, server: ArknightsServer) -> Result<HashMap<String, String>> {
        if let Some(domains) = self.domains.read().await.get(&server) {
            return Ok(domains.clone());
        }
        self.load_network_config(server).await?;
        Ok(self
            .domains
            .read()
            .await
            .get(&server)
            .cloned()
            .unwrap_or_default())
    }

    /// Client and resource versions of a server, loading them on first use.
    pub async fn versions(&self, server: ArknightsServer) -> Result<VersionConfig> {
        if let Some(versions) = self.versions.read().await.get(&server) {
            return Ok(versions.clone());
        }
        self.load_version_config(server).await
    }
}

async fn read_response(builder: reqwest::RequestBuilder) -> Result<Value> {
    let response = builder.send().await?;

    let status = response.status();
    let text = response.text().await?;

    let data: Value = match serde_json::from_str(&text) {
        Ok(data) => data,
        Err(_) if !status.is_success() => {
            return Err(ArkError::InvalidStatus {
                status: status.as_u16(),
                data: Value::String(text),
            })
        }
        Err(_) => return Err(ArkError::InvalidContentType { content: text }),
    };

    if data.get("error").is_some_and(convert::truthy) {
        return Err(ArkError::game_server(data));
    }

    if status.as_u16() != 200 {
        return Err(ArkError::InvalidStatus {
            status: status.as_u16(),
            data,
        });
    }

    Ok(data)
}

fn check_result(data: Value) -> Result<Value> {
    let result = data.get("result").and_then(Value::as_i64);
    match result {
        Some(result) if result != 0 => {
            if let Some(captcha) = data.get("captcha") {
                let field = |name: &str| {
                    captcha
                        .get(name)
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string()
                };
                return Err(ArkError::Geetest {
                    challenge: field("challenge"),
                    gt: field("gt"),
                    data,
                });
            }
            Err(ArkError::ResultCode { result, data })
        }
        _ => Ok(data),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_method_follows_body() {
        assert_eq!(ApiRequest::new("a").resolved_method(), Method::GET);
        assert_eq!(
            ApiRequest::new("a").json(json!({})).resolved_method(),
            Method::POST
        );
        assert_eq!(
            ApiRequest::new("a").method(Method::PUT).resolved_method(),
            Method::PUT
        );
    }

    #[test]
    fn test_check_result_passes_zero_and_missing() {
        assert!(check_result(json!({"result": 0})).is_ok());
        assert!(check_result(json!({"data": 1})).is_ok());
        assert!(check_result(json!({"result": "ok"})).is_ok());
    }

    #[test]
    fn test_check_result_raises_geetest_with_captcha() {
        let err = check_result(json!({
            "result": 1,
            "captcha": {"challenge": "abc", "gt": "def"}
        }))
        .unwrap_err();

        match err {
            ArkError::Geetest { challenge, gt, .. } => {
                assert_eq!(challenge, "abc");
                assert_eq!(gt, "def");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_check_result_raises_result_code() {
        let err = check_result(json!({"result": 5})).unwrap_err();
        assert!(matches!(err, ArkError::ResultCode { result: 5, .. }));
    }

    #[test]
    fn test_version_config_requires_both_fields() {
        let versions = VersionConfig::from_value(&json!({
            "resVersion": "24-01-01-00-00-00-abcdef",
            "clientVersion": "2.1.41"
        }))
        .unwrap();
        assert_eq!(versions.client_version, "2.1.41");

        assert!(VersionConfig::from_value(&json!({"resVersion": "x"})).is_err());
    }

    #[test]
    fn test_passport_url_is_only_known_for_yostar() {
        let network = NetworkSession::new(None).unwrap();
        assert_eq!(
            network.passport_url(ArknightsServer::Jp).unwrap(),
            "https://passport.arknights.jp"
        );
        assert!(network.passport_url(ArknightsServer::Cn).is_err());

        let network = network.with_passport(ArknightsServer::En, "http://localhost:1");
        assert_eq!(
            network.passport_url(ArknightsServer::En).unwrap(),
            "http://localhost:1"
        );
    }

    #[tokio::test]
    async fn test_request_without_server_fails() {
        let network = NetworkSession::new(None).unwrap();
        let err = network
            .request(ArknightsDomain::Gs, ApiRequest::new("x"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ArkError::NoDefaultServer));
    }
}
