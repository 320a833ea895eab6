use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArkError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("Base64 decoding failed: {0}")]
    Base64Error(#[from] base64::DecodeError),

    #[error("Not logged in")]
    NotLoggedIn,

    #[error("This client can only access public data")]
    PrivateDataRequired,

    #[error("No default server set")]
    NoDefaultServer,

    #[error("Single-session client is bound to {bound} server, got {requested}")]
    ServerMismatch { bound: String, requested: String },

    #[error("Server {server} is not supported: {reason}")]
    UnsupportedServer { server: String, reason: String },

    #[error("Invalid domain {domain} for server {server}")]
    InvalidDomain { server: String, domain: String },

    #[error("[{result}] Arknights error: {data}")]
    ResultCode { result: i64, data: Value },

    #[error("Game server error [{status_code}] {error}: {msg}")]
    GameServer {
        status_code: u16,
        error: String,
        code: i64,
        msg: String,
        info: Value,
        data: Value,
    },

    #[error("Geetest verification is required (gt: {gt}, challenge: {challenge})")]
    Geetest {
        challenge: String,
        gt: String,
        data: Value,
    },

    #[error("[{status}] Invalid response status: {data}")]
    InvalidStatus { status: u16, data: Value },

    #[error("Invalid content type: {content}")]
    InvalidContentType { content: String },

    #[error("Unexpected response: {message}")]
    UnexpectedResponse { message: String },

    #[error("Static data not found: {message}")]
    StaticDataNotFound { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for {field}: {value} ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

impl ArkError {
    /// Build a game server error from a response carrying an `error` field.
    pub fn game_server(data: Value) -> Self {
        let status_code = data
            .get("statusCode")
            .and_then(Value::as_u64)
            .and_then(|code| u16::try_from(code).ok())
            .unwrap_or(400);
        let error = data
            .get("error")
            .map(|e| match e {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_default();
        let code = data.get("code").and_then(Value::as_i64).unwrap_or(0);
        let msg = data
            .get("msg")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        // info arrives as a JSON document embedded in a string
        let info = data
            .get("info")
            .and_then(Value::as_str)
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_else(|| Value::Object(Default::default()));

        ArkError::GameServer {
            status_code,
            error,
            code,
            msg,
            info,
            data,
        }
    }

    /// Whether the game server rejected the session secret.
    pub fn is_session_expired(&self) -> bool {
        matches!(
            self,
            ArkError::GameServer {
                status_code: 401,
                ..
            } | ArkError::InvalidStatus { status: 401, .. }
        )
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        ArkError::UnexpectedResponse {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ArkError>;
