//! Application configuration loaded from environment variables.

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Chat bot gateway configuration
    #[serde(default)]
    pub chat: ChatConfig,

    /// Voice-server admin daemon configuration
    pub directory: DirectoryConfig,

    /// Connection facts handed out to registered users
    pub server: ServerConfig,

    /// Registration workflow configuration
    #[serde(default)]
    pub registration: RegistrationConfig,

    /// Web registration configuration
    #[serde(default)]
    pub web: WebConfig,

    /// Durable store configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Reconciliation sweep configuration
    #[serde(default)]
    pub cleanup: CleanupConfig,

    /// Gateway process configuration
    #[serde(default)]
    pub gateway: GatewayConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    /// Chat bot gateway REST endpoint
    #[serde(default = "default_chat_service")]
    pub service_url: String,

    /// Poll interval for updates
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryConfig {
    /// Admin daemon REST endpoint
    pub service_url: String,

    /// Optional bearer token for the admin daemon
    #[serde(default)]
    pub api_token: Option<SecretString>,

    /// Poll interval for the account event feed
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub event_poll_interval: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Display name shown in the client's server list
    #[serde(default = "default_server_name")]
    pub name: String,

    /// Hostname of the voice server
    pub host: String,

    /// Hostname handed out to end users, when it differs from `host`
    #[serde(default)]
    pub public_host: Option<String>,

    #[serde(default = "default_tcp_port", deserialize_with = "de::port")]
    pub tcp_port: u16,

    /// Defaults to the TCP port when unset
    #[serde(default, deserialize_with = "de::port_opt")]
    pub udp_port: Option<u16>,

    #[serde(default, deserialize_with = "de::flag")]
    pub encrypted: bool,
}

impl ServerConfig {
    pub fn udp_port(&self) -> u16 {
        self.udp_port.unwrap_or(self.tcp_port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationConfig {
    /// Gate non-admin registrations behind admin approval
    #[serde(default, deserialize_with = "de::flag")]
    pub require_approval: bool,

    /// Comma-separated chat ids with admin powers
    #[serde(default)]
    pub admin_ids: String,

    /// Skip language selection and force this locale
    #[serde(default)]
    pub forced_language: Option<String>,

    /// Announce successful registrations on the voice server
    #[serde(default = "default_true", deserialize_with = "de::flag")]
    pub broadcast_enabled: bool,

    /// Comma-separated right names granted to new accounts
    #[serde(default = "default_rights")]
    pub default_rights: String,
}

impl RegistrationConfig {
    pub fn admin_ids(&self) -> Vec<String> {
        split_csv(&self.admin_ids)
    }

    pub fn default_rights(&self) -> Vec<String> {
        split_csv(&self.default_rights)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    #[serde(default, deserialize_with = "de::flag")]
    pub enabled: bool,

    #[serde(default = "default_web_bind")]
    pub bind_addr: SocketAddr,

    /// Client template directory for downloadable bundles
    #[serde(default)]
    pub client_template_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory for store snapshots and generated artifacts
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl StorageConfig {
    pub fn identity_path(&self) -> PathBuf {
        self.data_dir.join("identity.json")
    }

    pub fn tokens_path(&self) -> PathBuf {
        self.data_dir.join("tokens.json")
    }

    pub fn files_dir(&self) -> PathBuf {
        self.data_dir.join("generated_files")
    }

    pub fn bundles_dir(&self) -> PathBuf {
        self.data_dir.join("generated_bundles")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CleanupConfig {
    /// How often the reconciliation sweep runs
    #[serde(default = "default_cleanup_interval", with = "humantime_serde")]
    pub interval: Duration,

    /// TTL for pending (awaiting-approval) registrations
    #[serde(default = "default_pending_ttl", with = "humantime_serde")]
    pub pending_ttl: Duration,

    /// TTL for web registration IP records
    #[serde(default = "default_ip_ttl", with = "humantime_serde")]
    pub ip_ttl: Duration,

    /// TTL for artifact download tokens
    #[serde(default = "default_token_ttl", with = "humantime_serde")]
    pub token_ttl: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default implementations
impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            service_url: default_chat_service(),
            poll_interval: default_poll_interval(),
        }
    }
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            require_approval: false,
            admin_ids: String::new(),
            forced_language: None,
            broadcast_enabled: default_true(),
            default_rights: default_rights(),
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_addr: default_web_bind(),
            client_template_dir: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval: default_cleanup_interval(),
            pending_ttl: default_pending_ttl(),
            ip_ttl: default_ip_ttl(),
            token_ttl: default_token_ttl(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

// Default value functions
fn default_chat_service() -> String {
    "http://chat-gateway:8081".into()
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_server_name() -> String {
    "Voice Server".into()
}

fn default_tcp_port() -> u16 {
    10333
}

fn default_web_bind() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_cleanup_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_pending_ttl() -> Duration {
    Duration::from_secs(3600)
}

fn default_ip_ttl() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

fn default_token_ttl() -> Duration {
    Duration::from_secs(600)
}

fn default_log_level() -> String {
    "info".into()
}

fn default_true() -> bool {
    true
}

fn default_rights() -> String {
    "MULTI_LOGIN,VIEW_ALL_USERS,CREATE_TEMPORARY_CHANNEL,UPLOAD_FILES,DOWNLOAD_FILES,\
     TRANSMIT_VOICE,TRANSMIT_VIDEOCAPTURE,TRANSMIT_DESKTOP,TRANSMIT_DESKTOPINPUT,\
     TRANSMIT_MEDIAFILE,TEXTMESSAGE_USER,TEXTMESSAGE_CHANNEL"
        .into()
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Deserializers tolerant of string-typed environment values.
///
/// Environment sources are read with `try_parsing(false)` so opaque ids
/// keep their leading zeroes and `+` prefixes; flags and ports then arrive
/// as strings and are parsed here.
mod de {
    use serde::de::{Deserializer, Error, Unexpected};
    use serde::Deserialize;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Num(u64),
        Text(String),
    }

    pub fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Bool(b) => Ok(b),
            Raw::Num(n) => Ok(n != 0),
            Raw::Text(s) => match s.trim() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" | "" => Ok(false),
                other => Err(D::Error::invalid_value(
                    Unexpected::Str(other),
                    &"a boolean flag",
                )),
            },
        }
    }

    pub fn port<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u16, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Bool(_) => Err(D::Error::custom("expected a port number")),
            Raw::Num(n) => u16::try_from(n).map_err(|_| D::Error::custom("port out of range")),
            Raw::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| D::Error::invalid_value(Unexpected::Str(&s), &"a port number")),
        }
    }

    pub fn port_opt<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<u16>, D::Error> {
        let raw: Option<Raw> = Option::deserialize(deserializer)?;
        match raw {
            None => Ok(None),
            Some(Raw::Bool(_)) => Err(D::Error::custom("expected a port number")),
            Some(Raw::Num(n)) => u16::try_from(n)
                .map(Some)
                .map_err(|_| D::Error::custom("port out of range")),
            Some(Raw::Text(s)) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Ok(None);
                }
                trimmed
                    .parse()
                    .map(Some)
                    .map_err(|_| D::Error::invalid_value(Unexpected::Str(&s), &"a port number"))
            }
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    // Registrant and admin ids are opaque strings; parsing
                    // them as numbers would strip prefixes and zeroes.
                    .try_parsing(false),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> Config {
        serde_json::from_value(serde_json::json!({
            "directory": { "service_url": "http://directory:9000" },
            "server": { "host": "voice.example.org" }
        }))
        .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = minimal();
        assert_eq!(config.server.tcp_port, 10333);
        assert_eq!(config.server.udp_port(), 10333);
        assert!(!config.server.encrypted);
        assert!(!config.registration.require_approval);
        assert!(config.registration.broadcast_enabled);
        assert!(config.registration.admin_ids().is_empty());
        assert!(!config.web.enabled);
        assert_eq!(config.cleanup.token_ttl, Duration::from_secs(600));
        assert_eq!(config.gateway.log_level, "info");
    }

    #[test]
    fn test_string_typed_flags_and_ports() {
        let config: Config = serde_json::from_value(serde_json::json!({
            "directory": { "service_url": "http://directory:9000" },
            "server": {
                "host": "voice.example.org",
                "tcp_port": "10555",
                "encrypted": "1"
            },
            "registration": {
                "require_approval": "true",
                "admin_ids": "100, 200 ,,300"
            }
        }))
        .unwrap();

        assert_eq!(config.server.tcp_port, 10555);
        assert_eq!(config.server.udp_port(), 10555);
        assert!(config.server.encrypted);
        assert!(config.registration.require_approval);
        assert_eq!(config.registration.admin_ids(), vec!["100", "200", "300"]);
    }

    #[test]
    fn test_udp_port_falls_back_to_tcp() {
        let config: Config = serde_json::from_value(serde_json::json!({
            "directory": { "service_url": "http://directory:9000" },
            "server": {
                "host": "voice.example.org",
                "tcp_port": 10555,
                "udp_port": 10666
            }
        }))
        .unwrap();
        assert_eq!(config.server.udp_port(), 10666);

        let config = minimal();
        assert_eq!(config.server.udp_port(), config.server.tcp_port);
    }

    #[test]
    fn test_default_rights_parse() {
        let config = minimal();
        let rights = config.registration.default_rights();
        assert!(rights.contains(&"TRANSMIT_VOICE".to_string()));
        assert!(rights.len() > 5);
    }
}
