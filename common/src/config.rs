use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_host() -> String {
    "0.0.0.0".to_string()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_grpc_port")]
    pub grpc_port: u16,
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
}
fn default_grpc_port() -> u16 {
    50051
}
fn default_max_workers() -> usize {
    10
}

impl Default for ServerSection {
    fn default() -> Self {
        ServerSection {
            host: default_host(),
            grpc_port: default_grpc_port(),
            max_workers: default_max_workers(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatabaseSection {
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval: u64,
    #[serde(default = "default_peer_timeout")]
    pub peer_timeout: u64,
}
fn default_cleanup_interval() -> u64 {
    300
}
fn default_peer_timeout() -> u64 {
    120
}

impl Default for DatabaseSection {
    fn default() -> Self {
        DatabaseSection {
            cleanup_interval: default_cleanup_interval(),
            peer_timeout: default_peer_timeout(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SecuritySection {
    #[serde(default = "default_true")]
    pub enable_auth: bool,
    /// Reserved: parsed but not enforced (spec.md §9 Open Question b).
    #[serde(default = "default_token_expiry")]
    pub token_expiry: u64,
    #[serde(default = "default_max_login_attempts")]
    pub max_login_attempts: u32,
}
fn default_true() -> bool {
    true
}
fn default_token_expiry() -> u64 {
    3600
}
fn default_max_login_attempts() -> u32 {
    3
}

impl Default for SecuritySection {
    fn default() -> Self {
        SecuritySection {
            enable_auth: default_true(),
            token_expiry: default_token_expiry(),
            max_login_attempts: default_max_login_attempts(),
        }
    }
}

/// Configuration for the `netshare-directory` binary, per spec.md §6.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct DirectoryConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub database: DatabaseSection,
    #[serde(default)]
    pub security: SecuritySection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PeerSection {
    pub peer_id: String,
    pub username: String,
    pub password: String,
}
impl Default for PeerSection {
    fn default() -> Self {
        PeerSection {
            peer_id: "peer-001".to_string(),
            username: "peer_user".to_string(),
            password: "peer_pass".to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NetworkSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_rest_port")]
    pub rest_port: u16,
    #[serde(default = "default_server_url")]
    pub server_url: String,
}
fn default_rest_port() -> u16 {
    8081
}
fn default_server_url() -> String {
    "http://127.0.0.1:50051".to_string()
}

impl Default for NetworkSection {
    fn default() -> Self {
        NetworkSection {
            host: default_host(),
            rest_port: default_rest_port(),
            server_url: default_server_url(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FilesSection {
    #[serde(default = "default_shared_directory")]
    pub shared_directory: String,
    /// spec.md §4.3 tightens the upload cap to 50 MiB (the original
    /// Python default was 100 MiB).
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Parsed and retained; enforcement is optional (spec.md §9 Open
    /// Question c).
    #[serde(default)]
    pub allowed_extensions: Vec<String>,
    #[serde(default = "default_scan_interval")]
    pub scan_interval: u64,
}
fn default_shared_directory() -> String {
    "./shared_files".to_string()
}
fn default_max_file_size() -> u64 {
    50 * 1024 * 1024
}
fn default_scan_interval() -> u64 {
    60
}

impl Default for FilesSection {
    fn default() -> Self {
        FilesSection {
            shared_directory: default_shared_directory(),
            max_file_size: default_max_file_size(),
            allowed_extensions: Vec::new(),
            scan_interval: default_scan_interval(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PeersSection {
    #[serde(default)]
    pub primary_friend: String,
    #[serde(default)]
    pub backup_friend: String,
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval: u64,
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,
}
fn default_heartbeat_interval() -> u64 {
    30
}
fn default_connection_timeout() -> u64 {
    10
}

impl Default for PeersSection {
    fn default() -> Self {
        PeersSection {
            primary_friend: String::new(),
            backup_friend: String::new(),
            heartbeat_interval: default_heartbeat_interval(),
            connection_timeout: default_connection_timeout(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".to_string()
}
impl Default for LoggingSection {
    fn default() -> Self {
        LoggingSection {
            level: default_log_level(),
        }
    }
}

/// Configuration for the `netshare-peer` binary, per spec.md §6.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct PeerConfig {
    pub peer: PeerSection,
    #[serde(default)]
    pub network: NetworkSection,
    #[serde(default)]
    pub files: FilesSection,
    #[serde(default)]
    pub peers: PeersSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

impl DirectoryConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }
}

impl PeerConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_config_parses_partial_toml() {
        let cfg: DirectoryConfig = toml::from_str(
            r#"
            [database]
            peer_timeout = 60
            "#,
        )
        .unwrap();

        assert_eq!(cfg.database.peer_timeout, 60);
        assert_eq!(cfg.database.cleanup_interval, 300);
        assert_eq!(cfg.server.grpc_port, 50051);
    }

    #[test]
    fn peer_config_requires_identity() {
        let cfg: PeerConfig = toml::from_str(
            r#"
            [peer]
            peer_id = "peer-a"
            username = "alice"
            password = "secret"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.peer.peer_id, "peer-a");
        assert_eq!(cfg.files.max_file_size, 50 * 1024 * 1024);
    }
}
