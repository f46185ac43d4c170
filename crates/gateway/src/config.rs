//! Configuration management for the gateway.
//!
//! Loads, validates and converts the TOML configuration file.

use crate::cli::CliArgs;
use gateway_server::{SecurityConfig, ServerConfig, DEFAULT_OUTBOUND_BUFFER};
use module_registry::ModuleManifest;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Listener and routing settings
    pub server: ServerSettings,
    /// Inbound payload limits
    #[serde(default)]
    pub security: SecurityConfig,
    /// Modules registered at startup
    #[serde(default)]
    pub modules: ModuleSettings,
    /// Logging configuration settings
    pub logging: LoggingSettings,
}

/// Listener and routing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Address the HTTP surface binds to (e.g., "127.0.0.1:3000")
    pub http_bind_address: String,
    /// Address the socket surface binds to (e.g., "127.0.0.1:3001")
    pub socket_bind_address: String,
    /// Prefix every module route is mounted under, empty for the root
    #[serde(default)]
    pub mount_prefix: String,
    /// Prefix of the admin discovery endpoints
    #[serde(default = "default_admin_prefix")]
    pub admin_prefix: String,
    /// Maximum number of concurrent socket connections
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Module connect timeout in seconds
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,
    /// Module call deadline in milliseconds (0 to disable)
    #[serde(default)]
    pub rpc_timeout_ms: u64,
    /// Bearer token the admin endpoints require; unset closes the admin API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_token: Option<String>,
    /// Outbound frames buffered per socket connection
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,
}

fn default_admin_prefix() -> String {
    "/admin".to_string()
}

fn default_max_connections() -> usize {
    1000
}

fn default_outbound_buffer() -> usize {
    DEFAULT_OUTBOUND_BUFFER
}

/// Default for connection_timeout
pub fn default_connection_timeout() -> u64 {
    10
}

/// Modules the gateway registers itself on startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleSettings {
    #[serde(default)]
    pub static_modules: Vec<ModuleManifest>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to use JSON formatting for logs
    #[serde(default)]
    pub json_format: bool,
    /// Optional file to mirror logs into
    pub file_path: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                http_bind_address: "127.0.0.1:3000".to_string(),
                socket_bind_address: "127.0.0.1:3001".to_string(),
                mount_prefix: String::new(),
                admin_prefix: default_admin_prefix(),
                max_connections: default_max_connections(),
                connection_timeout: default_connection_timeout(),
                rpc_timeout_ms: 0,
                admin_token: None,
                outbound_buffer: default_outbound_buffer(),
            },
            security: SecurityConfig::default(),
            modules: ModuleSettings::default(),
            logging: LoggingSettings {
                level: "info".to_string(),
                json_format: false,
                file_path: None,
            },
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, a default configuration file is written at
    /// `path` and the default configuration is returned.
    pub async fn load_from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Applies command-line overrides on top of the loaded file.
    pub fn apply_overrides(&mut self, args: &CliArgs) {
        if let Some(bind_address) = &args.bind_address {
            self.server.http_bind_address = bind_address.clone();
        }
        if let Some(socket_bind_address) = &args.socket_bind_address {
            self.server.socket_bind_address = socket_bind_address.clone();
        }
        if let Some(log_level) = &args.log_level {
            self.logging.level = log_level.clone();
        }
        if args.json_logs {
            self.logging.json_format = true;
        }
    }

    /// Converts the application configuration to the server configuration.
    pub fn to_server_config(&self) -> Result<ServerConfig, Box<dyn std::error::Error>> {
        Ok(ServerConfig {
            http_bind_address: self.server.http_bind_address.parse()?,
            socket_bind_address: self.server.socket_bind_address.parse()?,
            mount_prefix: self.server.mount_prefix.clone(),
            admin_prefix: self.server.admin_prefix.clone(),
            max_connections: self.server.max_connections,
            connection_timeout: self.server.connection_timeout,
            rpc_timeout_ms: self.server.rpc_timeout_ms,
            admin_token: self.server.admin_token.clone(),
            outbound_buffer: self.server.outbound_buffer,
            security: self.security.clone(),
        })
    }

    pub fn validate(&self) -> Result<(), String> {
        // Validate bind addresses
        for address in [&self.server.http_bind_address, &self.server.socket_bind_address] {
            if address.parse::<SocketAddr>().is_err() {
                return Err(format!("Invalid bind address: {address}"));
            }
        }
        if self.server.http_bind_address == self.server.socket_bind_address {
            return Err("HTTP and socket listeners cannot share an address".to_string());
        }

        // Validate prefixes
        let mount = &self.server.mount_prefix;
        if !mount.is_empty() && (!mount.starts_with('/') || mount.ends_with('/')) {
            return Err(format!(
                "Mount prefix '{mount}' must be empty or start with '/' and not end with '/'"
            ));
        }
        let admin = &self.server.admin_prefix;
        if !admin.starts_with('/') || admin.len() < 2 || admin.ends_with('/') {
            return Err(format!("Admin prefix '{admin}' must start with '/' and not end with '/'"));
        }
        if admin == mount {
            return Err("Admin prefix cannot equal the mount prefix".to_string());
        }

        if self.server.max_connections == 0 {
            return Err("server.max_connections must be greater than 0".to_string());
        }
        if self.server.outbound_buffer == 0 {
            return Err("server.outbound_buffer must be greater than 0".to_string());
        }
        if let Some(token) = &self.server.admin_token {
            if token.trim().is_empty() {
                return Err("server.admin_token must not be blank; remove it to close the admin API".to_string());
            }
        }
        if self.security.max_message_size == 0 || self.security.max_body_size == 0 {
            return Err("security size limits must be greater than 0".to_string());
        }

        for manifest in &self.modules.static_modules {
            manifest
                .validate()
                .map_err(|e| format!("Static module '{}': {e}", manifest.name))?;
        }

        // Validate log level
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();

        assert_eq!(config.server.http_bind_address, "127.0.0.1:3000");
        assert_eq!(config.server.socket_bind_address, "127.0.0.1:3001");
        assert_eq!(config.server.mount_prefix, "");
        assert_eq!(config.server.admin_prefix, "/admin");
        assert_eq!(config.server.rpc_timeout_ms, 0);
        assert!(config.server.admin_token.is_none());
        assert_eq!(config.server.outbound_buffer, 1000);
        assert!(config.modules.static_modules.is_empty());
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json_format);
        assert!(config.logging.file_path.is_none());
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_load_from_nonexistent_file_writes_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let config = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(config.server.http_bind_address, "127.0.0.1:3000");
        assert!(path.exists());

        // The written file loads back to the same settings
        let reloaded = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(reloaded.server.admin_prefix, "/admin");
        assert_eq!(reloaded.security.max_json_depth, config.security.max_json_depth);
    }

    #[tokio::test]
    async fn test_load_from_existing_file() {
        let toml_content = r#"
[server]
http_bind_address = "0.0.0.0:8080"
socket_bind_address = "0.0.0.0:8081"
mount_prefix = "/api"
rpc_timeout_ms = 2500
admin_token = "s3cret"
outbound_buffer = 64

[security]
max_json_depth = 8

[[modules.static_modules]]
name = "email"
url = "http://127.0.0.1:5001"
sockets = [{ path = "/email-events" }]

[[modules.static_modules.routes]]
path = "/email/send"
action = "POST"
handler = "sendEmail"

[logging]
level = "debug"
json_format = true
"#;
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(toml_content.as_bytes()).unwrap();

        let config = AppConfig::load_from_file(&file.path().to_path_buf()).await.unwrap();
        assert_eq!(config.server.mount_prefix, "/api");
        assert_eq!(config.server.admin_prefix, "/admin");
        assert_eq!(config.server.max_connections, 1000);
        assert_eq!(config.server.rpc_timeout_ms, 2500);
        assert_eq!(config.server.admin_token.as_deref(), Some("s3cret"));
        assert_eq!(config.server.outbound_buffer, 64);
        assert_eq!(config.security.max_json_depth, 8);
        assert_eq!(config.security.max_body_size, SecurityConfig::default().max_body_size);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json_format);

        let email = &config.modules.static_modules[0];
        assert_eq!(email.name, "email");
        assert_eq!(email.routes[0].handler, "sendEmail");
        assert_eq!(email.sockets[0].path, "/email-events");
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_load_malformed_file_fails() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"[server\nhttp_bind_address = ").unwrap();
        assert!(AppConfig::load_from_file(&file.path().to_path_buf()).await.is_err());
    }

    #[test]
    fn test_validation() {
        let mut config = AppConfig::default();
        config.server.http_bind_address = "invalid".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.server.socket_bind_address = config.server.http_bind_address.clone();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.server.mount_prefix = "api".to_string();
        assert!(config.validate().is_err());
        config.server.mount_prefix = "/api/".to_string();
        assert!(config.validate().is_err());
        config.server.mount_prefix = "/api".to_string();
        assert!(config.validate().is_ok());
        config.server.admin_prefix = "/api".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.server.admin_prefix = "/".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.modules.static_modules.push(ModuleManifest::new("bad name", "http://x"));
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.server.admin_token = Some("  ".to_string());
        assert!(config.validate().is_err());
        config.server.admin_token = Some("s3cret".to_string());
        assert!(config.validate().is_ok());

        let mut config = AppConfig::default();
        config.server.outbound_buffer = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = AppConfig::default();
        let args = CliArgs {
            config_path: PathBuf::from("gateway.toml"),
            bind_address: Some("0.0.0.0:80".to_string()),
            socket_bind_address: None,
            log_level: Some("trace".to_string()),
            json_logs: true,
        };
        config.apply_overrides(&args);

        assert_eq!(config.server.http_bind_address, "0.0.0.0:80");
        assert_eq!(config.server.socket_bind_address, "127.0.0.1:3001");
        assert_eq!(config.logging.level, "trace");
        assert!(config.logging.json_format);
    }

    #[test]
    fn test_to_server_config() {
        let mut config = AppConfig::default();
        config.server.mount_prefix = "/api".to_string();
        config.server.rpc_timeout_ms = 750;
        config.server.admin_token = Some("s3cret".to_string());
        config.server.outbound_buffer = 32;

        let server_config = config.to_server_config().unwrap();
        assert_eq!(server_config.http_bind_address, "127.0.0.1:3000".parse::<SocketAddr>().unwrap());
        assert_eq!(server_config.socket_bind_address, "127.0.0.1:3001".parse::<SocketAddr>().unwrap());
        assert_eq!(server_config.mount_prefix, "/api");
        assert_eq!(server_config.admin_prefix, "/admin");
        assert_eq!(server_config.connection_timeout, 10);
        assert_eq!(server_config.rpc_timeout_ms, 750);
        assert_eq!(server_config.admin_token.as_deref(), Some("s3cret"));
        assert_eq!(server_config.outbound_buffer, 32);

        config.server.http_bind_address = "nowhere".to_string();
        assert!(config.to_server_config().is_err());
    }
}
