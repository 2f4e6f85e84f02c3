//! Configuration loading from TOML files.
//!
//! Lookup order:
//! 1. `$TRIALMCP_CONFIG` environment variable
//! 2. `~/.config/trialmcp/config.toml`
//! 3. Built-in defaults (everything is optional)
//!
//! AACT connection fields can be overridden with `DB_HOST`, `DB_PORT`, `DB_USER`,
//! `DB_PASSWORD` and `DB_NAME`, which take precedence over the file.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use trialmcp_aact::database::{DEFAULT_DATABASE, DEFAULT_HOST, DEFAULT_PORT};
use trialmcp_aact::ConnectionSettings;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub aact: AactConfig,
    pub openfda: OpenFdaConfig,
    pub mcp: McpConfig,
}

/// AACT database settings.
#[derive(Deserialize)]
#[serde(default)]
pub struct AactConfig {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: String,
    pub connect_timeout_secs: u64,
}

/// openFDA API settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OpenFdaConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Passed through as the `api_key` query parameter.
    pub api_key: Option<String>,
    pub default_endpoint: String,
    pub default_limit: u32,
}

/// MCP server settings.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct McpConfig {
    /// Replaces the built-in server instructions.
    pub instructions: Option<String>,
}

// --- Defaults ---

impl Default for AactConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT,
            user: None,
            password: None,
            database: DEFAULT_DATABASE.into(),
            connect_timeout_secs: 10,
        }
    }
}

impl std::fmt::Debug for AactConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AactConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("database", &self.database)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish_non_exhaustive()
    }
}

impl Default for OpenFdaConfig {
    fn default() -> Self {
        Self {
            base_url: trialmcp_openfda::client::BASE_URL.into(),
            timeout_secs: 10,
            api_key: None,
            default_endpoint: trialmcp_openfda::DEFAULT_ENDPOINT.into(),
            default_limit: 1,
        }
    }
}

impl AactConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            password: self.password.clone(),
            database: self.database.clone(),
        }
    }

    /// Apply `DB_*` overrides. Empty values are ignored.
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        let var = |name: &str| var(name).filter(|v| !v.is_empty());

        if let Some(host) = var("DB_HOST") {
            self.host = host;
        }
        if let Some(port) = var("DB_PORT") {
            self.port = port
                .parse()
                .with_context(|| format!("DB_PORT is not a port number: {port}"))?;
        }
        if let Some(user) = var("DB_USER") {
            self.user = Some(user);
        }
        if let Some(password) = var("DB_PASSWORD") {
            self.password = Some(password);
        }
        if let Some(database) = var("DB_NAME") {
            self.database = database;
        }
        Ok(())
    }
}

impl OpenFdaConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Load config from disk, then apply environment overrides. Uses defaults if no config file
/// exists.
pub fn load_config() -> Result<Config> {
    let mut config = read_config_file()?;
    config.aact.apply_env(|name| std::env::var(name).ok())?;
    Ok(config)
}

fn read_config_file() -> Result<Config> {
    if let Some(p) = config_path() {
        if p.exists() {
            let content =
                std::fs::read_to_string(&p).with_context(|| format!("reading {}", p.display()))?;
            let config: Config =
                toml::from_str(&content).with_context(|| format!("parsing {}", p.display()))?;
            return Ok(config);
        }
    }

    Ok(Config::default())
}

/// Resolve the config file path.
fn config_path() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("TRIALMCP_CONFIG") {
        return Some(PathBuf::from(p));
    }

    std::env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".config").join("trialmcp").join("config.toml"))
}

/// Show the active config path (for `trialmcp config`).
pub fn show_config_path() -> String {
    match config_path() {
        Some(p) if p.exists() => format!("{} (loaded)", p.display()),
        Some(p) => format!("{} (not found, using defaults)", p.display()),
        None => "no config path resolved (using defaults)".into(),
    }
}
