use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};
use crate::escape::EscapeStrategy;

/// Which wire transport a connection drives.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// Row-streaming transport (`tcp` in older configs).
    #[default]
    #[serde(alias = "tcp")]
    Streaming,
    /// Batch transport with ping and async submit (`http` in older configs).
    #[serde(alias = "http")]
    Batch,
}

/// Connection options. Missing keys take the defaults below.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConnectionConfig {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub mode: TransportMode,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub database: String,
    #[serde(alias = "useTLS", alias = "https")]
    pub use_tls: bool,
    #[serde(alias = "readOnly", alias = "readonly")]
    pub read_only: bool,
    /// Batch transport only: submit then execute instead of a direct write.
    #[serde(rename = "async")]
    pub async_mode: bool,
    /// Prepended to every table name by both grammars.
    pub prefix: String,
    pub escaping: EscapeStrategy,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            name: String::from("default"),
            host: String::from("127.0.0.1"),
            port: 8123,
            mode: TransportMode::default(),
            username: String::from("default"),
            password: String::new(),
            database: String::from("default"),
            use_tls: false,
            read_only: false,
            async_mode: false,
            prefix: String::new(),
            escaping: EscapeStrategy::default(),
        }
    }
}

impl ConnectionConfig {
    pub fn scheme(&self) -> &'static str {
        if self.use_tls {
            "https"
        } else {
            "http"
        }
    }

    pub fn base_url(&self) -> Result<Url> {
        Ok(Url::parse(&format!(
            "{}://{}:{}/",
            self.scheme(),
            self.host,
            self.port
        ))?)
    }

    pub fn display_string(&self) -> String {
        format!(
            "{}@{}:{}/{} ({:?})",
            self.username, self.host, self.port, self.database, self.mode
        )
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("chgrammar")
            .join("connections.toml")
    }

    pub fn load_saved_connections() -> Result<Vec<ConnectionConfig>> {
        Self::load_connections_from(&Self::config_path())
    }

    pub fn load_connections_from(path: &Path) -> Result<Vec<ConnectionConfig>> {
        if !path.exists() {
            return Ok(vec![]);
        }
        let content = std::fs::read_to_string(path)?;
        let saved: SavedConnections = toml::from_str(&content)?;
        Ok(saved.connections)
    }

    pub fn save_connections(connections: &[ConnectionConfig]) -> Result<()> {
        Self::save_connections_to(&Self::config_path(), connections)
    }

    pub fn save_connections_to(path: &Path, connections: &[ConnectionConfig]) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let saved = SavedConnections {
            connections: connections.to_vec(),
        };
        let content = toml::to_string_pretty(&saved)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn find_saved(name: &str) -> Result<ConnectionConfig> {
        Self::load_saved_connections()?
            .into_iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::Config(format!("no saved connection named {:?}", name)))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SavedConnections {
    connections: Vec<ConnectionConfig>,
}
