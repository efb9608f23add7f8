use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration file structure for pipewright.
///
/// Holds the connection settings for the target GoCD server so manifests can
/// stay free of per-site details. Loaded from the current directory or a
/// specified path; every field can be overridden from the command line.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// GoCD server connection settings
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ServerConfig {
    /// GoCD server base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path to the credentials file (JSON `{login, password}` pair)
    #[serde(default = "default_credentials_file")]
    pub credentials_file: PathBuf,

    /// Skip TLS certificate verification (self-signed internal servers)
    #[serde(default)]
    pub insecure_skip_verify: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            credentials_file: default_credentials_file(),
            insecure_skip_verify: false,
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8153".to_string()
}

fn default_credentials_file() -> PathBuf {
    PathBuf::from("/etc/serve/gocd_credentials")
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./pipewright.toml
    /// 3. ./pipewright.json
    /// 4. ./pipewright.yaml
    /// 5. ./pipewright.yml
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        let candidates = [
            "pipewright.toml",
            "pipewright.json",
            "pipewright.yaml",
            "pipewright.yml",
        ];

        for candidate in &candidates {
            let path = Path::new(candidate);
            if path.exists() {
                return Self::load_from_path(path);
            }
        }

        Ok(Self::default())
    }

    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => toml::from_str(&contents)
                .or_else(|_| serde_json::from_str(&contents))
                .or_else(|_| serde_yaml::from_str(&contents))
                .with_context(|| format!("Failed to parse config file: {}", path.display())),
        }
    }
}

/// Basic-auth pair for the GoCD server, loaded from a trusted local file.
/// Treated as opaque; never logged.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

impl Credentials {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read credentials file: {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse credentials file: {}", path.display()))
    }
}
