use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::time::Duration;

const DEFAULT_PORT: u16 = 8888;
const DEFAULT_UPLOAD_TTL_SECS: u64 = 1800;
const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 60;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_MAX_STORED_UPLOADS: usize = 64;

// YAML-serializable configuration structure
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct ConfigYaml {
    pub node_name: Option<String>,
    pub environment: Option<String>,
    pub port: Option<u16>,
    pub upload_ttl_secs: Option<u64>,
    pub cleanup_interval_secs: Option<u64>,
    pub max_upload_bytes: Option<usize>,
    pub max_stored_uploads: Option<usize>,
    pub chart_width: Option<u32>,
}

// Holds application-wide settings
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub node_name: String,
    pub environment: String,
    pub port: u16,
    /// How long an uploaded workbook stays available for sheet switching
    pub upload_ttl: Duration,
    pub cleanup_interval: Duration,
    pub max_upload_bytes: usize,
    pub max_stored_uploads: usize,
    pub chart_width: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_yaml_config(ConfigYaml::default())
    }
}

impl AppConfig {
    // Load configuration from YAML file or environment variables
    pub fn load() -> anyhow::Result<Self> {
        // Check for CONFIG_FILE environment variable first
        if let Ok(config_file) = env::var("CONFIG_FILE") {
            Self::from_yaml(&config_file)
        } else {
            Self::from_env()
        }
    }

    // Load configuration from YAML file
    pub fn from_yaml(file_path: &str) -> anyhow::Result<Self> {
        let yaml_content = fs::read_to_string(file_path)
            .with_context(|| format!("Failed to read config file {}", file_path))?;
        Self::parse_yaml(&yaml_content)
    }

    pub fn parse_yaml(yaml_content: &str) -> anyhow::Result<Self> {
        let yaml_config: ConfigYaml =
            serde_yaml::from_str(yaml_content).context("Failed to parse YAML config")?;
        Ok(Self::from_yaml_config(yaml_config))
    }

    fn from_yaml_config(yaml_config: ConfigYaml) -> Self {
        Self {
            node_name: yaml_config.node_name.unwrap_or_else(|| "gantt-lab".to_string()),
            environment: yaml_config.environment.unwrap_or_else(|| "development".to_string()),
            port: yaml_config.port.unwrap_or(DEFAULT_PORT),
            upload_ttl: Duration::from_secs(yaml_config.upload_ttl_secs.unwrap_or(DEFAULT_UPLOAD_TTL_SECS)),
            cleanup_interval: Duration::from_secs(
                yaml_config.cleanup_interval_secs.unwrap_or(DEFAULT_CLEANUP_INTERVAL_SECS),
            ),
            max_upload_bytes: yaml_config.max_upload_bytes.unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            max_stored_uploads: yaml_config.max_stored_uploads.unwrap_or(DEFAULT_MAX_STORED_UPLOADS).max(1),
            chart_width: yaml_config.chart_width.unwrap_or(ganttlab::chart::DEFAULT_WIDTH),
        }
    }

    // Load all configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let yaml_config = ConfigYaml {
            node_name: env::var("NODE_NAME").ok(),
            environment: env::var("ENVIRONMENT").ok(),
            port: parse_env("PORT")?,
            upload_ttl_secs: parse_env("UPLOAD_TTL_SECS")?,
            cleanup_interval_secs: parse_env("CLEANUP_INTERVAL_SECS")?,
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES")?,
            max_stored_uploads: parse_env("MAX_STORED_UPLOADS")?,
            chart_width: parse_env("CHART_WIDTH")?,
        };

        Ok(Self::from_yaml_config(yaml_config))
    }
}

/// Unset means default; a value that does not parse is an error.
fn parse_env<T>(name: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("Invalid value for {}: {}", name, e)),
        Err(_) => Ok(None),
    }
}
