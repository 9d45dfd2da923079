//! Run configuration, read from a dotenv-style file with environment overrides.

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_SCRIPT_PATH: &str = "scripts/garmin_client.py";
pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("error reading config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// How activities are fetched from Garmin Connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GarminBackend {
    /// Direct HTTP session against Garmin's SSO and proxy endpoints.
    Http,
    /// Delegated to an external helper script.
    Script,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub garmin_username: String,
    pub garmin_password: String,
    pub ido_username: String,
    pub ido_password: String,
    pub garmin_backend: GarminBackend,
    pub garmin_script_path: PathBuf,
    pub webdriver_url: String,
    pub http_timeout: Duration,
    pub batch_deadline: Option<Duration>,
    pub artifact_dir: Option<PathBuf>,
}

impl Config {
    /// Load from `path`, letting real environment variables win over file values.
    /// A missing file is not an error; `validate` reports whatever is still absent.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let file_values = read_file(path)?;
        Self::from_lookup(|key| env::var(key).ok().or_else(|| file_values.get(key).cloned()))
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| lookup(key).map(|v| v.trim().to_string()).unwrap_or_default();

        let garmin_backend = match value("GARMIN_BACKEND").to_lowercase().as_str() {
            "" | "http" => GarminBackend::Http,
            "script" | "python" => GarminBackend::Script,
            other => {
                return Err(ConfigError::Invalid {
                    key: "GARMIN_BACKEND",
                    value: other.to_string(),
                });
            }
        };

        let http_timeout = parse_secs(&value("HTTP_TIMEOUT_SECS"), "HTTP_TIMEOUT_SECS")?
            .unwrap_or(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS));
        let batch_deadline = parse_secs(&value("BATCH_DEADLINE_SECS"), "BATCH_DEADLINE_SECS")?;

        let script_path = value("GARMIN_SCRIPT_PATH");
        let webdriver_url = value("WEBDRIVER_URL");
        let artifact_dir = value("ARTIFACT_DIR");

        Ok(Self {
            garmin_username: value("GARMIN_USERNAME"),
            garmin_password: value("GARMIN_PASSWORD"),
            ido_username: value("IDO_USERNAME"),
            ido_password: value("IDO_PASSWORD"),
            garmin_backend,
            garmin_script_path: if script_path.is_empty() {
                PathBuf::from(DEFAULT_SCRIPT_PATH)
            } else {
                PathBuf::from(script_path)
            },
            webdriver_url: if webdriver_url.is_empty() {
                DEFAULT_WEBDRIVER_URL.to_string()
            } else {
                webdriver_url
            },
            http_timeout,
            batch_deadline,
            artifact_dir: (!artifact_dir.is_empty()).then(|| PathBuf::from(artifact_dir)),
        })
    }

    /// All four credentials must be present before anything talks to the network.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("GARMIN_USERNAME", &self.garmin_username),
            ("GARMIN_PASSWORD", &self.garmin_password),
            ("IDO_USERNAME", &self.ido_username),
            ("IDO_PASSWORD", &self.ido_password),
        ];

        match required.iter().find(|(_, value)| value.is_empty()) {
            Some((key, _)) => Err(ConfigError::Missing(*key)),
            None => Ok(()),
        }
    }
}

fn read_file(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    let iter = match dotenvy::from_path_iter(path) {
        Ok(iter) => iter,
        Err(e) if e.not_found() => {
            debug!("Config file {} not found, using environment only", path.display());
            return Ok(HashMap::new());
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    iter.collect::<Result<HashMap<_, _>, _>>()
        .map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })
}

fn parse_secs(raw: &str, key: &'static str) -> Result<Option<Duration>, ConfigError> {
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<u64>()
        .map(|secs| Some(Duration::from_secs(secs)))
        .map_err(|_| ConfigError::Invalid {
            key,
            value: raw.to_string(),
        })
}
