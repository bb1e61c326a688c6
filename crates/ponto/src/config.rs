use ponto_core::{ClientOptions, ScrfdDetector, Url};
use ponto_hw::Facing;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_RECOGNITION_URL: &str = "http://localhost:8000";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid recognition URL {0:?}")]
    InvalidUrl(String),
    #[error("{0}")]
    InvalidFacing(String),
}

/// Client configuration: defaults, then the `PONTO_CONFIG` TOML file, then
/// `PONTO_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the recognition service.
    pub recognition_url: Url,
    /// Timeout in seconds for one recognition request.
    pub request_timeout_secs: u64,
    /// Extra attempts after a transport failure or timeout.
    pub network_retries: u32,
    pub accept_invalid_certs: bool,
    pub camera_facing: Facing,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
}

/// On-disk form; every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub recognition_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub network_retries: Option<u32>,
    pub accept_invalid_certs: Option<bool>,
    pub camera_facing: Option<Facing>,
    pub model_dir: Option<PathBuf>,
}

impl ConfigFile {
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&text)?)
    }
}

impl Config {
    /// Load from the process environment and the optional `PONTO_CONFIG` file.
    pub fn load() -> Result<Self, ConfigError> {
        let file = match std::env::var("PONTO_CONFIG") {
            Ok(path) => ConfigFile::read(Path::new(&path))?,
            Err(_) => ConfigFile::default(),
        };
        Self::from_sources(file, |key| std::env::var(key).ok())
    }

    pub fn from_sources(
        file: ConfigFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let url = env("PONTO_RECOGNITION_URL")
            .or(file.recognition_url)
            .unwrap_or_else(|| DEFAULT_RECOGNITION_URL.to_string());
        let recognition_url = Url::parse(&url).map_err(|_| ConfigError::InvalidUrl(url.clone()))?;
        if !matches!(recognition_url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl(url));
        }

        let camera_facing = match env("PONTO_CAMERA_FACING") {
            Some(v) => v.parse().map_err(ConfigError::InvalidFacing)?,
            None => file.camera_facing.unwrap_or_default(),
        };

        let model_dir = env("PONTO_MODEL_DIR")
            .map(PathBuf::from)
            .or(file.model_dir)
            .unwrap_or_else(ponto_core::default_model_dir);

        Ok(Self {
            recognition_url,
            request_timeout_secs: env_parse(&env, "PONTO_REQUEST_TIMEOUT_SECS")
                .or(file.request_timeout_secs)
                .filter(|&secs| secs > 0)
                .unwrap_or(10),
            network_retries: env_parse(&env, "PONTO_NETWORK_RETRIES")
                .or(file.network_retries)
                .unwrap_or(0)
                .min(ponto_core::recognizer::MAX_RETRIES),
            accept_invalid_certs: env("PONTO_ACCEPT_INVALID_CERTS")
                .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
                .or(file.accept_invalid_certs)
                .unwrap_or(false),
            camera_facing,
            model_dir,
        })
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            timeout: Duration::from_secs(self.request_timeout_secs),
            retries: self.network_retries,
            accept_invalid_certs: self.accept_invalid_certs,
        }
    }

    /// Outer bound on one recognition call, covering every retry.
    pub fn network_timeout(&self) -> Duration {
        let attempts = u64::from(self.network_retries) + 1;
        Duration::from_secs(self.request_timeout_secs.saturating_mul(attempts))
    }

    /// Path to the SCRFD detection model.
    pub fn scrfd_model_path(&self) -> PathBuf {
        ScrfdDetector::model_path(&self.model_dir)
    }
}

fn env_parse<T: std::str::FromStr>(env: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    env(key).and_then(|v| v.trim().parse().ok())
}
