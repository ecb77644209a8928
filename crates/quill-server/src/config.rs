use miette::miette;
use quill_common::MAX_UPLOAD_BYTES;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;
use std::{env, fs};

static ENV_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)").unwrap());

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct CoreConfig {
    pub listen_addr: String,
    /// Seconds before a request is abandoned.
    pub request_timeout_secs: u64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:4000".into(),
            request_timeout_secs: 15,
        }
    }
}

impl CoreConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory uploaded images are written to.
    pub image_dir: PathBuf,
    /// Largest accepted upload. Never above the shared 5 MiB ceiling.
    pub max_upload_bytes: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            image_dir: "data/images".into(),
            max_upload_bytes: MAX_UPLOAD_BYTES,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub core: CoreConfig,
    pub storage: StorageConfig,
}

impl Config {
    pub fn load(config_file: &str) -> miette::Result<Config> {
        let config_string = fs::read_to_string(config_file)
            .map_err(|e| miette!("error reading config file {}: {}", config_file, e))?;
        Self::parse(&config_string)
    }

    /// Parse TOML, substituting `$NAME` with the value of environment variable `NAME`.
    ///
    /// The whole name is matched before lookup; unset variables are left as written.
    pub fn parse(config_string: &str) -> miette::Result<Config> {
        let config_string = ENV_VAR_RE.replace_all(config_string, |caps: &Captures| {
            env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        });

        toml::from_str(&config_string).map_err(|e| miette!("error parsing config file {}", e))
    }

    /// Effective upload limit: the configured one, capped at the shared ceiling.
    pub fn upload_limit(&self) -> usize {
        self.storage.max_upload_bytes.min(MAX_UPLOAD_BYTES)
    }
}
