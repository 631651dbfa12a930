use std::fs;
use std::path::PathBuf;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::OrganizeError;

pub const CONFIG_FILE: &str = "dbgap-organize.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    /// Subject table column holding the consent group; third column when unset.
    #[serde(default)]
    pub consent_variable: Option<String>,
    #[serde(default)]
    pub phenotype_limit: Option<usize>,
    #[serde(default)]
    pub decrypt: Option<bool>,
    #[serde(default)]
    pub decompress: Option<bool>,
    #[serde(default)]
    pub lock_output: Option<bool>,
    #[serde(default)]
    pub decrypt_tool: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub consent_variable: Option<String>,
    pub phenotype_limit: Option<usize>,
    pub decrypt: bool,
    pub decompress: bool,
    pub lock_output: bool,
    pub decrypt_tool: Option<PathBuf>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        ConfigLoader::resolve_config(Config::default())
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load `path`, or the first default config file found; defaults when there is none.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, OrganizeError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => match default_config_path() {
                Some(path) => path,
                None => return Ok(Self::resolve_config(Config::default())),
            },
        };
        debug!(path = %config_path.display(), "loading config");

        let content = fs::read_to_string(&config_path)
            .map_err(|_| OrganizeError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| OrganizeError::ConfigParse(err.to_string()))?;

        Ok(Self::resolve_config(config))
    }

    pub fn resolve_config(config: Config) -> ResolvedConfig {
        ResolvedConfig {
            schema_version: config.schema_version.unwrap_or(1),
            consent_variable: config
                .consent_variable
                .filter(|value| !value.trim().is_empty()),
            phenotype_limit: config.phenotype_limit,
            decrypt: config.decrypt.unwrap_or(false),
            decompress: config.decompress.unwrap_or(true),
            lock_output: config.lock_output.unwrap_or(true),
            decrypt_tool: config.decrypt_tool,
        }
    }
}

fn default_config_path() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILE);
    if local.exists() {
        return Some(local);
    }
    ProjectDirs::from("", "", "dbgap-organizer")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
        .filter(|path| path.exists())
}
