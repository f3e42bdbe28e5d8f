//! Settings file handling.
//!
//! Settings come from `<config_dir>/dossier/config.toml` unless another path
//! is given. Every key is optional; command line flags and environment
//! variables win over file values.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::crypto::CipherParams;
use crate::error::{DossierError, Result};

const APP_DIR: &str = "dossier";

/// Contents of `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Path of the JSON data file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_file: Option<PathBuf>,

    /// Owner id used when no `--owner` flag is given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    /// Log filter directive, e.g. `dossier=debug`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Argon2 cost parameters for sealing secrets.
    pub cipher: CipherParams,
}

impl Settings {
    /// Default settings file location.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"))
    }

    /// Default data file location.
    pub fn default_data_file() -> Result<PathBuf> {
        dirs::data_dir()
            .or_else(dirs::home_dir)
            .map(|dir| dir.join(APP_DIR).join("records.json"))
            .ok_or_else(|| DossierError::Config("unable to determine a data directory".to_string()))
    }

    /// Load settings from `path`, or from the default location.
    ///
    /// A missing default file yields default settings. A missing explicit
    /// file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => match Self::default_path() {
                Some(path) => (path, false),
                None => return Ok(Self::default()),
            },
        };

        if !path.exists() {
            if explicit {
                return Err(DossierError::Config(format!(
                    "settings file not found: {}",
                    path.display()
                )));
            }
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&path)?;
        Self::parse(&contents)
            .map_err(|err| DossierError::Config(format!("{}: {err}", path.display())))
    }

    /// Parse settings from TOML text.
    pub fn parse(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|err| DossierError::Config(err.to_string()))
    }

    /// The data file to use: `flag` if given, else the settings value, else
    /// the default location.
    pub fn resolve_data_file(&self, flag: Option<PathBuf>) -> Result<PathBuf> {
        match flag.or_else(|| self.data_file.clone()) {
            Some(path) => Ok(path),
            None => Self::default_data_file(),
        }
    }

    /// The owner to act as: `flag` if given, else the settings value.
    pub fn resolve_owner(&self, flag: Option<String>) -> Option<String> {
        flag.or_else(|| self.owner.clone())
    }
}
