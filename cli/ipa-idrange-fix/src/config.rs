//! Configuration file handling.
//!
//! Settings resolve in order: built-in defaults, the JSON config file,
//! `IDRANGE_*` environment variables, command-line flags. The last two are
//! merged by clap before they reach [`Config::plan_options`].

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use idrange_engine::{PlanOptions, DEFAULT_MIN_RANGE_SIZE, DEFAULT_RANGE_GAP, DEFAULT_RID_OFFSET};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configuration file name.
const CONFIG_FILE: &str = "config.json";

/// Get the config directory path.
fn config_dir() -> Result<PathBuf> {
    ProjectDirs::from("org", "freeipa", "ipa-idrange-fix")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))
}

/// Default location of the config file.
pub fn default_config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE))
}

/// Persistent settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub rid_offset: u64,
    pub range_gap: u64,
    pub min_range_size: u64,
    pub allow_under_1000: bool,
    pub rounding: bool,
    /// Unset leaves the choice to `ldap.conf`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ldap_uri: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rid_offset: DEFAULT_RID_OFFSET,
            range_gap: DEFAULT_RANGE_GAP,
            min_range_size: DEFAULT_MIN_RANGE_SIZE,
            allow_under_1000: false,
            rounding: true,
            ldap_uri: None,
        }
    }
}

/// Values given on the command line or through the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub rid_offset: Option<u64>,
    pub range_gap: Option<u64>,
    pub min_range_size: Option<u64>,
    pub allow_under_1000: bool,
    pub no_rounding: bool,
    pub ldap_uri: Option<String>,
}

impl Config {
    /// Load from `path`, or from the default location.
    ///
    /// A missing file yields the defaults. An explicitly named file must
    /// exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => {
                let path = default_config_path()?;
                if !path.exists() {
                    return Ok(Self::default());
                }
                Self::load_from(&path)
            }
        }
    }

    /// Load from a specific file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;

        let config = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {:?}", path))?;
        debug!(?path, ?config, "loaded config file");
        Ok(config)
    }

    /// Apply command-line and environment values on top of the file.
    pub fn merge(mut self, overrides: &Overrides) -> Self {
        if let Some(value) = overrides.rid_offset {
            self.rid_offset = value;
        }
        if let Some(value) = overrides.range_gap {
            self.range_gap = value;
        }
        if let Some(value) = overrides.min_range_size {
            self.min_range_size = value;
        }
        if overrides.allow_under_1000 {
            self.allow_under_1000 = true;
        }
        if overrides.no_rounding {
            self.rounding = false;
        }
        if let Some(uri) = &overrides.ldap_uri {
            self.ldap_uri = Some(uri.clone());
        }
        self
    }

    pub fn plan_options(&self) -> PlanOptions {
        PlanOptions {
            rid_offset: self.rid_offset,
            range_gap: self.range_gap,
            min_range_size: self.min_range_size,
            allow_below_1000: self.allow_under_1000,
            allow_rounding: self.rounding,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.plan_options(), PlanOptions::default());
        assert!(config.ldap_uri.is_none());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"range_gap": 5000, "rounding": false}}"#).unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.range_gap, 5000);
        assert!(!config.rounding);
        assert_eq!(config.rid_offset, DEFAULT_RID_OFFSET);
    }

    #[test]
    fn named_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(Some(&dir.path().join("absent.json"))).is_err());
    }

    #[test]
    fn flags_win_over_file() {
        let file = Config {
            range_gap: 5000,
            allow_under_1000: true,
            ..Config::default()
        };
        let merged = file.merge(&Overrides {
            range_gap: Some(7000),
            min_range_size: Some(3),
            no_rounding: true,
            ..Overrides::default()
        });
        let options = merged.plan_options();
        assert_eq!(options.range_gap, 7000);
        assert_eq!(options.min_range_size, 3);
        assert!(options.allow_below_1000);
        assert!(!options.allow_rounding);
    }
}
