use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::debug;

use crate::{
    currency::{CurrencyCode, DEFAULT_TOLERANCE},
    errors::{LedgerError, Result},
    journal::PostingRules,
    utils::paths::{ensure_dir, replace_file, PathResolver},
};

const DEFAULT_BACKUP_RETENTION: usize = 5;

/// Engine settings persisted as `config.json` in the data directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub currency: CurrencyCode,
    pub tolerance: f64,
    /// Where `ledger.json` and its backups live; the resolved base directory when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    /// Custom chart of accounts; the built-in chart when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart_path: Option<PathBuf>,
    pub posting_rules: PostingRules,
    pub backup_retention: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            currency: CurrencyCode::default(),
            tolerance: DEFAULT_TOLERANCE,
            data_dir: None,
            chart_path: None,
            posting_rules: PostingRules::default(),
            backup_retention: DEFAULT_BACKUP_RETENTION,
        }
    }
}

impl EngineConfig {
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(PathResolver::base_dir)
    }

    pub fn ledger_path(&self) -> PathBuf {
        PathResolver::ledger_file_in(&self.data_dir())
    }

    pub fn validate(&self) -> Result<()> {
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(LedgerError::Config(format!(
                "tolerance must be a non-negative number, got {}",
                self.tolerance
            )));
        }
        if self.backup_retention == 0 {
            return Err(LedgerError::Config(
                "backup_retention must keep at least one backup".into(),
            ));
        }
        Ok(())
    }
}

pub struct ConfigManager {
    path: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Result<Self> {
        Self::from_base(PathResolver::base_dir())
    }

    pub fn with_base_dir(base: impl Into<PathBuf>) -> Result<Self> {
        Self::from_base(base.into())
    }

    fn from_base(base: PathBuf) -> Result<Self> {
        ensure_dir(&base)?;
        Ok(Self {
            path: PathResolver::config_file_in(&base),
        })
    }

    /// Reads the config file, or returns defaults rooted at this manager's directory when the
    /// file does not exist yet.
    pub fn load(&self) -> Result<EngineConfig> {
        let mut config = if self.path.exists() {
            let data = fs::read_to_string(&self.path)?;
            serde_json::from_str::<EngineConfig>(&data)
                .map_err(|err| LedgerError::Config(format!("{}: {err}", self.path.display())))?
        } else {
            debug!(path = %self.path.display(), "no config file; using defaults");
            EngineConfig::default()
        };
        if config.data_dir.is_none() {
            config.data_dir = self.path.parent().map(Path::to_path_buf);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, config: &EngineConfig) -> Result<()> {
        config.validate()?;
        let json = serde_json::to_string_pretty(config)?;
        replace_file(&self.path, &json)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
