//! Configuration management
//!
//! One YAML file holds the collaborator sections; every key in it, including
//! the sections, is also flattened into the [`RuntimeConfig`] used by param
//! templates. Environment variables (a `.env` file is honored) override the
//! collaborator sections after the file is read.

use kiln_common::yaml::YamlReader;
use serde::Deserialize;
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::externals::{DatabaseConfig, ExecutorConfig, FileStoreConfig};
use crate::fixture::FixtureSet;
use crate::runtime::RuntimeConfig;
use crate::specification::Specification;

// ============================================================================
// Defaults
// ============================================================================

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config/kiln.yaml";

/// Default directory holding `specs/`, `fixtures/` and `files/`.
pub const DEFAULT_KILN_DIR: &str = "kiln";

/// Default directory the report is written to.
pub const DEFAULT_RESULTS_DIR: &str = "results";

#[derive(Debug, Default, Deserialize)]
struct Sections {
    #[serde(default)]
    database: DatabaseConfig,
    #[serde(default)]
    file_store: FileStoreConfig,
    #[serde(default)]
    executor: ExecutorConfig,
}

/// Typed configuration resolved once at load time
#[derive(Debug, Clone, PartialEq)]
pub struct KilnConfig {
    pub database: DatabaseConfig,
    pub file_store: FileStoreConfig,
    pub executor: ExecutorConfig,
    pub runtime: RuntimeConfig,
}

impl KilnConfig {
    /// Load the file, apply environment overrides and validate
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let path = path.as_ref();
        let value = YamlReader::read(path)?;
        let mut config = Self::from_yaml(&value)?;
        config.apply_env();
        config.validate()?;

        info!(
            path = %path.display(),
            runtime_keys = config.runtime.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Parse a configuration document without touching the environment
    pub fn from_yaml(value: &Value) -> Result<Self> {
        let sections: Sections = match value {
            Value::Null => Sections::default(),
            Value::Mapping(_) => serde_yaml::from_value(value.clone())
                .map_err(|e| Error::config(format!("invalid configuration: {}", e)))?,
            _ => return Err(Error::config("configuration must be a mapping")),
        };

        Ok(Self {
            database: sections.database,
            file_store: sections.file_store,
            executor: sections.executor,
            runtime: RuntimeConfig::from_yaml(value),
        })
    }

    pub fn apply_env(&mut self) {
        self.database.apply_env();
        self.file_store.apply_env();
        self.executor.apply_env();
    }

    pub fn validate(&self) -> Result<()> {
        self.database.validate()?;
        self.file_store.validate()?;
        self.executor.validate().map_err(Error::config)?;
        Ok(())
    }
}

/// Where a suite's inputs and outputs live on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub kiln_dir: PathBuf,
    pub results_dir: PathBuf,
}

impl Default for Layout {
    fn default() -> Self {
        Self::new(DEFAULT_KILN_DIR, DEFAULT_RESULTS_DIR)
    }
}

impl Layout {
    pub fn new(kiln_dir: impl Into<PathBuf>, results_dir: impl Into<PathBuf>) -> Self {
        Self {
            kiln_dir: kiln_dir.into(),
            results_dir: results_dir.into(),
        }
    }

    pub fn specs_dir(&self) -> PathBuf {
        self.kiln_dir.join("specs")
    }

    pub fn fixtures_dir(&self) -> PathBuf {
        self.kiln_dir.join("fixtures")
    }

    pub fn files_dir(&self) -> PathBuf {
        self.kiln_dir.join("files")
    }

    /// All fixtures merged into one namespace; a missing directory is empty
    pub fn load_fixtures(&self) -> Result<FixtureSet> {
        let dir = self.fixtures_dir();
        if !dir.exists() {
            debug!(dir = %dir.display(), "No fixtures directory");
            return Ok(FixtureSet::default());
        }

        let fixtures = FixtureSet::from_mapping(YamlReader::smash(&dir)?)?;
        debug!(dir = %dir.display(), count = fixtures.len(), "Loaded fixtures");
        Ok(fixtures)
    }

    /// Specifications at `path`, or under `specs/` when no path is given
    pub fn load_specifications(&self, path: Option<&Path>) -> Result<Vec<Specification>> {
        match path {
            Some(path) => Specification::load_all(path),
            None => Specification::load_all(self.specs_dir()),
        }
    }
}
