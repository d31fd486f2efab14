//! Configuration for a consent node.
//!
//! Loaded from TOML. Every field has a default, so an empty file is valid.

pub mod error;

pub use error::{ConfigError, ConfigResult};

use crate::permissions::types::policy::ApprovalPolicy;
use crate::schema::catalog::SchemaFieldCatalog;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default number of per-pair lock stripes.
pub const DEFAULT_LOCK_STRIPES: usize = 64;

/// Configuration for a [`ConsentNode`](crate::consent_node::ConsentNode).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsentConfig {
    /// Path where grants, requests, and records are stored
    pub storage_path: PathBuf,
    /// Open the database in sled's temporary mode (removed on drop)
    pub temporary: bool,
    /// How an approval combines with previously approved fields
    pub approval_policy: ApprovalPolicy,
    /// JSON file listing recognized field paths; the clinical catalog is used when unset
    pub catalog_path: Option<PathBuf>,
    /// Number of lock stripes serializing operations per holder/requester pair
    pub lock_stripes: usize,
}

impl Default for ConsentConfig {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from("data/consent"),
            temporary: false,
            approval_policy: ApprovalPolicy::default(),
            catalog_path: None,
            lock_stripes: DEFAULT_LOCK_STRIPES,
        }
    }
}

impl ConsentConfig {
    /// Create a configuration with the specified storage path
    pub fn new(storage_path: PathBuf) -> Self {
        Self {
            storage_path,
            ..Default::default()
        }
    }

    /// Configuration backed by a throwaway database
    pub fn temporary(storage_path: PathBuf) -> Self {
        Self {
            storage_path,
            temporary: true,
            ..Default::default()
        }
    }

    /// Set the approval policy
    pub fn with_approval_policy(mut self, policy: ApprovalPolicy) -> Self {
        self.approval_policy = policy;
        self
    }

    /// Set the field catalog file
    pub fn with_catalog_path(mut self, path: PathBuf) -> Self {
        self.catalog_path = Some(path);
        self
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path)?;
        let config: ConsentConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Write configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.storage_path.as_os_str().is_empty() {
            return Err(ConfigError::validation("storage_path must not be empty"));
        }
        if self.lock_stripes == 0 {
            return Err(ConfigError::validation("lock_stripes must be greater than zero"));
        }
        Ok(())
    }

    /// Build the field catalog this configuration names
    pub fn load_catalog(&self) -> ConfigResult<SchemaFieldCatalog> {
        match &self.catalog_path {
            Some(path) => SchemaFieldCatalog::load_from_file(path),
            None => Ok(SchemaFieldCatalog::clinical_default()),
        }
    }
}
