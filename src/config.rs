//! Configuration management for the compatibility checker
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (compat.toml)
//! - Environment variables (THRIFT_COMPAT__*)
//!
//! ## Example config file (compat.toml):
//! ```toml
//! [policy]
//! requiredness = "optional_to_required_breaks"
//! check_throws = false
//! check_defaults = false
//! check_oneway = true
//! allow_service_rename = true
//! follow_references = true
//!
//! [input]
//! include_root = "./idl"
//! mode = "merged"
//!
//! [input.old]
//! root = "v1"
//!
//! [input.new]
//! root = "v2"
//! files = ["api.json", "shared/types.json"]
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::loader::SourceSet;

/// Main configuration for the checker
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompatConfig {
    /// Comparison policy
    #[serde(default)]
    pub policy: Policy,

    /// Where the parsed declaration trees live
    #[serde(default)]
    pub input: InputConfig,
}

/// Which requiredness transition breaks compatibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RequirednessPolicy {
    /// Senders built against the old schema may omit a field that new
    /// receivers now insist on
    #[default]
    OptionalToRequiredBreaks,
    /// Receivers built against the old schema may miss a field they relied on
    RequiredToOptionalBreaks,
    /// Requiredness changes are never reported
    Ignore,
}

/// Comparison policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    #[serde(default)]
    pub requiredness: RequirednessPolicy,

    /// Compare declared exceptions under the struct rule
    #[serde(default)]
    pub check_throws: bool,

    /// Report changed default values
    #[serde(default)]
    pub check_defaults: bool,

    /// Report a method switching between oneway and request/response
    #[serde(default = "default_true")]
    pub check_oneway: bool,

    /// Accept an old service whose name is gone if a new-only service
    /// serves every one of its methods compatibly
    #[serde(default = "default_true")]
    pub allow_service_rename: bool,

    /// Compare referenced declarations in place of the referencing field
    #[serde(default = "default_true")]
    pub follow_references: bool,
}

/// How each side's files are combined before comparing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CompareMode {
    /// Merge every file of a side into one Document
    #[default]
    Merged,
    /// Pair files by name and compare each pair on its own
    PerFile,
}

/// Input configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Root that both sides' roots are relative to
    #[serde(default = "default_include_root")]
    pub include_root: PathBuf,

    #[serde(default)]
    pub mode: CompareMode,

    #[serde(default)]
    pub old: SourceSpec,

    #[serde(default)]
    pub new: SourceSpec,
}

/// Declaration trees of one side
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceSpec {
    /// Directory relative to the include root
    #[serde(default)]
    pub root: PathBuf,

    /// Files relative to `root`; every `*.json` under it when empty
    #[serde(default)]
    pub files: Vec<PathBuf>,
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_include_root() -> PathBuf {
    PathBuf::from(".")
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            requiredness: RequirednessPolicy::default(),
            check_throws: false,
            check_defaults: false,
            check_oneway: true,
            allow_service_rename: true,
            follow_references: true,
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            include_root: default_include_root(),
            mode: CompareMode::default(),
            old: SourceSpec::default(),
            new: SourceSpec::default(),
        }
    }
}

impl InputConfig {
    /// Source set of the old side
    pub fn old_sources(&self) -> crate::Result<SourceSet> {
        self.sources(&self.old)
    }

    /// Source set of the new side
    pub fn new_sources(&self) -> crate::Result<SourceSet> {
        self.sources(&self.new)
    }

    fn sources(&self, spec: &SourceSpec) -> crate::Result<SourceSet> {
        let root = self.include_root.join(&spec.root);
        if spec.files.is_empty() {
            SourceSet::discover(root)
        } else {
            Ok(SourceSet::new(root, spec.files.clone()))
        }
    }
}

impl CompatConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration from a specific file
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        // Load from default locations
        let config_locations = ["compat.toml", ".compat.toml", "config/compat.toml"];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "familiar", "thrift-compat") {
            let xdg_config = config_dir.config_dir().join("compat.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        // Load from specified path
        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Load from environment variables (THRIFT_COMPAT__*)
        builder = builder.add_source(
            Environment::with_prefix("THRIFT_COMPAT")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }
}
