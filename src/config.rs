//! Configuration for compatibility checks
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (schema-evolution.toml)
//! - Environment variables (SCHEMA_EVOLUTION__*)
//!
//! ## Example config file (schema-evolution.toml):
//! ```toml
//! [compatibility]
//! mode = "full"
//! fail_on_breaking = true
//! fail_on_warnings = false
//! parallel = true
//!
//! [baseline]
//! strategy = "latest_minor"
//! include_prereleases = false
//!
//! [storage]
//! attribute_prefix = "schema-evolution"
//!
//! [types.AuditLog]
//! checked = false
//!
//! [types.User]
//! mode = "backward"
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::codec::{SetCodec, DEFAULT_PREFIX};
use crate::compatibility::{checker, CompatibilityChecker, FailurePolicy, Mode, TypeCheckConfig};
use crate::error::Result;
use crate::resolver::Strategy;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvolutionConfig {
    #[serde(default)]
    pub compatibility: CompatibilitySettings,

    #[serde(default)]
    pub baseline: BaselineSettings,

    #[serde(default)]
    pub storage: StorageSettings,

    /// Per-type opt-in records, keyed by type name
    #[serde(default)]
    pub types: BTreeMap<String, TypeCheckConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompatibilitySettings {
    #[serde(default)]
    pub mode: Mode,

    /// Fail when any `Error` issue is reported
    #[serde(default = "default_true")]
    pub fail_on_breaking: bool,

    /// Fail on `Warning` issues as well
    #[serde(default)]
    pub fail_on_warnings: bool,

    /// Check types on worker threads
    #[serde(default = "default_true")]
    pub parallel: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BaselineSettings {
    #[serde(default)]
    pub strategy: Strategy,

    /// Allow prerelease versions as baselines (always on for `all`)
    #[serde(default)]
    pub include_prereleases: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Key prefix for the attribute map
    #[serde(default = "default_prefix")]
    pub attribute_prefix: String,
}

fn default_true() -> bool {
    true
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

impl Default for CompatibilitySettings {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            fail_on_breaking: true,
            fail_on_warnings: false,
            parallel: true,
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            attribute_prefix: default_prefix(),
        }
    }
}

impl EvolutionConfig {
    /// Load configuration from default locations
    pub fn load() -> std::result::Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, layering `config_path` (which must exist) over
    /// the default locations. Environment variables win over files.
    pub fn load_from(config_path: Option<&Path>) -> std::result::Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = [
            "schema-evolution.toml",
            ".schema-evolution.toml",
            "config/schema-evolution.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(dirs) = directories::ProjectDirs::from("dev", "schema-evolution", "schema-evolution") {
            let xdg_config = dirs.config_dir().join("schema-evolution.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        // SCHEMA_EVOLUTION__COMPATIBILITY__MODE=full
        builder = builder.add_source(
            Environment::with_prefix("SCHEMA_EVOLUTION")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Opt-in record for one type
    pub fn type_config(&self, type_name: &str) -> Option<&TypeCheckConfig> {
        checker::lookup(&self.types, type_name)
    }

    pub fn policy(&self) -> FailurePolicy {
        FailurePolicy {
            fail_on_breaking: self.compatibility.fail_on_breaking,
            fail_on_warnings: self.compatibility.fail_on_warnings,
        }
    }

    pub fn checker(&self) -> CompatibilityChecker {
        CompatibilityChecker::from_config(self)
    }

    pub fn codec(&self) -> SetCodec {
        SetCodec::new(self.storage.attribute_prefix.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = EvolutionConfig::default();
        assert_eq!(config.compatibility.mode, Mode::Backward);
        assert!(config.compatibility.fail_on_breaking);
        assert_eq!(config.baseline.strategy, Strategy::LatestMinor);
        assert_eq!(config.storage.attribute_prefix, "schema-evolution");
        assert_eq!(config.policy(), FailurePolicy::default());
    }

    #[test]
    fn test_serialize_config() {
        let config = EvolutionConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[compatibility]"));
        assert!(toml_str.contains("[baseline]"));
        assert!(toml_str.contains("strategy = \"latest_minor\""));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[compatibility]
mode = "full"
fail_on_warnings = true

[baseline]
strategy = "previous_major"

[storage]
attribute_prefix = "build.schemas"

[types.AuditLog]
checked = false

[types.User]
mode = "forward"
"#
        )
        .unwrap();

        let config = EvolutionConfig::load_from(Some(file.path())).unwrap();
        assert_eq!(config.compatibility.mode, Mode::Full);
        assert!(config.compatibility.fail_on_breaking);
        assert!(config.compatibility.fail_on_warnings);
        assert_eq!(config.baseline.strategy, Strategy::PreviousMajor);
        assert_eq!(config.codec().prefix(), "build.schemas");
        assert_eq!(config.type_config("AuditLog"), Some(&TypeCheckConfig::unchecked()));
        assert_eq!(config.type_config("User"), Some(&TypeCheckConfig::with_mode(Mode::Forward)));
        assert_eq!(config.type_config("Order"), None);
        assert_eq!(config.checker().mode(), Mode::Full);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(EvolutionConfig::load_from(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn test_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema-evolution.toml");

        let mut config = EvolutionConfig::default();
        config.compatibility.mode = Mode::Forward;
        config.types.insert("Legacy".to_string(), TypeCheckConfig::unchecked());
        config.save(&path).unwrap();

        let loaded = EvolutionConfig::load_from(Some(&path)).unwrap();
        assert_eq!(loaded.compatibility.mode, Mode::Forward);
        assert_eq!(loaded.type_config("Legacy"), Some(&TypeCheckConfig::unchecked()));
    }
}
