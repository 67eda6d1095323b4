//! Run Configuration
//!
//! Optional TOML configuration supplying the inputs the CLI does not take:
//! subject-attribute defaults, per-tier validity windows, key size, the
//! PKCS#12 password, and the keytool override. Every field has a built-in
//! default, so the tool runs with no config file at all.
//!
//! ```toml
//! [subject]
//! organization = "Example Corp"
//! country = "US"
//!
//! [validity]
//! leaf_days = 90
//!
//! [export]
//! p12_password = "not-changeit"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

const DEFAULT_CONFIG_PATH: &str = "cert-chain.toml";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub subject: SubjectDefaults,
    #[serde(default)]
    pub validity: ValidityDefaults,
    #[serde(default)]
    pub keys: KeyDefaults,
    #[serde(default)]
    pub export: ExportDefaults,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SubjectDefaults {
    #[serde(default = "default_root_common_name")]
    pub root_common_name: String,
    #[serde(default = "default_intermediate_common_name")]
    pub intermediate_common_name: String,
    #[serde(default = "default_organization")]
    pub organization: String,
    #[serde(default = "default_organizational_unit")]
    pub organizational_unit: String,
    #[serde(default = "default_locality")]
    pub locality: String,
    #[serde(default = "default_state")]
    pub state: String,
    #[serde(default = "default_country")]
    pub country: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ValidityDefaults {
    #[serde(default = "default_root_days")]
    pub root_days: i64,
    #[serde(default = "default_intermediate_days")]
    pub intermediate_days: i64,
    #[serde(default = "default_leaf_days")]
    pub leaf_days: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KeyDefaults {
    #[serde(default = "default_key_bits")]
    pub bits: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExportDefaults {
    #[serde(default = "default_p12_password")]
    pub p12_password: String,
    /// Explicit keytool binary; `None` probes `PATH`.
    #[serde(default)]
    pub keytool_path: Option<PathBuf>,
    #[serde(default = "default_keytool_timeout_secs")]
    pub keytool_timeout_secs: u64,
}

fn default_root_common_name() -> String {
    "Internal Root CA".to_string()
}
fn default_intermediate_common_name() -> String {
    "Internal Issuing CA".to_string()
}
fn default_organization() -> String {
    "Internal".to_string()
}
fn default_organizational_unit() -> String {
    "Infrastructure".to_string()
}
fn default_locality() -> String {
    "Santa Clara".to_string()
}
fn default_state() -> String {
    "CA".to_string()
}
fn default_country() -> String {
    "US".to_string()
}
fn default_root_days() -> i64 {
    3650
}
fn default_intermediate_days() -> i64 {
    1825
}
fn default_leaf_days() -> i64 {
    365
}
fn default_key_bits() -> u32 {
    4096
}
fn default_p12_password() -> String {
    "changeit".to_string()
}
fn default_keytool_timeout_secs() -> u64 {
    10
}

impl Default for SubjectDefaults {
    fn default() -> Self {
        Self {
            root_common_name: default_root_common_name(),
            intermediate_common_name: default_intermediate_common_name(),
            organization: default_organization(),
            organizational_unit: default_organizational_unit(),
            locality: default_locality(),
            state: default_state(),
            country: default_country(),
        }
    }
}

impl Default for ValidityDefaults {
    fn default() -> Self {
        Self {
            root_days: default_root_days(),
            intermediate_days: default_intermediate_days(),
            leaf_days: default_leaf_days(),
        }
    }
}

impl Default for KeyDefaults {
    fn default() -> Self {
        Self {
            bits: default_key_bits(),
        }
    }
}

impl Default for ExportDefaults {
    fn default() -> Self {
        Self {
            p12_password: default_p12_password(),
            keytool_path: None,
            keytool_timeout_secs: default_keytool_timeout_secs(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a specific TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file {}", path.as_ref().display()))?;
        toml::from_str(&config_str).context("Failed to parse config file")
    }

    /// Load `cert-chain.toml` from the working directory when present,
    /// built-in defaults otherwise.
    pub fn load() -> Result<Self> {
        if Path::new(DEFAULT_CONFIG_PATH).exists() {
            Self::from_file(DEFAULT_CONFIG_PATH)
        } else {
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.validity.root_days, 3650);
        assert_eq!(config.validity.intermediate_days, 1825);
        assert_eq!(config.validity.leaf_days, 365);
        assert_eq!(config.keys.bits, 4096);
        assert_eq!(config.export.p12_password, "changeit");
        assert!(config.export.keytool_path.is_none());
    }

    #[test]
    fn test_partial_file_overrides() {
        let config: AppConfig = toml::from_str(
            r#"
            [subject]
            organization = "ACME Corp"

            [validity]
            leaf_days = 90
            "#,
        )
        .unwrap();
        assert_eq!(config.subject.organization, "ACME Corp");
        assert_eq!(config.validity.leaf_days, 90);
        // Untouched sections keep their defaults
        assert_eq!(config.subject.country, "US");
        assert_eq!(config.validity.root_days, 3650);
    }
}
