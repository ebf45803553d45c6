use crate::directive::ClockZone;
use crate::error::{NetconfigError, Result};
use crate::options::OptionLayer;
use crate::paths;
use crate::timespec::TimeDirective;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

impl ConfigWarning {
    fn warning(message: String) -> Self {
        Self {
            level: WarnLevel::Warning,
            message,
        }
    }

    fn error(message: String) -> Self {
        Self {
            level: WarnLevel::Error,
            message,
        }
    }
}

// ---------------------------------------------------------------------------
// DeviceConfig / RegistryConfig
// ---------------------------------------------------------------------------

/// How to reach a managed device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "driver", rename_all = "snake_case")]
pub enum DeviceConfig {
    /// A directory holding `running.conf` and `candidate.conf`.
    File { path: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "default_registry_path")]
    pub path: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            path: default_registry_path(),
        }
    }
}

fn default_registry_path() -> String {
    paths::DEFAULT_REGISTRY_FILE.to_string()
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    /// Zone in which clock-time directives are read.
    #[serde(default)]
    pub timezone: ClockZone,
    /// Process-wide option tier.
    #[serde(default, skip_serializing_if = "OptionLayer::is_empty")]
    pub defaults: OptionLayer,
    #[serde(default = "default_templates_dir")]
    pub templates_dir: String,
    #[serde(default)]
    pub registry: RegistryConfig,
    /// Entries stuck mid-commit or mid-revert longer than this are failed on startup.
    #[serde(default = "default_recovery_max_age_secs")]
    pub recovery_max_age_secs: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub devices: BTreeMap<String, DeviceConfig>,
}

fn default_version() -> u32 {
    1
}

fn default_templates_dir() -> String {
    paths::DEFAULT_TEMPLATES_DIR.to_string()
}

fn default_recovery_max_age_secs() -> u64 {
    300
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            version: 1,
            timezone: ClockZone::default(),
            defaults: OptionLayer::default(),
            templates_dir: default_templates_dir(),
            registry: RegistryConfig::default(),
            recovery_max_age_secs: default_recovery_max_age_secs(),
            devices: BTreeMap::new(),
        }
    }

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(NetconfigError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn templates_path(&self, root: &Path) -> PathBuf {
        paths::under_root(root, &self.templates_dir)
    }

    pub fn registry_path(&self, root: &Path) -> PathBuf {
        paths::under_root(root, &self.registry.path)
    }

    pub fn device_path(&self, root: &Path, device: &DeviceConfig) -> PathBuf {
        match device {
            DeviceConfig::File { path } => paths::under_root(root, path),
        }
    }

    pub fn recovery_max_age(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.recovery_max_age_secs).unwrap_or(i64::MAX))
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self, root: &Path) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.version != 1 {
            warnings.push(ConfigWarning::warning(format!(
                "unknown config version {}; expected 1",
                self.version
            )));
        }

        let d = &self.defaults;
        for (first, second, a, b) in [
            ("commit_in", "commit_at", &d.commit_in, &d.commit_at),
            ("revert_in", "revert_at", &d.revert_in, &d.revert_at),
        ] {
            if a.is_some() && b.is_some() {
                warnings.push(ConfigWarning::error(format!(
                    "defaults set both '{first}' and '{second}'"
                )));
            }
        }

        for (field, value, relative) in [
            ("commit_in", &d.commit_in, true),
            ("commit_at", &d.commit_at, false),
            ("revert_in", &d.revert_in, true),
            ("revert_at", &d.revert_at, false),
        ] {
            let Some(value) = value else { continue };
            let parsed = if relative {
                TimeDirective::parse_relative(value)
            } else {
                TimeDirective::parse_absolute(value)
            };
            if let Err(e) = parsed {
                warnings.push(ConfigWarning::error(format!("defaults.{field}: {e}")));
            }
        }

        if !self.templates_path(root).is_dir() {
            warnings.push(ConfigWarning::warning(format!(
                "templates_dir '{}' does not exist",
                self.templates_dir
            )));
        }

        if self.recovery_max_age_secs == 0 {
            warnings.push(ConfigWarning::warning(
                "recovery_max_age_secs is 0: any in-flight commit or revert is failed on startup"
                    .to_string(),
            ));
        }

        for (name, device) in &self.devices {
            let path = self.device_path(root, device);
            if !path.is_dir() {
                warnings.push(ConfigWarning::warning(format!(
                    "device '{name}': {} does not exist (device will be unreachable)",
                    path.display()
                )));
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
