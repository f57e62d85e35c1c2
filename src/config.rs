use std::path::{Path, PathBuf};
use std::time::Duration;

use facet::Facet;

use crate::error::VmAgentError;

pub const DEFAULT_CONFIG_FILE: &str = "vmagent.toml";

#[derive(Debug, Clone, Default, Facet)]
#[facet(default)]
pub struct Config {
    #[facet(default)]
    pub tools: ToolsConfig,
    #[facet(default)]
    pub build: BuildConfig,
    #[facet(default)]
    pub vagrant: VagrantConfig,
}

/// Executables for the external tools.
#[derive(Debug, Clone, Facet)]
#[facet(default)]
pub struct ToolsConfig {
    #[facet(default = "packer")]
    pub packer: String,
    #[facet(default = "vagrant")]
    pub vagrant: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            packer: "packer".into(),
            vagrant: "vagrant".into(),
        }
    }
}

#[derive(Debug, Clone, Facet)]
#[facet(default)]
pub struct BuildConfig {
    #[facet(default = "build.json")]
    pub template: String,
    #[facet(default = "packer_virtualbox-iso_virtualbox.box")]
    pub artifact: String,
    #[facet(default = 10)]
    pub poll_interval_s: u64,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            template: "build.json".into(),
            artifact: "packer_virtualbox-iso_virtualbox.box".into(),
            poll_interval_s: 10,
        }
    }
}

#[derive(Debug, Clone, Facet)]
#[facet(default)]
pub struct VagrantConfig {
    #[facet(default = "Vagrantfile")]
    pub vagrantfile: String,
    /// Custom Vagrantfile template; empty uses the built-in one.
    #[facet(default)]
    pub template: String,
}

impl Default for VagrantConfig {
    fn default() -> Self {
        Self {
            vagrantfile: "Vagrantfile".into(),
            template: String::new(),
        }
    }
}

impl Config {
    pub fn artifact_path(&self) -> PathBuf {
        PathBuf::from(&self.build.artifact)
    }

    pub fn vagrantfile_path(&self) -> PathBuf {
        PathBuf::from(&self.vagrant.vagrantfile)
    }

    pub fn template_override(&self) -> Option<PathBuf> {
        if self.vagrant.template.is_empty() {
            None
        } else {
            Some(PathBuf::from(&self.vagrant.template))
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.build.poll_interval_s)
    }
}

// ── validation ────────────────────────────────────────────

fn validate_config(config: &Config) -> Result<(), VmAgentError> {
    let required = [
        ("tools.packer", &config.tools.packer),
        ("tools.vagrant", &config.tools.vagrant),
        ("build.template", &config.build.template),
        ("build.artifact", &config.build.artifact),
        ("vagrant.vagrantfile", &config.vagrant.vagrantfile),
    ];
    for (key, value) in required {
        if value.trim().is_empty() {
            return Err(VmAgentError::Validation {
                message: format!("{key} must not be empty"),
            });
        }
    }

    if config.build.poll_interval_s < 1 {
        return Err(VmAgentError::Validation {
            message: "build.poll_interval_s must be at least 1".into(),
        });
    }

    Ok(())
}

/// Load and validate the tool config.
///
/// When `optional` is set and the file does not exist, built-in defaults
/// are returned instead of an error.
pub fn load_config(path: &Path, optional: bool) -> Result<Config, VmAgentError> {
    if optional && !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(Config::default());
    }

    let contents = std::fs::read_to_string(path).map_err(|source| VmAgentError::ConfigLoad {
        path: path.display().to_string(),
        source,
    })?;

    let config: Config = facet_toml::from_str(&contents).map_err(|e| VmAgentError::ConfigParse {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    validate_config(&config)?;
    tracing::debug!(path = %path.display(), ?config, "loaded config");

    Ok(config)
}
