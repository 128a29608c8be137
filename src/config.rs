use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure for subsync
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// Working tree of the parent repository
    #[serde(default = "default_repository")]
    pub repository: String,

    /// Submodule paths relative to the parent, processed in this order.
    /// Empty means "read them from .gitmodules".
    #[serde(default)]
    pub submodules: Vec<String>,

    /// Branch every submodule is switched to and fast-forwarded
    #[serde(default = "default_integration_branch")]
    pub integration_branch: String,

    /// Remote used for pulls and pushes
    #[serde(default = "default_remote")]
    pub remote: String,

    /// Git executable settings
    #[serde(default)]
    pub git: GitConfig,

    /// Updater behavior settings
    #[serde(default)]
    pub update: UpdateConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Git executable configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct GitConfig {
    /// Git binary, resolved through PATH unless absolute
    #[serde(default = "default_git_binary")]
    pub binary: String,
}

/// Submodule update configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct UpdateConfig {
    /// Pass --recursive to `git submodule update`
    #[serde(default = "default_true")]
    pub recursive: bool,

    /// Fast-forward only pulls
    #[serde(default = "default_true")]
    pub fast_forward_only: bool,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String, // "info"
}

// Default value functions
fn default_repository() -> String {
    ".".to_string()
}
fn default_integration_branch() -> String {
    "main".to_string()
}
fn default_remote() -> String {
    "origin".to_string()
}
fn default_git_binary() -> String {
    "git".to_string()
}
fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "info".to_string()
}

// Default implementations
impl Default for GitConfig {
    fn default() -> Self {
        Self {
            binary: default_git_binary(),
        }
    }
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            recursive: default_true(),
            fast_forward_only: default_true(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, falling back to built-in defaults
    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load(&config_path)
        } else {
            tracing::debug!("No configuration at {:?}, using defaults", config_path);
            let mut config = Self::default();
            config.expand_paths()?;
            Ok(config)
        }
    }

    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        config.expand_paths()?;

        Ok(config)
    }

    /// Save configuration to a file, creating parent directories as needed
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    /// Get the default configuration file path (XDG compliant)
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to get user config directory")?;

        Ok(config_dir.join("subsync").join("config.yml"))
    }

    /// Expand environment variables and `~` in configuration paths
    pub fn expand_paths(&mut self) -> Result<()> {
        self.repository = shellexpand::full(&self.repository)
            .context("Failed to expand repository path")?
            .into_owned();

        self.git.binary = shellexpand::full(&self.git.binary)
            .context("Failed to expand git binary path")?
            .into_owned();

        Ok(())
    }

    /// Parent repository working tree
    pub fn repository_path(&self) -> PathBuf {
        PathBuf::from(&self.repository)
    }

    /// Apply one-off command line overrides on top of the loaded file
    pub fn with_overrides(
        mut self,
        repository: Option<String>,
        submodules: Vec<String>,
        integration_branch: Option<String>,
    ) -> Result<Self> {
        if let Some(repository) = repository {
            self.repository = shellexpand::full(&repository)
                .context("Failed to expand repository path")?
                .into_owned();
        }
        if !submodules.is_empty() {
            self.submodules = submodules;
        }
        if let Some(branch) = integration_branch {
            self.integration_branch = branch;
        }
        Ok(self)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            repository: default_repository(),
            submodules: Vec::new(),
            integration_branch: default_integration_branch(),
            remote: default_remote(),
            git: GitConfig::default(),
            update: UpdateConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
