use std::{
    env,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{archive::Compression, router::RouterSettings};

/// Expand tilde (~) in path to user's home directory
fn expand_tilde(path: &Path) -> PathBuf {
    if let Some(s) = path.to_str() {
        if let Some(stripped) = s.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(stripped);
            }
        } else if s == "~" {
            if let Some(home) = dirs::home_dir() {
                return home;
            }
        }
    }
    path.to_path_buf()
}

/// Which collaborator implementation to run against
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Aws,
    Filesystem,
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aws" => Ok(BackendKind::Aws),
            "filesystem" => Ok(BackendKind::Filesystem),
            other => anyhow::bail!("Unknown backend {:?} (expected aws or filesystem)", other),
        }
    }
}

/// How to invoke the `aws` CLI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AwsConfig {
    #[serde(default = "defaults::aws_cli_path")]
    pub cli_path: PathBuf,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub profile: Option<String>,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            cli_path: defaults::aws_cli_path(),
            region: None,
            profile: None,
        }
    }
}

/// Configuration for branch-archiver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendKind,
    #[serde(default)]
    pub aws: AwsConfig,
    /// Root directory of the filesystem backend
    #[serde(default)]
    pub filesystem_root: Option<PathBuf>,
    /// Branches whose events are never acted on
    #[serde(default = "defaults::protected_branches")]
    pub protected_branches: Vec<String>,
    /// Key prefix archives are uploaded under, followed by the pipeline name
    #[serde(default = "defaults::artifact_prefix")]
    pub artifact_prefix: String,
    #[serde(default)]
    pub compression: Compression,
    #[serde(default = "defaults::max_tree_depth")]
    pub max_tree_depth: usize,
    #[serde(default)]
    pub show_progress: bool,
    /// Default tracing filter when RUST_LOG is unset
    #[serde(default = "defaults::log_filter")]
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            aws: AwsConfig::default(),
            filesystem_root: None,
            protected_branches: defaults::protected_branches(),
            artifact_prefix: defaults::artifact_prefix(),
            compression: Compression::default(),
            max_tree_depth: defaults::max_tree_depth(),
            show_progress: false,
            log_filter: defaults::log_filter(),
        }
    }
}

impl Config {
    /// Load configuration from the config file and environment variables
    ///
    /// An explicit `path` must exist; the default path may be absent, in which
    /// case defaults apply.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, |key| env::var(key).ok())
    }

    /// [`Config::load`] with a custom environment lookup
    pub fn load_with_env<F>(path: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) => {
                tracing::debug!("loading branch-archiver config from {:?}", path);
                if !path.exists() {
                    anyhow::bail!("config file not found at {:?}", path);
                }
                Self::load_from_file(path)?
            }
            None => {
                let default_path = Self::config_file_path()?;
                tracing::debug!("loading branch-archiver config from {:?}", default_path);
                if default_path.exists() {
                    Self::load_from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env(lookup)?;
        Ok(config)
    }

    fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(backend) = lookup("BRANCH_ARCHIVER_BACKEND") {
            self.backend = backend
                .parse()
                .context("Failed to parse BRANCH_ARCHIVER_BACKEND")?;
        }

        if let Some(path) = lookup("BRANCH_ARCHIVER_ROOT") {
            self.filesystem_root = Some(expand_tilde(&PathBuf::from(path)));
        }

        if let Some(path) = lookup("BRANCH_ARCHIVER_AWS_CLI") {
            self.aws.cli_path = expand_tilde(&PathBuf::from(path));
        }

        if let Some(region) = lookup("BRANCH_ARCHIVER_AWS_REGION") {
            self.aws.region = Some(region);
        }

        if let Some(profile) = lookup("BRANCH_ARCHIVER_AWS_PROFILE") {
            self.aws.profile = Some(profile);
        }

        if let Some(branches) = lookup("BRANCH_ARCHIVER_PROTECTED_BRANCHES") {
            self.protected_branches = branches
                .split(',')
                .map(str::trim)
                .filter(|b| !b.is_empty())
                .map(String::from)
                .collect();
        }

        if let Some(depth) = lookup("BRANCH_ARCHIVER_MAX_TREE_DEPTH") {
            self.max_tree_depth = depth
                .parse()
                .context("Failed to parse BRANCH_ARCHIVER_MAX_TREE_DEPTH as usize")?;
        }

        if let Some(prefix) = lookup("BRANCH_ARCHIVER_ARTIFACT_PREFIX") {
            self.artifact_prefix = prefix;
        }

        Ok(())
    }

    /// Load configuration from a file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        // Expand tildes in all path fields
        config.aws.cli_path = expand_tilde(&config.aws.cli_path);
        if let Some(ref root) = config.filesystem_root {
            config.filesystem_root = Some(expand_tilde(root));
        }

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        // Ensure directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    /// Get default config file path
    pub fn config_file_path() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(".config/branch-archiver/config.yaml"))
            .context("Could not determine home directory for config file")
    }

    /// Root of the filesystem backend, required when that backend is selected
    pub fn filesystem_root(&self) -> Result<&Path> {
        self.filesystem_root
            .as_deref()
            .context("filesystem backend selected but filesystem_root is not set")
    }

    pub fn router_settings(&self) -> RouterSettings {
        RouterSettings {
            protected_branches: self.protected_branches.clone(),
            artifact_prefix: self.artifact_prefix.clone(),
            compression: self.compression,
            max_tree_depth: self.max_tree_depth,
            show_progress: self.show_progress,
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    pub(crate) fn aws_cli_path() -> PathBuf {
        PathBuf::from("aws")
    }

    pub(crate) fn protected_branches() -> Vec<String> {
        vec!["master".to_string()]
    }

    pub(crate) fn artifact_prefix() -> String {
        "artifacts".to_string()
    }

    pub(crate) fn max_tree_depth() -> usize {
        crate::tree::DEFAULT_MAX_DEPTH
    }

    pub(crate) fn log_filter() -> String {
        "branch_archiver=info".to_string()
    }
}
