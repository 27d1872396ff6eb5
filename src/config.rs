//! Configuration for intake paths and endpoints.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (INTAKE_HOME, INTAKE_ENDPOINT)
//! 2. Config file (.intake/config.yaml)
//! 3. Defaults (~/.intake)
//!
//! Config file discovery:
//! - Searches current directory and parents for .intake/config.yaml

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::adapters::{GoogleAdsConfig, MetaCapiConfig};
use crate::core::limits::IntakeLimits;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub home: Option<String>,
    #[serde(default)]
    pub endpoint: Option<EndpointConfig>,
    #[serde(default)]
    pub conversion: Option<ConversionConfig>,
    #[serde(default)]
    pub limits: Option<IntakeLimits>,
    #[serde(default)]
    pub form: Option<FormConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EndpointConfig {
    /// Enquiry submission URL
    pub submit_url: Option<String>,
    /// CSRF token side-channel URL
    pub token_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConversionConfig {
    pub google: Option<GoogleAdsConfig>,
    pub meta: Option<MetaCapiConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FormConfig {
    /// Seconds a success confirmation shows before the form resets
    pub reset_delay_secs: Option<u64>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to intake home (staging state)
    pub home: PathBuf,
    /// Submission endpoint settings
    pub endpoint: EndpointConfig,
    /// Conversion platform settings
    pub conversion: ConversionConfig,
    /// Content limits and retention
    pub limits: IntakeLimits,
    /// Delay before a confirmed form resets
    pub reset_delay_secs: u64,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".intake").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's parent
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".intake");

    let config_file = find_config_file();
    let file = match &config_file {
        Some(path) => Some(load_config_file(path)?),
        None => None,
    };

    // Home: env var beats config file beats default
    let home = if let Ok(env_home) = std::env::var("INTAKE_HOME") {
        PathBuf::from(env_home)
    } else if let (Some(config_path), Some(home_path)) = (
        config_file.as_deref(),
        file.as_ref().and_then(|f| f.home.as_deref()),
    ) {
        let intake_dir = config_path.parent().unwrap_or(Path::new("."));
        resolve_path(intake_dir, home_path)
    } else {
        default_home
    };

    // Endpoint: env var overrides the submit URL only
    let mut endpoint = file
        .as_ref()
        .and_then(|f| f.endpoint.clone())
        .unwrap_or_default();
    if let Ok(env_endpoint) = std::env::var("INTAKE_ENDPOINT") {
        endpoint.submit_url = Some(env_endpoint);
    }

    let conversion = file
        .as_ref()
        .and_then(|f| f.conversion.clone())
        .unwrap_or_default();

    let limits = file
        .as_ref()
        .and_then(|f| f.limits.clone())
        .unwrap_or_default();

    let reset_delay_secs = file
        .as_ref()
        .and_then(|f| f.form.as_ref())
        .and_then(|f| f.reset_delay_secs)
        .unwrap_or(5);

    Ok(ResolvedConfig {
        home,
        endpoint,
        conversion,
        limits,
        reset_delay_secs,
        config_file,
    })
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}

// ============================================================================
// Convenience functions
// ============================================================================

/// Get the intake home directory (staging state).
pub fn intake_home() -> Result<PathBuf> {
    Ok(config()?.home.clone())
}

/// Get the staging directory ($INTAKE_HOME/staged)
pub fn staging_dir() -> Result<PathBuf> {
    Ok(config()?.home.join("staged"))
}
