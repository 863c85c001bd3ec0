// crates/spec-logic-config/src/config.rs
// ============================================================================
// Module: Spec Logic Configuration
// Description: Configuration loading and validation for spec-logic.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: spec-logic, serde, thiserror, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Missing or invalid configuration fails closed. A loaded config converts
//! into the [`EvaluationLimits`] applied to specifications and the
//! [`EvaluationTrace`] sink evaluators report to.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use spec_logic::DEFAULT_MAX_DEPTH;
use spec_logic::DEFAULT_MAX_NODES;
use spec_logic::EvaluationLimits;
use spec_logic::EvaluationTrace;
use spec_logic::JsonLinesTrace;
use spec_logic::NoopTrace;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "spec-logic.toml";
/// Environment variable naming the configuration file.
const CONFIG_ENV_VAR: &str = "SPEC_LOGIC_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Upper bound for `limits.max_depth`.
pub(crate) const MAX_DEPTH_LIMIT: usize = 4096;
/// Upper bound for `limits.max_nodes`.
pub(crate) const MAX_NODES_LIMIT: usize = 1_000_000;

// ============================================================================
// SECTION: Root Config
// ============================================================================

/// Root configuration for spec-logic consumers.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpecLogicConfig {
    /// Structural evaluation limits.
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Trace sink configuration.
    #[serde(default)]
    pub trace: TraceConfig,
}

impl SpecLogicConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// Resolution order: `path`, then the `SPEC_LOGIC_CONFIG` environment
    /// variable, then `spec-logic.toml` in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path("config path", &resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.limits.validate()?;
        self.trace.validate()
    }

    /// Returns the configured evaluation limits.
    #[must_use]
    pub const fn evaluation_limits(&self) -> EvaluationLimits {
        EvaluationLimits {
            max_depth: self.limits.max_depth,
            max_nodes: self.limits.max_nodes,
        }
    }

    /// Builds the configured trace sink.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the trace file cannot be opened or the
    /// trace section is invalid.
    pub fn build_trace(&self) -> Result<Arc<dyn EvaluationTrace>, ConfigError> {
        self.trace.validate()?;
        match (self.trace.mode, &self.trace.path) {
            (TraceMode::None, _) => Ok(Arc::new(NoopTrace)),
            (TraceMode::Stderr, _) => Ok(Arc::new(JsonLinesTrace::new(io::stderr()))),
            (TraceMode::File, Some(path)) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|err| ConfigError::Io(err.to_string()))?;
                Ok(Arc::new(JsonLinesTrace::new(file)))
            }
            (TraceMode::File, None) => {
                Err(ConfigError::Invalid("trace.path is required for file mode".to_string()))
            }
        }
    }
}

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Structural limits applied when compiling specifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct LimitsConfig {
    /// Maximum expression tree depth.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Maximum expression tree node count.
    #[serde(default = "default_max_nodes")]
    pub max_nodes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_nodes: default_max_nodes(),
        }
    }
}

impl LimitsConfig {
    /// Validates the limits against their allowed ranges.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_range("limits.max_depth", self.max_depth, 1, MAX_DEPTH_LIMIT)?;
        validate_range("limits.max_nodes", self.max_nodes, 1, MAX_NODES_LIMIT)
    }
}

// ============================================================================
// SECTION: Trace
// ============================================================================

/// Trace sink selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceMode {
    /// Discard every event.
    #[default]
    None,
    /// Write JSON lines to standard error.
    Stderr,
    /// Append JSON lines to `trace.path`.
    File,
}

/// Trace sink configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TraceConfig {
    /// Sink selection.
    #[serde(default)]
    pub mode: TraceMode,
    /// Output file for [`TraceMode::File`].
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl TraceConfig {
    /// Validates the trace section.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.mode, &self.path) {
            (TraceMode::File, None) => {
                Err(ConfigError::Invalid("trace.path is required for file mode".to_string()))
            }
            (TraceMode::File, Some(path)) => validate_path("trace.path", path),
            (TraceMode::None | TraceMode::Stderr, Some(_)) => Err(ConfigError::Invalid(
                "trace.path is only allowed for file mode".to_string(),
            )),
            (TraceMode::None | TraceMode::Stderr, None) => Ok(()),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration or opening a sink.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from the caller or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates a path against emptiness and length limits, naming `field` in errors.
fn validate_path(field: &str, path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().to_string_lossy().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} component too long")));
        }
    }
    Ok(())
}

/// Validates that `value` lies within `min..=max`.
fn validate_range(field: &str, value: usize, min: usize, max: usize) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::Invalid(format!("{field} must be between {min} and {max}")));
    }
    Ok(())
}

/// Default `limits.max_depth`.
pub(crate) const fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

/// Default `limits.max_nodes`.
pub(crate) const fn default_max_nodes() -> usize {
    DEFAULT_MAX_NODES
}

// ============================================================================
// SECTION: Tests
// ============================================================================
