//! Error types - config loading and run-level failures
//!
//! Tool-level problems (non-zero exit, timeout) are not errors; they are
//! recorded as a [`crate::core::ToolStatus`] and the run continues. Only the
//! variants of [`RunError`] abort a run.

use crate::core::TemplateError;
use std::path::PathBuf;
use thiserror::Error;

/// Exit status for a run stopped by an interrupt
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Exit status for a config error or a fatal tool error
pub const FAILURE_EXIT_CODE: i32 = 1;

/// Errors raised while loading and validating a config file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file {} not found", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read config file {path}: {source}", path = .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML format: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("missing '{0}' section in YAML file")]
    MissingSection(&'static str),

    #[error("environment entry #{index} missing required field: {field}")]
    InvalidEnv { index: usize, field: &'static str },

    #[error("tool '{tool}' missing required field: {field}")]
    MissingField { tool: String, field: &'static str },

    #[error("tool '{tool}' flags: {source}")]
    Template {
        tool: String,
        #[source]
        source: TemplateError,
    },

    #[error("tool '{tool}' timeout must be greater than zero")]
    InvalidTimeout { tool: String },

    #[error("settings: {0} must be greater than zero")]
    InvalidSetting(&'static str),
}

/// Conditions that abort a whole run
#[derive(Debug, Error)]
pub enum RunError {
    #[error("{tool} not found ('{command}'). Please install it and try again.")]
    ExecutableNotFound { tool: String, command: String },

    #[error("{tool} could not be run: {source}")]
    Io {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("run interrupted by user")]
    Interrupted,

    #[error("internal error: {0}")]
    Internal(String),
}

impl RunError {
    /// Process exit status this error maps to
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Interrupted => INTERRUPTED_EXIT_CODE,
            _ => FAILURE_EXIT_CODE,
        }
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(RunError::Interrupted.exit_code(), 130);
        let missing = RunError::ExecutableNotFound {
            tool: "nmap".into(),
            command: "nmap".into(),
        };
        assert_eq!(missing.exit_code(), 1);
        assert!(!missing.is_interrupted());
    }

    #[test]
    fn test_messages_name_the_tool() {
        let err = ConfigError::Template {
            tool: "nuclei".into(),
            source: TemplateError::MissingPlaceholder,
        };
        assert_eq!(
            err.to_string(),
            "tool 'nuclei' flags: missing {target} placeholder"
        );

        let err = RunError::ExecutableNotFound {
            tool: "nmap".into(),
            command: "/opt/nmap".into(),
        };
        assert!(err.to_string().starts_with("nmap not found"));
    }
}
