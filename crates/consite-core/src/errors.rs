//! Structured error types shared across the delineation crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`SiteError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (feature ids, distances, stages).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.context.insert(key.into(), value.to_string());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the delineation engine.
///
/// `Config` and `Serde` errors are fatal for a whole run. `Geometry` and
/// `Unit` errors are recovered locally: a failing proto-site is reported and
/// the batch carries on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum SiteError {
    /// Invalid parameters (zero dilation distance, negative search radius, ...).
    #[error("configuration error: {0}")]
    Config(ErrorInfo),
    /// Geometry kernel failures (invalid rings, failed repair, empty results).
    #[error("geometry error: {0}")]
    Geometry(ErrorInfo),
    /// Failure confined to a single unit of work, including timeouts.
    #[error("unit error: {0}")]
    Unit(ErrorInfo),
    /// Serialization, schema and I/O errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl SiteError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            SiteError::Config(info)
            | SiteError::Geometry(info)
            | SiteError::Unit(info)
            | SiteError::Serde(info) => info,
        }
    }

    /// Whether the error must abort the whole run rather than a single unit.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SiteError::Config(_) | SiteError::Serde(_))
    }

    /// Shorthand for a configuration error.
    pub fn config(code: impl Into<String>, message: impl Into<String>) -> Self {
        SiteError::Config(ErrorInfo::new(code, message))
    }

    /// Shorthand for a geometry error.
    pub fn geometry(code: impl Into<String>, message: impl Into<String>) -> Self {
        SiteError::Geometry(ErrorInfo::new(code, message))
    }
}
