//! Result and error types for domprobe.
//!
//! Only genuine test-authoring defects are errors here. Selector absence,
//! inference absence and wait timeouts are ordinary values elsewhere in the
//! crate; see [`crate::Resolution`], [`crate::StateLabel`] and
//! [`crate::WaitOutcome`].

use thiserror::Error;

/// Result type for domprobe operations
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Errors that can occur while probing a page
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Browser executable not found
    #[error("Browser not found. Install Chromium or set CHROMIUM_PATH")]
    BrowserNotFound,

    /// Browser launch error
    #[error("Failed to launch browser: {message}")]
    BrowserLaunch {
        /// Error message
        message: String,
    },

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// The page driver failed to carry out a query or command
    #[error("Driver error: {message}")]
    Driver {
        /// Error message
        message: String,
    },

    /// Script evaluation failed inside the page
    #[error("Script evaluation failed: {message}")]
    Script {
        /// Error message
        message: String,
    },

    /// Selector descriptor is malformed or unsupported by the driver
    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector {
        /// Selector text
        selector: String,
        /// Why it was rejected
        reason: String,
    },

    /// No DOM target and no synthetic fallback could deliver an action
    #[error("Action '{action}' could not be delivered (tried: {tried})")]
    ActionUndeliverable {
        /// Description of the action
        action: String,
        /// Delivery paths that were attempted
        tried: String,
    },

    /// A wait was escalated to a failure by the caller
    #[error("Timed out after {ms}ms waiting for {waited_for}")]
    Timeout {
        /// Timeout in milliseconds
        ms: u64,
        /// Description of what was waited for
        waited_for: String,
    },

    /// A condition checked once (or after a bounded retry) did not hold
    #[error("Condition not met: {condition}")]
    ConditionNotMet {
        /// Description of the condition
        condition: String,
    },

    /// Inferred state was not in the tolerated set
    #[error("Unexpected state '{actual}', expected one of [{expected}]")]
    UnexpectedState {
        /// Observed label
        actual: String,
        /// Tolerated labels
        expected: String,
    },

    /// Diagnostics were captured where a clean run was required
    #[error("Page reported {count} unexpected diagnostic(s): {messages}")]
    UnexpectedDiagnostics {
        /// Number of diagnostics
        count: usize,
        /// Joined messages
        messages: String,
    },

    /// A required error (e.g. an expected syntax error) never appeared
    #[error("No error matched /{pattern}/ ({captured} errors captured)")]
    MissingDiagnostic {
        /// Pattern that was expected
        pattern: String,
        /// How many errors and exceptions were captured
        captured: usize,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl ProbeError {
    /// Create a driver error
    #[must_use]
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver {
            message: message.into(),
        }
    }

    /// Create a script error
    #[must_use]
    pub fn script(message: impl Into<String>) -> Self {
        Self::Script {
            message: message.into(),
        }
    }

    /// Create an invalid selector error
    #[must_use]
    pub fn invalid_selector(selector: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSelector {
            selector: selector.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether this error came from a malformed selector
    #[must_use]
    pub const fn is_invalid_selector(&self) -> bool {
        matches!(self, Self::InvalidSelector { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undeliverable_message_names_action_and_paths() {
        let err = ProbeError::ActionUndeliverable {
            action: "click [#start]".to_string(),
            tried: "dom, method app.send".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("click [#start]"));
        assert!(text.contains("method app.send"));
    }

    #[test]
    fn test_invalid_selector_helper() {
        let err = ProbeError::invalid_selector("button[", "unbalanced '['");
        assert!(err.is_invalid_selector());
        assert!(err.to_string().contains("button["));
    }

    #[test]
    fn test_driver_error_is_not_selector_error() {
        assert!(!ProbeError::driver("socket closed").is_invalid_selector());
    }
}
