//! Guardrails pipeline result types (spec.md §3 `ValidationResult`).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Severity of a single validation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational only.
    Info,
    /// Non-fatal but worth surfacing.
    Warning,
    /// Fatal to the content under review.
    Error,
}

/// One validation failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationError {
    /// Machine-readable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Severity of this error.
    pub severity: Severity,
}

impl ValidationError {
    /// Construct a new validation error.
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            severity,
        }
    }
}

/// Outcome of running one or more validators over a piece of content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Whether the content is acceptable.
    pub valid: bool,
    /// Whether a tripwire fired; forces immediate chain termination.
    pub tripwire: bool,
    /// Ordered list of errors accumulated across the chain.
    pub errors: Vec<ValidationError>,
    /// Content as rewritten by output filters (equals the input when no
    /// filter ran, or when this result is from an input-side validator).
    pub filtered_content: String,
    /// Arbitrary validator-contributed metadata.
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ValidationResult {
    /// A passing result with no errors, carrying `content` unmodified.
    #[must_use]
    pub fn pass(content: impl Into<String>) -> Self {
        Self {
            valid: true,
            tripwire: false,
            errors: Vec::new(),
            filtered_content: content.into(),
            metadata: HashMap::new(),
        }
    }

    /// A failing result with one error, carrying `content` unmodified.
    #[must_use]
    pub fn fail(content: impl Into<String>, error: ValidationError) -> Self {
        Self {
            valid: false,
            tripwire: false,
            errors: vec![error],
            filtered_content: content.into(),
            metadata: HashMap::new(),
        }
    }

    /// A tripwire result: immediately fatal regardless of chain mode.
    #[must_use]
    pub fn tripwire(content: impl Into<String>, error: ValidationError) -> Self {
        Self {
            valid: false,
            tripwire: true,
            errors: vec![error],
            filtered_content: content.into(),
            metadata: HashMap::new(),
        }
    }

    /// Merge two results: valid is AND'd, tripwire is OR'd, errors and
    /// metadata are concatenated/merged. `filtered_content` from `other`
    /// wins when non-empty (later validators/filters see the latest text).
    #[must_use]
    pub fn merge(mut self, mut other: Self) -> Self {
        self.valid = self.valid && other.valid;
        self.tripwire = self.tripwire || other.tripwire;
        self.errors.append(&mut other.errors);
        self.metadata.extend(other.metadata);
        if !other.filtered_content.is_empty() {
            self.filtered_content = other.filtered_content;
        }
        self
    }
}
