//! Diagnostics sink for non-fatal problems hit during load and save.
//!
//! Partial-asset faults never abort an operation; they accumulate here
//! and are surfaced to the caller as advisory text.

/// Accumulated warnings and non-fatal errors from a load operation.
#[derive(Debug, Default, Clone)]
pub struct LoadReport {
    warnings: String,
    errors: String,
}

impl LoadReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning line (e.g. one skipped asset entry).
    pub fn warn<S: AsRef<str>>(&mut self, message: S) {
        self.warnings.push_str(message.as_ref());
        self.warnings.push('\n');
    }

    /// Record a non-fatal error line (e.g. a corrupted snapshot entry).
    pub fn error<S: AsRef<str>>(&mut self, message: S) {
        self.errors.push_str(message.as_ref());
        self.errors.push('\n');
    }

    pub fn warnings(&self) -> &str {
        &self.warnings
    }

    pub fn errors(&self) -> &str {
        &self.errors
    }

    /// True when the load completed without any advisory condition.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty() && self.errors.is_empty()
    }

    /// Fold another report into this one, prepending its content.
    ///
    /// Document-level diagnostics are reported before asset-level ones.
    pub fn prepend(&mut self, other: &LoadReport) {
        self.warnings = format!("{}{}", other.warnings, self.warnings);
        self.errors = format!("{}{}", other.errors, self.errors);
    }
}

/// Accumulated advisory log of assets that could not be packed during
/// a save. Never a hard failure by itself.
#[derive(Debug, Default)]
pub struct WriteLog {
    entries: String,
}

impl WriteLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<S: AsRef<str>>(&mut self, message: S) {
        self.entries.push('\n');
        self.entries.push_str(message.as_ref());
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The advisory message, empty on a clean run.
    pub fn into_string(self) -> String {
        self.entries
    }
}
