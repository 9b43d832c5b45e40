//! Job validation applied before jobs are counted
//!
//! Validators are pure predicates over a candidate path. The jobber runs them on the
//! raw enumeration; only accepted candidates count toward the batch's hard max.

use std::path::Path;

/// Predicate over a candidate job
pub trait Validator: Send + Sync {
    /// Return true if the candidate should be processed
    fn valid(&self, candidate: &Path) -> bool;

    /// Get the name of this validator for debugging/logging
    fn name(&self) -> &'static str;
}

/// Accepts existing regular files only
#[derive(Debug, Clone, Copy, Default)]
pub struct RegularFileValidator;

impl Validator for RegularFileValidator {
    fn valid(&self, candidate: &Path) -> bool {
        // metadata() follows symlinks, so a link to a regular file is accepted
        candidate.metadata().map(|m| m.is_file()).unwrap_or(false)
    }

    fn name(&self) -> &'static str {
        "RegularFileValidator"
    }
}

/// Rejects files larger than a size limit
#[derive(Debug, Clone, Copy)]
pub struct MaxSizeValidator {
    max_size_bytes: u64,
}

impl MaxSizeValidator {
    /// Create a validator for `max_size_mb` megabytes; 0 disables the limit
    pub fn new(max_size_mb: u64) -> Self {
        Self {
            max_size_bytes: max_size_mb.saturating_mul(1024 * 1024),
        }
    }
}

impl Validator for MaxSizeValidator {
    fn valid(&self, candidate: &Path) -> bool {
        if self.max_size_bytes == 0 {
            return true;
        }
        candidate
            .metadata()
            .map(|m| m.len() <= self.max_size_bytes)
            .unwrap_or(false)
    }

    fn name(&self) -> &'static str {
        "MaxSizeValidator"
    }
}

/// Accepts a candidate only if every member accepts it
#[derive(Default)]
pub struct ValidatorChain {
    validators: Vec<Box<dyn Validator>>,
}

impl ValidatorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, validator: impl Validator + 'static) -> Self {
        self.validators.push(Box::new(validator));
        self
    }

    /// Name of the first validator rejecting `candidate`, if any
    pub fn rejected_by(&self, candidate: &Path) -> Option<&'static str> {
        self.validators
            .iter()
            .find(|v| !v.valid(candidate))
            .map(|v| v.name())
    }
}

impl Validator for ValidatorChain {
    fn valid(&self, candidate: &Path) -> bool {
        self.rejected_by(candidate).is_none()
    }

    fn name(&self) -> &'static str {
        "ValidatorChain"
    }
}
