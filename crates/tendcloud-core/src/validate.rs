//! Pre-flight checks of desired resources
//!
//! Families add violations to a [`Checks`] collector. A resource with any
//! violation is skipped as a whole, including every follow-up step.

use serde::{Deserialize, Serialize};

/// Inclusive numeric range allowed by a capacity table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: u32,
    pub max: u32,
}

impl Bounds {
    #[must_use]
    pub const fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    #[must_use]
    pub fn contains(&self, value: u32) -> bool {
        (self.min..=self.max).contains(&value)
    }

    /// Width of the range, used for allowances purchased on top of `min`
    #[must_use]
    pub fn span(&self) -> u32 {
        self.max.saturating_sub(self.min)
    }
}

/// A failed pre-flight check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Check key, used as the step key in outcome maps
    pub key: String,
    pub message: String,
}

/// Collector of violations for one resource
#[derive(Debug, Default)]
pub struct Checks {
    violations: Vec<Violation>,
}

impl Checks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a violation
    pub fn fail(&mut self, key: &str, message: impl Into<String>) {
        self.violations.push(Violation {
            key: key.to_string(),
            message: message.into(),
        });
    }

    /// Record a violation unless `ok` holds
    pub fn require(&mut self, ok: bool, key: &str, message: impl FnOnce() -> String) {
        if !ok {
            self.fail(key, message());
        }
    }

    /// Require `value` to lie within `bounds`
    pub fn within(&mut self, key: &str, field: &str, value: u32, bounds: Bounds) {
        self.require(bounds.contains(value), key, || {
            format!(
                "{field} {value} is outside of the allowed range [{}, {}].",
                bounds.min, bounds.max
            )
        });
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    #[must_use]
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    #[must_use]
    pub fn into_violations(self) -> Vec<Violation> {
        self.violations
    }
}

/// Decision for a create or modify candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Run the family's steps
    Proceed,
    /// Every mutable field already matches; issue no calls
    Unchanged,
    /// At least one check failed; issue no calls
    Rejected(Vec<Violation>),
}

impl From<Checks> for Verdict {
    fn from(checks: Checks) -> Self {
        if checks.is_empty() {
            Verdict::Proceed
        } else {
            Verdict::Rejected(checks.into_violations())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds() {
        let bounds = Bounds::new(2, 8);
        assert!(bounds.contains(2));
        assert!(bounds.contains(8));
        assert!(!bounds.contains(9));
        assert_eq!(bounds.span(), 6);
        assert_eq!(Bounds::new(5, 1).span(), 0);
    }

    #[test]
    fn test_checks_collect_into_verdict() {
        let mut checks = Checks::new();
        checks.within("check-shard-count", "shard count", 4, Bounds::new(1, 32));
        assert_eq!(Verdict::from(checks), Verdict::Proceed);

        let mut checks = Checks::new();
        checks.within("check-shard-count", "shard count", 64, Bounds::new(1, 32));
        checks.require(false, "check-shard-class", || "unknown class.".to_string());
        let Verdict::Rejected(violations) = Verdict::from(checks) else {
            panic!("expected rejection");
        };
        assert_eq!(violations.len(), 2);
        assert_eq!(violations[0].key, "check-shard-count");
        assert_eq!(
            violations[0].message,
            "shard count 64 is outside of the allowed range [1, 32]."
        );
    }
}
