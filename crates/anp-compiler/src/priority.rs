//! Priority validation for standard policies.
//!
//! Standard policies must use a priority in `[MIN_PRIORITY, MAX_PRIORITY]`
//! and no two of them may share a priority. Validation runs once over a
//! consistent snapshot of all sibling policies and reports every violation
//! instead of stopping at the first one.

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use thiserror::Error;

use crate::types::Policy;

/// Lowest supported standard policy priority.
pub const MIN_PRIORITY: i32 = 0;
/// Highest supported standard policy priority.
pub const MAX_PRIORITY: i32 = 99;

/// A single priority violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PriorityViolation {
    #[error("policy {policy} has unsupported priority {priority}: only priority ranges {min}-{max} are supported")]
    OutOfRange {
        policy: String,
        priority: i32,
        min: i32,
        max: i32,
    },

    #[error("policy {policy} with priority {priority} conflicts: {existing} exists with the same priority")]
    Duplicate {
        /// Policy reported as conflicting.
        policy: String,
        /// Policy that first claimed the priority.
        existing: String,
        priority: i32,
    },
}

/// All priority violations found in one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriorityConflicts {
    violations: Vec<PriorityViolation>,
    /// Snapshot positions of the policies to leave out of compilation.
    #[serde(skip)]
    excluded: BTreeSet<usize>,
}

impl PriorityConflicts {
    pub fn violations(&self) -> &[PriorityViolation] {
        &self.violations
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Positions in the validated slice of the policies to leave out of
    /// compilation: every policy with an out-of-range priority and every
    /// later holder of a shared priority.
    pub fn excluded_positions(&self) -> &BTreeSet<usize> {
        &self.excluded
    }

    pub fn is_excluded(&self, position: usize) -> bool {
        self.excluded.contains(&position)
    }

    pub fn into_violations(self) -> Vec<PriorityViolation> {
        self.violations
    }
}

impl fmt::Display for PriorityConflicts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} priority conflict(s)", self.violations.len())?;
        for violation in &self.violations {
            write!(f, "; {}", violation)?;
        }
        Ok(())
    }
}

impl std::error::Error for PriorityConflicts {}

/// Validates the priorities of the standard policies in `policies`.
///
/// Baseline policies carry no priority and are ignored. The first policy to
/// claim a priority (in slice order) keeps it; every later claimant is
/// reported against it.
pub fn validate(policies: &[Policy]) -> Result<(), PriorityConflicts> {
    let mut violations = Vec::new();
    let mut excluded = BTreeSet::new();
    let mut holders: HashMap<i32, &str> = HashMap::new();

    for (position, policy) in policies.iter().enumerate() {
        let Some(priority) = policy.priority() else {
            continue;
        };

        if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&priority) {
            violations.push(PriorityViolation::OutOfRange {
                policy: policy.name().to_string(),
                priority,
                min: MIN_PRIORITY,
                max: MAX_PRIORITY,
            });
            excluded.insert(position);
        }

        match holders.get(&priority) {
            Some(existing) => {
                violations.push(PriorityViolation::Duplicate {
                    policy: policy.name().to_string(),
                    existing: existing.to_string(),
                    priority,
                });
                excluded.insert(position);
            }
            None => {
                holders.insert(priority, policy.name());
            }
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(PriorityConflicts {
            violations,
            excluded,
        })
    }
}
