//! The fatal error taxonomy of the resolution engine.
//!
//! Everything here is a programming-error class: a resolver/data-model
//! mismatch that must abort the current top-level resolution rather than
//! continue with stale data. Cycle detection is deliberately absent; a
//! cycle is an expected condition handled inside the target resolver and
//! never surfaces as an error.

use lazy_sema_types::{DeclKind, ResolvePhase};
use std::fmt;

#[derive(Debug, Clone)]
pub enum ResolveError {
    /// A declaration was observed below the phase it should already have
    /// reached.
    PhaseInvariantViolation {
        declaration: String,
        expected: ResolvePhase,
        actual: ResolvePhase,
    },

    /// A declaration kind reached a phase dispatcher that cannot process it.
    UnexpectedDeclaration {
        declaration: String,
        kind: DeclKind,
        phase: ResolvePhase,
    },

    /// The lock provider itself failed (e.g. a configured acquisition
    /// deadline expired). Not expected in single-process use.
    LockProvider { scope: String, reason: String },
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::PhaseInvariantViolation {
                declaration,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "phase invariant violated for {}: required {}, found {}",
                    declaration, expected, actual
                )
            }
            ResolveError::UnexpectedDeclaration {
                declaration,
                kind,
                phase,
            } => {
                write!(
                    f,
                    "unexpected {} declaration {} in the {} resolver",
                    kind, declaration, phase
                )
            }
            ResolveError::LockProvider { scope, reason } => {
                write!(f, "lock provider failure on scope {}: {}", scope, reason)
            }
        }
    }
}

impl std::error::Error for ResolveError {}
