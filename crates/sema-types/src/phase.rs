//! The ordered resolution phase model.
//!
//! Declarations advance through phases strictly monotonically. Each phase has
//! a dedicated transform in `lazy-sema-core`; a declaration observed at phase
//! `P` is guaranteed to carry the resolved data of every phase up to and
//! including `P`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An element of the strictly ordered sequence of resolution stages.
///
/// The numeric discriminant is the phase's position in the sequence and is
/// what gets stored in a declaration's atomic phase slot, so variants must
/// stay dense and ordered.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResolvePhase {
    /// Parser output; nothing resolved yet. Every declaration starts here.
    RawTree = 0,
    /// The containing file's import table is resolved.
    Imports = 1,
    /// Annotations recognized by the compiler or a registered plugin are
    /// resolved to their annotation-class declarations.
    CompilerRequiredAnnotations = 2,
    /// Class supertype references are resolved to class declarations.
    SuperTypes = 3,
    /// Deprecation status is computed from the resolved annotations.
    Status = 4,
    /// Terminal phase. Body-level analysis is outside this engine's scope,
    /// so the transform is phase bookkeeping only.
    BodyResolve = 5,
}

impl ResolvePhase {
    /// All phases, in resolution order.
    pub const ALL: [ResolvePhase; 6] = [
        ResolvePhase::RawTree,
        ResolvePhase::Imports,
        ResolvePhase::CompilerRequiredAnnotations,
        ResolvePhase::SuperTypes,
        ResolvePhase::Status,
        ResolvePhase::BodyResolve,
    ];

    /// Position of this phase in the resolution order.
    pub fn index(self) -> u8 {
        self as u8
    }

    /// Reverse of [`ResolvePhase::index`]. Returns `None` for indices past
    /// the end of the sequence.
    pub fn from_index(index: u8) -> Option<ResolvePhase> {
        Self::ALL.get(index as usize).copied()
    }

    /// The prerequisite phase. [`ResolvePhase::RawTree`] is its own
    /// predecessor; there is nothing before the parse.
    pub fn previous(self) -> ResolvePhase {
        match self.index().checked_sub(1) {
            Some(i) => Self::ALL[i as usize],
            None => ResolvePhase::RawTree,
        }
    }

    /// The phase after this one, if any.
    pub fn next(self) -> Option<ResolvePhase> {
        Self::from_index(self.index() + 1)
    }

    /// Phases strictly between [`ResolvePhase::RawTree`] and `self`,
    /// inclusive of `self`: the chain a lazy resolve call must drive.
    pub fn steps_through(self) -> impl Iterator<Item = ResolvePhase> {
        Self::ALL
            .into_iter()
            .filter(move |p| *p > ResolvePhase::RawTree && *p <= self)
    }
}

impl fmt::Display for ResolvePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResolvePhase::RawTree => "RAW_TREE",
            ResolvePhase::Imports => "IMPORTS",
            ResolvePhase::CompilerRequiredAnnotations => "COMPILER_REQUIRED_ANNOTATIONS",
            ResolvePhase::SuperTypes => "SUPER_TYPES",
            ResolvePhase::Status => "STATUS",
            ResolvePhase::BodyResolve => "BODY_RESOLVE",
        };
        f.write_str(name)
    }
}
