//! Shared types for the lazy-sema workspace.
//!
//! This crate provides the foundational vocabulary used across the workspace,
//! breaking dependency chains between the resolution engine and its future
//! consumers (parser front end, IDE glue):
//!
//! - [`phase`]: the ordered sequence of resolution phases a declaration
//!   passes through
//! - [`decl`]: declarations and their phase-relevant mutable state
//! - [`tree`]: the declaration tree and its builder
//! - [`target`]: resolution targets (designations) addressing a declaration
//!   in its lexical context

pub mod decl;
pub mod phase;
pub mod target;
pub mod tree;

// Re-export the common vocabulary at crate root
pub use decl::{
    Annotation, DeclId, DeclKind, DeclState, Declaration, DeprecationsCache, Import, TypeRef,
};
pub use phase::ResolvePhase;
pub use target::{ResolveTarget, TargetKind};
pub use tree::{DeclTree, DeclTreeBuilder};
