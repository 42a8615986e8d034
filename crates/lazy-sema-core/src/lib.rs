//! Lazy Sema Core
//!
//! A lazy, phase-ordered semantic resolution engine: on-demand, re-entrant,
//! phase-gated resolution of program declarations with cycle detection,
//! partial-state checkpoint/rollback, and cross-declaration dependency
//! triggering.
//!
//! # Core Modules
//!
//! - [`session`]: the [`ResolveSession`](session::ResolveSession) facade,
//!   the entry point for "resolve this declaration to phase P"
//! - [`lazy`]: per-phase resolver policy objects and their closed registry
//! - [`locks`]: scope-keyed, context-token re-entrant lock provider
//! - [`state_keeper`]: snapshot/restore making phase transforms
//!   effectively transactional
//! - [`computation`]: per-call cycle detection and deduplication
//! - [`provider`]: symbol lookup across module boundaries
//! - [`errors`]: the fatal error taxonomy
//!
//! # Example
//!
//! ```
//! use lazy_sema_core::session::ResolveSession;
//! use lazy_sema_types::{DeclTreeBuilder, ResolvePhase};
//! use std::sync::Arc;
//!
//! let mut builder = DeclTreeBuilder::new();
//! let file = builder.file("lib");
//! let class = builder.class(file, "Widget");
//! let method = builder.function(class, "render");
//! let tree = Arc::new(builder.finish());
//!
//! let session = ResolveSession::new(Arc::clone(&tree));
//! session.resolve(method, ResolvePhase::Status).unwrap();
//! session.check_is_resolved(method, ResolvePhase::Status).unwrap();
//! assert!(tree.phase(class) >= ResolvePhase::Status);
//! ```

pub mod computation;
pub mod errors;
pub mod lazy;
pub mod locks;
pub mod provider;
pub mod session;
pub mod state_keeper;

mod phase_update;
mod resolver;
mod transformers;

// Re-export the common surface at crate root
pub use computation::{ComputationSession, ResolutionStatus};
pub use errors::ResolveError;
pub use lazy::{resolver_for_phase, LazyResolver};
pub use locks::{LockContext, LockProvider, ScopeKey};
pub use provider::{SymbolProvider, TreeSymbolProvider};
pub use session::{ResolveSession, SessionConfig, SessionRegistry, SessionStats, StatsSnapshot};
pub use state_keeper::{declaration_keeper, StateKeeper, StateSnapshot, TrackedField};
