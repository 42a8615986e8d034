//! The resolution session facade.
//!
//! A [`ResolveSession`] separates what the engine *owns* from what it is
//! *given*: it owns the lock provider, the per-session scope registry and
//! the statistics counters, and it is given the shared declaration tree,
//! the read-only configuration, and a symbol provider. Everything
//! session-scoped is dropped with the session; there are no process-wide
//! mutable registries.

use crate::computation::ComputationSession;
use crate::errors::ResolveError;
use crate::lazy::{lazy_resolve_to_phase, resolver_for_phase};
use crate::locks::{LockProvider, ScopeKey};
use crate::provider::{SymbolProvider, TreeSymbolProvider};
use anyhow::{Context, Result};
use lazy_sema_types::{DeclId, DeclTree, Import, ResolvePhase, ResolveTarget};
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Per-compilation read-only configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Short names of annotations the compiler itself must see resolved.
    pub required_annotations: HashSet<String>,
    /// Short names registered by plugins; treated like required ones.
    pub plugin_annotations: HashSet<String>,
    /// Lock acquisition deadline in milliseconds; `None` waits forever.
    pub lock_timeout_ms: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let required = ["Deprecated", "Target", "Retention", "Repeatable"];
        Self {
            required_annotations: required.iter().map(|s| s.to_string()).collect(),
            plugin_annotations: HashSet::new(),
            lock_timeout_ms: None,
        }
    }
}

impl SessionConfig {
    /// Whether an annotation short name is compiler-required or
    /// plugin-registered, i.e. must be resolved at the annotations phase.
    pub fn is_recognized(&self, short_name: &str) -> bool {
        self.required_annotations.contains(short_name)
            || self.plugin_annotations.contains(short_name)
    }

    /// Register a plugin annotation name (builder style).
    pub fn with_plugin_annotation(mut self, short_name: impl Into<String>) -> Self {
        self.plugin_annotations.insert(short_name.into());
        self
    }
}

/// Atomic resolution counters, exportable as a [`StatsSnapshot`].
#[derive(Debug, Default)]
pub struct SessionStats {
    resolve_calls: std::sync::atomic::AtomicU64,
    transforms_completed: std::sync::atomic::AtomicU64,
    transforms_deferred: std::sync::atomic::AtomicU64,
    phases_advanced: std::sync::atomic::AtomicU64,
    snapshots_taken: std::sync::atomic::AtomicU64,
    state_restores: std::sync::atomic::AtomicU64,
    cycles_deferred: std::sync::atomic::AtomicU64,
}

/// Point-in-time view of [`SessionStats`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub resolve_calls: u64,
    pub transforms_completed: u64,
    pub transforms_deferred: u64,
    pub phases_advanced: u64,
    pub snapshots_taken: u64,
    pub state_restores: u64,
    pub cycles_deferred: u64,
}

macro_rules! counter {
    ($record:ident, $field:ident) => {
        pub fn $record(&self) {
            self.$field
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }
    };
}

impl SessionStats {
    counter!(record_resolve_call, resolve_calls);
    counter!(record_transform_completed, transforms_completed);
    counter!(record_transform_deferred, transforms_deferred);
    counter!(record_phase_advanced, phases_advanced);
    counter!(record_snapshot, snapshots_taken);
    counter!(record_restore, state_restores);
    counter!(record_cycle_deferred, cycles_deferred);

    pub fn snapshot(&self) -> StatsSnapshot {
        use std::sync::atomic::Ordering::Relaxed;
        StatsSnapshot {
            resolve_calls: self.resolve_calls.load(Relaxed),
            transforms_completed: self.transforms_completed.load(Relaxed),
            transforms_deferred: self.transforms_deferred.load(Relaxed),
            phases_advanced: self.phases_advanced.load(Relaxed),
            snapshots_taken: self.snapshots_taken.load(Relaxed),
            state_restores: self.state_restores.load(Relaxed),
            cycles_deferred: self.cycles_deferred.load(Relaxed),
        }
    }
}

/// Lexical file scope handed to phase transforms: the file's import table
/// as of first use.
#[derive(Debug, Clone, Default)]
pub struct FileScope {
    pub imports: Vec<Import>,
}

/// Session-owned cache of computed file scopes.
///
/// Owned by the session and dropped with it, so scope caches can never
/// outlive the compilation they were computed for.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    file_scopes: Mutex<HashMap<DeclId, Arc<FileScope>>>,
}

impl SessionRegistry {
    pub(crate) fn file_scope(&self, tree: &DeclTree, file: DeclId) -> Arc<FileScope> {
        let mut scopes = self.file_scopes.lock();
        Arc::clone(scopes.entry(file).or_insert_with(|| {
            Arc::new(FileScope {
                imports: tree.get(file).state().imports.clone(),
            })
        }))
    }

    pub fn cached_scopes(&self) -> usize {
        self.file_scopes.lock().len()
    }

    /// Drop all cached scopes (e.g. after a tree edit in a host that reuses
    /// the session).
    pub fn clear(&self) {
        self.file_scopes.lock().clear();
    }
}

type PhaseObserver = Arc<dyn Fn(DeclId, ResolvePhase) + Send + Sync>;

/// Facade over the resolution engine for one compilation session.
pub struct ResolveSession {
    id: Uuid,
    tree: Arc<DeclTree>,
    config: SessionConfig,
    locks: LockProvider,
    symbols: Box<dyn SymbolProvider>,
    registry: SessionRegistry,
    stats: SessionStats,
    phase_observer: Mutex<Option<PhaseObserver>>,
}

impl ResolveSession {
    /// Create a session over a shared tree with default configuration and a
    /// tree-backed symbol provider.
    pub fn new(tree: Arc<DeclTree>) -> Self {
        let symbols = Box::new(TreeSymbolProvider::new(&tree));
        Self {
            id: Uuid::new_v4(),
            tree,
            config: SessionConfig::default(),
            locks: LockProvider::new(),
            symbols,
            registry: SessionRegistry::default(),
            stats: SessionStats::default(),
            phase_observer: Mutex::new(None),
        }
    }

    /// Replace the configuration; rebuilds the lock provider so a configured
    /// acquisition deadline takes effect.
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.locks = match config.lock_timeout_ms {
            Some(ms) => LockProvider::with_timeout(Duration::from_millis(ms)),
            None => LockProvider::new(),
        };
        self.config = config;
        self
    }

    /// Replace the symbol provider (e.g. with a cross-module aware one).
    pub fn with_symbol_provider(mut self, provider: Box<dyn SymbolProvider>) -> Self {
        self.symbols = provider;
        self
    }

    /// Install an observer called on every phase advance, while the scope
    /// lock is still held. Test instrumentation; keep it cheap.
    pub fn set_phase_observer(
        &self,
        observer: impl Fn(DeclId, ResolvePhase) + Send + Sync + 'static,
    ) {
        *self.phase_observer.lock() = Some(Arc::new(observer));
    }

    pub(crate) fn notify_phase(&self, decl: DeclId, phase: ResolvePhase) {
        let observer = self.phase_observer.lock().clone();
        if let Some(observer) = observer {
            observer(decl, phase);
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn tree(&self) -> &DeclTree {
        &self.tree
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn locks(&self) -> &LockProvider {
        &self.locks
    }

    pub fn symbols(&self) -> &dyn SymbolProvider {
        self.symbols.as_ref()
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    // ========================================================================
    // Resolution entry points
    // ========================================================================

    /// Resolve a declaration (and its designation) to `phase`. Idempotent;
    /// fails fatally on invariant violation.
    pub fn resolve(&self, decl: DeclId, phase: ResolvePhase) -> Result<(), ResolveError> {
        self.stats.record_resolve_call();
        let target = ResolveTarget::of(&self.tree, decl);
        debug!(
            session = %self.id,
            target = %target.display(&self.tree),
            phase = %phase,
            "top-level resolve"
        );
        let cx = self.locks.new_context();
        lazy_resolve_to_phase(self, &cx, &target, phase)
    }

    /// Resolve a file and every declaration in it to `phase`.
    pub fn resolve_whole_file(&self, file: DeclId, phase: ResolvePhase) -> Result<(), ResolveError> {
        self.stats.record_resolve_call();
        let target = ResolveTarget::whole_file(file);
        let cx = self.locks.new_context();
        lazy_resolve_to_phase(self, &cx, &target, phase)
    }

    /// Resolve every file to `phase`, one top-level request per file, in
    /// parallel.
    pub fn resolve_all(&self, phase: ResolvePhase) -> Result<(), ResolveError> {
        info!(session = %self.id, phase = %phase, files = self.tree.files().len(), "bulk resolve");
        self.tree
            .files()
            .par_iter()
            .copied()
            .try_for_each(|file| self.resolve_whole_file(file, phase))
    }

    /// Hard post-condition: the declaration (and its phase outputs) must be
    /// at `phase` or beyond. Diagnostic entry point, not a recovery path.
    /// Takes the file's read lock so the check sees a consistent view of
    /// the phase outputs.
    pub fn check_is_resolved(&self, decl: DeclId, phase: ResolvePhase) -> Result<(), ResolveError> {
        match resolver_for_phase(phase) {
            Some(resolver) => {
                let cx = self.locks.new_context();
                let scope = ScopeKey::File(self.tree.get(decl).file());
                self.locks
                    .with_read_lock(&cx, scope, || resolver.check_is_resolved(self, decl))?
            }
            // Everything is at least parsed.
            None => Ok(()),
        }
    }

    /// Advance phase bookkeeping for a declaration's nested members without
    /// re-running transforms, for parent-implies-children cases.
    pub fn update_phase_for_internals(&self, decl: DeclId, phase: ResolvePhase) {
        if let Some(resolver) = resolver_for_phase(phase) {
            resolver.update_phase_for_internals(self, decl);
        }
    }

    // ========================================================================
    // Statistics export
    // ========================================================================

    pub fn export_stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Save the current statistics snapshot as pretty-printed JSON.
    pub fn save_stats(&self, path: impl AsRef<Path>) -> Result<()> {
        let snapshot = self.export_stats();
        let json = serde_json::to_string_pretty(&snapshot)?;
        std::fs::write(path.as_ref(), json)
            .with_context(|| format!("writing stats to {}", path.as_ref().display()))?;
        Ok(())
    }

    /// Load a statistics snapshot saved by [`ResolveSession::save_stats`].
    pub fn load_stats(path: impl AsRef<Path>) -> Result<StatsSnapshot> {
        let json = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("reading stats from {}", path.as_ref().display()))?;
        let snapshot = serde_json::from_str(&json)?;
        Ok(snapshot)
    }

    /// Create a fresh computation session for one top-level call of one
    /// phase.
    pub(crate) fn new_computation(&self) -> ComputationSession {
        ComputationSession::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_recognizes_required_and_plugin_names() {
        let config = SessionConfig::default().with_plugin_annotation("Marker");
        assert!(config.is_recognized("Deprecated"));
        assert!(config.is_recognized("Marker"));
        assert!(!config.is_recognized("Unknown"));
    }

    #[test]
    fn registry_caches_file_scopes() {
        let mut builder = lazy_sema_types::DeclTreeBuilder::new();
        let file = builder.file("lib");
        builder.import(file, "markers.Marker");
        let tree = builder.finish();

        let registry = SessionRegistry::default();
        let scope = registry.file_scope(&tree, file);
        assert_eq!(scope.imports.len(), 1);
        assert_eq!(registry.cached_scopes(), 1);

        // Second lookup reuses the cached scope.
        let again = registry.file_scope(&tree, file);
        assert!(Arc::ptr_eq(&scope, &again));

        registry.clear();
        assert_eq!(registry.cached_scopes(), 0);
    }

    #[test]
    fn stats_snapshot_round_trips_through_json() {
        let stats = SessionStats::default();
        stats.record_resolve_call();
        stats.record_phase_advanced();
        stats.record_phase_advanced();

        let snapshot = stats.snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        let parsed: StatsSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, snapshot);
        assert_eq!(parsed.phases_advanced, 2);
    }
}
