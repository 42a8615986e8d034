//! Snapshot/restore of phase-relevant declaration state.
//!
//! A phase transform mutates a small, fixed set of fields on its target
//! declaration. The state keeper captures exactly those fields before the
//! transform runs and can write them back verbatim, making the transform
//! effectively transactional without undo-logging the whole tree.
//!
//! Capture sets compose: a keeper for one declaration may fold in fields of
//! semantically-linked sub-entities (a callable's deprecations cache next to
//! the declaration's own annotation list).

use crate::errors::ResolveError;
use crate::session::SessionStats;
use lazy_sema_types::{
    Annotation, DeclId, DeclKind, DeclTree, DeprecationsCache, Import, TypeRef,
};
use smallvec::SmallVec;
use tracing::debug;

/// Closed set of capturable fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackedField {
    Annotations,
    SuperTypes,
    Imports,
    Deprecations,
}

#[derive(Debug, Clone)]
enum CapturedValue {
    Annotations(Vec<Annotation>),
    SuperTypes(Vec<TypeRef>),
    Imports(Vec<Import>),
    Deprecations(Option<DeprecationsCache>),
}

#[derive(Debug)]
struct SnapshotEntry {
    decl: DeclId,
    value: CapturedValue,
}

/// Ordered field captures for one transform attempt, consumed by rollback.
#[derive(Debug, Default)]
pub struct StateSnapshot {
    entries: SmallVec<[SnapshotEntry; 4]>,
}

impl StateSnapshot {
    /// Write every captured value back verbatim. After this, the captured
    /// fields are indistinguishable from their pre-snapshot state.
    pub fn restore(&self, tree: &DeclTree) {
        for entry in &self.entries {
            let mut state = tree.get(entry.decl).state_mut();
            match &entry.value {
                CapturedValue::Annotations(value) => state.annotations = value.clone(),
                CapturedValue::SuperTypes(value) => state.super_types = value.clone(),
                CapturedValue::Imports(value) => state.imports = value.clone(),
                CapturedValue::Deprecations(value) => state.deprecations = value.clone(),
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A fixed capture-spec: which fields of which declarations a transform is
/// allowed to touch, and therefore what must be snapshotted around it.
#[derive(Debug, Default, Clone)]
pub struct StateKeeper {
    specs: SmallVec<[(DeclId, TrackedField); 4]>,
}

impl StateKeeper {
    pub fn builder(decl: DeclId) -> StateKeeperBuilder {
        StateKeeperBuilder {
            decl,
            specs: SmallVec::new(),
        }
    }

    /// Capture the current values of every spec'd field.
    pub fn snapshot(&self, tree: &DeclTree) -> StateSnapshot {
        let entries = self
            .specs
            .iter()
            .map(|(decl, field)| {
                let state = tree.get(*decl).state();
                let value = match field {
                    TrackedField::Annotations => {
                        CapturedValue::Annotations(state.annotations.clone())
                    }
                    TrackedField::SuperTypes => CapturedValue::SuperTypes(state.super_types.clone()),
                    TrackedField::Imports => CapturedValue::Imports(state.imports.clone()),
                    TrackedField::Deprecations => {
                        CapturedValue::Deprecations(state.deprecations.clone())
                    }
                };
                SnapshotEntry { decl: *decl, value }
            })
            .collect();
        StateSnapshot { entries }
    }
}

/// Builds a [`StateKeeper`], with support for composed entity capture sets.
pub struct StateKeeperBuilder {
    decl: DeclId,
    specs: SmallVec<[(DeclId, TrackedField); 4]>,
}

impl StateKeeperBuilder {
    /// Track a field of the builder's own declaration.
    pub fn add(mut self, field: TrackedField) -> Self {
        self.specs.push((self.decl, field));
        self
    }

    /// Fold in a semantically-linked sub-entity's captures. A `None` link
    /// contributes nothing.
    pub fn entity(
        mut self,
        linked: Option<DeclId>,
        configure: impl FnOnce(StateKeeperBuilder) -> StateKeeperBuilder,
    ) -> Self {
        if let Some(id) = linked {
            let nested = configure(StateKeeper::builder(id));
            self.specs.extend(nested.specs);
        }
        self
    }

    pub fn build(self) -> StateKeeper {
        StateKeeper { specs: self.specs }
    }
}

/// The standard keeper guarding a phase transform of `decl`: its annotation
/// list, plus kind-specific fields: a file's import table, a class's
/// supertype refs, and (as a composed entity capture) a callable's
/// deprecations cache.
pub fn declaration_keeper(tree: &DeclTree, decl: DeclId) -> StateKeeper {
    let kind = tree.get(decl).kind();
    let builder = StateKeeper::builder(decl).add(TrackedField::Annotations);
    let builder = match kind {
        DeclKind::File => builder.add(TrackedField::Imports),
        DeclKind::Class => builder
            .add(TrackedField::SuperTypes)
            .add(TrackedField::Deprecations),
        kind if kind.is_callable() => {
            builder.entity(Some(decl), |entity| entity.add(TrackedField::Deprecations))
        }
        _ => builder,
    };
    builder.build()
}

/// What a transform attempt asks the keeper to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformOutcome {
    /// Keep the mutations; the declaration may advance.
    Done,
    /// Roll back and run the transform again (its inputs changed under it,
    /// e.g. a re-entrant dependency resolution mutated the captured fields).
    Restart,
}

/// Final status of a keeper-guarded transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformStatus {
    /// The transform completed; its mutations are kept.
    Completed,
    /// The restart budget ran out; state is rolled back and the declaration
    /// stays at its prior phase for a later top-level call to pick up.
    Deferred,
}

/// Restart budget per transform attempt; bounds work per top-level call.
const MAX_TRANSFORM_RESTARTS: usize = 3;

/// Run a transform under snapshot protection: snapshot, run, and on restart
/// or failure write the captured state back before retrying/propagating.
pub fn resolve_with_keeper(
    tree: &DeclTree,
    decl: DeclId,
    keeper: &StateKeeper,
    stats: &SessionStats,
    mut action: impl FnMut() -> Result<TransformOutcome, ResolveError>,
) -> Result<TransformStatus, ResolveError> {
    for attempt in 1..=MAX_TRANSFORM_RESTARTS {
        let snapshot = keeper.snapshot(tree);
        stats.record_snapshot();
        match action() {
            Ok(TransformOutcome::Done) => return Ok(TransformStatus::Completed),
            Ok(TransformOutcome::Restart) => {
                snapshot.restore(tree);
                stats.record_restore();
                debug!(decl = %decl, attempt, "transform restarted, state rolled back");
            }
            Err(err) => {
                snapshot.restore(tree);
                stats.record_restore();
                return Err(err);
            }
        }
    }
    Ok(TransformStatus::Deferred)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lazy_sema_types::DeclTreeBuilder;

    fn small_tree() -> (DeclTree, DeclId, DeclId, DeclId) {
        let mut builder = DeclTreeBuilder::new();
        let file = builder.file("lib");
        builder.import(file, "markers.Marker");
        let class = builder.class(file, "Outer");
        builder.super_type(class, "Base");
        builder.annotate(class, "Marker");
        let method = builder.function(class, "run");
        builder.annotate(method, "Deprecated");
        (builder.finish(), file, class, method)
    }

    #[test]
    fn restore_is_symmetric_for_all_captured_fields() {
        let (tree, _, class, _) = small_tree();
        let keeper = declaration_keeper(&tree, class);

        let before = tree.get(class).state().clone();
        let snapshot = keeper.snapshot(&tree);

        {
            let mut state = tree.get(class).state_mut();
            state.annotations[0].resolved_class = Some(DeclId(99));
            state.annotations.push(Annotation::unresolved("Injected"));
            state.super_types[0].resolved = Some(DeclId(98));
            state.deprecations = Some(DeprecationsCache {
                is_deprecated: true,
                inherited: false,
            });
        }
        assert_ne!(*tree.get(class).state(), before);

        snapshot.restore(&tree);
        assert_eq!(*tree.get(class).state(), before);
    }

    #[test]
    fn keeper_composes_entity_captures_for_callables() {
        let (tree, _, _, method) = small_tree();
        let keeper = declaration_keeper(&tree, method);
        // Annotations plus the composed deprecations entity.
        assert_eq!(keeper.snapshot(&tree).len(), 2);
    }

    #[test]
    fn file_keeper_tracks_imports() {
        let (tree, file, _, _) = small_tree();
        let keeper = declaration_keeper(&tree, file);
        let before = tree.get(file).state().clone();
        let snapshot = keeper.snapshot(&tree);

        tree.get(file).state_mut().imports[0].resolved = true;
        snapshot.restore(&tree);
        assert_eq!(*tree.get(file).state(), before);
    }

    #[test]
    fn failed_transform_rolls_back() {
        let (tree, _, class, _) = small_tree();
        let keeper = declaration_keeper(&tree, class);
        let stats = SessionStats::default();
        let before = tree.get(class).state().clone();

        let result = resolve_with_keeper(&tree, class, &keeper, &stats, || {
            tree.get(class).state_mut().annotations.clear();
            Err(ResolveError::UnexpectedDeclaration {
                declaration: "lib/Outer".to_string(),
                kind: DeclKind::Class,
                phase: lazy_sema_types::ResolvePhase::Status,
            })
        });

        assert!(result.is_err());
        assert_eq!(*tree.get(class).state(), before);
    }

    #[test]
    fn restart_budget_defers() {
        let (tree, _, class, _) = small_tree();
        let keeper = declaration_keeper(&tree, class);
        let stats = SessionStats::default();
        let before = tree.get(class).state().clone();

        let status = resolve_with_keeper(&tree, class, &keeper, &stats, || {
            tree.get(class).state_mut().annotations.clear();
            Ok(TransformOutcome::Restart)
        })
        .unwrap();

        assert_eq!(status, TransformStatus::Deferred);
        assert_eq!(*tree.get(class).state(), before);
        assert_eq!(stats.snapshot().snapshots_taken, 3);
        assert_eq!(stats.snapshot().state_restores, 3);
    }
}
