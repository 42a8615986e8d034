//! The per-phase target resolver: the designation-walk state machine.
//!
//! A resolver is built for one [`ResolveTarget`] and one phase. It walks the
//! designation root-to-leaf (file, enclosing classes, target), entering each
//! container's lexical scope through the phase transform's scoped-entry
//! wrappers, and resolves every element under the scope's write lock. A
//! transform may chase dependencies into other declarations; those re-enter
//! the resolver machinery through the shared computation session, which is
//! what turns unbounded mutual recursion into a detected, deferred cycle.

use crate::computation::ComputationSession;
use crate::errors::ResolveError;
use crate::lazy::{lazy_resolve_to_phase, run_target_resolver};
use crate::locks::{LockContext, ScopeKey};
use crate::session::ResolveSession;
use crate::state_keeper::{resolve_with_keeper, TransformStatus};
use crate::transformers::{PhaseTransform, TransformScope};
use lazy_sema_types::{DeclId, DeclKind, ResolvePhase, ResolveTarget, TargetKind};
use tracing::{debug, warn};

/// Everything a resolution frame carries through the recursive call graph.
pub(crate) struct ResolveCx<'a> {
    pub session: &'a ResolveSession,
    pub lock_cx: &'a LockContext,
    pub computation: &'a ComputationSession,
    pub phase: ResolvePhase,
    /// Jumping phases lock the whole tree; see [`ScopeKey`].
    pub jumping: bool,
}

impl ResolveCx<'_> {
    pub(crate) fn lock_scope(&self, decl: DeclId) -> ScopeKey {
        if self.jumping {
            ScopeKey::Tree
        } else {
            ScopeKey::File(self.session.tree().get(decl).file())
        }
    }
}

/// Trigger resolution of a dependency discovered mid-transform (e.g. the
/// class behind an annotation), sharing the caller's computation session so
/// cycle detection spans the whole call tree.
pub(crate) fn resolve_dependency(cx: &ResolveCx<'_>, class: DeclId) -> Result<(), ResolveError> {
    let tree = cx.session.tree();
    if tree.phase(class) >= cx.phase {
        return Ok(());
    }

    // Prerequisite phases first, then a sibling resolver at this phase.
    let target = ResolveTarget::of(tree, class);
    lazy_resolve_to_phase(cx.session, cx.lock_cx, &target, cx.phase.previous())?;
    run_target_resolver(cx.session, cx.lock_cx, cx.computation, cx.phase, &target)
}

pub(crate) struct TargetResolver<'a, T: PhaseTransform> {
    cx: ResolveCx<'a>,
    target: &'a ResolveTarget,
    transform: &'a T,
}

impl<'a, T: PhaseTransform> TargetResolver<'a, T> {
    pub(crate) fn new(
        session: &'a ResolveSession,
        lock_cx: &'a LockContext,
        computation: &'a ComputationSession,
        target: &'a ResolveTarget,
        transform: &'a T,
    ) -> Self {
        Self {
            cx: ResolveCx {
                session,
                lock_cx,
                computation,
                phase: transform.phase(),
                jumping: transform.is_jumping(),
            },
            target,
            transform,
        }
    }

    /// Walk the designation and bring every element to the bound phase.
    pub(crate) fn resolve_designation(&self) -> Result<(), ResolveError> {
        self.check_prerequisites()?;

        let file = self.target.file;
        let mut scope = TransformScope::new();
        self.transform
            .with_file(&self.cx, &mut scope, file, &mut |scope| {
                self.resolve_under_lock(scope, file)?;
                self.descend(scope, 0)
            })
    }

    /// Every designation element must already be at the prerequisite phase;
    /// anything else is a resolver/driver mismatch.
    fn check_prerequisites(&self) -> Result<(), ResolveError> {
        let required = self.cx.phase.previous();
        if required == ResolvePhase::RawTree {
            return Ok(());
        }
        let tree = self.cx.session.tree();
        for element in self.target.elements() {
            let actual = tree.phase(element);
            if actual < required {
                return Err(ResolveError::PhaseInvariantViolation {
                    declaration: tree.qualified_name(element),
                    expected: required,
                    actual,
                });
            }
        }
        Ok(())
    }

    fn descend(&self, scope: &mut TransformScope, depth: usize) -> Result<(), ResolveError> {
        if let Some(class) = self.target.path.get(depth).copied() {
            self.resolve_under_lock(scope, class)?;
            return self
                .transform
                .with_class(&self.cx, scope, class, &mut |scope| {
                    self.descend(scope, depth + 1)
                });
        }

        match self.target.kind {
            TargetKind::Declaration(decl) => {
                if decl == self.target.file {
                    // The file itself was resolved on entry.
                    Ok(())
                } else {
                    self.resolve_under_lock(scope, decl)
                }
            }
            TargetKind::WholeFile => self.resolve_members(scope, self.target.file),
        }
    }

    /// Resolve every member of a container, entering class scopes before
    /// their members.
    fn resolve_members(&self, scope: &mut TransformScope, container: DeclId) -> Result<(), ResolveError> {
        let tree = self.cx.session.tree();
        // Child lists are fixed at tree construction; copy to keep the
        // borrow away from the transforms.
        let children: Vec<DeclId> = tree.get(container).children().to_vec();
        for child in children {
            self.resolve_under_lock(scope, child)?;
            if tree.get(child).kind() == DeclKind::Class {
                self.transform
                    .with_class(&self.cx, scope, child, &mut |scope| {
                        self.resolve_members(scope, child)
                    })?;
            }
        }
        Ok(())
    }

    fn resolve_under_lock(&self, scope: &mut TransformScope, decl: DeclId) -> Result<(), ResolveError> {
        let tree = self.cx.session.tree();
        if tree.phase(decl) >= self.cx.phase {
            return Ok(());
        }

        let lock_scope = self.cx.lock_scope(decl);
        self.cx
            .session
            .locks()
            .with_write_lock(self.cx.lock_cx, lock_scope, || {
                self.do_lazy_resolve_under_lock(scope, decl)
            })?
    }

    fn do_lazy_resolve_under_lock(
        &self,
        scope: &mut TransformScope,
        decl: DeclId,
    ) -> Result<(), ResolveError> {
        let cx = &self.cx;
        let tree = cx.session.tree();

        // Another chain may have advanced the declaration between the fast
        // path and lock acquisition.
        if tree.phase(decl) >= cx.phase {
            return Ok(());
        }

        // Completed or deferred earlier under this computation session.
        if cx.computation.is_done(decl) {
            return Ok(());
        }

        if !cx.computation.mark_in_progress(decl) {
            // Back-edge into a declaration already in flight in this call
            // tree. Leave it at its current phase and proceed; it converges
            // on a later top-level request.
            debug!(
                decl = %tree.qualified_name(decl),
                phase = %cx.phase,
                "resolution cycle detected, deferring back-edge"
            );
            cx.computation.note_deferred();
            cx.session.stats().record_cycle_deferred();
            return Ok(());
        }

        let keeper = self.transform.state_keeper(tree, decl);
        let kind = tree.get(decl).kind();
        let status = resolve_with_keeper(tree, decl, &keeper, cx.session.stats(), || {
            if kind == DeclKind::File {
                self.transform.transform_file(cx, scope, decl)
            } else {
                self.transform.transform(cx, scope, decl)
            }
        })?;

        match status {
            TransformStatus::Completed => {
                let previous = tree.get(decl).advance_phase_to(cx.phase);
                debug_assert!(previous <= cx.phase);
                cx.session.stats().record_transform_completed();
                cx.session.stats().record_phase_advanced();
                cx.session.notify_phase(decl, cx.phase);
                cx.computation.mark_done(decl);
            }
            TransformStatus::Deferred => {
                warn!(
                    decl = %tree.qualified_name(decl),
                    phase = %cx.phase,
                    "transform deferred after exhausting its restart budget"
                );
                cx.session.stats().record_transform_deferred();
                cx.computation.mark_done(decl);
            }
        }
        Ok(())
    }
}
