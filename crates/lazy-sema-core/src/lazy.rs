//! Per-phase lazy resolvers: the policy objects the rest of the compiler
//! calls into.
//!
//! Each resolvable phase is bound to one singleton [`LazyResolver`] that
//! knows how to build the phase's target resolver, assert its
//! post-conditions, and bulk-update nested phase bookkeeping. The registry
//! is a closed table: an unknown phase cannot acquire a resolver.

use crate::computation::ComputationSession;
use crate::errors::ResolveError;
use crate::locks::{LockContext, ScopeKey};
use crate::phase_update;
use crate::resolver::TargetResolver;
use crate::session::ResolveSession;
use crate::transformers::annotations::AnnotationsTransform;
use crate::transformers::body::BodyResolveTransform;
use crate::transformers::imports::ImportsTransform;
use crate::transformers::status::StatusTransform;
use crate::transformers::supertypes::SuperTypesTransform;
use crate::transformers::PhaseTransform;
use lazy_sema_types::{DeclId, DeclKind, DeclTree, ResolvePhase, ResolveTarget, TargetKind};
use tracing::warn;

/// A phase's resolution policy object.
pub trait LazyResolver: Send + Sync {
    /// The phase this resolver is bound to.
    fn phase(&self) -> ResolvePhase;

    /// Resolve `target` (and everything its designation requires) to the
    /// bound phase. Idempotent: a target already at or beyond the phase is
    /// a no-op.
    fn resolve(
        &self,
        session: &ResolveSession,
        lock_cx: &LockContext,
        computation: &ComputationSession,
        target: &ResolveTarget,
    ) -> Result<(), ResolveError>;

    /// Post-condition assertion: fails with a phase-invariant violation if
    /// the declaration is below the bound phase or missing the phase's
    /// outputs. Not a recovery path.
    fn check_is_resolved(
        &self,
        session: &ResolveSession,
        decl: DeclId,
    ) -> Result<(), ResolveError>;

    /// Advance phase bookkeeping for the declaration's nested members
    /// without re-running transforms.
    fn update_phase_for_internals(&self, session: &ResolveSession, decl: DeclId) {
        let cx = session.locks().new_context();
        let scope = ScopeKey::File(session.tree().get(decl).file());
        let phase = self.phase();
        let result = session.locks().with_write_lock(&cx, scope, || {
            phase_update::update_declaration_internals(session, decl, phase, false);
        });
        if let Err(err) = result {
            warn!(decl = %decl, error = %err, "internals phase update skipped");
        }
    }
}

/// Generic adapter binding a [`PhaseTransform`] to the resolver contract.
struct PhaseLazyResolver<T: PhaseTransform> {
    transform: T,
}

impl<T: PhaseTransform> LazyResolver for PhaseLazyResolver<T> {
    fn phase(&self) -> ResolvePhase {
        self.transform.phase()
    }

    fn resolve(
        &self,
        session: &ResolveSession,
        lock_cx: &LockContext,
        computation: &ComputationSession,
        target: &ResolveTarget,
    ) -> Result<(), ResolveError> {
        TargetResolver::new(session, lock_cx, computation, target, &self.transform)
            .resolve_designation()
    }

    fn check_is_resolved(
        &self,
        session: &ResolveSession,
        decl: DeclId,
    ) -> Result<(), ResolveError> {
        check_phase(session.tree(), decl, self.phase())?;
        self.transform.check_extra(session, decl)
    }
}

static IMPORTS_RESOLVER: PhaseLazyResolver<ImportsTransform> = PhaseLazyResolver {
    transform: ImportsTransform,
};
static ANNOTATIONS_RESOLVER: PhaseLazyResolver<AnnotationsTransform> = PhaseLazyResolver {
    transform: AnnotationsTransform,
};
static SUPER_TYPES_RESOLVER: PhaseLazyResolver<SuperTypesTransform> = PhaseLazyResolver {
    transform: SuperTypesTransform,
};
static STATUS_RESOLVER: PhaseLazyResolver<StatusTransform> = PhaseLazyResolver {
    transform: StatusTransform,
};
static BODY_RESOLVER: PhaseLazyResolver<BodyResolveTransform> = PhaseLazyResolver {
    transform: BodyResolveTransform,
};

/// Closed registry mapping each phase to its singleton resolver. The parse
/// state has no resolver; everything else does.
pub fn resolver_for_phase(phase: ResolvePhase) -> Option<&'static dyn LazyResolver> {
    match phase {
        ResolvePhase::RawTree => None,
        ResolvePhase::Imports => Some(&IMPORTS_RESOLVER),
        ResolvePhase::CompilerRequiredAnnotations => Some(&ANNOTATIONS_RESOLVER),
        ResolvePhase::SuperTypes => Some(&SUPER_TYPES_RESOLVER),
        ResolvePhase::Status => Some(&STATUS_RESOLVER),
        ResolvePhase::BodyResolve => Some(&BODY_RESOLVER),
    }
}

/// Drive the phase chain for one top-level call: each step gets a fresh
/// computation session, so cycle bookkeeping never leaks across phases.
pub(crate) fn lazy_resolve_to_phase(
    session: &ResolveSession,
    lock_cx: &LockContext,
    target: &ResolveTarget,
    phase: ResolvePhase,
) -> Result<(), ResolveError> {
    for step in phase.steps_through() {
        if target_fully_at(session.tree(), target, step) {
            continue;
        }
        let Some(resolver) = resolver_for_phase(step) else {
            continue;
        };
        let computation = session.new_computation();
        resolver.resolve(session, lock_cx, &computation, target)?;
    }
    Ok(())
}

/// Run one phase's target resolver against an existing computation session;
/// the dependency-triggering edge uses this to keep cycle detection global
/// to the call tree.
pub(crate) fn run_target_resolver(
    session: &ResolveSession,
    lock_cx: &LockContext,
    computation: &ComputationSession,
    phase: ResolvePhase,
    target: &ResolveTarget,
) -> Result<(), ResolveError> {
    match resolver_for_phase(phase) {
        Some(resolver) => resolver.resolve(session, lock_cx, computation, target),
        None => Ok(()),
    }
}

pub(crate) fn check_phase(
    tree: &DeclTree,
    decl: DeclId,
    required: ResolvePhase,
) -> Result<(), ResolveError> {
    let actual = tree.phase(decl);
    if actual < required {
        return Err(ResolveError::PhaseInvariantViolation {
            declaration: tree.qualified_name(decl),
            expected: required,
            actual,
        });
    }
    Ok(())
}

fn target_fully_at(tree: &DeclTree, target: &ResolveTarget, phase: ResolvePhase) -> bool {
    if !target.elements().all(|decl| tree.phase(decl) >= phase) {
        return false;
    }
    match target.kind {
        TargetKind::Declaration(_) => true,
        TargetKind::WholeFile => members_fully_at(tree, target.file, phase),
    }
}

fn members_fully_at(tree: &DeclTree, container: DeclId, phase: ResolvePhase) -> bool {
    tree.get(container).children().iter().all(|child| {
        tree.phase(*child) >= phase
            && (tree.get(*child).kind() != DeclKind::Class
                || members_fully_at(tree, *child, phase))
    })
}
