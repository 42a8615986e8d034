//! The compiler-required-annotations phase.
//!
//! Annotations whose short name the session recognizes (compiler-required or
//! plugin-registered) are resolved to their annotation-class declarations.
//! This is a jumping phase: the annotation class may live anywhere in the
//! tree, and resolving it recursively re-enters the resolver machinery
//! through the shared computation session. This is the dependency-triggering edge
//! that makes cycles possible and must leave them deferred, not looping.

use crate::errors::ResolveError;
use crate::resolver::{resolve_dependency, ResolveCx};
use crate::session::ResolveSession;
use crate::state_keeper::TransformOutcome;
use crate::transformers::{unexpected_declaration, PhaseTransform, TransformScope};
use lazy_sema_types::{DeclId, DeclKind, ResolvePhase};
use tracing::debug;

pub(crate) struct AnnotationsTransform;

impl AnnotationsTransform {
    fn resolve_annotations(
        &self,
        cx: &ResolveCx<'_>,
        scope: &TransformScope,
        decl: DeclId,
    ) -> Result<TransformOutcome, ResolveError> {
        let tree = cx.session.tree();

        let pending: Vec<(usize, String)> = tree
            .get(decl)
            .state()
            .annotations
            .iter()
            .enumerate()
            .filter(|(_, annotation)| {
                annotation.resolved_class.is_none()
                    && cx.session.config().is_recognized(&annotation.short_name)
            })
            .map(|(index, annotation)| (index, annotation.short_name.clone()))
            .collect();
        let observed_len = tree.get(decl).state().annotations.len();

        for (index, short_name) in pending {
            let Some(class) = cx.session.symbols().find_class_by_short_name(&short_name) else {
                debug!(
                    decl = %tree.qualified_name(decl),
                    annotation = %short_name,
                    "recognized annotation has no class declaration"
                );
                continue;
            };

            let in_scope = scope.file() == Some(tree.get(class).file())
                || scope
                    .file_scope()
                    .is_some_and(|fs| fs.imports.iter().any(|i| i.short_name() == short_name));
            if !in_scope {
                // Default/root scope fallback; annotation classes are
                // frequently used without an explicit import.
                debug!(
                    decl = %tree.qualified_name(decl),
                    annotation = %short_name,
                    "annotation class resolved outside the explicit file scope"
                );
            }

            resolve_dependency(cx, class)?;

            let mut state = tree.get(decl).state_mut();
            if state.annotations.len() != observed_len {
                // A re-entrant resolution mutated the list under us; roll
                // back and run again against the fresh state.
                return Ok(TransformOutcome::Restart);
            }
            state.annotations[index].resolved_class = Some(class);
        }
        Ok(TransformOutcome::Done)
    }
}

impl PhaseTransform for AnnotationsTransform {
    fn phase(&self) -> ResolvePhase {
        ResolvePhase::CompilerRequiredAnnotations
    }

    fn is_jumping(&self) -> bool {
        true
    }

    /// File-level annotations (`@file:`-style) resolve like any other.
    fn transform_file(
        &self,
        cx: &ResolveCx<'_>,
        scope: &mut TransformScope,
        file: DeclId,
    ) -> Result<TransformOutcome, ResolveError> {
        self.resolve_annotations(cx, scope, file)
    }

    fn transform(
        &self,
        cx: &ResolveCx<'_>,
        scope: &mut TransformScope,
        decl: DeclId,
    ) -> Result<TransformOutcome, ResolveError> {
        let tree = cx.session.tree();
        match tree.get(decl).kind() {
            DeclKind::File => Err(unexpected_declaration(tree, decl, self.phase())),
            DeclKind::Class
            | DeclKind::Function
            | DeclKind::Property
            | DeclKind::Constructor
            | DeclKind::TypeAlias => self.resolve_annotations(cx, scope, decl),
        }
    }

    /// A recognized annotation whose class exists must carry a resolved
    /// reference once this phase is reached.
    fn check_extra(&self, session: &ResolveSession, decl: DeclId) -> Result<(), ResolveError> {
        let tree = session.tree();
        let state = tree.get(decl).state();
        for annotation in &state.annotations {
            if annotation.resolved_class.is_none()
                && session.config().is_recognized(&annotation.short_name)
                && session
                    .symbols()
                    .find_class_by_short_name(&annotation.short_name)
                    .is_some()
            {
                return Err(ResolveError::PhaseInvariantViolation {
                    declaration: tree.qualified_name(decl),
                    expected: self.phase(),
                    actual: tree.phase(decl),
                });
            }
        }
        Ok(())
    }
}
