//! The status phase: compute deprecation state from resolved annotations.
//!
//! A declaration is deprecated if it carries a resolved `Deprecated`
//! annotation, or transitively if any enclosing class is deprecated. The
//! containing class reaches this phase before its members (ancestor-first
//! walk), so the class's cache is ready when the scoped entry hook samples
//! it.

use crate::errors::ResolveError;
use crate::resolver::ResolveCx;
use crate::state_keeper::TransformOutcome;
use crate::transformers::{
    unexpected_declaration, PhaseTransform, ScopedAction, TransformScope,
};
use lazy_sema_types::{DeclId, DeclKind, DeprecationsCache, ResolvePhase};

const DEPRECATED_ANNOTATION: &str = "Deprecated";

pub(crate) struct StatusTransform;

impl PhaseTransform for StatusTransform {
    fn phase(&self) -> ResolvePhase {
        ResolvePhase::Status
    }

    /// Sample the class's freshly-computed deprecation state so members can
    /// inherit it.
    fn with_class_impl(
        &self,
        cx: &ResolveCx<'_>,
        scope: &mut TransformScope,
        class: DeclId,
        action: ScopedAction<'_>,
    ) -> Result<(), ResolveError> {
        let deprecated = cx
            .session
            .tree()
            .get(class)
            .state()
            .deprecations
            .as_ref()
            .is_some_and(|cache| cache.is_deprecated);
        scope.push_deprecated(deprecated);
        let result = action(scope);
        scope.pop_deprecated();
        result
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
            | DeclKind::TypeAlias => {
                let mut state = tree.get(decl).state_mut();
                let own = state
                    .annotations
                    .iter()
                    .any(|a| a.short_name == DEPRECATED_ANNOTATION);
                let inherited = !own && scope.containing_deprecated();
                state.deprecations = Some(DeprecationsCache {
                    is_deprecated: own || inherited,
                    inherited,
                });
                Ok(TransformOutcome::Done)
            }
        }
    }
}
