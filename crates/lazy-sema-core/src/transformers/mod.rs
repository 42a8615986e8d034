//! Phase transforms and their scoped-entry contract.
//!
//! Each resolvable phase has one [`PhaseTransform`]. The target resolver
//! drives it; the transform supplies the phase's semantics and the lexical
//! scoping hooks. Scope entry always goes through the public wrappers
//! ([`PhaseTransform::with_file`], [`PhaseTransform::with_class`]); the
//! `with_class_impl` hook exists only to be overridden.

pub(crate) mod annotations;
pub(crate) mod body;
pub(crate) mod imports;
pub(crate) mod status;
pub(crate) mod supertypes;

use crate::errors::ResolveError;
use crate::resolver::ResolveCx;
use crate::session::FileScope;
use crate::state_keeper::{declaration_keeper, StateKeeper, TransformOutcome};
use lazy_sema_types::{DeclId, DeclTree, ResolvePhase};
use smallvec::SmallVec;
use std::sync::Arc;

/// Continuation passed through the scoped-entry wrappers.
pub(crate) type ScopedAction<'r> =
    &'r mut dyn FnMut(&mut TransformScope) -> Result<(), ResolveError>;

/// Lexical context of one designation walk: the file scope and the stack of
/// enclosing classes. Owned by a single resolver frame; dependency chases
/// build their own.
#[derive(Default)]
pub(crate) struct TransformScope {
    file: Option<DeclId>,
    file_scope: Option<Arc<FileScope>>,
    class_stack: SmallVec<[DeclId; 4]>,
    deprecated_stack: SmallVec<[bool; 4]>,
}

impl TransformScope {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Enter a file, materializing its import scope through the session
    /// registry.
    pub(crate) fn enter_file(&mut self, cx: &ResolveCx<'_>, file: DeclId) {
        self.file = Some(file);
        self.file_scope = Some(cx.session.registry().file_scope(cx.session.tree(), file));
    }

    /// Enter a file without materializing an import scope; for the imports
    /// phase itself, which is what produces that scope.
    pub(crate) fn enter_file_raw(&mut self, file: DeclId) {
        self.file = Some(file);
        self.file_scope = None;
    }

    pub(crate) fn exit_file(&mut self) {
        self.file = None;
        self.file_scope = None;
    }

    pub(crate) fn file(&self) -> Option<DeclId> {
        self.file
    }

    pub(crate) fn file_scope(&self) -> Option<&FileScope> {
        self.file_scope.as_deref()
    }

    pub(crate) fn push_class(&mut self, class: DeclId) {
        self.class_stack.push(class);
    }

    pub(crate) fn pop_class(&mut self) {
        self.class_stack.pop();
    }

    pub(crate) fn push_deprecated(&mut self, deprecated: bool) {
        self.deprecated_stack.push(deprecated);
    }

    pub(crate) fn pop_deprecated(&mut self) {
        self.deprecated_stack.pop();
    }

    /// Whether any enclosing class is deprecated; deprecation propagates
    /// through nesting.
    pub(crate) fn containing_deprecated(&self) -> bool {
        self.deprecated_stack.iter().any(|d| *d)
    }
}

/// One phase's semantics, driven by the target resolver.
pub(crate) trait PhaseTransform: Send + Sync {
    fn phase(&self) -> ResolvePhase;

    /// Jumping transforms chase dependencies outside the designation and
    /// lock the whole tree.
    fn is_jumping(&self) -> bool {
        false
    }

    /// Capture set guarding this declaration's transform.
    fn state_keeper(&self, tree: &DeclTree, decl: DeclId) -> StateKeeper {
        declaration_keeper(tree, decl)
    }

    /// Enter the file's lexical scope around `action`.
    fn with_file(
        &self,
        cx: &ResolveCx<'_>,
        scope: &mut TransformScope,
        file: DeclId,
        action: ScopedAction<'_>,
    ) -> Result<(), ResolveError> {
        scope.enter_file(cx, file);
        let result = action(scope);
        scope.exit_file();
        result
    }

    /// Scoped class entry. Always enter through this wrapper: it maintains
    /// the lexical class stack on every exit path around the override hook.
    fn with_class(
        &self,
        cx: &ResolveCx<'_>,
        scope: &mut TransformScope,
        class: DeclId,
        action: ScopedAction<'_>,
    ) -> Result<(), ResolveError> {
        scope.push_class(class);
        let result = self.with_class_impl(cx, scope, class, action);
        scope.pop_class();
        result
    }

    /// Override-only hook for [`PhaseTransform::with_class`]; never call it
    /// directly.
    #[doc(hidden)]
    fn with_class_impl(
        &self,
        _cx: &ResolveCx<'_>,
        scope: &mut TransformScope,
        _class: DeclId,
        action: ScopedAction<'_>,
    ) -> Result<(), ResolveError> {
        action(scope)
    }

    /// File-level transform content; runs under lock. Default is phase
    /// bookkeeping only.
    fn transform_file(
        &self,
        cx: &ResolveCx<'_>,
        scope: &mut TransformScope,
        file: DeclId,
    ) -> Result<TransformOutcome, ResolveError> {
        let _ = (cx, scope, file);
        Ok(TransformOutcome::Done)
    }

    /// Member-level transform; closed dispatch over the declaration kind.
    /// A file declaration reaching this dispatcher is a programming error.
    fn transform(
        &self,
        cx: &ResolveCx<'_>,
        scope: &mut TransformScope,
        decl: DeclId,
    ) -> Result<TransformOutcome, ResolveError>;

    /// Extra phase-specific post-condition folded into `check_is_resolved`.
    fn check_extra(
        &self,
        session: &crate::session::ResolveSession,
        decl: DeclId,
    ) -> Result<(), ResolveError> {
        let _ = (session, decl);
        Ok(())
    }
}

/// The fatal arm shared by every member dispatcher.
pub(crate) fn unexpected_declaration(
    tree: &DeclTree,
    decl: DeclId,
    phase: ResolvePhase,
) -> ResolveError {
    ResolveError::UnexpectedDeclaration {
        declaration: tree.qualified_name(decl),
        kind: tree.get(decl).kind(),
        phase,
    }
}
