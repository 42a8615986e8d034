//! The imports phase: resolve each file's import table.

use crate::errors::ResolveError;
use crate::resolver::ResolveCx;
use crate::state_keeper::TransformOutcome;
use crate::transformers::{unexpected_declaration, PhaseTransform, ScopedAction, TransformScope};
use lazy_sema_types::{DeclId, DeclKind, ResolvePhase};
use tracing::debug;

pub(crate) struct ImportsTransform;

impl PhaseTransform for ImportsTransform {
    fn phase(&self) -> ResolvePhase {
        ResolvePhase::Imports
    }

    /// The imports phase produces the file scope, so it must not consume a
    /// cached one.
    fn with_file(
        &self,
        _cx: &ResolveCx<'_>,
        scope: &mut TransformScope,
        file: DeclId,
        action: ScopedAction<'_>,
    ) -> Result<(), ResolveError> {
        scope.enter_file_raw(file);
        let result = action(scope);
        scope.exit_file();
        result
    }

    fn transform_file(
        &self,
        cx: &ResolveCx<'_>,
        _scope: &mut TransformScope,
        file: DeclId,
    ) -> Result<TransformOutcome, ResolveError> {
        let tree = cx.session.tree();
        let pending: Vec<(usize, String)> = tree
            .get(file)
            .state()
            .imports
            .iter()
            .enumerate()
            .filter(|(_, import)| !import.resolved)
            .map(|(index, import)| (index, import.path.clone()))
            .collect();

        for (index, path) in pending {
            let short_name = path.rsplit('.').next().unwrap_or(&path);
            let found = cx
                .session
                .symbols()
                .find_class_by_short_name(short_name)
                .is_some();
            if !found {
                debug!(file = %tree.get(file).name(), import = %path, "import target not found");
            }
            tree.get(file).state_mut().imports[index].resolved = found;
        }
        Ok(TransformOutcome::Done)
    }

    /// Member declarations carry no import state; reaching them here is
    /// bookkeeping only. Files are handled by `transform_file`.
    fn transform(
        &self,
        cx: &ResolveCx<'_>,
        _scope: &mut TransformScope,
        decl: DeclId,
    ) -> Result<TransformOutcome, ResolveError> {
        let tree = cx.session.tree();
        match tree.get(decl).kind() {
            DeclKind::File => Err(unexpected_declaration(tree, decl, self.phase())),
            _ => Ok(TransformOutcome::Done),
        }
    }
}
