//! The terminal body-resolve phase.
//!
//! Body-level analysis belongs to the surrounding compiler, not this engine;
//! the transform is phase bookkeeping only, so that consumers can gate on
//! "fully resolved" with the same machinery as every other phase.

use crate::errors::ResolveError;
use crate::resolver::ResolveCx;
use crate::state_keeper::TransformOutcome;
use crate::transformers::{unexpected_declaration, PhaseTransform, TransformScope};
use lazy_sema_types::{DeclId, DeclKind, ResolvePhase};

pub(crate) struct BodyResolveTransform;

impl PhaseTransform for BodyResolveTransform {
    fn phase(&self) -> ResolvePhase {
        ResolvePhase::BodyResolve
    }

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
