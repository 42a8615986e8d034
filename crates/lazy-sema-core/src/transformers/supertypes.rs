//! The supertypes phase: resolve class supertype references.
//!
//! Also a jumping phase: a supertype may be declared in another file, and
//! mutually-inheriting classes form cycles that must defer, not recurse.

use crate::errors::ResolveError;
use crate::resolver::{resolve_dependency, ResolveCx};
use crate::state_keeper::TransformOutcome;
use crate::transformers::{unexpected_declaration, PhaseTransform, TransformScope};
use lazy_sema_types::{DeclId, DeclKind, ResolvePhase};
use tracing::debug;

pub(crate) struct SuperTypesTransform;

impl PhaseTransform for SuperTypesTransform {
    fn phase(&self) -> ResolvePhase {
        ResolvePhase::SuperTypes
    }

    fn is_jumping(&self) -> bool {
        true
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
            DeclKind::Class => {
                let pending: Vec<(usize, String)> = tree
                    .get(decl)
                    .state()
                    .super_types
                    .iter()
                    .enumerate()
                    .filter(|(_, super_type)| super_type.resolved.is_none())
                    .map(|(index, super_type)| (index, super_type.name.clone()))
                    .collect();
                let observed_len = tree.get(decl).state().super_types.len();

                for (index, name) in pending {
                    let Some(super_class) = cx.session.symbols().find_class_by_short_name(&name)
                    else {
                        debug!(
                            class = %tree.qualified_name(decl),
                            super_type = %name,
                            "supertype not found"
                        );
                        continue;
                    };
                    if super_class == decl {
                        // Self-inheritance is a front-end diagnostic, not a
                        // resolution concern; leave the ref unresolved.
                        continue;
                    }

                    resolve_dependency(cx, super_class)?;

                    let mut state = tree.get(decl).state_mut();
                    if state.super_types.len() != observed_len {
                        return Ok(TransformOutcome::Restart);
                    }
                    state.super_types[index].resolved = Some(super_class);
                }
                Ok(TransformOutcome::Done)
            }
            // Callables and aliases have no supertype list; bookkeeping only.
            _ => Ok(TransformOutcome::Done),
        }
    }
}
