//! Bulk phase bookkeeping for nested members.
//!
//! When a parent transform has already implicitly resolved its internals,
//! the members' phases are advanced without re-running transforms. By
//! default the walk stops at nested classes (their internals stay lazy)
//! unless the caller explicitly asks for them.

use crate::session::ResolveSession;
use lazy_sema_types::{DeclId, DeclKind, ResolvePhase};

pub(crate) fn update_declaration_internals(
    session: &ResolveSession,
    decl: DeclId,
    phase: ResolvePhase,
    recurse_into_nested_classes: bool,
) {
    let tree = session.tree();
    for child in tree.get(decl).children().iter().copied() {
        let previous = tree.get(child).advance_phase_to(phase);
        if previous < phase {
            session.stats().record_phase_advanced();
            session.notify_phase(child, phase);
        }
        if tree.get(child).kind() != DeclKind::Class || recurse_into_nested_classes {
            update_declaration_internals(session, child, phase, recurse_into_nested_classes);
        }
    }
}
