//! End-to-end resolution scenarios: the annotation dependency chase, cycle
//! deferral, idempotence, and phase-order observability.

use lazy_sema_core::session::{ResolveSession, SessionConfig};
use lazy_sema_core::ResolveError;
use lazy_sema_types::{DeclId, DeclTreeBuilder, ResolvePhase};
use parking_lot::Mutex;
use std::sync::Arc;

/// `Outer` (class) containing `inner` (property annotated `@Marker`), with
/// `Marker` declared in a second file.
fn marker_fixture() -> (Arc<lazy_sema_types::DeclTree>, DeclId, DeclId, DeclId) {
    let mut builder = DeclTreeBuilder::new();
    let lib = builder.file("lib");
    builder.import(lib, "markers.Marker");
    let outer = builder.class(lib, "Outer");
    let inner = builder.property(outer, "inner");
    builder.annotate(inner, "Marker");
    let markers = builder.file("markers");
    let marker = builder.class(markers, "Marker");
    (Arc::new(builder.finish()), outer, inner, marker)
}

fn marker_session(tree: Arc<lazy_sema_types::DeclTree>) -> ResolveSession {
    ResolveSession::new(tree)
        .with_config(SessionConfig::default().with_plugin_annotation("Marker"))
}

#[test]
fn resolving_inner_pulls_its_designation_and_the_annotation_class() {
    let (tree, outer, inner, marker) = marker_fixture();
    let session = marker_session(Arc::clone(&tree));

    session
        .resolve(inner, ResolvePhase::CompilerRequiredAnnotations)
        .unwrap();

    // The designation reached at least the prerequisite phase, the
    // dependency reached the full phase, and the annotation is populated.
    assert!(tree.phase(outer) >= ResolvePhase::Imports);
    assert!(tree.phase(marker) >= ResolvePhase::CompilerRequiredAnnotations);
    assert!(tree.phase(inner) >= ResolvePhase::CompilerRequiredAnnotations);
    let state = tree.get(inner).state();
    assert_eq!(state.annotations[0].resolved_class, Some(marker));

    session
        .check_is_resolved(inner, ResolvePhase::CompilerRequiredAnnotations)
        .unwrap();
    session
        .check_is_resolved(marker, ResolvePhase::CompilerRequiredAnnotations)
        .unwrap();
}

#[test]
fn check_is_resolved_fails_below_the_required_phase() {
    let (tree, _, inner, _) = marker_fixture();
    let session = marker_session(tree);

    let result = session.check_is_resolved(inner, ResolvePhase::CompilerRequiredAnnotations);
    assert!(matches!(
        result,
        Err(ResolveError::PhaseInvariantViolation { .. })
    ));
}

#[test]
fn resolve_is_idempotent() {
    let (tree, outer, inner, marker) = marker_fixture();
    let session = marker_session(Arc::clone(&tree));

    session.resolve(inner, ResolvePhase::Status).unwrap();
    let phases_once: Vec<_> = [outer, inner, marker]
        .iter()
        .map(|d| tree.phase(*d))
        .collect();
    let state_once = tree.get(inner).state().clone();

    session.resolve(inner, ResolvePhase::Status).unwrap();
    let phases_twice: Vec<_> = [outer, inner, marker]
        .iter()
        .map(|d| tree.phase(*d))
        .collect();

    assert_eq!(phases_once, phases_twice);
    assert_eq!(*tree.get(inner).state(), state_once);
}

#[test]
fn annotation_cycle_terminates_with_both_sides_referenced() {
    // A is annotated with @B and B with @A: a back-edge at the same phase.
    let mut builder = DeclTreeBuilder::new();
    let file_a = builder.file("a");
    let a = builder.class(file_a, "A");
    builder.annotate(a, "B");
    let file_b = builder.file("b");
    let b = builder.class(file_b, "B");
    builder.annotate(b, "A");
    let tree = Arc::new(builder.finish());

    let session = ResolveSession::new(Arc::clone(&tree)).with_config(
        SessionConfig::default()
            .with_plugin_annotation("A")
            .with_plugin_annotation("B"),
    );

    session
        .resolve(a, ResolvePhase::CompilerRequiredAnnotations)
        .unwrap();

    // Termination and a consistent end state; the back-edge was deferred,
    // not recursed into.
    assert!(tree.phase(a) >= ResolvePhase::CompilerRequiredAnnotations);
    assert!(tree.phase(b) >= ResolvePhase::CompilerRequiredAnnotations);
    assert_eq!(tree.get(a).state().annotations[0].resolved_class, Some(b));
    assert_eq!(tree.get(b).state().annotations[0].resolved_class, Some(a));
    assert!(session.export_stats().cycles_deferred >= 1);
}

#[test]
fn supertype_cycle_terminates() {
    let mut builder = DeclTreeBuilder::new();
    let file = builder.file("lib");
    let a = builder.class(file, "A");
    builder.super_type(a, "B");
    let b = builder.class(file, "B");
    builder.super_type(b, "A");
    let tree = Arc::new(builder.finish());

    let session = ResolveSession::new(Arc::clone(&tree));
    session.resolve(a, ResolvePhase::SuperTypes).unwrap();

    assert!(tree.phase(a) >= ResolvePhase::SuperTypes);
    assert!(tree.phase(b) >= ResolvePhase::SuperTypes);
    assert_eq!(tree.get(a).state().super_types[0].resolved, Some(b));
    assert_eq!(tree.get(b).state().super_types[0].resolved, Some(a));
}

#[test]
fn phase_transitions_are_monotonic_and_ancestor_first() {
    let mut builder = DeclTreeBuilder::new();
    let file = builder.file("lib");
    let outer = builder.class(file, "Outer");
    let nested = builder.class(outer, "Nested");
    let method = builder.function(nested, "run");
    let tree = Arc::new(builder.finish());

    let session = ResolveSession::new(Arc::clone(&tree));
    let log: Arc<Mutex<Vec<(DeclId, ResolvePhase)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    session.set_phase_observer(move |decl, phase| sink.lock().push((decl, phase)));

    session.resolve(method, ResolvePhase::Status).unwrap();

    let log = log.lock();

    // Monotonicity: per declaration, observed phases never decrease.
    for decl in [file, outer, nested, method] {
        let observed: Vec<_> = log
            .iter()
            .filter(|(d, _)| *d == decl)
            .map(|(_, p)| *p)
            .collect();
        assert!(observed.windows(2).all(|w| w[0] <= w[1]), "{:?}", observed);
    }

    // Ancestor-first: within each phase, file before class before nested
    // class before method.
    for phase in [
        ResolvePhase::Imports,
        ResolvePhase::CompilerRequiredAnnotations,
        ResolvePhase::SuperTypes,
        ResolvePhase::Status,
    ] {
        let position = |decl: DeclId| {
            log.iter()
                .position(|(d, p)| *d == decl && *p == phase)
                .unwrap_or_else(|| panic!("no {} transition for {}", phase, decl))
        };
        assert!(position(file) < position(outer));
        assert!(position(outer) < position(nested));
        assert!(position(nested) < position(method));
    }
}

#[test]
fn whole_file_resolution_covers_every_member() {
    let (tree, outer, inner, marker) = marker_fixture();
    let session = marker_session(Arc::clone(&tree));

    let file = tree.get(outer).file();
    session
        .resolve_whole_file(file, ResolvePhase::BodyResolve)
        .unwrap();

    assert_eq!(tree.phase(file), ResolvePhase::BodyResolve);
    assert_eq!(tree.phase(outer), ResolvePhase::BodyResolve);
    assert_eq!(tree.phase(inner), ResolvePhase::BodyResolve);
    // The dependency was chased only as far as its own phase required.
    assert!(tree.phase(marker) >= ResolvePhase::CompilerRequiredAnnotations);
}

#[test]
fn deprecation_status_propagates_to_members() {
    let mut builder = DeclTreeBuilder::new();
    let file = builder.file("lib");
    let legacy = builder.class(file, "Legacy");
    builder.annotate(legacy, "Deprecated");
    let method = builder.function(legacy, "run");
    let fresh = builder.class(file, "Fresh");
    let fresh_method = builder.function(fresh, "run");
    let tree = Arc::new(builder.finish());

    let session = ResolveSession::new(Arc::clone(&tree));
    session
        .resolve_whole_file(file, ResolvePhase::Status)
        .unwrap();

    let legacy_cache = tree.get(legacy).state().deprecations.clone().unwrap();
    assert!(legacy_cache.is_deprecated);
    assert!(!legacy_cache.inherited);

    let method_cache = tree.get(method).state().deprecations.clone().unwrap();
    assert!(method_cache.is_deprecated);
    assert!(method_cache.inherited);

    let fresh_cache = tree.get(fresh_method).state().deprecations.clone().unwrap();
    assert!(!fresh_cache.is_deprecated);
}

#[test]
fn update_phase_for_internals_advances_members_without_transforms() {
    let mut builder = DeclTreeBuilder::new();
    let file = builder.file("lib");
    let class = builder.class(file, "C");
    let ctor = builder.constructor(class);
    let method = builder.function(class, "run");
    builder.annotate(method, "Deprecated");
    let tree = Arc::new(builder.finish());

    let session = ResolveSession::new(Arc::clone(&tree));
    session
        .resolve(class, ResolvePhase::CompilerRequiredAnnotations)
        .unwrap();

    assert_eq!(tree.phase(ctor), ResolvePhase::RawTree);
    session.update_phase_for_internals(class, ResolvePhase::CompilerRequiredAnnotations);

    assert_eq!(tree.phase(ctor), ResolvePhase::CompilerRequiredAnnotations);
    assert_eq!(tree.phase(method), ResolvePhase::CompilerRequiredAnnotations);
    // Bookkeeping only: the member's annotation was not transformed.
    assert_eq!(tree.get(method).state().annotations[0].resolved_class, None);
}

#[test]
fn stats_export_round_trips_through_a_file() -> anyhow::Result<()> {
    let (tree, _, inner, _) = marker_fixture();
    let session = marker_session(tree);
    session.resolve(inner, ResolvePhase::Status)?;

    let dir = tempfile::TempDir::new()?;
    let path = dir.path().join("resolution-stats.json");
    session.save_stats(&path)?;

    let loaded = ResolveSession::load_stats(&path)?;
    assert_eq!(loaded, session.export_stats());
    assert!(loaded.resolve_calls >= 1);
    assert!(loaded.phases_advanced >= 1);
    Ok(())
}
