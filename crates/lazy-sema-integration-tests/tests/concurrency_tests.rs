//! Concurrency properties: write-lock exclusivity under contention and
//! convergence of overlapping top-level requests from many threads.

use lazy_sema_core::locks::{LockProvider, ScopeKey};
use lazy_sema_core::session::{ResolveSession, SessionConfig};
use lazy_sema_types::{DeclId, DeclTree, DeclTreeBuilder, ResolvePhase};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

#[test]
fn write_lock_exclusivity_under_contention() {
    let provider = Arc::new(LockProvider::new());
    let scope = ScopeKey::File(DeclId(0));
    let inside = Arc::new(AtomicUsize::new(0));
    let peak_violations = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let provider = Arc::clone(&provider);
        let inside = Arc::clone(&inside);
        let peak_violations = Arc::clone(&peak_violations);
        handles.push(thread::spawn(move || {
            let cx = provider.new_context();
            for _ in 0..500 {
                provider
                    .with_write_lock(&cx, scope, || {
                        if inside.fetch_add(1, Ordering::SeqCst) != 0 {
                            peak_violations.fetch_add(1, Ordering::SeqCst);
                        }
                        inside.fetch_sub(1, Ordering::SeqCst);
                    })
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(peak_violations.load(Ordering::SeqCst), 0);
}

/// Many files whose declarations are annotated with marker classes from the
/// other files, so concurrent top-level requests overlap heavily.
fn overlapping_tree(files: usize) -> (Arc<DeclTree>, Vec<DeclId>, SessionConfig) {
    let mut builder = DeclTreeBuilder::new();
    let mut config = SessionConfig::default();
    let mut members = Vec::new();

    for i in 0..files {
        let file = builder.file(&format!("file{}", i));
        let class = builder.class(file, &format!("C{}", i));
        let method = builder.function(class, "run");
        // Annotate with the next file's class, wrapping around.
        let marker = format!("C{}", (i + 1) % files);
        builder.annotate(method, &marker);
        config = config.with_plugin_annotation(marker);
        members.push(method);
    }
    (Arc::new(builder.finish()), members, config)
}

#[test]
fn concurrent_overlapping_resolution_converges() {
    let (tree, members, config) = overlapping_tree(6);
    let session = Arc::new(ResolveSession::new(Arc::clone(&tree)).with_config(config));

    let mut handles = Vec::new();
    for member in &members {
        let session = Arc::clone(&session);
        let member = *member;
        handles.push(thread::spawn(move || {
            session.resolve(member, ResolvePhase::Status).unwrap();
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    for member in members {
        assert!(tree.phase(member) >= ResolvePhase::Status);
        session
            .check_is_resolved(member, ResolvePhase::Status)
            .unwrap();
    }
}

#[test]
fn parallel_bulk_resolution_reaches_the_terminal_phase() {
    let (tree, _, config) = overlapping_tree(8);
    let session = ResolveSession::new(Arc::clone(&tree)).with_config(config);

    session.resolve_all(ResolvePhase::BodyResolve).unwrap();

    for decl in tree.iter() {
        assert_eq!(decl.phase(), ResolvePhase::BodyResolve);
    }
}

#[test]
fn repeated_concurrent_rounds_stay_monotonic() {
    let (tree, members, config) = overlapping_tree(4);
    let session = Arc::new(ResolveSession::new(Arc::clone(&tree)).with_config(config));

    for phase in [
        ResolvePhase::CompilerRequiredAnnotations,
        ResolvePhase::SuperTypes,
        ResolvePhase::Status,
        ResolvePhase::BodyResolve,
    ] {
        let mut handles = Vec::new();
        for member in &members {
            let session = Arc::clone(&session);
            let member = *member;
            handles.push(thread::spawn(move || {
                session.resolve(member, phase).unwrap();
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        for member in &members {
            assert!(tree.phase(*member) >= phase);
        }
    }
}
