//! Scoped read/write locks over declaration-tree scopes.
//!
//! The provider grants mutually-exclusive write access to a scope of the
//! shared declaration tree: per file for ordinary phases, the whole tree
//! for jumping phases whose transforms chase dependencies across files.
//!
//! Re-entrancy is by explicit token, not thread identity: a [`LockContext`]
//! is minted per top-level resolution call and passed down through every
//! recursive resolver it spawns. A context that already holds a scope's
//! write lock re-enters without blocking, so self-referential designation
//! walks cannot deadlock against themselves, and ownership of "am I already
//! inside this scope" is a plain testable value.

use crate::errors::ResolveError;
use lazy_sema_types::DeclId;
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::trace;

/// Key identifying a lockable scope of the declaration tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKey {
    /// Per-file scope; independent files lock independently.
    File(DeclId),
    /// Whole-tree scope, taken by jumping phases so that two concurrent
    /// cross-file dependency chases cannot reach an AB-BA file-lock order.
    Tree,
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeKey::File(id) => write!(f, "file({})", id),
            ScopeKey::Tree => f.write_str("tree"),
        }
    }
}

/// Identity of one logical resolution call chain.
///
/// Deliberately not `Clone`: there is exactly one context per top-level
/// call, shared by reference through the recursive call graph.
#[derive(Debug)]
pub struct LockContext {
    id: u64,
}

impl LockContext {
    pub fn id(&self) -> u64 {
        self.id
    }
}

#[derive(Debug, Default)]
struct ScopeState {
    readers: usize,
    writer: Option<Writer>,
}

#[derive(Debug)]
struct Writer {
    owner: u64,
    depth: usize,
}

/// Grants scoped, re-entrant read/write access keyed by [`ScopeKey`].
pub struct LockProvider {
    scopes: Mutex<HashMap<ScopeKey, ScopeState>>,
    changed: Condvar,
    next_context: AtomicU64,
    /// Optional acquisition deadline; expiry is a fatal
    /// [`ResolveError::LockProvider`].
    timeout: Option<Duration>,
}

impl Default for LockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl LockProvider {
    pub fn new() -> Self {
        Self {
            scopes: Mutex::new(HashMap::new()),
            changed: Condvar::new(),
            next_context: AtomicU64::new(0),
            timeout: None,
        }
    }

    /// A provider whose acquisitions fail fatally after `timeout` instead of
    /// waiting forever.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..Self::new()
        }
    }

    /// Mint the context for a new top-level resolution call.
    pub fn new_context(&self) -> LockContext {
        LockContext {
            id: self.next_context.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Run `action` holding the exclusive write lock for `scope`. Re-entrant
    /// for the same context; release is guaranteed on every exit path.
    pub fn with_write_lock<R>(
        &self,
        cx: &LockContext,
        scope: ScopeKey,
        action: impl FnOnce() -> R,
    ) -> Result<R, ResolveError> {
        let _guard = self.acquire_write(cx, scope)?;
        Ok(action())
    }

    /// Run `action` holding shared read access for `scope`. Concurrent with
    /// other readers, exclusive against writers from other contexts; a
    /// context already writing the scope re-enters.
    pub fn with_read_lock<R>(
        &self,
        cx: &LockContext,
        scope: ScopeKey,
        action: impl FnOnce() -> R,
    ) -> Result<R, ResolveError> {
        let _guard = self.acquire_read(cx, scope)?;
        Ok(action())
    }

    /// Whether any context currently holds the write lock for `scope`.
    pub fn is_write_locked(&self, scope: ScopeKey) -> bool {
        let scopes = self.scopes.lock();
        scopes.get(&scope).is_some_and(|s| s.writer.is_some())
    }

    /// Whether `cx` currently holds the write lock for `scope`.
    pub fn holds_write(&self, cx: &LockContext, scope: ScopeKey) -> bool {
        let scopes = self.scopes.lock();
        scopes
            .get(&scope)
            .and_then(|s| s.writer.as_ref())
            .is_some_and(|w| w.owner == cx.id)
    }

    fn acquire_write(&self, cx: &LockContext, scope: ScopeKey) -> Result<WriteGuard<'_>, ResolveError> {
        let deadline = self.timeout.map(|t| Instant::now() + t);
        let mut scopes = self.scopes.lock();
        loop {
            let state = scopes.entry(scope).or_default();
            match &mut state.writer {
                Some(writer) if writer.owner == cx.id => {
                    writer.depth += 1;
                    return Ok(WriteGuard {
                        provider: self,
                        owner: cx.id,
                        scope,
                    });
                }
                None if state.readers == 0 => {
                    state.writer = Some(Writer {
                        owner: cx.id,
                        depth: 1,
                    });
                    return Ok(WriteGuard {
                        provider: self,
                        owner: cx.id,
                        scope,
                    });
                }
                _ => {
                    trace!(context = cx.id, scope = %scope, "write lock contended, waiting");
                    self.wait(&mut scopes, scope, deadline)?;
                }
            }
        }
    }

    fn acquire_read(&self, cx: &LockContext, scope: ScopeKey) -> Result<ReadGuard<'_>, ResolveError> {
        let deadline = self.timeout.map(|t| Instant::now() + t);
        let mut scopes = self.scopes.lock();
        loop {
            let state = scopes.entry(scope).or_default();
            match &mut state.writer {
                Some(writer) if writer.owner == cx.id => {
                    // Reading under our own write lock: ride the write entry.
                    writer.depth += 1;
                    return Ok(ReadGuard {
                        provider: self,
                        scope,
                        mode: ReadMode::WriterReentry { owner: cx.id },
                    });
                }
                None => {
                    state.readers += 1;
                    return Ok(ReadGuard {
                        provider: self,
                        scope,
                        mode: ReadMode::Reader,
                    });
                }
                Some(_) => {
                    trace!(context = cx.id, scope = %scope, "read lock contended, waiting");
                    self.wait(&mut scopes, scope, deadline)?;
                }
            }
        }
    }

    fn wait(
        &self,
        scopes: &mut parking_lot::MutexGuard<'_, HashMap<ScopeKey, ScopeState>>,
        scope: ScopeKey,
        deadline: Option<Instant>,
    ) -> Result<(), ResolveError> {
        match deadline {
            None => {
                self.changed.wait(scopes);
                Ok(())
            }
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline
                    || self
                        .changed
                        .wait_until(scopes, deadline)
                        .timed_out()
                {
                    return Err(ResolveError::LockProvider {
                        scope: scope.to_string(),
                        reason: "acquisition deadline expired".to_string(),
                    });
                }
                Ok(())
            }
        }
    }

    fn release_write(&self, owner: u64, scope: ScopeKey) {
        let mut scopes = self.scopes.lock();
        let state = scopes
            .get_mut(&scope)
            .expect("scope state present while a guard is held");
        let writer = state
            .writer
            .as_mut()
            .expect("writer present while a write guard is held");
        debug_assert_eq!(writer.owner, owner);
        writer.depth -= 1;
        if writer.depth == 0 {
            state.writer = None;
            self.changed.notify_all();
        }
    }

    fn release_read(&self, scope: ScopeKey) {
        let mut scopes = self.scopes.lock();
        let state = scopes
            .get_mut(&scope)
            .expect("scope state present while a guard is held");
        debug_assert!(state.readers > 0);
        state.readers -= 1;
        if state.readers == 0 {
            self.changed.notify_all();
        }
    }
}

struct WriteGuard<'a> {
    provider: &'a LockProvider,
    owner: u64,
    scope: ScopeKey,
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        self.provider.release_write(self.owner, self.scope);
    }
}

enum ReadMode {
    Reader,
    WriterReentry { owner: u64 },
}

struct ReadGuard<'a> {
    provider: &'a LockProvider,
    scope: ScopeKey,
    mode: ReadMode,
}

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        match self.mode {
            ReadMode::Reader => self.provider.release_read(self.scope),
            ReadMode::WriterReentry { owner } => self.provider.release_write(owner, self.scope),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn write_lock_is_reentrant_for_the_same_context() {
        let provider = LockProvider::new();
        let cx = provider.new_context();
        let scope = ScopeKey::File(DeclId(0));

        let value = provider
            .with_write_lock(&cx, scope, || {
                assert!(provider.holds_write(&cx, scope));
                provider
                    .with_write_lock(&cx, scope, || {
                        provider.with_write_lock(&cx, scope, || 7).unwrap()
                    })
                    .unwrap()
            })
            .unwrap();
        assert_eq!(value, 7);
        assert!(!provider.is_write_locked(scope));
    }

    #[test]
    fn read_under_own_write_does_not_block() {
        let provider = LockProvider::new();
        let cx = provider.new_context();
        let scope = ScopeKey::Tree;

        provider
            .with_write_lock(&cx, scope, || {
                let seen = provider.with_read_lock(&cx, scope, || 42).unwrap();
                assert_eq!(seen, 42);
            })
            .unwrap();
        assert!(!provider.is_write_locked(scope));
    }

    #[test]
    fn distinct_scopes_do_not_contend() {
        let provider = LockProvider::with_timeout(Duration::from_millis(200));
        let cx_a = provider.new_context();
        let cx_b = provider.new_context();

        provider
            .with_write_lock(&cx_a, ScopeKey::File(DeclId(0)), || {
                provider
                    .with_write_lock(&cx_b, ScopeKey::File(DeclId(1)), || ())
                    .unwrap();
            })
            .unwrap();
    }

    #[test]
    fn acquisition_deadline_expires_fatally() {
        let provider = Arc::new(LockProvider::with_timeout(Duration::from_millis(50)));
        let scope = ScopeKey::File(DeclId(3));

        let holder = Arc::clone(&provider);
        let held = Arc::new(std::sync::Barrier::new(2));
        let held_clone = Arc::clone(&held);
        let handle = std::thread::spawn(move || {
            let cx = holder.new_context();
            holder
                .with_write_lock(&cx, scope, || {
                    held_clone.wait();
                    std::thread::sleep(Duration::from_millis(250));
                })
                .unwrap();
        });

        held.wait();
        let cx = provider.new_context();
        let result = provider.with_write_lock(&cx, scope, || ());
        assert!(matches!(result, Err(ResolveError::LockProvider { .. })));
        handle.join().unwrap();
    }

    #[test]
    fn writers_exclude_each_other() {
        let provider = Arc::new(LockProvider::new());
        let scope = ScopeKey::Tree;
        let inside = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let provider = Arc::clone(&provider);
            let inside = Arc::clone(&inside);
            handles.push(std::thread::spawn(move || {
                let cx = provider.new_context();
                for _ in 0..200 {
                    provider
                        .with_write_lock(&cx, scope, || {
                            assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                            inside.fetch_sub(1, Ordering::SeqCst);
                        })
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
