//! Declarations and their phase-relevant mutable state.
//!
//! A [`Declaration`] has two halves: immutable structure (kind, name, parent
//! links) fixed at tree construction, and mutable resolution state: the
//! current [`ResolvePhase`] plus the fields the phase transforms populate.
//! The phase is an atomic that only ever advances; the resolved fields live
//! behind a non-poisoning `RwLock` and may only be written while the owning
//! scope's write lock is held.

use crate::phase::ResolvePhase;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Identity of a declaration within one [`DeclTree`](crate::tree::DeclTree).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeclId(pub u32);

impl DeclId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for DeclId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Closed set of declaration kinds the resolvers dispatch over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclKind {
    File,
    Class,
    Function,
    Property,
    Constructor,
    TypeAlias,
}

impl DeclKind {
    /// Callable declarations carry a deprecations cache.
    pub fn is_callable(self) -> bool {
        matches!(
            self,
            DeclKind::Function | DeclKind::Property | DeclKind::Constructor
        )
    }

    /// Kinds that form designation path elements (lexical containers).
    pub fn is_container(self) -> bool {
        matches!(self, DeclKind::File | DeclKind::Class)
    }
}

impl fmt::Display for DeclKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeclKind::File => "file",
            DeclKind::Class => "class",
            DeclKind::Function => "function",
            DeclKind::Property => "property",
            DeclKind::Constructor => "constructor",
            DeclKind::TypeAlias => "type alias",
        };
        f.write_str(name)
    }
}

/// An annotation use-site on a declaration.
///
/// `resolved_class` is populated by the compiler-required-annotations phase
/// for annotations whose short name the session recognizes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub short_name: String,
    pub resolved_class: Option<DeclId>,
}

impl Annotation {
    pub fn unresolved(short_name: impl Into<String>) -> Self {
        Self {
            short_name: short_name.into(),
            resolved_class: None,
        }
    }
}

/// A supertype reference on a class, resolved by the supertypes phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef {
    pub name: String,
    pub resolved: Option<DeclId>,
}

impl TypeRef {
    pub fn unresolved(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resolved: None,
        }
    }
}

/// An import in a file's import table, resolved by the imports phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub path: String,
    pub resolved: bool,
}

impl Import {
    pub fn unresolved(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            resolved: false,
        }
    }

    /// Last segment of the import path, the short name it brings into scope.
    pub fn short_name(&self) -> &str {
        self.path.rsplit('.').next().unwrap_or(&self.path)
    }
}

/// Deprecation status computed by the status phase from resolved annotations.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeprecationsCache {
    pub is_deprecated: bool,
    /// Whether the deprecation was inherited from the containing class.
    pub inherited: bool,
}

/// The phase-relevant mutable fields of a declaration.
///
/// Everything a phase transform is allowed to touch lives here; the state
/// keeper captures and restores exactly these fields.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeclState {
    pub annotations: Vec<Annotation>,
    pub super_types: Vec<TypeRef>,
    /// Files only; empty for other kinds.
    pub imports: Vec<Import>,
    pub deprecations: Option<DeprecationsCache>,
}

/// A node in the program's semantic tree.
#[derive(Debug)]
pub struct Declaration {
    id: DeclId,
    kind: DeclKind,
    name: String,
    parent: Option<DeclId>,
    file: DeclId,
    children: Vec<DeclId>,
    phase: AtomicU8,
    state: RwLock<DeclState>,
}

impl Declaration {
    pub(crate) fn new(
        id: DeclId,
        kind: DeclKind,
        name: String,
        parent: Option<DeclId>,
        file: DeclId,
    ) -> Self {
        Self {
            id,
            kind,
            name,
            parent,
            file,
            children: Vec::new(),
            phase: AtomicU8::new(ResolvePhase::RawTree.index()),
            state: RwLock::new(DeclState::default()),
        }
    }

    pub fn id(&self) -> DeclId {
        self.id
    }

    pub fn kind(&self) -> DeclKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<DeclId> {
        self.parent
    }

    /// The containing file; a file declaration is its own container.
    pub fn file(&self) -> DeclId {
        self.file
    }

    pub fn children(&self) -> &[DeclId] {
        &self.children
    }

    pub(crate) fn add_child(&mut self, child: DeclId) {
        self.children.push(child);
    }

    /// Current resolution phase. Lock-free; `Acquire` pairs with the
    /// `AcqRel` advance so a reader that observed phase `P` also observes
    /// the state written by the transform that advanced to `P`.
    pub fn phase(&self) -> ResolvePhase {
        let index = self.phase.load(Ordering::Acquire);
        ResolvePhase::from_index(index).expect("phase slot only ever holds a valid phase index")
    }

    /// Monotonic phase advance (fetch-max discipline: a concurrent or
    /// stale writer can never move the phase backwards). Returns the phase
    /// held before the call.
    pub fn advance_phase_to(&self, to: ResolvePhase) -> ResolvePhase {
        let prev = self.phase.fetch_max(to.index(), Ordering::AcqRel);
        ResolvePhase::from_index(prev).expect("phase slot only ever holds a valid phase index")
    }

    /// Read access to the phase-relevant mutable fields.
    pub fn state(&self) -> RwLockReadGuard<'_, DeclState> {
        self.state.read()
    }

    /// Write access to the phase-relevant mutable fields. Callers must hold
    /// the owning scope's write lock for the duration of any mutation.
    pub fn state_mut(&self) -> RwLockWriteGuard<'_, DeclState> {
        self.state.write()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_declaration_starts_at_raw_tree() {
        let decl = Declaration::new(DeclId(0), DeclKind::File, "lib".into(), None, DeclId(0));
        assert_eq!(decl.phase(), ResolvePhase::RawTree);
        assert_eq!(decl.state().annotations.len(), 0);
    }

    #[test]
    fn phase_advance_is_monotonic() {
        let decl = Declaration::new(DeclId(1), DeclKind::Class, "C".into(), Some(DeclId(0)), DeclId(0));
        let before = decl.advance_phase_to(ResolvePhase::SuperTypes);
        assert_eq!(before, ResolvePhase::RawTree);
        assert_eq!(decl.phase(), ResolvePhase::SuperTypes);

        // A stale advance to an earlier phase is a no-op.
        let before = decl.advance_phase_to(ResolvePhase::Imports);
        assert_eq!(before, ResolvePhase::SuperTypes);
        assert_eq!(decl.phase(), ResolvePhase::SuperTypes);
    }

    #[test]
    fn import_short_name_is_last_segment() {
        assert_eq!(Import::unresolved("markers.Marker").short_name(), "Marker");
        assert_eq!(Import::unresolved("Lonely").short_name(), "Lonely");
    }
}
