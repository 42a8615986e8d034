//! Resolution targets: a declaration addressed through its lexical context.
//!
//! A target carries the designation, the root-to-leaf path of containers
//! (file, then enclosing classes) a resolver must walk before it may touch
//! the declaration itself.

use crate::decl::{DeclId, DeclKind};
use crate::tree::DeclTree;
use smallvec::SmallVec;

/// What a designation walk terminates at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    /// A single declaration (possibly the file itself).
    Declaration(DeclId),
    /// The file and, recursively, every member declared in it.
    WholeFile,
}

/// A designation: containing file, enclosing classes outermost-first, and
/// the target to resolve once positioned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveTarget {
    pub file: DeclId,
    /// Enclosing classes between the file and the target, outermost first.
    /// Excludes both the file and the target itself.
    pub path: SmallVec<[DeclId; 4]>,
    pub kind: TargetKind,
}

impl ResolveTarget {
    /// Collect the designation of a declaration by walking its parent links.
    pub fn of(tree: &DeclTree, decl: DeclId) -> ResolveTarget {
        let target = tree.get(decl);
        if target.kind() == DeclKind::File {
            return ResolveTarget {
                file: decl,
                path: SmallVec::new(),
                kind: TargetKind::Declaration(decl),
            };
        }

        let mut path: SmallVec<[DeclId; 4]> = SmallVec::new();
        let mut cursor = target.parent();
        while let Some(current) = cursor {
            let ancestor = tree.get(current);
            if ancestor.kind() == DeclKind::File {
                break;
            }
            debug_assert!(ancestor.kind().is_container());
            path.push(current);
            cursor = ancestor.parent();
        }
        path.reverse();

        ResolveTarget {
            file: target.file(),
            path,
            kind: TargetKind::Declaration(decl),
        }
    }

    /// Target the file and everything declared in it.
    pub fn whole_file(file: DeclId) -> ResolveTarget {
        ResolveTarget {
            file,
            path: SmallVec::new(),
            kind: TargetKind::WholeFile,
        }
    }

    /// The single target declaration, if this is not a whole-file target.
    pub fn target_decl(&self) -> Option<DeclId> {
        match self.kind {
            TargetKind::Declaration(decl) => Some(decl),
            TargetKind::WholeFile => None,
        }
    }

    /// Every designation element the walk visits, root first: the file, the
    /// enclosing classes, then a single target declaration if distinct.
    pub fn elements(&self) -> impl Iterator<Item = DeclId> + '_ {
        let tail = match self.kind {
            TargetKind::Declaration(decl) if decl != self.file => Some(decl),
            _ => None,
        };
        std::iter::once(self.file)
            .chain(self.path.iter().copied())
            .chain(tail)
    }

    /// Human-readable form for diagnostics and logs.
    pub fn display(&self, tree: &DeclTree) -> String {
        match self.kind {
            TargetKind::Declaration(decl) => tree.qualified_name(decl),
            TargetKind::WholeFile => format!("{}/*", tree.get(self.file).name()),
        }
    }
}
