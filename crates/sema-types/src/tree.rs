//! The declaration tree and its builder.
//!
//! A [`DeclTree`] owns every declaration of a compilation unit. It is built
//! once (by the parser in a real front end, by [`DeclTreeBuilder`] in tests
//! and fixtures) and then shared immutably across threads; all per-node
//! mutability is interior to [`Declaration`].

use crate::decl::{Annotation, DeclId, DeclKind, Declaration, Import, TypeRef};
use crate::phase::ResolvePhase;

/// Owns all declarations of one compilation unit.
#[derive(Debug, Default)]
pub struct DeclTree {
    decls: Vec<Declaration>,
    files: Vec<DeclId>,
}

impl DeclTree {
    pub fn get(&self, id: DeclId) -> &Declaration {
        &self.decls[id.index()]
    }

    /// Shorthand for `get(id).phase()`.
    pub fn phase(&self, id: DeclId) -> ResolvePhase {
        self.get(id).phase()
    }

    pub fn files(&self) -> &[DeclId] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Declaration> {
        self.decls.iter()
    }

    /// Dotted path from the containing file to the declaration, for
    /// diagnostics: `"lib/Outer.inner"`.
    pub fn qualified_name(&self, id: DeclId) -> String {
        let mut segments = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let decl = self.get(current);
            segments.push(decl.name().to_string());
            cursor = decl.parent();
        }
        segments.reverse();
        let (file, rest) = segments.split_first().expect("walk yields at least one segment");
        if rest.is_empty() {
            file.clone()
        } else {
            format!("{}/{}", file, rest.join("."))
        }
    }
}

/// Builds a [`DeclTree`]; stands in for the parser.
#[derive(Debug, Default)]
pub struct DeclTreeBuilder {
    decls: Vec<Declaration>,
    files: Vec<DeclId>,
}

impl DeclTreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(&mut self, name: &str) -> DeclId {
        let id = DeclId(self.decls.len() as u32);
        self.decls
            .push(Declaration::new(id, DeclKind::File, name.to_string(), None, id));
        self.files.push(id);
        id
    }

    pub fn class(&mut self, parent: DeclId, name: &str) -> DeclId {
        self.add(DeclKind::Class, parent, name)
    }

    pub fn function(&mut self, parent: DeclId, name: &str) -> DeclId {
        self.add(DeclKind::Function, parent, name)
    }

    pub fn property(&mut self, parent: DeclId, name: &str) -> DeclId {
        self.add(DeclKind::Property, parent, name)
    }

    pub fn constructor(&mut self, parent: DeclId) -> DeclId {
        self.add(DeclKind::Constructor, parent, "<init>")
    }

    pub fn type_alias(&mut self, parent: DeclId, name: &str) -> DeclId {
        self.add(DeclKind::TypeAlias, parent, name)
    }

    /// Attach an unresolved annotation use-site to a declaration.
    pub fn annotate(&mut self, decl: DeclId, short_name: &str) {
        self.decls[decl.index()]
            .state_mut()
            .annotations
            .push(Annotation::unresolved(short_name));
    }

    /// Attach an unresolved supertype reference to a class.
    pub fn super_type(&mut self, class: DeclId, name: &str) {
        debug_assert_eq!(self.decls[class.index()].kind(), DeclKind::Class);
        self.decls[class.index()]
            .state_mut()
            .super_types
            .push(TypeRef::unresolved(name));
    }

    /// Add an import to a file's import table.
    pub fn import(&mut self, file: DeclId, path: &str) {
        debug_assert_eq!(self.decls[file.index()].kind(), DeclKind::File);
        self.decls[file.index()]
            .state_mut()
            .imports
            .push(Import::unresolved(path));
    }

    pub fn finish(self) -> DeclTree {
        DeclTree {
            decls: self.decls,
            files: self.files,
        }
    }

    fn add(&mut self, kind: DeclKind, parent: DeclId, name: &str) -> DeclId {
        let id = DeclId(self.decls.len() as u32);
        let file = self.decls[parent.index()].file();
        self.decls
            .push(Declaration::new(id, kind, name.to_string(), Some(parent), file));
        self.decls[parent.index()].add_child(id);
        id
    }
}
