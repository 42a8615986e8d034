//! Symbol lookup across module boundaries.
//!
//! Phase transforms that chase dependencies (an annotation's class, a
//! supertype) go through a [`SymbolProvider`] rather than the tree directly,
//! so a host can plug in cross-module or library-aware lookup.

use lazy_sema_types::{DeclId, DeclKind, DeclTree};
use std::collections::HashMap;

/// Resolves a name to a declaration across module boundaries.
pub trait SymbolProvider: Send + Sync {
    /// Find a class declaration by its short name.
    fn find_class_by_short_name(&self, name: &str) -> Option<DeclId>;
}

/// Default provider backed by an index over a single declaration tree.
///
/// The first class registered under a short name wins; shadowing across
/// files is a host concern, not a resolution-engine concern.
pub struct TreeSymbolProvider {
    classes: HashMap<String, DeclId>,
}

impl TreeSymbolProvider {
    pub fn new(tree: &DeclTree) -> Self {
        let mut classes = HashMap::new();
        for decl in tree.iter() {
            if decl.kind() == DeclKind::Class {
                classes
                    .entry(decl.name().to_string())
                    .or_insert_with(|| decl.id());
            }
        }
        Self { classes }
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl SymbolProvider for TreeSymbolProvider {
    fn find_class_by_short_name(&self, name: &str) -> Option<DeclId> {
        self.classes.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lazy_sema_types::DeclTreeBuilder;

    #[test]
    fn index_finds_classes_across_files() {
        let mut builder = DeclTreeBuilder::new();
        let lib = builder.file("lib");
        builder.class(lib, "Outer");
        let markers = builder.file("markers");
        let marker = builder.class(markers, "Marker");
        let tree = builder.finish();

        let provider = TreeSymbolProvider::new(&tree);
        assert_eq!(provider.find_class_by_short_name("Marker"), Some(marker));
        assert_eq!(provider.find_class_by_short_name("Absent"), None);
    }

    #[test]
    fn first_registration_wins() {
        let mut builder = DeclTreeBuilder::new();
        let a = builder.file("a");
        let first = builder.class(a, "Dup");
        let b = builder.file("b");
        builder.class(b, "Dup");
        let tree = builder.finish();

        let provider = TreeSymbolProvider::new(&tree);
        assert_eq!(provider.find_class_by_short_name("Dup"), Some(first));
    }
}
