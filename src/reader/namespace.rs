//! Namespace scope stack (SPEC_FULL.md §3 "Namespace scope stack").
//!
//! Grounded on the teacher's `NamespaceResolver`/`NamespaceEntry`
//! (`src/name.rs`): a flat stack of `(prefix, uri)` bindings with markers
//! recording where each element's bindings begin, popped on
//! `element_end`. Extended here with two permanently-bound entries for
//! `xml`/`xmlns`, which the teacher's resolver does not model (namespaces
//! were fixed by convention rather than pre-registered there).
//!
//! Names are not stored directly: both `prefix` and `uri` are byte ranges
//! into the Reader's shared string arena, matching the "string interner
//! for the element/namespace stack" component in SPEC_FULL §2.

use std::ops::Range;

/// A stack of namespace bindings, scoped per open element.
#[derive(Debug, Default)]
pub struct NamespaceScopes {
    /// Bindings that apply at every depth and are never popped.
    permanent: Vec<(Range<usize>, Range<usize>)>,
    /// Flat stack of `(prefix, uri)` bindings, most recent last.
    bindings: Vec<(Range<usize>, Range<usize>)>,
    /// `bindings.len()` at the start of each currently-open element's
    /// scope; `push_scope`/`pop_scope` bracket one element each.
    depth_starts: Vec<usize>,
}

impl NamespaceScopes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a binding that can never be shadowed or removed (used
    /// once, at construction, for `xml` and `xmlns`).
    pub fn bind_permanent(&mut self, prefix: Range<usize>, uri: Range<usize>) {
        self.permanent.push((prefix, uri));
    }

    /// Opens a new namespace scope for an element about to be started.
    pub fn push_scope(&mut self) {
        self.depth_starts.push(self.bindings.len());
    }

    /// Closes the most recently opened scope, discarding its bindings.
    pub fn pop_scope(&mut self) {
        if let Some(start) = self.depth_starts.pop() {
            self.bindings.truncate(start);
        }
    }

    /// Binds `prefix` to `uri` in the current (innermost) scope.
    pub fn bind(&mut self, prefix: Range<usize>, uri: Range<usize>) {
        self.bindings.push((prefix, uri));
    }

    /// The current nesting depth (number of open scopes).
    pub fn depth(&self) -> usize {
        self.depth_starts.len()
    }

    /// Resolves `prefix` (raw bytes, compared against `arena`) to its
    /// bound URI range, searching innermost-scope-first. Empty prefix
    /// means "the default namespace".
    pub fn resolve(&self, prefix: &[u8], arena: &[u8]) -> Option<Range<usize>> {
        for (p, uri) in self.bindings.iter().rev() {
            if &arena[p.clone()] == prefix {
                return Some(uri.clone());
            }
        }
        for (p, uri) in self.permanent.iter().rev() {
            if &arena[p.clone()] == prefix {
                return Some(uri.clone());
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_scope_shadows_outer() {
        let arena = b"pxpx";
        let mut ns = NamespaceScopes::new();
        ns.push_scope();
        ns.bind(0..1, 0..2); // "p" -> "px" (toy range just for the test)
        ns.push_scope();
        ns.bind(2..3, 2..4); // "p" -> "px" again from the second half
        assert_eq!(ns.resolve(b"p", arena), Some(2..4));
        ns.pop_scope();
        assert_eq!(ns.resolve(b"p", arena), Some(0..2));
        ns.pop_scope();
        assert_eq!(ns.resolve(b"p", arena), None);
    }

    #[test]
    fn permanent_bindings_survive_every_pop() {
        let arena = b"xml";
        let mut ns = NamespaceScopes::new();
        ns.bind_permanent(0..3, 0..3);
        ns.push_scope();
        ns.pop_scope();
        assert_eq!(ns.resolve(b"xml", arena), Some(0..3));
    }
}
