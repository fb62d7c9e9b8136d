//! Attribute indices and value normalization (SPEC_FULL.md §3 "Attribute
//! indices", §4.3 "Normalization rules").
//!
//! Grounded on `src/events/attributes.rs`'s `Attribute::unescaped_value` /
//! `escapei.rs::unescape` for entity expansion, generalized here to also
//! fold `\t`, `\n`, `\r` (including split `\r\n`) to a single space per
//! SPEC_FULL §4.3. The index itself is a small linear scan rather than a
//! hash map — attribute counts per element are small in practice, and a
//! scan avoids allocating owned keys just to look one up (the same
//! trade-off the teacher makes for its own `Attributes` iterator).

use std::ops::Range;

use crate::error::Position;

/// The five predefined entities recognized without DTD support
/// (SPEC_FULL GLOSSARY).
pub fn resolve_predefined_entity(name: &[u8]) -> Option<char> {
    match name {
        b"amp" => Some('&'),
        b"lt" => Some('<'),
        b"gt" => Some('>'),
        b"apos" => Some('\''),
        b"quot" => Some('"'),
        _ => None,
    }
}

/// Appends `raw` to `scratch`, normalizing end-of-line sequences
/// (`\r\n` and lone `\r` both fold to a single output character) and,
/// in `attribute_mode`, additionally folding `\t`/`\n`/`\r` to a plain
/// space. `pending_cr` carries state across fragments of the same
/// logical value so a `\r` that ends one fragment and a `\n` that begins
/// the next still normalize to one character, not two.
pub fn append_normalized(scratch: &mut Vec<u8>, raw: &[u8], pending_cr: &mut bool, attribute_mode: bool) {
    for &b in raw {
        if *pending_cr {
            *pending_cr = false;
            if b == b'\n' {
                continue; // second half of a split "\r\n"
            }
        }
        match b {
            b'\r' => {
                *pending_cr = true;
                scratch.push(b' ');
                if !attribute_mode {
                    // overwrite the space just pushed with '\n' for text nodes
                    let last = scratch.len() - 1;
                    scratch[last] = b'\n';
                }
            }
            b'\t' | b'\n' if attribute_mode => scratch.push(b' '),
            _ => scratch.push(b),
        }
    }
}

/// One parsed attribute. `name`/`local` are owned copies — the Reader's
/// window is not stable for the lifetime of one `element_start`'s attribute
/// list (a long attribute value can force a buffer rebase partway through),
/// so names are copied out the moment they're seen rather than kept as
/// ranges into it. `raw_value`/`value` index the Reader's own per-node
/// scratch buffers, which are stable for that reason; `ns_uri` indexes the
/// namespace string arena.
#[derive(Debug, Clone)]
pub struct AttributeEntry {
    pub name: Vec<u8>,
    pub local: Vec<u8>,
    pub raw_value: Range<usize>,
    pub value: Range<usize>,
    pub ns_uri: Option<Range<usize>>,
    pub location: Position,
}

/// Per-element attribute index (SPEC_FULL §3): an ordered list plus a
/// `(ns-uri, local)` lookup populated only in namespace mode. Cleared (not
/// dropped) on each new `element_start` so its `Vec` capacity is reused.
#[derive(Debug, Default)]
pub struct AttributeTable {
    entries: Vec<AttributeEntry>,
}

impl AttributeTable {
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn push(&mut self, entry: AttributeEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<&AttributeEntry> {
        self.entries.get(i)
    }

    /// Sets the resolved namespace URI for entry `i`, populated lazily once
    /// all `xmlns` declarations on the same start tag have been bound.
    pub fn set_ns_uri(&mut self, i: usize, ns_uri: Option<Range<usize>>) {
        if let Some(e) = self.entries.get_mut(i) {
            e.ns_uri = ns_uri;
        }
    }

    /// Finds an existing attribute whose raw name bytes equal `name`.
    pub fn index_of_name(&self, name: &[u8]) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }

    /// Finds an existing attribute by `(namespace uri, local name)`,
    /// comparing URIs against `arena`.
    pub fn index_of_ns(&self, ns_uri: &[u8], local: &[u8], arena: &[u8]) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.local == local && e.ns_uri.as_ref().map(|r| &arena[r.clone()]) == Some(ns_uri))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predefined_entities_resolve() {
        assert_eq!(resolve_predefined_entity(b"amp"), Some('&'));
        assert_eq!(resolve_predefined_entity(b"bogus"), None);
    }

    #[test]
    fn attribute_mode_folds_whitespace_to_space() {
        let mut scratch = Vec::new();
        let mut pending_cr = false;
        append_normalized(&mut scratch, b"a\tb\nc\r\nd", &mut pending_cr, true);
        assert_eq!(scratch, b"a b c d");
    }

    #[test]
    fn text_mode_folds_only_line_endings() {
        let mut scratch = Vec::new();
        let mut pending_cr = false;
        append_normalized(&mut scratch, b"a\tb\r\nc\rd", &mut pending_cr, false);
        assert_eq!(scratch, b"a\tb\nc\nd");
    }

    #[test]
    fn split_crlf_across_fragments_folds_once() {
        let mut scratch = Vec::new();
        let mut pending_cr = false;
        append_normalized(&mut scratch, b"a\r", &mut pending_cr, false);
        append_normalized(&mut scratch, b"\nb", &mut pending_cr, false);
        assert_eq!(scratch, b"a\nb");
    }
}
