//! Qualified-name splitting (SPEC_FULL.md §4.3, "Namespace-aware").
//!
//! Grounded on the prefix/local splitting logic inside the teacher's
//! `NamespaceResolver::resolve` (`src/name.rs`).

use crate::chars::{is_ncname_char, is_ncname_start_char};

/// Splits a qualified name into `(prefix, local)` at the first `:`. A name
/// with no `:` has an empty prefix (the default namespace applies).
pub fn split_qname(name: &[u8]) -> (&[u8], &[u8]) {
    match name.iter().position(|&b| b == b':') {
        Some(i) => (&name[..i], &name[i + 1..]),
        None => (&name[..0], name),
    }
}

/// A name is malformed for namespace purposes if it contains more than one
/// `:` (SPEC_FULL §4.3: "both halves must satisfy `NCName`").
pub fn has_at_most_one_colon(name: &[u8]) -> bool {
    name.iter().filter(|&&b| b == b':').count() <= 1
}

/// Checks that `bytes` is a non-empty `NCName`: the well-formedness rule
/// applied to each half of a qualified name once it's been split at `:`
/// (SPEC_FULL §4.3 / §6.4). `bytes` is assumed to already be a legal XML
/// `Name` as produced by the scanner, so it's always valid UTF-8.
pub fn is_ncname(bytes: &[u8]) -> bool {
    let mut chars = std::str::from_utf8(bytes).expect("scanner guarantees a legal Name").chars();
    match chars.next() {
        Some(c) => is_ncname_start_char(c) && chars.all(is_ncname_char),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_at_first_colon() {
        assert_eq!(split_qname(b"foo:bar"), (&b"foo"[..], &b"bar"[..]));
    }

    #[test]
    fn no_colon_means_empty_prefix() {
        assert_eq!(split_qname(b"bar"), (&b""[..], &b"bar"[..]));
    }

    #[test]
    fn rejects_multiple_colons() {
        assert!(has_at_most_one_colon(b"a:b"));
        assert!(!has_at_most_one_colon(b"a:b:c"));
    }

    #[test]
    fn ncname_rejects_digit_start_and_empty() {
        assert!(is_ncname(b"item"));
        assert!(!is_ncname(b"1tem"));
        assert!(!is_ncname(b""));
        assert!(!is_ncname(b"a:b"));
    }
}
