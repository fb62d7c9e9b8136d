use xmlscan::{Node, Reader};

#[test]
fn deeply_nested_elements_round_trip() {
    let mut r = Reader::from_str("<a><b><c></c></b></a>").unwrap();
    for name in ["a", "b", "c"] {
        assert_eq!(r.read().unwrap(), Node::ElementStart);
        assert_eq!(r.element_name(), name.as_bytes());
    }
    for name in ["c", "b", "a"] {
        assert_eq!(r.read().unwrap(), Node::ElementEnd);
        assert_eq!(r.element_name(), name.as_bytes());
    }
    assert_eq!(r.read().unwrap(), Node::Eof);
}

#[test]
fn attribute_lookup_by_name() {
    let mut r = Reader::from_str("<a id=\"7\" class=\"big\"/>").unwrap();
    assert_eq!(r.read().unwrap(), Node::ElementStart);
    assert_eq!(r.attribute_index(b"class"), Some(1));
    assert_eq!(r.attribute_value(1), Some(&b"big"[..]));
    assert_eq!(r.attribute_index(b"missing"), None);
}

#[test]
fn attribute_whitespace_is_normalized_to_spaces() {
    let mut r = Reader::from_str("<a v=\"one\ttwo\nthree\"/>").unwrap();
    assert_eq!(r.read().unwrap(), Node::ElementStart);
    assert_eq!(r.attribute_value(0), Some(&b"one two three"[..]));
}

#[test]
fn attribute_location_points_at_the_attribute() {
    let mut r = Reader::from_str("<a\n  id=\"1\"/>").unwrap();
    assert_eq!(r.read().unwrap(), Node::ElementStart);
    let (line, _) = r.attribute_location(0).unwrap();
    assert_eq!(line, 2);
}

#[test]
fn attributes_are_cleared_between_sibling_elements() {
    let mut r = Reader::from_str("<a x=\"1\"/><b/>").unwrap();
    assert_eq!(r.read().unwrap(), Node::ElementStart);
    assert_eq!(r.attribute_count(), 1);
    assert_eq!(r.read().unwrap(), Node::ElementEnd);
    assert_eq!(r.read().unwrap(), Node::ElementStart);
    assert_eq!(r.attribute_count(), 0);
}

#[test]
fn mismatched_nesting_is_rejected() {
    let mut r = Reader::from_str("<a><b></a></b>").unwrap();
    assert_eq!(r.read().unwrap(), Node::ElementStart);
    assert_eq!(r.read().unwrap(), Node::ElementStart);
    assert!(r.read().is_err());
}

#[test]
fn skip_element_skips_an_entire_subtree() {
    let mut r = Reader::from_str("<a><skip><x/><y/></skip><keep/></a>").unwrap();
    assert_eq!(r.read().unwrap(), Node::ElementStart); // a
    assert_eq!(r.read().unwrap(), Node::ElementStart); // skip
    r.skip_element().unwrap();
    assert_eq!(r.read().unwrap(), Node::ElementStart); // keep
    assert_eq!(r.element_name(), b"keep");
}
