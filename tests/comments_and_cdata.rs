use xmlscan::{Node, Reader};

#[test]
fn comment_exposes_normalized_and_raw_forms() {
    let mut r = Reader::from_str("<a><!-- note --></a>").unwrap();
    assert_eq!(r.read().unwrap(), Node::ElementStart);
    assert_eq!(r.read().unwrap(), Node::Comment);
    assert_eq!(r.comment(), b" note ");
    assert_eq!(r.comment_raw(), b" note ");
}

#[test]
fn cdata_section_text_is_not_entity_expanded() {
    let mut r = Reader::from_str("<a><![CDATA[<not-a-tag> & raw]]></a>").unwrap();
    assert_eq!(r.read().unwrap(), Node::ElementStart);
    assert_eq!(r.read().unwrap(), Node::CData);
    assert_eq!(r.cdata(), b"<not-a-tag> & raw");
}

#[test]
fn adjacent_text_and_cdata_runs_are_reported_separately() {
    let mut r = Reader::from_str("<a>one<![CDATA[two]]>three</a>").unwrap();
    assert_eq!(r.read().unwrap(), Node::ElementStart);
    assert_eq!(r.read().unwrap(), Node::Text);
    assert_eq!(r.text(), b"one");
    assert_eq!(r.read().unwrap(), Node::CData);
    assert_eq!(r.cdata(), b"two");
    assert_eq!(r.read().unwrap(), Node::Text);
    assert_eq!(r.text(), b"three");
}

#[test]
fn literal_cdata_close_sequence_in_ordinary_text_is_illegal() {
    let mut r = Reader::from_str("<a>oops]]>done</a>").unwrap();
    assert_eq!(r.read().unwrap(), Node::ElementStart);
    assert!(r.read().is_err());
}

#[test]
fn unclosed_comment_is_a_syntax_error() {
    let mut r = Reader::from_str("<a><!-- unterminated</a>").unwrap();
    assert_eq!(r.read().unwrap(), Node::ElementStart);
    assert!(r.read().is_err());
}
