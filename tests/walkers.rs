use xmlscan::Reader;

#[test]
fn read_element_text_flattens_nested_markup() {
    let mut r = Reader::from_str("<a>before <b>inner</b> &amp; after<!--skip me--></a>").unwrap();
    r.read().unwrap(); // ElementStart a
    let text = r.read_element_text().unwrap();
    assert_eq!(text, b"before inner & after");
}

#[test]
fn read_element_text_on_an_empty_element_returns_nothing() {
    let mut r = Reader::from_str("<a></a>").unwrap();
    r.read().unwrap();
    let text = r.read_element_text().unwrap();
    assert_eq!(text, b"");
}

#[test]
fn skip_document_consumes_everything_through_eof() {
    let mut r = Reader::from_str("<?xml version=\"1.0\"?><a><b/></a><!--tail-->").unwrap();
    r.skip_document().unwrap();
}

#[test]
fn skip_element_then_continuing_to_read_siblings() {
    let mut r = Reader::from_str("<root><a><deep/></a><b/></root>").unwrap();
    r.read().unwrap(); // root
    r.read().unwrap(); // a
    r.skip_element().unwrap();
    let node = r.read().unwrap();
    assert_eq!(node, xmlscan::Node::ElementStart);
    assert_eq!(r.element_name(), b"b");
}
