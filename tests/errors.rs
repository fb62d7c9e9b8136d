use xmlscan::{ErrorCode, Node, Reader};

#[test]
fn error_location_points_at_the_offending_line() {
    let mut r = Reader::from_str("<a>\n<b></c></a>").unwrap();
    assert_eq!(r.read().unwrap(), Node::ElementStart);
    assert_eq!(r.read().unwrap(), Node::Text);
    assert_eq!(r.read().unwrap(), Node::ElementStart);
    let err = r.read().unwrap_err();
    let (line, _) = r.error_location().unwrap();
    assert_eq!(line, 2);
    assert_eq!(err.code(), Some(ErrorCode::ElementEndMismatched));
}

#[test]
fn error_is_latched_and_replays_identically() {
    let mut r = Reader::from_str("<a><b></a>").unwrap();
    r.read().unwrap();
    r.read().unwrap();
    let first = r.read().unwrap_err();
    let second = r.read().unwrap_err();
    assert_eq!(first.code(), second.code());
    assert_eq!(r.error_code(), first.code());
}

#[test]
fn truncated_document_is_unexpected_eof() {
    let mut r = Reader::from_str("<a><b>").unwrap();
    r.read().unwrap();
    r.read().unwrap();
    let err = r.read().unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::ElementUnclosed));
}

#[test]
fn truncated_mid_tag_is_a_syntax_error() {
    let mut r = Reader::from_str("<a ").unwrap();
    let err = r.read().unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::UnexpectedEndOfInput));
}

#[test]
fn element_name_starting_with_a_digit_is_name_malformed() {
    let mut r = Reader::from_str("<root>\n  <123>x</123>").unwrap();
    assert_eq!(r.read().unwrap(), Node::ElementStart);
    assert_eq!(r.read().unwrap(), Node::Text);
    let err = r.read().unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::NameMalformed));
    assert_eq!(r.error_location(), Some((2, 4)));
}

#[test]
fn location_tracking_can_be_disabled() {
    let mut r = Reader::from_str("<a/>").unwrap();
    r.config_mut().location_aware = false;
    assert_eq!(r.location(), None);
    assert_eq!(r.read().unwrap(), Node::ElementStart);
    assert_eq!(r.attribute_location(0), None);
}
