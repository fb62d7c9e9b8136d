use xmlscan::{Node, Reader};

#[test]
fn default_namespace_applies_to_element_but_not_attributes() {
    let mut r = Reader::from_str("<a xmlns=\"urn:d\" x=\"1\"/>").unwrap();
    assert_eq!(r.read().unwrap(), Node::ElementStart);
    let (prefix, ns, local) = r.element_name_ns();
    assert_eq!(prefix, b"");
    assert_eq!(ns, b"urn:d");
    assert_eq!(local, b"a");
    let (aprefix, ans, alocal) = r.attribute_name_ns(1).unwrap();
    assert_eq!(aprefix, b"");
    assert_eq!(ans, b""); // unprefixed attributes are never namespaced
    assert_eq!(alocal, b"x");
}

#[test]
fn nested_scope_shadows_then_restores_outer_binding() {
    let mut r = Reader::from_str("<a xmlns:p=\"urn:outer\"><b xmlns:p=\"urn:inner\"/>after</a>").unwrap();
    assert_eq!(r.read().unwrap(), Node::ElementStart); // a
    assert_eq!(r.read().unwrap(), Node::ElementStart); // b
    assert_eq!(r.namespace_uri(b"p"), b"urn:inner");
    assert_eq!(r.read().unwrap(), Node::ElementEnd); // /b
    assert_eq!(r.namespace_uri(b"p"), b"urn:outer");
}

#[test]
fn xml_prefix_is_bound_without_any_declaration() {
    let mut r = Reader::from_str("<a xml:lang=\"en\"/>").unwrap();
    assert_eq!(r.read().unwrap(), Node::ElementStart);
    let (prefix, ns, local) = r.attribute_name_ns(0).unwrap();
    assert_eq!(prefix, b"xml");
    assert_eq!(ns, b"http://www.w3.org/XML/1998/namespace");
    assert_eq!(local, b"lang");
}

#[test]
fn rebinding_xml_prefix_to_another_uri_is_illegal() {
    let mut r = Reader::from_str("<a xmlns:xml=\"urn:wrong\"/>").unwrap();
    assert!(r.read().is_err());
}

#[test]
fn binding_a_prefix_to_the_xml_uri_is_illegal() {
    let mut r = Reader::from_str("<a xmlns:p=\"http://www.w3.org/XML/1998/namespace\"/>").unwrap();
    assert!(r.read().is_err());
}

#[test]
fn duplicate_attribute_via_two_prefixes_same_uri_is_rejected() {
    let mut r = Reader::from_str("<a xmlns:p=\"urn:x\" xmlns:q=\"urn:x\" p:v=\"1\" q:v=\"2\"/>").unwrap();
    assert!(r.read().is_err());
}

#[test]
fn namespace_unaware_mode_skips_prefix_resolution() {
    let mut r = Reader::from_str("<p:a unbound:x=\"1\"/>").unwrap();
    r.config_mut().namespace_aware = false;
    assert_eq!(r.read().unwrap(), Node::ElementStart);
    assert_eq!(r.element_name(), b"p:a");
}
