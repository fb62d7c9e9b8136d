//! Layer B: the windowed, node-oriented pull reader (SPEC_FULL.md §4.3).
//!
//! Grounded on `reader/state.rs`'s `ReaderState` (offset tracking, the
//! `opened_buffer`/`opened_starts` name arena that directly models
//! SPEC_FULL's "string interner for the element stack") and
//! `reader/buffered_reader.rs`'s `read_event_impl` shift/fill/dispatch loop.
//! Unlike the teacher, this Reader keeps its own owned `Vec<u8>` mirror of
//! the current window rather than holding a borrow from `Source::fill`
//! across the several other `self` fields a single `read()` call may touch
//! (the element stack, the attribute table, the scratch buffers) — a small
//! per-window copy traded for not fighting the borrow checker over a
//! self-referential buffer.

mod attributes;
mod namespace;

use std::io;
use std::io::Read;
use std::ops::Range;

use attributes::append_normalized;
pub use attributes::{resolve_predefined_entity, AttributeEntry, AttributeTable};
pub use namespace::NamespaceScopes;

use crate::chars::{is_enc_name_char, is_enc_name_start, is_xml_char};
use crate::error::{Error, ErrorCode, IllFormedError, Position, Result, SyntaxError};
use crate::name::{has_at_most_one_colon, is_ncname, split_qname};
use crate::scanner::{CannotReset, ContentFragment, Scanner, Token};
use crate::source::{ReaderSource, SliceSource, Source};

const XML_NS: &[u8] = b"http://www.w3.org/XML/1998/namespace";
const XMLNS_NS: &[u8] = b"http://www.w3.org/2000/xmlns/";

/// What the cursor currently points at (SPEC_FULL §3 "Node kind"). Carries
/// no data itself — each kind's fields are reached through a family of
/// accessor methods on [`Reader`], matching the teacher's `Event`-by-method
/// rather than `Event`-by-payload style for borrowed content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
    Eof,
    XmlDeclaration,
    ElementStart,
    ElementEnd,
    Comment,
    Pi,
    Text,
    CData,
    EntityReference,
    CharacterReference,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Start,
    InRoot,
    AfterRoot,
    Eof,
}

/// `Reader::config_mut()` builder target (SPEC_FULL §6.3/§8), in place of
/// loose constructor booleans — the teacher's own `Config`/`config_mut()`
/// shape.
#[derive(Debug, Clone)]
pub struct ParserConfig {
    pub namespace_aware: bool,
    pub location_aware: bool,
    pub assume_valid_utf8: bool,
    pub initial_window: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig {
            namespace_aware: true,
            location_aware: true,
            assume_valid_utf8: false,
            initial_window: 4096,
        }
    }
}

/// An attribute mid-assembly: its name is already known, its value is
/// still accumulating into `scratch`/`raw_scratch`.
struct AttrBuilding {
    name: Vec<u8>,
    raw_start: usize,
    value_start: usize,
    location: Position,
}

fn push_arena(arena: &mut Vec<u8>, bytes: &[u8]) -> Range<usize> {
    let start = arena.len();
    arena.extend_from_slice(bytes);
    start..arena.len()
}

fn contains_cdata_close(bytes: &[u8]) -> bool {
    let mut rest = bytes;
    while let Some(i) = memchr::memchr(b']', rest) {
        if rest[i..].starts_with(b"]]>") {
            return true;
        }
        rest = &rest[i + 1..];
    }
    false
}

/// Layer B. Drives a [`Scanner`] through a [`Source`]'s window, tracking
/// the element stack, namespace scopes, and attribute indices, and
/// enforcing the well-formedness rules the scanner cannot check alone.
pub struct Reader<S> {
    source: S,
    config: ParserConfig,
    scanner: Scanner,

    buf: Vec<u8>,
    pos: usize,
    want: usize,

    line: u32,
    col: u32,
    cur_pos: Position,

    phase: Phase,
    seen_xml_decl: bool,
    pending_empty_end: bool,
    pending_token: Option<Token>,

    arena: Vec<u8>,
    element_names: Vec<Range<usize>>,
    namespaces: NamespaceScopes,
    attrs: AttributeTable,
    assembling_start: bool,
    attr_building: Option<AttrBuilding>,

    scratch: Vec<u8>,
    raw_scratch: Vec<u8>,
    pending_cr: bool,
    leaf_dirty: bool,

    cur_element_name: Vec<u8>,
    cur_xml_version: Vec<u8>,
    cur_xml_encoding: Option<Vec<u8>>,
    cur_xml_standalone: Option<bool>,
    cur_text: Range<usize>,
    cur_text_raw: Range<usize>,
    cur_is_cdata: bool,
    cur_pi_target: Vec<u8>,
    cur_entity_name: Vec<u8>,
    cur_char_ref: char,

    latched: Option<(Option<ErrorCode>, Option<Position>)>,
}

impl<'a> Reader<SliceSource<'a>> {
    /// Reads from a static in-memory string (SPEC_FULL §4.1 "Static source").
    pub fn from_str(s: &'a str) -> Result<Self> {
        Reader::new(SliceSource::new(s.as_bytes()), ParserConfig::default())
    }
}

impl<R: Read> Reader<ReaderSource<R>> {
    /// Reads from an arbitrary byte stream, transcoding UTF-16 on the fly
    /// (SPEC_FULL §4.1 "Streaming source").
    pub fn from_reader(r: R) -> Result<Self> {
        Reader::new(ReaderSource::new(r), ParserConfig::default())
    }
}

impl<S: Source> Reader<S> {
    pub fn new(source: S, config: ParserConfig) -> Result<Self> {
        let mut r = Reader {
            source,
            config,
            scanner: Scanner::new(),
            buf: Vec::new(),
            pos: 0,
            want: 0,
            line: 1,
            col: 1,
            cur_pos: Position::START,
            phase: Phase::Start,
            seen_xml_decl: false,
            pending_empty_end: false,
            pending_token: None,
            arena: Vec::new(),
            element_names: Vec::new(),
            namespaces: NamespaceScopes::new(),
            attrs: AttributeTable::default(),
            assembling_start: false,
            attr_building: None,
            scratch: Vec::new(),
            raw_scratch: Vec::new(),
            pending_cr: false,
            leaf_dirty: false,
            cur_element_name: Vec::new(),
            cur_xml_version: Vec::new(),
            cur_xml_encoding: None,
            cur_xml_standalone: None,
            cur_text: 0..0,
            cur_text_raw: 0..0,
            cur_is_cdata: false,
            cur_pi_target: Vec::new(),
            cur_entity_name: Vec::new(),
            cur_char_ref: '\0',
            latched: None,
        };
        r.bind_permanent_namespaces();
        r.strip_bom()?;
        Ok(r)
    }

    fn bind_permanent_namespaces(&mut self) {
        let xml_prefix = push_arena(&mut self.arena, b"xml");
        let xml_uri = push_arena(&mut self.arena, XML_NS);
        self.namespaces.bind_permanent(xml_prefix, xml_uri);
        let xmlns_prefix = push_arena(&mut self.arena, b"xmlns");
        let xmlns_uri = push_arena(&mut self.arena, XMLNS_NS);
        self.namespaces.bind_permanent(xmlns_prefix, xmlns_uri);
    }

    /// Strips an optional UTF-8 BOM before the scanner ever sees a byte
    /// (SPEC_FULL §4.3 step 2). A UTF-16 BOM is handled earlier, inside
    /// [`ReaderSource`] itself, since it determines framing rather than
    /// just being skipped.
    fn strip_bom(&mut self) -> Result<()> {
        let peek = self.source.fill(0, 3)?.to_vec();
        let bom_len = if peek.starts_with(&[0xEF, 0xBB, 0xBF]) { 3 } else { 0 };
        let want = self.config.initial_window.max(1);
        let window = self.source.fill(bom_len, want)?.to_vec();
        self.buf = window;
        self.pos = 0;
        self.want = want;
        Ok(())
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Edits take effect immediately but are only meaningful before the
    /// first `read()` — most fields (e.g. `initial_window`) only matter at
    /// construction time.
    pub fn config_mut(&mut self) -> &mut ParserConfig {
        &mut self.config
    }

    pub fn location(&self) -> Option<(u32, u32)> {
        self.config.location_aware.then_some((self.line, self.col))
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        self.latched.and_then(|(code, _)| code)
    }

    pub fn error_location(&self) -> Option<(u32, u32)> {
        self.latched.and_then(|(_, pos)| pos).map(|p| (p.line, p.column))
    }

    fn syntax_err(&self, e: SyntaxError) -> Error {
        Error::Syntax(e, self.cur_pos)
    }

    fn illformed_err(&self, e: IllFormedError) -> Error {
        Error::IllFormed(e, self.cur_pos)
    }

    /// SPEC_FULL §4.3 "Pull protocol": returns `malformed_xml` unconditionally
    /// after the first fatal error (the "Latched error" GLOSSARY entry).
    pub fn read(&mut self) -> Result<Node> {
        if let Some((code, pos)) = self.latched {
            return Err(Error::Latched(code, pos));
        }
        match self.do_read() {
            Ok(node) => Ok(node),
            Err(e) => {
                self.latched = Some((e.code(), e.position()));
                Err(e)
            }
        }
    }

    fn do_read(&mut self) -> Result<Node> {
        if self.pending_empty_end {
            self.pending_empty_end = false;
            return self.finish_element_end(None);
        }
        loop {
            let tok = match self.pending_token.take() {
                Some(t) => t,
                None => match self.next_token()? {
                    Some(t) => t,
                    None => return self.handle_eof(),
                },
            };
            if let Some(node) = self.dispatch(tok)? {
                return Ok(node);
            }
        }
    }

    fn handle_eof(&mut self) -> Result<Node> {
        if self.phase == Phase::Eof {
            return Ok(Node::Eof);
        }
        self.scanner.end_input().map_err(|e| self.syntax_err(e))?;
        if let Some(top) = self.element_names.last() {
            let name = String::from_utf8_lossy(&self.arena[top.clone()]).into_owned();
            return Err(self.illformed_err(IllFormedError::UnclosedElement(name)));
        }
        self.phase = Phase::Eof;
        Ok(Node::Eof)
    }

    fn advance_position(&mut self, ch: char) {
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>> {
        loop {
            match self.next_char()? {
                None => return Ok(None),
                Some((ch, len)) => {
                    self.cur_pos = Position { line: self.line, column: self.col };
                    let tok = self.scanner.feed(ch, len).map_err(|e| Error::Syntax(e, self.cur_pos))?;
                    self.pos += len;
                    self.advance_position(ch);
                    if !matches!(tok, Token::Ok) {
                        return Ok(Some(tok));
                    }
                }
            }
        }
    }

    /// Decodes the next codepoint from `self.buf[self.pos..]`, growing the
    /// window as needed. Returns `None` only at genuine end of document.
    fn next_char(&mut self) -> Result<Option<(char, usize)>> {
        loop {
            if self.pos >= self.buf.len() {
                if !self.grow()? {
                    return Ok(None);
                }
                continue;
            }
            match std::str::from_utf8(&self.buf[self.pos..]) {
                Ok(s) => {
                    let ch = s.chars().next().expect("non-empty slice yields a char");
                    return Ok(Some((ch, ch.len_utf8())));
                }
                Err(e) => {
                    let valid_up_to = e.valid_up_to();
                    if valid_up_to > 0 {
                        let s = std::str::from_utf8(&self.buf[self.pos..self.pos + valid_up_to])
                            .expect("validated prefix");
                        let ch = s.chars().next().expect("non-empty validated prefix");
                        return Ok(Some((ch, ch.len_utf8())));
                    }
                    match e.error_len() {
                        Some(_) => {
                            if self.config.assume_valid_utf8 {
                                return Ok(Some(('\u{FFFD}', 1)));
                            }
                            return Err(self.illformed_err(IllFormedError::InvalidEncoding));
                        }
                        None => {
                            if !self.grow()? {
                                if self.config.assume_valid_utf8 {
                                    return Ok(Some(('\u{FFFD}', 1)));
                                }
                                return Err(self.illformed_err(IllFormedError::InvalidEncoding));
                            }
                        }
                    }
                }
            }
        }
    }

    /// Grows the window, rebasing through the scanner when it's safe to
    /// (SPEC_FULL §4.2 `reset_pos`) or doubling it in place otherwise.
    /// Returns whether any further bytes became available.
    fn grow(&mut self) -> Result<bool> {
        match self.scanner.reset_pos() {
            Ok(tok_opt) => {
                if let Some(tok) = tok_opt {
                    self.accumulate_partial(tok);
                }
                let want = self.config.initial_window.max(1);
                let window = self.source.fill(self.pos, want)?.to_vec();
                let progressed = !window.is_empty();
                self.buf = window;
                self.pos = 0;
                self.want = want;
                Ok(progressed)
            }
            Err(CannotReset) => {
                let new_want = (self.want.max(self.config.initial_window.max(1))) * 2;
                let window = self.source.fill(0, new_want)?.to_vec();
                let progressed = window.len() > self.buf.len();
                self.buf = window;
                self.want = new_want;
                Ok(progressed)
            }
        }
    }

    /// Folds a partial content token forced out by `reset_pos` into
    /// whatever is currently accumulating, without finalizing a node.
    fn accumulate_partial(&mut self, tok: Token) {
        match tok {
            Token::CommentContent { content, .. } | Token::PiContent { content, .. } => {
                self.begin_leaf_if_needed();
                self.append_text_fragment(content, false);
            }
            Token::ElementContent { content: ContentFragment::Text(r) } => {
                self.begin_leaf_if_needed();
                self.append_text_fragment(r, false);
            }
            Token::AttributeContent { content: ContentFragment::Text(r), .. } => {
                self.append_text_fragment(r, true);
            }
            _ => {}
        }
    }

    fn begin_leaf_if_needed(&mut self) {
        if !self.leaf_dirty {
            self.scratch.clear();
            self.raw_scratch.clear();
            self.pending_cr = false;
            self.leaf_dirty = true;
        }
    }

    fn append_text_fragment(&mut self, r: Range<usize>, attribute_mode: bool) {
        let bytes = self.buf[r].to_vec();
        self.raw_scratch.extend_from_slice(&bytes);
        append_normalized(&mut self.scratch, &bytes, &mut self.pending_cr, attribute_mode);
    }

    fn dispatch(&mut self, tok: Token) -> Result<Option<Node>> {
        if self.assembling_start {
            return self.dispatch_in_tag(tok);
        }
        match tok {
            Token::XmlDeclaration { version, encoding, standalone } => {
                self.handle_xml_declaration(version, encoding, standalone).map(Some)
            }
            Token::DoctypeStart => Err(self.illformed_err(IllFormedError::DoctypeUnsupported)),
            Token::ElementStart { name } => self.begin_element_start(name).map(|()| None),
            Token::ElementEnd { name } => self.finish_element_end(Some(name)).map(Some),
            Token::ElementEndEmpty => unreachable!("ElementEndEmpty without an open start tag"),
            Token::CommentStart => {
                self.scratch.clear();
                self.raw_scratch.clear();
                self.pending_cr = false;
                self.leaf_dirty = false;
                Ok(None)
            }
            Token::CommentContent { content, is_final } => {
                if !is_final {
                    self.begin_leaf_if_needed();
                    self.append_text_fragment(content, false);
                    return Ok(None);
                }
                if !self.leaf_dirty {
                    self.scratch.clear();
                    self.raw_scratch.clear();
                    self.pending_cr = false;
                }
                self.append_text_fragment(content, false);
                self.leaf_dirty = false;
                self.cur_text = 0..self.scratch.len();
                self.cur_text_raw = 0..self.raw_scratch.len();
                Ok(Some(Node::Comment))
            }
            Token::PiStart { target } => self.begin_pi(target).map(|()| None),
            Token::PiContent { content, is_final } => {
                if !is_final {
                    self.begin_leaf_if_needed();
                    self.append_text_fragment(content, false);
                    return Ok(None);
                }
                if !self.leaf_dirty {
                    self.scratch.clear();
                    self.raw_scratch.clear();
                    self.pending_cr = false;
                }
                self.append_text_fragment(content, false);
                self.leaf_dirty = false;
                self.cur_text = 0..self.scratch.len();
                self.cur_text_raw = 0..self.raw_scratch.len();
                Ok(Some(Node::Pi))
            }
            Token::ElementContent { content } => self.handle_element_content(content).map(Some),
            Token::AttributeStart { .. } | Token::AttributeContent { .. } => {
                unreachable!("attribute tokens outside tag assembly")
            }
            Token::Ok => unreachable!("Token::Ok is filtered out by next_token"),
        }
    }

    fn dispatch_in_tag(&mut self, tok: Token) -> Result<Option<Node>> {
        match tok {
            Token::AttributeStart { name } => {
                let name_bytes = self.buf[name].to_vec();
                self.attr_building = Some(AttrBuilding {
                    name: name_bytes,
                    raw_start: self.raw_scratch.len(),
                    value_start: self.scratch.len(),
                    location: self.cur_pos,
                });
                self.pending_cr = false;
                Ok(None)
            }
            Token::AttributeContent { content, is_final } => {
                self.handle_attribute_content(content)?;
                if is_final {
                    self.finish_attribute()?;
                }
                Ok(None)
            }
            Token::ElementEndEmpty => {
                self.finalize_element_start()?;
                self.assembling_start = false;
                self.pending_empty_end = true;
                Ok(Some(Node::ElementStart))
            }
            other => {
                self.finalize_element_start()?;
                self.assembling_start = false;
                self.pending_token = Some(other);
                Ok(Some(Node::ElementStart))
            }
        }
    }

    fn begin_element_start(&mut self, name: Range<usize>) -> Result<()> {
        if self.phase == Phase::AfterRoot {
            return Err(self.illformed_err(IllFormedError::MultipleRootElements));
        }
        self.cur_element_name = self.buf[name].to_vec();
        self.attrs.clear();
        self.scratch.clear();
        self.raw_scratch.clear();
        self.pending_cr = false;
        self.assembling_start = true;
        Ok(())
    }

    fn begin_pi(&mut self, target: Range<usize>) -> Result<()> {
        let target_bytes = self.buf[target].to_vec();
        if target_bytes.eq_ignore_ascii_case(b"xml") {
            return Err(self.illformed_err(IllFormedError::PiTargetDisallowed));
        }
        if self.config.namespace_aware && target_bytes.contains(&b':') {
            return Err(self.illformed_err(IllFormedError::PiTargetDisallowed));
        }
        self.cur_pi_target = target_bytes;
        self.scratch.clear();
        self.raw_scratch.clear();
        self.pending_cr = false;
        self.leaf_dirty = false;
        Ok(())
    }

    fn handle_element_content(&mut self, content: ContentFragment) -> Result<Node> {
        match content {
            ContentFragment::Text(r) => {
                let is_cdata = self.scanner.last_content_was_cdata();
                if !self.leaf_dirty {
                    self.scratch.clear();
                    self.raw_scratch.clear();
                    self.pending_cr = false;
                }
                self.append_text_fragment(r, false);
                self.leaf_dirty = false;
                self.cur_text = 0..self.scratch.len();
                self.cur_text_raw = 0..self.raw_scratch.len();
                self.cur_is_cdata = is_cdata;
                if self.phase != Phase::InRoot {
                    return Err(self.illformed_err(IllFormedError::TextOutsideRoot));
                }
                if !is_cdata && contains_cdata_close(&self.raw_scratch) {
                    return Err(self.illformed_err(IllFormedError::TextDisallowedSequence));
                }
                Ok(if is_cdata { Node::CData } else { Node::Text })
            }
            ContentFragment::Entity(r) => {
                self.cur_entity_name = self.buf[r].to_vec();
                Ok(Node::EntityReference)
            }
            ContentFragment::Codepoint(ch) => {
                if !is_xml_char(ch as u32) {
                    return Err(self.illformed_err(IllFormedError::CharacterReferenceIllegal(ch as u32)));
                }
                self.cur_char_ref = ch;
                self.scratch.clear();
                self.scratch.extend_from_slice((ch as u32).to_string().as_bytes());
                self.cur_text = 0..self.scratch.len();
                Ok(Node::CharacterReference)
            }
        }
    }

    fn handle_attribute_content(&mut self, content: ContentFragment) -> Result<()> {
        match content {
            ContentFragment::Text(r) => self.append_text_fragment(r, true),
            ContentFragment::Entity(r) => {
                let name = self.buf[r].to_vec();
                match resolve_predefined_entity(&name) {
                    Some(ch) => {
                        let mut buf = [0u8; 4];
                        self.scratch.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
                        self.raw_scratch.push(b'&');
                        self.raw_scratch.extend_from_slice(&name);
                        self.raw_scratch.push(b';');
                    }
                    None => {
                        let name = String::from_utf8_lossy(&name).into_owned();
                        return Err(self.illformed_err(IllFormedError::EntityReferenceUndefined(name)));
                    }
                }
            }
            ContentFragment::Codepoint(ch) => {
                if !is_xml_char(ch as u32) {
                    return Err(self.illformed_err(IllFormedError::CharacterReferenceIllegal(ch as u32)));
                }
                let mut buf = [0u8; 4];
                self.scratch.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
                self.raw_scratch.extend_from_slice(format!("&#{};", ch as u32).as_bytes());
            }
        }
        Ok(())
    }

    fn finish_attribute(&mut self) -> Result<()> {
        let b = self.attr_building.take().expect("finish_attribute without a started attribute");
        let local = split_qname(&b.name).1.to_vec();
        let entry = AttributeEntry {
            name: b.name,
            local,
            raw_value: b.raw_start..self.raw_scratch.len(),
            value: b.value_start..self.scratch.len(),
            ns_uri: None,
            location: b.location,
        };
        if self.attrs.index_of_name(&entry.name).is_some() {
            let name = String::from_utf8_lossy(&entry.name).into_owned();
            return Err(self.illformed_err(IllFormedError::DuplicateAttribute(name)));
        }
        self.attrs.push(entry);
        Ok(())
    }

    /// Binds an `xmlns`/`xmlns:prefix` declaration, enforcing the fixed
    /// `xml`/`xmlns` binding rules (SPEC_FULL §4.3 "Well-formedness checks",
    /// namespace-mode bullets).
    fn bind_namespace_declaration(&mut self, prefix: &[u8], uri: &[u8]) -> Result<()> {
        if prefix == b"xmlns" {
            return Err(self.illformed_err(IllFormedError::NamespacePrefixIllegal("xmlns".into())));
        }
        if prefix == b"xml" && uri != XML_NS {
            return Err(self.illformed_err(IllFormedError::NamespaceBindingIllegal("xml".into())));
        }
        if prefix != b"xml" && uri == XML_NS {
            let uri = String::from_utf8_lossy(uri).into_owned();
            return Err(self.illformed_err(IllFormedError::NamespaceBindingIllegal(uri)));
        }
        if uri == XMLNS_NS {
            let uri = String::from_utf8_lossy(uri).into_owned();
            return Err(self.illformed_err(IllFormedError::NamespaceBindingIllegal(uri)));
        }
        if !prefix.is_empty() && uri.is_empty() {
            return Err(self.illformed_err(IllFormedError::AttributePrefixUndeclared));
        }
        let prefix_range = push_arena(&mut self.arena, prefix);
        let uri_range = push_arena(&mut self.arena, uri);
        self.namespaces.bind(prefix_range, uri_range);
        Ok(())
    }

    /// Completes an `element_start` once its attribute list is fully
    /// parsed: binds namespace declarations, resolves/validates prefixes,
    /// and pushes the element name/scope onto the persistent stacks.
    fn finalize_element_start(&mut self) -> Result<()> {
        self.namespaces.push_scope();

        if self.config.namespace_aware {
            for i in 0..self.attrs.len() {
                let e = self.attrs.get(i).expect("index in range");
                let is_default_decl = e.name == b"xmlns";
                let is_prefixed_decl = e.name.starts_with(b"xmlns:");
                if !is_default_decl && !is_prefixed_decl {
                    continue;
                }
                let prefix: Vec<u8> = if is_default_decl { Vec::new() } else { e.local.clone() };
                let uri = self.scratch[e.value.clone()].to_vec();
                self.bind_namespace_declaration(&prefix, &uri)?;
            }

            for i in 0..self.attrs.len() {
                let e = self.attrs.get(i).expect("index in range");
                let name = e.name.clone();
                if !has_at_most_one_colon(&name) {
                    return Err(self.illformed_err(IllFormedError::NameMalformed));
                }
                let (prefix, local) = split_qname(&name);
                if !is_ncname(local) || (!prefix.is_empty() && !is_ncname(prefix)) {
                    return Err(self.illformed_err(IllFormedError::NameMalformed));
                }
                if prefix.is_empty() {
                    continue;
                }
                match self.namespaces.resolve(prefix, &self.arena) {
                    Some(range) => self.attrs.set_ns_uri(i, Some(range)),
                    None => return Err(self.illformed_err(IllFormedError::AttributePrefixUndeclared)),
                }
            }

            for i in 0..self.attrs.len() {
                for j in 0..i {
                    let a = self.attrs.get(i).expect("index in range");
                    let b = self.attrs.get(j).expect("index in range");
                    let same_ns = match (&a.ns_uri, &b.ns_uri) {
                        (Some(ra), Some(rb)) => self.arena[ra.clone()] == self.arena[rb.clone()],
                        _ => false,
                    };
                    if same_ns && a.local == b.local {
                        let name = String::from_utf8_lossy(&a.name).into_owned();
                        return Err(self.illformed_err(IllFormedError::DuplicateAttribute(name)));
                    }
                }
            }
        }

        let name_range = push_arena(&mut self.arena, &self.cur_element_name);
        self.element_names.push(name_range);

        if self.config.namespace_aware {
            if !has_at_most_one_colon(&self.cur_element_name) {
                return Err(self.illformed_err(IllFormedError::NameMalformed));
            }
            let (prefix, local) = split_qname(&self.cur_element_name);
            if !is_ncname(local) || (!prefix.is_empty() && !is_ncname(prefix)) {
                return Err(self.illformed_err(IllFormedError::NameMalformed));
            }
            let prefix = prefix.to_vec();
            if prefix == b"xmlns" {
                return Err(self.illformed_err(IllFormedError::NamespacePrefixIllegal("xmlns".into())));
            }
            if !prefix.is_empty() && self.namespaces.resolve(&prefix, &self.arena).is_none() {
                let prefix = String::from_utf8_lossy(&prefix).into_owned();
                return Err(self.illformed_err(IllFormedError::NamespacePrefixUnbound(prefix)));
            }
        }

        self.phase = Phase::InRoot;
        Ok(())
    }

    /// Shared by a real `</name>` (`closing_name` is `Some`) and the
    /// synthesized end of an empty element (`None`, no name to check).
    fn finish_element_end(&mut self, closing_name: Option<Range<usize>>) -> Result<Node> {
        let top = match self.element_names.pop() {
            Some(t) => t,
            None => {
                let found = closing_name
                    .map(|r| String::from_utf8_lossy(&self.buf[r]).into_owned())
                    .unwrap_or_default();
                return Err(self.illformed_err(IllFormedError::MismatchedEndTag { expected: String::new(), found }));
            }
        };
        if let Some(r) = closing_name {
            if self.buf[r.clone()] != self.arena[top.clone()] {
                let expected = String::from_utf8_lossy(&self.arena[top.clone()]).into_owned();
                let found = String::from_utf8_lossy(&self.buf[r]).into_owned();
                return Err(self.illformed_err(IllFormedError::MismatchedEndTag { expected, found }));
            }
        }
        self.cur_element_name = self.arena[top.clone()].to_vec();
        self.namespaces.pop_scope();
        self.arena.truncate(top.start);
        if self.element_names.is_empty() {
            self.phase = Phase::AfterRoot;
        } else {
            self.scanner.resume_content();
        }
        Ok(Node::ElementEnd)
    }

    fn handle_xml_declaration(
        &mut self,
        version: Range<usize>,
        encoding: Option<Range<usize>>,
        standalone: Option<Range<usize>>,
    ) -> Result<Node> {
        let version_bytes = self.buf[version].to_vec();
        let version_ok = version_bytes.starts_with(b"1.")
            && version_bytes.len() > 2
            && version_bytes[2..].iter().all(u8::is_ascii_digit);
        if !version_ok {
            return Err(self.syntax_err(SyntaxError::XmlDeclVersionUnsupported));
        }
        self.cur_xml_version = version_bytes;

        self.cur_xml_encoding = match encoding {
            Some(r) => {
                let bytes = self.buf[r].to_vec();
                let format_ok = bytes.first().copied().map(is_enc_name_start).unwrap_or(false)
                    && bytes[1..].iter().all(|&b| is_enc_name_char(b));
                if !format_ok || !self.source.check_encoding(&bytes) {
                    let name = String::from_utf8_lossy(&bytes).into_owned();
                    return Err(self.illformed_err(IllFormedError::XmlDeclarationEncodingUnsupported(name)));
                }
                Some(bytes)
            }
            None => None,
        };

        self.cur_xml_standalone = match standalone {
            Some(r) => match &self.buf[r] {
                b"yes" => Some(true),
                b"no" => Some(false),
                _ => return Err(self.syntax_err(SyntaxError::XmlDeclStandaloneMalformed)),
            },
            None => None,
        };

        self.seen_xml_decl = true;
        Ok(Node::XmlDeclaration)
    }

    // -- Node accessors (SPEC_FULL §6.1) --------------------------------

    pub fn xml_declaration_version(&self) -> &[u8] {
        &self.cur_xml_version
    }

    pub fn xml_declaration_encoding(&self) -> Option<&[u8]> {
        self.cur_xml_encoding.as_deref()
    }

    pub fn xml_declaration_standalone(&self) -> Option<bool> {
        self.cur_xml_standalone
    }

    pub fn element_name(&self) -> &[u8] {
        &self.cur_element_name
    }

    pub fn element_name_ns(&self) -> (&[u8], &[u8], &[u8]) {
        let (prefix, local) = split_qname(&self.cur_element_name);
        let ns: &[u8] = self.namespaces.resolve(prefix, &self.arena).map(|r| &self.arena[r]).unwrap_or(&[]);
        (prefix, ns, local)
    }

    pub fn attribute_count(&self) -> usize {
        self.attrs.len()
    }

    pub fn attribute_name(&self, i: usize) -> Option<&[u8]> {
        self.attrs.get(i).map(|e| e.name.as_slice())
    }

    pub fn attribute_name_ns(&self, i: usize) -> Option<(&[u8], &[u8], &[u8])> {
        let e = self.attrs.get(i)?;
        let prefix = split_qname(&e.name).0;
        let ns: &[u8] = e.ns_uri.as_ref().map(|r| &self.arena[r.clone()]).unwrap_or(&[]);
        Some((prefix, ns, &e.local))
    }

    pub fn attribute_value(&self, i: usize) -> Option<&[u8]> {
        self.attrs.get(i).map(|e| &self.scratch[e.value.clone()])
    }

    pub fn attribute_value_raw(&self, i: usize) -> Option<&[u8]> {
        self.attrs.get(i).map(|e| &self.raw_scratch[e.raw_value.clone()])
    }

    pub fn attribute_value_alloc(&self, i: usize) -> Option<Vec<u8>> {
        self.attribute_value(i).map(|v| v.to_vec())
    }

    pub fn attribute_value_write<W: io::Write>(&self, i: usize, sink: &mut W) -> io::Result<()> {
        match self.attribute_value(i) {
            Some(v) => sink.write_all(v),
            None => Ok(()),
        }
    }

    pub fn attribute_location(&self, i: usize) -> Option<(u32, u32)> {
        if !self.config.location_aware {
            return None;
        }
        self.attrs.get(i).map(|e| (e.location.line, e.location.column))
    }

    pub fn attribute_index(&self, name: &[u8]) -> Option<usize> {
        self.attrs.index_of_name(name)
    }

    pub fn attribute_index_ns(&self, ns_uri: &[u8], local: &[u8]) -> Option<usize> {
        self.attrs.index_of_ns(ns_uri, local, &self.arena)
    }

    pub fn comment(&self) -> &[u8] {
        &self.scratch[self.cur_text.clone()]
    }

    pub fn comment_raw(&self) -> &[u8] {
        &self.raw_scratch[self.cur_text_raw.clone()]
    }

    pub fn comment_alloc(&self) -> Vec<u8> {
        self.comment().to_vec()
    }

    pub fn comment_write<W: io::Write>(&self, sink: &mut W) -> io::Result<()> {
        sink.write_all(self.comment())
    }

    pub fn pi_target(&self) -> &[u8] {
        &self.cur_pi_target
    }

    pub fn pi_content(&self) -> &[u8] {
        &self.scratch[self.cur_text.clone()]
    }

    pub fn pi_content_raw(&self) -> &[u8] {
        &self.raw_scratch[self.cur_text_raw.clone()]
    }

    pub fn pi_content_alloc(&self) -> Vec<u8> {
        self.pi_content().to_vec()
    }

    pub fn pi_content_write<W: io::Write>(&self, sink: &mut W) -> io::Result<()> {
        sink.write_all(self.pi_content())
    }

    pub fn text(&self) -> &[u8] {
        &self.scratch[self.cur_text.clone()]
    }

    pub fn text_raw(&self) -> &[u8] {
        &self.raw_scratch[self.cur_text_raw.clone()]
    }

    pub fn text_alloc(&self) -> Vec<u8> {
        self.text().to_vec()
    }

    pub fn text_write<W: io::Write>(&self, sink: &mut W) -> io::Result<()> {
        sink.write_all(self.text())
    }

    /// `cdata*` is the same storage as `text*`: a CDATA section's body is
    /// reported through `Node::CData` purely to tell the caller it skipped
    /// entity expansion, not because it lives anywhere different.
    pub fn cdata(&self) -> &[u8] {
        debug_assert!(self.cur_is_cdata);
        self.text()
    }

    pub fn cdata_raw(&self) -> &[u8] {
        self.text_raw()
    }

    pub fn cdata_alloc(&self) -> Vec<u8> {
        self.text_alloc()
    }

    pub fn cdata_write<W: io::Write>(&self, sink: &mut W) -> io::Result<()> {
        self.text_write(sink)
    }

    pub fn entity_reference_name(&self) -> &[u8] {
        &self.cur_entity_name
    }

    pub fn character_reference_char(&self) -> char {
        self.cur_char_ref
    }

    /// The decimal digits of the resolved codepoint. The scanner resolves
    /// a character reference to its `char` value without keeping the byte
    /// range of the digits as written (SPEC_FULL §4.2's `Token` carries no
    /// such range), so a hex reference like `&#x41;` round-trips here as
    /// `"65"` rather than `"x41"`.
    pub fn character_reference_name(&self) -> &[u8] {
        &self.scratch[self.cur_text.clone()]
    }

    pub fn namespace_uri(&self, prefix: &[u8]) -> &[u8] {
        self.namespaces.resolve(prefix, &self.arena).map(|r| &self.arena[r]).unwrap_or(&[])
    }

    // -- Convenience walkers (SPEC_FULL §4.3 "Convenience walkers") -----

    /// Concatenates `text`/`cdata`/`entity_reference`/`character_reference`
    /// between here and the matching `element_end`, discarding comments,
    /// PIs, and the tags of any nested elements (their text is folded in
    /// too, in document order).
    pub fn read_element_text(&mut self) -> Result<Vec<u8>> {
        let depth = self.element_names.len();
        let mut out = Vec::new();
        loop {
            match self.read()? {
                Node::Text | Node::CData => out.extend_from_slice(self.text()),
                Node::EntityReference => match resolve_predefined_entity(&self.cur_entity_name) {
                    Some(ch) => {
                        let mut buf = [0u8; 4];
                        out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
                    }
                    None => {
                        let name = String::from_utf8_lossy(&self.cur_entity_name).into_owned();
                        return Err(self.illformed_err(IllFormedError::EntityReferenceUndefined(name)));
                    }
                },
                Node::CharacterReference => {
                    let mut buf = [0u8; 4];
                    out.extend_from_slice(self.cur_char_ref.encode_utf8(&mut buf).as_bytes());
                }
                Node::ElementEnd if self.element_names.len() < depth => return Ok(out),
                Node::Eof => return Err(self.syntax_err(SyntaxError::UnexpectedEof)),
                _ => {}
            }
        }
    }

    pub fn skip_element(&mut self) -> Result<()> {
        let depth = self.element_names.len();
        loop {
            match self.read()? {
                Node::ElementEnd if self.element_names.len() < depth => return Ok(()),
                Node::Eof => return Err(self.syntax_err(SyntaxError::UnexpectedEof)),
                _ => {}
            }
        }
    }

    pub fn skip_prolog(&mut self) -> Result<()> {
        loop {
            match self.read()? {
                Node::ElementStart => return Ok(()),
                Node::Eof => return Err(self.syntax_err(SyntaxError::UnexpectedEof)),
                _ => {}
            }
        }
    }

    pub fn skip_document(&mut self) -> Result<()> {
        loop {
            if matches!(self.read()?, Node::Eof) {
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_all(xml: &str) -> (Vec<Node>, Reader<SliceSource<'_>>) {
        let mut r = Reader::from_str(xml).unwrap();
        let mut nodes = Vec::new();
        loop {
            let n = r.read().unwrap();
            let is_eof = n == Node::Eof;
            nodes.push(n);
            if is_eof {
                break;
            }
        }
        (nodes, r)
    }

    #[test]
    fn empty_element_emits_start_then_end() {
        let (nodes, _) = read_all("<a/>");
        assert_eq!(nodes, vec![Node::ElementStart, Node::ElementEnd, Node::Eof]);
    }

    #[test]
    fn empty_element_end_name_matches_start() {
        let mut r = Reader::from_str("<a/>").unwrap();
        assert_eq!(r.read().unwrap(), Node::ElementStart);
        let start_name = r.element_name().to_vec();
        assert_eq!(r.read().unwrap(), Node::ElementEnd);
        assert_eq!(r.element_name(), start_name.as_slice());
    }

    #[test]
    fn nested_text_survives_sibling_element() {
        let mut r = Reader::from_str("<a>x<b/>y</a>").unwrap();
        assert_eq!(r.read().unwrap(), Node::ElementStart); // a
        assert_eq!(r.read().unwrap(), Node::Text);
        assert_eq!(r.text(), b"x");
        assert_eq!(r.read().unwrap(), Node::ElementStart); // b
        assert_eq!(r.read().unwrap(), Node::ElementEnd); // /b
        assert_eq!(r.read().unwrap(), Node::Text);
        assert_eq!(r.text(), b"y");
        assert_eq!(r.read().unwrap(), Node::ElementEnd); // /a
    }

    #[test]
    fn attribute_values_are_normalized_and_individually_addressable() {
        let mut r = Reader::from_str("<a x=\"1\" y=\"a&amp;b\"/>").unwrap();
        assert_eq!(r.read().unwrap(), Node::ElementStart);
        assert_eq!(r.attribute_count(), 2);
        assert_eq!(r.attribute_name(0), Some(&b"x"[..]));
        assert_eq!(r.attribute_value(0), Some(&b"1"[..]));
        assert_eq!(r.attribute_name(1), Some(&b"y"[..]));
        assert_eq!(r.attribute_value(1), Some(&b"a&b"[..]));
        assert_eq!(r.attribute_value_raw(1), Some(&b"a&amp;b"[..]));
    }

    #[test]
    fn duplicate_attribute_is_rejected() {
        let mut r = Reader::from_str("<a x=\"1\" x=\"2\"/>").unwrap();
        let err = r.read().unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::AttributeDuplicate));
    }

    #[test]
    fn mismatched_end_tag_is_rejected() {
        let mut r = Reader::from_str("<a></b>").unwrap();
        assert_eq!(r.read().unwrap(), Node::ElementStart);
        let err = r.read().unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::ElementEndMismatched));
    }

    #[test]
    fn second_root_element_is_rejected() {
        let mut r = Reader::from_str("<a/><b/>").unwrap();
        assert_eq!(r.read().unwrap(), Node::ElementStart);
        assert_eq!(r.read().unwrap(), Node::ElementEnd);
        let err = r.read().unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::UnexpectedCharacter));
    }

    #[test]
    fn latched_error_replays_after_first_failure() {
        let mut r = Reader::from_str("<a></b>").unwrap();
        r.read().unwrap();
        let first = r.read().unwrap_err();
        let second = r.read().unwrap_err();
        assert_eq!(first.code(), second.code());
        assert!(matches!(second, Error::Latched(..)));
    }

    #[test]
    fn unclosed_element_is_rejected_at_eof() {
        let mut r = Reader::from_str("<a>").unwrap();
        assert_eq!(r.read().unwrap(), Node::ElementStart);
        let err = r.read().unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::ElementUnclosed));
    }

    #[test]
    fn doctype_is_rejected_as_illformed() {
        let mut r = Reader::from_str("<!DOCTYPE a><a/>").unwrap();
        let err = r.read().unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::DoctypeUnsupported));
    }

    #[test]
    fn namespace_prefix_resolves_to_declared_uri() {
        let mut r = Reader::from_str("<p:a xmlns:p=\"urn:x\"/>").unwrap();
        assert_eq!(r.read().unwrap(), Node::ElementStart);
        let (prefix, ns, local) = r.element_name_ns();
        assert_eq!(prefix, b"p");
        assert_eq!(ns, b"urn:x");
        assert_eq!(local, b"a");
    }

    #[test]
    fn unbound_element_prefix_is_rejected() {
        let mut r = Reader::from_str("<p:a/>").unwrap();
        let err = r.read().unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::NamespacePrefixUnbound));
    }

    #[test]
    fn xmlns_as_prefix_is_illegal() {
        let mut r = Reader::from_str("<a xmlns:xmlns=\"urn:x\"/>").unwrap();
        let err = r.read().unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::NamespacePrefixIllegal));
    }

    #[test]
    fn element_local_name_that_is_not_an_ncname_is_rejected() {
        let mut r = Reader::from_str("<a:1 xmlns:a=\"u\"/>").unwrap();
        let err = r.read().unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::NameMalformed));
    }

    #[test]
    fn element_name_with_empty_local_part_is_rejected() {
        let mut r = Reader::from_str("<a: xmlns:a=\"u\"/>").unwrap();
        let err = r.read().unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::NameMalformed));
    }

    #[test]
    fn attribute_local_name_that_is_not_an_ncname_is_rejected() {
        let mut r = Reader::from_str("<e a:1=\"v\" xmlns:a=\"u\"/>").unwrap();
        let err = r.read().unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::NameMalformed));
    }

    #[test]
    fn cdata_section_is_reported_without_entity_expansion() {
        let mut r = Reader::from_str("<a><![CDATA[a&b]]></a>").unwrap();
        assert_eq!(r.read().unwrap(), Node::ElementStart);
        assert_eq!(r.read().unwrap(), Node::CData);
        assert_eq!(r.cdata(), b"a&b");
    }

    #[test]
    fn read_element_text_concatenates_nested_text_and_refs() {
        let mut r = Reader::from_str("<a>x<b>y</b>&amp;<!--c-->z</a>").unwrap();
        assert_eq!(r.read().unwrap(), Node::ElementStart);
        let text = r.read_element_text().unwrap();
        assert_eq!(text, b"xy&z");
    }

    #[test]
    fn skip_element_advances_past_matching_depth() {
        let mut r = Reader::from_str("<a><b><c/></b></a>tail").unwrap();
        assert_eq!(r.read().unwrap(), Node::ElementStart); // a
        assert_eq!(r.read().unwrap(), Node::ElementStart); // b
        r.skip_element().unwrap(); // skips c, lands after /b
        assert_eq!(r.read().unwrap(), Node::ElementEnd); // /a
    }

    #[test]
    fn xml_declaration_fields_are_parsed() {
        let mut r = Reader::from_str("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?><a/>").unwrap();
        assert_eq!(r.read().unwrap(), Node::XmlDeclaration);
        assert_eq!(r.xml_declaration_version(), b"1.0");
        assert_eq!(r.xml_declaration_encoding(), Some(&b"UTF-8"[..]));
        assert_eq!(r.xml_declaration_standalone(), Some(true));
    }

    #[test]
    fn character_reference_resolves_to_char() {
        let mut r = Reader::from_str("<a>&#65;</a>").unwrap();
        assert_eq!(r.read().unwrap(), Node::ElementStart);
        assert_eq!(r.read().unwrap(), Node::CharacterReference);
        assert_eq!(r.character_reference_char(), 'A');
    }

    #[test]
    fn pi_target_named_xml_is_rejected() {
        let mut r = Reader::from_str("<a/><?XML bogus?>").unwrap();
        assert_eq!(r.read().unwrap(), Node::ElementStart);
        assert_eq!(r.read().unwrap(), Node::ElementEnd);
        let err = r.read().unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::PiTargetDisallowed));
    }
}
