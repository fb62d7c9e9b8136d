//! Layer A: the codepoint-driven state machine (SPEC_FULL.md §4.2).
//!
//! Grounded on `parser/mod.rs`'s `Parser`/`FeedResult` shape (feed one unit
//! of input, get back either "need more" or an emitted event) and on
//! `quick-dtd/src/comment.rs`'s small run-length counter for matching a
//! variable-length run of `-`/`]` before a closing delimiter, generalized
//! here to comments, PIs and CDATA alike.
//!
//! The scanner performs no buffering: it only ever sees one `char` at a
//! time plus that `char`'s encoded byte length, and reports ranges against
//! whatever position unit the caller is counting in (the Reader always
//! counts bytes). It does not interpret entity or character references —
//! it only delimits them; resolving `amp`/`lt`/... or validating a
//! character reference's numeric value against the `Char` production is
//! the Reader's job (SPEC_FULL §4.3).
//!
//! Two scanner states named in the distilled spec are folded into this
//! implementation's neighbors: `start_after_bom` is dropped because the
//! Reader strips an optional BOM itself before the first `feed` call
//! (SPEC_FULL §4.3 step 2), and `after_root` is tracked by the Reader's own
//! coarse state machine rather than duplicated here — the scanner only
//! needs to know "has a root element been seen yet" (`seen_root_element`)
//! to answer `end_input` correctly.

use std::ops::Range;

use crate::error::SyntaxError;

pub type PResult<T> = std::result::Result<T, SyntaxError>;

/// A single piece of text/entity/character-reference content. A logical
/// text run or attribute value may be split across several of these,
/// because references interrupt raw text and because `reset_pos` may force
/// a run to be reported in pieces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentFragment {
    Text(Range<usize>),
    Codepoint(char),
    /// The name between `&` and `;`, not yet resolved against the
    /// predefined-entity set.
    Entity(Range<usize>),
}

/// One scanner output. `Ok` means "more input is needed, nothing to
/// report yet".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Ok,
    XmlDeclaration {
        version: Range<usize>,
        encoding: Option<Range<usize>>,
        standalone: Option<Range<usize>>,
    },
    ElementStart {
        name: Range<usize>,
    },
    ElementContent {
        content: ContentFragment,
    },
    ElementEnd {
        name: Range<usize>,
    },
    ElementEndEmpty,
    AttributeStart {
        name: Range<usize>,
    },
    AttributeContent {
        content: ContentFragment,
        is_final: bool,
    },
    CommentStart,
    CommentContent {
        content: Range<usize>,
        is_final: bool,
    },
    PiStart {
        target: Range<usize>,
    },
    PiContent {
        content: Range<usize>,
        is_final: bool,
    },
    /// `<!DOCTYPE` matched in full. Terminal: the scanner latches to
    /// `Error` right after emitting this, since DOCTYPE support is out of
    /// scope and nothing past it is ever scanned.
    DoctypeStart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    DocumentContent,
    UnknownStart,
    UnknownStartBang,
    CommentBeforeStart,
    Comment,
    CommentMaybeEnd,
    PiTarget,
    PiAfterTarget,
    PiContent,
    PiMaybeEnd,
    XmlDeclBeforeAttr,
    XmlDeclAttrName,
    XmlDeclAttrAfterName,
    XmlDeclAttrAfterEquals,
    XmlDeclAttrValue,
    XmlDeclEnd,
    CDataBeforeStart,
    CData,
    CDataMaybeEnd,
    Doctype,
    ElementStartName,
    ElementStartAfterName,
    ElementStartEmpty,
    AttributeName,
    AttributeAfterName,
    AttributeAfterEquals,
    AttributeContent,
    AttributeContentRefStart,
    AttributeContentEntityRefName,
    AttributeContentCharRefStart,
    AttributeContentCharRef,
    Content,
    ContentRefStart,
    ContentEntityRefName,
    ContentCharRefStart,
    ContentCharRef,
    ElementEnd,
    ElementEndName,
    ElementEndAfterName,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum XmlDeclAttr {
    #[default]
    None,
    Version,
    Encoding,
    Standalone,
}

/// State-local data shared across related states, reused by field rather
/// than wrapped per-variant (SPEC_FULL §4.2's "shared state record").
#[derive(Debug, Default)]
struct StateData {
    /// Start offset of the content/name run currently being accumulated.
    start: usize,
    /// Remaining bytes of a literal being matched (`"DATA["`, attribute
    /// names in the XML declaration, ...); consumed one ASCII byte per
    /// `feed` call.
    lit: &'static [u8],
    lit_pos: usize,
    /// Active attribute/XML-decl-value quote character.
    quote: char,
    /// Allows the upcoming `<?...?>` to be recognized as the XML
    /// declaration; only true for the very first construct fed.
    allow_xml_decl: bool,
    /// Tracks whether the PI target seen so far still matches `"xml"`
    /// byte-for-byte; paired with `run` as the match-length counter. The
    /// scanner never owns the byte buffer, so this is how it recognizes
    /// the literal `"xml"` target without re-reading bytes it has already
    /// forwarded past.
    xml_decl_candidate: bool,
    /// 0 = expecting `version`; 1 = `version` seen, `encoding`/`standalone`
    /// next; 2 = `encoding` also seen, only `standalone` may follow; 3 = no
    /// further attributes expected.
    xml_decl_stage: u8,
    xml_decl_attr: XmlDeclAttr,
    xml_decl_version: Option<Range<usize>>,
    xml_decl_encoding: Option<Range<usize>>,
    xml_decl_standalone: Option<Range<usize>>,
    /// Run-length counter for "maybe-end" states (`--`, `?`, `]]`).
    run: u32,
    /// End-tag name range, captured in `ElementEndName` and held across
    /// `ElementEndAfterName` so the `ElementEnd` token can be deferred to
    /// the `>` that actually closes the tag (SPEC_FULL §4.2 — the Reader's
    /// `resume_content` must only run once the scanner has truly reached
    /// `DocumentContent`, never while whitespace before `>` is still being
    /// consumed).
    end_name: Range<usize>,
    char_ref_hex: bool,
    char_ref_value: u32,
    char_ref_any_digit: bool,
    seen_root_element: bool,
    /// Set when the most recently emitted `ElementContent { Text }` token
    /// was a CDATA section body rather than ordinary character data — the
    /// Reader checks this via [`Scanner::last_content_was_cdata`] to tell
    /// the two apart, since the token shape itself doesn't carry that bit.
    last_was_cdata: bool,
}

/// Layer A. Accepts one codepoint at a time via [`Scanner::feed`] and
/// emits at most one [`Token`] per call.
#[derive(Debug)]
pub struct Scanner {
    state: State,
    pos: usize,
    data: StateData,
}

/// Returned by [`Scanner::reset_pos`] when the current state carries
/// in-progress data that cannot be safely rebased (SPEC_FULL §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CannotReset;

impl Default for Scanner {
    fn default() -> Self {
        Scanner::new()
    }
}

impl Scanner {
    pub fn new() -> Self {
        Scanner {
            state: State::Start,
            pos: 0,
            data: StateData {
                allow_xml_decl: true,
                ..StateData::default()
            },
        }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn is_error(&self) -> bool {
        self.state == State::Error
    }

    /// True while still inside a start tag's name or attribute list (i.e.
    /// before a `>` that opens content or a `/>` that closes the element
    /// empty). The Reader uses this to know when an `element_start`'s
    /// attribute table is fully assembled.
    pub fn in_tag(&self) -> bool {
        matches!(
            self.state,
            State::ElementStartName
                | State::ElementStartAfterName
                | State::ElementStartEmpty
                | State::AttributeName
                | State::AttributeAfterName
                | State::AttributeAfterEquals
                | State::AttributeContent
                | State::AttributeContentRefStart
                | State::AttributeContentEntityRefName
                | State::AttributeContentCharRefStart
                | State::AttributeContentCharRef
        )
    }

    /// True if the most recent `ElementContent { Text }` token came from a
    /// CDATA section body rather than ordinary character data.
    pub fn last_content_was_cdata(&self) -> bool {
        self.data.last_was_cdata
    }

    /// Switches back to `Content` parsing right after an `ElementEnd`/
    /// `ElementEndEmpty` token, when the Reader's own element stack shows a
    /// parent is still open. The scanner always lands in `DocumentContent`
    /// after closing a tag, since it has no notion of nesting depth itself
    /// (SPEC_FULL §4.2) — only the Reader knows whether the next bytes are
    /// top-level epilog/prolog content (whitespace/comments/PIs only) or
    /// ordinary element text, and calls this to tell it.
    pub fn resume_content(&mut self) {
        debug_assert_eq!(self.state, State::DocumentContent);
        self.state = State::Content;
        self.data.start = self.pos;
    }

    /// `end_input()` (SPEC_FULL §4.2): only legal once a root element has
    /// been seen and the scanner is back at top-level content.
    pub fn end_input(&self) -> PResult<()> {
        if self.state == State::DocumentContent && self.data.seen_root_element {
            Ok(())
        } else {
            Err(SyntaxError::UnexpectedEof)
        }
    }

    /// Attempts to rebase `pos` to 0, per the three-way classification in
    /// SPEC_FULL §4.2.
    pub fn reset_pos(&mut self) -> Result<Option<Token>, CannotReset> {
        use State::*;
        match self.state {
            Comment | PiContent | CData | AttributeContent | Content => {
                let range = self.data.start..self.pos;
                let tok = match self.state {
                    Comment => Token::CommentContent { content: range, is_final: false },
                    PiContent => Token::PiContent { content: range, is_final: false },
                    CData | Content => Token::ElementContent { content: ContentFragment::Text(range) },
                    AttributeContent => Token::AttributeContent {
                        content: ContentFragment::Text(range),
                        is_final: false,
                    },
                    _ => unreachable!(),
                };
                self.data.start = 0;
                self.pos = 0;
                Ok(Some(tok))
            }
            ElementStartName | PiTarget | CommentBeforeStart | CommentMaybeEnd | PiMaybeEnd
            | CDataBeforeStart | CDataMaybeEnd | ElementEndName | ElementEndAfterName
            | AttributeName | XmlDeclAttrName
            | XmlDeclAttrValue | AttributeContentRefStart | AttributeContentEntityRefName
            | AttributeContentCharRefStart | AttributeContentCharRef | ContentRefStart
            | ContentEntityRefName | ContentCharRefStart | ContentCharRef | Doctype => {
                Err(CannotReset)
            }
            _ => {
                self.pos = 0;
                Ok(None)
            }
        }
    }

    fn err(&mut self, e: SyntaxError) -> PResult<Token> {
        self.state = State::Error;
        Err(e)
    }

    /// Accepts one codepoint, `len` bytes long, and updates `pos` by
    /// `len`. Returns `Token::Ok` when more input is needed.
    pub fn feed(&mut self, c: char, len: usize) -> PResult<Token> {
        let char_start = self.pos;
        self.pos += len;
        self.step(c, char_start)
    }

    fn step(&mut self, c: char, char_start: usize) -> PResult<Token> {
        use crate::chars::*;
        use State::*;

        match self.state {
            Error => self.err(SyntaxError::UnexpectedChar(c)),

            Start | DocumentContent => {
                if c == '<' {
                    self.state = UnknownStart;
                    Ok(Token::Ok)
                } else if is_space(c) {
                    Ok(Token::Ok)
                } else {
                    self.err(SyntaxError::UnexpectedChar(c))
                }
            }

            UnknownStart => match c {
                '?' => {
                    self.state = PiTarget;
                    self.data.start = self.pos;
                    self.data.xml_decl_attr = XmlDeclAttr::None;
                    self.data.xml_decl_candidate = self.data.allow_xml_decl;
                    self.data.run = 0;
                    Ok(Token::Ok)
                }
                '!' => {
                    self.state = UnknownStartBang;
                    Ok(Token::Ok)
                }
                '/' => {
                    self.state = ElementEnd;
                    Ok(Token::Ok)
                }
                _ if is_name_start_char(c) => {
                    self.data.allow_xml_decl = false;
                    self.data.seen_root_element = true;
                    self.data.start = char_start;
                    self.state = ElementStartName;
                    Ok(Token::Ok)
                }
                _ => self.err(SyntaxError::NameMalformed),
            },

            UnknownStartBang => match c {
                '-' => {
                    self.state = CommentBeforeStart;
                    Ok(Token::Ok)
                }
                '[' => {
                    self.state = CDataBeforeStart;
                    self.data.lit = b"CDATA[";
                    self.data.lit_pos = 0;
                    Ok(Token::Ok)
                }
                'D' => {
                    self.state = Doctype;
                    self.data.lit = b"OCTYPE";
                    self.data.lit_pos = 0;
                    Ok(Token::Ok)
                }
                _ => self.err(SyntaxError::DirectiveUnknown),
            },

            CommentBeforeStart => {
                if c == '-' {
                    self.state = Comment;
                    self.data.start = self.pos;
                    self.data.allow_xml_decl = false;
                    Ok(Token::CommentStart)
                } else {
                    self.err(SyntaxError::DirectiveUnknown)
                }
            }

            Comment => {
                if c == '-' {
                    self.state = CommentMaybeEnd;
                    self.data.run = 1;
                    Ok(Token::Ok)
                } else if is_xml_char(c as u32) {
                    Ok(Token::Ok)
                } else {
                    self.err(SyntaxError::UnexpectedChar(c))
                }
            }

            CommentMaybeEnd => {
                if c == '-' {
                    self.data.run += 1;
                    Ok(Token::Ok)
                } else if c == '>' && self.data.run == 2 {
                    let content = self.data.start..(char_start - 2);
                    self.state = DocumentContent;
                    self.data.start = self.pos;
                    Ok(Token::CommentContent { content, is_final: true })
                } else if self.data.run >= 2 {
                    // "--" inside a comment body that isn't followed by
                    // '>' is itself a syntax error, not plain text.
                    self.err(SyntaxError::UnclosedComment)
                } else if is_xml_char(c as u32) {
                    self.state = Comment;
                    self.data.run = 0;
                    Ok(Token::Ok)
                } else {
                    self.err(SyntaxError::UnexpectedChar(c))
                }
            }

            CDataBeforeStart => {
                if (c as u32) < 0x80 && c as u8 == self.data.lit[self.data.lit_pos] {
                    self.data.lit_pos += 1;
                    if self.data.lit_pos == self.data.lit.len() {
                        self.state = CData;
                        self.data.start = self.pos;
                    }
                    Ok(Token::Ok)
                } else {
                    self.err(SyntaxError::DirectiveUnknown)
                }
            }

            CData => {
                if c == ']' {
                    self.state = CDataMaybeEnd;
                    self.data.run = 1;
                    Ok(Token::Ok)
                } else if is_xml_char(c as u32) {
                    Ok(Token::Ok)
                } else {
                    self.err(SyntaxError::UnexpectedChar(c))
                }
            }

            CDataMaybeEnd => {
                if c == ']' {
                    self.data.run += 1;
                    Ok(Token::Ok)
                } else if c == '>' && self.data.run >= 2 {
                    let content = self.data.start..(char_start - self.data.run as usize);
                    self.state = Content;
                    self.data.start = self.pos;
                    self.data.last_was_cdata = true;
                    Ok(Token::ElementContent { content: ContentFragment::Text(content) })
                } else if is_xml_char(c as u32) {
                    self.state = CData;
                    self.data.run = 0;
                    Ok(Token::Ok)
                } else {
                    self.err(SyntaxError::UnexpectedChar(c))
                }
            }

            Doctype => {
                if self.data.lit_pos < self.data.lit.len() {
                    if (c as u32) < 0x80 && c as u8 == self.data.lit[self.data.lit_pos] {
                        self.data.lit_pos += 1;
                        Ok(Token::Ok)
                    } else {
                        self.err(SyntaxError::DirectiveUnknown)
                    }
                } else {
                    // Matched "<!DOCTYPE" in full; rejecting it is a
                    // well-formedness decision, not a grammar one, so hand
                    // a token back rather than erroring here directly.
                    self.state = State::Error;
                    Ok(Token::DoctypeStart)
                }
            }

            PiTarget => {
                if is_name_char(c) {
                    if self.data.xml_decl_candidate {
                        let idx = self.data.run as usize;
                        if idx < 3 && (c as u32) < 0x80 && c as u8 == b"xml"[idx] {
                            self.data.run += 1;
                        } else {
                            self.data.xml_decl_candidate = false;
                        }
                    }
                    Ok(Token::Ok)
                } else if is_space(c) || c == '?' {
                    let target = self.data.start..char_start;
                    let is_xml_decl = self.data.xml_decl_candidate && self.data.run == 3;
                    self.data.allow_xml_decl = false;
                    if is_xml_decl {
                        self.data.xml_decl_stage = 0;
                        if c != '?' {
                            self.state = XmlDeclBeforeAttr;
                            Ok(Token::Ok)
                        } else {
                            self.err(SyntaxError::XmlDeclVersionMissing)
                        }
                    } else {
                        self.state = if c == '?' { PiMaybeEnd } else { PiAfterTarget };
                        if c == '?' {
                            // No content between target and the closing `?>`:
                            // `start` must mark this `?`, not the target, or
                            // the eventual `char_start - run` subtraction
                            // underflows into a reversed range.
                            self.data.start = char_start;
                            self.data.run = 1;
                        }
                        Ok(Token::PiStart { target })
                    }
                } else {
                    self.err(SyntaxError::NameMalformed)
                }
            }

            PiAfterTarget => {
                if is_space(c) {
                    Ok(Token::Ok)
                } else if c == '?' {
                    self.state = PiMaybeEnd;
                    self.data.run = 1;
                    Ok(Token::Ok)
                } else {
                    self.state = PiContent;
                    self.data.start = char_start;
                    self.step(c, char_start)
                }
            }

            PiContent => {
                if c == '?' {
                    self.state = PiMaybeEnd;
                    self.data.run = 1;
                    Ok(Token::Ok)
                } else if is_xml_char(c as u32) {
                    Ok(Token::Ok)
                } else {
                    self.err(SyntaxError::UnexpectedChar(c))
                }
            }

            PiMaybeEnd => {
                if c == '>' {
                    let content = self.data.start..(char_start - self.data.run as usize);
                    self.state = DocumentContent;
                    Ok(Token::PiContent { content, is_final: true })
                } else {
                    self.state = PiContent;
                    self.step(c, char_start)
                }
            }

            XmlDeclBeforeAttr => {
                if is_space(c) {
                    Ok(Token::Ok)
                } else if c == '?' {
                    self.state = XmlDeclEnd;
                    Ok(Token::Ok)
                } else {
                    // The XML declaration's attribute order is fixed
                    // (`version`, then optionally `encoding`, then
                    // optionally `standalone`), so the next expected name
                    // is known from `xml_decl_stage` plus this first
                    // character — no general `Name` scan is needed.
                    let lit: &'static [u8] = match (self.data.xml_decl_stage, c) {
                        (0, 'v') => b"version",
                        (1, 'e') => b"encoding",
                        (1, 's') | (2, 's') => b"standalone",
                        _ => return self.err(SyntaxError::XmlDeclAttributeUnsupported),
                    };
                    self.data.lit = lit;
                    self.data.lit_pos = 0;
                    self.state = XmlDeclAttrName;
                    self.step(c, char_start)
                }
            }

            XmlDeclAttrName => {
                if self.data.lit_pos < self.data.lit.len() {
                    if (c as u32) < 0x80 && c as u8 == self.data.lit[self.data.lit_pos] {
                        self.data.lit_pos += 1;
                        if self.data.lit_pos == self.data.lit.len() {
                            self.data.xml_decl_attr = match self.data.lit {
                                b"version" => XmlDeclAttr::Version,
                                b"encoding" => XmlDeclAttr::Encoding,
                                b"standalone" => XmlDeclAttr::Standalone,
                                _ => unreachable!(),
                            };
                            self.data.xml_decl_stage = match self.data.xml_decl_attr {
                                XmlDeclAttr::Version => 1,
                                XmlDeclAttr::Encoding => 2,
                                XmlDeclAttr::Standalone => 3,
                                XmlDeclAttr::None => unreachable!(),
                            };
                        }
                        Ok(Token::Ok)
                    } else {
                        self.err(SyntaxError::XmlDeclAttributeUnsupported)
                    }
                } else if is_name_char(c) {
                    // Full literal already matched; a further name char
                    // means this was some longer, unsupported attribute.
                    self.err(SyntaxError::XmlDeclAttributeUnsupported)
                } else {
                    self.state = XmlDeclAttrAfterName;
                    self.step(c, char_start)
                }
            }

            XmlDeclAttrAfterName => {
                if is_space(c) {
                    Ok(Token::Ok)
                } else if c == '=' {
                    self.state = XmlDeclAttrAfterEquals;
                    Ok(Token::Ok)
                } else {
                    self.err(SyntaxError::ExpectedEquals)
                }
            }

            XmlDeclAttrAfterEquals => {
                if is_space(c) {
                    Ok(Token::Ok)
                } else if c == '"' || c == '\'' {
                    self.state = XmlDeclAttrValue;
                    self.data.quote = c;
                    self.data.start = self.pos;
                    Ok(Token::Ok)
                } else {
                    self.err(SyntaxError::ExpectedQuote)
                }
            }

            XmlDeclAttrValue => {
                if c == self.data.quote {
                    let value = self.data.start..char_start;
                    match self.data.xml_decl_attr {
                        XmlDeclAttr::Version => self.data.xml_decl_version = Some(value),
                        XmlDeclAttr::Encoding => self.data.xml_decl_encoding = Some(value),
                        XmlDeclAttr::Standalone => self.data.xml_decl_standalone = Some(value),
                        XmlDeclAttr::None => unreachable!(),
                    }
                    self.state = XmlDeclBeforeAttr;
                    Ok(Token::Ok)
                } else if is_xml_char(c as u32) {
                    Ok(Token::Ok)
                } else {
                    self.err(SyntaxError::UnexpectedChar(c))
                }
            }

            XmlDeclEnd => {
                if c == '>' {
                    let version = match self.data.xml_decl_version.clone() {
                        Some(v) => v,
                        None => return self.err(SyntaxError::XmlDeclVersionMissing),
                    };
                    let tok = Token::XmlDeclaration {
                        version,
                        encoding: self.data.xml_decl_encoding.clone(),
                        standalone: self.data.xml_decl_standalone.clone(),
                    };
                    self.state = DocumentContent;
                    self.data.xml_decl_version = None;
                    self.data.xml_decl_encoding = None;
                    self.data.xml_decl_standalone = None;
                    Ok(tok)
                } else {
                    self.err(SyntaxError::UnexpectedChar(c))
                }
            }

            ElementStartName => {
                if is_name_char(c) {
                    Ok(Token::Ok)
                } else if is_space(c) || c == '>' || c == '/' {
                    let name = self.data.start..char_start;
                    self.state = ElementStartAfterName;
                    let tok = Token::ElementStart { name };
                    if c == '>' {
                        self.state = Content;
                        self.data.start = self.pos;
                    } else if c == '/' {
                        self.state = ElementStartEmpty;
                    }
                    Ok(tok)
                } else {
                    self.err(SyntaxError::NameMalformed)
                }
            }

            ElementStartAfterName => {
                if is_space(c) {
                    Ok(Token::Ok)
                } else if c == '>' {
                    self.state = Content;
                    self.data.start = self.pos;
                    Ok(Token::Ok)
                } else if c == '/' {
                    self.state = ElementStartEmpty;
                    Ok(Token::Ok)
                } else if is_name_start_char(c) {
                    self.state = AttributeName;
                    self.data.start = char_start;
                    Ok(Token::Ok)
                } else {
                    self.err(SyntaxError::MissingWhitespaceBetweenAttributes)
                }
            }

            ElementStartEmpty => {
                if c == '>' {
                    self.state = DocumentContent;
                    Ok(Token::ElementEndEmpty)
                } else {
                    self.err(SyntaxError::UnexpectedChar(c))
                }
            }

            AttributeName => {
                if is_name_char(c) {
                    Ok(Token::Ok)
                } else if is_space(c) || c == '=' {
                    let name = self.data.start..char_start;
                    self.state = AttributeAfterName;
                    let tok = Token::AttributeStart { name };
                    if c == '=' {
                        self.state = AttributeAfterEquals;
                    }
                    Ok(tok)
                } else {
                    self.err(SyntaxError::NameMalformed)
                }
            }

            AttributeAfterName => {
                if is_space(c) {
                    Ok(Token::Ok)
                } else if c == '=' {
                    self.state = AttributeAfterEquals;
                    Ok(Token::Ok)
                } else {
                    self.err(SyntaxError::ExpectedEquals)
                }
            }

            AttributeAfterEquals => {
                if is_space(c) {
                    Ok(Token::Ok)
                } else if c == '"' || c == '\'' {
                    self.state = AttributeContent;
                    self.data.quote = c;
                    self.data.start = self.pos;
                    Ok(Token::Ok)
                } else {
                    self.err(SyntaxError::ExpectedQuote)
                }
            }

            AttributeContent => {
                if c == self.data.quote {
                    let content = self.data.start..char_start;
                    self.state = ElementStartAfterName;
                    Ok(Token::AttributeContent {
                        content: ContentFragment::Text(content),
                        is_final: true,
                    })
                } else if c == '&' {
                    let content = self.data.start..char_start;
                    self.state = AttributeContentRefStart;
                    if content.is_empty() {
                        Ok(Token::Ok)
                    } else {
                        Ok(Token::AttributeContent {
                            content: ContentFragment::Text(content),
                            is_final: false,
                        })
                    }
                } else if c == '<' {
                    self.err(SyntaxError::UnexpectedChar(c))
                } else if is_xml_char(c as u32) {
                    Ok(Token::Ok)
                } else {
                    self.err(SyntaxError::UnexpectedChar(c))
                }
            }

            AttributeContentRefStart => {
                if c == '#' {
                    self.state = AttributeContentCharRefStart;
                    Ok(Token::Ok)
                } else if is_name_start_char(c) {
                    self.state = AttributeContentEntityRefName;
                    self.data.start = char_start;
                    Ok(Token::Ok)
                } else {
                    self.err(SyntaxError::NameMalformed)
                }
            }

            AttributeContentEntityRefName => {
                if is_name_char(c) {
                    Ok(Token::Ok)
                } else if c == ';' {
                    let name = self.data.start..char_start;
                    self.state = AttributeContent;
                    self.data.start = self.pos;
                    Ok(Token::AttributeContent {
                        content: ContentFragment::Entity(name),
                        is_final: false,
                    })
                } else {
                    self.err(SyntaxError::NameMalformed)
                }
            }

            AttributeContentCharRefStart => {
                self.data.char_ref_value = 0;
                self.data.char_ref_any_digit = false;
                if c == 'x' {
                    self.data.char_ref_hex = true;
                    self.state = AttributeContentCharRef;
                    Ok(Token::Ok)
                } else if c.is_ascii_digit() {
                    self.data.char_ref_hex = false;
                    self.state = AttributeContentCharRef;
                    self.accumulate_char_ref_digit(c);
                    Ok(Token::Ok)
                } else {
                    self.err(SyntaxError::MalformedCharReference)
                }
            }

            AttributeContentCharRef => {
                if c == ';' {
                    if !self.data.char_ref_any_digit {
                        return self.err(SyntaxError::MalformedCharReference);
                    }
                    let value = self.data.char_ref_value;
                    match char::from_u32(value) {
                        Some(ch) => {
                            self.state = AttributeContent;
                            self.data.start = self.pos;
                            Ok(Token::AttributeContent {
                                content: ContentFragment::Codepoint(ch),
                                is_final: false,
                            })
                        }
                        None => self.err(SyntaxError::MalformedCharReference),
                    }
                } else if self.is_char_ref_digit(c) {
                    self.accumulate_char_ref_digit(c);
                    Ok(Token::Ok)
                } else {
                    self.err(SyntaxError::MalformedCharReference)
                }
            }

            Content => {
                if c == '<' {
                    let content = self.data.start..char_start;
                    self.state = UnknownStart;
                    if content.is_empty() {
                        Ok(Token::Ok)
                    } else {
                        self.data.last_was_cdata = false;
                        Ok(Token::ElementContent { content: ContentFragment::Text(content) })
                    }
                } else if c == '&' {
                    let content = self.data.start..char_start;
                    self.state = ContentRefStart;
                    if content.is_empty() {
                        Ok(Token::Ok)
                    } else {
                        self.data.last_was_cdata = false;
                        Ok(Token::ElementContent { content: ContentFragment::Text(content) })
                    }
                } else if is_xml_char(c as u32) {
                    Ok(Token::Ok)
                } else {
                    self.err(SyntaxError::UnexpectedChar(c))
                }
            }

            ContentRefStart => {
                if c == '#' {
                    self.state = ContentCharRefStart;
                    Ok(Token::Ok)
                } else if is_name_start_char(c) {
                    self.state = ContentEntityRefName;
                    self.data.start = char_start;
                    Ok(Token::Ok)
                } else {
                    self.err(SyntaxError::NameMalformed)
                }
            }

            ContentEntityRefName => {
                if is_name_char(c) {
                    Ok(Token::Ok)
                } else if c == ';' {
                    let name = self.data.start..char_start;
                    self.state = Content;
                    self.data.start = self.pos;
                    Ok(Token::ElementContent { content: ContentFragment::Entity(name) })
                } else {
                    self.err(SyntaxError::NameMalformed)
                }
            }

            ContentCharRefStart => {
                self.data.char_ref_value = 0;
                self.data.char_ref_any_digit = false;
                if c == 'x' {
                    self.data.char_ref_hex = true;
                    self.state = ContentCharRef;
                    Ok(Token::Ok)
                } else if c.is_ascii_digit() {
                    self.data.char_ref_hex = false;
                    self.state = ContentCharRef;
                    self.accumulate_char_ref_digit(c);
                    Ok(Token::Ok)
                } else {
                    self.err(SyntaxError::MalformedCharReference)
                }
            }

            ContentCharRef => {
                if c == ';' {
                    if !self.data.char_ref_any_digit {
                        return self.err(SyntaxError::MalformedCharReference);
                    }
                    let value = self.data.char_ref_value;
                    match char::from_u32(value) {
                        Some(ch) => {
                            self.state = Content;
                            self.data.start = self.pos;
                            Ok(Token::ElementContent { content: ContentFragment::Codepoint(ch) })
                        }
                        None => self.err(SyntaxError::MalformedCharReference),
                    }
                } else if self.is_char_ref_digit(c) {
                    self.accumulate_char_ref_digit(c);
                    Ok(Token::Ok)
                } else {
                    self.err(SyntaxError::MalformedCharReference)
                }
            }

            ElementEnd => {
                if is_name_start_char(c) {
                    self.state = ElementEndName;
                    self.data.start = char_start;
                    Ok(Token::Ok)
                } else {
                    self.err(SyntaxError::NameMalformed)
                }
            }

            ElementEndName => {
                if is_name_char(c) {
                    Ok(Token::Ok)
                } else if is_space(c) || c == '>' {
                    let name = self.data.start..char_start;
                    if c == '>' {
                        self.state = DocumentContent;
                        Ok(Token::ElementEnd { name })
                    } else {
                        self.data.end_name = name;
                        self.state = ElementEndAfterName;
                        Ok(Token::Ok)
                    }
                } else {
                    self.err(SyntaxError::NameMalformed)
                }
            }

            ElementEndAfterName => {
                if is_space(c) {
                    Ok(Token::Ok)
                } else if c == '>' {
                    self.state = DocumentContent;
                    let name = self.data.end_name.clone();
                    Ok(Token::ElementEnd { name })
                } else {
                    self.err(SyntaxError::UnexpectedChar(c))
                }
            }
        }
    }

    fn is_char_ref_digit(&self, c: char) -> bool {
        if self.data.char_ref_hex {
            c.is_ascii_hexdigit()
        } else {
            c.is_ascii_digit()
        }
    }

    fn accumulate_char_ref_digit(&mut self, c: char) {
        self.data.char_ref_any_digit = true;
        let base = if self.data.char_ref_hex { 16 } else { 10 };
        let digit = c.to_digit(base).unwrap_or(0);
        self.data.char_ref_value = self.data.char_ref_value.saturating_mul(base).saturating_add(digit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_str(sc: &mut Scanner, s: &str) -> Vec<Token> {
        let mut out = Vec::new();
        for c in s.chars() {
            let tok = sc.feed(c, c.len_utf8()).expect("unexpected scanner error");
            if tok != Token::Ok {
                out.push(tok);
            }
        }
        out
    }

    #[test]
    fn empty_element_emits_start_then_synthetic_end() {
        let mut sc = Scanner::new();
        let toks = feed_str(&mut sc, "<a/>");
        assert!(matches!(toks[0], Token::ElementStart { .. }));
        assert!(matches!(toks[1], Token::ElementEndEmpty));
    }

    #[test]
    fn element_with_text_and_end_tag() {
        let mut sc = Scanner::new();
        let toks = feed_str(&mut sc, "<a>hi</a>");
        assert!(matches!(toks[0], Token::ElementStart { .. }));
        assert!(matches!(&toks[1], Token::ElementContent { content: ContentFragment::Text(r) } if *r == (3..5)));
        assert!(matches!(toks[2], Token::ElementEnd { .. }));
    }

    #[test]
    fn element_name_starting_with_a_digit_is_name_malformed() {
        let mut sc = Scanner::new();
        feed_str(&mut sc, "<root>\n  <");
        let err = sc.feed('1', 1).unwrap_err();
        assert_eq!(err, SyntaxError::NameMalformed);
    }

    #[test]
    fn end_tag_with_trailing_whitespace_reaches_document_content() {
        let mut sc = Scanner::new();
        let toks = feed_str(&mut sc, "<a>hi</a  >");
        assert!(matches!(toks[2], Token::ElementEnd { .. }));
        assert_eq!(sc.state, State::DocumentContent);
    }

    #[test]
    fn comment_reports_start_and_final_content() {
        let mut sc = Scanner::new();
        let toks = feed_str(&mut sc, "<!--hi--><a/>");
        assert!(matches!(toks[0], Token::CommentStart));
        assert!(matches!(&toks[1], Token::CommentContent { is_final: true, .. }));
    }

    #[test]
    fn char_reference_decodes_numeric_value() {
        let mut sc = Scanner::new();
        let toks = feed_str(&mut sc, "<a>&#65;</a>");
        assert!(matches!(
            &toks[1],
            Token::ElementContent { content: ContentFragment::Codepoint('A') }
        ));
    }

    #[test]
    fn entity_reference_is_delimited_not_resolved() {
        let mut sc = Scanner::new();
        let toks = feed_str(&mut sc, "<a>&amp;</a>");
        assert!(matches!(&toks[1], Token::ElementContent { content: ContentFragment::Entity(_) }));
    }

    #[test]
    fn reset_pos_emits_partial_content_in_content_state() {
        let mut sc = Scanner::new();
        feed_str(&mut sc, "<a>abc");
        let tok = sc.reset_pos().expect("content state can reset");
        assert!(matches!(tok, Some(Token::ElementContent { .. })));
        assert_eq!(sc.pos(), 0);
    }

    #[test]
    fn reset_pos_fails_mid_name() {
        let mut sc = Scanner::new();
        feed_str(&mut sc, "<a");
        assert_eq!(sc.reset_pos(), Err(CannotReset));
    }

    #[test]
    fn doctype_start_is_tokenized_not_errored() {
        let mut sc = Scanner::new();
        let mut saw_doctype = false;
        for c in "<!DOCTYPE x>".chars() {
            match sc.feed(c, c.len_utf8()) {
                Ok(Token::DoctypeStart) => {
                    saw_doctype = true;
                    break;
                }
                Ok(_) => {}
                Err(e) => panic!("unexpected scanner error before DoctypeStart: {:?}", e),
            }
        }
        assert!(saw_doctype);
        assert!(sc.is_error());
    }

    #[test]
    fn unrelated_bang_directive_is_a_syntax_error() {
        let mut sc = Scanner::new();
        for c in "<!FOO".chars() {
            let r = sc.feed(c, c.len_utf8());
            if r.is_err() {
                assert_eq!(r.unwrap_err(), SyntaxError::DirectiveUnknown);
                return;
            }
        }
        panic!("expected directive rejection");
    }
}
