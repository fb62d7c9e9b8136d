//! Error taxonomy (SPEC_FULL.md §7).
//!
//! Grounded on `reader/state.rs`'s split of `Error::Syntax(SyntaxError)` /
//! `Error::IllFormed(IllFormedError)` as two sub-taxonomies of one outer
//! `Error` enum. `Display` is written by hand, matching the teacher's
//! avoidance of error-derive crates.

use std::fmt;
use std::io;

/// 1-based line/column of a byte within the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub const START: Position = Position { line: 1, column: 1 };
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A scanner-level grammar violation: the input could not be tokenized at
/// all, independent of well-formedness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyntaxError {
    UnexpectedEof,
    UnexpectedChar(char),
    UnclosedTag,
    UnclosedComment,
    UnclosedPi,
    UnclosedCData,
    UnclosedEntityReference,
    UnclosedCharReference,
    MalformedCharReference,
    NameMalformed,
    ExpectedEquals,
    ExpectedQuote,
    MissingEndQuote,
    MissingWhitespaceBetweenAttributes,
    PiMissingSpace,
    XmlDeclAttributeUnsupported,
    XmlDeclVersionMissing,
    XmlDeclVersionUnsupported,
    XmlDeclStandaloneMalformed,
    DirectiveUnknown,
}

/// A reader-level well-formedness violation: the input tokenizes fine, but
/// violates a rule the Scanner cannot check on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IllFormedError {
    DoctypeUnsupported,
    MismatchedEndTag { expected: String, found: String },
    UnclosedElement(String),
    DuplicateAttribute(String),
    AttributeMissingSpace,
    AttributePrefixUndeclared,
    AttributeIllegalCharacter,
    NamespacePrefixUnbound(String),
    NamespacePrefixIllegal(String),
    NamespaceBindingIllegal(String),
    NameMalformed,
    TextDisallowedSequence,
    IllegalCharacter,
    PiTargetDisallowed,
    EntityReferenceUndefined(String),
    CharacterReferenceIllegal(u32),
    MultipleRootElements,
    TextOutsideRoot,
    SecondXmlDeclaration,
    InvalidEncoding,
    XmlDeclarationEncodingUnsupported(String),
}

/// The flattened classification returned by `Reader::error_code()`
/// (SPEC_FULL.md §7), independent of the message text carried by
/// `SyntaxError`/`IllFormedError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    XmlDeclarationAttributeUnsupported,
    XmlDeclarationVersionMissing,
    XmlDeclarationVersionUnsupported,
    XmlDeclarationEncodingUnsupported,
    XmlDeclarationStandaloneMalformed,
    DoctypeUnsupported,
    DirectiveUnknown,
    AttributeMissingSpace,
    AttributeDuplicate,
    AttributePrefixUndeclared,
    AttributeIllegalCharacter,
    ElementEndMismatched,
    ElementUnclosed,
    CommentMalformed,
    CommentUnclosed,
    PiUnclosed,
    PiTargetDisallowed,
    PiMissingSpace,
    TextDisallowedSequence,
    CDataUnclosed,
    EntityReferenceUnclosed,
    EntityReferenceUndefined,
    CharacterReferenceUnclosed,
    CharacterReferenceMalformed,
    NameMalformed,
    NamespacePrefixUnbound,
    NamespacePrefixIllegal,
    NamespaceBindingIllegal,
    UnexpectedCharacter,
    UnexpectedEndOfInput,
    ExpectedEquals,
    ExpectedQuote,
    MissingEndQuote,
    InvalidEncoding,
    IllegalCharacter,
}

impl ErrorCode {
    fn as_str(self) -> &'static str {
        use ErrorCode::*;
        match self {
            XmlDeclarationAttributeUnsupported => "xml_declaration_attribute_unsupported",
            XmlDeclarationVersionMissing => "xml_declaration_version_missing",
            XmlDeclarationVersionUnsupported => "xml_declaration_version_unsupported",
            XmlDeclarationEncodingUnsupported => "xml_declaration_encoding_unsupported",
            XmlDeclarationStandaloneMalformed => "xml_declaration_standalone_malformed",
            DoctypeUnsupported => "doctype_unsupported",
            DirectiveUnknown => "directive_unknown",
            AttributeMissingSpace => "attribute_missing_space",
            AttributeDuplicate => "attribute_duplicate",
            AttributePrefixUndeclared => "attribute_prefix_undeclared",
            AttributeIllegalCharacter => "attribute_illegal_character",
            ElementEndMismatched => "element_end_mismatched",
            ElementUnclosed => "element_unclosed",
            CommentMalformed => "comment_malformed",
            CommentUnclosed => "comment_unclosed",
            PiUnclosed => "pi_unclosed",
            PiTargetDisallowed => "pi_target_disallowed",
            PiMissingSpace => "pi_missing_space",
            TextDisallowedSequence => "text_disallowed_sequence",
            CDataUnclosed => "cdata_unclosed",
            EntityReferenceUnclosed => "entity_reference_unclosed",
            EntityReferenceUndefined => "entity_reference_undefined",
            CharacterReferenceUnclosed => "character_reference_unclosed",
            CharacterReferenceMalformed => "character_reference_malformed",
            NameMalformed => "name_malformed",
            NamespacePrefixUnbound => "namespace_prefix_unbound",
            NamespacePrefixIllegal => "namespace_prefix_illegal",
            NamespaceBindingIllegal => "namespace_binding_illegal",
            UnexpectedCharacter => "unexpected_character",
            UnexpectedEndOfInput => "unexpected_end_of_input",
            ExpectedEquals => "expected_equals",
            ExpectedQuote => "expected_quote",
            MissingEndQuote => "missing_end_quote",
            InvalidEncoding => "invalid_encoding",
            IllegalCharacter => "illegal_character",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SyntaxError {
    pub fn code(&self) -> ErrorCode {
        use SyntaxError::*;
        match self {
            UnexpectedEof => ErrorCode::UnexpectedEndOfInput,
            UnexpectedChar(_) => ErrorCode::UnexpectedCharacter,
            UnclosedTag => ErrorCode::UnexpectedEndOfInput,
            UnclosedComment => ErrorCode::CommentUnclosed,
            UnclosedPi => ErrorCode::PiUnclosed,
            UnclosedCData => ErrorCode::CDataUnclosed,
            UnclosedEntityReference => ErrorCode::EntityReferenceUnclosed,
            UnclosedCharReference => ErrorCode::CharacterReferenceUnclosed,
            MalformedCharReference => ErrorCode::CharacterReferenceMalformed,
            NameMalformed => ErrorCode::NameMalformed,
            ExpectedEquals => ErrorCode::ExpectedEquals,
            ExpectedQuote => ErrorCode::ExpectedQuote,
            MissingEndQuote => ErrorCode::MissingEndQuote,
            MissingWhitespaceBetweenAttributes => ErrorCode::AttributeMissingSpace,
            PiMissingSpace => ErrorCode::PiMissingSpace,
            XmlDeclAttributeUnsupported => ErrorCode::XmlDeclarationAttributeUnsupported,
            XmlDeclVersionMissing => ErrorCode::XmlDeclarationVersionMissing,
            XmlDeclVersionUnsupported => ErrorCode::XmlDeclarationVersionUnsupported,
            XmlDeclStandaloneMalformed => ErrorCode::XmlDeclarationStandaloneMalformed,
            DirectiveUnknown => ErrorCode::DirectiveUnknown,
        }
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyntaxError::UnexpectedChar(c) => write!(f, "unexpected character {:?}", c),
            other => f.write_str(other.code().as_str()),
        }
    }
}

impl IllFormedError {
    pub fn code(&self) -> ErrorCode {
        use IllFormedError::*;
        match self {
            DoctypeUnsupported => ErrorCode::DoctypeUnsupported,
            MismatchedEndTag { .. } => ErrorCode::ElementEndMismatched,
            UnclosedElement(_) => ErrorCode::ElementUnclosed,
            DuplicateAttribute(_) => ErrorCode::AttributeDuplicate,
            AttributeMissingSpace => ErrorCode::AttributeMissingSpace,
            AttributePrefixUndeclared => ErrorCode::AttributePrefixUndeclared,
            AttributeIllegalCharacter => ErrorCode::AttributeIllegalCharacter,
            NamespacePrefixUnbound(_) => ErrorCode::NamespacePrefixUnbound,
            NamespacePrefixIllegal(_) => ErrorCode::NamespacePrefixIllegal,
            NamespaceBindingIllegal(_) => ErrorCode::NamespaceBindingIllegal,
            NameMalformed => ErrorCode::NameMalformed,
            TextDisallowedSequence => ErrorCode::TextDisallowedSequence,
            IllegalCharacter => ErrorCode::IllegalCharacter,
            PiTargetDisallowed => ErrorCode::PiTargetDisallowed,
            EntityReferenceUndefined(_) => ErrorCode::EntityReferenceUndefined,
            CharacterReferenceIllegal(_) => ErrorCode::CharacterReferenceMalformed,
            MultipleRootElements | TextOutsideRoot | SecondXmlDeclaration => {
                ErrorCode::UnexpectedCharacter
            }
            InvalidEncoding => ErrorCode::InvalidEncoding,
            XmlDeclarationEncodingUnsupported(_) => ErrorCode::XmlDeclarationEncodingUnsupported,
        }
    }
}

impl fmt::Display for IllFormedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IllFormedError::MismatchedEndTag { expected, found } => {
                write!(f, "end tag `{}` does not match start tag `{}`", found, expected)
            }
            IllFormedError::UnclosedElement(name) => write!(f, "unclosed element `{}`", name),
            IllFormedError::DuplicateAttribute(name) => write!(f, "duplicate attribute `{}`", name),
            IllFormedError::NamespacePrefixUnbound(prefix) => {
                write!(f, "unbound namespace prefix `{}`", prefix)
            }
            IllFormedError::NamespacePrefixIllegal(prefix) => {
                write!(f, "illegal namespace prefix binding `{}`", prefix)
            }
            IllFormedError::NamespaceBindingIllegal(uri) => {
                write!(f, "illegal namespace binding to `{}`", uri)
            }
            IllFormedError::EntityReferenceUndefined(name) => {
                write!(f, "undefined entity reference `{}`", name)
            }
            IllFormedError::CharacterReferenceIllegal(v) => {
                write!(f, "illegal character reference value U+{:X}", v)
            }
            IllFormedError::XmlDeclarationEncodingUnsupported(name) => {
                write!(f, "unsupported declared encoding `{}`", name)
            }
            other => f.write_str(other.code().as_str()),
        }
    }
}

/// The outer error type. `malformed_xml` (SPEC_FULL §7) covers both
/// `Syntax` and `IllFormed`; `Io` covers `read_failed`.
#[derive(Debug)]
pub enum Error {
    Syntax(SyntaxError, Position),
    IllFormed(IllFormedError, Position),
    Io(io::Error),
    /// Replayed on every `read()` after the parser has latched (SPEC_FULL
    /// §7, "Latched error"): the original `Syntax`/`IllFormed`/`Io` value
    /// isn't `Clone`-able (`io::Error` isn't), so the reader keeps only its
    /// code and position and reconstructs this variant for every call after
    /// the first.
    Latched(Option<ErrorCode>, Option<Position>),
}

impl Error {
    /// Returns `None` only for `Io`, which has no `ErrorCode` of its own.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Error::Syntax(e, _) => Some(e.code()),
            Error::IllFormed(e, _) => Some(e.code()),
            Error::Io(_) => None,
            Error::Latched(code, _) => *code,
        }
    }

    pub fn position(&self) -> Option<Position> {
        match self {
            Error::Syntax(_, p) | Error::IllFormed(_, p) => Some(*p),
            Error::Io(_) => None,
            Error::Latched(_, p) => *p,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Syntax(e, p) => write!(f, "{} at {}", e.code(), p),
            Error::IllFormed(e, p) => write!(f, "{} at {}", e.code(), p),
            Error::Io(e) => write!(f, "read failed: {}", e),
            Error::Latched(Some(code), Some(p)) => write!(f, "{} at {} (latched)", code, p),
            Error::Latched(Some(code), None) => write!(f, "{} (latched)", code),
            Error::Latched(None, _) => write!(f, "read failed (latched)"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code_and_position() {
        let err = Error::IllFormed(
            IllFormedError::DuplicateAttribute("id".into()),
            Position { line: 3, column: 7 },
        );
        assert_eq!(err.to_string(), "attribute_duplicate at 3:7");
        assert_eq!(err.code(), Some(ErrorCode::AttributeDuplicate));
    }

    #[test]
    fn io_error_has_no_code_but_keeps_source() {
        let io_err = io::Error::new(io::ErrorKind::UnexpectedEof, "boom");
        let err: Error = io_err.into();
        assert_eq!(err.code(), None);
        assert!(std::error::Error::source(&err).is_some());
    }
}
