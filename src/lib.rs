//! A streaming, two-layer pull parser for XML 1.0 / Namespaces in XML 1.0.
//!
//! Layer A ([`scanner`]) is a codepoint-driven state machine that delimits
//! syntax without buffering or interpreting it; Layer B ([`Reader`]) walks
//! a windowed view of the document through the scanner, tracking the
//! element stack, namespace scopes, and attribute indices, and exposing a
//! pull API of [`Node`] values.
//!
//! ```
//! use xmlscan::Reader;
//!
//! let mut reader = Reader::from_str("<a x=\"1\">hi</a>").unwrap();
//! loop {
//!     match reader.read().unwrap() {
//!         xmlscan::Node::ElementStart => {
//!             assert_eq!(reader.element_name(), b"a");
//!             assert_eq!(reader.attribute_value(0), Some(&b"1"[..]));
//!         }
//!         xmlscan::Node::Text => assert_eq!(reader.text(), b"hi"),
//!         xmlscan::Node::Eof => break,
//!         _ => {}
//!     }
//! }
//! ```
//!
//! No DTD support and no writer: this crate only reads well-formed XML
//! forward, once, without building a tree.

mod chars;
mod error;
mod name;
mod reader;
mod scanner;
mod source;

pub use error::{Error, ErrorCode, IllFormedError, Position, Result, SyntaxError};
pub use reader::{Node, ParserConfig, Reader};
pub use source::{ReaderSource, SliceSource, Source};
