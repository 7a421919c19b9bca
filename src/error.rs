//! Error types for TDN reading, writing, and reference resolution.
//!
//! ## Error Categories
//!
//! - **Lexical errors**: malformed text, reported with line/column information
//! - **Structural errors**: duplicate address declarations, unresolved or
//!   dangling references, and type mismatches at resolution time
//! - **Binding errors**: a document that cannot be mapped to a Rust type
//! - **I/O errors**: reader/writer failures
//!
//! Errors found while resolving deferred references are not fail-fast: they
//! are collected into [`Error::Resolution`] so every broken reference is
//! reported in one pass.
//!
//! ## Examples
//!
//! ```rust
//! use serde_tdn::{parse, Error};
//!
//! let err = parse("[Ref:Record 0x7]").unwrap_err();
//! match err {
//!     Error::Resolution(errors) => assert_eq!(errors.len(), 1),
//!     other => panic!("unexpected error: {other}"),
//! }
//! ```

use crate::context::Address;
use crate::value::TypeTag;
use std::fmt;
use thiserror::Error;

/// Represents all possible errors that can occur while handling TDN.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// IO error during reading or writing
    #[error("IO error: {0}")]
    Io(String),

    /// Syntax error in the text form
    #[error("Syntax error at line {line}, column {col}: {msg}")]
    Syntax { line: usize, col: usize, msg: String },

    /// Unexpected end of input
    #[error("Unexpected end of input at line {line}, column {col}: expected {expected}")]
    UnexpectedEof {
        line: usize,
        col: usize,
        expected: String,
    },

    /// Well-formed tokens in an invalid arrangement (e.g. an address
    /// declaration not followed by a container)
    #[error("Invalid TDN format at line {line}, column {col}: {msg}")]
    InvalidFormat { line: usize, col: usize, msg: String },

    /// A deferred reference whose address was never bound in the document
    #[error("Unresolved reference to address {address}")]
    UnresolvedReference { address: Address },

    /// A reference edge whose target is not part of the document being written
    #[error("Dangling reference to address {address}")]
    DanglingReference { address: Address },

    /// A reference resolved to a value of the wrong variant
    #[error("Type mismatch at address {address}: expected {expected}, found {found}")]
    TypeMismatch {
        expected: TypeTag,
        found: TypeTag,
        address: Address,
    },

    /// An address was declared twice for different containers
    #[error("Duplicate address declaration {address}")]
    DuplicateAddress { address: Address },

    /// Every error collected while resolving deferred references
    #[error("{} reference(s) failed to resolve: {}", .0.len(), summarize(.0))]
    Resolution(Vec<Error>),

    /// More addresses were declared than the configured limit allows
    #[error("Address limit of {limit} exceeded")]
    AddressLimit { limit: usize },

    /// A container handle that does not belong to the document
    #[error("Unknown container #{index}")]
    UnknownContainer { index: usize },

    /// One container held through handles with different attributes; its
    /// declaration can only carry one attribute set
    #[error("Container #{index} is shared with conflicting attributes")]
    ConflictingAttributes { index: usize },

    /// The writer reached a container nested deeper than the configured limit
    #[error("Nesting deeper than {limit} levels")]
    DepthLimit { limit: usize },

    /// A document operation applied to a value of the wrong variant
    #[error("Expected {expected}, found {found}")]
    WrongType { expected: TypeTag, found: TypeTag },

    /// Unsupported type for serialization
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    /// Custom error
    #[error("Error: {0}")]
    Custom(String),
}

fn summarize(errors: &[Error]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Creates a syntax error with line and column information.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use serde_tdn::Error;
    ///
    /// let err = Error::syntax(10, 5, "unexpected token");
    /// assert!(err.to_string().contains("line 10"));
    /// ```
    pub fn syntax(line: usize, col: usize, msg: &str) -> Self {
        Error::Syntax {
            line,
            col,
            msg: msg.to_string(),
        }
    }

    /// Creates an invalid format error for misplaced but well-formed tokens.
    pub fn invalid_format(line: usize, col: usize, msg: &str) -> Self {
        Error::InvalidFormat {
            line,
            col,
            msg: msg.to_string(),
        }
    }

    /// Creates an unexpected end-of-file error.
    pub fn unexpected_eof(line: usize, col: usize, expected: &str) -> Self {
        Error::UnexpectedEof {
            line,
            col,
            expected: expected.to_string(),
        }
    }

    /// Creates an unsupported type error for values that have no TDN form.
    pub fn unsupported_type(msg: &str) -> Self {
        Error::UnsupportedType(msg.to_string())
    }

    /// Creates a custom error with a display message.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use serde_tdn::Error;
    ///
    /// let err = Error::custom("something went wrong");
    /// assert!(err.to_string().contains("something went wrong"));
    /// ```
    pub fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Custom(msg.to_string())
    }

    /// Creates an I/O error for file reading/writing failures.
    pub fn io(msg: &str) -> Self {
        Error::Io(msg.to_string())
    }

    /// Returns the addresses of every unresolved reference carried by this
    /// error, looking inside [`Error::Resolution`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// use serde_tdn::{parse, Address};
    ///
    /// let err = parse("[Ref:Sequence 0x3, Ref:Record 0x4]").unwrap_err();
    /// assert_eq!(err.unresolved_addresses(), vec![Address(3), Address(4)]);
    /// ```
    pub fn unresolved_addresses(&self) -> Vec<Address> {
        match self {
            Error::UnresolvedReference { address } => vec![*address],
            Error::Resolution(errors) => errors
                .iter()
                .flat_map(Error::unresolved_addresses)
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl serde::ser::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Custom(msg.to_string())
    }
}

impl serde::de::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Custom(msg.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
