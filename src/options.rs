//! Configuration options for reading and writing TDN.
//!
//! The reader has no built-in bound on pathological input; callers that read
//! untrusted documents set the limits they need here.
//!
//! ## Examples
//!
//! ```rust
//! use serde_tdn::{parse_with_options, Options};
//!
//! let options = Options::new().with_max_depth(4).with_max_addresses(16);
//! let doc = parse_with_options("#1;[1, [2, [3]], Ref:Sequence 0x1]", &options).unwrap();
//! assert_eq!(doc.root_node().len(), 3);
//!
//! let too_deep = parse_with_options("[[[[[1]]]]]", &options);
//! assert!(too_deep.is_err());
//! ```

/// Configuration options for TDN reading and writing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Options {
    /// Maximum container nesting accepted by the reader.
    pub max_depth: usize,
    /// Maximum number of distinct addresses a document may declare.
    pub max_addresses: Option<usize>,
    /// Maximum input length in bytes.
    pub max_input_len: Option<usize>,
    /// First address handed out by the writer; later ones count up from it.
    pub first_address: u64,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            max_depth: 128,
            max_addresses: None,
            max_input_len: None,
            first_address: 1,
        }
    }
}

impl Options {
    /// Creates default options (depth 128, no address or size limit,
    /// addresses starting at 1).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use serde_tdn::Options;
    ///
    /// let options = Options::new();
    /// assert_eq!(options.max_depth, 128);
    /// assert_eq!(options.first_address, 1);
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    #[must_use]
    pub fn with_max_addresses(mut self, limit: usize) -> Self {
        self.max_addresses = Some(limit);
        self
    }

    #[must_use]
    pub fn with_max_input_len(mut self, limit: usize) -> Self {
        self.max_input_len = Some(limit);
        self
    }

    /// Sets the first address assigned by the writer.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use serde_tdn::{Document, Options, serialize_document_with_options};
    ///
    /// let mut doc = Document::new();
    /// let seq = doc.new_sequence();
    /// doc.push(&seq, seq.clone()).unwrap();
    /// doc.set_root(seq);
    ///
    /// let text = serialize_document_with_options(&doc, &Options::new().with_first_address(16)).unwrap();
    /// assert_eq!(text, "#16;[Ref:Sequence 0x10]");
    /// ```
    #[must_use]
    pub fn with_first_address(mut self, first: u64) -> Self {
        self.first_address = first;
        self
    }
}
