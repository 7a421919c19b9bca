//! TDN text reader.
//!
//! The [`Reader`] turns text into a tree of [`ParseNode`]s: each node carries
//! its variant (or container children), its attributes, and any address
//! declaration, already demarcated. It does not resolve references or build
//! containers; that is the job of [`crate::de`], which consumes parse nodes.
//!
//! ```rust
//! use serde_tdn::parse::{NodeKind, Reader};
//!
//! let node = Reader::from_str("#2;[1, Ref:Sequence 0x2]").read_document().unwrap();
//! assert_eq!(node.address.map(|a| a.0), Some(2));
//! match node.kind {
//!     NodeKind::Sequence(children) => assert_eq!(children.len(), 2),
//!     _ => panic!("expected a sequence"),
//! }
//! ```

use crate::attribute::AttributeSet;
use crate::context::Address;
use crate::map::PropertyName;
use crate::options::Options;
use crate::value::{Data, TypeTag};
use crate::{Error, Result};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration};
use num_bigint::BigInt;
use std::str::FromStr;

/// Line and column (both 1-based) where a value starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

/// One value as delivered by the reader.
#[derive(Clone, Debug, PartialEq)]
pub struct ParseNode {
    pub attributes: AttributeSet,
    pub address: Option<Address>,
    pub kind: NodeKind,
    pub position: Position,
}

#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    /// Any non-container literal, including typed nulls.
    Scalar(Data),
    /// A `Ref:<TypeTag> 0x<address>` token.
    Reference { tag: TypeTag, address: Address },
    Sequence(Vec<ParseNode>),
    Record(Vec<(PropertyName, ParseNode)>),
}

/// The TDN text reader.
pub struct Reader<'de> {
    input: &'de str,
    position: usize,
    line: usize,
    column: usize,
    depth: usize,
    max_depth: usize,
}

pub(crate) fn is_ident_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}

pub(crate) fn is_ident_continue(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '.'
}

impl<'de> Reader<'de> {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(input: &'de str) -> Self {
        Self::with_options(input, &Options::default())
    }

    pub fn with_options(input: &'de str, options: &Options) -> Self {
        Reader {
            input,
            position: 0,
            line: 1,
            column: 1,
            depth: 0,
            max_depth: options.max_depth,
        }
    }

    /// Reads exactly one value followed by the end of input.
    pub fn read_document(&mut self) -> Result<ParseNode> {
        let node = self.read_value()?;
        self.skip_whitespace();
        if !self.at_end() {
            return Err(Error::syntax(
                self.line,
                self.column,
                "unexpected trailing characters after document",
            ));
        }
        Ok(node)
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    fn next_char(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.position += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    fn rest(&self) -> &'de str {
        &self.input[self.position..]
    }

    fn here(&self) -> Position {
        Position {
            line: self.line,
            column: self.column,
        }
    }

    /// Skips whitespace, newlines, and `//` line comments.
    fn skip_whitespace(&mut self) {
        loop {
            match self.peek_char() {
                Some(ch) if ch.is_whitespace() => {
                    self.next_char();
                }
                Some('/') if self.rest().starts_with("//") => {
                    while let Some(ch) = self.next_char() {
                        if ch == '\n' {
                            break;
                        }
                    }
                }
                _ => break,
            }
        }
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        match self.peek_char() {
            Some(ch) if ch == expected => {
                self.next_char();
                Ok(())
            }
            Some(ch) => Err(Error::syntax(
                self.line,
                self.column,
                &format!("expected '{}', found '{}'", expected, ch),
            )),
            None => Err(Error::unexpected_eof(
                self.line,
                self.column,
                &format!("'{}'", expected),
            )),
        }
    }

    fn read_identifier(&mut self) -> Option<&'de str> {
        match self.peek_char() {
            Some(ch) if is_ident_start(ch) => {}
            _ => return None,
        }
        let start = self.position;
        while let Some(ch) = self.peek_char() {
            if is_ident_continue(ch) {
                self.next_char();
            } else {
                break;
            }
        }
        Some(&self.input[start..self.position])
    }

    /// Reads a quoted string or symbol body; the opening quote is next.
    fn read_quoted(&mut self, quote: char) -> Result<String> {
        self.expect(quote)?;
        let mut result = String::new();

        while let Some(ch) = self.next_char() {
            match ch {
                c if c == quote => return Ok(result),
                '\\' => match self.next_char() {
                    Some('\\') => result.push('\\'),
                    Some('"') => result.push('"'),
                    Some('\'') => result.push('\''),
                    Some('n') => result.push('\n'),
                    Some('r') => result.push('\r'),
                    Some('t') => result.push('\t'),
                    Some('b') => result.push('\u{0008}'),
                    Some('f') => result.push('\u{000C}'),
                    Some('0') => result.push('\0'),
                    Some('u') => {
                        let mut hex = String::new();
                        for _ in 0..4 {
                            match self.next_char() {
                                Some(ch) if ch.is_ascii_hexdigit() => hex.push(ch),
                                _ => {
                                    return Err(Error::syntax(
                                        self.line,
                                        self.column,
                                        "invalid unicode escape sequence (expected 4 hex digits)",
                                    ))
                                }
                            }
                        }
                        let ch = u32::from_str_radix(&hex, 16)
                            .ok()
                            .and_then(char::from_u32)
                            .ok_or_else(|| {
                                Error::syntax(self.line, self.column, "invalid unicode code point")
                            })?;
                        result.push(ch);
                    }
                    // Unknown escape - preserve literally
                    Some(other) => {
                        result.push('\\');
                        result.push(other);
                    }
                    None => {
                        return Err(Error::unexpected_eof(
                            self.line,
                            self.column,
                            "end of escape sequence",
                        ))
                    }
                },
                other => result.push(other),
            }
        }
        Err(Error::unexpected_eof(
            self.line,
            self.column,
            &format!("closing {}", quote),
        ))
    }

    /// Reads a non-negative integer in decimal or `0x` hex.
    fn read_uint(&mut self) -> Result<u64> {
        let (line, column) = (self.line, self.column);
        let radix = if self.rest().starts_with("0x") || self.rest().starts_with("0X") {
            self.next_char();
            self.next_char();
            16
        } else {
            10
        };
        let start = self.position;
        while let Some(ch) = self.peek_char() {
            if ch.is_digit(radix) {
                self.next_char();
            } else {
                break;
            }
        }
        let digits = &self.input[start..self.position];
        if digits.is_empty() {
            return Err(Error::syntax(line, column, "expected an address"));
        }
        u64::from_str_radix(digits, radix)
            .map_err(|_| Error::syntax(line, column, "address out of range"))
    }

    fn read_number(&mut self) -> Result<Data> {
        let (line, column) = (self.line, self.column);
        let start = self.position;
        let negative = self.peek_char() == Some('-');
        if negative {
            self.next_char();
        }

        if self.rest().starts_with("0x") || self.rest().starts_with("0X") {
            self.next_char();
            self.next_char();
            let digits_start = self.position;
            while matches!(self.peek_char(), Some(ch) if ch.is_ascii_hexdigit()) {
                self.next_char();
            }
            let digits = &self.input[digits_start..self.position];
            let magnitude = BigInt::parse_bytes(digits.as_bytes(), 16)
                .ok_or_else(|| Error::syntax(line, column, "invalid hex integer"))?;
            self.reject_number_suffix(line, column)?;
            return Ok(Data::Integer(if negative { -magnitude } else { magnitude }));
        }

        let mut is_decimal = false;
        self.read_digits(line, column)?;
        // `1.` and `.5` are not numbers; the point needs digits on both sides.
        if self.peek_char() == Some('.') {
            is_decimal = true;
            self.next_char();
            self.read_digits(line, column)?;
        }
        if matches!(self.peek_char(), Some('e') | Some('E')) {
            is_decimal = true;
            self.next_char();
            if matches!(self.peek_char(), Some('+') | Some('-')) {
                self.next_char();
            }
            self.read_digits(line, column)?;
        }
        self.reject_number_suffix(line, column)?;

        let text = &self.input[start..self.position];
        if is_decimal {
            BigDecimal::from_str(text)
                .map(Data::Decimal)
                .map_err(|_| Error::syntax(line, column, "invalid decimal"))
        } else {
            BigInt::from_str(text)
                .map(Data::Integer)
                .map_err(|_| Error::syntax(line, column, "invalid integer"))
        }
    }

    fn read_digits(&mut self, line: usize, column: usize) -> Result<()> {
        let start = self.position;
        while matches!(self.peek_char(), Some(ch) if ch.is_ascii_digit()) {
            self.next_char();
        }
        if start == self.position {
            return Err(Error::syntax(line, column, "expected digits"));
        }
        Ok(())
    }

    fn reject_number_suffix(&self, line: usize, column: usize) -> Result<()> {
        match self.peek_char() {
            Some(ch) if is_ident_continue(ch) => {
                Err(Error::syntax(line, column, "invalid character in number"))
            }
            _ => Ok(()),
        }
    }

    fn read_attributes(&mut self) -> Result<AttributeSet> {
        let mut attributes = AttributeSet::new();
        while self.peek_char() == Some('@') {
            self.next_char();
            let (line, column) = (self.line, self.column);
            let key = self
                .read_identifier()
                .ok_or_else(|| Error::syntax(line, column, "expected attribute key"))?;
            let value = if self.peek_char() == Some(':') {
                self.next_char();
                self.skip_whitespace();
                if self.peek_char() == Some('"') {
                    Some(self.read_quoted('"')?)
                } else {
                    let start = self.position;
                    while matches!(self.peek_char(), Some(ch) if ch != ';') {
                        self.next_char();
                    }
                    Some(self.input[start..self.position].trim().to_string())
                }
            } else {
                None
            };
            self.skip_whitespace();
            self.expect(';')?;
            attributes.push(key, value.as_deref());
            self.skip_whitespace();
        }
        Ok(attributes)
    }

    /// Reads one value, including its attributes and address declaration.
    pub fn read_value(&mut self) -> Result<ParseNode> {
        self.skip_whitespace();
        let position = self.here();
        let attributes = self.read_attributes()?;

        let address = if self.peek_char() == Some('#') {
            self.next_char();
            let address = Address(self.read_uint()?);
            self.skip_whitespace();
            self.expect(';')?;
            self.skip_whitespace();
            if !matches!(self.peek_char(), Some('[') | Some('{')) {
                return Err(Error::invalid_format(
                    self.line,
                    self.column,
                    "address declaration must precede a sequence or record",
                ));
            }
            Some(address)
        } else {
            None
        };

        let kind = match self.peek_char() {
            None => return Err(Error::unexpected_eof(self.line, self.column, "a value")),
            Some('[') => self.read_sequence()?,
            Some('{') => self.read_record()?,
            Some('"') => NodeKind::Scalar(Data::String(self.read_quoted('"')?)),
            Some('\'') => NodeKind::Scalar(Data::Symbol(self.read_quoted('\'')?)),
            Some(ch) if ch == '-' || ch.is_ascii_digit() => NodeKind::Scalar(self.read_number()?),
            Some(ch) if is_ident_start(ch) => self.read_word()?,
            Some(ch) => {
                return Err(Error::syntax(
                    self.line,
                    self.column,
                    &format!("unexpected character '{}'", ch),
                ))
            }
        };

        Ok(ParseNode {
            attributes,
            address,
            kind,
            position,
        })
    }

    /// Keywords, typed nulls, tagged literals, references, and bare symbols.
    fn read_word(&mut self) -> Result<NodeKind> {
        let (line, column) = (self.line, self.column);
        let word = self
            .read_identifier()
            .ok_or_else(|| Error::syntax(line, column, "expected identifier"))?;

        if let Some(tag) = word.strip_prefix("null.") {
            let tag = tag
                .parse::<TypeTag>()
                .map_err(|_| Error::syntax(line, column, &format!("unknown null type '{}'", tag)))?;
            return Ok(NodeKind::Scalar(Data::Null(tag)));
        }

        match word {
            "true" => return Ok(NodeKind::Scalar(Data::Boolean(true))),
            "false" => return Ok(NodeKind::Scalar(Data::Boolean(false))),
            "null" => {
                return Err(Error::syntax(
                    line,
                    column,
                    "null must name its type, e.g. null.String",
                ))
            }
            _ => {}
        }

        if self.peek_char() != Some(':') {
            return Ok(NodeKind::Scalar(Data::Symbol(word.to_string())));
        }

        match word {
            "Ref" => {
                self.next_char();
                self.read_reference()
            }
            "Timestamp" | "Duration" | "Blob" => {
                self.next_char();
                let payload = self.read_quoted('"')?;
                parse_tagged(word, &payload)
                    .map(NodeKind::Scalar)
                    .ok_or_else(|| {
                        Error::syntax(line, column, &format!("invalid {} literal", word))
                    })
            }
            _ => Err(Error::syntax(
                line,
                column,
                &format!("unexpected ':' after symbol '{}'", word),
            )),
        }
    }

    fn read_reference(&mut self) -> Result<NodeKind> {
        let (line, column) = (self.line, self.column);
        let tag = self
            .read_identifier()
            .ok_or_else(|| Error::syntax(line, column, "expected type tag after 'Ref:'"))?;
        let tag = tag
            .parse::<TypeTag>()
            .map_err(|_| Error::syntax(line, column, &format!("unknown type tag '{}'", tag)))?;
        if !matches!(self.peek_char(), Some(ch) if ch.is_whitespace()) {
            return Err(Error::syntax(
                self.line,
                self.column,
                "expected whitespace before reference address",
            ));
        }
        self.skip_whitespace();
        let address = Address(self.read_uint()?);
        Ok(NodeKind::Reference { tag, address })
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(Error::invalid_format(
                self.line,
                self.column,
                &format!("nesting deeper than {} levels", self.max_depth),
            ));
        }
        Ok(())
    }

    fn read_sequence(&mut self) -> Result<NodeKind> {
        self.enter()?;
        self.expect('[')?;
        let mut children = Vec::new();
        loop {
            self.skip_whitespace();
            if self.peek_char() == Some(']') {
                self.next_char();
                break;
            }
            children.push(self.read_value()?);
            self.skip_whitespace();
            match self.peek_char() {
                Some(',') => {
                    self.next_char();
                }
                Some(']') => {
                    self.next_char();
                    break;
                }
                Some(ch) => {
                    return Err(Error::syntax(
                        self.line,
                        self.column,
                        &format!("expected ',' or ']', found '{}'", ch),
                    ))
                }
                None => return Err(Error::unexpected_eof(self.line, self.column, "']'")),
            }
        }
        self.depth -= 1;
        Ok(NodeKind::Sequence(children))
    }

    fn read_property_name(&mut self) -> Result<PropertyName> {
        let attributes = self.read_attributes()?;
        let text = match self.peek_char() {
            Some('\'') => self.read_quoted('\'')?,
            Some('"') => self.read_quoted('"')?,
            _ => {
                let (line, column) = (self.line, self.column);
                self.read_identifier()
                    .ok_or_else(|| Error::syntax(line, column, "expected property name"))?
                    .to_string()
            }
        };
        Ok(PropertyName { text, attributes })
    }

    fn read_record(&mut self) -> Result<NodeKind> {
        self.enter()?;
        self.expect('{')?;
        let mut properties = Vec::new();
        loop {
            self.skip_whitespace();
            if self.peek_char() == Some('}') {
                self.next_char();
                break;
            }
            let name = self.read_property_name()?;
            self.skip_whitespace();
            self.expect(':')?;
            let value = self.read_value()?;
            properties.push((name, value));
            self.skip_whitespace();
            match self.peek_char() {
                Some(',') => {
                    self.next_char();
                }
                Some('}') => {
                    self.next_char();
                    break;
                }
                Some(ch) => {
                    return Err(Error::syntax(
                        self.line,
                        self.column,
                        &format!("expected ',' or '}}', found '{}'", ch),
                    ))
                }
                None => return Err(Error::unexpected_eof(self.line, self.column, "'}'")),
            }
        }
        self.depth -= 1;
        Ok(NodeKind::Record(properties))
    }
}

fn parse_tagged(tag: &str, payload: &str) -> Option<Data> {
    match tag {
        "Timestamp" => DateTime::parse_from_rfc3339(payload)
            .ok()
            .map(Data::Timestamp),
        "Duration" => parse_duration(payload).map(Data::Duration),
        "Blob" => hex::decode(payload).ok().map(Data::Blob),
        _ => None,
    }
}

/// Parses `[-]<seconds>[.<fraction>]s` with up to nanosecond precision.
pub(crate) fn parse_duration(text: &str) -> Option<Duration> {
    let body = text.strip_suffix('s')?;
    let (negative, body) = match body.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, body),
    };
    let (whole, fraction) = match body.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (body, ""),
    };
    if whole.is_empty()
        || !whole.bytes().all(|b| b.is_ascii_digit())
        || fraction.len() > 9
        || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    let seconds: i64 = whole.parse().ok()?;
    let nanos: i64 = if fraction.is_empty() {
        0
    } else {
        format!("{:0<9}", fraction).parse().ok()?
    };
    let duration = Duration::try_seconds(seconds)?.checked_add(&Duration::nanoseconds(nanos))?;
    Some(if negative { -duration } else { duration })
}
