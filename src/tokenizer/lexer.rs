//! # XML Lexer
//!
//! Breaks an XML document into start tags, end tags and character data.
//! Comments, processing instructions, the XML declaration and the document
//! type declaration are skipped.
use std::borrow::Cow;
use std::error::Error;
use std::fmt;

use crate::tokenizer::{Attribute, XmlToken};

/// Malformed markup, with the byte offset it was found at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexError {
    /// The input ended inside markup.
    UnexpectedEof(usize),
    /// A byte that cannot appear here.
    UnexpectedByte {
        /// Byte offset in the input
        offset: usize,
        /// The offending character
        found: char,
        /// What the lexer was looking for
        expected: &'static str,
    },
    /// An entity or character reference that cannot be decoded.
    BadReference {
        /// Byte offset in the input
        offset: usize,
        /// The reference as written, without `&` and `;`
        reference: String,
    },
}

impl LexError {
    /// Byte offset of the error in the input.
    #[must_use]
    pub const fn offset(&self) -> usize {
        match self {
            Self::UnexpectedEof(offset)
            | Self::UnexpectedByte { offset, .. }
            | Self::BadReference { offset, .. } => *offset,
        }
    }
}

impl Error for LexError {}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEof(offset) => write!(f, "unexpected end of input at byte {offset}"),
            Self::UnexpectedByte { offset, found, expected } => {
                write!(f, "expected {expected} at byte {offset}, found {found:?}")
            }
            Self::BadReference { offset, reference } => {
                write!(f, "cannot decode reference &{reference}; at byte {offset}")
            }
        }
    }
}

/// A pull lexer over an XML document.
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    /// The input document
    input: &'a str,
    /// Current position (current byte)
    position: usize,
    /// Current reading position (after current byte)
    read_position: usize,
    /// Current byte under examination
    byte: u8,
    /// Whether `Eof` was handed out
    done: bool,
}

impl<'a> Lexer<'a> {
    /// Constructs a lexer positioned at the start of the input.
    #[must_use]
    pub fn new(input: &'a str) -> Self {
        let mut lexer = Self { input, position: 0, read_position: 0, byte: 0, done: false };
        // put the lexer in an initial working state
        lexer.read_byte();
        lexer
    }

    /// Byte offset of the next unread token.
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.position
    }

    /// Reads and consumes the next byte in the input.
    fn read_byte(&mut self) {
        self.byte = self.input.as_bytes().get(self.read_position).copied().unwrap_or(0);
        self.position = self.read_position.min(self.input.len());
        self.read_position += 1;
    }

    fn at_eof(&self) -> bool {
        self.position >= self.input.len()
    }

    fn rest(&self) -> &'a str {
        &self.input[self.position..]
    }

    /// Advance past `count` bytes.
    fn skip(&mut self, count: usize) {
        for _ in 0..count {
            self.read_byte();
        }
    }

    /// Consume whitespace byte(s) starting from the current position.
    fn skip_whitespace(&mut self) {
        while matches!(self.byte, b' ' | b'\t' | b'\n' | b'\r') {
            self.read_byte();
        }
    }

    /// Skip past the next occurrence of `terminator`.
    fn skip_past(&mut self, terminator: &str) -> Result<(), LexError> {
        let start = self.position;
        match self.rest().find(terminator) {
            Some(index) => {
                self.skip(index + terminator.len());
                Ok(())
            }
            None => Err(LexError::UnexpectedEof(start)),
        }
    }

    fn unexpected(&self, expected: &'static str) -> LexError {
        if self.at_eof() {
            return LexError::UnexpectedEof(self.position);
        }
        let found = self.rest().chars().next().unwrap_or('\0');
        LexError::UnexpectedByte { offset: self.position, found, expected }
    }

    fn expect(&mut self, byte: u8, expected: &'static str) -> Result<(), LexError> {
        if self.byte == byte && !self.at_eof() {
            self.read_byte();
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    /// Returns the next token in the input from the current position.
    ///
    /// # Errors
    ///
    /// Returns a [`LexError`] on malformed markup.
    pub fn next_token(&mut self) -> Result<XmlToken<'a>, LexError> {
        loop {
            if self.at_eof() {
                return Ok(XmlToken::Eof);
            }
            if self.byte != b'<' {
                return self.read_text();
            }

            let rest = self.rest();
            if rest.starts_with("</") {
                return self.read_end_tag();
            } else if rest.starts_with("<?") {
                self.skip_past("?>")?;
            } else if rest.starts_with("<!--") {
                self.skip_past("-->")?;
            } else if rest.starts_with("<![CDATA[") {
                return self.read_cdata();
            } else if rest.starts_with("<!DOCTYPE") {
                self.skip_doctype()?;
            } else if rest.starts_with("<!") {
                self.read_byte();
                return Err(self.unexpected("comment, CDATA section or DOCTYPE"));
            } else {
                return self.read_start_tag();
            }
        }
    }

    /// Reads character data up to the next markup.
    fn read_text(&mut self) -> Result<XmlToken<'a>, LexError> {
        let start = self.position;
        let length = self.rest().find('<').unwrap_or(self.rest().len());
        self.skip(length);
        let raw = &self.input[start..start + length];
        Ok(XmlToken::Text(decode(raw, start, false)?))
    }

    fn read_cdata(&mut self) -> Result<XmlToken<'a>, LexError> {
        let opening = "<![CDATA[".len();
        let start = self.position + opening;
        let Some(length) = self.input[start..].find("]]>") else {
            return Err(LexError::UnexpectedEof(self.position));
        };
        self.skip(opening + length + "]]>".len());
        Ok(XmlToken::Text(Cow::Borrowed(&self.input[start..start + length])))
    }

    /// Skips `<!DOCTYPE ...>`, including an internal subset in brackets.
    fn skip_doctype(&mut self) -> Result<(), LexError> {
        let start = self.position;
        let mut depth = 0usize;
        while !self.at_eof() {
            match self.byte {
                b'[' => depth += 1,
                b']' => depth = depth.saturating_sub(1),
                b'>' if depth == 0 => {
                    self.read_byte();
                    return Ok(());
                }
                _ => {}
            }
            self.read_byte();
        }
        Err(LexError::UnexpectedEof(start))
    }

    /// Reads a tag or attribute name.
    fn read_name(&mut self) -> Result<&'a str, LexError> {
        let start = self.position;
        while !self.at_eof()
            && !matches!(
                self.byte,
                b' ' | b'\t' | b'\n' | b'\r' | b'/' | b'>' | b'<' | b'=' | b'"' | b'\''
            )
        {
            self.read_byte();
        }
        if self.position == start {
            return Err(self.unexpected("a name"));
        }
        Ok(&self.input[start..self.position])
    }

    fn read_start_tag(&mut self) -> Result<XmlToken<'a>, LexError> {
        // skip '<'
        self.read_byte();
        let name = self.read_name()?;
        let mut attributes = Vec::new();

        loop {
            self.skip_whitespace();
            match self.byte {
                b'>' if !self.at_eof() => {
                    self.read_byte();
                    return Ok(XmlToken::StartTag { name, attributes, self_closing: false });
                }
                b'/' => {
                    self.read_byte();
                    self.expect(b'>', "'>' after '/'")?;
                    return Ok(XmlToken::StartTag { name, attributes, self_closing: true });
                }
                _ => attributes.push(self.read_attribute()?),
            }
        }
    }

    fn read_attribute(&mut self) -> Result<Attribute<'a>, LexError> {
        let name = self.read_name()?;
        self.skip_whitespace();
        self.expect(b'=', "'=' after attribute name")?;
        self.skip_whitespace();

        let quote = self.byte;
        if !matches!(quote, b'"' | b'\'') || self.at_eof() {
            return Err(self.unexpected("a quoted attribute value"));
        }
        self.read_byte();
        let start = self.position;
        while !self.at_eof() && self.byte != quote {
            if self.byte == b'<' {
                return Err(self.unexpected("attribute value without '<'"));
            }
            self.read_byte();
        }
        if self.at_eof() {
            return Err(LexError::UnexpectedEof(self.position));
        }
        let raw = &self.input[start..self.position];
        // skip closing quote
        self.read_byte();
        Ok(Attribute { name, value: decode(raw, start, true)? })
    }

    fn read_end_tag(&mut self) -> Result<XmlToken<'a>, LexError> {
        // skip "</"
        self.skip(2);
        let name = self.read_name()?;
        self.skip_whitespace();
        self.expect(b'>', "'>' closing the end tag")?;
        Ok(XmlToken::EndTag { name })
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<XmlToken<'a>, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let token = self.next_token();
        if matches!(token, Ok(XmlToken::Eof) | Err(_)) {
            self.done = true;
        }
        Some(token)
    }
}

/// Decode entity and character references. Attribute values additionally
/// have literal whitespace normalised to spaces.
fn decode(raw: &str, offset: usize, attribute: bool) -> Result<Cow<'_, str>, LexError> {
    let needs_normalising = attribute && raw.contains(['\t', '\n', '\r']);
    if !raw.contains('&') && !needs_normalising {
        return Ok(Cow::Borrowed(raw));
    }

    let mut decoded = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        push_normalised(&mut decoded, &rest[..amp], attribute);
        let at = offset + (raw.len() - rest.len()) + amp;
        let after = &rest[amp + 1..];
        let Some(semicolon) = after.find(';') else {
            return Err(LexError::BadReference { offset: at, reference: after.to_string() });
        };
        let reference = &after[..semicolon];
        let bad = || LexError::BadReference { offset: at, reference: reference.to_string() };
        let c = match reference {
            "lt" => '<',
            "gt" => '>',
            "amp" => '&',
            "apos" => '\'',
            "quot" => '"',
            _ => {
                let code = if let Some(hex) = reference.strip_prefix("#x") {
                    u32::from_str_radix(hex, 16).map_err(|_| bad())?
                } else if let Some(dec) = reference.strip_prefix('#') {
                    dec.parse::<u32>().map_err(|_| bad())?
                } else {
                    return Err(bad());
                };
                char::from_u32(code).ok_or_else(bad)?
            }
        };
        decoded.push(c);
        rest = &after[semicolon + 1..];
    }
    push_normalised(&mut decoded, rest, attribute);
    Ok(Cow::Owned(decoded))
}

fn push_normalised(out: &mut String, text: &str, attribute: bool) {
    if attribute {
        out.extend(text.chars().map(|c| if matches!(c, '\t' | '\n' | '\r') { ' ' } else { c }));
    } else {
        out.push_str(text);
    }
}

/// Tokenize an XML document.
#[must_use]
pub fn tokenize(text: &str) -> Lexer<'_> {
    Lexer::new(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<XmlToken<'_>> {
        tokenize(input).collect::<Result<Vec<_>, _>>().unwrap()
    }

    fn start<'a>(name: &'a str, attributes: &[(&'a str, &'a str)], self_closing: bool) -> XmlToken<'a> {
        XmlToken::StartTag {
            name,
            attributes: attributes
                .iter()
                .map(|&(name, value)| Attribute { name, value: Cow::Borrowed(value) })
                .collect(),
            self_closing,
        }
    }

    #[test]
    fn elements_and_text() {
        assert_eq!(
            tokens("<a><b id=\"1\" x='y'>hi</b><c/></a>"),
            vec![
                start("a", &[], false),
                start("b", &[("id", "1"), ("x", "y")], false),
                XmlToken::Text(Cow::Borrowed("hi")),
                XmlToken::EndTag { name: "b" },
                start("c", &[], true),
                XmlToken::EndTag { name: "a" },
                XmlToken::Eof,
            ]
        );
    }

    #[test]
    fn prolog_and_comments_are_skipped() {
        let input = "<?xml version=\"1.0\"?>\n<!DOCTYPE a [<!ENTITY e \"x\">]><!-- c --><a><?pi x?></a>";
        assert_eq!(
            tokens(input),
            vec![
                XmlToken::Text(Cow::Borrowed("\n")),
                start("a", &[], false),
                XmlToken::EndTag { name: "a" },
                XmlToken::Eof,
            ]
        );
    }

    #[test]
    fn references_are_decoded() {
        let all = tokens("<a t=\"&lt;&#65;&#x42;\">x &amp; y</a>");
        assert_eq!(all[0], start("a", &[("t", "<AB")], false));
        assert_eq!(all[1], XmlToken::Text(Cow::Borrowed("x & y")));
    }

    #[test]
    fn cdata_is_verbatim() {
        let all = tokens("<a><![CDATA[<b>&amp;]]></a>");
        assert_eq!(all[1], XmlToken::Text(Cow::Borrowed("<b>&amp;")));
    }

    #[test]
    fn attribute_whitespace_is_normalised() {
        let all = tokens("<a t=\"x\ny\"/>");
        assert_eq!(all[0], start("a", &[("t", "x y")], true));
    }

    #[test]
    fn errors_carry_offsets() {
        let err = tokenize("<a b=1/>").find_map(Result::err).unwrap();
        assert!(matches!(err, LexError::UnexpectedByte { offset: 5, .. }), "{err:?}");

        let err = tokenize("<a>&bogus;</a>").find_map(Result::err).unwrap();
        assert_eq!(err, LexError::BadReference { offset: 3, reference: "bogus".to_string() });

        let err = tokenize("<a><!-- open").find_map(Result::err).unwrap();
        assert_eq!(err.offset(), 3);

        let err = tokenize("<a").find_map(Result::err).unwrap();
        assert!(matches!(err, LexError::UnexpectedEof(2)), "{err:?}");
    }

    #[test]
    fn iteration_stops_after_eof() {
        let mut lexer = tokenize("");
        assert_eq!(lexer.next(), Some(Ok(XmlToken::Eof)));
        assert_eq!(lexer.next(), None);
    }
}
