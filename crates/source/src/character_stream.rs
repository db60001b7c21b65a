use crypto::Sha3_256;
use syntax::{Error, Limits, Location, Position, Result, SourceIdentifier};

use crate::byte_source::ByteSource;

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];
const SIGNATURE_LINE_PREFIX: &[u8] = b"@signature";

/// A decoded Unicode scalar value with its position, or the end-of-data
/// sentinel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Character {
    Scalar(char, Position),
    EndOfData(Position),
}

impl Character {
    pub fn position(&self) -> Position {
        match self {
            Character::Scalar(_, pos) | Character::EndOfData(pos) => *pos,
        }
    }

    pub fn as_char(&self) -> Option<char> {
        match self {
            Character::Scalar(c, _) => Some(*c),
            Character::EndOfData(_) => None,
        }
    }

    pub fn is_end_of_data(&self) -> bool {
        matches!(self, Character::EndOfData(_))
    }

    pub fn is_line_break(&self) -> bool {
        matches!(self.as_char(), Some('\n') | Some('\r'))
    }
}

/// Decodes a byte source into a stream of [`Character`]s, tracking
/// `(line, column, byte-index)` and maintaining a rolling SHA3-256 digest
/// of the document.
///
/// A leading BOM is stripped silently and does not affect positions or the
/// digest. If the document's first line is a `@signature: "..."` line, that
/// line's bytes are decoded normally but excluded from the digest, since
/// the signature line cannot be self-referential.
pub struct CharacterStream {
    source_identifier: SourceIdentifier,
    bytes: Vec<u8>,
    byte_pos: usize,
    position: Position,
    digest: Sha3_256,
    digest_excluded_until: usize,
    limits: Limits,
    current_line_byte_count: usize,
    ended: bool,
}

impl CharacterStream {
    pub fn open(mut source: impl ByteSource, limits: Limits) -> Result<Self> {
        let source_identifier = source.identifier().clone();
        let mut bytes = source.read_all()?;
        if bytes.starts_with(&UTF8_BOM) {
            bytes.drain(0..3);
        }
        let digest_excluded_until = signature_line_extent(&bytes);
        Ok(Self {
            source_identifier,
            bytes,
            byte_pos: 0,
            position: Position::start(),
            digest: Sha3_256::new(),
            digest_excluded_until,
            limits,
            current_line_byte_count: 0,
            ended: false,
        })
    }

    pub fn source_identifier(&self) -> &SourceIdentifier {
        &self.source_identifier
    }

    fn location_at(&self, position: Position) -> Location {
        Location::new(self.source_identifier.clone(), position)
    }

    /// The document digest computed over everything decoded so far, minus
    /// any excluded signature line. Call once the stream has reached
    /// [`Character::EndOfData`] for a digest over the whole document.
    pub fn digest(&self) -> [u8; 32] {
        self.digest.clone().digest()
    }

    /// Decode and return the next character, advancing the stream.
    pub fn next(&mut self) -> Result<Character> {
        if self.ended {
            return Ok(Character::EndOfData(self.position));
        }
        if self.byte_pos >= self.bytes.len() {
            self.ended = true;
            return Ok(Character::EndOfData(self.position));
        }

        let position = self.position;
        let start = self.byte_pos;
        let (raw, byte_len) = self.decode_one(start)?;

        if raw != '\n' && raw != '\r' && raw != '\t' && (raw as u32) < 0x20 {
            return Err(Error::character("control characters are not permitted in document text").with_location(self.location_at(position)));
        }
        if raw == '\u{FEFF}' && start != 0 {
            return Err(Error::encoding("a byte order mark is only permitted at the start of a document").with_location(self.location_at(position)));
        }

        if start >= self.digest_excluded_until {
            self.digest.update(&self.bytes[start..start + byte_len]);
        }

        self.current_line_byte_count += byte_len;
        if self.current_line_byte_count > self.limits.max_line_length() {
            return Err(Error::limit_exceeded("line exceeds the maximum line length").with_location(self.location_at(position)));
        }

        self.byte_pos += byte_len;
        match raw {
            '\n' => {
                self.position.next_line(byte_len as u64);
                self.current_line_byte_count = 0;
            }
            '\r' => {
                if self.bytes.get(self.byte_pos) == Some(&b'\n') {
                    self.position.next_column(byte_len as u64);
                } else {
                    self.position.next_line(byte_len as u64);
                    self.current_line_byte_count = 0;
                }
            }
            _ => self.position.next_column(byte_len as u64),
        }
        Ok(Character::Scalar(raw, position))
    }

    fn decode_one(&self, start: usize) -> Result<(char, usize)> {
        let bytes = &self.bytes[start..];
        let first = bytes[0];
        let (len, initial) = if first < 0x80 {
            (1, first as u32)
        } else if first & 0xE0 == 0xC0 {
            (2, (first & 0x1F) as u32)
        } else if first & 0xF0 == 0xE0 {
            (3, (first & 0x0F) as u32)
        } else if first & 0xF8 == 0xF0 {
            (4, (first & 0x07) as u32)
        } else {
            return Err(self.encoding_error(start));
        };
        if bytes.len() < len {
            return Err(Error::unexpected_end("document ends in the middle of a UTF-8 sequence").with_location(self.location_at(self.position)));
        }
        let mut value = initial;
        for &b in &bytes[1..len] {
            if b & 0xC0 != 0x80 {
                return Err(self.encoding_error(start));
            }
            value = (value << 6) | (b & 0x3F) as u32;
        }
        if len > 1 && value < min_value_for_len(len) {
            return Err(self.encoding_error(start));
        }
        if (0xD800..=0xDFFF).contains(&value) || value > 0x10FFFF {
            return Err(self.encoding_error(start));
        }
        let c = char::from_u32(value).ok_or_else(|| self.encoding_error(start))?;
        Ok((c, len))
    }

    fn encoding_error(&self, start: usize) -> Error {
        Error::encoding("invalid UTF-8 sequence in document").with_location(self.location_at(Position { byte_index: start as u64, ..self.position }))
    }
}

fn min_value_for_len(len: usize) -> u32 {
    match len {
        2 => 0x80,
        3 => 0x800,
        4 => 0x10000,
        _ => 0,
    }
}

/// Byte length of the document's leading `@signature: "..."` line,
/// including its line terminator, or `0` if the document doesn't open with
/// one.
fn signature_line_extent(bytes: &[u8]) -> usize {
    if !bytes.starts_with(SIGNATURE_LINE_PREFIX) {
        return 0;
    }
    match bytes.iter().position(|&b| b == b'\n' || b == b'\r') {
        Some(mut end) => {
            end += 1;
            if bytes.get(end - 1) == Some(&b'\r') && bytes.get(end) == Some(&b'\n') {
                end += 1;
            }
            end
        }
        None => bytes.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::byte_source::StringByteSource;

    fn open(text: &str) -> CharacterStream {
        CharacterStream::open(StringByteSource::new(text), Limits::default()).unwrap()
    }

    #[test]
    fn decodes_ascii_with_column_tracking() {
        let mut stream = open("AB");
        let a = stream.next().unwrap();
        assert_eq!(a.as_char(), Some('A'));
        assert_eq!(a.position(), Position { line: 1, column: 1, byte_index: 0 });
        let b = stream.next().unwrap();
        assert_eq!(b.position(), Position { line: 1, column: 2, byte_index: 1 });
        assert!(stream.next().unwrap().is_end_of_data());
        assert!(stream.next().unwrap().is_end_of_data());
    }

    #[test]
    fn decodes_multibyte_sequences() {
        let mut stream = open("\u{00D7}\u{2190}\u{1F604}");
        assert_eq!(stream.next().unwrap().as_char(), Some('\u{00D7}'));
        assert_eq!(stream.next().unwrap().as_char(), Some('\u{2190}'));
        assert_eq!(stream.next().unwrap().as_char(), Some('\u{1F604}'));
        assert!(stream.next().unwrap().is_end_of_data());
    }

    #[test]
    fn strips_leading_bom_without_affecting_position() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice(b"AB");
        let stream = CharacterStream::open(crate::byte_source::BytesSource::new(bytes), Limits::default());
        let mut stream = stream.unwrap();
        let a = stream.next().unwrap();
        assert_eq!(a.position(), Position::start());
        assert_eq!(a.as_char(), Some('A'));
    }

    #[test]
    fn lone_lf_advances_to_next_line() {
        let mut stream = open("A\nA");
        assert_eq!(stream.next().unwrap().position(), Position { line: 1, column: 1, byte_index: 0 });
        assert_eq!(stream.next().unwrap().position(), Position { line: 1, column: 2, byte_index: 1 });
        assert_eq!(stream.next().unwrap().position(), Position { line: 2, column: 1, byte_index: 2 });
    }

    #[test]
    fn crlf_costs_two_columns_before_advancing_line() {
        let mut stream = open("\r\nA");
        assert_eq!(stream.next().unwrap().position(), Position { line: 1, column: 1, byte_index: 0 });
        assert_eq!(stream.next().unwrap().position(), Position { line: 1, column: 2, byte_index: 1 });
        assert_eq!(stream.next().unwrap().position(), Position { line: 2, column: 1, byte_index: 2 });
    }

    #[test]
    fn lone_cr_behaves_like_its_own_line_break() {
        let mut stream = open("\nA\rA");
        assert_eq!(stream.next().unwrap().position(), Position { line: 1, column: 1, byte_index: 0 });
        assert_eq!(stream.next().unwrap().position(), Position { line: 2, column: 1, byte_index: 1 });
        assert_eq!(stream.next().unwrap().position(), Position { line: 2, column: 2, byte_index: 2 });
        assert_eq!(stream.next().unwrap().position(), Position { line: 3, column: 1, byte_index: 3 });
    }

    #[test]
    fn control_characters_are_rejected() {
        let mut stream = open("A\u{0001}A");
        assert_eq!(stream.next().unwrap().as_char(), Some('A'));
        let err = stream.next().unwrap_err();
        assert_eq!(err.category(), syntax::ErrorCategory::Character);
    }

    #[test]
    fn overlong_and_surrogate_sequences_are_rejected_as_encoding_errors() {
        let bytes = vec![0x41, 0b1110_1101, 0b1010_0000, 0b1000_0000, 0x41];
        let mut stream = CharacterStream::open(crate::byte_source::BytesSource::new(bytes), Limits::default()).unwrap();
        assert_eq!(stream.next().unwrap().as_char(), Some('A'));
        let err = stream.next().unwrap_err();
        assert_eq!(err.category(), syntax::ErrorCategory::Encoding);
    }

    #[test]
    fn signature_line_is_decoded_but_excluded_from_digest() {
        let with_signature = open("@signature: \"sha3-256 ab\"\nkey: 1\n");
        let without_signature = open("key: 1\n");
        let mut with_signature = with_signature;
        let mut without_signature = without_signature;
        while !with_signature.next().unwrap().is_end_of_data() {}
        while !without_signature.next().unwrap().is_end_of_data() {}
        assert_eq!(with_signature.digest(), without_signature.digest());
    }
}
