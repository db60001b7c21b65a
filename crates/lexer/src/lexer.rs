use std::collections::VecDeque;

use source::Character;
use syntax::{Bytes, Date, DateTime, Error, Location, Position, Result, Time, TimeDelta, TimeUnit, TimeZone};

use crate::token::{Token, TokenKind, TokenPayload};
use crate::token_decoder::TokenDecoder;

/// Where the cursor sits relative to the current logical line: at its start
/// (a name, section, or meta directive may open here) or past that, inside
/// a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineContext {
    Start,
    Value,
}

#[derive(Debug, Clone, Copy)]
enum MultiLineKind {
    Text,
    Code,
    Regex,
    Bytes,
}

impl MultiLineKind {
    fn marker(self) -> &'static str {
        match self {
            MultiLineKind::Text => "\"\"\"",
            MultiLineKind::Code => "```",
            MultiLineKind::Regex => "///",
            MultiLineKind::Bytes => "<<<",
        }
    }

    fn open_kind(self) -> TokenKind {
        match self {
            MultiLineKind::Text => TokenKind::MultiLineTextOpen,
            MultiLineKind::Code => TokenKind::MultiLineCodeOpen,
            MultiLineKind::Regex => TokenKind::MultiLineRegexOpen,
            MultiLineKind::Bytes => TokenKind::MultiLineBytesOpen,
        }
    }

    fn close_kind(self) -> TokenKind {
        match self {
            MultiLineKind::Text => TokenKind::MultiLineTextClose,
            MultiLineKind::Code => TokenKind::MultiLineCodeClose,
            MultiLineKind::Regex => TokenKind::MultiLineRegexClose,
            MultiLineKind::Bytes => TokenKind::MultiLineBytesClose,
        }
    }

    fn content_kind(self) -> TokenKind {
        match self {
            MultiLineKind::Text => TokenKind::MultiLineText,
            MultiLineKind::Code => TokenKind::MultiLineCode,
            MultiLineKind::Regex => TokenKind::MultiLineRegex,
            MultiLineKind::Bytes => TokenKind::MultiLineBytes,
        }
    }
}

/// Deterministic state machine turning a decoded character stream into a
/// lazy sequence of [`Token`]s.
///
/// The machine tracks a single piece of state beyond the cursor position:
/// whether it currently sits at the start of a logical line (where a
/// section, meta directive, or name may open) or past it (where a value is
/// expected). Everything else — most notably disambiguating a bare `*`
/// (the multi-line value-list marker) from `*[` (a section-list open) — is
/// resolved by looking one character ahead rather than by threading extra
/// context through the state machine.
pub struct Lexer<'s> {
    decoder: TokenDecoder<'s>,
    pending: VecDeque<Token>,
    context: LineContext,
    finished: bool,
    error: Option<Error>,
}

impl<'s> Lexer<'s> {
    pub fn new(decoder: TokenDecoder<'s>) -> Self {
        Self { decoder, pending: VecDeque::new(), context: LineContext::Start, finished: false, error: None }
    }

    pub fn source_identifier(&self) -> &syntax::SourceIdentifier {
        self.decoder.source_identifier()
    }

    pub fn digest(&self) -> [u8; 32] {
        self.decoder.digest()
    }

    /// Produce the next token. Once `EndOfData` has been returned, every
    /// further call raises `Internal` — the lexer is a single-pass,
    /// single-use iterator. Once any error has been raised, every further
    /// call returns a clone of that same error.
    pub fn next_token(&mut self) -> Result<Token> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        if self.pending.is_empty() {
            if self.finished {
                let err = Error::internal("next_token() called after the lexer already reached the end of the stream");
                self.error = Some(err.clone());
                return Err(err);
            }
            if let Err(err) = self.scan_next() {
                self.error = Some(err.clone());
                return Err(err);
            }
        }
        let token = self.pending.pop_front().expect("a successful scan always queues at least one token");
        if token.kind == TokenKind::LineBreak {
            self.context = LineContext::Start;
        }
        if token.kind == TokenKind::EndOfData {
            self.finished = true;
        }
        Ok(token)
    }

    // -- low-level character helpers -----------------------------------

    fn peek_char(&mut self) -> Result<Option<char>> {
        Ok(self.decoder.peek()?.as_char())
    }

    fn peek_at_char(&mut self, offset: usize) -> Result<Option<char>> {
        Ok(self.decoder.peek_at(offset)?.as_char())
    }

    fn location(&self) -> Location {
        Location::new(self.decoder.source_identifier().clone(), self.decoder.position())
    }

    fn location_at(&self, position: Position) -> Location {
        Location::new(self.decoder.source_identifier().clone(), position)
    }

    /// Advance while `accept` holds, returning the consumed text.
    fn scan_run(&mut self, mut accept: impl FnMut(char) -> bool) -> Result<String> {
        let tx = self.decoder.begin_transaction();
        loop {
            match self.decoder.peek()? {
                Character::Scalar(c, _) if accept(c) => {
                    self.decoder.advance()?;
                }
                _ => break,
            }
        }
        let text = self.decoder.text_since(tx);
        self.decoder.commit_transaction(tx);
        Ok(text)
    }

    /// Digit run allowing a single `'` grouping separator between runs,
    /// never leading, trailing, or doubled. Returns the digits with
    /// grouping separators stripped.
    fn scan_grouped_digits(&mut self, is_digit: impl Fn(char) -> bool) -> Result<String> {
        let mut out = String::new();
        loop {
            match self.peek_char()? {
                Some(c) if is_digit(c) => {
                    out.push(c);
                    self.decoder.advance()?;
                }
                Some('\'') if !out.is_empty() => {
                    if matches!(self.peek_at_char(1)?, Some(d) if is_digit(d)) {
                        self.decoder.advance()?;
                    } else {
                        break;
                    }
                }
                _ => break,
            }
        }
        Ok(out)
    }

    // -- top-level dispatch ----------------------------------------------

    fn scan_next(&mut self) -> Result<()> {
        match self.decoder.peek()? {
            Character::EndOfData(pos) => {
                self.pending.push_back(Token::new(TokenKind::EndOfData, String::new(), pos, pos, TokenPayload::None));
                Ok(())
            }
            Character::Scalar(c, _) => {
                if c == '\n' || c == '\r' {
                    self.scan_line_break()
                } else if c == ' ' || c == '\t' {
                    self.scan_spacing()
                } else if c == '#' {
                    self.scan_comment()
                } else if self.context == LineContext::Start {
                    self.scan_line_start(c)?;
                    // Everything else on this logical line is a value, not
                    // another line-start construct; `next_token()` resets
                    // this back to `Start` when it hands out a `LineBreak`.
                    self.context = LineContext::Value;
                    Ok(())
                } else {
                    self.scan_value(c)
                }
            }
        }
    }

    fn scan_line_break(&mut self) -> Result<()> {
        let begin = self.decoder.position();
        let first = self.decoder.advance()?.as_char().expect("checked Scalar above");
        let mut text = String::from(first);
        if first == '\r' && self.peek_char()? == Some('\n') {
            self.decoder.advance()?;
            text.push('\n');
        }
        self.pending.push_back(Token::new(TokenKind::LineBreak, text, begin, self.decoder.position(), TokenPayload::None));
        Ok(())
    }

    fn scan_spacing(&mut self) -> Result<()> {
        let begin = self.decoder.position();
        let text = self.scan_run(|c| c == ' ' || c == '\t')?;
        let kind = if self.context == LineContext::Start { TokenKind::Indentation } else { TokenKind::Spacing };
        self.pending.push_back(Token::new(kind, text, begin, self.decoder.position(), TokenPayload::None));
        Ok(())
    }

    fn skip_inline_spacing_into_pending(&mut self) -> Result<()> {
        let begin = self.decoder.position();
        let text = self.scan_run(|c| c == ' ' || c == '\t')?;
        if !text.is_empty() {
            self.pending.push_back(Token::new(TokenKind::Spacing, text, begin, self.decoder.position(), TokenPayload::None));
        }
        Ok(())
    }

    fn scan_comment(&mut self) -> Result<()> {
        let begin = self.decoder.position();
        let text = self.scan_run(|c| c != '\n' && c != '\r')?;
        self.pending.push_back(Token::new(TokenKind::Comment, text, begin, self.decoder.position(), TokenPayload::None));
        Ok(())
    }

    // -- start-of-line dispatch ------------------------------------------

    fn scan_line_start(&mut self, c: char) -> Result<()> {
        match c {
            '@' => self.scan_meta_name(),
            '-' | '+' | '[' => self.scan_section_header(),
            '*' => {
                if self.peek_at_char(1)? == Some('[') {
                    self.scan_section_header()
                } else {
                    let pos = self.decoder.position();
                    self.decoder.advance()?;
                    self.pending.push_back(Token::new(TokenKind::MultiLineValueListSeparator, "*".into(), pos, self.decoder.position(), TokenPayload::None));
                    Ok(())
                }
            }
            '"' => {
                let begin = self.decoder.position();
                let (raw, decoded) = self.scan_text_literal()?;
                self.pending.push_back(Token::new(TokenKind::TextName, raw, begin, self.decoder.position(), TokenPayload::Text(decoded)));
                Ok(())
            }
            c if c.is_ascii_alphabetic() => {
                let begin = self.decoder.position();
                let text = self.scan_regular_name()?;
                self.pending.push_back(Token::new(TokenKind::RegularName, text.clone(), begin, self.decoder.position(), TokenPayload::Text(text)));
                Ok(())
            }
            _ => Err(Error::syntax(format!("unexpected character '{c}' at the start of a line")).with_location(self.location())),
        }
    }

    fn scan_meta_name(&mut self) -> Result<()> {
        let begin = self.decoder.position();
        self.decoder.advance()?; // '@'
        let name = self.scan_run(|c| c.is_ascii_alphanumeric() || c == '_')?;
        if name.is_empty() {
            return Err(Error::syntax("expected a meta directive name after '@'").with_location(self.location()));
        }
        let raw = format!("@{name}");
        self.pending.push_back(Token::new(TokenKind::MetaName, raw, begin, self.decoder.position(), TokenPayload::Text(name)));
        Ok(())
    }

    fn scan_regular_name(&mut self) -> Result<String> {
        let raw = self.scan_run(|c| c.is_ascii_alphanumeric() || c == '_' || c == ' ')?;
        let trimmed = raw.trim_end_matches(' ');
        let trailing = raw.chars().count() - trimmed.chars().count();
        if trailing > 0 {
            self.decoder.retreat(trailing);
        }
        if trimmed.is_empty() {
            return Err(Error::syntax("expected a name").with_location(self.location()));
        }
        Ok(trimmed.to_string())
    }

    fn scan_section_header(&mut self) -> Result<()> {
        let begin = self.decoder.position();
        let leading = self.scan_run(|c| c == '-' || c == '+')?;
        let is_list = if self.peek_char()? == Some('*') {
            self.decoder.advance()?;
            true
        } else {
            false
        };
        match self.decoder.advance()? {
            Character::Scalar('[', _) => {}
            _ => return Err(Error::syntax("expected '[' to open a section").with_location(self.location())),
        }
        let open_raw = format!("{leading}{}[", if is_list { "*" } else { "" });
        let open_kind = if is_list { TokenKind::SectionListOpen } else { TokenKind::SectionMapOpen };
        self.pending.push_back(Token::new(open_kind, open_raw, begin, self.decoder.position(), TokenPayload::None));

        self.skip_inline_spacing_into_pending()?;
        // An optional leading '.' marks a relative section path.
        if self.peek_char()? == Some('.') {
            let pos = self.decoder.position();
            self.decoder.advance()?;
            self.pending.push_back(Token::new(TokenKind::NamePathSeparator, ".".into(), pos, self.decoder.position(), TokenPayload::None));
            self.skip_inline_spacing_into_pending()?;
        }
        loop {
            match self.peek_char()? {
                Some('"') => {
                    let name_begin = self.decoder.position();
                    let (raw, decoded) = self.scan_text_literal()?;
                    self.pending.push_back(Token::new(TokenKind::TextName, raw, name_begin, self.decoder.position(), TokenPayload::Text(decoded)));
                }
                Some(c) if c.is_ascii_alphabetic() => {
                    let name_begin = self.decoder.position();
                    let text = self.scan_regular_name()?;
                    self.pending.push_back(Token::new(TokenKind::RegularName, text.clone(), name_begin, self.decoder.position(), TokenPayload::Text(text)));
                }
                _ => return Err(Error::syntax("expected a name path segment inside a section header").with_location(self.location())),
            }
            self.skip_inline_spacing_into_pending()?;
            if self.peek_char()? == Some('.') {
                let pos = self.decoder.position();
                self.decoder.advance()?;
                self.pending.push_back(Token::new(TokenKind::NamePathSeparator, ".".into(), pos, self.decoder.position(), TokenPayload::None));
                self.skip_inline_spacing_into_pending()?;
            } else {
                break;
            }
        }

        let close_begin = self.decoder.position();
        match self.decoder.advance()? {
            Character::Scalar(']', _) => {}
            _ => return Err(Error::syntax("expected ']' to close a section").with_location(self.location())),
        }
        if is_list {
            if self.peek_char()? != Some('*') {
                return Err(Error::syntax("a section-list close must be written ']*'").with_location(self.location()));
            }
            self.decoder.advance()?;
        }
        let trailing = self.scan_run(|c| c == '-' || c == '+')?;
        let close_raw = format!("]{}{}", if is_list { "*" } else { "" }, trailing);
        let close_kind = if is_list { TokenKind::SectionListClose } else { TokenKind::SectionMapClose };
        self.pending.push_back(Token::new(close_kind, close_raw, close_begin, self.decoder.position(), TokenPayload::None));
        Ok(())
    }

    // -- value-position dispatch ------------------------------------------

    fn scan_value(&mut self, c: char) -> Result<()> {
        match c {
            ':' | '=' => {
                let pos = self.decoder.position();
                self.decoder.advance()?;
                self.pending.push_back(Token::new(TokenKind::NameValueSeparator, c.to_string(), pos, self.decoder.position(), TokenPayload::None));
                Ok(())
            }
            ',' => {
                let pos = self.decoder.position();
                self.decoder.advance()?;
                self.pending.push_back(Token::new(TokenKind::ValueListSeparator, ",".into(), pos, self.decoder.position(), TokenPayload::None));
                Ok(())
            }
            '*' => {
                let pos = self.decoder.position();
                if self.peek_at_char(1)? == Some('[') {
                    self.decoder.advance()?;
                    self.decoder.advance()?;
                    self.pending.push_back(Token::new(TokenKind::SectionListOpen, "*[".into(), pos, self.decoder.position(), TokenPayload::None));
                } else {
                    self.decoder.advance()?;
                    self.pending.push_back(Token::new(TokenKind::MultiLineValueListSeparator, "*".into(), pos, self.decoder.position(), TokenPayload::None));
                }
                Ok(())
            }
            '"' => self.dispatch_text_or_multiline(),
            '`' => self.dispatch_code_or_multiline(),
            '/' => self.dispatch_regex_or_multiline(),
            '<' => self.dispatch_bytes_or_multiline(),
            '0'..='9' | '+' | '-' => {
                let token = self.scan_number_token()?;
                self.pending.push_back(token);
                Ok(())
            }
            '.' if matches!(self.peek_at_char(1)?, Some(d) if d.is_ascii_digit()) => {
                let token = self.scan_number_token()?;
                self.pending.push_back(token);
                Ok(())
            }
            c if c.is_ascii_alphabetic() => {
                let token = self.scan_word_value()?;
                self.pending.push_back(token);
                Ok(())
            }
            _ => Err(Error::syntax(format!("unexpected character '{c}' in a value")).with_location(self.location())),
        }
    }

    fn scan_word_value(&mut self) -> Result<Token> {
        let begin = self.decoder.position();
        let word = self.scan_run(|c| c.is_ascii_alphabetic())?;
        let lower = word.to_ascii_lowercase();
        let boolean = match lower.as_str() {
            "true" | "yes" | "enabled" | "on" => Some(true),
            "false" | "no" | "disabled" | "off" => Some(false),
            _ => None,
        };
        if let Some(value) = boolean {
            return Ok(Token::new(TokenKind::Boolean, word, begin, self.decoder.position(), TokenPayload::Boolean(value)));
        }
        match lower.as_str() {
            "nan" => Ok(Token::new(TokenKind::Float, word, begin, self.decoder.position(), TokenPayload::Float(f64::NAN))),
            "inf" => Ok(Token::new(TokenKind::Float, word, begin, self.decoder.position(), TokenPayload::Float(f64::INFINITY))),
            _ => Err(Error::syntax(format!("'{word}' is not a recognised value keyword")).with_location(self.location_at(begin))),
        }
    }

    // -- text / code / regex / bytes --------------------------------------

    fn dispatch_text_or_multiline(&mut self) -> Result<()> {
        if self.peek_at_char(1)? == Some('"') && self.peek_at_char(2)? == Some('"') {
            self.scan_multiline_literal(MultiLineKind::Text)
        } else {
            let begin = self.decoder.position();
            let (raw, decoded) = self.scan_text_literal()?;
            self.pending.push_back(Token::new(TokenKind::Text, raw, begin, self.decoder.position(), TokenPayload::Text(decoded)));
            Ok(())
        }
    }

    fn scan_text_literal(&mut self) -> Result<(String, String)> {
        let tx = self.decoder.begin_transaction();
        self.decoder.advance()?; // opening quote
        let mut decoded = String::new();
        loop {
            match self.decoder.peek()? {
                Character::EndOfData(_) => return Err(Error::unexpected_end("unterminated text literal").with_location(self.location())),
                Character::Scalar('"', _) => {
                    self.decoder.advance()?;
                    break;
                }
                Character::Scalar('\n', _) | Character::Scalar('\r', _) => {
                    return Err(Error::syntax("a text literal must not contain a line break").with_location(self.location()));
                }
                Character::Scalar('\\', _) => {
                    self.decoder.advance()?;
                    decoded.push(self.scan_text_escape()?);
                }
                Character::Scalar(c, _) => {
                    self.decoder.advance()?;
                    decoded.push(c);
                }
            }
        }
        let raw = self.decoder.text_since(tx);
        self.decoder.commit_transaction(tx);
        Ok((raw, decoded))
    }

    fn scan_text_escape(&mut self) -> Result<char> {
        let begin = self.decoder.position();
        match self.decoder.advance()? {
            Character::Scalar('"', _) => Ok('"'),
            Character::Scalar('\\', _) => Ok('\\'),
            Character::Scalar('$', _) => Ok('$'),
            Character::Scalar('n', _) | Character::Scalar('N', _) => Ok('\n'),
            Character::Scalar('r', _) | Character::Scalar('R', _) => Ok('\r'),
            Character::Scalar('t', _) | Character::Scalar('T', _) => Ok('\t'),
            Character::Scalar('u', _) => {
                if self.peek_char()? == Some('{') {
                    self.decoder.advance()?;
                    let mut hex = String::new();
                    loop {
                        match self.decoder.peek()? {
                            Character::Scalar('}', _) => {
                                self.decoder.advance()?;
                                break;
                            }
                            Character::Scalar(c, _) if c.is_ascii_hexdigit() && hex.len() < 8 => {
                                hex.push(c);
                                self.decoder.advance()?;
                            }
                            _ => return Err(Error::syntax("invalid \\u{...} escape").with_location(self.location_at(begin))),
                        }
                    }
                    decode_hex_scalar(&hex).map_err(|e| e.with_location(self.location_at(begin)))
                } else {
                    let mut hex = String::new();
                    for _ in 0..4 {
                        match self.decoder.advance()? {
                            Character::Scalar(c, _) if c.is_ascii_hexdigit() => hex.push(c),
                            _ => return Err(Error::syntax("invalid \\uHHHH escape").with_location(self.location_at(begin))),
                        }
                    }
                    decode_hex_scalar(&hex).map_err(|e| e.with_location(self.location_at(begin)))
                }
            }
            Character::EndOfData(_) => Err(Error::unexpected_end("unterminated escape sequence").with_location(self.location_at(begin))),
            Character::Scalar(_, _) => Err(Error::syntax("unknown escape sequence").with_location(self.location_at(begin))),
        }
    }

    fn dispatch_code_or_multiline(&mut self) -> Result<()> {
        if self.peek_at_char(1)? == Some('`') && self.peek_at_char(2)? == Some('`') {
            self.scan_multiline_literal(MultiLineKind::Code)
        } else {
            let begin = self.decoder.position();
            let tx = self.decoder.begin_transaction();
            self.decoder.advance()?; // opening '`'
            let mut decoded = String::new();
            loop {
                match self.decoder.peek()? {
                    Character::EndOfData(_) => return Err(Error::unexpected_end("unterminated code literal").with_location(self.location())),
                    Character::Scalar('`', _) => {
                        self.decoder.advance()?;
                        break;
                    }
                    Character::Scalar('\n', _) | Character::Scalar('\r', _) => {
                        return Err(Error::syntax("a code literal must not contain a line break").with_location(self.location()));
                    }
                    Character::Scalar(c, _) => {
                        self.decoder.advance()?;
                        decoded.push(c);
                    }
                }
            }
            let raw = self.decoder.text_since(tx);
            self.decoder.commit_transaction(tx);
            self.pending.push_back(Token::new(TokenKind::Code, raw, begin, self.decoder.position(), TokenPayload::Text(decoded)));
            Ok(())
        }
    }

    fn dispatch_regex_or_multiline(&mut self) -> Result<()> {
        if self.peek_at_char(1)? == Some('/') && self.peek_at_char(2)? == Some('/') {
            self.scan_multiline_literal(MultiLineKind::Regex)
        } else {
            let begin = self.decoder.position();
            let (raw, decoded) = self.scan_regex_single_line()?;
            self.pending.push_back(Token::new(TokenKind::RegEx, raw, begin, self.decoder.position(), TokenPayload::RegEx(decoded)));
            Ok(())
        }
    }

    fn scan_regex_single_line(&mut self) -> Result<(String, String)> {
        let tx = self.decoder.begin_transaction();
        self.decoder.advance()?; // opening '/'
        let mut decoded = String::new();
        loop {
            match self.decoder.peek()? {
                Character::EndOfData(_) => return Err(Error::unexpected_end("unterminated regular expression literal").with_location(self.location())),
                Character::Scalar('/', _) => {
                    self.decoder.advance()?;
                    break;
                }
                Character::Scalar('\n', _) | Character::Scalar('\r', _) => {
                    return Err(Error::syntax("a regular expression literal must not contain a line break").with_location(self.location()));
                }
                Character::Scalar('\\', _) => {
                    self.decoder.advance()?;
                    match self.decoder.peek()? {
                        Character::Scalar('/', _) => {
                            self.decoder.advance()?;
                            decoded.push('/');
                        }
                        Character::Scalar(other, _) => {
                            self.decoder.advance()?;
                            decoded.push('\\');
                            decoded.push(other);
                        }
                        Character::EndOfData(_) => {
                            return Err(Error::unexpected_end("unterminated escape in a regular expression literal").with_location(self.location()));
                        }
                    }
                }
                Character::Scalar(c, _) => {
                    self.decoder.advance()?;
                    decoded.push(c);
                }
            }
        }
        let raw = self.decoder.text_since(tx);
        self.decoder.commit_transaction(tx);
        Ok((raw, decoded))
    }

    fn dispatch_bytes_or_multiline(&mut self) -> Result<()> {
        if self.peek_at_char(1)? == Some('<') && self.peek_at_char(2)? == Some('<') {
            self.scan_multiline_literal(MultiLineKind::Bytes)
        } else {
            let begin = self.decoder.position();
            let (raw, bytes) = self.scan_bytes_single_line()?;
            self.pending.push_back(Token::new(TokenKind::Bytes, raw, begin, self.decoder.position(), TokenPayload::Bytes(bytes)));
            Ok(())
        }
    }

    fn scan_bytes_single_line(&mut self) -> Result<(String, Bytes)> {
        let tx = self.decoder.begin_transaction();
        self.decoder.advance()?; // '<'
        let fmt_tx = self.decoder.begin_transaction();
        let ident = self.scan_run(|c| c.is_ascii_alphabetic())?;
        let has_format = !ident.is_empty() && self.peek_char()? == Some(':');
        if has_format {
            self.decoder.advance()?; // ':'
            self.decoder.commit_transaction(fmt_tx);
            if !ident.eq_ignore_ascii_case("hex") {
                return Err(Error::unsupported(format!("unsupported byte literal format '{ident}'")).with_location(self.location()));
            }
        } else {
            self.decoder.rollback_transaction(fmt_tx);
        }
        let mut hex_text = String::new();
        loop {
            match self.decoder.peek()? {
                Character::EndOfData(_) => return Err(Error::unexpected_end("unterminated byte literal").with_location(self.location())),
                Character::Scalar('>', _) => {
                    self.decoder.advance()?;
                    break;
                }
                Character::Scalar(c, _) if c.is_ascii_hexdigit() || c.is_whitespace() => {
                    hex_text.push(c);
                    self.decoder.advance()?;
                }
                Character::Scalar(_, _) => return Err(Error::syntax("a byte literal must only contain hex digits").with_location(self.location())),
            }
        }
        let bytes = Bytes::from_hex_pairs(&hex_text)?;
        let raw = self.decoder.text_since(tx);
        self.decoder.commit_transaction(tx);
        Ok((raw, bytes))
    }

    // -- multi-line literals ----------------------------------------------

    fn scan_multiline_literal(&mut self, kind: MultiLineKind) -> Result<()> {
        let begin = self.decoder.position();
        for _ in 0..3 {
            self.decoder.advance()?;
        }
        self.pending.push_back(Token::new(kind.open_kind(), kind.marker().to_string(), begin, self.decoder.position(), TokenPayload::None));

        self.skip_inline_spacing_into_pending()?;
        match kind {
            MultiLineKind::Code => {
                let lang_begin = self.decoder.position();
                let lang = self.scan_run(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '+' | '.' | '-'))?;
                if !lang.is_empty() {
                    if lang.chars().count() > 16 {
                        return Err(Error::syntax("a code language identifier must be at most 16 characters long").with_location(self.location_at(lang_begin)));
                    }
                    self.pending.push_back(Token::new(TokenKind::MultiLineCodeLanguage, lang, lang_begin, self.decoder.position(), TokenPayload::None));
                    self.skip_inline_spacing_into_pending()?;
                }
            }
            MultiLineKind::Bytes => {
                let fmt_begin = self.decoder.position();
                let fmt = self.scan_run(|c| c.is_ascii_alphabetic())?;
                if !fmt.is_empty() {
                    if !fmt.eq_ignore_ascii_case("hex") {
                        return Err(Error::unsupported(format!("unsupported byte literal format '{fmt}'")).with_location(self.location_at(fmt_begin)));
                    }
                    self.pending.push_back(Token::new(TokenKind::MultiLineBytesFormat, fmt, fmt_begin, self.decoder.position(), TokenPayload::None));
                    self.skip_inline_spacing_into_pending()?;
                }
            }
            MultiLineKind::Text | MultiLineKind::Regex => {}
        }

        if self.peek_char()? == Some('#') {
            self.scan_comment()?;
        }
        match self.decoder.peek()? {
            Character::Scalar('\n', _) | Character::Scalar('\r', _) => self.scan_line_break()?,
            _ => return Err(Error::syntax("expected a line break after a multi-line literal opening").with_location(self.location())),
        }

        let mut indent_prefix: Option<String> = None;
        let mut content_lines: Vec<String> = Vec::new();
        let content_begin = self.decoder.position();
        let marker = kind.marker();

        let (close_begin, close_prefix) = loop {
            let line_begin = self.decoder.position();
            let line = match self.read_physical_line()? {
                Some(line) => line,
                None => return Err(Error::unexpected_end("document ended inside a multi-line literal").with_location(self.location_at(line_begin))),
            };
            let trimmed = line.trim_start_matches([' ', '\t']);
            let this_prefix = &line[..line.len() - trimmed.len()];

            if trimmed.starts_with(marker) {
                let expected = indent_prefix.as_deref().unwrap_or("");
                if this_prefix == expected {
                    break (line_begin, this_prefix.to_string());
                }
            }

            if trimmed.is_empty() {
                content_lines.push(String::new());
                continue;
            }

            match &indent_prefix {
                None => {
                    indent_prefix = Some(this_prefix.to_string());
                    content_lines.push(trimmed.to_string());
                }
                Some(prefix) => {
                    if this_prefix != prefix {
                        return Err(Error::indentation("multi-line literal content does not match the established indent prefix").with_location(self.location_at(line_begin)));
                    }
                    content_lines.push(trimmed.to_string());
                }
            }
        };

        let joined = content_lines.join("\n");
        let (content_kind, payload) = match kind {
            MultiLineKind::Text => (TokenKind::MultiLineText, TokenPayload::Text(decode_text_escape_string(&joined)?)),
            MultiLineKind::Code => (TokenKind::MultiLineCode, TokenPayload::Text(joined.clone())),
            MultiLineKind::Regex => (TokenKind::MultiLineRegex, TokenPayload::RegEx(decode_regex_escape_string(&joined))),
            MultiLineKind::Bytes => (TokenKind::MultiLineBytes, TokenPayload::Bytes(Bytes::from_hex_pairs(&joined)?)),
        };
        let _ = kind.content_kind();
        self.pending.push_back(Token::new(content_kind, joined, content_begin, close_begin, payload));
        let close_raw = format!("{close_prefix}{marker}");
        self.pending.push_back(Token::new(kind.close_kind(), close_raw, close_begin, self.decoder.position(), TokenPayload::None));
        Ok(())
    }

    /// Consume one physical line's text (excluding its terminator) and the
    /// terminator itself. Returns `None` at end-of-data.
    fn read_physical_line(&mut self) -> Result<Option<String>> {
        if matches!(self.decoder.peek()?, Character::EndOfData(_)) {
            return Ok(None);
        }
        let text = self.scan_run(|c| c != '\n' && c != '\r')?;
        match self.decoder.peek()? {
            Character::Scalar('\r', _) => {
                self.decoder.advance()?;
                if self.peek_char()? == Some('\n') {
                    self.decoder.advance()?;
                }
            }
            Character::Scalar('\n', _) => {
                self.decoder.advance()?;
            }
            _ => {}
        }
        Ok(Some(text))
    }

    // -- numeric / date / time literals ------------------------------------

    fn try_digits(&mut self, count: usize) -> Result<Option<u32>> {
        let tx = self.decoder.begin_transaction();
        let mut value = 0u32;
        for _ in 0..count {
            match self.decoder.peek()? {
                Character::Scalar(c, _) if c.is_ascii_digit() => {
                    value = value * 10 + c.to_digit(10).expect("checked is_ascii_digit");
                    self.decoder.advance()?;
                }
                _ => {
                    self.decoder.rollback_transaction(tx);
                    return Ok(None);
                }
            }
        }
        self.decoder.commit_transaction(tx);
        Ok(Some(value))
    }

    fn try_scan_date(&mut self) -> Result<Option<Date>> {
        let tx = self.decoder.begin_transaction();
        let year = match self.try_digits(4)? {
            Some(y) => y,
            None => {
                self.decoder.rollback_transaction(tx);
                return Ok(None);
            }
        };
        if self.peek_char()? != Some('-') {
            self.decoder.rollback_transaction(tx);
            return Ok(None);
        }
        self.decoder.advance()?;
        let month = match self.try_digits(2)? {
            Some(m) => m,
            None => {
                self.decoder.rollback_transaction(tx);
                return Ok(None);
            }
        };
        if self.peek_char()? != Some('-') {
            self.decoder.rollback_transaction(tx);
            return Ok(None);
        }
        self.decoder.advance()?;
        let day = match self.try_digits(2)? {
            Some(d) => d,
            None => {
                self.decoder.rollback_transaction(tx);
                return Ok(None);
            }
        };
        if matches!(self.peek_char()?, Some(c) if c.is_ascii_digit()) {
            self.decoder.rollback_transaction(tx);
            return Ok(None);
        }
        self.decoder.commit_transaction(tx);
        Ok(Some(Date::new(year as u16, month as u8, day as u8)?))
    }

    fn scan_timezone_suffix(&mut self) -> Result<TimeZone> {
        match self.peek_char()? {
            Some('z') | Some('Z') => {
                self.decoder.advance()?;
                Ok(TimeZone::Utc)
            }
            Some(sign @ ('+' | '-')) => {
                self.decoder.advance()?;
                let hours = self.try_digits(2)?.ok_or_else(|| Error::syntax("expected a two-digit timezone hour offset").with_location(self.location()))?;
                let minutes = if self.peek_char()? == Some(':') {
                    self.decoder.advance()?;
                    self.try_digits(2)?.ok_or_else(|| Error::syntax("expected a two-digit timezone minute offset").with_location(self.location()))?
                } else {
                    0
                };
                Ok(TimeZone::Offset { positive: sign == '+', hours: hours as u8, minutes: minutes as u8 })
            }
            _ => Ok(TimeZone::Local),
        }
    }

    fn try_scan_time(&mut self) -> Result<Option<Time>> {
        let tx = self.decoder.begin_transaction();
        let hour = match self.try_digits(2)? {
            Some(h) => h,
            None => {
                self.decoder.rollback_transaction(tx);
                return Ok(None);
            }
        };
        if self.peek_char()? != Some(':') {
            self.decoder.rollback_transaction(tx);
            return Ok(None);
        }
        self.decoder.advance()?;
        let minute = match self.try_digits(2)? {
            Some(m) => m,
            None => {
                self.decoder.rollback_transaction(tx);
                return Ok(None);
            }
        };
        let mut second = 0u32;
        let mut nanosecond = 0u32;
        if self.peek_char()? == Some(':') {
            self.decoder.advance()?;
            second = match self.try_digits(2)? {
                Some(s) => s,
                None => {
                    self.decoder.rollback_transaction(tx);
                    return Ok(None);
                }
            };
            if self.peek_char()? == Some('.') {
                self.decoder.advance()?;
                let frac = self.scan_run(|c| c.is_ascii_digit())?;
                if frac.is_empty() || frac.len() > 9 {
                    self.decoder.rollback_transaction(tx);
                    return Ok(None);
                }
                nanosecond = format!("{frac:0<9}").parse().unwrap_or(0);
            }
        }
        let timezone = self.scan_timezone_suffix()?;
        self.decoder.commit_transaction(tx);
        Ok(Some(Time::new(hour as u8, minute as u8, second as u8, nanosecond, timezone)?))
    }

    fn try_scan_datetime(&mut self) -> Result<Option<DateTime>> {
        let tx = self.decoder.begin_transaction();
        let date = match self.try_scan_date()? {
            Some(d) => d,
            None => {
                self.decoder.rollback_transaction(tx);
                return Ok(None);
            }
        };
        match self.peek_char()? {
            Some(' ') | Some('t') | Some('T') => {
                self.decoder.advance()?;
            }
            _ => {
                self.decoder.rollback_transaction(tx);
                return Ok(None);
            }
        }
        let time = match self.try_scan_time()? {
            Some(t) => t,
            None => {
                self.decoder.rollback_transaction(tx);
                return Ok(None);
            }
        };
        self.decoder.commit_transaction(tx);
        Ok(Some(DateTime::new(date, time)))
    }

    fn scan_number_token(&mut self) -> Result<Token> {
        let begin = self.decoder.position();
        let tx = self.decoder.begin_transaction();
        let had_sign = matches!(self.peek_char()?, Some('+') | Some('-'));
        let negative = had_sign && self.peek_char()? == Some('-');
        if had_sign {
            self.decoder.advance()?;
        }

        if !had_sign {
            if let Some(value) = self.try_scan_datetime()? {
                let raw = self.decoder.text_since(tx);
                self.decoder.commit_transaction(tx);
                return Ok(Token::new(TokenKind::DateTime, raw, begin, self.decoder.position(), TokenPayload::DateTime(value)));
            }
            if let Some(value) = self.try_scan_date()? {
                let raw = self.decoder.text_since(tx);
                self.decoder.commit_transaction(tx);
                return Ok(Token::new(TokenKind::Date, raw, begin, self.decoder.position(), TokenPayload::Date(value)));
            }
            if let Some(value) = self.try_scan_time()? {
                let raw = self.decoder.text_since(tx);
                self.decoder.commit_transaction(tx);
                return Ok(Token::new(TokenKind::Time, raw, begin, self.decoder.position(), TokenPayload::Time(value)));
            }
        }

        if matches!(self.peek_char()?, Some(c) if c.is_ascii_alphabetic()) {
            let word = self.scan_run(|c| c.is_ascii_alphabetic())?;
            let value = match word.to_ascii_lowercase().as_str() {
                "nan" => f64::NAN,
                "inf" => {
                    if negative {
                        f64::NEG_INFINITY
                    } else {
                        f64::INFINITY
                    }
                }
                _ => return Err(Error::syntax(format!("'{word}' is not a recognised numeric keyword")).with_location(self.location())),
            };
            let raw = self.decoder.text_since(tx);
            self.decoder.commit_transaction(tx);
            return Ok(Token::new(TokenKind::Float, raw, begin, self.decoder.position(), TokenPayload::Float(value)));
        }

        if self.peek_char()? == Some('0') && matches!(self.peek_at_char(1)?, Some('x') | Some('X') | Some('b') | Some('B')) {
            self.decoder.advance()?; // '0'
            let radix_char = self.decoder.advance()?.as_char().expect("checked above");
            let radix = if radix_char.eq_ignore_ascii_case(&'x') { 16 } else { 2 };
            let digits = self.scan_grouped_digits(|c| if radix == 16 { c.is_ascii_hexdigit() } else { c == '0' || c == '1' })?;
            if digits.is_empty() {
                return Err(Error::syntax("expected digits after a radix prefix").with_location(self.location()));
            }
            let magnitude = i128::from_str_radix(&digits, radix).map_err(|_| Error::limit_exceeded("integer literal out of range").with_location(self.location()))?;
            let signed = if negative { -magnitude } else { magnitude };
            let value = i64::try_from(signed).map_err(|_| Error::limit_exceeded("integer literal exceeds the supported range").with_location(self.location()))?;
            let raw = self.decoder.text_since(tx);
            self.decoder.commit_transaction(tx);
            return Ok(Token::new(TokenKind::Integer, raw, begin, self.decoder.position(), TokenPayload::Integer(value)));
        }

        let int_part = if self.peek_char()? == Some('.') { String::new() } else { self.scan_grouped_digits(|c| c.is_ascii_digit())? };
        if int_part.is_empty() && self.peek_char()? != Some('.') {
            return Err(Error::syntax("expected a numeric literal").with_location(self.location()));
        }
        if int_part.len() > 1 && int_part.starts_with('0') {
            return Err(Error::syntax("a decimal integer must not have a leading zero").with_location(self.location()));
        }

        let mut is_float = false;
        let mut frac_part = String::new();
        if self.peek_char()? == Some('.') {
            is_float = true;
            self.decoder.advance()?;
            frac_part = self.scan_grouped_digits(|c| c.is_ascii_digit())?;
            if int_part.is_empty() && frac_part.is_empty() {
                return Err(Error::syntax("a float literal needs at least one digit").with_location(self.location()));
            }
        }

        let mut exponent = 0i32;
        if matches!(self.peek_char()?, Some('e') | Some('E')) {
            let exp_tx = self.decoder.begin_transaction();
            self.decoder.advance()?;
            let exp_negative = matches!(self.peek_char()?, Some('-'));
            if matches!(self.peek_char()?, Some('+') | Some('-')) {
                self.decoder.advance()?;
            }
            let exp_digits = self.scan_run(|c| c.is_ascii_digit())?;
            if exp_digits.is_empty() {
                self.decoder.rollback_transaction(exp_tx);
            } else {
                self.decoder.commit_transaction(exp_tx);
                is_float = true;
                let magnitude: i64 = exp_digits.parse().unwrap_or(i64::MAX);
                if magnitude > 308 {
                    return Err(Error::limit_exceeded("exponent magnitude exceeds the supported range").with_location(self.location()));
                }
                exponent = if exp_negative { -(magnitude as i32) } else { magnitude as i32 };
            }
        }

        if is_float {
            if frac_part.chars().count() > 16 {
                return Err(Error::limit_exceeded("a float literal's fractional part exceeds 16 significant digits").with_location(self.location()));
            }
            let text = format!(
                "{}{}.{}e{}",
                if negative { "-" } else { "" },
                if int_part.is_empty() { "0" } else { &int_part },
                if frac_part.is_empty() { "0" } else { &frac_part },
                exponent
            );
            let value: f64 = text.parse().map_err(|_| Error::syntax("malformed float literal").with_location(self.location()))?;
            let raw = self.decoder.text_since(tx);
            self.decoder.commit_transaction(tx);
            return Ok(Token::new(TokenKind::Float, raw, begin, self.decoder.position(), TokenPayload::Float(value)));
        }

        let magnitude: i128 = int_part.parse().map_err(|_| Error::limit_exceeded("integer literal out of range").with_location(self.location()))?;
        let mut value = if negative { -magnitude } else { magnitude };

        let suffix_tx = self.decoder.begin_transaction();
        if self.peek_char()? == Some(' ') {
            self.decoder.advance()?;
        }
        let word = self.scan_run(|c| c.is_ascii_alphabetic() || c == '\u{b5}')?;
        if let Some(multiplier) = (!word.is_empty()).then(|| byte_suffix_multiplier(&word)).flatten() {
            self.decoder.commit_transaction(suffix_tx);
            value = value.checked_mul(multiplier).ok_or_else(|| Error::limit_exceeded("byte-count literal overflows").with_location(self.location()))?;
            let final_value = i64::try_from(value).map_err(|_| Error::limit_exceeded("integer literal exceeds the supported range").with_location(self.location()))?;
            let raw = self.decoder.text_since(tx);
            self.decoder.commit_transaction(tx);
            return Ok(Token::new(TokenKind::Integer, raw, begin, self.decoder.position(), TokenPayload::Integer(final_value)));
        }
        if let Some(unit) = (!word.is_empty()).then(|| TimeUnit::parse(&word)).flatten() {
            self.decoder.commit_transaction(suffix_tx);
            let count = i64::try_from(value).map_err(|_| Error::limit_exceeded("time-delta count exceeds the supported range").with_location(self.location()))?;
            let raw = self.decoder.text_since(tx);
            self.decoder.commit_transaction(tx);
            return Ok(Token::new(TokenKind::TimeDelta, raw, begin, self.decoder.position(), TokenPayload::TimeDelta(TimeDelta::new(count, unit))));
        }
        self.decoder.rollback_transaction(suffix_tx);
        let final_value = i64::try_from(value).map_err(|_| Error::limit_exceeded("integer literal exceeds the supported range").with_location(self.location()))?;
        let raw = self.decoder.text_since(tx);
        self.decoder.commit_transaction(tx);
        Ok(Token::new(TokenKind::Integer, raw, begin, self.decoder.position(), TokenPayload::Integer(final_value)))
    }
}

fn byte_suffix_multiplier(word: &str) -> Option<i128> {
    let lower = word.to_ascii_lowercase();
    Some(match lower.as_str() {
        "kb" => 1_000,
        "kib" => 1024,
        "mb" => 1_000_000,
        "mib" => 1024 * 1024,
        "gb" => 1_000_000_000,
        "gib" => 1024i128.pow(3),
        "tb" => 1_000_000_000_000,
        "tib" => 1024i128.pow(4),
        "pb" => 1_000_000_000_000_000,
        "pib" => 1024i128.pow(5),
        "eb" => 1_000_000_000_000_000_000,
        "eib" => 1024i128.pow(6),
        _ => return None,
    })
}

fn decode_hex_scalar(hex: &str) -> Result<char> {
    if hex.is_empty() {
        return Err(Error::syntax("an empty \\u escape is not valid"));
    }
    let value = u32::from_str_radix(hex, 16).map_err(|_| Error::syntax("invalid hex digits in a \\u escape"))?;
    if value == 0 {
        return Err(Error::syntax("a \\u escape must not produce U+0000"));
    }
    char::from_u32(value).ok_or_else(|| Error::syntax("a \\u escape must be a valid Unicode scalar value"))
}

fn decode_text_escape_string(text: &str) -> Result<String> {
    let mut chars = text.chars().peekable();
    let mut out = String::with_capacity(text.len());
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('$') => out.push('$'),
            Some('n') | Some('N') => out.push('\n'),
            Some('r') | Some('R') => out.push('\r'),
            Some('t') | Some('T') => out.push('\t'),
            Some('u') => {
                if chars.peek() == Some(&'{') {
                    chars.next();
                    let mut hex = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(h) if h.is_ascii_hexdigit() && hex.len() < 8 => hex.push(h),
                            _ => return Err(Error::syntax("invalid \\u{...} escape in multi-line text")),
                        }
                    }
                    out.push(decode_hex_scalar(&hex)?);
                } else {
                    let mut hex = String::new();
                    for _ in 0..4 {
                        match chars.next() {
                            Some(h) if h.is_ascii_hexdigit() => hex.push(h),
                            _ => return Err(Error::syntax("invalid \\uHHHH escape in multi-line text")),
                        }
                    }
                    out.push(decode_hex_scalar(&hex)?);
                }
            }
            _ => return Err(Error::syntax("unknown escape sequence in multi-line text")),
        }
    }
    Ok(out)
}

fn decode_regex_escape_string(text: &str) -> String {
    let mut chars = text.chars().peekable();
    let mut out = String::with_capacity(text.len());
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('/') => out.push('/'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
