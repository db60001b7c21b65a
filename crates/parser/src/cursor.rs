use lexer::{Lexer, Token, TokenKind};
use syntax::{Location, Result, SourceIdentifier};

/// A one-token-lookahead view over a [`Lexer`] that filters out trivia
/// (spacing, indentation, comments) the parser never needs to see.
///
/// Once `EndOfData` has been peeked it is cached rather than requested again,
/// since the lexer raises `Internal` if asked for a token past it.
pub struct TokenCursor<'s> {
    lexer: Lexer<'s>,
    peeked: Option<Token>,
}

impl<'s> TokenCursor<'s> {
    pub fn new(lexer: Lexer<'s>) -> Self {
        Self { lexer, peeked: None }
    }

    fn fill(&mut self) -> Result<()> {
        if self.peeked.is_some() {
            return Ok(());
        }
        loop {
            let token = self.lexer.next_token()?;
            match token.kind {
                TokenKind::Spacing | TokenKind::Indentation | TokenKind::Comment => continue,
                _ => {
                    self.peeked = Some(token);
                    return Ok(());
                }
            }
        }
    }

    pub fn peek(&mut self) -> Result<&Token> {
        self.fill()?;
        Ok(self.peeked.as_ref().expect("filled above"))
    }

    pub fn bump(&mut self) -> Result<Token> {
        self.fill()?;
        Ok(self.peeked.take().expect("filled above"))
    }

    pub fn source_identifier(&self) -> &SourceIdentifier {
        self.lexer.source_identifier()
    }

    pub fn digest(&self) -> [u8; 32] {
        self.lexer.digest()
    }

    pub fn location_at(&self, token: &Token) -> Location {
        Location::new(self.source_identifier().clone(), token.begin)
    }

    /// Consume a trailing line break, or leave a trailing `EndOfData` in
    /// place for the caller to observe. Used after every line-shaped
    /// construct (key/value line, section header, meta directive) so the
    /// top-level document loop is the only place that ever consumes the
    /// final `EndOfData`.
    pub fn expect_eol(&mut self) -> Result<()> {
        let token = self.peek()?.clone();
        match token.kind {
            TokenKind::LineBreak => {
                self.bump()?;
                Ok(())
            }
            TokenKind::EndOfData => Ok(()),
            _ => Err(syntax::Error::syntax("expected the end of the line").with_location(self.location_at(&token))),
        }
    }
}
