use source::{Character, CharacterStream};
use syntax::{Position, Result};

/// A buffered, transactional cursor over a [`CharacterStream`].
///
/// The underlying stream is a forward-only decoder, so every character it
/// produces is cached here once read. Speculative scanning (try an
/// integer, fall back to a date) opens a transaction, advances freely, and
/// either commits (keep the advance) or rolls back (restore the saved
/// cursor position) without re-touching the stream. Transactions nest and
/// are strictly LIFO: an inner transaction must commit or roll back before
/// its enclosing one does.
pub struct TokenDecoder<'s> {
    stream: &'s mut CharacterStream,
    buffer: Vec<Character>,
    position: usize,
    transaction_stack: Vec<usize>,
}

/// A handle returned by [`TokenDecoder::begin_transaction`].
#[derive(Debug, Clone, Copy)]
pub struct Transaction(usize);

impl<'s> TokenDecoder<'s> {
    pub fn new(stream: &'s mut CharacterStream) -> Self {
        Self { stream, buffer: Vec::new(), position: 0, transaction_stack: Vec::new() }
    }

    fn ensure_buffered(&mut self, index: usize) -> Result<()> {
        while self.buffer.len() <= index {
            let next = self.stream.next()?;
            let is_end = next.is_end_of_data();
            self.buffer.push(next);
            if is_end {
                break;
            }
        }
        Ok(())
    }

    /// The character at the cursor, without advancing.
    pub fn peek(&mut self) -> Result<Character> {
        self.peek_at(0)
    }

    /// The character `offset` positions ahead of the cursor, without
    /// advancing.
    pub fn peek_at(&mut self, offset: usize) -> Result<Character> {
        let index = self.position + offset;
        self.ensure_buffered(index)?;
        Ok(*self.buffer.get(index).unwrap_or(self.buffer.last().expect("buffer always holds at least EndOfData")))
    }

    /// Consume and return the character at the cursor.
    pub fn advance(&mut self) -> Result<Character> {
        let current = self.peek()?;
        if !current.is_end_of_data() {
            self.position += 1;
        }
        Ok(current)
    }

    pub fn position(&self) -> Position {
        self.buffer.get(self.position).map(|c| c.position()).unwrap_or_else(|| self.stream_position())
    }

    fn stream_position(&self) -> Position {
        self.buffer.last().map(|c| c.position()).unwrap_or_else(Position::start)
    }

    /// Open a speculative transaction at the current cursor position.
    pub fn begin_transaction(&mut self) -> Transaction {
        self.transaction_stack.push(self.position);
        Transaction(self.position)
    }

    /// Accept everything consumed since `transaction` began.
    pub fn commit_transaction(&mut self, transaction: Transaction) {
        let saved = self.transaction_stack.pop();
        debug_assert_eq!(saved, Some(transaction.0), "transactions must commit/rollback in LIFO order");
    }

    /// Discard everything consumed since `transaction` began, restoring
    /// the cursor to where it was opened.
    pub fn rollback_transaction(&mut self, transaction: Transaction) {
        let saved = self.transaction_stack.pop();
        debug_assert_eq!(saved, Some(transaction.0), "transactions must commit/rollback in LIFO order");
        self.position = transaction.0;
    }

    /// The raw source text spanning from `transaction`'s start to the
    /// current cursor position.
    pub fn text_since(&self, transaction: Transaction) -> String {
        self.buffer[transaction.0..self.position].iter().filter_map(Character::as_char).collect()
    }

    /// Move the cursor back by `count` characters, re-exposing already
    /// buffered characters. Used by the lexer to return trailing trivia
    /// consumed while scanning a maximal-munch name.
    pub fn retreat(&mut self, count: usize) {
        self.position = self.position.saturating_sub(count);
    }

    pub fn source_identifier(&self) -> &syntax::SourceIdentifier {
        self.stream.source_identifier()
    }

    pub fn digest(&self) -> [u8; 32] {
        self.stream.digest()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use source::StringByteSource;
    use syntax::Limits;

    fn decoder(text: &str) -> CharacterStream {
        CharacterStream::open(StringByteSource::new(text), Limits::default()).unwrap()
    }

    #[test]
    fn peek_does_not_advance() {
        let mut stream = decoder("AB");
        let mut cursor = TokenDecoder::new(&mut stream);
        assert_eq!(cursor.peek().unwrap().as_char(), Some('A'));
        assert_eq!(cursor.peek().unwrap().as_char(), Some('A'));
        assert_eq!(cursor.advance().unwrap().as_char(), Some('A'));
        assert_eq!(cursor.advance().unwrap().as_char(), Some('B'));
    }

    #[test]
    fn rollback_restores_cursor_position() {
        let mut stream = decoder("ABC");
        let mut cursor = TokenDecoder::new(&mut stream);
        let tx = cursor.begin_transaction();
        cursor.advance().unwrap();
        cursor.advance().unwrap();
        assert_eq!(cursor.text_since(tx), "AB");
        cursor.rollback_transaction(tx);
        assert_eq!(cursor.advance().unwrap().as_char(), Some('A'));
    }

    #[test]
    fn nested_transactions_commit_independently() {
        let mut stream = decoder("ABCD");
        let mut cursor = TokenDecoder::new(&mut stream);
        let outer = cursor.begin_transaction();
        cursor.advance().unwrap();
        let inner = cursor.begin_transaction();
        cursor.advance().unwrap();
        cursor.rollback_transaction(inner);
        cursor.advance().unwrap();
        assert_eq!(cursor.text_since(outer), "AB");
        cursor.commit_transaction(outer);
    }

    #[test]
    fn peek_past_end_of_data_stays_at_sentinel() {
        let mut stream = decoder("A");
        let mut cursor = TokenDecoder::new(&mut stream);
        cursor.advance().unwrap();
        assert!(cursor.peek().unwrap().is_end_of_data());
        assert!(cursor.peek_at(5).unwrap().is_end_of_data());
    }
}
