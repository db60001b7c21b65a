use syntax::{Bytes, Date, DateTime, Position, Time, TimeDelta};

/// Every token kind the lexer can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Spacing,
    Comment,
    LineBreak,
    Indentation,

    MetaName,
    RegularName,
    TextName,
    NamePathSeparator,
    NameValueSeparator,

    SectionMapOpen,
    SectionMapClose,
    SectionListOpen,
    SectionListClose,

    ValueListSeparator,
    MultiLineValueListSeparator,

    Integer,
    Boolean,
    Float,
    Text,
    Code,
    Date,
    Time,
    DateTime,
    Bytes,
    TimeDelta,
    RegEx,

    MultiLineTextOpen,
    MultiLineTextClose,
    MultiLineCodeOpen,
    MultiLineCodeClose,
    MultiLineCodeLanguage,
    MultiLineRegexOpen,
    MultiLineRegexClose,
    MultiLineBytesOpen,
    MultiLineBytesClose,
    MultiLineBytesFormat,

    MultiLineText,
    MultiLineCode,
    MultiLineRegex,
    MultiLineBytes,

    EndOfData,
}

/// The decoded scalar value a token carries, if any.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenPayload {
    None,
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Text(String),
    Date(Date),
    Time(Time),
    DateTime(DateTime),
    Bytes(Bytes),
    TimeDelta(TimeDelta),
    RegEx(String),
}

/// One lexical element: its kind, the exact source text it spans, its
/// begin/end positions, and its decoded payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub raw_text: String,
    pub begin: Position,
    pub end: Position,
    pub payload: TokenPayload,
}

impl Token {
    pub fn new(kind: TokenKind, raw_text: String, begin: Position, end: Position, payload: TokenPayload) -> Self {
        Self { kind, raw_text, begin, end, payload }
    }

    pub fn is_end_of_data(&self) -> bool {
        self.kind == TokenKind::EndOfData
    }
}
