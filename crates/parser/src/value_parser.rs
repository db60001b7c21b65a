use lexer::{TokenKind, TokenPayload};
use syntax::{Bytes, Date, DateTime, Error, RegEx, Result, Time, TimeDelta};

use crate::cursor::TokenCursor;

/// A single scalar literal, already fully decoded (regular expressions
/// compiled, byte literals hex-decoded) but not yet allocated into an
/// arena node — that happens once its place in the value tree is known.
#[derive(Debug, Clone)]
pub enum ScalarPayload {
    Integer(i64),
    Boolean(bool),
    Float(f64),
    Text(String),
    Date(Date),
    Time(Time),
    DateTime(DateTime),
    Bytes(Bytes),
    TimeDelta(TimeDelta),
    RegEx(RegEx),
}

/// The shape of a value as read off the token stream, before it has a
/// parent to attach to. Keeping this arena-free lets a multi-line list's
/// items be parsed before the list node itself — and its `ValueId` — exist.
#[derive(Debug, Clone)]
pub enum ParsedValue {
    Scalar(ScalarPayload),
    List(Vec<ParsedValue>),
}

/// Parses the value half of a `key: value` or meta-directive line: a single
/// scalar, a single-line comma list, or a multi-line `*`-prefixed list.
pub fn parse_value(cursor: &mut TokenCursor) -> Result<ParsedValue> {
    if cursor.peek()?.kind == TokenKind::LineBreak {
        return parse_multiline_list(cursor);
    }
    let first = parse_scalar(cursor)?;
    let mut items = vec![first];
    while cursor.peek()?.kind == TokenKind::ValueListSeparator {
        cursor.bump()?;
        items.push(parse_scalar(cursor)?);
    }
    if items.len() == 1 {
        Ok(ParsedValue::Scalar(items.pop().expect("checked len == 1")))
    } else {
        Ok(ParsedValue::List(items.into_iter().map(ParsedValue::Scalar).collect()))
    }
}

fn parse_multiline_list(cursor: &mut TokenCursor) -> Result<ParsedValue> {
    let break_token = cursor.bump()?;
    let mut items = Vec::new();
    while cursor.peek()?.kind == TokenKind::MultiLineValueListSeparator {
        cursor.bump()?;
        items.push(parse_value_item(cursor)?);
        // Leave a terminating `EndOfData` for the caller rather than
        // consuming it here — the lexer raises `Internal` if asked for a
        // token past `EndOfData`, and callers (kv-lines, meta directives)
        // need to observe it themselves to know the document has ended.
        let end = cursor.peek()?.clone();
        match end.kind {
            TokenKind::LineBreak => {
                cursor.bump()?;
            }
            TokenKind::EndOfData => {}
            _ => return Err(Error::syntax("expected a line break after a multi-line list item").with_location(cursor.location_at(&end))),
        }
    }
    if items.is_empty() {
        return Err(Error::syntax("a multi-line value list must contain at least one '*' item").with_location(cursor.location_at(&break_token)));
    }
    Ok(ParsedValue::List(items))
}

/// A single multi-line list item: either a scalar or a nested multi-line
/// list (for a list-of-lists), distinguished by whether the item is
/// immediately followed by its own line break before any scalar content.
fn parse_value_item(cursor: &mut TokenCursor) -> Result<ParsedValue> {
    if cursor.peek()?.kind == TokenKind::LineBreak {
        return parse_multiline_list(cursor);
    }
    Ok(ParsedValue::Scalar(parse_scalar(cursor)?))
}

fn parse_scalar(cursor: &mut TokenCursor) -> Result<ScalarPayload> {
    let token = cursor.bump()?;
    match token.kind {
        TokenKind::Integer => match token.payload {
            TokenPayload::Integer(value) => Ok(ScalarPayload::Integer(value)),
            _ => Err(internal_payload_mismatch(cursor, &token)),
        },
        TokenKind::Boolean => match token.payload {
            TokenPayload::Boolean(value) => Ok(ScalarPayload::Boolean(value)),
            _ => Err(internal_payload_mismatch(cursor, &token)),
        },
        TokenKind::Float => match token.payload {
            TokenPayload::Float(value) => Ok(ScalarPayload::Float(value)),
            _ => Err(internal_payload_mismatch(cursor, &token)),
        },
        TokenKind::Text | TokenKind::Code => match token.payload {
            TokenPayload::Text(value) => Ok(ScalarPayload::Text(value)),
            _ => Err(internal_payload_mismatch(cursor, &token)),
        },
        TokenKind::Date => match token.payload {
            TokenPayload::Date(value) => Ok(ScalarPayload::Date(value)),
            _ => Err(internal_payload_mismatch(cursor, &token)),
        },
        TokenKind::Time => match token.payload {
            TokenPayload::Time(value) => Ok(ScalarPayload::Time(value)),
            _ => Err(internal_payload_mismatch(cursor, &token)),
        },
        TokenKind::DateTime => match token.payload {
            TokenPayload::DateTime(value) => Ok(ScalarPayload::DateTime(value)),
            _ => Err(internal_payload_mismatch(cursor, &token)),
        },
        TokenKind::Bytes => match token.payload {
            TokenPayload::Bytes(value) => Ok(ScalarPayload::Bytes(value)),
            _ => Err(internal_payload_mismatch(cursor, &token)),
        },
        TokenKind::TimeDelta => match token.payload {
            TokenPayload::TimeDelta(value) => Ok(ScalarPayload::TimeDelta(value)),
            _ => Err(internal_payload_mismatch(cursor, &token)),
        },
        TokenKind::RegEx => match token.payload {
            TokenPayload::RegEx(source) => {
                let location = cursor.location_at(&token);
                RegEx::new(source).map(ScalarPayload::RegEx).map_err(|e| e.with_location(location))
            }
            _ => Err(internal_payload_mismatch(cursor, &token)),
        },
        TokenKind::MultiLineTextOpen => {
            let content = parse_multiline_body(cursor, TokenKind::MultiLineText, TokenKind::MultiLineTextClose)?;
            match content.payload {
                TokenPayload::Text(value) => Ok(ScalarPayload::Text(value)),
                _ => Err(internal_payload_mismatch(cursor, &content)),
            }
        }
        TokenKind::MultiLineCodeOpen => {
            let content = parse_multiline_body(cursor, TokenKind::MultiLineCode, TokenKind::MultiLineCodeClose)?;
            match content.payload {
                TokenPayload::Text(value) => Ok(ScalarPayload::Text(value)),
                _ => Err(internal_payload_mismatch(cursor, &content)),
            }
        }
        TokenKind::MultiLineRegexOpen => {
            let content = parse_multiline_body(cursor, TokenKind::MultiLineRegex, TokenKind::MultiLineRegexClose)?;
            match content.payload {
                TokenPayload::RegEx(source) => {
                    let location = cursor.location_at(&content);
                    RegEx::new(source).map(ScalarPayload::RegEx).map_err(|e| e.with_location(location))
                }
                _ => Err(internal_payload_mismatch(cursor, &content)),
            }
        }
        TokenKind::MultiLineBytesOpen => {
            let content = parse_multiline_body(cursor, TokenKind::MultiLineBytes, TokenKind::MultiLineBytesClose)?;
            match content.payload {
                TokenPayload::Bytes(value) => Ok(ScalarPayload::Bytes(value)),
                _ => Err(internal_payload_mismatch(cursor, &content)),
            }
        }
        other => Err(Error::syntax(format!("expected a value, found {other:?}")).with_location(cursor.location_at(&token))),
    }
}

/// Consumes the tail of a multi-line literal after its open marker: an
/// optional language/format tag and the mandatory line break, then the
/// single joined content token, then the matching close marker.
fn parse_multiline_body(cursor: &mut TokenCursor, content_kind: TokenKind, close_kind: TokenKind) -> Result<lexer::Token> {
    loop {
        let token = cursor.bump()?;
        if token.kind == content_kind {
            let close = cursor.bump()?;
            if close.kind != close_kind {
                return Err(Error::syntax("expected the matching close marker for a multi-line literal").with_location(cursor.location_at(&close)));
            }
            return Ok(token);
        }
        match token.kind {
            TokenKind::LineBreak | TokenKind::MultiLineCodeLanguage | TokenKind::MultiLineBytesFormat => continue,
            _ => return Err(Error::syntax("unexpected token inside a multi-line literal opening").with_location(cursor.location_at(&token))),
        }
    }
}

fn internal_payload_mismatch(cursor: &TokenCursor, token: &lexer::Token) -> Error {
    Error::internal(format!("token kind {:?} carried an unexpected payload shape", token.kind)).with_location(cursor.location_at(token))
}
