//! Top-level facade: parse an ELCL document and query the resulting value
//! tree. Re-exports the public types of the crates that make up the
//! parsing pipeline so a dependent only needs this one crate.

use std::path::Path;

pub use lexer::{Lexer, Token, TokenKind, TokenPayload};
pub use parser::{ParsedValue, Parser, ParserSettings, ScalarPayload};
pub use resolver::{AccessPolicy, FileSourceResolver, ResolvedSource, SourceResolver, SourceResolverContext};
pub use sign::{Signer, SignatureSigner, SignatureSignerData, SignatureValidator, SignatureValidatorData, Verdict};
pub use syntax::{
    Bytes, Date, DateTime, Error, ErrorCategory, Limits, Location, Name, NamePath, NameType, Position, RegEx, Result, SourceIdentifier, Time, TimeDelta,
    TimeUnit, TimeZone, Value, ValueType,
};

/// Parse a document from a file on disk, following `@include` directives
/// relative to its directory.
pub fn parse_file(path: impl AsRef<Path>, settings: ParserSettings) -> Result<Value> {
    Parser::parse_file(path, settings)
}

/// Parse a document from an in-memory string.
pub fn parse_string(text: impl Into<String>, settings: ParserSettings) -> Result<Value> {
    Parser::parse_string(text, settings)
}

/// The non-throwing variant of [`parse_file`].
pub fn try_parse_file(path: impl AsRef<Path>, settings: ParserSettings) -> (Option<Value>, Option<Error>) {
    Parser::try_parse_file(path, settings)
}

/// The non-throwing variant of [`parse_string`].
pub fn try_parse_string(text: impl Into<String>, settings: ParserSettings) -> (Option<Value>, Option<Error>) {
    Parser::try_parse_string(text, settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_minimal_document_through_the_facade() {
        let document = parse_string("[main]\ngreeting: \"hello\"\n", ParserSettings::default()).unwrap();
        assert_eq!(document.text_at(&NamePath::parse("main.greeting").unwrap()).unwrap(), "hello");
    }

    #[test]
    fn try_parse_string_reports_syntax_errors_without_panicking() {
        let (document, error) = try_parse_string("value: 1\n", ParserSettings::default());
        assert!(document.is_none());
        assert_eq!(error.unwrap().category(), ErrorCategory::Syntax);
    }
}
