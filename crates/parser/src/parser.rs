use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use la_arena::Arena;
use lexer::{Lexer, TokenKind, TokenPayload};
use resolver::{FileSourceResolver, SourceResolver, SourceResolverContext};
use sign::{SignatureValidator, SignatureValidatorData, Verdict};
use source::{ByteSource, CharacterStream, FileByteSource, StringByteSource};
use syntax::{
    Document, Error, Limits, Location, Name, NamedChildren, NamePath, NameType, Result, SourceIdentifier, Value, ValueData, ValueId, ValuePayload,
};
use triomphe::Arc;

use crate::cursor::TokenCursor;
use crate::value_parser::{self, ParsedValue, ScalarPayload};

/// Configuration for one [`Parser::parse_file`]/[`Parser::parse_string`]
/// call: the limits to enforce, the include resolver, the optional
/// signature validator, and the set of `@features` tokens the caller
/// declares support for.
///
/// This is the closest thing the crate has to a settings/config layer (see
/// [`syntax::Limits`]'s own doc comment) — there is no on-disk settings
/// file, so everything an embedding application can tune is exposed here
/// with a builder API and sane defaults.
pub struct ParserSettings {
    limits: Limits,
    resolver: Box<dyn SourceResolver>,
    validator: Option<Box<dyn SignatureValidator>>,
    enabled_features: HashSet<String>,
}

impl Default for ParserSettings {
    fn default() -> Self {
        Self { limits: Limits::default(), resolver: Box::new(FileSourceResolver::default()), validator: None, enabled_features: HashSet::new() }
    }
}

impl ParserSettings {
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_resolver(mut self, resolver: impl SourceResolver + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    pub fn with_validator(mut self, validator: impl SignatureValidator + 'static) -> Self {
        self.validator = Some(Box::new(validator));
        self
    }

    pub fn with_enabled_features(mut self, features: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.enabled_features = features.into_iter().map(Into::into).collect();
        self
    }
}

/// Drives the lexer, enforces the language's structural rules, and
/// materialises the immutable value tree. One [`Parser`] is consumed by
/// exactly one top-level [`Parser::parse_file`]/[`Parser::parse_string`]
/// call; included sources are parsed recursively within that same call by
/// recursing into [`Parser::parse_source_body`] over a fresh [`TokenCursor`],
/// sharing this parser's arena and section-nesting state.
pub struct Parser {
    arena: Arena<ValueData>,
    root: ValueId,
    root_source_identifier: SourceIdentifier,
    current_section: ValueId,
    current_path: NamePath,
    has_opened_section: bool,
    include_stack: Vec<PathBuf>,
    limits: Limits,
    resolver: Box<dyn SourceResolver>,
    validator: Option<Box<dyn SignatureValidator>>,
    enabled_features: HashSet<String>,
}

impl Parser {
    fn new(settings: ParserSettings) -> Self {
        let mut arena = Arena::new();
        let root = arena.alloc(ValueData::new(Name::empty(), None, None, ValuePayload::Document(NamedChildren::default())));
        Self {
            arena,
            root,
            root_source_identifier: SourceIdentifier::text(),
            current_section: root,
            current_path: NamePath::new(),
            has_opened_section: false,
            include_stack: Vec::new(),
            limits: settings.limits,
            resolver: settings.resolver,
            validator: settings.validator,
            enabled_features: settings.enabled_features,
        }
    }

    /// Parse a document from a file on disk, following `@include`
    /// directives relative to its directory.
    pub fn parse_file(path: impl AsRef<Path>, settings: ParserSettings) -> Result<Value> {
        let path = path.as_ref();
        let mut parser = Self::new(settings);

        let metadata = fs::metadata(path).map_err(|e| Error::io(format!("could not read '{}': {e}", path.display())))?;
        if metadata.len() > parser.limits.max_document_size() {
            return Err(Error::limit_exceeded(format!("'{}' exceeds the maximum document size", path.display())));
        }
        let canonical = fs::canonicalize(path).map_err(|e| Error::io(format!("could not canonicalize '{}': {e}", path.display())))?;

        let byte_source = FileByteSource::new(&canonical);
        parser.root_source_identifier = byte_source.identifier().clone();
        parser.include_stack.push(canonical);

        let mut stream = CharacterStream::open(byte_source, parser.limits)?;
        let mut cursor = TokenCursor::new(Lexer::new(lexer::TokenDecoder::new(&mut stream)));
        parser.parse_source_body(&mut cursor)?;

        Ok(parser.finish())
    }

    /// Parse a document from an in-memory string. `@include` directives are
    /// rejected unless the configured resolver explicitly permits them from
    /// a non-file source (see [`resolver::AccessPolicy::only_file_sources`]).
    pub fn parse_string(text: impl Into<String>, settings: ParserSettings) -> Result<Value> {
        let mut parser = Self::new(settings);
        let byte_source = StringByteSource::new(text);
        parser.root_source_identifier = byte_source.identifier().clone();

        let mut stream = CharacterStream::open(byte_source, parser.limits)?;
        let mut cursor = TokenCursor::new(Lexer::new(lexer::TokenDecoder::new(&mut stream)));
        parser.parse_source_body(&mut cursor)?;

        Ok(parser.finish())
    }

    /// The non-throwing variant of [`Parser::parse_file`]: returns the
    /// parsed document on success, or `None` alongside the error that
    /// would otherwise have been raised.
    pub fn try_parse_file(path: impl AsRef<Path>, settings: ParserSettings) -> (Option<Value>, Option<Error>) {
        match Self::parse_file(path, settings) {
            Ok(document) => (Some(document), None),
            Err(err) => (None, Some(err)),
        }
    }

    /// The non-throwing variant of [`Parser::parse_string`].
    pub fn try_parse_string(text: impl Into<String>, settings: ParserSettings) -> (Option<Value>, Option<Error>) {
        match Self::parse_string(text, settings) {
            Ok(document) => (Some(document), None),
            Err(err) => (None, Some(err)),
        }
    }

    fn finish(self) -> Value {
        let document = Document::from_parts(self.arena, self.root, self.root_source_identifier);
        Value::root(Arc::new(document))
    }

    // -- top-level document/include body -----------------------------------

    /// Parse one source's worth of lines: meta directives, section headers,
    /// and key/value lines, until that source's `EndOfData`. Recursing into
    /// this for an `@include` target inlines its content exactly as if it
    /// had appeared at the `@include` line, sharing `self`'s arena and
    /// current section.
    fn parse_source_body(&mut self, cursor: &mut TokenCursor) -> Result<()> {
        let mut pending_signature: Option<String> = None;
        loop {
            let token = cursor.peek()?.clone();
            match token.kind {
                TokenKind::EndOfData => {
                    cursor.bump()?;
                    self.finalize_signature(cursor, pending_signature)?;
                    return Ok(());
                }
                TokenKind::LineBreak => {
                    cursor.bump()?;
                }
                TokenKind::MetaName => {
                    self.parse_meta_line(cursor, &mut pending_signature)?;
                }
                TokenKind::SectionMapOpen | TokenKind::SectionListOpen => {
                    self.parse_section_header(cursor)?;
                }
                TokenKind::RegularName | TokenKind::TextName => {
                    self.parse_kv_line(cursor)?;
                }
                other => {
                    return Err(Error::syntax(format!("unexpected {other:?} at the start of a line")).with_location(cursor.location_at(&token)));
                }
            }
        }
    }

    fn finalize_signature(&self, cursor: &TokenCursor, pending_signature: Option<String>) -> Result<()> {
        match (&self.validator, pending_signature) {
            (None, None) => Ok(()),
            (None, Some(_)) => Err(Error::signature("a '@signature' line is present but no signature validator is configured")),
            (Some(_), None) => Err(Error::signature("a signature validator is configured but the source carries no '@signature' line")),
            (Some(validator), Some(signature_text)) => {
                let digest_text = sign::digest_text(&cursor.digest());
                let data = SignatureValidatorData { source_identifier: cursor.source_identifier(), signature_text: &signature_text, document_digest: &digest_text };
                match validator.validate(&data) {
                    Verdict::Accept => Ok(()),
                    Verdict::Reject => Err(Error::signature("the configured signature validator rejected this document")),
                }
            }
        }
    }

    // -- meta directives ----------------------------------------------------

    fn parse_meta_line(&mut self, cursor: &mut TokenCursor, pending_signature: &mut Option<String>) -> Result<()> {
        let meta_token = cursor.bump()?;
        let location = cursor.location_at(&meta_token);
        let meta_name = match meta_token.payload {
            TokenPayload::Text(ref s) => s.clone(),
            _ => return Err(Error::internal("a MetaName token carried an unexpected payload shape")),
        };
        let separator = cursor.bump()?;
        if separator.kind != TokenKind::NameValueSeparator {
            return Err(Error::syntax("expected ':' after a meta directive name").with_location(cursor.location_at(&separator)));
        }
        match meta_name.as_str() {
            "version" => self.parse_version_directive(cursor, location),
            "features" => self.parse_features_directive(cursor, location),
            "signature" => self.parse_signature_directive(cursor, &meta_token, location, pending_signature),
            "include" => self.parse_include_directive(cursor, location),
            other => Err(Error::unsupported(format!("unknown meta directive '@{other}'")).with_location(location)),
        }
    }

    fn expect_text_literal(&self, cursor: &mut TokenCursor, what: &str) -> Result<String> {
        let token = cursor.bump()?;
        if token.kind != TokenKind::Text {
            return Err(Error::syntax(format!("{what} requires a text literal value")).with_location(cursor.location_at(&token)));
        }
        match token.payload {
            TokenPayload::Text(s) => Ok(s),
            _ => Err(Error::internal("a Text token carried an unexpected payload shape")),
        }
    }

    fn parse_version_directive(&mut self, cursor: &mut TokenCursor, location: Location) -> Result<()> {
        let text = self.expect_text_literal(cursor, "'@version'")?;
        cursor.expect_eol()?;
        if text != "1.0" {
            return Err(Error::unsupported(format!("unsupported document version '{text}'")).with_location(location));
        }
        Ok(())
    }

    fn parse_features_directive(&mut self, cursor: &mut TokenCursor, location: Location) -> Result<()> {
        let text = self.expect_text_literal(cursor, "'@features'")?;
        cursor.expect_eol()?;
        for feature in text.split_whitespace() {
            if !self.enabled_features.contains(feature) {
                return Err(Error::unsupported(format!("document requires unsupported feature '{feature}'")).with_location(location.clone()));
            }
        }
        Ok(())
    }

    fn parse_signature_directive(
        &mut self,
        cursor: &mut TokenCursor,
        meta_token: &lexer::Token,
        location: Location,
        pending_signature: &mut Option<String>,
    ) -> Result<()> {
        if !(meta_token.begin.line == 1 && meta_token.begin.column == 1) {
            return Err(Error::syntax("'@signature' is only permitted as the first line of a source").with_location(location));
        }
        let text = self.expect_text_literal(cursor, "'@signature'")?;
        cursor.expect_eol()?;
        *pending_signature = Some(text);
        Ok(())
    }

    fn parse_include_directive(&mut self, cursor: &mut TokenCursor, location: Location) -> Result<()> {
        let include_text = self.expect_text_literal(cursor, "'@include'")?;
        cursor.expect_eol()?;

        if self.include_stack.len() >= self.limits.max_include_depth() {
            return Err(Error::limit_exceeded("include nesting exceeds the configured limit").with_location(location));
        }

        let including_source_identifier = cursor.source_identifier().clone();
        let context = SourceResolverContext { include_text: &include_text, source_identifier: &including_source_identifier };
        let resolved = self.resolver.resolve(&context)?;

        for resolved_source in resolved {
            let canonical = resolved_source.path;
            if self.include_stack.contains(&canonical) {
                return Err(Error::syntax(format!("include of '{}' would create a loop", canonical.display())).with_location(location.clone()));
            }

            self.include_stack.push(canonical.clone());
            let byte_source = FileByteSource::new(&canonical);
            let mut stream = CharacterStream::open(byte_source, self.limits)?;
            let mut included_cursor = TokenCursor::new(Lexer::new(lexer::TokenDecoder::new(&mut stream)));
            let result = self.parse_source_body(&mut included_cursor);
            self.include_stack.pop();
            result?;
        }
        Ok(())
    }

    // -- section headers -----------------------------------------------------

    fn parse_section_header(&mut self, cursor: &mut TokenCursor) -> Result<()> {
        let open = cursor.bump()?;
        let is_list = open.kind == TokenKind::SectionListOpen;
        let open_location = cursor.location_at(&open);

        let is_relative = if cursor.peek()?.kind == TokenKind::NamePathSeparator {
            cursor.bump()?;
            true
        } else {
            false
        };

        let mut segments = Vec::new();
        loop {
            let token = cursor.bump()?;
            let name = match token.kind {
                TokenKind::RegularName => match token.payload {
                    TokenPayload::Text(ref raw) => Name::create_regular(raw).map_err(|e| e.with_location(cursor.location_at(&token)))?,
                    _ => return Err(Error::internal("a RegularName token carried an unexpected payload shape")),
                },
                TokenKind::TextName => match token.payload {
                    TokenPayload::Text(raw) => Name::create_text(raw).map_err(|e| e.with_location(cursor.location_at(&token)))?,
                    _ => return Err(Error::internal("a TextName token carried an unexpected payload shape")),
                },
                _ => return Err(Error::syntax("expected a name path segment inside a section header").with_location(cursor.location_at(&token))),
            };
            segments.push(name);
            if cursor.peek()?.kind == TokenKind::NamePathSeparator {
                cursor.bump()?;
                continue;
            }
            break;
        }

        let close = cursor.bump()?;
        let expected_close = if is_list { TokenKind::SectionListClose } else { TokenKind::SectionMapClose };
        if close.kind != expected_close {
            return Err(Error::syntax("section header opener and closer do not match").with_location(cursor.location_at(&close)));
        }
        cursor.expect_eol()?;

        if segments.is_empty() {
            return Err(Error::syntax("a section header must name at least one path segment").with_location(open_location));
        }
        self.open_section(segments, is_list, is_relative, open_location)
    }

    fn open_section(&mut self, segments: Vec<Name>, is_list: bool, is_relative: bool, location: Location) -> Result<()> {
        let mut node_id = if is_relative { self.current_section } else { self.root };
        let mut path = if is_relative { self.current_path.clone() } else { NamePath::new() };
        let last_index = segments.len() - 1;

        for (i, name) in segments.into_iter().enumerate() {
            let is_last = i == last_index;
            self.push_path_segment(&mut path, name.clone(), &location)?;
            node_id = if is_last && is_list {
                let (element_id, element_name) = self.open_list_element(node_id, name, location.clone())?;
                self.push_path_segment(&mut path, element_name, &location)?;
                element_id
            } else if is_last {
                self.get_or_create_section(node_id, name, location.clone())?
            } else {
                self.get_or_create_intermediate(node_id, name, location.clone())?
            };
        }

        self.current_section = node_id;
        self.current_path = path;
        self.has_opened_section = true;
        Ok(())
    }

    fn push_path_segment(&self, path: &mut NamePath, name: Name, location: &Location) -> Result<()> {
        path.push(name);
        if path.len() > self.limits.max_name_path_depth() {
            return Err(Error::limit_exceeded("name path exceeds the maximum depth").with_location(location.clone()));
        }
        Ok(())
    }

    fn lookup_child(&self, parent: ValueId, name: &Name) -> Option<ValueId> {
        match self.arena[parent].payload() {
            ValuePayload::IntermediateSection(c) | ValuePayload::SectionWithNames(c) | ValuePayload::SectionWithTexts(c) | ValuePayload::Document(c) => {
                c.get(name)
            }
            _ => None,
        }
    }

    fn insert_child(&mut self, parent: ValueId, name: Name, id: ValueId) -> Result<()> {
        match self.arena[parent].payload_mut() {
            ValuePayload::IntermediateSection(c) | ValuePayload::SectionWithNames(c) | ValuePayload::SectionWithTexts(c) | ValuePayload::Document(c) => {
                c.insert(name, id)
            }
            _ => Err(Error::internal("attempted to insert a child into a non-section value")),
        }
    }

    fn is_section_like(&self, id: ValueId) -> bool {
        matches!(
            self.arena[id].payload(),
            ValuePayload::IntermediateSection(_) | ValuePayload::SectionWithNames(_) | ValuePayload::SectionWithTexts(_) | ValuePayload::SectionList(_)
        )
    }

    /// Resolve an intermediate path segment: reuse it if it already exists
    /// as any section-shaped node (materialised by an earlier declaration
    /// either directly or as someone else's intermediate segment), else
    /// materialise it fresh as an [`ValuePayload::IntermediateSection`].
    fn get_or_create_intermediate(&mut self, parent: ValueId, name: Name, location: Location) -> Result<ValueId> {
        if let Some(id) = self.lookup_child(parent, &name) {
            if self.is_section_like(id) {
                Ok(id)
            } else {
                Err(Error::name_conflict(format!("'{}' is already declared as a value, not a section", name.as_text())).with_location(location))
            }
        } else {
            let id = self.arena.alloc(ValueData::new(name.clone(), Some(parent), Some(location), ValuePayload::IntermediateSection(NamedChildren::default())));
            self.insert_child(parent, name, id)?;
            Ok(id)
        }
    }

    /// Resolve the final segment of a `[...]` (non-list) section header:
    /// reuse an existing section (upgrading a bare intermediate section to
    /// a concrete `SectionWithNames`/`SectionWithTexts` the first time it is
    /// directly declared), or materialise a fresh one.
    fn get_or_create_section(&mut self, parent: ValueId, name: Name, location: Location) -> Result<ValueId> {
        if let Some(id) = self.lookup_child(parent, &name) {
            match self.arena[id].payload() {
                ValuePayload::IntermediateSection(_) => {
                    self.upgrade_intermediate_section(id, name.name_type());
                    Ok(id)
                }
                ValuePayload::SectionWithNames(_) | ValuePayload::SectionWithTexts(_) => Ok(id),
                _ => Err(Error::name_conflict(format!("'{}' is already declared as a value, not a section", name.as_text())).with_location(location)),
            }
        } else {
            let payload = if name.name_type() == NameType::Text {
                ValuePayload::SectionWithTexts(NamedChildren::default())
            } else {
                ValuePayload::SectionWithNames(NamedChildren::default())
            };
            let id = self.arena.alloc(ValueData::new(name.clone(), Some(parent), Some(location), payload));
            self.insert_child(parent, name, id)?;
            Ok(id)
        }
    }

    fn upgrade_intermediate_section(&mut self, id: ValueId, name_type: NameType) {
        let placeholder = std::mem::replace(self.arena[id].payload_mut(), ValuePayload::Integer(0));
        let children = match placeholder {
            ValuePayload::IntermediateSection(children) => children,
            other => {
                // Not actually an intermediate section — restore and bail.
                *self.arena[id].payload_mut() = other;
                return;
            }
        };
        *self.arena[id].payload_mut() =
            if name_type == NameType::Text { ValuePayload::SectionWithTexts(children) } else { ValuePayload::SectionWithNames(children) };
    }

    /// Open (creating on first use) the `SectionList` named `name` under
    /// `parent`, append a fresh `SectionWithNames` element to it, and return
    /// that element's id together with the `Index` name it was given.
    fn open_list_element(&mut self, parent: ValueId, name: Name, location: Location) -> Result<(ValueId, Name)> {
        let list_id = if let Some(id) = self.lookup_child(parent, &name) {
            if !matches!(self.arena[id].payload(), ValuePayload::SectionList(_)) {
                return Err(Error::name_conflict(format!("'{}' is already declared and is not a section list", name.as_text())).with_location(location));
            }
            id
        } else {
            let id = self.arena.alloc(ValueData::new(name.clone(), Some(parent), Some(location.clone()), ValuePayload::SectionList(Vec::new())));
            self.insert_child(parent, name, id)?;
            id
        };

        let index = match self.arena[list_id].payload() {
            ValuePayload::SectionList(elements) => elements.len() as u32,
            _ => return Err(Error::internal("a section list node held a non-list payload")),
        };
        let element_name = Name::create_index(index);
        let element_id =
            self.arena.alloc(ValueData::new(element_name.clone(), Some(list_id), Some(location), ValuePayload::SectionWithNames(NamedChildren::default())));
        match self.arena[list_id].payload_mut() {
            ValuePayload::SectionList(elements) => elements.push(element_id),
            _ => return Err(Error::internal("a section list node held a non-list payload")),
        }
        Ok((element_id, element_name))
    }

    // -- key/value lines ------------------------------------------------------

    fn parse_kv_line(&mut self, cursor: &mut TokenCursor) -> Result<()> {
        if !self.has_opened_section {
            let token = cursor.peek()?.clone();
            return Err(Error::syntax("a key/value line must follow a section header").with_location(cursor.location_at(&token)));
        }

        let key_token = cursor.bump()?;
        let location = cursor.location_at(&key_token);
        let name = match key_token.kind {
            TokenKind::RegularName => match key_token.payload {
                TokenPayload::Text(ref raw) => Name::create_regular(raw).map_err(|e| e.with_location(location.clone()))?,
                _ => return Err(Error::internal("a RegularName token carried an unexpected payload shape")),
            },
            TokenKind::TextName => match key_token.payload {
                TokenPayload::Text(raw) => Name::create_text(raw).map_err(|e| e.with_location(location.clone()))?,
                _ => return Err(Error::internal("a TextName token carried an unexpected payload shape")),
            },
            _ => return Err(Error::internal("parse_kv_line called on a non-name token")),
        };

        let separator = cursor.bump()?;
        if separator.kind != TokenKind::NameValueSeparator {
            return Err(Error::syntax("expected ':' or '=' after a key").with_location(cursor.location_at(&separator)));
        }

        let value = value_parser::parse_value(cursor)?;
        cursor.expect_eol()?;

        let mut key_path = self.current_path.clone();
        self.push_path_segment(&mut key_path, name.clone(), &location)?;

        let parent = self.current_section;
        let id = self.alloc_value(parent, name.clone(), Some(location), value);
        self.insert_child(parent, name, id)
    }

    /// Allocate a parsed value (and, recursively, every element of a list)
    /// into the arena as a child of `parent`, without yet linking it into
    /// `parent`'s [`NamedChildren`] — the caller does that once it has the
    /// returned id.
    fn alloc_value(&mut self, parent: ValueId, name: Name, location: Option<Location>, value: ParsedValue) -> ValueId {
        match value {
            ParsedValue::Scalar(scalar) => {
                let payload = scalar_to_payload(scalar);
                self.arena.alloc(ValueData::new(name, Some(parent), location, payload))
            }
            ParsedValue::List(items) => {
                let list_id = self.arena.alloc(ValueData::new(name, Some(parent), location.clone(), ValuePayload::ValueList(Vec::new())));
                let mut element_ids = Vec::with_capacity(items.len());
                for (index, item) in items.into_iter().enumerate() {
                    let element_name = Name::create_index(index as u32);
                    element_ids.push(self.alloc_value(list_id, element_name, location.clone(), item));
                }
                if let ValuePayload::ValueList(slot) = self.arena[list_id].payload_mut() {
                    *slot = element_ids;
                }
                list_id
            }
        }
    }
}

fn scalar_to_payload(scalar: ScalarPayload) -> ValuePayload {
    match scalar {
        ScalarPayload::Integer(v) => ValuePayload::Integer(v),
        ScalarPayload::Boolean(v) => ValuePayload::Boolean(v),
        ScalarPayload::Float(v) => ValuePayload::Float(v),
        ScalarPayload::Text(v) => ValuePayload::Text(Arc::from(v.as_str())),
        ScalarPayload::Date(v) => ValuePayload::Date(v),
        ScalarPayload::Time(v) => ValuePayload::Time(v),
        ScalarPayload::DateTime(v) => ValuePayload::DateTime(v),
        ScalarPayload::Bytes(v) => ValuePayload::Bytes(v),
        ScalarPayload::TimeDelta(v) => ValuePayload::TimeDelta(v),
        ScalarPayload::RegEx(v) => ValuePayload::RegEx(v),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use syntax::ErrorCategory;

    use super::*;

    fn parse(text: &str) -> Result<Value> {
        Parser::parse_string(text, ParserSettings::default())
    }

    #[test]
    fn minimal_integer_section() {
        let document = parse("[main]\nvalue: 42\n").unwrap();
        assert_eq!(document.size(), 1);
        let main = document.get(&Name::create_regular("main").unwrap()).unwrap();
        assert_eq!(main.value_type(), syntax::ValueType::SectionWithNames);
        assert_eq!(main.integer_at(&NamePath::parse("value").unwrap()).unwrap(), 42);
    }

    #[test]
    fn float_with_grouping_and_exponent() {
        let document = parse("[m]\nv: 8'283.9e-5\n").unwrap();
        let value = document.float_at(&NamePath::parse("m.v").unwrap()).unwrap();
        assert!((value - 0.082839).abs() < 1e-12);
    }

    #[test]
    fn comma_separated_value_list_becomes_indexed_children() {
        let document = parse("[m]\nv: 1, 2, 3\n").unwrap();
        assert_eq!(document.integer_list(&NamePath::parse("m.v").unwrap()).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn section_list_indexes_elements_densely() {
        let document = parse("*[server]\nhost: \"a\"\n*[server]\nhost: \"b\"\n").unwrap();
        let server = document.get(&Name::create_regular("server").unwrap()).unwrap();
        assert_eq!(server.value_type(), syntax::ValueType::SectionList);
        assert_eq!(server.size(), 2);
        assert_eq!(document.text_at(&NamePath::parse("server[0].host").unwrap()).unwrap(), "a");
        assert_eq!(document.text_at(&NamePath::parse("server[1].host").unwrap()).unwrap(), "b");
    }

    #[test]
    fn dotted_section_header_materialises_intermediate_sections() {
        let document = parse("[a.b.c]\nvalue: 1\n").unwrap();
        let a = document.get(&Name::create_regular("a").unwrap()).unwrap();
        assert_eq!(a.value_type(), syntax::ValueType::IntermediateSection);
        let b = a.get(&Name::create_regular("b").unwrap()).unwrap();
        assert_eq!(b.value_type(), syntax::ValueType::IntermediateSection);
        let c = b.get(&Name::create_regular("c").unwrap()).unwrap();
        assert_eq!(c.value_type(), syntax::ValueType::SectionWithNames);
        assert_eq!(c.integer_at(&NamePath::parse("value").unwrap()).unwrap(), 1);
    }

    #[test]
    fn later_sibling_reuses_materialised_intermediate_section() {
        let document = parse("[a.b]\nx: 1\n[a.c]\ny: 2\n").unwrap();
        let a = document.get(&Name::create_regular("a").unwrap()).unwrap();
        assert_eq!(a.size(), 2);
    }

    #[test]
    fn relative_section_attaches_to_current_section() {
        let document = parse("[a.b]\nx: 1\n[.c]\ny: 2\n").unwrap();
        assert_eq!(document.integer_at(&NamePath::parse("a.b.c.y").unwrap()).unwrap(), 2);
    }

    #[test]
    fn duplicate_sibling_key_is_a_name_conflict() {
        let err = parse("[m]\nv: 1\nv: 2\n").unwrap_err();
        assert_eq!(err.category(), ErrorCategory::NameConflict);
    }

    #[test]
    fn key_before_any_section_is_a_syntax_error() {
        let err = parse("value: 1\n").unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Syntax);
    }

    #[test]
    fn value_used_as_section_is_a_name_conflict() {
        let err = parse("[m]\nv: 1\n[m.v]\nw: 2\n").unwrap_err();
        assert_eq!(err.category(), ErrorCategory::NameConflict);
    }

    #[test]
    fn version_directive_accepts_only_one_dot_zero() {
        assert!(parse("@version: \"1.0\"\n[m]\nv: 1\n").is_ok());
        let err = parse("@version: \"2.0\"\n[m]\nv: 1\n").unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Unsupported);
    }

    #[test]
    fn unconfigured_feature_is_unsupported() {
        let err = parse("@features: \"fancy\"\n[m]\nv: 1\n").unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Unsupported);
    }

    #[test]
    fn enabled_feature_is_accepted() {
        let settings = ParserSettings::default().with_enabled_features(["fancy"]);
        let document = Parser::parse_string("@features: \"fancy\"\n[m]\nv: 1\n", settings).unwrap();
        assert_eq!(document.integer_at(&NamePath::parse("m.v").unwrap()).unwrap(), 1);
    }

    #[test]
    fn multiline_value_list_builds_a_value_list() {
        let document = parse("[m]\nv:\n    * 1\n    * 2\n    * 3\n").unwrap();
        assert_eq!(document.integer_list(&NamePath::parse("m.v").unwrap()).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn multiline_value_list_as_last_line_of_document_parses() {
        let document = parse("[m]\nv:\n    * 1\n    * 2").unwrap();
        assert_eq!(document.integer_list(&NamePath::parse("m.v").unwrap()).unwrap(), vec![1, 2]);
    }

    #[test]
    fn include_inlines_target_document_sections() {
        let dir = tempdir();
        fs::write(dir.join("included.elcl"), "[server]\nhost: \"included\"\n").unwrap();
        let main = dir.join("main.elcl");
        fs::write(&main, "@include: \"included.elcl\"\n").unwrap();

        let document = Parser::parse_file(&main, ParserSettings::default()).unwrap();
        assert_eq!(document.text_at(&NamePath::parse("server.host").unwrap()).unwrap(), "included");
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn include_loop_is_a_syntax_error_mentioning_loop() {
        let dir = tempdir();
        let main = dir.join("main.elcl");
        let a = dir.join("a.elcl");
        fs::write(&main, "@include: \"a.elcl\"\n").unwrap();
        fs::write(&a, "@include: \"main.elcl\"\n").unwrap();

        let err = Parser::parse_file(&main, ParserSettings::default()).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Syntax);
        assert!(err.message().contains("loop"));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn signature_without_configured_validator_is_a_signature_error() {
        let err = parse("@signature: \"placeholder\"\n[m]\nv: 1\n").unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Signature);
    }

    #[test]
    fn validator_without_signature_line_is_a_signature_error() {
        struct AlwaysAccept;
        impl SignatureValidator for AlwaysAccept {
            fn validate(&self, _data: &SignatureValidatorData<'_>) -> Verdict {
                Verdict::Accept
            }
        }
        let settings = ParserSettings::default().with_validator(AlwaysAccept);
        let err = Parser::parse_string("[m]\nv: 1\n", settings).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Signature);
    }

    #[test]
    fn validator_accept_and_reject_are_honoured() {
        struct Fixed(bool);
        impl SignatureValidator for Fixed {
            fn validate(&self, _data: &SignatureValidatorData<'_>) -> Verdict {
                if self.0 { Verdict::Accept } else { Verdict::Reject }
            }
        }
        let accepted = Parser::parse_string("@signature: \"sig\"\n[m]\nv: 1\n", ParserSettings::default().with_validator(Fixed(true)));
        assert!(accepted.is_ok());
        let rejected = Parser::parse_string("@signature: \"sig\"\n[m]\nv: 1\n", ParserSettings::default().with_validator(Fixed(false)));
        let err = rejected.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Signature);
    }

    #[test]
    fn multiline_text_literal_decodes_escapes_per_line() {
        let document = parse("[x]\nv: \"\"\"\n    Hello\\n\n    World\\u{21}\n    \"\"\"\n").unwrap();
        assert_eq!(document.text_at(&NamePath::parse("x.v").unwrap()).unwrap(), "Hello\n\nWorld!");
    }

    #[test]
    fn signed_document_round_trips_through_signer_and_validator() {
        use sign::{SignatureSigner, SignatureSignerData, Signer};

        struct ShiftSigner;
        impl SignatureSigner for ShiftSigner {
            fn sign(&self, data: &SignatureSignerData) -> Result<String> {
                let shifted: String = data.document_digest.chars().map(|c| ((c as u32) + 1) as u8 as char).collect();
                Ok(format!("someone;{shifted}"))
            }
        }
        struct ShiftValidator;
        impl SignatureValidator for ShiftValidator {
            fn validate(&self, data: &SignatureValidatorData<'_>) -> Verdict {
                let shifted: String = data.document_digest.chars().map(|c| ((c as u32) + 1) as u8 as char).collect();
                let expected = format!("someone;{shifted}");
                if data.signature_text == expected { Verdict::Accept } else { Verdict::Reject }
            }
        }

        let dir = tempdir();
        let source = dir.join("main.elcl");
        let signed = dir.join("main.signed.elcl");
        fs::write(&source, "[main]\nvalue: 123\n").unwrap();

        Signer::new(ShiftSigner).sign(&source, &signed, "someone").unwrap();

        let original = Parser::parse_file(&source, ParserSettings::default()).unwrap();
        let settings = ParserSettings::default().with_validator(ShiftValidator);
        let resigned = Parser::parse_file(&signed, settings).unwrap();
        assert_eq!(original.integer_at(&NamePath::parse("main.value").unwrap()).unwrap(), resigned.integer_at(&NamePath::parse("main.value").unwrap()).unwrap());

        let mut corrupted = fs::read(&signed).unwrap();
        let last = corrupted.len() - 1;
        corrupted[last] = if corrupted[last] == b'3' { b'4' } else { b'3' };
        fs::write(&signed, &corrupted).unwrap();
        let settings = ParserSettings::default().with_validator(ShiftValidator);
        let err = Parser::parse_file(&signed, settings).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Signature);

        fs::remove_dir_all(&dir).ok();
    }

    fn tempdir() -> PathBuf {
        let mut dir = std::env::temp_dir();
        dir.push(format!("elcl-parser-test-{:?}-{}", std::thread::current().id(), std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }
}
