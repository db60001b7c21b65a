use la_arena::{Arena, Idx};
use rustc_hash::FxHashMap;
use triomphe::Arc;

use crate::error_category::{Error, Result};
use crate::location::Location;
use crate::name::{Name, NameType};
use crate::name_path::NamePath;
use crate::source_identifier::SourceIdentifier;
use crate::value_types::{Bytes, Date, DateTime, RegEx, Time, TimeDelta};

/// Index of a [`ValueData`] node inside a [`Document`]'s arena. Parent
/// links are back-pointers through this index rather than shared/weak
/// pointers, avoiding reference-counted cycles in the value tree.
pub type ValueId = Idx<ValueData>;

/// The polymorphic type tag every value carries, independent of its
/// payload's Rust representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Integer,
    Boolean,
    Float,
    Text,
    Date,
    Time,
    DateTime,
    Bytes,
    TimeDelta,
    RegEx,
    ValueList,
    SectionList,
    IntermediateSection,
    SectionWithNames,
    SectionWithTexts,
    Document,
}

/// An ordered, name-indexed collection of children. Lookup is O(1) via the
/// index map; iteration preserves insertion order via `order`.
#[derive(Debug, Clone, Default)]
pub struct NamedChildren {
    order: Vec<ValueId>,
    index: FxHashMap<Name, usize>,
}

impl NamedChildren {
    pub fn insert(&mut self, name: Name, id: ValueId) -> Result<()> {
        if self.index.contains_key(&name) {
            return Err(Error::name_conflict(format!("duplicate sibling name '{}'", name.as_text())));
        }
        self.index.insert(name, self.order.len());
        self.order.push(id);
        Ok(())
    }

    pub fn get(&self, name: &Name) -> Option<ValueId> {
        self.index.get(name).map(|&i| self.order[i])
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ValueId> + '_ {
        self.order.iter().copied()
    }
}

/// The payload carried by a node, one variant per [`ValueType`]. Compound
/// variants hold child ids rather than nested [`ValueData`] so every node
/// lives in the same flat arena.
#[derive(Debug, Clone)]
pub enum ValuePayload {
    Integer(i64),
    Boolean(bool),
    Float(f64),
    Text(Arc<str>),
    Date(Date),
    Time(Time),
    DateTime(DateTime),
    Bytes(Bytes),
    TimeDelta(TimeDelta),
    RegEx(RegEx),
    ValueList(Vec<ValueId>),
    SectionList(Vec<ValueId>),
    IntermediateSection(NamedChildren),
    SectionWithNames(NamedChildren),
    SectionWithTexts(NamedChildren),
    Document(NamedChildren),
}

impl ValuePayload {
    pub fn value_type(&self) -> ValueType {
        match self {
            ValuePayload::Integer(_) => ValueType::Integer,
            ValuePayload::Boolean(_) => ValueType::Boolean,
            ValuePayload::Float(_) => ValueType::Float,
            ValuePayload::Text(_) => ValueType::Text,
            ValuePayload::Date(_) => ValueType::Date,
            ValuePayload::Time(_) => ValueType::Time,
            ValuePayload::DateTime(_) => ValueType::DateTime,
            ValuePayload::Bytes(_) => ValueType::Bytes,
            ValuePayload::TimeDelta(_) => ValueType::TimeDelta,
            ValuePayload::RegEx(_) => ValueType::RegEx,
            ValuePayload::ValueList(_) => ValueType::ValueList,
            ValuePayload::SectionList(_) => ValueType::SectionList,
            ValuePayload::IntermediateSection(_) => ValueType::IntermediateSection,
            ValuePayload::SectionWithNames(_) => ValueType::SectionWithNames,
            ValuePayload::SectionWithTexts(_) => ValueType::SectionWithTexts,
            ValuePayload::Document(_) => ValueType::Document,
        }
    }
}

/// One arena node: its name within its parent, a back-pointer to its
/// parent, an optional source location, and its payload.
#[derive(Debug, Clone)]
pub struct ValueData {
    name: Name,
    parent: Option<ValueId>,
    location: Option<Location>,
    payload: ValuePayload,
}

impl ValueData {
    pub fn new(name: Name, parent: Option<ValueId>, location: Option<Location>, payload: ValuePayload) -> Self {
        Self { name, parent, location, payload }
    }

    /// Mutable access to the payload, used by the parser to fill in a
    /// compound node's children after allocating it (and so obtaining its
    /// `ValueId` to hand to its own children as their `parent`).
    pub fn payload_mut(&mut self) -> &mut ValuePayload {
        &mut self.payload
    }

    /// Read-only access to the payload, used by the parser to inspect an
    /// already-allocated node (e.g. to check whether a section path segment
    /// collides with a non-section value) without borrowing the whole
    /// [`Document`].
    pub fn payload(&self) -> &ValuePayload {
        &self.payload
    }

    pub fn name(&self) -> &Name {
        &self.name
    }
}

/// The immutable value tree produced by a parse. Owns every node in a
/// single arena; nodes reference each other by [`ValueId`], never by
/// pointer, so the whole tree is safe to share behind an [`Arc`].
#[derive(Debug)]
pub struct Document {
    arena: Arena<ValueData>,
    root: ValueId,
    source_identifier: SourceIdentifier,
    _instances: countme::Count<Document>,
}

impl Document {
    pub fn from_parts(arena: Arena<ValueData>, root: ValueId, source_identifier: SourceIdentifier) -> Self {
        Self { arena, root, source_identifier, _instances: countme::Count::new() }
    }

    pub fn root_id(&self) -> ValueId {
        self.root
    }

    pub fn source_identifier(&self) -> &SourceIdentifier {
        &self.source_identifier
    }

    fn data(&self, id: ValueId) -> &ValueData {
        &self.arena[id]
    }
}

/// A cheap, cloneable handle into a shared [`Document`]. Never null: a
/// `Value` always resolves to a live node in its document's arena.
#[derive(Debug, Clone)]
pub struct Value {
    document: Arc<Document>,
    id: ValueId,
}

impl Value {
    pub fn new(document: Arc<Document>, id: ValueId) -> Self {
        Self { document, id }
    }

    pub fn root(document: Arc<Document>) -> Self {
        let id = document.root_id();
        Self { document, id }
    }

    fn data(&self) -> &ValueData {
        self.document.data(self.id)
    }

    pub fn name(&self) -> &Name {
        &self.data().name
    }

    pub fn name_type(&self) -> NameType {
        self.data().name.name_type()
    }

    pub fn location(&self) -> Option<&Location> {
        self.data().location.as_ref()
    }

    pub fn value_type(&self) -> ValueType {
        self.data().payload.value_type()
    }

    pub fn parent(&self) -> Option<Value> {
        self.data().parent.map(|id| Value { document: self.document.clone(), id })
    }

    /// The full path from the document root to this value.
    pub fn path(&self) -> NamePath {
        let mut names = Vec::new();
        let mut current = self.clone();
        while let Some(parent) = current.parent() {
            names.push(current.name().clone());
            current = parent;
        }
        names.reverse();
        NamePath::from_names(names)
    }

    fn child(&self, id: ValueId) -> Value {
        Value { document: self.document.clone(), id }
    }

    /// Named children, if this value is a section-like compound.
    pub fn named_children(&self) -> Option<impl Iterator<Item = Value> + '_> {
        let children = match &self.data().payload {
            ValuePayload::IntermediateSection(c)
            | ValuePayload::SectionWithNames(c)
            | ValuePayload::SectionWithTexts(c)
            | ValuePayload::Document(c) => Some(c),
            _ => None,
        }?;
        Some(children.iter().map(|id| self.child(id)))
    }

    /// Look up an immediate named child by [`Name`].
    pub fn get(&self, name: &Name) -> Result<Value> {
        let children = match &self.data().payload {
            ValuePayload::IntermediateSection(c)
            | ValuePayload::SectionWithNames(c)
            | ValuePayload::SectionWithTexts(c)
            | ValuePayload::Document(c) => c,
            _ => return Err(Error::type_mismatch("value is not a section and has no named children").with_path(self.path())),
        };
        let id = children
            .get(name)
            .ok_or_else(|| Error::value_not_found(format!("no child named '{}'", name.as_text())).with_path(self.path()))?;
        Ok(self.child(id))
    }

    /// Resolve a full [`NamePath`] relative to this value.
    pub fn get_path(&self, path: &NamePath) -> Result<Value> {
        let mut current = self.clone();
        for name in path.iter() {
            current = current.get(name)?;
        }
        Ok(current)
    }

    /// Ordered elements, if this value is a `ValueList` or `SectionList`.
    pub fn elements(&self) -> Option<impl Iterator<Item = Value> + '_> {
        let ids: &[ValueId] = match &self.data().payload {
            ValuePayload::ValueList(v) | ValuePayload::SectionList(v) => v,
            _ => return None,
        };
        Some(ids.iter().map(|&id| self.child(id)))
    }

    pub fn as_integer(&self) -> Result<i64> {
        match &self.data().payload {
            ValuePayload::Integer(v) => Ok(*v),
            _ => Err(self.type_mismatch("Integer")),
        }
    }

    /// Narrowing accessor for a fixed-width integer type, used by callers
    /// that want e.g. `u8`/`i32` instead of the canonical `i64`.
    pub fn as_sized_integer<T>(&self) -> Result<T>
    where
        T: TryFrom<i64>,
    {
        let value = self.as_integer()?;
        T::try_from(value).map_err(|_| Error::limit_exceeded("integer value does not fit the requested width").with_path(self.path()))
    }

    pub fn as_boolean(&self) -> Result<bool> {
        match &self.data().payload {
            ValuePayload::Boolean(v) => Ok(*v),
            _ => Err(self.type_mismatch("Boolean")),
        }
    }

    pub fn as_float(&self) -> Result<f64> {
        match &self.data().payload {
            ValuePayload::Float(v) => Ok(*v),
            _ => Err(self.type_mismatch("Float")),
        }
    }

    pub fn as_text(&self) -> Result<&str> {
        match &self.data().payload {
            ValuePayload::Text(v) => Ok(v),
            _ => Err(self.type_mismatch("Text")),
        }
    }

    pub fn as_date(&self) -> Result<Date> {
        match &self.data().payload {
            ValuePayload::Date(v) => Ok(*v),
            _ => Err(self.type_mismatch("Date")),
        }
    }

    pub fn as_time(&self) -> Result<Time> {
        match &self.data().payload {
            ValuePayload::Time(v) => Ok(*v),
            _ => Err(self.type_mismatch("Time")),
        }
    }

    pub fn as_date_time(&self) -> Result<DateTime> {
        match &self.data().payload {
            ValuePayload::DateTime(v) => Ok(*v),
            _ => Err(self.type_mismatch("DateTime")),
        }
    }

    pub fn as_bytes(&self) -> Result<&Bytes> {
        match &self.data().payload {
            ValuePayload::Bytes(v) => Ok(v),
            _ => Err(self.type_mismatch("Bytes")),
        }
    }

    pub fn as_time_delta(&self) -> Result<TimeDelta> {
        match &self.data().payload {
            ValuePayload::TimeDelta(v) => Ok(*v),
            _ => Err(self.type_mismatch("TimeDelta")),
        }
    }

    pub fn as_regex(&self) -> Result<&RegEx> {
        match &self.data().payload {
            ValuePayload::RegEx(v) => Ok(v),
            _ => Err(self.type_mismatch("RegEx")),
        }
    }

    fn type_mismatch(&self, expected: &str) -> Error {
        Error::type_mismatch(format!("expected a {expected} value, found {:?}", self.value_type())).with_path(self.path())
    }

    // -- structural queries -------------------------------------------------

    /// Number of named children or list elements; 0 for scalars.
    pub fn size(&self) -> usize {
        match &self.data().payload {
            ValuePayload::IntermediateSection(c) | ValuePayload::SectionWithNames(c) | ValuePayload::SectionWithTexts(c) | ValuePayload::Document(c) => {
                c.len()
            }
            ValuePayload::ValueList(v) | ValuePayload::SectionList(v) => v.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    fn ordered_children(&self) -> Vec<ValueId> {
        match &self.data().payload {
            ValuePayload::IntermediateSection(c) | ValuePayload::SectionWithNames(c) | ValuePayload::SectionWithTexts(c) | ValuePayload::Document(c) => {
                c.iter().collect()
            }
            ValuePayload::ValueList(v) | ValuePayload::SectionList(v) => v.clone(),
            _ => Vec::new(),
        }
    }

    pub fn first(&self) -> Option<Value> {
        self.ordered_children().first().map(|&id| self.child(id))
    }

    pub fn last(&self) -> Option<Value> {
        self.ordered_children().last().map(|&id| self.child(id))
    }

    // -- path-based query surface --------------------------------------------

    /// Whether `path` resolves to a value from here.
    pub fn exists(&self, path: &NamePath) -> bool {
        self.get_path(path).is_ok()
    }

    /// Resolve `path`, returning `None` rather than an error if it does not
    /// exist or is malformed.
    pub fn get_optional(&self, path: &NamePath) -> Option<Value> {
        self.get_path(path).ok()
    }

    /// Preorder walk of this value and every descendant, in insertion
    /// order. Parents are always emitted before their children.
    pub fn preorder(&self) -> Vec<Value> {
        self.preorder_filtered(|_| Ok(true)).expect("a filter that never errors cannot fail")
    }

    /// Preorder walk pruned by `filter`: when it returns `Ok(false)` for a
    /// value, that value and its subtree are skipped. Errors raised by
    /// `filter` abort the walk and propagate to the caller.
    pub fn preorder_filtered<F>(&self, mut filter: F) -> Result<Vec<Value>>
    where
        F: FnMut(&Value) -> Result<bool>,
    {
        let mut out = Vec::new();
        self.walk_preorder(&mut filter, &mut out)?;
        Ok(out)
    }

    fn walk_preorder<F>(&self, filter: &mut F, out: &mut Vec<Value>) -> Result<()>
    where
        F: FnMut(&Value) -> Result<bool>,
    {
        if !filter(self)? {
            return Ok(());
        }
        out.push(self.clone());
        for id in self.ordered_children() {
            self.child(id).walk_preorder(filter, out)?;
        }
        Ok(())
    }
}

macro_rules! typed_path_accessor {
    ($throwing:ident, $with_default:ident, $as_fn:ident, $ty:ty) => {
        impl Value {
            pub fn $throwing(&self, path: &NamePath) -> Result<$ty> {
                self.get_path(path)?.$as_fn()
            }

            pub fn $with_default(&self, path: &NamePath, default: $ty) -> $ty {
                self.get_path(path).ok().and_then(|v| v.$as_fn().ok()).unwrap_or(default)
            }
        }
    };
}

typed_path_accessor!(integer_at, integer_or, as_integer, i64);
typed_path_accessor!(boolean_at, boolean_or, as_boolean, bool);
typed_path_accessor!(float_at, float_or, as_float, f64);
typed_path_accessor!(date_at, date_or, as_date, Date);
typed_path_accessor!(time_at, time_or, as_time, Time);
typed_path_accessor!(date_time_at, date_time_or, as_date_time, DateTime);
typed_path_accessor!(time_delta_at, time_delta_or, as_time_delta, TimeDelta);

impl Value {
    pub fn text_at(&self, path: &NamePath) -> Result<String> {
        self.get_path(path)?.as_text().map(str::to_owned)
    }

    pub fn text_or(&self, path: &NamePath, default: impl Into<String>) -> String {
        self.get_path(path).ok().and_then(|v| v.as_text().ok().map(str::to_owned)).unwrap_or_else(|| default.into())
    }

    pub fn bytes_at(&self, path: &NamePath) -> Result<Bytes> {
        self.get_path(path)?.as_bytes().cloned()
    }

    pub fn regex_at(&self, path: &NamePath) -> Result<RegEx> {
        self.get_path(path)?.as_regex().cloned()
    }

    /// A flat value list at `path`: either the `ValueList`'s elements, or a
    /// single-element vector if `path` resolves to a bare scalar.
    pub fn as_integer_list(&self) -> Result<Vec<i64>> {
        match self.elements() {
            Some(it) => it.map(|v| v.as_integer()).collect(),
            None => Ok(vec![self.as_integer()?]),
        }
    }

    /// A matrix (list of lists) at this value: each element of an outer
    /// `ValueList` is itself read as a flat integer list.
    pub fn as_integer_matrix(&self) -> Result<Vec<Vec<i64>>> {
        let elements = self.elements().ok_or_else(|| self.type_mismatch("ValueList"))?;
        elements.map(|row| row.as_integer_list()).collect()
    }

    pub fn integer_list(&self, path: &NamePath) -> Result<Vec<i64>> {
        self.get_path(path)?.as_integer_list()
    }

    pub fn integer_matrix(&self, path: &NamePath) -> Result<Vec<Vec<i64>>> {
        self.get_path(path)?.as_integer_matrix()
    }

    pub fn as_float_list(&self) -> Result<Vec<f64>> {
        match self.elements() {
            Some(it) => it.map(|v| v.as_float()).collect(),
            None => Ok(vec![self.as_float()?]),
        }
    }

    pub fn float_list(&self, path: &NamePath) -> Result<Vec<f64>> {
        self.get_path(path)?.as_float_list()
    }

    pub fn as_text_list(&self) -> Result<Vec<String>> {
        match self.elements() {
            Some(it) => it.map(|v| v.as_text().map(str::to_owned)).collect(),
            None => Ok(vec![self.as_text()?.to_owned()]),
        }
    }

    pub fn text_list(&self, path: &NamePath) -> Result<Vec<String>> {
        self.get_path(path)?.as_text_list()
    }

    pub fn as_boolean_list(&self) -> Result<Vec<bool>> {
        match self.elements() {
            Some(it) => it.map(|v| v.as_boolean()).collect(),
            None => Ok(vec![self.as_boolean()?]),
        }
    }

    pub fn boolean_list(&self, path: &NamePath) -> Result<Vec<bool>> {
        self.get_path(path)?.as_boolean_list()
    }
}

/// Resolve a path given in its canonical text form, relative to `document`'s
/// root.
pub fn get_text_path(document: Arc<Document>, path: &str) -> Result<Value> {
    let path = NamePath::parse(path)?;
    Value::root(document).get_path(&path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::Position;

    fn leaf(arena: &mut Arena<ValueData>, parent: ValueId, name: &str, payload: ValuePayload) -> ValueId {
        arena.alloc(ValueData::new(Name::create_regular(name).unwrap(), Some(parent), None, payload))
    }

    fn build_sample_document() -> Arc<Document> {
        let mut arena = Arena::new();
        let root = arena.alloc(ValueData::new(Name::empty(), None, None, ValuePayload::Document(NamedChildren::default())));
        let port = leaf(&mut arena, root, "port", ValuePayload::Integer(8080));
        let host = leaf(&mut arena, root, "host", ValuePayload::Text(Arc::from("localhost")));
        if let ValuePayload::Document(children) = &mut arena[root].payload {
            children.insert(Name::create_regular("port").unwrap(), port).unwrap();
            children.insert(Name::create_regular("host").unwrap(), host).unwrap();
        }
        Arc::new(Document::from_parts(arena, root, SourceIdentifier::text()))
    }

    #[test]
    fn root_resolves_named_children() {
        let document = build_sample_document();
        let root = Value::root(document);
        assert_eq!(root.value_type(), ValueType::Document);
        let port = root.get(&Name::create_regular("port").unwrap()).unwrap();
        assert_eq!(port.as_integer().unwrap(), 8080);
        assert_eq!(port.path().to_path_text(), "port");
    }

    #[test]
    fn get_path_resolves_full_name_path() {
        let document = build_sample_document();
        let root = Value::root(document);
        let path = NamePath::from_names(vec![Name::create_regular("host").unwrap()]);
        let host = root.get_path(&path).unwrap();
        assert_eq!(host.as_text().unwrap(), "localhost");
    }

    #[test]
    fn missing_child_is_value_not_found() {
        let document = build_sample_document();
        let root = Value::root(document);
        let err = root.get(&Name::create_regular("missing").unwrap()).unwrap_err();
        assert_eq!(err.category(), crate::error_category::ErrorCategory::ValueNotFound);
    }

    #[test]
    fn wrong_accessor_is_type_mismatch() {
        let document = build_sample_document();
        let root = Value::root(document);
        let port = root.get(&Name::create_regular("port").unwrap()).unwrap();
        let err = port.as_text().unwrap_err();
        assert_eq!(err.category(), crate::error_category::ErrorCategory::TypeMismatch);
    }

    #[test]
    fn duplicate_sibling_name_is_rejected() {
        let mut children = NamedChildren::default();
        let mut arena = Arena::new();
        let a = arena.alloc(ValueData::new(Name::create_regular("a").unwrap(), None, None, ValuePayload::Integer(1)));
        let b = arena.alloc(ValueData::new(Name::create_regular("a").unwrap(), None, None, ValuePayload::Integer(2)));
        children.insert(Name::create_regular("a").unwrap(), a).unwrap();
        assert!(children.insert(Name::create_regular("a").unwrap(), b).is_err());
    }

    #[test]
    fn narrow_integer_accessor_rejects_overflow() {
        let mut arena = Arena::new();
        let root = arena.alloc(ValueData::new(Name::empty(), None, None, ValuePayload::Integer(300)));
        let document = Arc::new(Document::from_parts(arena, root, SourceIdentifier::text()));
        let value = Value::root(document);
        assert!(value.as_sized_integer::<u8>().is_err());
        assert_eq!(value.as_sized_integer::<i64>().unwrap(), 300);
    }

    #[test]
    fn location_is_carried_when_present() {
        let mut arena = Arena::new();
        let location = Location::new(SourceIdentifier::text(), Position::start());
        let root = arena.alloc(ValueData::new(Name::empty(), None, Some(location.clone()), ValuePayload::Integer(1)));
        let document = Arc::new(Document::from_parts(arena, root, SourceIdentifier::text()));
        let value = Value::root(document);
        assert_eq!(value.location(), Some(&location));
    }
}
