use std::fmt;
use std::path::{Path, PathBuf};

use triomphe::Arc;

/// Identifies the origin of a document: either a canonicalized file path or
/// the synthetic "text" source used for in-memory documents.
///
/// Cheaply cloneable: the inner data is held behind a [`triomphe::Arc`] so
/// every [`crate::location::Location`] built while parsing an included file
/// can share one allocation instead of cloning the path string.
#[derive(Debug, Clone)]
pub struct SourceIdentifier(Arc<Repr>);

#[derive(Debug, PartialEq, Eq, Hash)]
enum Repr {
    File(PathBuf),
    Text,
}

impl SourceIdentifier {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self(Arc::new(Repr::File(path.into())))
    }

    pub fn text() -> Self {
        Self(Arc::new(Repr::Text))
    }

    pub fn is_file(&self) -> bool {
        matches!(&*self.0, Repr::File(_))
    }

    pub fn path(&self) -> Option<&Path> {
        match &*self.0 {
            Repr::File(path) => Some(path.as_path()),
            Repr::Text => None,
        }
    }

    /// The source's display name: `"file"` for file sources, `"text"` for
    /// in-memory sources. This is distinct from the canonical path text
    /// form (see [`SourceIdentifier::to_text`]).
    pub fn name(&self) -> &'static str {
        match &*self.0 {
            Repr::File(_) => "file",
            Repr::Text => "text",
        }
    }

    /// Canonical text form: `file:<canonical-path>` or `text`.
    pub fn to_text(&self) -> String {
        match &*self.0 {
            Repr::File(path) => format!("file:{}", path.display()),
            Repr::Text => "text".to_owned(),
        }
    }
}

impl PartialEq for SourceIdentifier {
    fn eq(&self, other: &Self) -> bool {
        *self.0 == *other.0
    }
}

impl Eq for SourceIdentifier {}

impl std::hash::Hash for SourceIdentifier {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        (*self.0).hash(state);
    }
}

impl fmt::Display for SourceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}
