use std::fmt;

use triomphe::Arc;

use crate::error_category::{Error, Result};

/// A compiled regular expression parsed from a `/pattern/` literal.
/// Equality and hashing compare the source pattern text; the compiled
/// automaton is a derived, cheaply-shared cache.
#[derive(Debug, Clone)]
pub struct RegEx {
    source: Arc<str>,
    compiled: Arc<regex::Regex>,
}

impl RegEx {
    /// Compile `source` after undoing the lexer's `\/` → `/` unescaping
    /// (already applied by the time this is called; every other backslash
    /// pair is passed through verbatim).
    pub fn new(source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        let compiled = regex::Regex::new(&source).map_err(|e| Error::syntax(format!("invalid regular expression: {e}")))?;
        Ok(Self { source: Arc::from(source.into_boxed_str()), compiled: Arc::new(compiled) })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.compiled.is_match(text)
    }

    pub fn compiled(&self) -> &regex::Regex {
        &self.compiled
    }
}

impl PartialEq for RegEx {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for RegEx {}

impl std::hash::Hash for RegEx {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.source.hash(state);
    }
}

impl fmt::Display for RegEx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/", self.source)
    }
}
