use std::fmt;

use crate::location::Location;
use crate::name_path::NamePath;

/// The category every [`Error`] carries, in the precedence order used to
/// resolve a situation where more than one category's condition applies
/// (highest precedence first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    LimitExceeded,
    Character,
    Encoding,
    Unsupported,
    Indentation,
    UnexpectedEnd,
    Syntax,
    NameConflict,
    Signature,
    Access,
    ValueNotFound,
    TypeMismatch,
    IO,
    /// A precondition violation in the core itself; never the result of
    /// valid input.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorCategory::IO => "IO",
            ErrorCategory::Encoding => "Encoding",
            ErrorCategory::UnexpectedEnd => "UnexpectedEnd",
            ErrorCategory::Character => "Character",
            ErrorCategory::Syntax => "Syntax",
            ErrorCategory::LimitExceeded => "LimitExceeded",
            ErrorCategory::NameConflict => "NameConflict",
            ErrorCategory::Indentation => "Indentation",
            ErrorCategory::Unsupported => "Unsupported",
            ErrorCategory::Signature => "Signature",
            ErrorCategory::Access => "Access",
            ErrorCategory::ValueNotFound => "ValueNotFound",
            ErrorCategory::TypeMismatch => "TypeMismatch",
            ErrorCategory::Internal => "Internal",
        };
        f.write_str(label)
    }
}

/// A typed failure carrying a category, a message, an optional source
/// location, and an optional name-path fragment identifying the value the
/// failure relates to.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{category}: {message}{}", location.as_ref().map(|l| format!(" at {l}")).unwrap_or_default())]
pub struct Error {
    category: ErrorCategory,
    message: String,
    location: Option<Location>,
    path: Option<NamePath>,
}

impl Error {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self { category, message: message.into(), location: None, path: None }
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_path(mut self, path: NamePath) -> Self {
        self.path = Some(path);
        self
    }

    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    pub fn path(&self) -> Option<&NamePath> {
        self.path.as_ref()
    }
}

/// Convenience constructors, one per category, matching the category names
/// used throughout the parsing pipeline.
macro_rules! category_ctor {
    ($name:ident => $variant:ident) => {
        impl Error {
            pub fn $name(message: impl Into<String>) -> Self {
                Self::new(ErrorCategory::$variant, message)
            }
        }
    };
}

category_ctor!(io => IO);
category_ctor!(encoding => Encoding);
category_ctor!(unexpected_end => UnexpectedEnd);
category_ctor!(character => Character);
category_ctor!(syntax => Syntax);
category_ctor!(limit_exceeded => LimitExceeded);
category_ctor!(name_conflict => NameConflict);
category_ctor!(indentation => Indentation);
category_ctor!(unsupported => Unsupported);
category_ctor!(signature => Signature);
category_ctor!(access => Access);
category_ctor!(value_not_found => ValueNotFound);
category_ctor!(type_mismatch => TypeMismatch);
category_ctor!(internal => Internal);

pub type Result<T> = std::result::Result<T, Error>;
