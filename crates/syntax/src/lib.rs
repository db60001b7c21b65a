#![recursion_limit = "256"]

mod error_category;
mod limits;
mod location;
mod name;
mod name_path;
mod source_identifier;
mod value;
mod value_types;

pub use crate::{
    error_category::{Error, ErrorCategory, Result},
    limits::Limits,
    location::{Location, Position},
    name::{Name, NameType},
    name_path::NamePath,
    source_identifier::SourceIdentifier,
    value::{Document, NamedChildren, Value, ValueData, ValueId, ValuePayload, ValueType, get_text_path},
    value_types::{Bytes, Date, DateTime, RegEx, Time, TimeDelta, TimeUnit, TimeZone},
};
