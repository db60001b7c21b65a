mod cursor;
mod parser;
mod value_parser;

pub use parser::{Parser, ParserSettings};
pub use value_parser::{ParsedValue, ScalarPayload};
