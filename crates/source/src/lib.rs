mod byte_source;
mod character_stream;

pub use crate::byte_source::{BytesSource, ByteSource, FileByteSource, StringByteSource};
pub use crate::character_stream::{Character, CharacterStream};
