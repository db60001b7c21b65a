use std::fs;
use std::path::{Path, PathBuf};

use syntax::{Error, Result, SourceIdentifier};

/// Produces raw bytes for a [`crate::CharacterStream`] to decode. One
/// instance is consumed per document (the parser opens a fresh source for
/// every include).
pub trait ByteSource {
    /// The identifier this source's characters/locations are tagged with.
    fn identifier(&self) -> &SourceIdentifier;

    /// The complete byte content. Sources are small configuration files;
    /// reading eagerly keeps the character stream's decode loop simple and
    /// matches the fully-eager parse model of the rest of the pipeline.
    fn read_all(&mut self) -> Result<Vec<u8>>;
}

/// Reads a document from disk.
pub struct FileByteSource {
    identifier: SourceIdentifier,
    path: PathBuf,
}

impl FileByteSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self { identifier: SourceIdentifier::file(&path), path }
    }
}

impl ByteSource for FileByteSource {
    fn identifier(&self) -> &SourceIdentifier {
        &self.identifier
    }

    fn read_all(&mut self) -> Result<Vec<u8>> {
        fs::read(&self.path).map_err(|e| Error::io(format!("failed to read '{}': {e}", self.path.display())))
    }
}

/// Reads a document from an in-memory buffer, e.g. a test fixture or a
/// value embedded in the host application.
pub struct StringByteSource {
    identifier: SourceIdentifier,
    content: Vec<u8>,
}

impl StringByteSource {
    pub fn new(content: impl Into<String>) -> Self {
        Self { identifier: SourceIdentifier::text(), content: content.into().into_bytes() }
    }
}

impl ByteSource for StringByteSource {
    fn identifier(&self) -> &SourceIdentifier {
        &self.identifier
    }

    fn read_all(&mut self) -> Result<Vec<u8>> {
        Ok(std::mem::take(&mut self.content))
    }
}

/// Reads a document from a raw, already-available byte buffer. Used for
/// content that arrived over a channel that isn't naturally UTF-8 text
/// (e.g. a test fixture exercising the decoder's error paths).
pub struct BytesSource {
    identifier: SourceIdentifier,
    content: Vec<u8>,
}

impl BytesSource {
    pub fn new(content: Vec<u8>) -> Self {
        Self { identifier: SourceIdentifier::text(), content }
    }
}

impl ByteSource for BytesSource {
    fn identifier(&self) -> &SourceIdentifier {
        &self.identifier
    }

    fn read_all(&mut self) -> Result<Vec<u8>> {
        Ok(std::mem::take(&mut self.content))
    }
}

/// Resolves a relative path against the directory a [`FileByteSource`]
/// lives in; used by the include resolver to locate sibling files.
pub fn sibling_directory(path: &Path) -> Option<&Path> {
    path.parent()
}
