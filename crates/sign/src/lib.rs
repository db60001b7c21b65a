//! The out-of-band signer tool that produces a signed copy of a document,
//! and the validator callback contract consulted by the parser while
//! loading a signed document.

use std::fs;
use std::path::{Path, PathBuf};

use crypto::{Sha3_256, to_hex};
use source::{ByteSource, CharacterStream, FileByteSource};
use syntax::{Error, Limits, Result, SourceIdentifier};

const SIGNATURE_PREFIX: &str = "@signature: \"";
const DOCUMENT_HASH_ALGORITHM: &str = "sha3-256";
const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// Everything a [`SignatureSigner`] needs to produce a signature for one
/// document.
pub struct SignatureSignerData {
    pub source_identifier: SourceIdentifier,
    /// The raw, unprocessed text passed to [`Signer::sign`].
    pub signing_person_text: String,
    /// `"<algorithm> <hex digest>"`, e.g. `"sha3-256 1a2b..."`.
    pub document_digest: String,
}

/// Produces the signature text stored in a document's `@signature` line.
pub trait SignatureSigner {
    fn sign(&self, data: &SignatureSignerData) -> Result<String>;
}

/// Everything a [`SignatureValidator`] needs to decide whether a loaded
/// document's signature is acceptable.
pub struct SignatureValidatorData<'a> {
    pub source_identifier: &'a SourceIdentifier,
    pub signature_text: &'a str,
    pub document_digest: &'a str,
}

/// The validator's verdict on a signed document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject,
}

/// Consulted by the parser once per signed document it loads.
pub trait SignatureValidator {
    fn validate(&self, data: &SignatureValidatorData<'_>) -> Verdict;
}

/// The tool that writes a signed copy of a document.
///
/// Signing does not parse the document; it only checks its encoding and
/// line lengths while computing the digest the signer signs over. Running
/// it through a parser first is recommended but not required.
pub struct Signer<S> {
    signer: S,
    limits: Limits,
}

impl<S: SignatureSigner> Signer<S> {
    pub fn new(signer: S) -> Self {
        Self { signer, limits: Limits::default() }
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Sign the document at `source_path`, writing the signed copy to
    /// `destination_path`.
    pub fn sign(&self, source_path: impl AsRef<Path>, destination_path: impl AsRef<Path>, signing_person_text: impl Into<String>) -> Result<()> {
        let source_path = source_path.as_ref();
        let destination_path = destination_path.as_ref();

        let metadata = fs::metadata(source_path).map_err(|e| Error::io(format!("could not read the source file metadata: {e}")))?;
        if !metadata.is_file() {
            return Err(Error::io("the source path is not an existing regular file"));
        }
        if metadata.len() > self.limits.max_document_size() {
            return Err(Error::limit_exceeded("the source file is too large to sign"));
        }

        let digest_result = build_digest(source_path, self.limits)?;
        let data = SignatureSignerData {
            source_identifier: SourceIdentifier::file(source_path),
            signing_person_text: signing_person_text.into(),
            document_digest: digest_result.digest_text.clone(),
        };
        let signature_text = self.signer.sign(&data)?;
        let escaped_signature = validate_and_escape_signature_text(&signature_text, &self.limits)?;

        write_signed_file(source_path, destination_path, &escaped_signature, &digest_result)
    }
}

struct DigestResult {
    digest_text: String,
    digest: [u8; 32],
    has_crlf: bool,
}

fn build_digest(source_path: &Path, limits: Limits) -> Result<DigestResult> {
    let mut byte_source = FileByteSource::new(source_path);
    let bytes = byte_source.read_all()?;
    let has_crlf = bytes.windows(2).any(|w| w == b"\r\n");

    let mut stream = CharacterStream::open(FileByteSource::new(source_path), limits)?;
    loop {
        let c = stream.next()?;
        if c.is_end_of_data() {
            break;
        }
    }
    let digest = stream.digest();
    let digest_text = format!("{DOCUMENT_HASH_ALGORITHM} {}", to_hex(&digest));
    Ok(DigestResult { digest_text, digest, has_crlf })
}

fn validate_and_escape_signature_text(signature_text: &str, limits: &Limits) -> Result<String> {
    if signature_text.is_empty() {
        return Err(Error::signature("the signature text is empty"));
    }
    let escaped = escape_text(signature_text);
    if escaped.len() > limits.max_signature_text_length() {
        return Err(Error::limit_exceeded("the signature text is too long"));
    }
    Ok(escaped)
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{{{:x}}}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

fn write_signed_file(source_path: &Path, destination_path: &Path, escaped_signature: &str, digest_result: &DigestResult) -> Result<()> {
    let line_ending = if digest_result.has_crlf { "\r\n" } else { "\n" };
    let placeholder_line = format!("{SIGNATURE_PREFIX}{}\"{}", "?".repeat(escaped_signature.len()), line_ending);
    let real_line = format!("{SIGNATURE_PREFIX}{escaped_signature}\"{line_ending}");
    debug_assert_eq!(placeholder_line.len(), real_line.len());

    fs::write(destination_path, &placeholder_line).map_err(|e| Error::io(format!("could not write the signed file: {e}")))?;

    let digest_after_write = append_body_and_digest(source_path, destination_path)?;
    if digest_after_write != digest_result.digest {
        return Err(Error::signature("the source file was modified while writing the signed version"));
    }

    overwrite_signature_line(destination_path, &real_line)
}

fn append_body_and_digest(source_path: &Path, destination_path: &Path) -> Result<[u8; 32]> {
    use std::io::Write;

    let body = fs::read(source_path).map_err(|e| Error::io(format!("could not reread the source file: {e}")))?;
    let body_after_signature = skip_leading_signature_line(&body);

    let mut digest = Sha3_256::new();
    digest.update(body_after_signature);

    let mut file = fs::OpenOptions::new().append(true).open(destination_path).map_err(|e| Error::io(format!("could not append to the signed file: {e}")))?;
    file.write_all(body_after_signature).map_err(|e| Error::io(format!("could not write the signed file: {e}")))?;

    Ok(digest.digest())
}

/// Strip a leading BOM (matching [`source::CharacterStream`]'s own silent
/// BOM handling) and, if what remains opens with `@signature`, its whole
/// first line including the line terminator — the same bytes the character
/// stream excludes from the document digest.
fn skip_leading_signature_line(bytes: &[u8]) -> &[u8] {
    let bytes = bytes.strip_prefix(&UTF8_BOM).unwrap_or(bytes);
    if !bytes.starts_with(b"@signature") {
        return bytes;
    }
    match bytes.iter().position(|&b| b == b'\n') {
        Some(index) => &bytes[index + 1..],
        None => &[],
    }
}

fn overwrite_signature_line(destination_path: &Path, real_line: &str) -> Result<()> {
    use std::io::{Seek, SeekFrom, Write};

    let mut file = fs::OpenOptions::new().write(true).open(destination_path).map_err(|e| Error::io(format!("could not reopen the signed file: {e}")))?;
    file.seek(SeekFrom::Start(0)).map_err(|e| Error::io(format!("could not seek in the signed file: {e}")))?;
    file.write_all(real_line.as_bytes()).map_err(|e| Error::io(format!("could not write the signed file: {e}")))?;
    Ok(())
}

/// Compute `"<algorithm> <hex digest>"` for an already-decoded document
/// digest, as produced by [`source::CharacterStream::digest`]. Used by the
/// parser to build the text handed to a [`SignatureValidator`].
pub fn digest_text(digest: &[u8; 32]) -> String {
    format!("{DOCUMENT_HASH_ALGORITHM} {}", to_hex(digest))
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;

    struct FixedSigner(&'static str);

    impl SignatureSigner for FixedSigner {
        fn sign(&self, _data: &SignatureSignerData) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    fn tempfile(name: &str, content: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("elcl-sign-test-{:?}-{}-{name}", std::thread::current().id(), std::process::id()));
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn signs_a_document_with_a_placeholder_then_real_signature_line() {
        let source = tempfile("source.elcl", "[main]\nvalue: 123\n");
        let destination = source.with_extension("signed.elcl");

        let signer = Signer::new(FixedSigner("test-signature"));
        signer.sign(&source, &destination, "tester").unwrap();

        let mut contents = String::new();
        fs::File::open(&destination).unwrap().read_to_string(&mut contents).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next(), Some("@signature: \"test-signature\""));
        assert_eq!(lines.next(), Some("[main]"));
        assert_eq!(lines.next(), Some("value: 123"));

        fs::remove_file(&source).ok();
        fs::remove_file(&destination).ok();
    }

    #[test]
    fn resigning_an_already_signed_document_replaces_the_old_line() {
        let source = tempfile("already-signed.elcl", "@signature: \"old\"\n[main]\nvalue: 1\n");
        let destination = source.with_extension("resigned.elcl");

        let signer = Signer::new(FixedSigner("new-signature"));
        signer.sign(&source, &destination, "tester").unwrap();

        let mut contents = String::new();
        fs::File::open(&destination).unwrap().read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "@signature: \"new-signature\"\n[main]\nvalue: 1\n");

        fs::remove_file(&source).ok();
        fs::remove_file(&destination).ok();
    }

    #[test]
    fn signing_and_then_verifying_digest_round_trips() {
        let source = tempfile("round-trip.elcl", "[main]\nvalue: 42\n");
        let destination = source.with_extension("signed2.elcl");

        let unsigned_digest = {
            let mut stream = CharacterStream::open(FileByteSource::new(&source), Limits::default()).unwrap();
            loop {
                if stream.next().unwrap().is_end_of_data() {
                    break;
                }
            }
            digest_text(&stream.digest())
        };

        let signer = Signer::new(FixedSigner("sig"));
        signer.sign(&source, &destination, "tester").unwrap();

        let signed_digest = {
            let mut stream = CharacterStream::open(FileByteSource::new(&destination), Limits::default()).unwrap();
            loop {
                if stream.next().unwrap().is_end_of_data() {
                    break;
                }
            }
            digest_text(&stream.digest())
        };

        assert_eq!(unsigned_digest, signed_digest);

        fs::remove_file(&source).ok();
        fs::remove_file(&destination).ok();
    }

    #[test]
    fn rejects_an_empty_signature_text() {
        let source = tempfile("empty-sig.elcl", "[main]\nvalue: 1\n");
        let destination = source.with_extension("out.elcl");
        let signer = Signer::new(FixedSigner(""));
        let err = signer.sign(&source, &destination, "tester").unwrap_err();
        assert_eq!(err.category(), syntax::ErrorCategory::Signature);
        fs::remove_file(&source).ok();
    }

    #[test]
    fn escapes_quotes_and_control_characters_in_signature_text() {
        assert_eq!(escape_text("a\"b\\c\nd"), "a\\\"b\\\\c\\nd");
    }
}
