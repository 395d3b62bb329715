//! Capabilities the composer relies on, passed in rather than reached for
//! globally, with the default implementations.

use crate::error::Result;
use rand::RngCore;
use std::fmt::Write as _;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Source of unique tokens for boundaries and Message-Ids.
pub trait TokenSource: Send + Sync {
    /// Returns a fresh token made of RFC 2045 token characters.
    fn token(&self) -> String;
}

/// Cryptographically random 128-bit tokens rendered as lowercase hex.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomTokens;

impl TokenSource for RandomTokens {
    fn token(&self) -> String {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);

        let mut token = String::with_capacity(32);
        for byte in bytes {
            let _ = write!(token, "{byte:02x}");
        }
        token
    }
}

/// Deterministic tokens (`<prefix>1`, `<prefix>2`, ...) for reproducible
/// output.
#[derive(Debug, Default)]
pub struct SequentialTokens {
    prefix: String,
    counter: AtomicUsize,
}

impl SequentialTokens {
    /// Creates a sequence that prefixes every counter value with `prefix`.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicUsize::new(0),
        }
    }
}

impl TokenSource for SequentialTokens {
    fn token(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}{n}", self.prefix)
    }
}

/// Converts an HTML body into its plain-text rendering.
pub trait HtmlToText: Send + Sync {
    /// Returns the text rendering of `html`.
    fn convert(&self, html: &str) -> String;
}

/// Renders HTML as Markdown-flavoured plain text.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownText;

impl HtmlToText for MarkdownText {
    fn convert(&self, html: &str) -> String {
        let text = htmd::convert(html).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "HTML conversion failed, using raw markup");
            html.to_string()
        });
        html_escape::decode_html_entities(&text).into_owned()
    }
}

/// Decides whether a candidate string is a usable email address.
pub trait AddressValidator: Send + Sync {
    /// Returns true if `addr` is a syntactically valid address.
    fn is_valid(&self, addr: &str) -> bool;
}

/// Syntax check backed by [`crate::address::validate`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntaxValidator;

impl AddressValidator for SyntaxValidator {
    fn is_valid(&self, addr: &str) -> bool {
        crate::address::validate(addr).is_ok()
    }
}

/// Reads attachment content at render time.
pub trait AttachmentReader: Send + Sync {
    /// Reads the full content of `path`.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error when the file cannot be read.
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
}

/// Reads attachments from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsReader;

impl AttachmentReader for FsReader {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }
}

/// Decrypts attachment content that was staged encrypted.
pub trait Decryptor: Send + Sync {
    /// Returns the plaintext for `data`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Decrypt`] when the payload cannot be decrypted.
    fn decrypt(&self, data: Vec<u8>) -> Result<Vec<u8>>;
}

/// Decryptor for deployments without encrypted staging: returns the input.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl Decryptor for Passthrough {
    fn decrypt(&self, data: Vec<u8>) -> Result<Vec<u8>> {
        Ok(data)
    }
}

/// Returns the local host name for Message-Ids, or `localhost`.
#[must_use]
pub fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty() && h.is_ascii())
        .unwrap_or_else(|| "localhost".to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_random_tokens_shape() {
        let a = RandomTokens.token();
        let b = RandomTokens.token();
        assert_eq!(a.len(), 32);
        assert!(a.bytes().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_sequential_tokens() {
        let tokens = SequentialTokens::new("t");
        assert_eq!(tokens.token(), "t1");
        assert_eq!(tokens.token(), "t2");
    }

    #[test]
    fn test_markdown_text_strips_markup() {
        let text = MarkdownText.convert("<p>Fish &amp; chips</p>");
        assert!(text.contains("chips"));
        assert!(!text.contains("&amp;"));
        assert!(!text.contains("<p>"));
    }

    #[test]
    fn test_syntax_validator() {
        assert!(SyntaxValidator.is_valid("a@example.com"));
        assert!(!SyntaxValidator.is_valid("a@"));
    }

    #[test]
    fn test_fs_reader_missing_file() {
        let err = FsReader
            .read(Path::new("/definitely/not/here.bin"))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_passthrough() {
        assert_eq!(Passthrough.decrypt(b"abc".to_vec()).unwrap(), b"abc");
    }

    #[test]
    fn test_local_hostname_not_empty() {
        assert!(!local_hostname().is_empty());
    }
}
