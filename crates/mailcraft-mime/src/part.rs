//! MIME part tree and its serializer.

use crate::content_type::ContentType;
use crate::encoding::{encode_base64_lines, encode_quoted_printable};
use crate::header::Headers;
use std::fmt;

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// 7-bit content passed through unchanged.
    SevenBit,
    /// Base64 encoding.
    Base64,
    /// Quoted-Printable encoding.
    QuotedPrintable,
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::Base64 => write!(f, "base64"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
        }
    }
}

/// Multipart flavours produced by the composer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultipartKind {
    /// `multipart/mixed`: body followed by attachments.
    Mixed,
    /// `multipart/alternative`: plain text and HTML renderings.
    Alternative,
}

/// A single content part with its body already transfer-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaf {
    /// Content type of the decoded content.
    pub content_type: ContentType,
    /// Transfer encoding applied to `body`.
    pub encoding: TransferEncoding,
    /// Additional part headers (disposition, description).
    pub headers: Headers,
    /// Encoded body bytes.
    pub body: Vec<u8>,
}

/// MIME part: either a leaf or a multipart container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    /// Content part.
    Leaf(Leaf),
    /// Container delimiting child parts with a boundary.
    Multipart {
        /// Multipart subtype.
        kind: MultipartKind,
        /// Boundary token, without the leading dashes.
        boundary: String,
        /// Child parts in output order.
        parts: Vec<Part>,
    },
}

impl Part {
    /// Creates a quoted-printable leaf from raw content.
    #[must_use]
    pub fn quoted_printable(content_type: ContentType, content: &[u8]) -> Self {
        Self::Leaf(Leaf {
            content_type,
            encoding: TransferEncoding::QuotedPrintable,
            headers: Headers::new(),
            body: encode_quoted_printable(content).into_bytes(),
        })
    }

    /// Creates a base64 leaf from raw content.
    #[must_use]
    pub fn base64(content_type: ContentType, content: &[u8]) -> Self {
        Self::Leaf(Leaf {
            content_type,
            encoding: TransferEncoding::Base64,
            headers: Headers::new(),
            body: encode_base64_lines(content).into_bytes(),
        })
    }

    /// Creates a 7bit leaf that carries `content` verbatim.
    #[must_use]
    pub fn seven_bit(content_type: ContentType, content: Vec<u8>) -> Self {
        Self::Leaf(Leaf {
            content_type,
            encoding: TransferEncoding::SevenBit,
            headers: Headers::new(),
            body: content,
        })
    }

    /// Creates a multipart container.
    #[must_use]
    pub fn multipart(kind: MultipartKind, boundary: impl Into<String>, parts: Vec<Self>) -> Self {
        Self::Multipart {
            kind,
            boundary: boundary.into(),
            parts,
        }
    }

    /// Adds an extra header to a leaf part. Containers are left unchanged.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let Self::Leaf(leaf) = &mut self {
            leaf.headers.set(name, value);
        }
        self
    }

    /// Gets the content type of this part.
    #[must_use]
    pub fn content_type(&self) -> ContentType {
        match self {
            Self::Leaf(leaf) => leaf.content_type.clone(),
            Self::Multipart { kind, boundary, .. } => match kind {
                MultipartKind::Mixed => ContentType::multipart_mixed(boundary.as_str()),
                MultipartKind::Alternative => {
                    ContentType::multipart_alternative(boundary.as_str())
                }
            },
        }
    }

    /// Headers describing this part: `Content-Type`, then
    /// `Content-Transfer-Encoding` for leaves, then any extra leaf headers.
    #[must_use]
    pub fn headers(&self) -> Headers {
        let mut headers = Headers::new();
        headers.set("Content-Type", self.content_type().to_string());
        if let Self::Leaf(leaf) = self {
            headers.set("Content-Transfer-Encoding", leaf.encoding.to_string());
            headers.extend(&leaf.headers);
        }
        headers
    }

    /// Writes the body of this part, without its own headers.
    pub fn write_body(&self, out: &mut Vec<u8>) {
        match self {
            Self::Leaf(leaf) => out.extend_from_slice(&leaf.body),
            Self::Multipart {
                boundary, parts, ..
            } => {
                for part in parts {
                    out.extend_from_slice(b"--");
                    out.extend_from_slice(boundary.as_bytes());
                    out.extend_from_slice(b"\r\n");
                    part.headers().write_to(out);
                    out.extend_from_slice(b"\r\n");
                    part.write_body(out);
                    out.extend_from_slice(b"\r\n");
                }
                out.extend_from_slice(b"--");
                out.extend_from_slice(boundary.as_bytes());
                out.extend_from_slice(b"--\r\n");
            }
        }
    }

    /// Serializes the part with its headers and a blank separator line.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.headers().write_to(&mut out);
        out.extend_from_slice(b"\r\n");
        self.write_body(&mut out);
        out
    }
}
