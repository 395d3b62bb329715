//! Body formatting: text normalization and the choice of MIME structure.

use crate::collab::{HtmlToText, TokenSource};
use crate::content_type::ContentType;
use crate::part::{MultipartKind, Part};

/// Boundary prefix. `=_` never occurs in quoted-printable or base64 output.
const BOUNDARY_PREFIX: &str = "=_";

/// Draws allowed before settling on a boundary that collides.
const MAX_BOUNDARY_ATTEMPTS: usize = 8;

/// Normalizes a plain-text body for transfer.
///
/// Leading and trailing whitespace is trimmed, line endings become CRLF,
/// a line consisting of a single `.` is doubled, and the result ends with
/// a line break. An all-whitespace body becomes empty.
#[must_use]
pub fn normalize_text(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let unified = trimmed.replace("\r\n", "\n").replace('\r', "\n");
    let mut result = String::with_capacity(unified.len() + unified.len() / 16 + 2);

    for line in unified.split('\n') {
        if line == "." {
            result.push_str("..");
        } else {
            result.push_str(line);
        }
        result.push_str("\r\n");
    }

    result
}

/// Chooses the MIME structure for a message body and builds its part tree.
pub struct BodyFormatter<'a> {
    tokens: &'a dyn TokenSource,
    html_to_text: &'a dyn HtmlToText,
}

impl<'a> BodyFormatter<'a> {
    /// Creates a formatter drawing boundaries from `tokens`.
    #[must_use]
    pub fn new(tokens: &'a dyn TokenSource, html_to_text: &'a dyn HtmlToText) -> Self {
        Self {
            tokens,
            html_to_text,
        }
    }

    /// Builds the body part tree.
    ///
    /// | HTML | attachments | structure                                  |
    /// |------|-------------|--------------------------------------------|
    /// | no   | no          | `text/plain; format=flowed`                |
    /// | no   | yes         | `multipart/mixed` (text, attachments)      |
    /// | yes  | no          | `multipart/alternative` (text, html)       |
    /// | yes  | yes         | `multipart/mixed` (alternative, attachments) |
    #[must_use]
    pub fn format(&self, body: &str, is_html: bool, attachments: Vec<Part>) -> Part {
        let content = if is_html {
            let text = self.html_to_text.convert(body);
            let children = vec![
                Part::quoted_printable(ContentType::text_plain(), normalize_text(&text).as_bytes()),
                Part::quoted_printable(ContentType::text_html(), body.as_bytes()),
            ];
            let boundary = self.boundary_for(&children);
            tracing::debug!(%boundary, "Using multipart/alternative body");
            Part::multipart(MultipartKind::Alternative, boundary, children)
        } else {
            Part::quoted_printable(ContentType::text_plain(), normalize_text(body).as_bytes())
        };

        if attachments.is_empty() {
            return content;
        }

        let mut children = Vec::with_capacity(attachments.len() + 1);
        children.push(content);
        children.extend(attachments);
        let boundary = self.boundary_for(&children);
        tracing::debug!(%boundary, parts = children.len(), "Using multipart/mixed body");
        Part::multipart(MultipartKind::Mixed, boundary, children)
    }

    /// Picks a boundary whose delimiter does not occur anywhere in the
    /// serialized children.
    fn boundary_for(&self, children: &[Part]) -> String {
        let serialized: Vec<Vec<u8>> = children.iter().map(Part::to_bytes).collect();
        let mut boundary = String::new();

        for _ in 0..MAX_BOUNDARY_ATTEMPTS {
            boundary = format!("{BOUNDARY_PREFIX}{}", self.tokens.token());
            let delimiter = format!("--{boundary}");
            let collides = serialized.iter().any(|bytes| {
                bytes
                    .windows(delimiter.len())
                    .any(|w| w == delimiter.as_bytes())
            });
            if !collides {
                return boundary;
            }
            tracing::debug!(%boundary, "Boundary occurs in content, drawing another");
        }

        tracing::warn!(%boundary, "No collision-free boundary found");
        boundary
    }
}
