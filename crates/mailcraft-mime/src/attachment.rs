//! Attachment descriptors and their MIME parts.

use crate::collab::{AttachmentReader, Decryptor};
use crate::content_type::ContentType;
use crate::encoding::{encode_header_value, sanitize_header_text};
use crate::part::Part;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A file to attach, read lazily when the message is finalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Source path of the content.
    pub filename: PathBuf,
    /// Display name shown to recipients.
    pub name: String,
    /// Declared MIME content type, e.g. `application/pdf`.
    #[serde(rename = "type")]
    pub content_type: String,
    /// Emit the bytes verbatim as 7bit instead of base64.
    #[serde(default)]
    pub no_encoding: bool,
    /// Content at `filename` is encrypted and must be decrypted first.
    #[serde(default)]
    pub encrypted: bool,
}

impl Attachment {
    /// Creates a base64-encoded attachment descriptor.
    #[must_use]
    pub fn new(
        filename: impl Into<PathBuf>,
        name: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            filename: filename.into(),
            name: name.into(),
            content_type: content_type.into(),
            no_encoding: false,
            encrypted: false,
        }
    }

    /// Sends the content as raw 7bit data.
    #[must_use]
    pub const fn without_encoding(mut self) -> Self {
        self.no_encoding = true;
        self
    }

    /// Marks the staged content as encrypted.
    #[must_use]
    pub const fn encrypted(mut self) -> Self {
        self.encrypted = true;
        self
    }

    /// Builds the MIME part for already-read `content`.
    #[must_use]
    pub fn to_part(&self, content: Vec<u8>) -> Part {
        let name = encode_header_value(&self.name);

        let content_type = ContentType::parse(&sanitize_header_text(&self.content_type))
            .unwrap_or_else(|e| {
                tracing::warn!(attachment = %self.name, error = %e, "Falling back to application/octet-stream");
                ContentType::octet_stream()
            })
            .with_parameter("name", name.as_str());

        let part = if self.no_encoding {
            Part::seven_bit(content_type, content)
        } else {
            Part::base64(content_type, &content)
        };

        let quoted = name.replace('\\', "\\\\").replace('"', "\\\"");
        part.with_header("Content-Description", name.as_str())
            .with_header("Content-Disposition", format!("attachment; filename=\"{quoted}\""))
    }
}

/// Why an attachment was left out of the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OmitReason {
    /// The file could not be read.
    Unreadable(String),
    /// The staged content could not be decrypted.
    DecryptFailed(String),
    /// The file was empty.
    Empty,
}

/// What happened to one attachment during rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentOutcome {
    /// The attachment is part of the message.
    Included {
        /// Display name of the attachment.
        name: String,
        /// Size of the content before transfer encoding.
        size: usize,
    },
    /// The attachment was dropped; rendering carried on without it.
    Omitted {
        /// Display name of the attachment.
        name: String,
        /// Cause of the omission.
        reason: OmitReason,
    },
}

impl AttachmentOutcome {
    /// Returns true if the attachment made it into the message.
    #[must_use]
    pub const fn is_included(&self) -> bool {
        matches!(self, Self::Included { .. })
    }
}

/// Reads every attachment and builds a part for each one that yields
/// content. Failures never abort; they are reported as outcomes.
pub fn encode_attachments(
    attachments: &[Attachment],
    reader: &dyn AttachmentReader,
    decryptor: &dyn Decryptor,
) -> (Vec<Part>, Vec<AttachmentOutcome>) {
    let mut parts = Vec::new();
    let mut outcomes = Vec::with_capacity(attachments.len());

    for attachment in attachments {
        match load(attachment, reader, decryptor) {
            Ok(content) => {
                outcomes.push(AttachmentOutcome::Included {
                    name: attachment.name.clone(),
                    size: content.len(),
                });
                parts.push(attachment.to_part(content));
            }
            Err(reason) => {
                tracing::warn!(
                    attachment = %attachment.name,
                    path = %attachment.filename.display(),
                    ?reason,
                    "Omitting attachment"
                );
                outcomes.push(AttachmentOutcome::Omitted {
                    name: attachment.name.clone(),
                    reason,
                });
            }
        }
    }

    (parts, outcomes)
}

fn load(
    attachment: &Attachment,
    reader: &dyn AttachmentReader,
    decryptor: &dyn Decryptor,
) -> Result<Vec<u8>, OmitReason> {
    let mut content = reader
        .read(&attachment.filename)
        .map_err(|e| OmitReason::Unreadable(e.to_string()))?;

    if attachment.encrypted {
        content = decryptor
            .decrypt(content)
            .map_err(|e| OmitReason::DecryptFailed(e.to_string()))?;
    }

    if content.is_empty() {
        return Err(OmitReason::Empty);
    }

    Ok(content)
}
