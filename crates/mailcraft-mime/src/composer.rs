//! Message composition: header assembly, finalization and the frozen
//! rendered result.

use crate::address::{encode_address_list, extract_addresses, format_mailbox};
use crate::attachment::{Attachment, AttachmentOutcome, encode_attachments};
use crate::body::BodyFormatter;
use crate::collab::{
    AddressValidator, AttachmentReader, Decryptor, FsReader, HtmlToText, MarkdownText,
    Passthrough, RandomTokens, SyntaxValidator, TokenSource, local_hostname,
};
use crate::encoding::{encode_header_value, sanitize_header_text};
use crate::header::Headers;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Header flag set when an automatic Bcc recipient was added.
pub const AUTO_BCC_HEADER: &str = "X-Auto-Bcc";

/// Headers owned by the composer that custom headers may not set.
const RESERVED_HEADERS: [&str; 14] = [
    "Date",
    "From",
    "Reply-To",
    "To",
    "Cc",
    "Bcc",
    "Subject",
    "Message-Id",
    "In-Reply-To",
    "References",
    "MIME-Version",
    AUTO_BCC_HEADER,
    "Content-Type",
    "Content-Transfer-Encoding",
];

/// The logical message fields, fixed when a [`Composer`] is created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Message {
    /// Visible recipients, a pre-formatted address list.
    pub to: String,
    /// Visible copy recipients, a pre-formatted address list.
    pub cc: String,
    /// Hidden recipients; never written to the header block.
    pub bcc: String,
    /// Sender address.
    pub from: String,
    /// Sender display name.
    pub from_name: Option<String>,
    /// Reply address; the sender address when absent.
    pub reply_to: Option<String>,
    /// Subject, possibly containing HTML entities.
    pub subject: String,
    /// Body text, or HTML markup when `is_html` is set.
    pub body: String,
    /// The body is HTML.
    pub is_html: bool,
    /// Message-Id of the message being replied to.
    pub in_reply_to_id: Option<String>,
}

/// Capabilities the composer draws on, replaceable for tests or special
/// deployments.
#[derive(Clone)]
pub struct Capabilities {
    /// Boundary and Message-Id tokens.
    pub tokens: Arc<dyn TokenSource>,
    /// Plain-text rendering of HTML bodies.
    pub html_to_text: Arc<dyn HtmlToText>,
    /// Recipient address syntax check.
    pub validator: Arc<dyn AddressValidator>,
    /// Attachment content reader.
    pub reader: Arc<dyn AttachmentReader>,
    /// Decryption of encrypted attachment staging.
    pub decryptor: Arc<dyn Decryptor>,
    /// Domain part of generated Message-Ids.
    pub hostname: String,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            tokens: Arc::new(RandomTokens),
            html_to_text: Arc::new(MarkdownText),
            validator: Arc::new(SyntaxValidator),
            reader: Arc::new(FsReader),
            decryptor: Arc::new(Passthrough),
            hostname: local_hostname(),
        }
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities")
            .field("hostname", &self.hostname)
            .finish_non_exhaustive()
    }
}

/// Mutable composition stage: fields are fixed, attachments and extra
/// headers can still be added. [`Composer::finalize`] consumes it and
/// returns the immutable [`RenderedMessage`].
#[derive(Debug, Clone)]
pub struct Composer {
    message: Message,
    subject: String,
    message_id: String,
    date: DateTime<FixedOffset>,
    attachments: Vec<Attachment>,
    custom_headers: Headers,
    auto_bcc: bool,
    capabilities: Capabilities,
}

impl Composer {
    /// Creates a composer with the default capabilities.
    #[must_use]
    pub fn new(message: Message) -> Self {
        Self::with_capabilities(message, Capabilities::default())
    }

    /// Creates a composer with the given capabilities.
    ///
    /// The Message-Id and Date are generated here, so every render of this
    /// composer carries the same values.
    #[must_use]
    pub fn with_capabilities(message: Message, capabilities: Capabilities) -> Self {
        let subject = encode_header_value(&html_escape::decode_html_entities(&message.subject));
        let message_id = format!("<{}@{}>", capabilities.tokens.token(), capabilities.hostname);

        Self {
            message,
            subject,
            message_id,
            date: chrono::Local::now().fixed_offset(),
            attachments: Vec::new(),
            custom_headers: Headers::new(),
            auto_bcc: false,
            capabilities,
        }
    }

    /// Returns the message fields.
    #[must_use]
    pub const fn message(&self) -> &Message {
        &self.message
    }

    /// Returns the generated Message-Id, including angle brackets.
    #[must_use]
    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// Returns the attachments added so far.
    #[must_use]
    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    /// Replaces the Date generated at construction.
    #[must_use]
    pub const fn date(mut self, date: DateTime<FixedOffset>) -> Self {
        self.date = date;
        self
    }

    /// Adds an attachment. Its content is read at finalization.
    #[must_use]
    pub fn attach(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Adds a hidden recipient after construction and flags the message
    /// with the [`AUTO_BCC_HEADER`] header.
    #[must_use]
    pub fn auto_bcc(mut self, address: &str) -> Self {
        let address = address.trim();
        if address.is_empty() {
            return self;
        }

        if self.message.bcc.trim().is_empty() {
            self.message.bcc = address.to_string();
        } else {
            self.message.bcc = format!("{}, {address}", self.message.bcc.trim_end());
        }
        self.auto_bcc = true;
        tracing::debug!(%address, "Added automatic Bcc recipient");
        self
    }

    /// Adds a custom header, written after the standard headers.
    ///
    /// Headers the composer writes itself, `Bcc`, and malformed names are
    /// refused with a warning. Line breaks in the value become spaces.
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        let name = name.trim();
        let valid_name = !name.is_empty()
            && name
                .bytes()
                .all(|b| b.is_ascii_graphic() && b != b':');
        if !valid_name {
            tracing::warn!(header = %name, "Ignoring header with invalid name");
            return self;
        }
        if RESERVED_HEADERS.iter().any(|r| r.eq_ignore_ascii_case(name)) {
            tracing::warn!(header = %name, "Ignoring reserved header");
            return self;
        }

        self.custom_headers.set(name, encode_header_value(value.trim()));
        self
    }

    /// Returns the envelope recipients: every valid address in To, Cc and
    /// Bcc, in that order.
    #[must_use]
    pub fn recipients(&self) -> Vec<String> {
        let validator = self.capabilities.validator.as_ref();
        [&self.message.to, &self.message.cc, &self.message.bcc]
            .into_iter()
            .flat_map(|value| extract_addresses(value, validator))
            .collect()
    }

    /// Builds the header block without the body structure headers.
    fn assemble_headers(&self) -> Headers {
        let message = &self.message;
        let mut headers = Headers::new();

        headers.set("Date", self.date.to_rfc2822());
        headers.set(
            "From",
            format_mailbox(message.from_name.as_deref(), message.from.trim()),
        );
        let reply_to = message
            .reply_to
            .as_deref()
            .filter(|r| !r.trim().is_empty())
            .unwrap_or(&message.from);
        headers.set("Reply-To", encode_address_list(reply_to.trim()));
        headers.set("To", encode_address_list(message.to.trim()));
        headers.set("Cc", encode_address_list(message.cc.trim()));
        headers.set("Subject", self.subject.as_str());
        headers.set("Message-Id", self.message_id.as_str());

        if let Some(id) = message
            .in_reply_to_id
            .as_deref()
            .map(sanitize_header_text)
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
        {
            let id = if id.starts_with('<') {
                id
            } else {
                format!("<{id}>")
            };
            headers.set("In-Reply-To", id.as_str());
            headers.set("References", id);
        }

        headers.set("MIME-Version", "1.0");
        if self.auto_bcc {
            headers.set(AUTO_BCC_HEADER, "yes");
        }
        headers.extend(&self.custom_headers);

        headers
    }

    /// Renders the message and freezes the result.
    ///
    /// Attachments are read here; unreadable ones are left out and reported
    /// in [`RenderedMessage::attachment_outcomes`]. When none of them yields
    /// content the message has the structure of one without attachments.
    #[must_use]
    pub fn finalize(self) -> RenderedMessage {
        let caps = &self.capabilities;

        let (attachment_parts, outcomes) = encode_attachments(
            &self.attachments,
            caps.reader.as_ref(),
            caps.decryptor.as_ref(),
        );

        let body_part = BodyFormatter::new(caps.tokens.as_ref(), caps.html_to_text.as_ref())
            .format(&self.message.body, self.message.is_html, attachment_parts);

        let mut headers = self.assemble_headers();
        headers.extend(&body_part.headers());

        let mut body = Vec::new();
        body_part.write_body(&mut body);

        let mut bytes = Vec::with_capacity(body.len() + 1024);
        headers.write_to(&mut bytes);
        bytes.extend_from_slice(b"\r\n");
        bytes.extend_from_slice(&body);

        let recipients = self.recipients();

        tracing::debug!(
            message_id = %self.message_id,
            size = bytes.len(),
            recipients = recipients.len(),
            attachments = outcomes.iter().filter(|o| o.is_included()).count(),
            "Message rendered"
        );

        RenderedMessage {
            message_id: self.message_id,
            headers,
            body,
            bytes,
            recipients,
            outcomes,
        }
    }
}

/// A finalized message. Its bytes are computed once and never change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    message_id: String,
    headers: Headers,
    body: Vec<u8>,
    bytes: Vec<u8>,
    recipients: Vec<String>,
    outcomes: Vec<AttachmentOutcome>,
}

impl RenderedMessage {
    /// The complete message: header block, blank line, body.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consumes the message, returning its bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// The emitted header set, including the body structure headers.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    /// The body bytes following the header block.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The Message-Id, including angle brackets.
    #[must_use]
    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// Envelope recipients for the transport: To, Cc and Bcc addresses.
    #[must_use]
    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    /// What happened to each attachment, in the order they were added.
    #[must_use]
    pub fn attachment_outcomes(&self) -> &[AttachmentOutcome] {
        &self.outcomes
    }

    /// Attachments that were left out of the message.
    pub fn omitted(&self) -> impl Iterator<Item = &AttachmentOutcome> {
        self.outcomes.iter().filter(|o| !o.is_included())
    }
}
