//! # mailcraft-mime
//!
//! MIME message composition for outgoing email.
//!
//! ## Features
//!
//! - **Composition**: Turn a logical message into an RFC 5322 / 2045 / 2046
//!   byte stream ready for a mail transport
//! - **Structure selection**: Single part, `multipart/alternative`,
//!   `multipart/mixed`, or alternative nested inside mixed
//! - **Encoding**: Quoted-Printable bodies, Base64 attachments, RFC 2047
//!   encoded-words for non-ASCII headers
//! - **Envelope recipients**: To, Cc and Bcc addresses for the transport,
//!   while Bcc never appears in the headers
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailcraft_mime::{Attachment, Composer, Message};
//!
//! let message = Message {
//!     to: "Ann <ann@example.com>".into(),
//!     bcc: "audit@example.com".into(),
//!     from: "bob@example.com".into(),
//!     subject: "Quarterly report".into(),
//!     body: "<p>See attached.</p>".into(),
//!     is_html: true,
//!     ..Message::default()
//! };
//!
//! let rendered = Composer::new(message)
//!     .attach(Attachment::new("/tmp/q3.pdf", "q3.pdf", "application/pdf"))
//!     .finalize();
//!
//! transport.send(rendered.recipients(), rendered.as_bytes())?;
//! ```
//!
//! ### Deterministic output
//!
//! Boundaries and Message-Ids come from a [`TokenSource`]. Tests and
//! reproducible pipelines can swap in [`SequentialTokens`]:
//!
//! ```ignore
//! use std::sync::Arc;
//! use mailcraft_mime::{Capabilities, Composer, SequentialTokens};
//!
//! let caps = Capabilities {
//!     tokens: Arc::new(SequentialTokens::new("t")),
//!     ..Capabilities::default()
//! };
//! let rendered = Composer::with_capabilities(message, caps).finalize();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod attachment;
mod body;
mod composer;
mod config;
mod content_type;
mod error;
mod header;
mod part;

pub mod address;
pub mod collab;
pub mod encoding;

pub use address::extract_addresses;
pub use attachment::{Attachment, AttachmentOutcome, OmitReason};
pub use body::{BodyFormatter, normalize_text};
pub use collab::{
    AddressValidator, AttachmentReader, Decryptor, FsReader, HtmlToText, MarkdownText,
    Passthrough, RandomTokens, SequentialTokens, SyntaxValidator, TokenSource,
};
pub use composer::{AUTO_BCC_HEADER, Capabilities, Composer, Message, RenderedMessage};
pub use config::{ComposerConfig, CustomHeader};
pub use content_type::ContentType;
pub use error::{Error, Result};
pub use header::Headers;
pub use part::{Leaf, MultipartKind, Part, TransferEncoding};
