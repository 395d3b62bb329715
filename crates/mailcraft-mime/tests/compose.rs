//! End-to-end composition tests.
//!
//! Messages are rendered with deterministic tokens and real attachment
//! files in a temporary directory, then taken apart again with a small
//! splitter that only understands the structures the composer emits.

#![allow(clippy::unwrap_used)]

use std::path::PathBuf;
use std::sync::Arc;

use chrono::DateTime;
use mailcraft_mime::encoding::{decode_base64, decode_quoted_printable, decode_rfc2047};
use mailcraft_mime::{
    Attachment, Capabilities, Composer, HtmlToText, Message, OmitReason, RenderedMessage,
    SequentialTokens,
};
use proptest::prelude::*;

/// Strips tags; enough to check which text ends up in the plain part.
struct StripTags;

impl HtmlToText for StripTags {
    fn convert(&self, html: &str) -> String {
        let mut text = String::new();
        let mut in_tag = false;
        for c in html.chars() {
            match c {
                '<' => in_tag = true,
                '>' => in_tag = false,
                _ if !in_tag => text.push(c),
                _ => {}
            }
        }
        text
    }
}

fn capabilities() -> Capabilities {
    Capabilities {
        tokens: Arc::new(SequentialTokens::new("t")),
        html_to_text: Arc::new(StripTags),
        hostname: "test.local".into(),
        ..Capabilities::default()
    }
}

fn composer(message: Message) -> Composer {
    Composer::with_capabilities(message, capabilities())
        .date(DateTime::parse_from_rfc2822("Mon, 2 Mar 2026 09:30:00 +0000").unwrap())
}

fn base_message() -> Message {
    Message {
        to: "a@x.com".into(),
        from: "b@x.com".into(),
        subject: "Héllo".into(),
        body: "Line1\nLine2".into(),
        ..Message::default()
    }
}

fn html_message() -> Message {
    Message {
        body: "<p>Hello <b>world</b></p>".into(),
        is_html: true,
        ..base_message()
    }
}

/// Splits `headers\r\n\r\nbody`.
fn split_entity(entity: &str) -> (&str, &str) {
    entity.split_once("\r\n\r\n").unwrap()
}

fn header<'a>(headers: &'a str, name: &str) -> Option<&'a str> {
    headers.split("\r\n").find_map(|line| {
        let (n, v) = line.split_once(": ")?;
        n.eq_ignore_ascii_case(name).then_some(v)
    })
}

fn boundary(content_type: &str) -> String {
    let start = content_type.find("boundary=\"").unwrap() + "boundary=\"".len();
    let end = content_type[start..].find('"').unwrap() + start;
    content_type[start..end].to_string()
}

/// Returns the parts of a multipart body and checks the closing delimiter
/// appears exactly once, at the end.
fn parts<'a>(body: &'a str, boundary: &str) -> Vec<&'a str> {
    let delimiter = format!("--{boundary}\r\n");
    let closing = format!("--{boundary}--\r\n");
    assert_eq!(body.matches(&closing).count(), 1, "closing delimiter count");
    assert!(body.ends_with(&closing));

    let inner = &body[..body.len() - closing.len()];
    inner
        .split(&delimiter)
        .skip(1)
        .map(|p| p.strip_suffix("\r\n").unwrap())
        .collect()
}

fn text(rendered: &RenderedMessage) -> String {
    String::from_utf8(rendered.as_bytes().to_vec()).unwrap()
}

fn temp_file(dir: &tempfile::TempDir, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn plain_message_is_single_part_quoted_printable() {
    let rendered = composer(base_message()).finalize();
    let message = text(&rendered);
    let (headers, body) = split_entity(&message);

    assert_eq!(headers.matches("Content-Type:").count(), 1);
    assert_eq!(
        header(headers, "Content-Type"),
        Some("text/plain; charset=UTF-8; format=flowed")
    );
    assert_eq!(
        header(headers, "Content-Transfer-Encoding"),
        Some("quoted-printable")
    );
    assert_eq!(decode_quoted_printable(body).unwrap(), b"Line1\r\nLine2\r\n");

    let subject = header(headers, "Subject").unwrap();
    assert_eq!(subject, "=?UTF-8?B?SMOpbGxv?=");
    assert_eq!(decode_rfc2047(subject).unwrap(), "Héllo");
}

#[test]
fn html_message_is_alternative_with_two_parts() {
    let rendered = composer(html_message()).finalize();
    let message = text(&rendered);
    let (headers, body) = split_entity(&message);

    let content_type = header(headers, "Content-Type").unwrap();
    assert!(content_type.starts_with("multipart/alternative;"));
    assert!(header(headers, "Content-Transfer-Encoding").is_none());

    let parts = parts(body, &boundary(content_type));
    assert_eq!(parts.len(), 2);

    let (plain_headers, plain_body) = split_entity(parts[0]);
    assert!(header(plain_headers, "Content-Type").unwrap().starts_with("text/plain"));
    assert_eq!(
        header(plain_headers, "Content-Transfer-Encoding"),
        Some("quoted-printable")
    );
    assert_eq!(decode_quoted_printable(plain_body).unwrap(), b"Hello world\r\n");

    let (html_headers, html_body) = split_entity(parts[1]);
    assert_eq!(
        header(html_headers, "Content-Type"),
        Some("text/html; charset=UTF-8")
    );
    assert_eq!(
        header(html_headers, "Content-Transfer-Encoding"),
        Some("quoted-printable")
    );
    assert_eq!(
        decode_quoted_printable(html_body).unwrap(),
        b"<p>Hello <b>world</b></p>"
    );
}

#[test]
fn html_with_attachments_nests_alternative_and_drops_unreadable() {
    let dir = tempfile::tempdir().unwrap();
    let good = temp_file(&dir, "notes.txt", b"some notes");

    let rendered = composer(html_message())
        .attach(Attachment::new(
            dir.path().join("gone.txt"),
            "gone.txt",
            "text/plain",
        ))
        .attach(Attachment::new(&good, "notes.txt", "text/plain"))
        .finalize();

    let message = text(&rendered);
    let (headers, body) = split_entity(&message);
    let content_type = header(headers, "Content-Type").unwrap();
    assert!(content_type.starts_with("multipart/mixed;"));

    let outer = parts(body, &boundary(content_type));
    assert_eq!(outer.len(), 2);

    let (alt_headers, alt_body) = split_entity(outer[0]);
    let alt_type = header(alt_headers, "Content-Type").unwrap();
    assert!(alt_type.starts_with("multipart/alternative;"));
    assert_eq!(parts(alt_body, &boundary(alt_type)).len(), 2);

    let (att_headers, att_body) = split_entity(outer[1]);
    assert_eq!(
        header(att_headers, "Content-Type"),
        Some("text/plain; name=\"notes.txt\"")
    );
    assert_eq!(header(att_headers, "Content-Description"), Some("notes.txt"));
    assert_eq!(
        header(att_headers, "Content-Disposition"),
        Some("attachment; filename=\"notes.txt\"")
    );
    assert_eq!(decode_base64(att_body).unwrap(), b"some notes");
    assert!(!message.contains("gone.txt"));

    let omitted: Vec<_> = rendered.omitted().collect();
    assert_eq!(omitted.len(), 1);
    assert!(matches!(
        omitted[0],
        mailcraft_mime::AttachmentOutcome::Omitted {
            reason: OmitReason::Unreadable(_),
            ..
        }
    ));
}

#[test]
fn plain_with_attachment_is_mixed() {
    let dir = tempfile::tempdir().unwrap();
    let raw = temp_file(&dir, "data.csv", b"a,b\r\n1,2\r\n");

    let rendered = composer(base_message())
        .attach(Attachment::new(&raw, "data.csv", "text/csv").without_encoding())
        .finalize();

    let message = text(&rendered);
    let (headers, body) = split_entity(&message);
    let content_type = header(headers, "Content-Type").unwrap();
    assert!(content_type.starts_with("multipart/mixed;"));

    let parts = parts(body, &boundary(content_type));
    assert_eq!(parts.len(), 2);
    let (text_headers, text_body) = split_entity(parts[0]);
    assert_eq!(
        header(text_headers, "Content-Type"),
        Some("text/plain; charset=UTF-8; format=flowed")
    );
    assert_eq!(decode_quoted_printable(text_body).unwrap(), b"Line1\r\nLine2\r\n");

    let (att_headers, att_body) = split_entity(parts[1]);
    assert_eq!(header(att_headers, "Content-Transfer-Encoding"), Some("7bit"));
    assert_eq!(att_body, "a,b\r\n1,2\r\n");
}

#[test]
fn only_unreadable_attachments_degrade_to_plain_structure() {
    let dir = tempfile::tempdir().unwrap();
    let rendered = composer(base_message())
        .attach(Attachment::new(dir.path().join("nope"), "nope", "text/plain"))
        .finalize();

    let message = text(&rendered);
    let (headers, body) = split_entity(&message);
    assert_eq!(
        header(headers, "Content-Type"),
        Some("text/plain; charset=UTF-8; format=flowed")
    );
    assert!(!body.contains("--=_"));
    assert_eq!(rendered.omitted().count(), 1);
}

#[test]
fn bcc_is_hidden_but_delivered() {
    let composer = composer(Message {
        cc: "Carol <carol@x.com>".into(),
        bcc: "Secret Sam <sam@hidden.org>".into(),
        ..base_message()
    });
    assert_eq!(
        composer.recipients(),
        ["a@x.com", "carol@x.com", "sam@hidden.org"]
    );

    let rendered = composer.finalize();
    let message = text(&rendered);
    let (headers, _) = split_entity(&message);

    for line in headers.split("\r\n") {
        assert!(!line.to_ascii_lowercase().starts_with("bcc"), "{line}");
        assert!(!line.contains("sam@hidden.org"), "{line}");
        assert!(!line.contains("Secret Sam"), "{line}");
    }
    assert_eq!(
        rendered.recipients(),
        ["a@x.com", "carol@x.com", "sam@hidden.org"]
    );
}

#[test]
fn control_characters_never_create_header_lines() {
    let dir = tempfile::tempdir().unwrap();
    let file = temp_file(&dir, "a.txt", b"attached");

    let rendered = composer(Message {
        to: "a@x.com\r\nBcc: to@evil.com".into(),
        cc: "Zoë <z@x.com>\nBcc: cc@evil.com".into(),
        bcc: "hidden@x.com".into(),
        from_name: Some("Bob\r\nBcc: from@evil.com".into()),
        reply_to: Some("r@x.com\rBcc: reply@evil.com".into()),
        subject: "Hi\r\nBcc: subject@evil.com\r\n\r\nbody".into(),
        in_reply_to_id: Some("<id@x.com>\nBcc: irt@evil.com".into()),
        ..html_message()
    })
    .header("X-Note", "ok\r\nBcc: custom@evil.com")
    .attach(Attachment::new(
        &file,
        "a.txt\r\nBcc: name@evil.com",
        "text/plain\r\nBcc: type@evil.com",
    ))
    .finalize();

    let message = text(&rendered);
    assert!(message.is_ascii());
    let (headers, body) = split_entity(&message);

    let names: Vec<&str> = headers
        .split("\r\n")
        .map(|line| line.split_once(": ").unwrap().0)
        .collect();
    assert_eq!(
        names,
        [
            "Date",
            "From",
            "Reply-To",
            "To",
            "Cc",
            "Subject",
            "Message-Id",
            "In-Reply-To",
            "References",
            "MIME-Version",
            "X-Note",
            "Content-Type",
        ]
    );
    assert!(!headers.contains("hidden@x.com"));

    // Part headers of the attachment: nothing beyond the four the composer writes.
    let content_type = header(headers, "Content-Type").unwrap();
    let outer = parts(body, &boundary(content_type));
    let (att_headers, att_body) = split_entity(outer[1]);
    let att_names: Vec<&str> = att_headers
        .split("\r\n")
        .map(|line| line.split_once(": ").unwrap().0)
        .collect();
    assert_eq!(
        att_names,
        [
            "Content-Type",
            "Content-Transfer-Encoding",
            "Content-Description",
            "Content-Disposition",
        ]
    );
    assert_eq!(decode_base64(att_body).unwrap(), b"attached");
}

#[test]
fn rendering_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let file = temp_file(&dir, "a.bin", &[1, 2, 3, 250]);
    let build = || composer(html_message()).attach(Attachment::new(&file, "a.bin", "image/png"));

    // Same fields and the same token sequence give the same bytes.
    let first = build().finalize();
    let second = build().finalize();
    assert_eq!(first.as_bytes(), second.as_bytes());
    assert_eq!(first, second);

    // The frozen value hands out the same bytes every time.
    let bytes = first.as_bytes().to_vec();
    assert_eq!(first.as_bytes(), bytes.as_slice());
    assert_eq!(first.clone().into_bytes(), bytes);
}

#[test]
fn message_id_and_date_are_fixed_at_construction() {
    let composer = Composer::with_capabilities(base_message(), capabilities());
    let id = composer.message_id().to_string();
    assert_eq!(id, "<t1@test.local>");

    let first = composer.clone().finalize();
    let second = composer.finalize();
    assert_eq!(first.headers().get("Date"), second.headers().get("Date"));
    assert_eq!(first.headers().get("Message-Id"), Some(id.as_str()));
}

#[test]
fn output_is_seven_bit_clean() {
    let dir = tempfile::tempdir().unwrap();
    let file = temp_file(&dir, "bin", &(0u8..=255).collect::<Vec<_>>());

    let rendered = composer(Message {
        to: "Zoë <zoe@x.com>".into(),
        from_name: Some("Björn".into()),
        subject: "Ünïcödé   subject".into(),
        body: "<p>日本語 &amp; émoji 🎉</p>".into(),
        is_html: true,
        ..base_message()
    })
    .attach(Attachment::new(&file, "bïn.dat", "application/octet-stream"))
    .finalize();

    assert!(rendered.as_bytes().is_ascii());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn boundary_never_occurs_in_parts(
        body in "[a-z\\-=_\r\n ]{0,200}",
        raw in proptest::collection::vec(any::<u8>(), 1..200),
        echo_boundary in any::<bool>(),
    ) {
        let dir = tempfile::tempdir().unwrap();
        // Plant the delimiters the sequential token source will hand out.
        let mut content = raw;
        if echo_boundary {
            content.extend_from_slice(b"\r\n--=_t2\r\n--=_t3--\r\n");
        }
        let file = temp_file(&dir, "raw.bin", &content);

        let rendered = composer(Message {
            body: format!("{body}\n--=_t2\n--=_t3"),
            is_html: true,
            ..base_message()
        })
        .attach(Attachment::new(&file, "raw.bin", "application/octet-stream").without_encoding())
        .finalize();

        let message = String::from_utf8_lossy(rendered.as_bytes()).into_owned();
        let (headers, body) = message.split_once("\r\n\r\n").unwrap();
        let outer = boundary(header(headers, "Content-Type").unwrap());

        let delimiter = format!("--{outer}");
        for part in body.split(&format!("{delimiter}\r\n")).skip(1) {
            let part = part.strip_suffix(&format!("{delimiter}--\r\n")).unwrap_or(part);
            prop_assert!(!part.contains(&delimiter));
        }
    }
}
