//! MIME encoding and decoding utilities.
//!
//! Supports Base64, Quoted-Printable, and RFC 2047 header encoding.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt::Write as _;

/// Maximum encoded line length for Base64 and Quoted-Printable bodies.
pub const MAX_LINE_LENGTH: usize = 76;

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Encodes data as Base64 wrapped into CRLF-separated lines of
/// [`MAX_LINE_LENGTH`] characters.
#[must_use]
pub fn encode_base64_lines(data: &[u8]) -> String {
    let encoded = encode_base64(data);
    let mut result = String::with_capacity(encoded.len() + encoded.len() / MAX_LINE_LENGTH * 2);

    // Base64 output is pure ASCII, so byte chunks are valid str slices.
    for (i, chunk) in encoded.as_bytes().chunks(MAX_LINE_LENGTH).enumerate() {
        if i > 0 {
            result.push_str("\r\n");
        }
        result.push_str(std::str::from_utf8(chunk).unwrap_or_default());
    }

    result
}

/// Decodes Base64 data, ignoring embedded line breaks.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    let cleaned: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD.decode(cleaned).map_err(Into::into)
}

/// Encodes text using Quoted-Printable encoding (RFC 2045).
///
/// `\r\n` and bare `\n` are hard line breaks and come out as CRLF. Every
/// output line stays within [`MAX_LINE_LENGTH`] characters, counting the
/// `=` of a soft line break, and whitespace at the end of a line is escaped.
#[must_use]
pub fn encode_quoted_printable(data: &[u8]) -> String {
    let mut result = String::with_capacity(data.len() + data.len() / 8);
    let mut lines = data.split(|b| *b == b'\n').peekable();

    while let Some(line) = lines.next() {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        encode_qp_line(line, &mut result);
        if lines.peek().is_some() {
            result.push_str("\r\n");
        }
    }

    result
}

fn encode_qp_line(line: &[u8], result: &mut String) {
    let mut line_length = 0;

    for (i, &byte) in line.iter().enumerate() {
        let last = i + 1 == line.len();
        let literal = match byte {
            b'!'..=b'<' | b'>'..=b'~' => true,
            b' ' | b'\t' => !last,
            _ => false,
        };
        let width = if literal { 1 } else { 3 };

        // The final token may use the column otherwise kept for the soft break.
        let limit = if last {
            MAX_LINE_LENGTH
        } else {
            MAX_LINE_LENGTH - 1
        };
        if line_length + width > limit {
            result.push_str("=\r\n");
            line_length = 0;
        }

        if literal {
            result.push(byte as char);
        } else {
            let _ = write!(result, "={byte:02X}");
        }
        line_length += width;
    }
}

/// Decodes Quoted-Printable text (RFC 2045).
///
/// # Errors
///
/// Returns an error if the input contains invalid escape sequences.
pub fn decode_quoted_printable(text: &str) -> Result<Vec<u8>> {
    let bytes = text.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'=' {
            result.push(bytes[i]);
            i += 1;
            continue;
        }

        // Soft line break
        if bytes[i + 1..].starts_with(b"\r\n") {
            i += 3;
            continue;
        }
        if bytes.get(i + 1) == Some(&b'\n') {
            i += 2;
            continue;
        }

        // Hex encoded byte
        let hex = bytes
            .get(i + 1..i + 3)
            .ok_or_else(|| Error::InvalidEncoding("Incomplete escape sequence".to_string()))?;
        let hex = std::str::from_utf8(hex)
            .map_err(|e| Error::InvalidEncoding(format!("Invalid hex: {e}")))?;
        let byte = u8::from_str_radix(hex, 16)
            .map_err(|e| Error::InvalidEncoding(format!("Invalid hex: {e}")))?;
        result.push(byte);
        i += 3;
    }

    Ok(result)
}

/// Collapses every run of two or more spaces into a single space.
#[must_use]
pub fn collapse_spaces(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut previous_space = false;

    for ch in value.chars() {
        if ch == ' ' {
            if !previous_space {
                result.push(ch);
            }
            previous_space = true;
        } else {
            result.push(ch);
            previous_space = false;
        }
    }

    result
}

/// Longest encoded-word allowed by RFC 2047.
const MAX_ENCODED_WORD_LENGTH: usize = 75;

/// `=?UTF-8?B?` plus `?=`.
const ENCODED_WORD_OVERHEAD: usize = 12;

/// Replaces CR, LF and the other ASCII control characters except tab with
/// a space, so a value can never end a header line early.
#[must_use]
pub fn sanitize_header_text(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_ascii_control() && c != '\t' { ' ' } else { c })
        .collect()
}

/// Encodes a header value for transport over a 7-bit channel.
///
/// Control characters become spaces first. Pure ASCII values are then
/// returned with runs of spaces collapsed. Anything else becomes
/// `=?UTF-8?B?...?=` encoded-words; when the value is a quoted string the
/// quotes stay outside the encoded-words.
#[must_use]
pub fn encode_header_value(value: &str) -> String {
    let value = sanitize_header_text(value);
    if value.is_ascii() {
        return collapse_spaces(&value);
    }

    let quoted = value.len() >= 2 && value.starts_with('"') && value.ends_with('"');
    if quoted {
        let inner = &value[1..value.len() - 1];
        format!("\"{}\"", encoded_word(inner))
    } else {
        encoded_word(&value)
    }
}

/// Wraps text as UTF-8 Base64 encoded-words.
///
/// Text that does not fit in one 75-character word is split at character
/// boundaries into several words separated by a folding `CRLF SP`.
#[must_use]
pub fn encoded_word(text: &str) -> String {
    // Whole base64 quanta only: 4 output chars per 3 input bytes.
    let max_bytes = (MAX_ENCODED_WORD_LENGTH - ENCODED_WORD_OVERHEAD) / 4 * 3;

    let mut words = Vec::new();
    let mut start = 0;
    for (i, c) in text.char_indices() {
        if i + c.len_utf8() - start > max_bytes {
            words.push(&text[start..i]);
            start = i;
        }
    }
    words.push(&text[start..]);

    words
        .into_iter()
        .map(|chunk| format!("=?UTF-8?B?{}?=", encode_base64(chunk.as_bytes())))
        .collect::<Vec<_>>()
        .join("\r\n ")
}

/// Decodes a header value made of RFC 2047 encoded-words.
///
/// Format: `=?charset?encoding?encoded-text?=`. Whitespace between adjacent
/// encoded-words, folding included, is dropped; other words are kept as
/// they are. Values without encoded-words are returned unchanged.
///
/// # Errors
///
/// Returns an error if an encoded-word is malformed.
pub fn decode_rfc2047(text: &str) -> Result<String> {
    if !text.contains("=?") {
        return Ok(text.to_string());
    }

    let mut result = String::with_capacity(text.len());
    let mut previous_encoded = false;

    for (i, word) in text.split_whitespace().enumerate() {
        let encoded = word.starts_with("=?") && word.ends_with("?=") && word.len() >= 4;
        if i > 0 && !(encoded && previous_encoded) {
            result.push(' ');
        }
        if encoded {
            result.push_str(&decode_encoded_word(word)?);
        } else {
            result.push_str(word);
        }
        previous_encoded = encoded;
    }

    Ok(result)
}

fn decode_encoded_word(word: &str) -> Result<String> {
    let inner = &word[2..word.len() - 2];
    let parts: Vec<&str> = inner.split('?').collect();

    if parts.len() != 3 {
        return Err(Error::InvalidEncoding(
            "Invalid RFC 2047 format".to_string(),
        ));
    }

    let encoding = parts[1].to_uppercase();
    let encoded_text = parts[2];

    let decoded = match encoding.as_str() {
        "B" => decode_base64(encoded_text)?,
        "Q" => decode_quoted_printable(&encoded_text.replace('_', " "))?,
        _ => {
            return Err(Error::InvalidEncoding(format!(
                "Unknown encoding: {encoding}"
            )));
        }
    };

    String::from_utf8(decoded).map_err(Into::into)
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::needless_collect,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_base64_encode_decode() {
        let data = b"Hello, World!";
        let encoded = encode_base64(data);
        assert_eq!(encoded, "SGVsbG8sIFdvcmxkIQ==");

        let decoded = decode_base64(&encoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_base64_lines_wrap_at_76() {
        let data = vec![0xABu8; 300];
        let encoded = encode_base64_lines(&data);
        let lines: Vec<&str> = encoded.split("\r\n").collect();
        assert_eq!(lines.len(), 6);
        assert!(lines[..5].iter().all(|l| l.len() == 76));
        assert_eq!(decode_base64(&encoded).unwrap(), data);
    }

    #[test]
    fn test_quoted_printable_plain_ascii() {
        assert_eq!(encode_quoted_printable(b"Hello, World!"), "Hello, World!");
    }

    #[test]
    fn test_quoted_printable_non_ascii() {
        let encoded = encode_quoted_printable("Héllo".as_bytes());
        assert_eq!(encoded, "H=C3=A9llo");
    }

    #[test]
    fn test_quoted_printable_equals_sign() {
        assert_eq!(encode_quoted_printable(b"a=b"), "a=3Db");
    }

    #[test]
    fn test_quoted_printable_keeps_hard_breaks() {
        assert_eq!(encode_quoted_printable(b"one\r\ntwo\nthree"), "one\r\ntwo\r\nthree");
    }

    #[test]
    fn test_quoted_printable_trailing_whitespace() {
        assert_eq!(encode_quoted_printable(b"end \r\nnext\t"), "end=20\r\nnext=09");
    }

    #[test]
    fn test_quoted_printable_soft_breaks() {
        let text = "x".repeat(200);
        let encoded = encode_quoted_printable(text.as_bytes());
        for line in encoded.split("\r\n") {
            assert!(line.len() <= MAX_LINE_LENGTH, "line too long: {line}");
        }
        assert_eq!(decode_quoted_printable(&encoded).unwrap(), text.as_bytes());
    }

    #[test]
    fn test_quoted_printable_escape_not_split() {
        let text = format!("{}é", "x".repeat(74));
        let encoded = encode_quoted_printable(text.as_bytes());
        assert_eq!(encoded, format!("{}=\r\n=C3=A9", "x".repeat(74)));
    }

    #[test]
    fn test_quoted_printable_decode() {
        assert_eq!(decode_quoted_printable("H=C3=A9llo").unwrap(), "Héllo".as_bytes());
        assert_eq!(decode_quoted_printable("Hello=\r\nWorld").unwrap(), b"HelloWorld");
        assert!(decode_quoted_printable("bad=4").is_err());
    }

    #[test]
    fn test_collapse_spaces() {
        assert_eq!(collapse_spaces("a  b   c d"), "a b c d");
        assert_eq!(collapse_spaces("  lead"), " lead");
    }

    #[test]
    fn test_header_value_ascii_passthrough() {
        assert_eq!(encode_header_value("Weekly  report"), "Weekly report");
        assert_eq!(encode_header_value("Re: hi"), "Re: hi");
    }

    #[test]
    fn test_header_value_non_ascii() {
        assert_eq!(encode_header_value("Héllo"), "=?UTF-8?B?SMOpbGxv?=");
    }

    #[test]
    fn test_header_value_keeps_quotes_outside() {
        assert_eq!(encode_header_value("\"Héllo\""), "\"=?UTF-8?B?SMOpbGxv?=\"");
    }

    #[test]
    fn test_header_value_line_breaks_become_spaces() {
        assert_eq!(
            encode_header_value("Hi\r\nBcc: leak@evil.com"),
            "Hi Bcc: leak@evil.com"
        );
        assert_eq!(encode_header_value("a\nb\rc\0d\te"), "a b c d\te");

        let encoded = encode_header_value("Grüße\r\nBcc: x@evil.com");
        assert!(!encoded.contains('\n'));
        assert_eq!(decode_rfc2047(&encoded).unwrap(), "Grüße  Bcc: x@evil.com");
    }

    #[test]
    fn test_long_value_is_split_into_folded_words() {
        let subject = "é".repeat(400);
        let encoded = encode_header_value(&subject);

        let words: Vec<&str> = encoded.split("\r\n ").collect();
        assert!(words.len() > 1);
        for word in &words {
            assert!(word.len() <= 75, "word too long: {word}");
            assert!(word.starts_with("=?UTF-8?B?") && word.ends_with("?="));
        }
        assert_eq!(decode_rfc2047(&encoded).unwrap(), subject);
    }

    #[test]
    fn test_rfc2047_decode_mixed_words() {
        assert_eq!(
            decode_rfc2047("=?UTF-8?B?SMOp?= =?UTF-8?B?bGxv?= <a@x.com>").unwrap(),
            "Héllo <a@x.com>"
        );
    }

    #[test]
    fn test_rfc2047_decode() {
        assert_eq!(decode_rfc2047("Hello").unwrap(), "Hello");
        assert_eq!(decode_rfc2047("=?utf-8?B?SMOpbGxv?=").unwrap(), "Héllo");
        assert_eq!(decode_rfc2047("=?utf-8?Q?H=C3=A9llo?=").unwrap(), "Héllo");
    }

    proptest! {
        #[test]
        fn prop_ascii_header_only_collapses_spaces(value in "[ -~]{0,80}") {
            prop_assert_eq!(encode_header_value(&value), collapse_spaces(&value));
        }

        #[test]
        fn prop_non_ascii_header_round_trips(prefix in "[a-z ]{0,10}", value in "\\PC{0,20}") {
            let value = format!("{prefix}ü{value}");
            let encoded = encode_header_value(&value);
            prop_assert!(encoded.starts_with("=?UTF-8?B?"));
            prop_assert!(encoded.ends_with("?="));
            prop_assert!(encoded.split("\r\n ").all(|word| word.len() <= 75));
            prop_assert_eq!(decode_rfc2047(&encoded).unwrap(), value);
        }

        #[test]
        fn prop_quoted_printable_round_trips(text in "[\\PC\r\n\t ]{0,300}") {
            let encoded = encode_quoted_printable(text.as_bytes());
            prop_assert!(encoded.is_ascii());
            for line in encoded.split("\r\n") {
                prop_assert!(line.len() <= MAX_LINE_LENGTH);
                prop_assert!(!line.ends_with(' ') && !line.ends_with('\t'));
            }
            let expected = text.replace("\r\n", "\n").replace('\n', "\r\n");
            prop_assert_eq!(decode_quoted_printable(&encoded).unwrap(), expected.into_bytes());
        }
    }
}
