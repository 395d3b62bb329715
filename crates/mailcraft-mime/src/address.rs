//! Email addresses: syntax validation, recipient extraction and
//! header-safe formatting of address lists.

use crate::collab::AddressValidator;
use crate::encoding::{collapse_spaces, encode_header_value, encoded_word, sanitize_header_text};
use crate::error::{Error, Result};

/// Characters allowed in an unquoted local part besides alphanumerics.
const LOCAL_SPECIALS: &str = "!#$%&'*+-/=?^_`{|}~.";

/// Characters that force a display name into a quoted string.
const PHRASE_SPECIALS: &str = "()<>[]:;@\\,.\"";

/// Validates the syntax of a bare `local@domain` address.
///
/// # Errors
///
/// Returns [`Error::InvalidAddress`] describing the first problem found.
pub fn validate(addr: &str) -> Result<()> {
    if addr.is_empty() {
        return Err(Error::InvalidAddress("Address cannot be empty".into()));
    }

    let (local, domain) = addr
        .split_once('@')
        .ok_or_else(|| Error::InvalidAddress(format!("{addr}: missing @")))?;

    if domain.contains('@') {
        return Err(Error::InvalidAddress(format!(
            "{addr}: must have exactly one @"
        )));
    }

    if local.is_empty() || domain.is_empty() {
        return Err(Error::InvalidAddress(format!(
            "{addr}: local and domain parts cannot be empty"
        )));
    }

    let local_ok = local
        .chars()
        .all(|c| c.is_alphanumeric() || LOCAL_SPECIALS.contains(c))
        && !local.starts_with('.')
        && !local.ends_with('.')
        && !local.contains("..");
    if !local_ok {
        return Err(Error::InvalidAddress(format!("{addr}: invalid local part")));
    }

    let labels: Vec<&str> = domain.split('.').collect();
    let domain_ok = labels.len() >= 2
        && labels.iter().all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_alphanumeric() || c == '-')
        });
    if !domain_ok {
        return Err(Error::InvalidAddress(format!("{addr}: invalid domain")));
    }

    Ok(())
}

/// Extracts the addresses found in a raw header value, in order of
/// appearance and with duplicates kept.
///
/// Display names, angle brackets and separators are tolerated. Tokens that
/// start with a quote are taken to be part of a quoted display name and
/// skipped; everything else containing `@` is unwrapped and kept when the
/// validator accepts it.
#[must_use]
pub fn extract_addresses(value: &str, validator: &dyn AddressValidator) -> Vec<String> {
    value
        .split(|c: char| c.is_whitespace() || c == ',' || c == ';')
        .filter(|token| token.contains('@'))
        .filter(|token| !token.starts_with(['"', '\'']))
        .map(|token| token.trim_matches(|c: char| matches!(c, '<' | '>' | '"' | '\'')))
        .filter(|candidate| validator.is_valid(candidate))
        .map(str::to_string)
        .collect()
}

/// Splits an address list at commas and semicolons that are outside
/// quoted strings and angle brackets. Empty entries are dropped.
#[must_use]
pub fn split_address_list(value: &str) -> Vec<&str> {
    let mut entries = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;
    let mut angle = false;

    for (i, c) in value.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            '<' if !in_quotes => angle = true,
            '>' if !in_quotes => angle = false,
            ',' | ';' if !in_quotes && !angle => {
                entries.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    entries.push(&value[start..]);

    entries
        .into_iter()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .collect()
}

/// Encodes a recipient list for a header.
///
/// Control characters become spaces. ASCII lists then pass through with
/// runs of spaces collapsed. Otherwise each entry is handled on its own: a
/// non-ASCII display name becomes an encoded-word while the address in
/// angle brackets stays readable.
#[must_use]
pub fn encode_address_list(value: &str) -> String {
    let value = sanitize_header_text(value);
    if value.is_ascii() {
        return collapse_spaces(&value);
    }

    split_address_list(&value)
        .into_iter()
        .map(encode_address_entry)
        .collect::<Vec<_>>()
        .join(", ")
}

fn encode_address_entry(entry: &str) -> String {
    if entry.is_ascii() {
        return collapse_spaces(entry);
    }

    match entry.rfind('<') {
        Some(lt) if entry.ends_with('>') => {
            let name = unquote(entry[..lt].trim());
            let addr = &entry[lt..];
            if name.is_empty() {
                addr.to_string()
            } else if name.is_ascii() {
                format!("{} {addr}", quote_phrase(&name))
            } else {
                format!("{} {addr}", encoded_word(&name))
            }
        }
        _ => encode_header_value(entry),
    }
}

/// Formats a mailbox as `Name <address>`, or the bare address when there is
/// no display name.
#[must_use]
pub fn format_mailbox(name: Option<&str>, address: &str) -> String {
    let address = sanitize_header_text(address);
    let name = name.map(sanitize_header_text);
    match name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        None => address,
        Some(name) if name.is_ascii() => format!("{} <{address}>", quote_phrase(name)),
        Some(name) => format!("{} <{address}>", encoded_word(&unquote(name))),
    }
}

/// Quotes an ASCII display name when it contains RFC 5322 specials.
fn quote_phrase(name: &str) -> String {
    if name.starts_with('"') && name.ends_with('"') && name.len() >= 2 {
        return name.to_string();
    }
    if name.contains(|c: char| PHRASE_SPECIALS.contains(c)) {
        format!("\"{}\"", name.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        collapse_spaces(name)
    }
}

/// Removes surrounding quotes and backslash escapes from a display name.
fn unquote(name: &str) -> String {
    let inner = if name.len() >= 2 && name.starts_with('"') && name.ends_with('"') {
        &name[1..name.len() - 1]
    } else {
        return name.to_string();
    };

    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                result.push(next);
            }
        } else {
            result.push(c);
        }
    }
    result
}
