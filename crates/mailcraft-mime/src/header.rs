//! Ordered header set.

use std::borrow::Cow;
use std::fmt;

/// Ordered collection of unique email headers.
///
/// Names are matched case-insensitively; the first spelling used for a name
/// is the one written out. Output order is insertion order, and headers with
/// an empty value are skipped when rendering. A line break inside a value is
/// only written when it folds (`CRLF` followed by a space or tab); any other
/// CR or LF is written as a space.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a header value.
    ///
    /// An existing header keeps its position and gets the new value; a new
    /// header is appended.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .entries
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(&name))
        {
            Some(slot) => slot.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Gets the value for a header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Checks whether a header is present, even with an empty value.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Removes a header, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let index = self
            .entries
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))?;
        Some(self.entries.remove(index).1)
    }

    /// Appends every header of `other`, replacing values already present.
    pub fn extend(&mut self, other: &Self) {
        for (name, value) in other.iter() {
            self.set(name, value);
        }
    }

    /// Returns an iterator over all headers in output order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Returns the number of headers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no headers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writes the header block as `Name: value` CRLF lines, skipping empty
    /// values. No blank separator line is written.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.to_string().as_bytes());
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.entries {
            if value.trim().is_empty() {
                continue;
            }
            write!(f, "{name}: {}\r\n", fold_safe(value))?;
        }
        Ok(())
    }
}

/// Replaces every CR and LF that is not part of a `CRLF WSP` fold.
fn fold_safe(value: &str) -> Cow<'_, str> {
    if !value.contains(['\r', '\n']) {
        return Cow::Borrowed(value);
    }

    let bytes = value.as_bytes();
    let mut result = String::with_capacity(value.len());
    let mut chars = value.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\r' if bytes.get(i + 1) == Some(&b'\n')
                && matches!(bytes.get(i + 2), Some(b' ' | b'\t')) =>
            {
                result.push_str("\r\n");
                chars.next();
            }
            '\r' | '\n' => result.push(' '),
            _ => result.push(c),
        }
    }
    Cow::Owned(result)
}
