//! Message drafts read from JSON.

use anyhow::{Context, Result};
use mailcraft_mime::{Attachment, Capabilities, Composer, ComposerConfig, Message};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;

/// A message and its attachments, as supplied on the command line.
///
/// ```json
/// {
///   "to": "Ann <ann@example.com>",
///   "from": "bob@example.com",
///   "subject": "Report",
///   "body": "See attached.",
///   "attachments": [
///     { "filename": "/tmp/r.pdf", "name": "r.pdf", "type": "application/pdf" }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Draft {
    /// Message fields.
    #[serde(flatten)]
    pub message: Message,
    /// Files to attach.
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl Draft {
    /// Reads a draft from `path`, or from stdin when `path` is `None` or `-`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let contents = match path.filter(|p| p.as_os_str() != "-") {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("reading draft {}", path.display()))?,
            None => {
                let mut buf = String::new();
                std::io::stdin()
                    .read_to_string(&mut buf)
                    .context("reading draft from stdin")?;
                buf
            }
        };
        Self::parse(&contents)
    }

    /// Parses a draft from JSON text.
    pub fn parse(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("parsing draft JSON")
    }

    /// Builds a composer for this draft with the configured settings.
    pub fn into_composer(self, config: &ComposerConfig, capabilities: Capabilities) -> Composer {
        let composer = self
            .attachments
            .into_iter()
            .fold(Composer::with_capabilities(self.message, capabilities), Composer::attach);
        config.apply(composer)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_draft() {
        let draft = Draft::parse(
            r#"{
                "to": "a@x.com",
                "from": "b@x.com",
                "subject": "Hi",
                "body": "Hello",
                "attachments": [
                    {"filename": "/tmp/a.txt", "name": "a.txt", "type": "text/plain"}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(draft.message.to, "a@x.com");
        assert!(!draft.message.is_html);
        assert_eq!(draft.attachments.len(), 1);
        assert_eq!(draft.attachments[0].name, "a.txt");
    }

    #[test]
    fn test_parse_draft_without_attachments() {
        let draft = Draft::parse(r#"{"to": "a@x.com", "from": "b@x.com"}"#).unwrap();
        assert!(draft.attachments.is_empty());
    }

    #[test]
    fn test_parse_invalid_draft() {
        let err = Draft::parse("[1, 2]").unwrap_err();
        assert!(err.to_string().contains("parsing draft JSON"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("draft.json");
        std::fs::write(&path, r#"{"to": "a@x.com", "from": "b@x.com"}"#).unwrap();

        let draft = Draft::load(Some(&path)).unwrap();
        assert_eq!(draft.message.from, "b@x.com");

        let missing = Draft::load(Some(&dir.path().join("none.json"))).unwrap_err();
        assert!(missing.to_string().contains("reading draft"));
    }

    #[test]
    fn test_into_composer_applies_config() {
        let draft = Draft::parse(r#"{"to": "a@x.com", "from": "b@x.com"}"#).unwrap();
        let config = ComposerConfig {
            auto_bcc: Some("copy@x.com".into()),
            ..ComposerConfig::default()
        };

        let composer = draft.into_composer(&config, config.capabilities());
        assert_eq!(composer.recipients(), ["a@x.com", "copy@x.com"]);
    }
}
