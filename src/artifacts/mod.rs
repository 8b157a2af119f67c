//! Renderable artifacts extracted from assistant output
//!
//! An artifact is a standalone renderable unit (code, markup, vector
//! graphic, diagram, document) pulled out of finalized message text or out
//! of a successful file-writing tool call. Identity is content-addressed so
//! re-deriving artifacts from the same message never duplicates entries.

pub mod extractor;

pub use extractor::{extract_from_text, extract_from_tool_activity};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Kind of renderable artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Markdown,
    Code,
    Html,
    Svg,
    Diagram,
}

impl ArtifactKind {
    /// Stable lowercase label, used for hashing and display
    pub fn label(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Code => "code",
            Self::Html => "html",
            Self::Svg => "svg",
            Self::Diagram => "diagram",
        }
    }

    /// Parse an explicit `type` attribute value
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "markdown" | "md" => Some(Self::Markdown),
            "code" => Some(Self::Code),
            "html" => Some(Self::Html),
            "svg" => Some(Self::Svg),
            "diagram" | "mermaid" => Some(Self::Diagram),
            _ => None,
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A renderable artifact with a content-stable identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: String,
    pub kind: ArtifactKind,
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl Artifact {
    pub fn new(
        kind: ArtifactKind,
        title: impl Into<String>,
        content: impl Into<String>,
        language: Option<String>,
    ) -> Self {
        let title = title.into();
        let content = content.into();
        let id = artifact_id(kind, &title, &content);
        Self {
            id,
            kind,
            title,
            content,
            language,
        }
    }
}

/// Number of leading content characters that participate in the identity hash
const ID_CONTENT_PREFIX_CHARS: usize = 200;

/// Deterministic content-stable artifact id
///
/// SHA-256 over `(kind, title, first 200 chars of content)`, truncated to
/// 128 bits of hex. Independent of extraction order and process, so the same
/// content always yields the same id.
pub fn artifact_id(kind: ArtifactKind, title: &str, content: &str) -> String {
    let prefix: String = content.chars().take(ID_CONTENT_PREFIX_CHARS).collect();

    let mut hasher = Sha256::new();
    hasher.update(kind.label().as_bytes());
    hasher.update([0u8]);
    hasher.update(title.as_bytes());
    hasher.update([0u8]);
    hasher.update(prefix.as_bytes());

    let digest = hasher.finalize();
    digest[..16].iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_artifact_id_is_stable() {
        let a = artifact_id(ArtifactKind::Code, "Example", "fn main() {}");
        let b = artifact_id(ArtifactKind::Code, "Example", "fn main() {}");
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn test_artifact_id_varies_by_kind_and_title() {
        let code = artifact_id(ArtifactKind::Code, "Example", "body");
        let html = artifact_id(ArtifactKind::Html, "Example", "body");
        let renamed = artifact_id(ArtifactKind::Code, "Other", "body");
        assert_ne!(code, html);
        assert_ne!(code, renamed);
    }

    #[test]
    fn test_artifact_id_ignores_content_past_prefix() {
        let common = "x".repeat(200);
        let a = artifact_id(ArtifactKind::Code, "T", &format!("{common}tail-one"));
        let b = artifact_id(ArtifactKind::Code, "T", &format!("{common}tail-two"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_artifact_id_multibyte_prefix_boundary() {
        // Slicing by chars, not bytes, so multibyte content near the
        // boundary must not panic.
        let content = "é".repeat(250);
        let id = artifact_id(ArtifactKind::Markdown, "notes", &content);
        assert_eq!(id.len(), 32);
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!(ArtifactKind::parse("SVG"), Some(ArtifactKind::Svg));
        assert_eq!(ArtifactKind::parse("mermaid"), Some(ArtifactKind::Diagram));
        assert_eq!(ArtifactKind::parse("unknown"), None);
    }

    proptest! {
        #[test]
        fn prop_artifact_id_deterministic(title in ".{0,40}", content in ".{0,400}") {
            let a = artifact_id(ArtifactKind::Markdown, &title, &content);
            let b = artifact_id(ArtifactKind::Markdown, &title, &content);
            prop_assert_eq!(a, b);
        }
    }
}
