/*!
 * Scene data model shared by the repair, layout and script stages.
 */

use serde::Serialize;

/// Rendering treatment of a content element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    /// Prose with inline math, typeset as a text block
    Text,
    /// Display math
    Math,
}

impl ElementKind {
    /// Map a model-provided type label onto a kind.
    ///
    /// Only the plain-text spellings map to `Text`; every other label is
    /// treated as math.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "tex" | "text" | "plain-text" | "plain_text" | "plaintext" => Self::Text,
            _ => Self::Math,
        }
    }
}

/// One typed unit of slide content with its narration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentElement {
    /// Label exactly as the service returned it
    #[serde(rename = "type")]
    pub label: String,

    /// Derived from `label`
    #[serde(skip)]
    pub kind: ElementKind,

    /// Lines to typeset
    pub content: Vec<String>,

    /// Narration lines, may be empty
    pub speak: Vec<String>,
}

impl ContentElement {
    pub fn new(label: impl Into<String>, content: Vec<String>, speak: Vec<String>) -> Self {
        let label = label.into();
        Self {
            kind: ElementKind::from_label(&label),
            label,
            content,
            speak,
        }
    }
}

/// Title plus ordered elements, after repair and validation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneRecord {
    pub title: String,
    pub elements: Vec<ContentElement>,
}
