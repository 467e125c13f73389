/*!
 * Layout of a scene record as structured data.
 *
 * `SceneDescriptor` carries every decision the script needs (commands,
 * font sizes, spacing, timing) so the serializer in `script` only has to
 * print it.
 */

use log::warn;
use serde::Serialize;

use super::model::{ElementKind, SceneRecord};

pub const DEFAULT_SCENE_NAME: &str = "GeneratedScene";
pub const TITLE_FONT_SIZE: u32 = 50;
pub const ELEMENT_GAP: f64 = 0.5;

/// Renderer class used to typeset an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TexCommand {
    Tex,
    MathTex,
}

impl TexCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tex => "Tex",
            Self::MathTex => "MathTex",
        }
    }
}

impl From<ElementKind> for TexCommand {
    fn from(kind: ElementKind) -> Self {
        match kind {
            ElementKind::Text => Self::Tex,
            ElementKind::Math => Self::MathTex,
        }
    }
}

/// An element with its resolved presentation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedElement {
    /// Position among the elements, title excluded
    pub index: usize,
    pub kind: ElementKind,
    pub command: TexCommand,
    pub lines: Vec<String>,
    pub speak: Vec<String>,
    pub font_size: u32,
    /// Vertical gap to the element above
    pub gap: f64,
}

/// Animation timing in seconds, margins in scene units
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneTiming {
    pub camera_pan: f64,
    pub title_margin: f64,
    pub content_margin: f64,
    pub reveal_pause: f64,
    pub final_pause: f64,
}

impl Default for SceneTiming {
    fn default() -> Self {
        Self {
            camera_pan: 2.0,
            title_margin: 1.0,
            content_margin: 0.5,
            reveal_pause: 1.0,
            final_pause: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneDescriptor {
    pub scene_name: String,
    pub title: String,
    pub title_size: u32,
    pub elements: Vec<PlacedElement>,
    pub timing: SceneTiming,
}

impl SceneDescriptor {
    /// Lay out a record under the default scene class name.
    pub fn build(record: &SceneRecord) -> Self {
        Self::build_named(record, DEFAULT_SCENE_NAME)
    }

    pub fn build_named(record: &SceneRecord, scene_name: &str) -> Self {
        let elements = record
            .elements
            .iter()
            .filter(|element| {
                if element.content.is_empty() {
                    warn!("Dropping '{}' element without content lines", element.label);
                }
                !element.content.is_empty()
            })
            .enumerate()
            .map(|(index, element)| PlacedElement {
                index,
                kind: element.kind,
                command: TexCommand::from(element.kind),
                lines: element.content.clone(),
                speak: element.speak.clone(),
                font_size: font_size_for(element.kind, index),
                gap: ELEMENT_GAP,
            })
            .collect();

        Self {
            scene_name: scene_name.to_string(),
            title: record.title.clone(),
            title_size: TITLE_FONT_SIZE,
            elements,
            timing: SceneTiming::default(),
        }
    }

    /// Total playback length of the reveal pass
    pub fn estimated_duration(&self) -> f64 {
        self.timing.reveal_pause * (self.elements.len() + 1) as f64 + self.timing.final_pause
    }
}

/// Text shrinks after the first two elements; math keeps its size.
pub fn font_size_for(kind: ElementKind, index: usize) -> u32 {
    match kind {
        ElementKind::Text if index < 2 => 40,
        ElementKind::Text => 36,
        ElementKind::Math => 40,
    }
}
