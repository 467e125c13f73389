/*!
 * Text munging between the service's replies and the renderer's script.
 *
 * - `slides`: tagged transcript to ordered slide segments
 * - `repair`: near-JSON scene data to a validated `SceneRecord`
 * - `normalize`: LaTeX-safe text fields
 * - `layout` and `script`: `SceneDescriptor` and its Manim source
 */

pub mod layout;
pub mod model;
pub mod normalize;
pub mod repair;
pub mod script;
pub mod slides;

pub use layout::{PlacedElement, SceneDescriptor, SceneTiming, TexCommand};
pub use model::{ContentElement, ElementKind, SceneRecord};
pub use normalize::{escape_ampersands, normalize_record, replace_unicode_symbols};
pub use repair::{repair_scene_record, strip_code_fence};
pub use script::ManimScript;
pub use slides::{extract_slides, select_for_scene};
