/*!
 * # mathcast
 *
 * Turns a recorded hand-written math lecture into a typeset Manim
 * animation.
 *
 * ## Flow
 *
 * 1. A generative-AI service transcribes the visible text of the video
 *    (and optionally the narration) into tagged slides.
 * 2. The service restructures the chosen slide text into a scene record.
 * 3. The record is repaired, validated and normalized, then laid out and
 *    serialized into a Manim script.
 * 4. The script is syntax-checked (with bounded service-assisted repair) and
 *    rendered by Manim in a subprocess.
 *
 * ## Architecture
 *
 * - `scene`: slide extraction, scene data repair, normalization, layout and
 *   script generation
 * - `providers`: generation service clients (Gemini, mock)
 * - `pipeline`: prompts, script review and the run orchestrator
 * - `renderer`: Manim subprocess invocation
 * - `jobs`: background run registry
 * - `server`: upload/poll/download web front end
 * - `app_config`, `errors`, `file_utils`: ambient support
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

pub mod app_config;
pub mod errors;
pub mod file_utils;
pub mod jobs;
pub mod pipeline;
pub mod providers;
pub mod renderer;
pub mod scene;
pub mod server;

// Re-export main types for easier usage
pub use app_config::Config;
pub use errors::{AppError, PipelineError, ProviderError, RepairError};
pub use jobs::{RunHandle, RunRegistry, RunState};
pub use pipeline::{Pipeline, RunStage};
pub use scene::{ManimScript, SceneDescriptor, SceneRecord};
