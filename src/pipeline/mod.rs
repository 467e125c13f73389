/*!
 * Video-to-animation pipeline.
 *
 * - `prompts`: instructions sent with each service call
 * - `review`: syntax repair loop and LaTeX review over generated scripts
 * - `orchestrator`: the run state machine tying every stage together
 */

pub mod orchestrator;
pub mod prompts;
pub mod review;

pub use orchestrator::{Pipeline, RunStage, compose_script, script_file_name};
pub use review::{PythonSyntaxChecker, SyntaxChecker, SyntaxVerdict, ensure_valid_syntax, review_latex};
