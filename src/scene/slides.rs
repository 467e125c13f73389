/*!
 * Slide extraction from tagged transcripts.
 *
 * The transcription prompt asks for `<slideN>...</slideN>` blocks inside a
 * `<content>` wrapper. This module pulls those blocks out in scan order.
 */

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::app_config::SlideSelection;

/// Non-greedy, dot matches newline
static SLIDE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<slide\d+>(.*?)</slide\d+>").expect("Invalid slide regex")
});

/// Extract every tagged slide segment, verbatim, in the order they appear.
///
/// An empty result means the transcript had no usable slides; callers
/// treat that as fatal for the run.
pub fn extract_slides(transcript: &str) -> Vec<String> {
    let slides: Vec<String> = SLIDE_REGEX
        .captures_iter(transcript)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_string()))
        .collect();

    debug!("Extracted {} slide segment(s)", slides.len());
    slides
}

/// Pick the text that feeds scene generation.
///
/// Returns `None` only when `slides` is empty.
pub fn select_for_scene(slides: &[String], selection: SlideSelection) -> Option<String> {
    match selection {
        SlideSelection::PreferSecond => slides.get(1).or_else(|| slides.first()).cloned(),
        SlideSelection::First => slides.first().cloned(),
        SlideSelection::All => {
            if slides.is_empty() {
                None
            } else {
                Some(
                    slides
                        .iter()
                        .map(|s| s.trim())
                        .collect::<Vec<_>>()
                        .join("\n\n"),
                )
            }
        }
    }
}
