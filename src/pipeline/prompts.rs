/*!
 * Prompt templates sent with each service call.
 *
 * The scene prompt's example deliberately keeps the loose notation the
 * service tends to echo back (unquoted keys, raw strings); the repair
 * stage is built to accept it.
 */

/// Prompt templates with `{placeholder}` substitution
pub struct PromptTemplate;

impl PromptTemplate {
    /// Visible-text transcription of the uploaded video.
    pub const SLIDE_TRANSCRIPTION: &'static str = r#"This is a video of a teacher explaining mathematical concepts on sheets of paper.
Your task is to extract and transcribe the exact content written on each sheet.
Guidelines:
- Use LaTeX for mathematical symbols.
- Do not add any extra explanation.
- Provide the output in the following XML-like format:
<content>
    <slide1>Extracted content from Slide 1</slide1>
    <slide2>Extracted content from Slide 2</slide2>
    <slide3>Extracted content from Slide 3</slide3>
    ...
</content>"#;

    /// Spoken narration transcription of the same video.
    pub const SPEECH_TRANSCRIPTION: &'static str = r#"Transcribe everything the teacher says in this video.
Guidelines:
- Return only the spoken words as plain text, in order.
- Do not describe the video or add any commentary.
- Write mathematical expressions the way they are spoken."#;

    /// Restructuring of slide text into the scene record.
    pub const SCENE_RECORD: &'static str = r#"{context}

Write this in the given format only, do not write anything else, json format only
{
title : "Introduction to Fourier Transform"
elements : [
    {"type": "tex", "content": ["The Fourier Transform decomposes a function"], "speak":["The Fourier Transform decomposes a function."]},
    {"type": "tex", "content": ["into its frequency components."], "speak":["into its frequency components."]},
    {"type": "math", "content": [r"F(\omega) = \int_{-\infty}^{\infty} f(t) e^{-i\omega t} dt"], "speak":["Explain the equation."]},
    {"type": "tex", "content": ["It is widely used in signal processing."], "speak":["It is widely used in signal processing."]}
]
}
RETURN your answer in the given format
{
  title: str,
  elements: list of dictionary(with keys type, content, and speak)
}"#;

    /// Correction request for a script that fails to parse.
    pub const SYNTAX_REPAIR: &'static str = r#"The following Python code has a syntax error:

{code}

Error message: {error}

Provide a corrected version of the code without comments and with no additional commentary."#;

    /// Review of the generated script for LaTeX mistakes.
    pub const LATEX_REVIEW: &'static str = r#"Please review the following Manim scene code for any LaTeX errors in the content strings and provide a corrected version of the code if errors exist. If no LaTeX errors are found, simply respond with 'No errors found'.

{code}"#;

    /// Reply marker meaning the review found nothing to fix
    pub const NO_ERRORS_MARKER: &'static str = "No errors found";
}

pub fn slide_transcription_prompt() -> String {
    PromptTemplate::SLIDE_TRANSCRIPTION.to_string()
}

pub fn speech_transcription_prompt() -> String {
    PromptTemplate::SPEECH_TRANSCRIPTION.to_string()
}

/// Context for the scene prompt when the narration was transcribed too
pub fn combined_context(slide_text: &str, speech_text: &str) -> String {
    format!("Visual Transcript:\n{}\n\nAudio Transcript:\n{}", slide_text, speech_text)
}

pub fn scene_record_prompt(context: &str) -> String {
    PromptTemplate::SCENE_RECORD.replacen("{context}", context, 1)
}

pub fn syntax_repair_prompt(code: &str, error: &str) -> String {
    // Error first: the code may itself contain `{error}`
    PromptTemplate::SYNTAX_REPAIR
        .replacen("{error}", error, 1)
        .replacen("{code}", code, 1)
}

pub fn latex_review_prompt(code: &str) -> String {
    PromptTemplate::LATEX_REVIEW.replacen("{code}", code, 1)
}
