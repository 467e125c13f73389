/*!
 * Text sanitation for content headed to the LaTeX-based renderer.
 */

use super::model::SceneRecord;

/// Unicode symbols the renderer's TeX setup cannot typeset, with their commands
const UNICODE_REPLACEMENTS: &[(char, &str)] = &[
    ('≥', r"\geq"),
    ('≤', r"\leq"),
    ('≠', r"\neq"),
    ('→', r"\to"),
    ('←', r"\leftarrow"),
    ('⇒', r"\Rightarrow"),
    ('∞', r"\infty"),
    ('ε', r"\epsilon"),
    ('∈', r"\in"),
    ('×', r"\times"),
    ('±', r"\pm"),
];

/// Escape every `&` that is not already escaped.
///
/// An ampersand preceded by an odd run of backslashes is already escaped and
/// is left alone, so applying this twice gives the same result as once.
pub fn escape_ampersands(line: &str) -> String {
    let mut out = String::with_capacity(line.len() + 4);
    let mut backslashes = 0usize;

    for c in line.chars() {
        if c == '&' && backslashes % 2 == 0 {
            out.push('\\');
        }
        out.push(c);

        if c == '\\' {
            backslashes += 1;
        } else {
            backslashes = 0;
        }
    }

    out
}

/// Replace Unicode math symbols with their LaTeX command equivalents.
///
/// A trailing space is added after the command when the next character is a
/// letter, so `≤x` becomes `\leq x` and not the undefined `\leqx`.
pub fn replace_unicode_symbols(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match UNICODE_REPLACEMENTS.iter().find(|(symbol, _)| *symbol == c) {
            Some((_, command)) => {
                out.push_str(command);
                if chars.peek().is_some_and(|next| next.is_ascii_alphabetic()) {
                    out.push(' ');
                }
            }
            None => out.push(c),
        }
    }

    out
}

/// Apply every normalization to a record in place.
///
/// Content lines get symbol replacement and ampersand escaping, narration
/// lines only ampersand escaping.
pub fn normalize_record(record: &mut SceneRecord) {
    record.title = escape_ampersands(&replace_unicode_symbols(&record.title));

    for element in &mut record.elements {
        for line in &mut element.content {
            *line = escape_ampersands(&replace_unicode_symbols(line));
        }
        for line in &mut element.speak {
            *line = escape_ampersands(line);
        }
    }
}
