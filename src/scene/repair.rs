/*!
 * Repair of model-emitted scene data.
 *
 * The generation service is asked for a JSON object with a `title` and a
 * list of `elements`, but what comes back is only roughly that: fenced in
 * markdown, prefixed with a language tag, keys left unquoted the way the
 * prompt's own example shows them, Python raw strings, single quotes,
 * trailing commas, LaTeX backslashes that are not valid JSON escapes.
 *
 * Repair happens in two stages:
 * 1. A tolerant textual pre-pass. String literals are tokenized first and
 *    re-emitted as canonical JSON strings; the regex-based fixes (key
 *    quoting, missing or trailing commas, Python literals) only ever touch
 *    the text between literals.
 * 2. A strict parse with `serde_json` followed by validation against the
 *    fixed record shape, reporting the exact field that is wrong.
 */

use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;

use super::model::{ContentElement, SceneRecord};
use super::normalize::escape_ampersands;
use crate::errors::RepairError;

/// A fenced markdown block, optional language tag on the opening fence
static FENCED_BLOCK_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[ \t]*[A-Za-z0-9_+\-]*[ \t]*\r?\n(.*?)```").expect("Invalid fence regex")
});

/// A bare language tag on the first line, left over after stripping backticks
static LANGUAGE_TAG_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i)(json5?|javascript|js|python|py)[ \t]*\r?\n").expect("Invalid language tag regex")
});

/// Unquoted key after `{` or `,`
static KEY_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([{,]\s*)([A-Za-z_]\w*)(\s*:)").expect("Invalid key regex")
});

/// Unquoted key at the start of a gap that follows a string value (missing comma)
static LEADING_KEY_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\s*)([A-Za-z_]\w*)(\s*:)").expect("Invalid leading key regex")
});

/// Unquoted key right after a closing bracket (missing comma)
static CLOSE_THEN_KEY_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([\]}])(\s*)([A-Za-z_]\w*)(\s*:)").expect("Invalid close-then-key regex")
});

static TRAILING_COMMA_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r",(\s*[}\]])").expect("Invalid trailing comma regex")
});

static PYTHON_LITERAL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(True|False|None)\b").expect("Invalid literal regex")
});

/// Two-letter LaTeX commands starting with `n`; longer ones are recognised by shape
const SHORT_LATEX_N_COMMANDS: &[&str] = &["ne", "ni", "nu"];

/// Piece of the input, either text between literals or a re-encoded literal
#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Gap(String),
    Str(String),
}

/// Strip surrounding whitespace, markdown fences and a leading language tag.
///
/// Also used on corrected script text returned by the service.
pub fn strip_code_fence(raw: &str) -> String {
    let trimmed = raw.trim();

    if let Some(caps) = FENCED_BLOCK_REGEX.captures(trimmed) {
        return caps[1].trim().to_string();
    }

    let unfenced = trimmed.trim_matches('`').trim();
    LANGUAGE_TAG_REGEX.replace(unfenced, "").trim().to_string()
}

/// Run the tolerant pre-pass and return text that should parse as JSON.
pub fn repair_loose_json(raw: &str) -> String {
    let stripped = strip_code_fence(raw);
    let text = isolate_object(&stripped);
    let segments = split_literals(text);

    let mut out = String::with_capacity(text.len() + 16);
    for (idx, segment) in segments.iter().enumerate() {
        let after_string = idx > 0 && matches!(segments[idx - 1], Segment::Str(_));

        match segment {
            Segment::Str(literal) => {
                // `"a""key": ...`, two literals with nothing in between
                if after_string && literal_is_key(&segments, idx) {
                    out.push(',');
                }
                out.push_str(literal);
            }
            Segment::Gap(gap) => {
                let before_key = matches!(segments.get(idx + 1), Some(Segment::Str(_)))
                    && literal_is_key(&segments, idx + 1);
                out.push_str(&repair_gap(gap, after_string, before_key));
            }
        }
    }

    out
}

/// Parse, validate and sanitize a scene record from raw service output.
pub fn repair_scene_record(raw: &str) -> Result<SceneRecord, RepairError> {
    let repaired = repair_loose_json(raw);

    let value: Value = serde_json::from_str(&repaired).map_err(|e| {
        warn!("Scene data still malformed after repair: {}", e);
        RepairError::Format {
            message: e.to_string(),
            repaired: repaired.clone(),
        }
    })?;

    let mut record = validate_record(&value)?;

    for element in &mut record.elements {
        for line in &mut element.content {
            *line = escape_ampersands(line);
        }
        for line in &mut element.speak {
            *line = escape_ampersands(line);
        }
    }

    debug!(
        "Repaired scene record '{}' with {} element(s)",
        record.title,
        record.elements.len()
    );

    Ok(record)
}

/// Check a parsed value against the fixed `{title, elements[{type, content, speak}]}` shape.
pub fn validate_record(value: &Value) -> Result<SceneRecord, RepairError> {
    let object = value.as_object().ok_or_else(|| RepairError::schema("<root>"))?;

    let title = object
        .get("title")
        .and_then(Value::as_str)
        .ok_or_else(|| RepairError::schema("title"))?
        .to_string();

    let raw_elements = object
        .get("elements")
        .and_then(Value::as_array)
        .ok_or_else(|| RepairError::schema("elements"))?;

    let mut elements = Vec::with_capacity(raw_elements.len());
    for (i, raw) in raw_elements.iter().enumerate() {
        let field = format!("elements[{}]", i);
        let element = raw.as_object().ok_or_else(|| RepairError::schema(field.clone()))?;

        let label = element
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| RepairError::schema(format!("{}.type", field)))?;

        let content = text_lines(element.get("content"), &format!("{}.content", field), true)?;
        let speak = text_lines(element.get("speak"), &format!("{}.speak", field), false)?;

        elements.push(ContentElement::new(label, content, speak));
    }

    Ok(SceneRecord { title, elements })
}

/// Read a list of lines; a lone string counts as one line.
fn text_lines(value: Option<&Value>, field: &str, required: bool) -> Result<Vec<String>, RepairError> {
    match value {
        None | Some(Value::Null) => {
            if required {
                Err(RepairError::schema(field))
            } else {
                Ok(Vec::new())
            }
        }
        Some(Value::String(line)) => Ok(vec![line.clone()]),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(j, item)| match item {
                Value::String(line) => Ok(line.clone()),
                Value::Number(n) => Ok(n.to_string()),
                _ => Err(RepairError::schema(format!("{}[{}]", field, j))),
            })
            .collect(),
        Some(_) => Err(RepairError::schema(field)),
    }
}

/// Narrow to the outermost `{...}` when the service wrapped the object in prose.
fn isolate_object(text: &str) -> &str {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Whether the literal at `idx` is followed by a `:` and so is a key
fn literal_is_key(segments: &[Segment], idx: usize) -> bool {
    match segments.get(idx + 1) {
        Some(Segment::Gap(gap)) => gap.trim_start().starts_with(':'),
        _ => false,
    }
}

fn repair_gap(gap: &str, after_string: bool, before_key: bool) -> String {
    let mut gap = PYTHON_LITERAL_REGEX
        .replace_all(gap, |caps: &Captures| match &caps[1] {
            "True" => "true",
            "False" => "false",
            _ => "null",
        })
        .into_owned();

    gap = TRAILING_COMMA_REGEX.replace_all(&gap, "$1").into_owned();

    if after_string {
        gap = LEADING_KEY_REGEX.replace(&gap, ",$1\"$2\"$3").into_owned();
    }

    gap = KEY_REGEX.replace_all(&gap, "$1\"$2\"$3").into_owned();
    gap = CLOSE_THEN_KEY_REGEX.replace_all(&gap, "$1,$2\"$3\"$4").into_owned();

    if after_string && before_key && gap.trim().is_empty() {
        gap.insert(0, ',');
    }

    gap
}

/// Split text into gaps and string literals, re-encoding every literal as JSON.
fn split_literals(text: &str) -> Vec<Segment> {
    let chars: Vec<char> = text.chars().collect();
    let mut segments = Vec::new();
    let mut gap = String::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let raw_prefix = (c == 'r' || c == 'R')
            && matches!(chars.get(i + 1), Some('"') | Some('\''))
            && (i == 0 || !is_word_char(chars[i - 1]));

        if c == '"' || c == '\'' || raw_prefix {
            let (quote, raw, start) = if raw_prefix {
                (chars[i + 1], true, i + 2)
            } else {
                (c, false, i + 1)
            };

            if !gap.is_empty() {
                segments.push(Segment::Gap(std::mem::take(&mut gap)));
            }

            let mut literal = String::new();
            i = read_string_literal(&chars, start, quote, raw, &mut literal);
            segments.push(Segment::Str(literal));
        } else {
            gap.push(c);
            i += 1;
        }
    }

    if !gap.is_empty() {
        segments.push(Segment::Gap(gap));
    }

    segments
}

/// Re-encode one literal starting after its opening quote. Returns the index
/// after the closing quote (or the end of input for an unterminated literal).
fn read_string_literal(chars: &[char], start: usize, quote: char, raw: bool, out: &mut String) -> usize {
    out.push('"');
    let mut i = start;

    while i < chars.len() {
        let c = chars[i];

        if c == quote {
            out.push('"');
            return i + 1;
        }

        if c == '\\' {
            if raw {
                out.push_str("\\\\");
                if chars.get(i + 1) == Some(&quote) {
                    push_quote(out, quote);
                    i += 2;
                } else {
                    i += 1;
                }
                continue;
            }

            let Some(&next) = chars.get(i + 1) else {
                out.push_str("\\\\");
                i += 1;
                continue;
            };

            match next {
                '"' => {
                    out.push_str("\\\"");
                    i += 2;
                }
                '\'' => {
                    out.push('\'');
                    i += 2;
                }
                '\\' => {
                    out.push_str("\\\\");
                    i += 2;
                }
                '/' => {
                    out.push('/');
                    i += 2;
                }
                'u' if is_unicode_escape(chars, i + 2) => {
                    out.push_str("\\u");
                    i += 2;
                }
                'b' | 'f' | 'r' | 't' if !chars.get(i + 2).is_some_and(|c| c.is_ascii_alphabetic()) => {
                    out.push('\\');
                    out.push(next);
                    i += 2;
                }
                'n' if !starts_latex_n_command(chars, i + 1) => {
                    out.push_str("\\n");
                    i += 2;
                }
                _ => {
                    // Not a JSON escape: keep the backslash as a literal character
                    out.push_str("\\\\");
                    i += 1;
                }
            }
            continue;
        }

        match c {
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
        i += 1;
    }

    out.push('"');
    chars.len()
}

fn push_quote(out: &mut String, quote: char) {
    if quote == '"' {
        out.push_str("\\\"");
    } else {
        out.push(quote);
    }
}

fn is_unicode_escape(chars: &[char], from: usize) -> bool {
    chars.len() >= from + 4 && chars[from..from + 4].iter().all(|c| c.is_ascii_hexdigit())
}

/// `\n` followed by two or more lowercase letters is a command such as `\neq` or `\newcommand`
fn starts_latex_n_command(chars: &[char], from: usize) -> bool {
    let word: String = chars[from..]
        .iter()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    let lowercase_tail = word.chars().skip(1).take_while(|c| c.is_ascii_lowercase()).count();
    lowercase_tail >= 2 || SHORT_LATEX_N_COMMANDS.contains(&word.as_str())
}
