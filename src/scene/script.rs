/*!
 * Serializer from a `SceneDescriptor` to Manim Python source.
 *
 * The script has two phases: a silent pass that adds every mobject
 * invisibly and caches the camera framing for the whole block, and the
 * reveal pass that replays the layout at that framing and writes the title
 * and each element in turn. All text is emitted as escaped Python string
 * literals.
 */

use std::fmt;

use super::layout::{PlacedElement, SceneDescriptor};

const INDENT: &str = "    ";

/// Generated Manim source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManimScript {
    source: String,
}

impl ManimScript {
    pub fn render(descriptor: &SceneDescriptor) -> Self {
        let mut out = ScriptWriter::default();

        out.line(0, "from manim import *");
        out.blank();
        write_narration(&mut out, descriptor);
        out.blank();
        out.blank();
        out.line(0, &format!("class {}(MovingCameraScene):", descriptor.scene_name));
        write_build_mobjects(&mut out, descriptor);
        out.blank();
        write_camera_setup(&mut out, descriptor);
        out.blank();
        write_construct(&mut out, descriptor);

        Self { source: out.finish() }
    }

    /// Wrap source that came from elsewhere, e.g. a corrected script
    pub fn from_source(source: impl Into<String>) -> Self {
        Self { source: source.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn into_string(self) -> String {
        self.source
    }
}

impl fmt::Display for ManimScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[derive(Default)]
struct ScriptWriter {
    buf: String,
}

impl ScriptWriter {
    fn line(&mut self, depth: usize, text: &str) {
        for _ in 0..depth {
            self.buf.push_str(INDENT);
        }
        self.buf.push_str(text);
        self.buf.push('\n');
    }

    fn blank(&mut self) {
        self.buf.push('\n');
    }

    fn finish(self) -> String {
        self.buf
    }
}

/// Quote a string as a Python literal that evaluates back to `text`.
pub fn python_string_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || c as u32 == 0x7f => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn seconds(value: f64) -> String {
    format!("{:.1}", value)
}

fn write_narration(out: &mut ScriptWriter, descriptor: &SceneDescriptor) {
    if descriptor.elements.is_empty() {
        out.line(0, "NARRATION = []");
        return;
    }

    out.line(0, "NARRATION = [");
    for element in &descriptor.elements {
        let lines: Vec<String> = element.speak.iter().map(|l| python_string_literal(l)).collect();
        out.line(1, &format!("[{}],", lines.join(", ")));
    }
    out.line(0, "]");
}

fn element_expression(element: &PlacedElement) -> String {
    let args: Vec<String> = element.lines.iter().map(|l| python_string_literal(l)).collect();
    format!(
        "{}({}, font_size={}).next_to(prev_mobject, DOWN, buff={})",
        element.command.as_str(),
        args.join(", "),
        element.font_size,
        element.gap
    )
}

fn write_build_mobjects(out: &mut ScriptWriter, descriptor: &SceneDescriptor) {
    out.line(1, "def build_mobjects(self):");
    out.line(
        2,
        &format!(
            "title = Tex({}, font_size={}).to_edge(UP)",
            python_string_literal(&descriptor.title),
            descriptor.title_size
        ),
    );
    out.line(2, "elements = []");
    out.line(2, "prev_mobject = title");
    for element in &descriptor.elements {
        let name = format!("element{}", element.index);
        out.line(2, &format!("{} = {}", name, element_expression(element)));
        out.line(2, &format!("elements.append({})", name));
        out.line(2, &format!("prev_mobject = {}", name));
    }
    out.line(2, "return title, elements");
}

fn write_camera_setup(out: &mut ScriptWriter, descriptor: &SceneDescriptor) {
    let timing = &descriptor.timing;
    let margin = seconds(timing.content_margin);

    out.line(1, "def get_final_camera_setup(self):");
    out.line(2, "title, elements = self.build_mobjects()");
    out.line(2, "content = VGroup(title, *elements)");
    out.line(2, "self.add(title)");
    out.line(2, "title.set_opacity(0)");
    out.line(
        2,
        &format!("self.camera.auto_zoom([title], margin={})", seconds(timing.title_margin)),
    );
    out.line(2, "for element in elements:");
    out.line(3, "self.add(element)");
    out.line(3, "element.set_opacity(0)");
    out.line(2, "self.play(");
    out.line(3, &format!("self.camera.auto_zoom(content, margin={}, animate=True).build(),", margin));
    out.line(3, &format!("run_time={},", seconds(timing.camera_pan)));
    out.line(2, ")");
    out.line(2, "self.camera.frame.save_state()");
    out.line(2, &format!("self.camera.auto_zoom(content, margin={})", margin));
    out.line(2, "final_center = self.camera.frame.get_center()");
    out.line(2, "final_width = self.camera.frame.get_width()");
    out.line(2, "self.camera.frame.restore()");
    out.line(2, "self.remove(content)");
    out.line(2, "return final_center, final_width");
}

fn write_construct(out: &mut ScriptWriter, descriptor: &SceneDescriptor) {
    let timing = &descriptor.timing;

    out.line(1, "def construct(self):");
    out.line(2, "final_center, final_width = self.get_final_camera_setup()");
    out.line(2, "title, elements = self.build_mobjects()");
    out.line(2, "self.camera.frame.move_to(final_center)");
    out.line(2, "self.camera.frame.set_width(final_width)");
    out.line(2, "self.play(Write(title))");
    out.line(2, &format!("self.wait({})", seconds(timing.reveal_pause)));
    out.line(2, "for element in elements:");
    out.line(3, "self.play(Write(element))");
    out.line(3, &format!("self.wait({})", seconds(timing.reveal_pause)));
    out.line(2, &format!("self.wait({})", seconds(timing.final_pause)));
}
