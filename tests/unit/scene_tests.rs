/*!
 * Tests for slide extraction, scene repair and script generation
 */

use mathcast::app_config::SlideSelection;
use mathcast::errors::RepairError;
use mathcast::pipeline::compose_script;
use mathcast::scene::{
    ElementKind, ManimScript, SceneDescriptor, TexCommand, extract_slides, repair_scene_record,
    select_for_scene,
};
use crate::common;

/// Test that slides come back verbatim and in order
#[test]
fn test_extract_slides_withTaggedTranscript_shouldKeepOrder() {
    let slides = extract_slides(common::TWO_SLIDE_TRANSCRIPT);
    assert_eq!(slides, vec!["Lecture 3", "Pythagoras: a^2 + b^2 = c^2"]);
}

/// Test that multi-line slides keep their inner whitespace
#[test]
fn test_extract_slides_withMultilineSlide_shouldCaptureAcrossLines() {
    let transcript = "<content><slide1>\nline one\nline two\n</slide1></content>";
    let slides = extract_slides(transcript);
    assert_eq!(slides, vec!["\nline one\nline two\n"]);
}

#[test]
fn test_extract_slides_withoutTags_shouldBeEmpty() {
    assert!(extract_slides("The video shows a blank sheet.").is_empty());
}

/// Test the three selection policies
#[test]
fn test_select_for_scene_shouldFollowPolicy() {
    let slides = extract_slides(common::TWO_SLIDE_TRANSCRIPT);

    assert_eq!(
        select_for_scene(&slides, SlideSelection::PreferSecond).as_deref(),
        Some("Pythagoras: a^2 + b^2 = c^2")
    );
    assert_eq!(select_for_scene(&slides, SlideSelection::First).as_deref(), Some("Lecture 3"));
    assert_eq!(
        select_for_scene(&slides, SlideSelection::All).as_deref(),
        Some("Lecture 3\n\nPythagoras: a^2 + b^2 = c^2")
    );
}

#[test]
fn test_select_for_scene_withSingleSlide_shouldFallBackToFirst() {
    let slides = vec!["Only".to_string()];
    assert_eq!(select_for_scene(&slides, SlideSelection::PreferSecond).as_deref(), Some("Only"));
    assert_eq!(select_for_scene(&[], SlideSelection::PreferSecond), None);
    assert_eq!(select_for_scene(&[], SlideSelection::All), None);
}

/// Test a typical fenced, loosely formatted service reply
#[test]
fn test_repair_scene_record_withTypicalReply_shouldParse() {
    let record = repair_scene_record(common::LOOSE_SCENE_RESPONSE).expect("reply should repair");

    assert_eq!(record.title, "Pythagoras");
    assert_eq!(record.elements.len(), 2);
    assert_eq!(record.elements[0].kind, ElementKind::Text);
    assert_eq!(record.elements[1].kind, ElementKind::Math);
    assert_eq!(record.elements[1].content, vec!["a^2 + b^2 = c^2"]);
    assert_eq!(record.elements[1].speak, vec!["the squares add up."]);
}

#[test]
fn test_repair_scene_record_withWrongTitleType_shouldNameField() {
    let err = repair_scene_record(r#"{"title": 3, "elements": []}"#).unwrap_err();
    assert_eq!(err, RepairError::Schema { field: "title".to_string() });
}

/// Test that the record serializes with the service's field names
#[test]
fn test_sceneRecord_serialize_shouldUseTypeKey() {
    let record = repair_scene_record(common::LOOSE_SCENE_RESPONSE).expect("reply should repair");
    let value = serde_json::to_value(&record).expect("record should serialize");

    assert_eq!(value["title"], "Pythagoras");
    assert_eq!(value["elements"][0]["type"], "tex");
    assert_eq!(value["elements"][1]["content"][0], "a^2 + b^2 = c^2");
}

/// Test the whole text path from reply to script
#[test]
fn test_compose_script_withTypicalReply_shouldProduceRenderableScript() {
    let (record, script) = compose_script(common::LOOSE_SCENE_RESPONSE, "LectureScene").expect("should compose");
    let source = script.as_str();

    assert_eq!(record.elements.len(), 2);
    assert!(source.contains("class LectureScene(MovingCameraScene):"));
    assert!(source.contains(r#"title = Tex("Pythagoras", font_size=50).to_edge(UP)"#));
    assert!(source.contains(r#"element0 = Tex("For a right triangle", font_size=40)"#));
    assert!(source.contains(r#"element1 = MathTex("a^2 + b^2 = c^2", font_size=40)"#));
    assert!(source.contains(r#"["the squares add up."],"#));
}

/// Test that Unicode symbols never reach the script
#[test]
fn test_compose_script_withUnicodeSymbols_shouldEmitCommands() {
    let raw = r#"{"title": "Order", "elements": [{"type": "math", "content": ["a ≤b", "x → ∞"], "speak": []}]}"#;
    let (_, script) = compose_script(raw, "GeneratedScene").expect("should compose");
    let source = script.as_str();

    assert!(source.contains(r#"MathTex("a \\leq b", "x \\to \\infty", font_size=40)"#));
    assert!(!source.contains('≤'));
}

#[test]
fn test_compose_script_withGarbage_shouldReturnFormatError() {
    let err = compose_script("Sorry, I can't do that.", "GeneratedScene").unwrap_err();
    assert!(matches!(err, RepairError::Format { .. }));
}

/// Test the size rule across five elements
#[test]
fn test_descriptor_withManyTextElements_shouldShrinkFromThird() {
    let raw = r#"{"title": "T", "elements": [
        {"type": "tex", "content": ["a"], "speak": []},
        {"type": "tex", "content": ["b"], "speak": []},
        {"type": "tex", "content": ["c"], "speak": []},
        {"type": "math", "content": ["d"], "speak": []},
        {"type": "tex", "content": ["e"], "speak": []}
    ]}"#;
    let record = repair_scene_record(raw).expect("should repair");
    let descriptor = SceneDescriptor::build(&record);

    let sizes: Vec<u32> = descriptor.elements.iter().map(|e| e.font_size).collect();
    assert_eq!(sizes, vec![40, 40, 36, 40, 36]);
    assert_eq!(descriptor.elements[3].command, TexCommand::MathTex);
}

#[test]
fn test_manimScript_display_shouldMatchSource() {
    let record = repair_scene_record(common::LOOSE_SCENE_RESPONSE).expect("should repair");
    let script = ManimScript::render(&SceneDescriptor::build(&record));
    assert_eq!(script.to_string(), script.as_str());
}
