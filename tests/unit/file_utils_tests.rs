/*!
 * Tests for file utility functions
 */

use anyhow::Result;
use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;
use mathcast::file_utils::{FileManager, VideoFormat};
use crate::common;

/// Test that file_exists returns true for existing files
#[test]
fn test_file_exists_withExistingFile_shouldReturnTrue() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let test_file = common::create_test_file(temp_dir.path(), "test_file_exists.tmp", "test content")?;

    assert!(FileManager::file_exists(&test_file));
    assert!(!FileManager::file_exists(temp_dir.path()));
    Ok(())
}

/// Test that file_exists returns false for non-existent files
#[test]
fn test_file_exists_withNonExistentFile_shouldReturnFalse() {
    assert!(!FileManager::file_exists("non_existent_file.tmp"));
}

/// Test that dir_exists distinguishes directories from files
#[test]
fn test_dir_exists_shouldOnlyAcceptDirectories() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let test_file = common::create_test_file(temp_dir.path(), "a.txt", "x")?;

    assert!(FileManager::dir_exists(temp_dir.path()));
    assert!(!FileManager::dir_exists(&test_file));
    assert!(!FileManager::dir_exists("./non_existent_directory_12345"));
    Ok(())
}

/// Test that ensure_dir creates nested directories
#[test]
fn test_ensure_dir_withNestedPath_shouldCreateAll() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let nested = temp_dir.path().join("a").join("b").join("c");

    FileManager::ensure_dir(&nested)?;
    FileManager::ensure_dir(&nested)?;

    assert!(FileManager::dir_exists(&nested));
    Ok(())
}

#[test]
fn test_processed_path_shouldUseRunIdAndMp4() {
    let path = FileManager::processed_path("media/videos", "abc");
    assert_eq!(path, Path::new("media/videos/abc.mp4"));
}

/// Test that write_to_file creates parents and read_to_string reads it back
#[test]
fn test_write_to_file_withMissingParent_shouldCreateIt() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("run").join("scene.py");

    FileManager::write_to_file(&path, "print('hi')")?;

    assert_eq!(FileManager::read_to_string(&path)?, "print('hi')");
    Ok(())
}

#[test]
fn test_read_to_string_withMissingFile_shouldFail() {
    assert!(FileManager::read_to_string("definitely_missing_file.txt").is_err());
}

/// Test that move_file relocates the file and creates the destination folder
#[test]
fn test_move_file_shouldRelocate() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let source = common::create_test_file(temp_dir.path(), "render.mp4", "video")?;
    let destination = temp_dir.path().join("published").join("id.mp4");

    FileManager::move_file(&source, &destination)?;

    assert!(!source.exists());
    assert_eq!(fs::read_to_string(&destination)?, "video");
    Ok(())
}

#[test]
fn test_move_file_withMissingSource_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let result = FileManager::move_file(temp_dir.path().join("nope.mp4"), temp_dir.path().join("out.mp4"));
    assert!(result.is_err());
    Ok(())
}

/// Test that find_file_named prefers the most recently written match
#[test]
fn test_find_file_named_withSeveralMatches_shouldReturnNewest() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let old_dir = temp_dir.path().join("480p15");
    let new_dir = temp_dir.path().join("720p30");
    fs::create_dir_all(&old_dir)?;
    fs::create_dir_all(&new_dir)?;

    common::create_test_file(&old_dir, "GeneratedScene.mp4", "old")?;
    thread::sleep(Duration::from_millis(20));
    let newest = common::create_test_file(&new_dir, "GeneratedScene.mp4", "new")?;
    common::create_test_file(&new_dir, "Other.mp4", "other")?;

    let found = FileManager::find_file_named(temp_dir.path(), "GeneratedScene.mp4")?;
    assert_eq!(found, Some(newest));
    Ok(())
}

#[test]
fn test_find_file_named_withMissingDir_shouldReturnNone() -> Result<()> {
    let found = FileManager::find_file_named("./no_such_media_dir_98765", "GeneratedScene.mp4")?;
    assert!(found.is_none());
    Ok(())
}

/// Test that append_to_log_file keeps earlier lines
#[test]
fn test_append_to_log_file_shouldAppendTimestampedLines() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let log = temp_dir.path().join("run").join("run.log");

    FileManager::append_to_log_file(&log, "stage extracted")?;
    FileManager::append_to_log_file(&log, "stage rendered")?;

    let content = fs::read_to_string(&log)?;
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with('[') && lines[0].ends_with("stage extracted"));
    assert!(lines[1].ends_with("stage rendered"));
    Ok(())
}

/// Test that only webm and mp4 are accepted, case-insensitively
#[test]
fn test_videoFormat_fromFileName_shouldAcceptOnlyWebmAndMp4() {
    assert_eq!(VideoFormat::from_file_name("lecture.webm"), Some(VideoFormat::Webm));
    assert_eq!(VideoFormat::from_file_name("LECTURE.MP4"), Some(VideoFormat::Mp4));
    assert_eq!(VideoFormat::from_file_name("notes.txt"), None);
    assert_eq!(VideoFormat::from_file_name("mp4"), None);
    assert_eq!(VideoFormat::from_file_name(""), None);
}

#[test]
fn test_videoFormat_mimeType_shouldMatchExtension() {
    assert_eq!(VideoFormat::Webm.mime_type(), "video/webm");
    assert_eq!(VideoFormat::Mp4.extension(), "mp4");
}
