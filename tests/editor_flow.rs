use std::fs;
use std::io::Cursor;
use std::path::Path;
use tagdeck::app;
use tagdeck::config::EditorSettings;
use tagdeck::gateway::{Id3FileGateway, parse_tag, render_tag};
use tagdeck::model::{FrameId, Id3Version, RawFrame, TagContents};
use tagdeck::{EditSession, SessionState};
use tempfile::tempdir;

const AUDIO: &[u8] = b"\xff\xfb\x90\x00fake mpeg payload";

fn frame(id: &str, data: &[u8]) -> RawFrame {
    RawFrame::new(FrameId::new(id).expect("frame id"), data.to_vec())
}

fn write_song(path: &Path, frames: Vec<RawFrame>) -> TagContents {
    let contents = TagContents {
        version: Id3Version::V23,
        frames,
    };
    let mut bytes = render_tag(&contents, 32).expect("render");
    bytes.extend_from_slice(AUDIO);
    fs::write(path, bytes).expect("write song");
    contents
}

fn read_tag(path: &Path) -> TagContents {
    parse_tag(&fs::read(path).expect("read song")).expect("parse tag")
}

fn run(session: &mut EditSession, script: &str) -> String {
    let mut settings = EditorSettings::default();
    let mut out = Vec::new();
    app::run_editor(session, &mut settings, Cursor::new(script), &mut out).expect("editor");
    String::from_utf8(out).expect("utf8 output")
}

#[test]
fn editor_adds_tag_and_saves_to_disk() {
    let dir = tempdir().expect("tempdir");
    let song = dir.path().join("song.mp3");
    write_song(
        &song,
        vec![
            frame("TIT2", b"\x00Song"),
            frame("APIC", b"\x00image/png\x00\x03\x00\x89PNG"),
        ],
    );

    let mut session = EditSession::new(Id3FileGateway::default());
    let script = format!(
        "open {}\nadd TALB Greatest Hits\nls\nsave\nquit\n",
        song.display()
    );
    let output = run(&mut session, &script);

    assert!(output.contains("2 frames"), "output: {output}");
    assert!(output.contains("Greatest Hits"), "output: {output}");
    assert!(!output.contains("error:"), "output: {output}");
    assert_eq!(session.state(), SessionState::Loaded);

    let tag = read_tag(&song);
    assert_eq!(
        tag.frames,
        vec![
            frame("TIT2", b"\x00Song"),
            frame("APIC", b"\x00image/png\x00\x03\x00\x89PNG"),
            frame("TALB", b"\x00Greatest Hits"),
        ]
    );
    assert!(fs::read(&song).expect("read").ends_with(AUDIO));
}

#[test]
fn quitting_with_unsaved_changes_asks_first() {
    let dir = tempdir().expect("tempdir");
    let song = dir.path().join("song.mp3");
    let original = write_song(&song, vec![frame("TIT2", b"\x00Song")]);

    let mut session = EditSession::new(Id3FileGateway::default());
    let script = format!("open {}\nset TIT2 Changed\nquit\nn\nquit\ny\n", song.display());
    let output = run(&mut session, &script);

    assert_eq!(output.matches("Discard changes?").count(), 2);
    assert_eq!(session.state(), SessionState::Dirty);
    assert_eq!(read_tag(&song), original);
}

#[test]
fn editor_reports_errors_and_keeps_going() {
    let dir = tempdir().expect("tempdir");
    let song = dir.path().join("song.mp3");
    write_song(&song, vec![frame("PRIV", b"owner\x00blob")]);

    let mut session = EditSession::new(Id3FileGateway::default());
    let script = format!(
        "save\nopen {}\nset PRIV x\nadd COMM:x:en hi\nadd COMM:x:eng hi\nrm PRIV\nfrobnicate\nsave\nquit\n",
        song.display()
    );
    let output = run(&mut session, &script);

    assert!(output.contains("error: no file is open"), "output: {output}");
    assert!(output.contains("unsupported tag kind: PRIV"), "output: {output}");
    assert!(output.contains("invalid tag parameters"), "output: {output}");
    assert!(output.contains("unknown command frobnicate"), "output: {output}");

    let tag = read_tag(&song);
    assert_eq!(tag.frames.len(), 1);
    assert_eq!(tag.frames[0].id.as_str(), "COMM");
    assert_eq!(tag.frames[0].data, b"\x00engx\x00hi".to_vec());
}

#[test]
fn set_and_remove_commands_edit_files_in_place() {
    let dir = tempdir().expect("tempdir");
    let song = dir.path().join("song.mp3");
    fs::write(&song, AUDIO).expect("write bare song");

    let mut session = EditSession::new(Id3FileGateway::default());
    app::set_tag(&mut session, &song, "TIT2", "First").expect("set new");

    let mut session = EditSession::new(Id3FileGateway::default());
    app::set_tag(&mut session, &song, "TIT2", "Second").expect("set existing");
    app::set_tag(&mut session, &song, "TPE1", "Artist").expect("set artist");

    let tag = read_tag(&song);
    assert_eq!(tag.version, Id3Version::V24);
    assert_eq!(
        tag.frames,
        vec![frame("TIT2", b"\x03Second"), frame("TPE1", b"\x03Artist")]
    );

    let mut session = EditSession::new(Id3FileGateway::default());
    app::remove_tag(&mut session, &song, "TIT2").expect("remove");
    assert_eq!(read_tag(&song).frames, vec![frame("TPE1", b"\x03Artist")]);

    let mut session = EditSession::new(Id3FileGateway::default());
    assert!(app::remove_tag(&mut session, &song, "TALB").is_err());
    assert!(fs::read(&song).expect("read").ends_with(AUDIO));
}

#[test]
fn show_prints_tags_for_files_without_audio_frames() {
    let dir = tempdir().expect("tempdir");
    let song = dir.path().join("song.mp3");
    write_song(
        &song,
        vec![frame("TIT2", b"\x00Song"), frame("TDAT", b"\x000101")],
    );

    let mut session = EditSession::new(Id3FileGateway::default());
    let mut out = Vec::new();
    app::show_file(&mut session, &song, &mut out).expect("show");
    let output = String::from_utf8(out).expect("utf8");

    assert!(output.contains("Song"), "output: {output}");
    assert!(output.contains("[Date]"), "output: {output}");
    assert!(output.contains("Unsupported"), "output: {output}");
}

#[test]
fn input_ending_with_unsaved_changes_is_an_error() {
    let dir = tempdir().expect("tempdir");
    let song = dir.path().join("song.mp3");
    let original = write_song(&song, vec![frame("TIT2", b"\x00Song")]);

    let mut session = EditSession::new(Id3FileGateway::default());
    let mut settings = EditorSettings::default();
    let mut out = Vec::new();
    let script = format!("open {}\nset TIT2 Changed\n", song.display());
    let err = app::run_editor(&mut session, &mut settings, Cursor::new(script), &mut out)
        .expect_err("unsaved edits must not be dropped silently");

    assert!(err.to_string().contains("unsaved changes"), "error: {err}");
    assert_eq!(session.state(), SessionState::Dirty);
    assert_eq!(read_tag(&song), original);

    let mut out = Vec::new();
    let script = String::from("set TIT2 Again\nquit\n");
    let err = app::run_editor(&mut session, &mut settings, Cursor::new(script), &mut out)
        .expect_err("unanswered discard prompt keeps the edits");
    let output = String::from_utf8(out).expect("utf8 output");
    assert_eq!(output.matches("Discard changes?").count(), 1);
    assert!(err.to_string().contains("unsaved changes"), "error: {err}");
    assert_eq!(session.state(), SessionState::Dirty);
}

#[test]
fn input_ending_on_a_clean_session_is_fine() {
    let dir = tempdir().expect("tempdir");
    let song = dir.path().join("song.mp3");
    write_song(&song, vec![frame("TIT2", b"\x00Song")]);

    let mut session = EditSession::new(Id3FileGateway::default());
    let output = run(&mut session, &format!("open {}\nls\n", song.display()));
    assert!(output.contains("Song"), "output: {output}");
}

#[test]
fn comment_keys_with_spaces_can_be_edited() {
    let dir = tempdir().expect("tempdir");
    let song = dir.path().join("song.mp3");
    write_song(&song, vec![frame("COMM", b"\x00engliner notes\x00hi")]);

    let mut session = EditSession::new(Id3FileGateway::default());
    let script = format!(
        "open {}\nls\nset COMM:liner notes:eng Recorded live\nadd COMM:my notes:eng mine\nsave\nquit\n",
        song.display()
    );
    let output = run(&mut session, &script);

    assert!(output.contains("COMM:liner notes:eng"), "output: {output}");
    assert!(!output.contains("error:"), "output: {output}");

    let tag = read_tag(&song);
    assert_eq!(
        tag.frames,
        vec![
            frame("COMM", b"\x00engliner notes\x00Recorded live"),
            frame("COMM", b"\x00engmy notes\x00mine"),
        ]
    );
}
