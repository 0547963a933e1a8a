use parley::{DialogueEngine, DialogueOptions, DialogueState, ErrorCategory, ScriptError};
use std::io::Write;
use tempfile::NamedTempFile;

fn script_file(source: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(source.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn loads_a_script_from_disk_and_runs_a_conversation() {
    let file = script_file(
        "\
# greeting topic
~greet: [hi hello \"good morning\"]

u: (~greet) : [hey hello] there! what is your name?
  u1: (my name is _) : nice to meet you $name <head_yes>
  u1: (no) : fine, be that way <head_no>
u: (dance) : watch this <dance90>
u: (who am i) : you are $name
",
    );
    let mut engine = DialogueEngine::from_file(file.path(), DialogueOptions::seeded(11)).unwrap();
    assert!(engine.errors().is_empty(), "{:?}", engine.errors());
    assert_eq!(engine.script().rule_count(), 5);

    let out = engine.handle_input("Good morning!");
    assert!(out.matched);
    assert!(out.spoken_text.ends_with("there! what is your name?"));
    assert_eq!(out.state, DialogueState::InScope(1));

    let out = engine.handle_input("My name is Ada");
    assert_eq!(out.spoken_text, "nice to meet you ada");
    assert_eq!(out.actions, vec!["head_yes"]);
    assert_eq!(out.state, DialogueState::InScope(2));

    assert_eq!(engine.handle_input("who am I").spoken_text, "you are ada");
    assert_eq!(engine.handle_input("dance").actions, vec!["dance90"]);
}

#[test]
fn diagnostics_carry_the_file_name() {
    let file = script_file("u: (hi) : hello\nnot a rule\n");
    let engine = DialogueEngine::from_file(file.path(), DialogueOptions::default()).unwrap();

    let err = &engine.errors()[0];
    assert_eq!(err.category, ErrorCategory::Syntax);
    assert_eq!(err.line, 2);
    assert_eq!(err.file, file.path().display().to_string());
    assert!(err.to_string().ends_with(":2 [syntax] [NON-FATAL] line is not a valid definition or rule"));
}

#[test]
fn script_without_top_level_rules_boots_broken() {
    let file = script_file("~only: [definitions here]\n");
    let mut engine = DialogueEngine::from_file(file.path(), DialogueOptions::default()).unwrap();

    assert!(engine.has_fatal_errors());
    assert_eq!(engine.state(), DialogueState::Boot);
    assert!(engine.errors()[0].to_string().contains("[FATAL] no valid top-level u: rules found"));
    assert!(!engine.handle_input("hello").ok);

    let json = serde_json::to_value(&engine.errors()[0]).unwrap();
    assert_eq!(json["category"], "fatal");
    assert_eq!(json["fatal"], true);
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.top");
    let err = DialogueEngine::from_file(&path, DialogueOptions::default()).unwrap_err();
    assert!(matches!(err, ScriptError::Io { .. }));
    assert!(err.to_string().contains("absent.top"));
}
