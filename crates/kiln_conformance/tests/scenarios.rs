//! Compiler behavior on a minimal two-stage flow: variant selection, option
//! precedence, rule ordering and binding conflicts.

use kiln_common::option_map;
use kiln_conformance::{configure_with, rules, touch_registry, JobFile, TwoStage};
use kiln_config::BoardDb;
use kiln_graph::{compile, render, FlowError, WriteOutcome};
use pretty_assertions::assert_eq;

fn boards() -> BoardDb {
    let mut db = BoardDb::new();
    db.insert("b0", option_map([("part", "p0")]));
    db
}

#[test]
fn unknown_engine_fails_without_writing() {
    let dir = tempfile::tempdir().unwrap();
    let job = JobFile::new("two_stage").option("pnr", "X").load();
    let err = configure_with(&TwoStage, &job, &boards(), &touch_registry(), dir.path()).unwrap_err();
    match err {
        FlowError::UnsupportedVariant { value, expected, .. } => {
            assert_eq!(value, "X");
            assert_eq!(expected, "vpr, nextpnr");
        }
        other => panic!("expected UnsupportedVariant, got {other:?}"),
    }
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn job_value_beats_database() {
    let job = JobFile::new("two_stage")
        .option("board", "b0")
        .option("part", "p1")
        .load();
    let graph = compile(&TwoStage, &job, &boards(), &touch_registry()).unwrap();
    assert!(render(&graph).unwrap().contains("export PART = p1\n"));
}

#[test]
fn database_fills_missing_value() {
    let job = JobFile::new("two_stage").option("board", "b0").load();
    let graph = compile(&TwoStage, &job, &boards(), &touch_registry()).unwrap();
    assert!(render(&graph).unwrap().contains("export PART = p0\n"));
}

#[test]
fn unknown_board_is_a_config_error() {
    let job = JobFile::new("two_stage").option("board", "b9").load();
    let err = compile(&TwoStage, &job, &boards(), &touch_registry()).unwrap_err();
    assert!(matches!(err, FlowError::Config(_)));
}

#[test]
fn producer_rule_comes_first() {
    let job = JobFile::new("two_stage").load();
    let graph = compile(&TwoStage, &job, &boards(), &touch_registry()).unwrap();
    let text = render(&graph).unwrap();
    assert_eq!(rules(&text), vec!["blinky.a:", "blinky.b: blinky.a"]);
    assert!(text.contains("all: blinky.b\n"));
}

#[test]
fn branch_picks_nextpnr() {
    let job = JobFile::new("two_stage").option("pnr", "nextpnr").load();
    let graph = compile(&TwoStage, &job, &boards(), &touch_registry()).unwrap();
    let text = render(&graph).unwrap();
    assert_eq!(rules(&text), vec!["blinky.a:", "blinky.c: blinky.a"]);
}

#[test]
fn conflicting_environment_bindings() {
    let dir = tempfile::tempdir().unwrap();
    let job = JobFile::new("two_stage")
        .tool_option("yosys", "env", "NAME=foo")
        .tool_option("vpr", "env", "NAME=bar")
        .load();
    let err = configure_with(&TwoStage, &job, &boards(), &touch_registry(), dir.path()).unwrap_err();
    match err {
        FlowError::DuplicateBinding { name, first, second } => {
            assert_eq!(name, "NAME");
            assert_eq!(first, "yosys#0");
            assert_eq!(second, "vpr#1");
        }
        other => panic!("expected DuplicateBinding, got {other:?}"),
    }
    assert!(!dir.path().join("Makefile").exists());
}

#[test]
fn identical_bindings_are_accepted() {
    let job = JobFile::new("two_stage")
        .tool_option("yosys", "env", "NAME=foo")
        .tool_option("vpr", "env", "NAME=foo")
        .load();
    let graph = compile(&TwoStage, &job, &boards(), &touch_registry()).unwrap();
    let text = render(&graph).unwrap();
    assert_eq!(text.matches("export NAME = foo\n").count(), 1);
}

#[test]
fn options_for_unknown_tools_are_rejected() {
    let job = JobFile::new("two_stage")
        .tool_option("vivado", "jobs", 4_i64)
        .load();
    let err = compile(&TwoStage, &job, &boards(), &touch_registry()).unwrap_err();
    assert!(matches!(err, FlowError::UnsupportedVariant { what: "tool", .. }));
}

#[test]
fn rewrite_is_skipped_when_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let job = JobFile::new("two_stage").load();
    let (path, first) =
        configure_with(&TwoStage, &job, &boards(), &touch_registry(), dir.path()).unwrap();
    let (_, second) =
        configure_with(&TwoStage, &job, &boards(), &touch_registry(), dir.path()).unwrap();
    assert_eq!(first, WriteOutcome::Written);
    assert_eq!(second, WriteOutcome::Unchanged);
    assert!(std::fs::read_to_string(path).unwrap().ends_with("touch blinky.b\n"));
}
