//! CLI tests for `data-pipeline`.
//!
//! Spawns the binary and checks exit codes and the files each invocation
//! leaves behind.

use std::io::Write;
use std::process::{Command, Output, Stdio};

use data_pipeline::exit_codes;
use data_pipeline::io::setup::{ProjectPaths, SetupOptions, init_project};

fn pipeline(args: &[&str], stdin: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_data-pipeline"))
        .args(args)
        .env("RUST_LOG", "info")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn data-pipeline");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(stdin.as_bytes())
        .expect("write stdin");
    child.wait_with_output().expect("wait data-pipeline")
}

#[test]
fn setup_creates_config_and_subject_list() {
    let temp = tempfile::tempdir().expect("tempdir");
    let project = temp.path().to_string_lossy().to_string();

    let output = pipeline(&["--project", &project, "--setup"], "");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let paths = ProjectPaths::new(temp.path());
    assert!(paths.config_path.is_file());
    assert!(paths.subjects_path.is_file());
    assert!(paths.log_path.is_file());
}

#[test]
fn second_setup_needs_force() {
    let temp = tempfile::tempdir().expect("tempdir");
    let project = temp.path().to_string_lossy().to_string();
    init_project(temp.path(), &SetupOptions::default()).expect("init");

    let again = pipeline(&["--project", &project, "--setup"], "");
    assert_eq!(again.status.code(), Some(exit_codes::INVALID));

    let forced = pipeline(&["--project", &project, "--setup", "--force"], "");
    assert_eq!(forced.status.code(), Some(exit_codes::OK));
}

#[test]
fn nonexistent_project_is_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");
    let project = temp.path().join("missing").to_string_lossy().to_string();

    let output = pipeline(&["--project", &project], "");

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
}

#[test]
fn project_without_config_is_not_set_up() {
    let temp = tempfile::tempdir().expect("tempdir");
    let project = temp.path().to_string_lossy().to_string();

    let output = pipeline(&["--project", &project], "");

    assert_eq!(output.status.code(), Some(exit_codes::NOT_SET_UP));
    assert!(ProjectPaths::new(temp.path()).log_path.is_file());
}

#[test]
fn set_up_project_validates() {
    let temp = tempfile::tempdir().expect("tempdir");
    let project = temp.path().to_string_lossy().to_string();
    init_project(temp.path(), &SetupOptions::default()).expect("init");

    let output = pipeline(&["--project", &project], "");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
}

#[test]
fn configure_exit_leaves_datasets_alone() {
    let temp = tempfile::tempdir().expect("tempdir");
    let project = temp.path().to_string_lossy().to_string();
    init_project(temp.path(), &SetupOptions::default()).expect("init");

    let output = pipeline(&["--project", &project, "--configure"], "8\n");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert!(!temp.path().join("sourcedata").exists());
    assert!(!temp.path().join("bids").exists());
    let log = std::fs::read_to_string(ProjectPaths::new(temp.path()).log_path).expect("log");
    assert!(log.contains("configuration finished"));
}

#[test]
fn actions_are_mutually_exclusive() {
    let temp = tempfile::tempdir().expect("tempdir");
    let project = temp.path().to_string_lossy().to_string();

    let output = pipeline(&["--project", &project, "--run", "--sync"], "");

    assert_eq!(output.status.code(), Some(2));
    assert!(!ProjectPaths::new(temp.path()).log_path.exists());
}

#[test]
fn sync_without_rsync_section_fails() {
    let temp = tempfile::tempdir().expect("tempdir");
    let project = temp.path().to_string_lossy().to_string();
    init_project(temp.path(), &SetupOptions::default()).expect("init");

    let output = pipeline(&["--project", &project, "--sync"], "");

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
}
