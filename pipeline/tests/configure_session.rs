//! Interactive configuration sessions driven by a scripted prompter.
//!
//! Datasets are plain git repositories and the dataset tool is the recording
//! fake from `test_support`, so only branch handling runs real commands.

use std::fs;
use std::path::Path;

use data_pipeline::configure::configure;
use data_pipeline::error::{PipelineError, classify};
use data_pipeline::io::dataset::{DatasetTool, RULES_KEY};
use data_pipeline::io::session_state::load_session_state;
use data_pipeline::repo_flow::CONFIG_BRANCH;
use data_pipeline::test_support::{FakeDatasetTool, TestProject, git, scripted_prompter};

fn current_branch(dataset: &Path) -> String {
    git(dataset, &["branch", "--show-current"]).expect("git branch")
}

#[test]
fn exit_right_away_touches_nothing() {
    let project = TestProject::new().expect("project");
    let tool = FakeDatasetTool::default();
    let mut prompter = scripted_prompter("8\n");

    configure(
        &project.paths,
        &project.config().expect("config"),
        &tool,
        &mut prompter,
    )
    .expect("configure");

    assert!(tool.calls().is_empty());
    assert!(!project.root().join("sourcedata").exists());
    assert!(!project.root().join("bids").exists());
    assert!(!project.paths.session_path.exists());
}

#[test]
fn help_then_end_of_input_ends_the_session() {
    let project = TestProject::new().expect("project");
    let tool = FakeDatasetTool::default();
    let mut prompter = scripted_prompter("7\n");

    configure(
        &project.paths,
        &project.config().expect("config"),
        &tool,
        &mut prompter,
    )
    .expect("configure");

    assert!(tool.calls().is_empty());
}

#[test]
fn missing_datasets_are_created_on_first_action() {
    let project = TestProject::new().expect("project");
    let tool = FakeDatasetTool::default();
    // The fake `create` does not make a git repository, so opening the
    // configuration branch fails after both datasets were created.
    let mut prompter = scripted_prompter("1\nscan.tar.gz\n8\n");

    let err = configure(
        &project.paths,
        &project.config().expect("config"),
        &tool,
        &mut prompter,
    )
    .unwrap_err();

    assert!(format!("{err:#}").contains("git"), "{err:#}");
    assert_eq!(tool.calls_to("create").len(), 2);
    assert!(
        tool.calls()
            .iter()
            .any(|call| call.starts_with("run-procedure") && call.ends_with("cfg_hirni"))
    );
}

#[test]
fn import_and_rule_are_committed_on_starting_branch() {
    let project = TestProject::new().expect("project");
    let source = project.git_dataset("sourcedata").expect("source");
    project.git_dataset("bids").expect("bids");
    let start = current_branch(&source);
    fs::write(project.root().join("scan.tar.gz"), "tar").expect("write tarball");
    let tool = FakeDatasetTool::default();
    let mut prompter = scripted_prompter("1\nscan.tar.gz\n2\n1\n8\n");

    configure(
        &project.paths,
        &project.config().expect("config"),
        &tool,
        &mut prompter,
    )
    .expect("configure");

    assert_eq!(current_branch(&source), start);
    assert!(
        !git(&source, &["branch", "--list", CONFIG_BRANCH])
            .expect("git")
            .is_empty()
    );
    assert_eq!(tool.calls_to("import").len(), 1);
    assert_eq!(tool.calls_to("dicom2spec").len(), 1);
    assert!(source.join("code/custom_rules/custom_rules.py").is_file());
    assert!(source.join("code/custom_rules/rules_base.py").is_file());
    assert_eq!(
        tool.config_get(&source, RULES_KEY).expect("config"),
        Some("code/custom_rules/custom_rules.py".to_string())
    );
    let saves = tool.calls_to("save");
    assert!(
        saves
            .iter()
            .any(|call| call.contains("custom_rules.py") && call.ends_with("--to-git")),
        "{saves:?}"
    );
    let state = load_session_state(&project.paths.session_path).expect("state");
    assert_eq!(state.starting_branch, None);
}

#[test]
fn conflicting_rule_is_overwritten_after_confirmation() {
    let project = TestProject::new().expect("project");
    let source = project.git_dataset("sourcedata").expect("source");
    project.git_dataset("bids").expect("bids");
    let tool = FakeDatasetTool::default();
    tool.set_config(&source, RULES_KEY, "code/other/rules.py");
    let mut prompter = scripted_prompter("2\n1\ny\n8\n");

    configure(
        &project.paths,
        &project.config().expect("config"),
        &tool,
        &mut prompter,
    )
    .expect("configure");

    assert_eq!(
        tool.config_get(&source, RULES_KEY).expect("config"),
        Some("code/custom_rules/custom_rules.py".to_string())
    );
    assert_eq!(tool.calls_to("dicom2spec").len(), 1);
}

#[test]
fn declined_overwrite_keeps_registered_rule() {
    let project = TestProject::new().expect("project");
    let source = project.git_dataset("sourcedata").expect("source");
    project.git_dataset("bids").expect("bids");
    let tool = FakeDatasetTool::default();
    tool.set_config(&source, RULES_KEY, "code/other/rules.py");
    let mut prompter = scripted_prompter("2\n1\nn\n8\n");

    configure(
        &project.paths,
        &project.config().expect("config"),
        &tool,
        &mut prompter,
    )
    .expect("configure");

    assert_eq!(
        tool.config_get(&source, RULES_KEY).expect("config"),
        Some("code/other/rules.py".to_string())
    );
    assert!(tool.calls_to("config").is_empty());
    assert!(tool.calls_to("dicom2spec").is_empty());
}

#[test]
fn usage_error_shows_the_menu_again() {
    let project = TestProject::new().expect("project");
    let source = project.git_dataset("sourcedata").expect("source");
    project.git_dataset("bids").expect("bids");
    let start = current_branch(&source);
    let tool = FakeDatasetTool::default();
    let mut prompter = scripted_prompter("1\nmissing.tar.gz\n8\n");

    configure(
        &project.paths,
        &project.config().expect("config"),
        &tool,
        &mut prompter,
    )
    .expect("configure");

    assert!(tool.calls_to("import").is_empty());
    assert_eq!(current_branch(&source), start);
}

#[test]
fn failing_tool_aborts_on_starting_branch() {
    let project = TestProject::new().expect("project");
    let source = project.git_dataset("sourcedata").expect("source");
    project.git_dataset("bids").expect("bids");
    let start = current_branch(&source);
    fs::write(project.root().join("scan.tar.gz"), "tar").expect("write tarball");
    let tool = FakeDatasetTool::failing_on("import");
    let mut prompter = scripted_prompter("1\nscan.tar.gz\n8\n");

    let err = configure(
        &project.paths,
        &project.config().expect("config"),
        &tool,
        &mut prompter,
    )
    .unwrap_err();

    assert!(matches!(classify(&err), Some(PipelineError::Command { .. })));
    assert_eq!(current_branch(&source), start);
}
