//! Project validation (the default action without flags).

use anyhow::Result;
use tracing::info;

use crate::io::config::ConfigHandler;
use crate::io::setup::ProjectPaths;
use crate::io::subjects::SubjectList;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectStatus {
    Valid,
    NotSetUp,
}

/// Check that the project is set up and its configuration and subject list
/// are valid.
pub fn validate_project(paths: &ProjectPaths, config: &ConfigHandler) -> Result<ProjectStatus> {
    if !paths.is_set_up() {
        return Ok(ProjectStatus::NotSetUp);
    }
    config.load()?;
    let subject_file: String = config.module("subject_file")?;
    let subjects = SubjectList::load(&paths.resolve(&subject_file))?;
    info!(
        config = %paths.config_path.display(),
        subjects = subjects.subjects.len(),
        "project is valid"
    );
    Ok(ProjectStatus::Valid)
}
