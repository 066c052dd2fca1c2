//! Project scaffolding for `data-pipeline --setup`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::error::PipelineError;

pub const CONFIG_TEMPLATE: &str = include_str!("../../templates/config_template.yaml");
pub const SUBJECTS_TEMPLATE: &str = include_str!("../../templates/subjects_template.yaml");

/// Canonical paths of a project directory.
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub config_path: PathBuf,
    pub subjects_path: PathBuf,
    pub log_path: PathBuf,
    pub state_dir: PathBuf,
    pub session_path: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let state_dir = root.join(".data_pipeline");
        Self {
            config_path: root.join("config.yaml"),
            subjects_path: root.join("subjects.yaml"),
            log_path: root.join("data_pipeline.log"),
            session_path: state_dir.join("session.json"),
            state_dir,
            root,
        }
    }

    /// Resolve a configured path: absolute paths are kept, `~` is expanded,
    /// everything else is relative to the project root.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = expand_home(path.as_ref());
        if path.is_absolute() {
            path
        } else {
            self.root.join(path)
        }
    }

    pub fn dataset(&self, name: &str) -> PathBuf {
        self.resolve(name)
    }

    pub fn is_set_up(&self) -> bool {
        self.config_path.is_file()
    }
}

/// Options for [`init_project`].
#[derive(Debug, Clone, Default)]
pub struct SetupOptions {
    /// Overwrite existing configuration files.
    pub force: bool,
}

/// Write `config.yaml` and `subjects.yaml` into `root`.
///
/// Fails with a usage error if either file exists unless `options.force`.
pub fn init_project(root: &Path, options: &SetupOptions) -> Result<ProjectPaths> {
    let paths = ProjectPaths::new(root);
    for path in [&paths.config_path, &paths.subjects_path] {
        if path.exists() && !options.force {
            return Err(PipelineError::usage(format!(
                "{} already exists (use --force to overwrite)",
                path.display()
            ))
            .into());
        }
    }

    write_file(&paths.config_path, CONFIG_TEMPLATE)?;
    write_file(&paths.subjects_path, SUBJECTS_TEMPLATE)?;
    info!(project = %root.display(), "project set up");
    Ok(paths)
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("write file {}", path.display()))
}
