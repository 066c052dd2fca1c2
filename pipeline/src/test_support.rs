//! Test helpers: temporary projects, a recording dataset tool and scripted
//! prompts.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, anyhow};
use tempfile::TempDir;

use crate::error::PipelineError;
use crate::io::config::{BIDS_CONVERSION, ConfigHandler, SUBJECT_FILE};
use crate::io::dataset::{DatasetTool, RemoveMode};
use crate::io::prompt::LinePrompter;
use crate::io::setup::{ProjectPaths, SetupOptions, init_project};

/// Initialize a git repository with one commit (`README.md`).
pub fn init_git_repo(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("create {}", path.display()))?;
    git(path, &["init", "-q"])?;
    git(path, &["config", "user.email", "test@example.org"])?;
    git(path, &["config", "user.name", "Test"])?;
    git(path, &["config", "commit.gpgsign", "false"])?;
    fs::write(path.join("README.md"), "# test\n").context("write README.md")?;
    git(path, &["add", "README.md"])?;
    git(path, &["commit", "-q", "-m", "initial"])?;
    Ok(())
}

/// Run git in `path`, failing on a non-zero exit.
pub fn git(path: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(path)
        .output()
        .context("spawn git")?;
    if !output.status.success() {
        return Err(anyhow!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr)
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Line prompter fed from `script`; the editor is `true`.
pub fn scripted_prompter(script: &str) -> LinePrompter<Cursor<Vec<u8>>, Vec<u8>> {
    LinePrompter::new(Cursor::new(script.as_bytes().to_vec()), Vec::new()).with_editor("true")
}

/// A project directory with the shipped configuration.
pub struct TestProject {
    _temp: TempDir,
    pub paths: ProjectPaths,
}

impl TestProject {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir().context("tempdir")?;
        let root = temp.path().canonicalize().context("canonicalize tempdir")?;
        let paths = init_project(&root, &SetupOptions::default())?;
        Ok(Self { _temp: temp, paths })
    }

    pub fn root(&self) -> &Path {
        &self.paths.root
    }

    pub fn config(&self) -> Result<ConfigHandler> {
        ConfigHandler::with_modules(&self.paths.config_path, &[BIDS_CONVERSION, SUBJECT_FILE])
    }

    /// Create `<root>/<name>` as a git repository, standing in for a dataset.
    pub fn git_dataset(&self, name: &str) -> Result<PathBuf> {
        let path = self.root().join(name);
        init_git_repo(&path)?;
        fs::create_dir_all(path.join(".datalad")).context("create .datalad")?;
        Ok(path)
    }
}

/// [`DatasetTool`] that records calls instead of spawning processes.
///
/// `create` makes the directory and `remove` of a whole dataset deletes it;
/// dataset configuration is kept in memory.
#[derive(Debug, Default)]
pub struct FakeDatasetTool {
    calls: RefCell<Vec<String>>,
    config: RefCell<BTreeMap<(PathBuf, String), String>>,
    discover_output: String,
    fail_on: Option<&'static str>,
}

impl FakeDatasetTool {
    /// Every call whose name starts with `operation` fails with a command
    /// error (after being recorded).
    pub fn failing_on(operation: &'static str) -> Self {
        Self {
            fail_on: Some(operation),
            ..Self::default()
        }
    }

    pub fn with_discover_output(mut self, output: impl Into<String>) -> Self {
        self.discover_output = output.into();
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    /// Calls starting with `operation`.
    pub fn calls_to(&self, operation: &str) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter(|call| call.starts_with(operation))
            .cloned()
            .collect()
    }

    pub fn set_config(&self, dataset: &Path, key: &str, value: &str) {
        self.config
            .borrow_mut()
            .insert((dataset.to_path_buf(), key.to_string()), value.to_string());
    }

    fn record(&self, call: String) -> Result<()> {
        let failing = self.fail_on.is_some_and(|op| call.starts_with(op));
        self.calls.borrow_mut().push(call.clone());
        if failing {
            return Err(PipelineError::Command {
                program: "datalad".to_string(),
                code: Some(1),
                stderr: format!("{call} failed"),
            }
            .into());
        }
        Ok(())
    }
}

fn show(path: &Path) -> String {
    path.display().to_string()
}

impl DatasetTool for FakeDatasetTool {
    fn create(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path.join(".datalad")).context("create fake dataset")?;
        self.record(format!("create {}", show(path)))
    }

    fn run_procedure(&self, dataset: &Path, spec: &[String]) -> Result<()> {
        self.record(format!("run-procedure {} {}", show(dataset), spec.join(" ")))
    }

    fn discover_procedures(&self, dataset: &Path) -> Result<String> {
        self.record(format!("discover {}", show(dataset)))?;
        Ok(self.discover_output.clone())
    }

    fn install(&self, dataset: &Path, source: &Path, path: &Path) -> Result<()> {
        self.record(format!(
            "install {} {} {}",
            show(dataset),
            show(source),
            show(path)
        ))?;
        fs::create_dir_all(dataset.join(path)).context("create fake subdataset")?;
        fs::write(dataset.join(path).join(".installed"), "").context("mark installed")?;
        Ok(())
    }

    fn update(&self, dataset: &Path, path: &Path) -> Result<()> {
        self.record(format!("update {} {}", show(dataset), show(path)))
    }

    fn get(&self, dataset: &Path, path: &Path) -> Result<()> {
        self.record(format!("get {} {}", show(dataset), show(path)))
    }

    fn save(&self, dataset: &Path, path: &Path, message: &str, to_git: bool) -> Result<()> {
        let to_git = if to_git { " --to-git" } else { "" };
        self.record(format!(
            "save {} {} '{message}'{to_git}",
            show(dataset),
            show(path)
        ))
    }

    fn remove(&self, dataset: &Path, path: Option<&Path>, mode: RemoveMode) -> Result<()> {
        let target = path.map(show).unwrap_or_default();
        self.record(format!("remove {} {target} {mode:?}", show(dataset)))?;
        let full = match path {
            Some(path) => dataset.join(path),
            None => dataset.to_path_buf(),
        };
        if full.exists() {
            fs::remove_dir_all(&full).context("remove fake dataset")?;
        }
        Ok(())
    }

    fn uninstall(&self, dataset: &Path, path: &Path) -> Result<()> {
        self.record(format!("uninstall {} {}", show(dataset), show(path)))?;
        let full = dataset.join(path);
        if full.exists() {
            fs::remove_dir_all(&full).context("uninstall fake subdataset")?;
        }
        Ok(())
    }

    fn import_dicoms(
        &self,
        dataset: &Path,
        tarball: &Path,
        anon_subject: &str,
        acqid: &str,
    ) -> Result<()> {
        self.record(format!(
            "import {} {} {anon_subject} {acqid}",
            show(dataset),
            show(tarball)
        ))?;
        fs::create_dir_all(dataset.join(acqid).join("dicoms")).context("create fake acquisition")?;
        Ok(())
    }

    fn dicom2spec(&self, dataset: &Path, dicoms: &Path, spec: &Path) -> Result<()> {
        self.record(format!(
            "dicom2spec {} {} {}",
            show(dataset),
            show(dicoms),
            show(spec)
        ))
    }

    fn spec2bids(&self, dataset: &Path, specs: &[PathBuf]) -> Result<()> {
        let specs: Vec<String> = specs.iter().map(|spec| show(spec)).collect();
        self.record(format!("spec2bids {} {}", show(dataset), specs.join(" ")))
    }

    fn config_get(&self, dataset: &Path, key: &str) -> Result<Option<String>> {
        Ok(self
            .config
            .borrow()
            .get(&(dataset.to_path_buf(), key.to_string()))
            .cloned())
    }

    fn config_set(&self, dataset: &Path, key: &str, value: &str) -> Result<()> {
        self.record(format!("config {} {key}={value}", show(dataset)))?;
        self.set_config(dataset, key, value);
        Ok(())
    }
}
