//! Dataset tool abstraction.
//!
//! The [`DatasetTool`] trait decouples orchestration from the versioned
//! dataset backend (currently the `datalad` CLI with the `hirni` extension).
//! Tests use a recording fake that never spawns processes.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::Result;
use tracing::{info, instrument};

use crate::io::git::Git;
use crate::io::process::run_checked;

/// Dataset configuration key holding the dicom2spec rule file.
pub const RULES_KEY: &str = "datalad.hirni.dicom2spec.rules";
/// Dataset configuration key holding the dataset procedure directory.
pub const PROCEDURES_KEY: &str = "datalad.locations.dataset-procedures";

/// How careful a removal should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveMode {
    /// Only remove content that is available elsewhere.
    Checked,
    /// Remove without availability checks (cleanup of broken state).
    Reckless,
}

/// Operations the pipeline needs from the versioned dataset tool.
pub trait DatasetTool {
    /// Create a new dataset at `path`.
    fn create(&self, path: &Path) -> Result<()>;

    /// Run a procedure (`name` followed by its arguments) in `dataset`.
    fn run_procedure(&self, dataset: &Path, spec: &[String]) -> Result<()>;

    /// Raw `run-procedure --discover` listing for `dataset`.
    fn discover_procedures(&self, dataset: &Path) -> Result<String>;

    /// Install `source` as subdataset `path` of `dataset` (recursive).
    fn install(&self, dataset: &Path, source: &Path, path: &Path) -> Result<()>;

    /// Update and merge subdataset `path` of `dataset` (recursive).
    fn update(&self, dataset: &Path, path: &Path) -> Result<()>;

    /// Fetch file content for `path`.
    fn get(&self, dataset: &Path, path: &Path) -> Result<()>;

    /// Record the state of `path` in `dataset`.
    fn save(&self, dataset: &Path, path: &Path, message: &str, to_git: bool) -> Result<()>;

    /// Remove `path` from `dataset`, or the whole dataset when `path` is `None`.
    fn remove(&self, dataset: &Path, path: Option<&Path>, mode: RemoveMode) -> Result<()>;

    /// Drop and uninstall subdataset `path`.
    fn uninstall(&self, dataset: &Path, path: &Path) -> Result<()>;

    /// Import a DICOM tarball as acquisition `acqid`.
    fn import_dicoms(
        &self,
        dataset: &Path,
        tarball: &Path,
        anon_subject: &str,
        acqid: &str,
    ) -> Result<()>;

    /// Generate specification entries for the DICOMs below `dicoms`.
    fn dicom2spec(&self, dataset: &Path, dicoms: &Path, spec: &Path) -> Result<()>;

    /// Convert to BIDS based on the given specification files.
    fn spec2bids(&self, dataset: &Path, specs: &[PathBuf]) -> Result<()>;

    /// Read a key from the dataset configuration.
    fn config_get(&self, dataset: &Path, key: &str) -> Result<Option<String>>;

    /// Write a key to the dataset configuration (committed with the dataset).
    fn config_set(&self, dataset: &Path, key: &str, value: &str) -> Result<()>;
}

/// [`DatasetTool`] backed by the `datalad` command line.
#[derive(Debug, Clone)]
pub struct Datalad {
    program: String,
}

impl Default for Datalad {
    fn default() -> Self {
        Self {
            program: "datalad".to_string(),
        }
    }
}

impl Datalad {
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self, workdir: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.current_dir(workdir);
        cmd
    }

    fn config_file(dataset: &Path) -> PathBuf {
        dataset.join(".datalad").join("config")
    }
}

impl DatasetTool for Datalad {
    #[instrument(skip_all, fields(path = %path.display()))]
    fn create(&self, path: &Path) -> Result<()> {
        let workdir = path.parent().unwrap_or(Path::new("."));
        let mut cmd = self.command(workdir);
        cmd.arg("create").arg(path);
        run_checked(cmd)?;
        Ok(())
    }

    #[instrument(skip_all, fields(dataset = %dataset.display()))]
    fn run_procedure(&self, dataset: &Path, spec: &[String]) -> Result<()> {
        info!(procedure = %spec.join(" "), "run procedure");
        let mut cmd = self.command(dataset);
        cmd.args(["run-procedure", "-d"]).arg(dataset).args(spec);
        run_checked(cmd)?;
        Ok(())
    }

    fn discover_procedures(&self, dataset: &Path) -> Result<String> {
        let mut cmd = self.command(dataset);
        cmd.args(["run-procedure", "--discover", "-d"]).arg(dataset);
        Ok(run_checked(cmd)?.stdout_lossy())
    }

    #[instrument(skip_all, fields(dataset = %dataset.display()))]
    fn install(&self, dataset: &Path, source: &Path, path: &Path) -> Result<()> {
        let mut cmd = self.command(dataset);
        cmd.args(["install", "--dataset"])
            .arg(dataset)
            .arg("--source")
            .arg(source)
            .arg(path)
            .arg("--recursive");
        run_checked(cmd)?;
        Ok(())
    }

    #[instrument(skip_all, fields(dataset = %dataset.display()))]
    fn update(&self, dataset: &Path, path: &Path) -> Result<()> {
        let mut cmd = self.command(dataset);
        cmd.args(["update", "--how", "merge", "--recursive", "--dataset"])
            .arg(dataset)
            .arg(path);
        run_checked(cmd)?;
        Ok(())
    }

    fn get(&self, dataset: &Path, path: &Path) -> Result<()> {
        let mut cmd = self.command(dataset);
        cmd.args(["get", "--dataset"]).arg(dataset).arg(path);
        run_checked(cmd)?;
        Ok(())
    }

    fn save(&self, dataset: &Path, path: &Path, message: &str, to_git: bool) -> Result<()> {
        let mut cmd = self.command(dataset);
        cmd.args(["save", "--dataset"])
            .arg(dataset)
            .args(["--message", message]);
        if to_git {
            cmd.arg("--to-git");
        }
        cmd.arg(path);
        run_checked(cmd)?;
        Ok(())
    }

    #[instrument(skip_all, fields(dataset = %dataset.display()))]
    fn remove(&self, dataset: &Path, path: Option<&Path>, mode: RemoveMode) -> Result<()> {
        let workdir = match path {
            Some(_) => dataset,
            None => dataset.parent().unwrap_or(Path::new(".")),
        };
        let mut cmd = self.command(workdir);
        cmd.args(["remove", "--recursive", "--dataset"]).arg(dataset);
        if mode == RemoveMode::Reckless {
            cmd.args(["--reckless", "kill"]);
        }
        if let Some(path) = path {
            cmd.arg(path);
        }
        run_checked(cmd)?;
        Ok(())
    }

    fn uninstall(&self, dataset: &Path, path: &Path) -> Result<()> {
        let mut cmd = self.command(dataset);
        cmd.args(["drop", "--what", "all", "--recursive", "--dataset"])
            .arg(dataset)
            .arg(path);
        run_checked(cmd)?;
        Ok(())
    }

    #[instrument(skip_all, fields(dataset = %dataset.display(), acqid))]
    fn import_dicoms(
        &self,
        dataset: &Path,
        tarball: &Path,
        anon_subject: &str,
        acqid: &str,
    ) -> Result<()> {
        let mut cmd = self.command(dataset);
        cmd.args(["hirni-import-dcm", "--dataset"])
            .arg(dataset)
            .args(["--anon-subject", anon_subject])
            .arg(tarball)
            .arg(acqid);
        run_checked(cmd)?;
        Ok(())
    }

    fn dicom2spec(&self, dataset: &Path, dicoms: &Path, spec: &Path) -> Result<()> {
        let mut cmd = self.command(dataset);
        cmd.args(["hirni-dicom2spec", "--dataset"])
            .arg(dataset)
            .arg("--spec")
            .arg(spec)
            .arg(dicoms);
        run_checked(cmd)?;
        Ok(())
    }

    fn spec2bids(&self, dataset: &Path, specs: &[PathBuf]) -> Result<()> {
        let mut cmd = self.command(dataset);
        cmd.args(["hirni-spec2bids", "--anonymize", "--dataset"])
            .arg(dataset)
            .args(specs);
        run_checked(cmd)?;
        Ok(())
    }

    fn config_get(&self, dataset: &Path, key: &str) -> Result<Option<String>> {
        Git::new(dataset).config_file_get(&Self::config_file(dataset), key)
    }

    fn config_set(&self, dataset: &Path, key: &str, value: &str) -> Result<()> {
        Git::new(dataset).config_file_set(&Self::config_file(dataset), key, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn config_round_trips_through_dataset_config_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(temp.path().join(".datalad")).expect("mkdir");
        let tool = Datalad::default();

        assert_eq!(tool.config_get(temp.path(), RULES_KEY).expect("get"), None);
        tool.config_set(temp.path(), RULES_KEY, "code/custom_rules/custom_rules.py")
            .expect("set");
        assert_eq!(
            tool.config_get(temp.path(), RULES_KEY).expect("get").as_deref(),
            Some("code/custom_rules/custom_rules.py")
        );
        let raw = fs::read_to_string(temp.path().join(".datalad/config")).expect("read");
        assert!(raw.contains("[datalad \"hirni.dicom2spec\"]"), "{raw}");
    }

    #[test]
    fn missing_program_is_reported() {
        let temp = tempfile::tempdir().expect("tempdir");
        let tool = Datalad::with_program("datalad-not-installed-4711");
        let err = tool.create(&temp.path().join("ds")).unwrap_err();
        assert!(err.to_string().contains("spawn datalad-not-installed-4711"));
    }
}
