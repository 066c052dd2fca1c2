//! BIDS dataset: installing the source dataset, conversion, procedures,
//! validation and the preview.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use crate::core::preview::{side_by_side, strip_link_targets, with_heading};
use crate::core::procedures::ActiveProcedures;
use crate::core::template::{Placeholders, render};
use crate::io::config::BidsConversionConfig;
use crate::io::dataset::DatasetTool;
use crate::io::process::{run_checked, run_command};
use crate::io::setup::ProjectPaths;
use crate::io::templates::{Template, copy_template};
use crate::source::STUDYSPEC;

/// Name under which the source dataset is installed in the BIDS dataset.
pub const INSTALL_NAME: &str = "sourcedata";

const VALIDATOR_CONFIG: &str = ".bids-validator-config.json";

/// Specification files converted for acquisition `acqid`.
pub fn spec_files(acqid: &str) -> Vec<PathBuf> {
    let install = Path::new(INSTALL_NAME);
    vec![install.join(STUDYSPEC), install.join(acqid).join(STUDYSPEC)]
}

pub struct BidsConversion<'a> {
    tool: &'a dyn DatasetTool,
    paths: &'a ProjectPaths,
    cfg: &'a BidsConversionConfig,
    dataset: PathBuf,
    anon_subject: String,
}

impl<'a> BidsConversion<'a> {
    pub fn new(
        tool: &'a dyn DatasetTool,
        paths: &'a ProjectPaths,
        cfg: &'a BidsConversionConfig,
        dataset: impl Into<PathBuf>,
        anon_subject: impl Into<String>,
    ) -> Self {
        Self {
            tool,
            paths,
            cfg,
            dataset: dataset.into(),
            anon_subject: anon_subject.into(),
        }
    }

    pub fn install_path(&self) -> PathBuf {
        self.dataset.join(INSTALL_NAME)
    }

    /// Converted data of the current subject.
    pub fn subject_dir(&self) -> PathBuf {
        self.dataset.join(format!("sub-{}", self.anon_subject))
    }

    /// Install `source` as `sourcedata`, or update it when already installed.
    #[instrument(skip_all)]
    pub fn install_source_dataset(&self, source: &Path) -> Result<()> {
        let install = self.install_path();
        if is_non_empty_dir(&install)? {
            info!("source dataset already installed, update it");
            return self.tool.update(&self.dataset, Path::new(INSTALL_NAME));
        }
        self.tool
            .install(&self.dataset, source, Path::new(INSTALL_NAME))
    }

    pub fn convert(&self, specs: &[PathBuf]) -> Result<()> {
        info!("convert to BIDS based on study specification");
        self.tool
            .spec2bids(&self.dataset, specs)
            .context("convert to BIDS")
    }

    /// Run every active procedure; `{{ anon_subject }}` in the parameters is
    /// replaced.
    pub fn run_procedures(&self, active: &ActiveProcedures) -> Result<()> {
        for (name, params) in active {
            let parameters = render(
                &params.parameters,
                &Placeholders {
                    anon_subject: Some(&self.anon_subject),
                    ..Placeholders::default()
                },
            )?;
            let mut spec = vec![name.clone()];
            spec.extend(parameters.split_whitespace().map(str::to_string));
            info!(procedure = %spec.join(" "), "execute procedure");
            self.tool
                .run_procedure(&self.dataset, &spec)
                .with_context(|| format!("procedure {name}"))?;
        }
        Ok(())
    }

    fn container_dir(&self) -> PathBuf {
        let dir = crate::io::setup::expand_home(&self.cfg.container_dir);
        if dir.is_absolute() {
            dir
        } else {
            self.dataset.join(dir)
        }
    }

    /// Validate the dataset in the validator container.
    ///
    /// Returns whether the dataset passed. A failing validation is logged,
    /// not raised.
    #[instrument(skip_all)]
    pub fn run_bids_validator(&self) -> Result<bool> {
        let container_dir = self.container_dir();
        fs::create_dir_all(&container_dir)
            .with_context(|| format!("create container directory {}", container_dir.display()))?;

        let template = Template::resolve(&self.cfg.validator_config_template, self.paths)?;
        copy_template(&template, &self.dataset.join(VALIDATOR_CONFIG))?;

        let name = &self.cfg.validator_container_name;
        let container = container_dir.join(name);
        if !container.exists() {
            info!(image = %self.cfg.validator_image_url, "pull validator container");
            let mut pull = Command::new(&self.cfg.container_runtime);
            pull.args(["pull", "--name", name.as_str(), self.cfg.validator_image_url.as_str()])
                .env("SINGULARITY_PULLFOLDER", &container_dir)
                .current_dir(&container_dir);
            run_checked(pull).context("pull validator container")?;
        }

        let mut validate = Command::new(&self.cfg.container_runtime);
        validate
            .args(["run", "--no-home", "--containall", "--bind"])
            .arg(format!("{}:/data", self.dataset.display()))
            .arg(&container)
            .arg("/data")
            .current_dir(&self.dataset);
        let output = run_command(validate)?;
        let report = output.stdout_lossy();
        if output.success() {
            info!("BIDS validation passed\n{}", report.trim_end());
        } else {
            warn!(
                exit_code = ?output.status.code(),
                "BIDS validation failed\n{}{}",
                report.trim_end(),
                output.stderr_lossy().trim_end()
            );
        }
        Ok(output.success())
    }

    /// Convert the configuration acquisition and log source and result side
    /// by side.
    #[instrument(skip_all)]
    pub fn generate_preview(&self, source: &Path, active: &ActiveProcedures) -> Result<()> {
        self.install_source_dataset(source)?;

        let acqid = &self.cfg.config_acqid;
        if !self.install_path().join(acqid).exists() {
            warn!("no dataset was imported, nothing to convert");
            return Ok(());
        }

        let subject_dir = self.subject_dir();
        if subject_dir.exists() {
            info!(dir = %subject_dir.display(), "remove previous conversion");
            fs::remove_dir_all(&subject_dir)
                .with_context(|| format!("remove {}", subject_dir.display()))?;
        }

        self.convert(&spec_files(acqid))?;
        self.run_procedures(active)?;

        let dicoms = self.install_path().join(acqid).join("dicoms");
        let source_tree = with_heading(tree(&dicoms, true)?, "source:");
        let result_tree = with_heading(tree(&subject_dir, false)?, "result:");
        info!("Preview:\n{}", side_by_side(&source_tree, &result_tree));
        Ok(())
    }

    /// Uninstall `sourcedata` and remove the converted subject.
    pub fn cleanup(&self) -> Result<()> {
        if self.install_path().exists() {
            self.tool
                .uninstall(&self.dataset, Path::new(INSTALL_NAME))?;
        }
        let subject_dir = self.subject_dir();
        if subject_dir.exists() {
            info!(dir = %subject_dir.display(), "remove converted data");
            fs::remove_dir_all(&subject_dir)
                .with_context(|| format!("remove {}", subject_dir.display()))?;
        }
        Ok(())
    }
}

fn is_non_empty_dir(path: &Path) -> Result<bool> {
    if !path.is_dir() {
        return Ok(false);
    }
    let mut entries =
        fs::read_dir(path).with_context(|| format!("read directory {}", path.display()))?;
    Ok(entries.next().is_some())
}

fn tree(path: &Path, dirs_only: bool) -> Result<Vec<String>> {
    let mut cmd = Command::new("tree");
    if dirs_only {
        cmd.arg("-d");
    }
    cmd.arg(path);
    let output = run_checked(cmd)?;
    Ok(strip_link_targets(&output.stdout_lossy()))
}
