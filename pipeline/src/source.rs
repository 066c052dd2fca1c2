//! Source dataset: DICOM import, rule registration and the study
//! specification.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use crate::core::registration::decide;
use crate::core::spec::{parse_spec, render_spec, retain_sentinels};
use crate::error::PipelineError;
use crate::io::config::BidsConversionConfig;
use crate::io::dataset::{DatasetTool, RULES_KEY, RemoveMode};
use crate::io::prompt::Prompter;
use crate::io::setup::{ProjectPaths, expand_home};
use crate::io::templates::{Template, copy_template, replace_with_template};
use crate::repo_flow::ConfigRepo;

pub const STUDYSPEC: &str = "studyspec.json";

/// Import `tarball` into `dataset` as acquisition `acqid`.
#[instrument(skip_all, fields(acqid = %acqid))]
pub fn import_data(
    tool: &dyn DatasetTool,
    dataset: &Path,
    tarball: &Path,
    anon_subject: &str,
    acqid: &str,
) -> Result<()> {
    let tarball = expand_home(tarball);
    if !tarball.is_file() {
        return Err(PipelineError::usage(format!(
            "tarball {} does not exist",
            tarball.display()
        ))
        .into());
    }
    let tarball = tarball
        .canonicalize()
        .with_context(|| format!("resolve {}", tarball.display()))?;
    info!(tarball = %tarball.display(), anon_subject, acqid, "import");
    tool.import_dicoms(dataset, &tarball, anon_subject, acqid)
        .with_context(|| format!("import {}", tarball.display()))
}

/// Fetch the converter container so it is not re-fetched after an uninstall.
pub fn fetch_converter_container(
    tool: &dyn DatasetTool,
    dataset: &Path,
    cfg: &BidsConversionConfig,
) -> Result<()> {
    tool.get(dataset, &cfg.converter_container)
        .context("fetch converter container")
}

/// The source dataset while configuring rules.
pub struct SourceConfiguration<'a> {
    tool: &'a dyn DatasetTool,
    paths: &'a ProjectPaths,
    cfg: &'a BidsConversionConfig,
    dataset: PathBuf,
}

impl<'a> SourceConfiguration<'a> {
    pub fn new(
        tool: &'a dyn DatasetTool,
        paths: &'a ProjectPaths,
        cfg: &'a BidsConversionConfig,
        dataset: impl Into<PathBuf>,
    ) -> Self {
        Self {
            tool,
            paths,
            cfg,
            dataset: dataset.into(),
        }
    }

    pub fn dataset(&self) -> &Path {
        &self.dataset
    }

    /// Study specification of the configuration acquisition, relative to the
    /// dataset.
    pub fn spec_file(&self) -> PathBuf {
        Path::new(&self.cfg.config_acqid).join(STUDYSPEC)
    }

    /// Import `tarball` (relative to the project) as the configuration
    /// acquisition.
    pub fn import_data(&self, tarball: &Path) -> Result<()> {
        import_data(
            self.tool,
            &self.dataset,
            &self.paths.resolve(tarball),
            &self.cfg.config_anon_subject,
            &self.cfg.config_acqid,
        )
    }

    pub fn fetch_converter_container(&self) -> Result<()> {
        fetch_converter_container(self.tool, &self.dataset, self.cfg)
    }

    /// Register the configured rule file, let the user edit it and
    /// regenerate the study specification.
    pub fn register_rule(&self, prompter: &mut dyn Prompter, overwrite: bool) -> Result<()> {
        let template = Template::resolve(&self.cfg.rule_template, self.paths)?;
        self.register_rule_file(overwrite)?;
        let rule_file = self.dataset.join(self.cfg.rule_file());
        copy_template(&template, &rule_file)?;
        prompter.edit(&rule_file)?;
        self.create_studyspec()
    }

    /// Register the configured rule file with the content of `rule`.
    ///
    /// An existing rule file is replaced once the registration succeeded.
    pub fn import_rule(&self, rule: &Path, overwrite: bool) -> Result<()> {
        let rule = self.paths.resolve(rule);
        if !rule.is_file() {
            return Err(
                PipelineError::usage(format!("rule {} does not exist", rule.display())).into(),
            );
        }
        self.register_rule_file(overwrite)?;
        let target = self.dataset.join(self.cfg.rule_file());
        if target.exists() {
            warn!(target = %target.display(), "replacing existing rule");
        }
        replace_with_template(&Template::File(rule), &target)?;
        self.create_studyspec()
    }

    /// Register the rule file, reset the study specification and provide
    /// `rules_base.py`. The rule file itself is left to the caller.
    fn register_rule_file(&self, overwrite: bool) -> Result<()> {
        let rule_file = self.cfg.rule_file();
        let registered = self.tool.config_get(&self.dataset, RULES_KEY)?.map(PathBuf::from);
        let registration = decide("rule file", registered.as_deref(), &rule_file, overwrite)?;

        self.reset_studyspec()?;

        if registration.needs_write() {
            info!(rule = %rule_file.display(), ?registration, "register rule");
            self.tool
                .config_set(&self.dataset, RULES_KEY, &rule_file.to_string_lossy())?;
        }

        let rule_dir = self.dataset.join(&self.cfg.rule_dir);
        fs::create_dir_all(&rule_dir)
            .with_context(|| format!("create rule directory {}", rule_dir.display()))?;
        copy_template(&Template::rules_base(), &rule_dir.join("rules_base.py"))?;
        Ok(())
    }

    /// Keep only `dicomseries:all` entries so the next rule run starts from
    /// the same state. A missing file is left alone.
    pub fn reset_studyspec(&self) -> Result<()> {
        reset_studyspec(self.tool, &self.dataset, &self.spec_file())
    }

    fn create_studyspec(&self) -> Result<()> {
        info!("generate study specification");
        let dicoms = Path::new(&self.cfg.config_acqid).join("dicoms");
        self.tool
            .dicom2spec(&self.dataset, &dicoms, &self.spec_file())
            .context("generate study specification")
    }

    /// Remove the imported acquisition and the configuration branch.
    pub fn cleanup(&self, repo: &ConfigRepo<'_>) -> Result<()> {
        let acquisition = Path::new(&self.cfg.config_acqid);
        if self.dataset.join(acquisition).exists() {
            info!(path = %self.dataset.join(acquisition).display(), "remove imported acquisition");
            self.tool
                .remove(&self.dataset, Some(acquisition), RemoveMode::Checked)?;
        }
        repo.checkout_starting_branch()?;
        repo.remove_config_branch()
    }
}

/// Reset the specification file `spec` (relative to `dataset`).
pub fn reset_studyspec(tool: &dyn DatasetTool, dataset: &Path, spec: &Path) -> Result<()> {
    let path = dataset.join(spec);
    if !path.exists() {
        return Ok(());
    }
    let contents =
        fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let entries = parse_spec(&contents).with_context(|| format!("parse {}", path.display()))?;
    let total = entries.len();
    let kept = retain_sentinels(entries);
    info!(kept = kept.len(), dropped = total - kept.len(), "reset study specification");
    fs::write(&path, render_spec(&kept)).with_context(|| format!("write {}", path.display()))?;
    tool.save(dataset, spec, "Reset studyspec file", false)
}
