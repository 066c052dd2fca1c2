//! Post-processing procedures: creation, import, discovery and the active
//! set stored in the configuration.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::core::procedures::{
    ActiveProcedures, AvailableProcedure, ChangeReport, ProcedureKind, ProcedureParams, activate,
    deactivate, diff_selection, parse_discovery,
};
use crate::core::registration::decide;
use crate::error::PipelineError;
use crate::io::config::{BidsConversionConfig, ConfigHandler};
use crate::io::dataset::{DatasetTool, PROCEDURES_KEY};
use crate::io::prompt::{Choice, Prompter};
use crate::io::setup::ProjectPaths;
use crate::io::templates::{Template, copy_template};

const MODULE: &str = "bids_conversion";
const PARAMETER: &str = "active_procedures";

pub struct ProcedureHandling<'a> {
    tool: &'a dyn DatasetTool,
    paths: &'a ProjectPaths,
    config: &'a ConfigHandler,
    dataset: PathBuf,
}

impl<'a> ProcedureHandling<'a> {
    pub fn new(
        tool: &'a dyn DatasetTool,
        paths: &'a ProjectPaths,
        config: &'a ConfigHandler,
        dataset: impl Into<PathBuf>,
    ) -> Self {
        Self {
            tool,
            paths,
            config,
            dataset: dataset.into(),
        }
    }

    fn settings(&self) -> Result<BidsConversionConfig> {
        self.config.module(MODULE)
    }

    /// Procedures run after every conversion, with their parameters.
    pub fn active_procedures(&self) -> Result<ActiveProcedures> {
        Ok(self.settings()?.active_procedures)
    }

    pub fn activate_procedures(&self, requested: &ActiveProcedures) -> Result<ChangeReport> {
        if requested.is_empty() {
            warn!("no procedure chosen");
        }
        let mut active = self.active_procedures()?;
        let report = activate(&mut active, requested);
        for name in &report.skipped {
            info!(procedure = %name, "procedure is already active");
        }
        for name in &report.applied {
            info!(procedure = %name, "activate procedure");
        }
        self.store(&active, &report)?;
        Ok(report)
    }

    pub fn deactivate_procedures<S: AsRef<str>>(&self, names: &[S]) -> Result<ChangeReport> {
        if names.is_empty() {
            warn!("no procedure chosen");
        }
        let mut active = self.active_procedures()?;
        let report = deactivate(&mut active, names);
        for name in &report.skipped {
            info!(procedure = %name, "procedure is not active");
        }
        for name in &report.applied {
            info!(procedure = %name, "deactivate procedure");
        }
        self.store(&active, &report)?;
        Ok(report)
    }

    fn store(&self, active: &ActiveProcedures, report: &ChangeReport) -> Result<()> {
        if report.is_noop() {
            return Ok(());
        }
        let value = serde_json::to_value(active).context("serialize active procedures")?;
        self.config.update_parameter(MODULE, PARAMETER, value)
    }

    /// Procedures the dataset tool knows about.
    pub fn available_procedures(&self) -> Result<BTreeMap<String, AvailableProcedure>> {
        let output = self.tool.discover_procedures(&self.dataset)?;
        parse_discovery(&output)
    }

    /// Copy the template for `kind` to `<procedure dir>/<name>.<ext>` and open
    /// it in the editor.
    pub fn create_procedure(
        &self,
        prompter: &mut dyn Prompter,
        kind: ProcedureKind,
        name: &str,
        overwrite: bool,
    ) -> Result<()> {
        check_name(name)?;
        let settings = self.settings()?;
        let template = match kind {
            ProcedureKind::Shell => &settings.procedure_shell_template,
            ProcedureKind::Python => &settings.procedure_python_template,
        };
        let template = Template::resolve(template, self.paths)?;
        let proc_dir = self.prepare_procedure_dir(&settings, overwrite)?;

        let target = proc_dir.join(format!("{name}.{}", kind.extension()));
        if !copy_template(&template, &target)? {
            info!(target = %target.display(), "procedure exists, editing it");
        }
        prompter.edit(&target)
    }

    /// Copy `source` into the procedure directory as `name`, keeping the
    /// file extension. An existing procedure is never replaced.
    pub fn import_procedure(&self, source: &Path, name: &str, overwrite: bool) -> Result<()> {
        check_name(name)?;
        let source = self.paths.resolve(source);
        if !source.is_file() {
            return Err(PipelineError::usage(format!(
                "procedure {} does not exist",
                source.display()
            ))
            .into());
        }
        let settings = self.settings()?;
        let proc_dir = self.prepare_procedure_dir(&settings, overwrite).context(
            "import of procedure not possible since the procedure directory could not be registered",
        )?;

        let mut target = proc_dir.join(name);
        if let Some(extension) = source.extension() {
            target.set_extension(extension);
        }
        if target.exists() {
            return Err(
                PipelineError::usage(format!("procedure with the name {name} already exists")).into(),
            );
        }
        fs::copy(&source, &target)
            .with_context(|| format!("copy {} to {}", source.display(), target.display()))?;
        info!(target = %target.display(), "imported procedure");
        Ok(())
    }

    /// Ask which procedures should be active and apply the difference.
    pub fn change_active_procedures(&self, prompter: &mut dyn Prompter) -> Result<()> {
        let active = self.active_procedures()?;
        let mut names: Vec<String> = self.available_procedures()?.into_keys().collect();
        for name in active.keys() {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names.sort();
        let choices: Vec<Choice> = names
            .iter()
            .map(|name| Choice::new(name.clone(), active.contains_key(name)))
            .collect();

        let chosen = prompter.checkbox("Select active procedures", &choices)?;
        let diff = diff_selection(&active, &chosen);

        if !diff.to_activate.is_empty() {
            let mut requested = ActiveProcedures::new();
            for name in &diff.to_activate {
                let parameters =
                    if prompter.confirm(&format!("Does procedure {name} have parameters?"), false)? {
                        prompter.text("Parameters:", None)?
                    } else {
                        String::new()
                    };
                requested.insert(name.clone(), ProcedureParams::new(parameters));
            }
            self.activate_procedures(&requested)?;
        }
        if !diff.to_deactivate.is_empty() {
            self.deactivate_procedures(&diff.to_deactivate)?;
        }
        Ok(())
    }

    fn prepare_procedure_dir(
        &self,
        settings: &BidsConversionConfig,
        overwrite: bool,
    ) -> Result<PathBuf> {
        let relative = &settings.default_procedure_dir;
        self.register_procedure_dir(relative, overwrite)?;
        let proc_dir = self.dataset.join(relative);
        fs::create_dir_all(&proc_dir)
            .with_context(|| format!("create procedure directory {}", proc_dir.display()))?;
        Ok(proc_dir)
    }

    fn register_procedure_dir(&self, proc_dir: &Path, overwrite: bool) -> Result<()> {
        let registered = self
            .tool
            .config_get(&self.dataset, PROCEDURES_KEY)?
            .map(PathBuf::from);
        let registration = decide(
            "procedure directory",
            registered.as_deref(),
            proc_dir,
            overwrite,
        )?;
        if registration.needs_write() {
            info!(dir = %proc_dir.display(), ?registration, "register procedure directory");
            self.tool
                .config_set(&self.dataset, PROCEDURES_KEY, &proc_dir.to_string_lossy())?;
        }
        Ok(())
    }
}

fn check_name(name: &str) -> Result<()> {
    if name.trim().is_empty() || name.contains('/') {
        return Err(PipelineError::usage(format!("invalid procedure name '{name}'")).into());
    }
    Ok(())
}
