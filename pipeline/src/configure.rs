//! Interactive configuration (`data-pipeline --configure`).
//!
//! Each round asks for an [`Action`], runs it on the configuration branch of
//! the source dataset, switches back to the starting branch and commits rule
//! and procedure changes there. Datasets are created on the first action
//! that needs them, so leaving the menu right away changes nothing.

use std::path::PathBuf;

use anyhow::Result;
use tracing::{error, info, warn};

use crate::bids::BidsConversion;
use crate::core::menu::{
    Action, HELP, ProcedureStep, RuleStep, Step, default_procedure_name, index_of, labels,
    procedure_kind_at, procedure_kind_labels,
};
use crate::error::{PipelineError, classify};
use crate::io::config::{BidsConversionConfig, ConfigHandler};
use crate::io::dataset::DatasetTool;
use crate::io::prompt::Prompter;
use crate::io::setup::ProjectPaths;
use crate::procedures::ProcedureHandling;
use crate::repo_flow::ConfigRepo;
use crate::setup::ensure_dataset;
use crate::source::SourceConfiguration;

/// Ask the question tree once and return the resulting action.
pub fn ask_action(prompter: &mut dyn Prompter) -> Result<Action> {
    let step = Step::ALL[prompter.select(
        "What do you want to do?",
        &labels(&Step::ALL, Step::label),
        index_of(&Step::ALL, &Step::DEFAULT),
    )?];
    match step {
        Step::ImportData => {
            let tarball = prompter.text("Path to the data tar ball:", None)?;
            if tarball.is_empty() {
                return Ok(Action::Return);
            }
            Ok(Action::ImportData {
                tarball: PathBuf::from(tarball),
            })
        }
        Step::Rule => ask_rule(prompter),
        Step::Procedure => ask_procedure(prompter),
        Step::Preview => Ok(Action::Preview),
        Step::Check => Ok(Action::Check),
        Step::Cleanup => Ok(Action::Cleanup),
        Step::Help => Ok(Action::Help),
        Step::Exit => Ok(Action::Exit),
    }
}

fn ask_rule(prompter: &mut dyn Prompter) -> Result<Action> {
    let step = RuleStep::ALL[prompter.select(
        "What do you want to do?",
        &labels(&RuleStep::ALL, RuleStep::label),
        index_of(&RuleStep::ALL, &RuleStep::DEFAULT),
    )?];
    match step {
        RuleStep::Create => Ok(Action::CreateRule),
        RuleStep::Import => {
            let path = prompter.text("Path to the rule:", None)?;
            if path.is_empty() {
                return Ok(Action::Return);
            }
            Ok(Action::ImportRule {
                path: PathBuf::from(path),
            })
        }
        RuleStep::Return => Ok(Action::Return),
    }
}

fn ask_procedure(prompter: &mut dyn Prompter) -> Result<Action> {
    let step = ProcedureStep::ALL[prompter.select(
        "What do you want to do?",
        &labels(&ProcedureStep::ALL, ProcedureStep::label),
        index_of(&ProcedureStep::ALL, &ProcedureStep::DEFAULT),
    )?];
    match step {
        ProcedureStep::Change => Ok(Action::ChangeProcedures),
        ProcedureStep::Create => {
            let kinds = procedure_kind_labels();
            let answer = prompter.select(
                "What type of procedure do you want to create?",
                &kinds,
                kinds.len() - 1,
            )?;
            let Some(kind) = procedure_kind_at(answer) else {
                return Ok(Action::Return);
            };
            let name = prompter.text("How should the procedure be called?", None)?;
            Ok(Action::CreateProcedure { kind, name })
        }
        ProcedureStep::Import => {
            let path = prompter.text("Path to the procedure:", None)?;
            if path.is_empty() {
                return Ok(Action::Return);
            }
            let path = PathBuf::from(path);
            let default = default_procedure_name(&path);
            let name = prompter.text("Name of the procedure:", Some(&default))?;
            Ok(Action::ImportProcedure { path, name })
        }
        ProcedureStep::Return => Ok(Action::Return),
    }
}

/// Run the interactive menu until the user exits or input ends.
pub fn configure(
    paths: &ProjectPaths,
    config: &ConfigHandler,
    tool: &dyn DatasetTool,
    prompter: &mut dyn Prompter,
) -> Result<()> {
    let mut session: Option<Session<'_>> = None;
    loop {
        let action = match ask_action(prompter) {
            Ok(action) => action,
            Err(err) if matches!(classify(&err), Some(PipelineError::InputClosed)) => Action::Exit,
            Err(err) => return Err(err),
        };
        match action {
            Action::Exit => break,
            Action::Return => continue,
            Action::Help => {
                info!("\n{HELP}");
                continue;
            }
            _ => {}
        }
        debug_assert!(action.touches_datasets());

        if session.is_none() {
            session = Some(Session::open(paths, config, tool)?);
        }
        if let Some(session) = &session
            && !session.round(&action, prompter)?
        {
            break;
        }
    }
    if let Some(session) = &session {
        session.repo.finish()?;
    }
    info!("configuration finished");
    Ok(())
}

/// Datasets and branch state, prepared on the first real action.
struct Session<'a> {
    paths: &'a ProjectPaths,
    config: &'a ConfigHandler,
    tool: &'a dyn DatasetTool,
    source: PathBuf,
    bids: PathBuf,
    repo: ConfigRepo<'a>,
}

impl<'a> Session<'a> {
    fn open(
        paths: &'a ProjectPaths,
        config: &'a ConfigHandler,
        tool: &'a dyn DatasetTool,
    ) -> Result<Self> {
        let cfg: BidsConversionConfig = config.module("bids_conversion")?;
        let source = ensure_dataset(tool, paths, &cfg.source)?;
        let bids = ensure_dataset(tool, paths, &cfg.bids)?;
        let repo = ConfigRepo::open(&source, tool, &paths.session_path)?;
        Ok(Self {
            paths,
            config,
            tool,
            source,
            bids,
            repo,
        })
    }

    /// One menu round. Returns `false` when the session should end.
    fn round(&self, action: &Action, prompter: &mut dyn Prompter) -> Result<bool> {
        let result = self
            .repo
            .checkout_config_branch()
            .and_then(|()| self.run_step(action, prompter));
        let restored = self
            .repo
            .checkout_starting_branch()
            .and_then(|()| self.repo.commit());

        let keep_going = match result {
            Ok(()) => true,
            Err(err) => match classify(&err) {
                Some(PipelineError::Usage(_) | PipelineError::Config(_)) => {
                    warn!("{err:#}");
                    true
                }
                Some(PipelineError::NotPossible(_)) => {
                    info!("{err:#}");
                    true
                }
                Some(PipelineError::InputClosed) => false,
                _ => {
                    error!("{err:#}");
                    restored?;
                    return Err(err);
                }
            },
        };
        restored?;
        Ok(keep_going)
    }

    /// Run the action; a conflicting registration is retried with overwrite
    /// after confirmation.
    fn run_step(&self, action: &Action, prompter: &mut dyn Prompter) -> Result<()> {
        match self.dispatch(action, prompter, false) {
            Err(err) if matches!(classify(&err), Some(PipelineError::NotPossible(_))) => {
                warn!("{err:#}");
                if prompter.confirm("Overwrite the registered value?", false)? {
                    self.dispatch(action, prompter, true)
                } else {
                    info!("registration left unchanged");
                    Ok(())
                }
            }
            other => other,
        }
    }

    fn dispatch(&self, action: &Action, prompter: &mut dyn Prompter, overwrite: bool) -> Result<()> {
        let cfg: BidsConversionConfig = self.config.module("bids_conversion")?;
        let source = SourceConfiguration::new(self.tool, self.paths, &cfg, &self.source);
        let procedures = ProcedureHandling::new(self.tool, self.paths, self.config, &self.source);
        let bids = BidsConversion::new(
            self.tool,
            self.paths,
            &cfg,
            &self.bids,
            cfg.config_anon_subject.as_str(),
        );
        match action {
            Action::ImportData { tarball } => source.import_data(tarball),
            Action::CreateRule => source.register_rule(prompter, overwrite),
            Action::ImportRule { path } => source.import_rule(path, overwrite),
            Action::ChangeProcedures => procedures.change_active_procedures(prompter),
            Action::CreateProcedure { kind, name } => {
                procedures.create_procedure(prompter, *kind, name, overwrite)
            }
            Action::ImportProcedure { path, name } => {
                procedures.import_procedure(path, name, overwrite)
            }
            Action::Preview => {
                source.fetch_converter_container()?;
                let active = procedures.active_procedures()?;
                bids.generate_preview(&self.source, &active)
            }
            Action::Check => bids.run_bids_validator().map(|_| ()),
            Action::Cleanup => {
                source.cleanup(&self.repo)?;
                bids.cleanup()
            }
            Action::Help | Action::Return | Action::Exit => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::procedures::ProcedureKind;
    use crate::test_support::scripted_prompter;

    fn ask(script: &str) -> Action {
        ask_action(&mut scripted_prompter(script)).expect("ask")
    }

    #[test]
    fn exit_by_shortcut_or_default() {
        assert_eq!(ask("8\n"), Action::Exit);
        assert_eq!(ask("\n"), Action::Exit);
        assert_eq!(ask("exit\n"), Action::Exit);
    }

    #[test]
    fn import_data_asks_for_tarball() {
        assert_eq!(
            ask("1\n~/raw/cn85.tar.gz\n"),
            Action::ImportData {
                tarball: PathBuf::from("~/raw/cn85.tar.gz")
            }
        );
        assert_eq!(ask("1\n\n"), Action::Return);
    }

    #[test]
    fn rule_submenu() {
        assert_eq!(ask("2\n1\n"), Action::CreateRule);
        assert_eq!(
            ask("2\n2\nrules/mine.py\n"),
            Action::ImportRule {
                path: PathBuf::from("rules/mine.py")
            }
        );
        assert_eq!(ask("2\n\n"), Action::Return);
    }

    #[test]
    fn procedure_submenu() {
        assert_eq!(ask("3\n1\n"), Action::ChangeProcedures);
        assert_eq!(
            ask("3\n2\n2\nevents\n"),
            Action::CreateProcedure {
                kind: ProcedureKind::Python,
                name: "events".to_string()
            }
        );
        assert_eq!(ask("3\n2\n\n"), Action::Return);
        assert_eq!(
            ask("3\n3\n/tmp/copy_events.sh\n\n"),
            Action::ImportProcedure {
                path: PathBuf::from("/tmp/copy_events.sh"),
                name: "copy_events".to_string()
            }
        );
        assert_eq!(ask("3\n4\n"), Action::Return);
    }

    #[test]
    fn remaining_top_level_steps() {
        assert_eq!(ask("4\n"), Action::Preview);
        assert_eq!(ask("5\n"), Action::Check);
        assert_eq!(ask("6\n"), Action::Cleanup);
        assert_eq!(ask("7\n"), Action::Help);
    }
}
