//! Question tree of the interactive configuration menu.
//!
//! The menu is a closed set of steps; every combination of answers maps to
//! exactly one [`Action`], so dispatch is an exhaustive `match`.

use std::path::{Path, PathBuf};

use crate::core::procedures::ProcedureKind;

/// Top-level menu entries, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    ImportData,
    Rule,
    Procedure,
    Preview,
    Check,
    Cleanup,
    Help,
    Exit,
}

impl Step {
    pub const ALL: [Step; 8] = [
        Step::ImportData,
        Step::Rule,
        Step::Procedure,
        Step::Preview,
        Step::Check,
        Step::Cleanup,
        Step::Help,
        Step::Exit,
    ];
    pub const DEFAULT: Step = Step::Exit;

    pub fn label(self) -> &'static str {
        match self {
            Step::ImportData => "Import data",
            Step::Rule => "Configure and register rule »",
            Step::Procedure => "Add procedure »",
            Step::Preview => "Generate preview",
            Step::Check => "Check for BIDS conformity",
            Step::Cleanup => "Cleanup",
            Step::Help => "Help",
            Step::Exit => "Exit",
        }
    }
}

/// Rule submenu entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleStep {
    Create,
    Import,
    Return,
}

impl RuleStep {
    pub const ALL: [RuleStep; 3] = [RuleStep::Create, RuleStep::Import, RuleStep::Return];
    pub const DEFAULT: RuleStep = RuleStep::Return;

    pub fn label(self) -> &'static str {
        match self {
            RuleStep::Create => "Create new rule",
            RuleStep::Import => "Import rule",
            RuleStep::Return => "Return",
        }
    }
}

/// Procedure submenu entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcedureStep {
    Change,
    Create,
    Import,
    Return,
}

impl ProcedureStep {
    pub const ALL: [ProcedureStep; 4] = [
        ProcedureStep::Change,
        ProcedureStep::Create,
        ProcedureStep::Import,
        ProcedureStep::Return,
    ];
    pub const DEFAULT: ProcedureStep = ProcedureStep::Return;

    pub fn label(self) -> &'static str {
        match self {
            ProcedureStep::Change => "Change active procedures",
            ProcedureStep::Create => "Create new procedure",
            ProcedureStep::Import => "Import procedure",
            ProcedureStep::Return => "Return",
        }
    }
}

/// Labels of the procedure type question; the last entry returns.
pub fn procedure_kind_labels() -> Vec<&'static str> {
    let mut labels: Vec<&'static str> = ProcedureKind::ALL.iter().map(|kind| kind.label()).collect();
    labels.push("Return");
    labels
}

/// Map an answer of the procedure type question back to a kind.
pub fn procedure_kind_at(index: usize) -> Option<ProcedureKind> {
    ProcedureKind::ALL.get(index).copied()
}

/// Everything the menu can ask the tool to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    ImportData { tarball: PathBuf },
    CreateRule,
    ImportRule { path: PathBuf },
    ChangeProcedures,
    CreateProcedure { kind: ProcedureKind, name: String },
    ImportProcedure { path: PathBuf, name: String },
    Preview,
    Check,
    Cleanup,
    Help,
    /// A submenu was left without choosing anything.
    Return,
    Exit,
}

impl Action {
    /// Whether the action works on the configuration branch.
    pub fn touches_datasets(&self) -> bool {
        !matches!(self, Action::Help | Action::Return | Action::Exit)
    }
}

/// Default name of an imported procedure: the file stem.
pub fn default_procedure_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default()
}

pub fn labels<T: Copy>(items: &[T], label: impl Fn(T) -> &'static str) -> Vec<&'static str> {
    items.iter().map(|item| label(*item)).collect()
}

pub fn index_of<T: PartialEq>(items: &[T], item: &T) -> usize {
    items.iter().position(|candidate| candidate == item).unwrap_or(0)
}

pub const HELP: &str = "\
Import data                    import a DICOM tarball into the source dataset
Configure and register rule »  create or import the dicom2spec rule and regenerate the study specification
Add procedure »                create or import post-processing procedures, choose the active ones
Generate preview               convert the imported acquisition and show source and result side by side
Check for BIDS conformity      run the BIDS validator on the BIDS dataset
Cleanup                        remove imported and converted data and the configuration branch
Exit                           leave the menu";
