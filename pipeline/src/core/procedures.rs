//! Active procedure bookkeeping.
//!
//! The active set lives in the configuration document as
//! `{<name>: {parameters: <string>}}`. Membership changes are idempotent:
//! activating an active procedure or deactivating an inactive one is reported
//! as skipped, never as an error.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Invocation parameters of an active procedure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcedureParams {
    #[serde(default)]
    pub parameters: String,
}

impl ProcedureParams {
    pub fn new(parameters: impl Into<String>) -> Self {
        Self {
            parameters: parameters.into(),
        }
    }
}

pub type ActiveProcedures = BTreeMap<String, ProcedureParams>;

/// Kind of procedure file created from a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcedureKind {
    Shell,
    Python,
}

impl ProcedureKind {
    pub const ALL: [ProcedureKind; 2] = [ProcedureKind::Shell, ProcedureKind::Python];

    pub fn label(self) -> &'static str {
        match self {
            ProcedureKind::Shell => "shell",
            ProcedureKind::Python => "python",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ProcedureKind::Shell => "sh",
            ProcedureKind::Python => "py",
        }
    }
}

/// Names that were changed and names that were already in the requested state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeReport {
    pub applied: Vec<String>,
    pub skipped: Vec<String>,
}

impl ChangeReport {
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Add `requested` to `active`; already active names keep their parameters.
pub fn activate(active: &mut ActiveProcedures, requested: &ActiveProcedures) -> ChangeReport {
    let mut report = ChangeReport::default();
    for (name, params) in requested {
        if active.contains_key(name) {
            report.skipped.push(name.clone());
            continue;
        }
        active.insert(name.clone(), params.clone());
        report.applied.push(name.clone());
    }
    report
}

/// Remove `requested` names from `active`.
pub fn deactivate<S: AsRef<str>>(active: &mut ActiveProcedures, requested: &[S]) -> ChangeReport {
    let mut report = ChangeReport::default();
    for name in requested {
        let name = name.as_ref();
        if active.remove(name).is_none() {
            report.skipped.push(name.to_string());
            continue;
        }
        report.applied.push(name.to_string());
    }
    report
}

/// Result of comparing a checkbox selection with the active set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionDiff {
    pub to_activate: Vec<String>,
    pub to_deactivate: Vec<String>,
}

pub fn diff_selection(active: &ActiveProcedures, chosen: &[String]) -> SelectionDiff {
    let chosen: BTreeSet<&str> = chosen.iter().map(String::as_str).collect();
    let current: BTreeSet<&str> = active.keys().map(String::as_str).collect();
    SelectionDiff {
        to_activate: chosen
            .difference(&current)
            .map(|name| name.to_string())
            .collect(),
        to_deactivate: current
            .difference(&chosen)
            .map(|name| name.to_string())
            .collect(),
    }
}

/// A procedure known to the dataset tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailableProcedure {
    pub path: String,
    pub kind: String,
}

/// Parse `datalad run-procedure --discover` output.
///
/// Lines look like `cfg_bids (/path/to/cfg_bids.py) [python_script]`; anything
/// else (headers, warnings) is ignored.
pub fn parse_discovery(output: &str) -> Result<BTreeMap<String, AvailableProcedure>> {
    let re = Regex::new(r"^(?P<name>.+?) \((?P<path>.+?)\) \[(?P<kind>.+?)\]$")
        .context("compile discovery pattern")?;
    let mut procedures = BTreeMap::new();
    for line in output.lines() {
        let Some(caps) = re.captures(line.trim()) else {
            continue;
        };
        procedures.insert(
            caps["name"].to_string(),
            AvailableProcedure {
                path: caps["path"].to_string(),
                kind: caps["kind"].to_string(),
            },
        );
    }
    Ok(procedures)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active(names: &[&str]) -> ActiveProcedures {
        names
            .iter()
            .map(|name| (name.to_string(), ProcedureParams::new(format!("--{name}"))))
            .collect()
    }

    #[test]
    fn activating_active_procedure_is_skipped() {
        let mut current = active(&["events"]);
        let mut requested = ActiveProcedures::new();
        requested.insert("events".to_string(), ProcedureParams::new("--other"));
        requested.insert("defacing".to_string(), ProcedureParams::default());

        let report = activate(&mut current, &requested);

        assert_eq!(report.applied, vec!["defacing".to_string()]);
        assert_eq!(report.skipped, vec!["events".to_string()]);
        assert_eq!(current["events"].parameters, "--events");
        assert!(current.contains_key("defacing"));
    }

    #[test]
    fn deactivating_absent_procedure_is_skipped() {
        let mut current = active(&["events"]);
        let report = deactivate(&mut current, &["missing"]);
        assert!(report.is_noop());
        assert_eq!(report.skipped, vec!["missing".to_string()]);
        assert_eq!(current, active(&["events"]));
    }

    #[test]
    fn deactivate_removes_active_procedure() {
        let mut current = active(&["events", "defacing"]);
        let report = deactivate(&mut current, &["events"]);
        assert_eq!(report.applied, vec!["events".to_string()]);
        assert_eq!(current, active(&["defacing"]));
    }

    #[test]
    fn selection_diff_splits_added_and_removed() {
        let current = active(&["a", "b"]);
        let diff = diff_selection(&current, &["b".to_string(), "c".to_string()]);
        assert_eq!(diff.to_activate, vec!["c".to_string()]);
        assert_eq!(diff.to_deactivate, vec!["a".to_string()]);
    }

    #[test]
    fn kinds_map_to_extensions() {
        let extensions: Vec<&str> = ProcedureKind::ALL.iter().map(|kind| kind.extension()).collect();
        assert_eq!(extensions, vec!["sh", "py"]);
        assert_eq!(ProcedureKind::Python.label(), "python");
    }

    #[test]
    fn discovery_output_is_parsed() {
        let output = "\
cfg_bids (/ds/code/procedures/cfg_bids.py) [python_script]
copy_events (/ds/code/procedures/copy events.sh) [executable]
some unrelated warning line
";
        let procs = parse_discovery(output).expect("parse");
        assert_eq!(procs.len(), 2);
        assert_eq!(procs["cfg_bids"].kind, "python_script");
        assert_eq!(procs["copy_events"].path, "/ds/code/procedures/copy events.sh");
    }
}
