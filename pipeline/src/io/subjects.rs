//! Subject list (`subject_file` in the configuration).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::core::template::{Placeholders, render};
use crate::io::config::validate_against;
use crate::io::setup::expand_home;

const SUBJECTS_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../schemas/config/subjects.schema.json"
));

/// One acquisition to convert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub anon_subject: String,
    pub acqid: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectList {
    /// Tarball location; may reference `{{ anon_subject }}` and `{{ acqid }}`.
    pub data_path: String,
    pub subjects: Vec<Subject>,
}

impl SubjectList {
    /// Read and validate a subject list.
    pub fn load(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "loading subject list");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("read subject list {}", path.display()))?;
        let value: Value = serde_yaml::from_str(&contents)
            .with_context(|| format!("parse subject list {}", path.display()))?;
        let schema: Value = serde_json::from_str(SUBJECTS_SCHEMA).context("parse subjects schema")?;
        validate_against(&value, &schema)
            .with_context(|| format!("validate subject list {}", path.display()))?;
        serde_json::from_value(value)
            .with_context(|| format!("deserialize subject list {}", path.display()))
    }

    /// Tarball path of `subject` (relative paths are left to the caller).
    pub fn tarball(&self, subject: &Subject) -> Result<PathBuf> {
        let rendered = render(
            &self.data_path,
            &Placeholders {
                anon_subject: Some(&subject.anon_subject),
                acqid: Some(&subject.acqid),
                ..Placeholders::default()
            },
        )?;
        Ok(expand_home(Path::new(&rendered)))
    }
}
