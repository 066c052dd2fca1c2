//! Built-in file templates and template copying.
//!
//! Configured template values of the form `builtin:<name>` refer to files
//! shipped with the tool; anything else is a path.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::error::PipelineError;
use crate::io::setup::ProjectPaths;

const BUILTIN_PREFIX: &str = "builtin:";

pub const RULES_BASE: &str = include_str!("../../templates/rules_base.py");

const BUILTINS: &[(&str, &str)] = &[
    ("rules_base.py", RULES_BASE),
    (
        "custom_rules_template.py",
        include_str!("../../templates/custom_rules_template.py"),
    ),
    (
        "procedure_template.py",
        include_str!("../../templates/procedure_template.py"),
    ),
    (
        "procedure_template.sh",
        include_str!("../../templates/procedure_template.sh"),
    ),
    (
        "bids_validator_config.json",
        include_str!("../../templates/bids_validator_config.json"),
    ),
];

/// Where the content of a template comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Template {
    Builtin {
        name: &'static str,
        contents: &'static str,
    },
    File(PathBuf),
}

impl Template {
    /// Resolve a configured template value.
    pub fn resolve(value: &str, paths: &ProjectPaths) -> Result<Self> {
        let Some(name) = value.strip_prefix(BUILTIN_PREFIX) else {
            return Ok(Self::File(paths.resolve(value)));
        };
        BUILTINS
            .iter()
            .find(|(builtin, _)| *builtin == name)
            .map(|&(name, contents)| Self::Builtin { name, contents })
            .ok_or_else(|| PipelineError::usage(format!("unknown builtin template '{name}'")).into())
    }

    pub fn rules_base() -> Self {
        Self::Builtin {
            name: "rules_base.py",
            contents: RULES_BASE,
        }
    }

    fn contents(&self) -> Result<String> {
        match self {
            Self::Builtin { contents, .. } => Ok((*contents).to_string()),
            Self::File(path) => {
                if !path.is_file() {
                    return Err(PipelineError::usage(format!(
                        "template {} does not exist",
                        path.display()
                    ))
                    .into());
                }
                fs::read_to_string(path).with_context(|| format!("read template {}", path.display()))
            }
        }
    }
}

/// Copy `template` to `target` unless `target` already exists.
///
/// Returns whether the file was written.
pub fn copy_template(template: &Template, target: &Path) -> Result<bool> {
    if target.exists() {
        debug!(target = %target.display(), "target exists, keep it");
        return Ok(false);
    }
    let contents = template.contents()?;
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    fs::write(target, contents).with_context(|| format!("write {}", target.display()))?;
    info!(target = %target.display(), "copied template");
    Ok(true)
}

/// Replace `target` with the content of `template` (temp file + rename).
///
/// `target` is untouched when the template cannot be read or written.
pub fn replace_with_template(template: &Template, target: &Path) -> Result<()> {
    let contents = template.contents()?;
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let mut tmp_name = target.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = target.with_file_name(tmp_name);
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, target).with_context(|| format!("replace {}", target.display()))?;
    info!(target = %target.display(), "replaced from template");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_names_resolve() {
        let paths = ProjectPaths::new("/project");
        let template = Template::resolve("builtin:procedure_template.sh", &paths).expect("resolve");
        assert!(matches!(template, Template::Builtin { name: "procedure_template.sh", .. }));
    }

    #[test]
    fn unknown_builtin_is_usage_error() {
        let paths = ProjectPaths::new("/project");
        let err = Template::resolve("builtin:nope.py", &paths).unwrap_err();
        assert!(matches!(
            crate::error::classify(&err),
            Some(PipelineError::Usage(_))
        ));
    }

    #[test]
    fn paths_resolve_relative_to_project() {
        let paths = ProjectPaths::new("/project");
        assert_eq!(
            Template::resolve("rules/mine.py", &paths).expect("resolve"),
            Template::File(PathBuf::from("/project/rules/mine.py"))
        );
    }

    #[test]
    fn copy_never_overwrites() {
        let temp = tempfile::tempdir().expect("tempdir");
        let target = temp.path().join("code/custom_rules/rules_base.py");

        assert!(copy_template(&Template::rules_base(), &target).expect("copy"));
        fs::write(&target, "edited").expect("write");
        assert!(!copy_template(&Template::rules_base(), &target).expect("copy"));
        assert_eq!(fs::read_to_string(&target).expect("read"), "edited");
    }

    #[test]
    fn missing_file_template_is_usage_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let template = Template::File(temp.path().join("missing.py"));
        let err = copy_template(&template, &temp.path().join("out.py")).unwrap_err();
        assert!(matches!(
            crate::error::classify(&err),
            Some(PipelineError::Usage(_))
        ));
    }

    #[test]
    fn replace_overwrites_and_leaves_no_temp_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let target = temp.path().join("code/custom_rules/custom_rules.py");
        fs::create_dir_all(target.parent().expect("parent")).expect("mkdir");
        fs::write(&target, "old").expect("write");
        let source = temp.path().join("mine.py");
        fs::write(&source, "new").expect("write");

        replace_with_template(&Template::File(source), &target).expect("replace");

        assert_eq!(fs::read_to_string(&target).expect("read"), "new");
        assert!(!target.with_file_name("custom_rules.py.tmp").exists());
    }

    #[test]
    fn replace_with_missing_template_keeps_target() {
        let temp = tempfile::tempdir().expect("tempdir");
        let target = temp.path().join("custom_rules.py");
        fs::write(&target, "edited").expect("write");

        let err = replace_with_template(&Template::File(temp.path().join("missing.py")), &target)
            .unwrap_err();

        assert!(matches!(
            crate::error::classify(&err),
            Some(PipelineError::Usage(_))
        ));
        assert_eq!(fs::read_to_string(&target).expect("read"), "edited");
    }
}
