//! Decide how to register a path (rule file, procedure directory) in the
//! dataset configuration.

use std::path::{Component, Path, PathBuf};

use crate::error::PipelineError;

/// What the caller has to do with the dataset configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// Nothing registered yet: write the value.
    Set,
    /// The same path is already registered.
    Unchanged,
    /// A different path is registered and overwriting was requested.
    Overwrite,
}

impl Registration {
    pub fn needs_write(self) -> bool {
        !matches!(self, Registration::Unchanged)
    }
}

/// Compare the desired path with the registered one.
///
/// `label` names the registered thing in the error message, e.g. "rule file".
pub fn decide(
    label: &str,
    registered: Option<&Path>,
    desired: &Path,
    overwrite: bool,
) -> Result<Registration, PipelineError> {
    let Some(registered) = registered else {
        return Ok(Registration::Set);
    };
    if normalize(registered) == normalize(desired) {
        return Ok(Registration::Unchanged);
    }
    if overwrite {
        return Ok(Registration::Overwrite);
    }
    Err(PipelineError::not_possible(format!(
        "different {label} {} already registered (requested {})",
        registered.display(),
        desired.display()
    )))
}

/// Drop `.` components so `./code/rules.py` and `code/rules.py` compare equal.
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|component| !matches!(component, Component::CurDir))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_registers() {
        let outcome = decide("rule file", None, Path::new("code/rules.py"), false).expect("decide");
        assert_eq!(outcome, Registration::Set);
        assert!(outcome.needs_write());
    }

    #[test]
    fn same_path_is_a_no_op() {
        let outcome = decide(
            "rule file",
            Some(Path::new("./code/rules.py")),
            Path::new("code//rules.py"),
            false,
        )
        .expect("decide");
        assert_eq!(outcome, Registration::Unchanged);
        assert!(!outcome.needs_write());
    }

    #[test]
    fn different_path_without_overwrite_is_not_possible() {
        let err = decide(
            "procedure directory",
            Some(Path::new("code/other")),
            Path::new("code/procedures"),
            false,
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::NotPossible(_)));
        assert!(err.to_string().contains("code/other"));
    }

    #[test]
    fn different_path_with_overwrite_overwrites() {
        let outcome = decide(
            "rule file",
            Some(Path::new("code/old.py")),
            Path::new("code/new.py"),
            true,
        )
        .expect("decide");
        assert_eq!(outcome, Registration::Overwrite);
    }
}
