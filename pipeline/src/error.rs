//! Error classes callers need to tell apart.
//!
//! Everything is propagated as `anyhow::Error`; code that has to react to a
//! particular class (the interactive loop, `main`) uses
//! `err.downcast_ref::<PipelineError>()`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Configuration does not match the accreted schema.
    #[error("configuration error: {0}")]
    Config(String),

    /// A different value is already registered and overwriting was not requested.
    #[error("not possible: {0}")]
    NotPossible(String),

    /// Recoverable user mistake (missing file, duplicate name, ...).
    #[error("{0}")]
    Usage(String),

    /// External tool exited unsuccessfully.
    #[error("{program} failed with status {code:?}: {stderr}")]
    Command {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    /// Interactive input reached end of file.
    #[error("input closed")]
    InputClosed,
}

impl PipelineError {
    pub fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }

    pub fn not_possible(msg: impl Into<String>) -> Self {
        Self::NotPossible(msg.into())
    }
}

/// Classify an `anyhow::Error` chain.
pub fn classify(err: &anyhow::Error) -> Option<&PipelineError> {
    err.chain().find_map(|cause| cause.downcast_ref::<PipelineError>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn classify_finds_error_below_context() {
        let result: Result<(), PipelineError> = Err(PipelineError::not_possible("rule registered"));
        let err = result.context("register rule").unwrap_err();
        assert!(matches!(classify(&err), Some(PipelineError::NotPossible(_))));
    }

    #[test]
    fn classify_ignores_foreign_errors() {
        let err = anyhow::anyhow!("plain");
        assert!(classify(&err).is_none());
    }
}
