//! Scoped change of the process working directory.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};

/// Changes into a directory and changes back when dropped.
///
/// The previous directory is restored on every exit path, including early
/// returns via `?` and unwinding.
#[derive(Debug)]
#[must_use = "the previous directory is restored when the guard is dropped"]
pub struct WorkingDir {
    previous: PathBuf,
}

impl WorkingDir {
    pub fn enter(path: &Path) -> Result<Self> {
        let previous = env::current_dir().context("read current directory")?;
        env::set_current_dir(path)
            .with_context(|| format!("change directory to {}", path.display()))?;
        debug!(from = %previous.display(), to = %path.display(), "entered directory");
        Ok(Self { previous })
    }

    pub fn previous(&self) -> &Path {
        &self.previous
    }
}

impl Drop for WorkingDir {
    fn drop(&mut self) {
        if let Err(err) = env::set_current_dir(&self.previous) {
            warn!(dir = %self.previous.display(), %err, "failed to restore working directory");
        }
    }
}
