//! Session state for the configuration branch workflow.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Persisted bookkeeping (`.data_pipeline/session.json`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionState {
    /// Branch of the source dataset before the configuration branch was
    /// checked out.
    pub starting_branch: Option<String>,
}

/// Load session state; a missing file yields the default state.
pub fn load_session_state(path: &Path) -> Result<SessionState> {
    if !path.exists() {
        return Ok(SessionState::default());
    }
    let contents =
        fs::read_to_string(path).with_context(|| format!("read session state {}", path.display()))?;
    let state: SessionState = serde_json::from_str(&contents)
        .with_context(|| format!("parse session state {}", path.display()))?;
    debug!(starting_branch = ?state.starting_branch, "session state loaded");
    Ok(state)
}

/// Atomically write session state (temp file + rename).
pub fn write_session_state(path: &Path, state: &SessionState) -> Result<()> {
    debug!(path = %path.display(), starting_branch = ?state.starting_branch, "writing session state");
    let mut buf = serde_json::to_string_pretty(state)?;
    buf.push('\n');
    let parent = path
        .parent()
        .with_context(|| format!("session state path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, buf)
        .with_context(|| format!("write temp session state {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("replace session state {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let state = load_session_state(&temp.path().join("session.json")).expect("load");
        assert_eq!(state, SessionState::default());
    }

    #[test]
    fn state_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("state/session.json");
        let state = SessionState {
            starting_branch: Some("master".to_string()),
        };
        write_session_state(&path, &state).expect("write");
        assert_eq!(load_session_state(&path).expect("load"), state);
        assert!(!path.with_extension("json.tmp").exists());
    }
}
