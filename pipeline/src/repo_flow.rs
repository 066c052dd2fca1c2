//! Configuration branch handling for the source dataset.
//!
//! Every configuration step runs on [`CONFIG_BRANCH`]. Afterwards the
//! starting branch is checked out again (local changes travel along via the
//! stash) and the dataset configuration, rule and procedures are committed
//! there.

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{debug, info, instrument};

use crate::error::PipelineError;
use crate::io::dataset::{DatasetTool, PROCEDURES_KEY, RULES_KEY};
use crate::io::git::Git;
use crate::io::session_state::{SessionState, load_session_state, write_session_state};

pub const CONFIG_BRANCH: &str = "bids_config_branch";

pub struct ConfigRepo<'a> {
    git: Git,
    tool: &'a dyn DatasetTool,
    session_path: PathBuf,
    starting_branch: String,
}

impl std::fmt::Debug for ConfigRepo<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigRepo")
            .field("git", &self.git)
            .field("session_path", &self.session_path)
            .field("starting_branch", &self.starting_branch)
            .finish_non_exhaustive()
    }
}

impl<'a> ConfigRepo<'a> {
    /// Record the starting branch of `dataset`.
    ///
    /// When the dataset is still on the configuration branch (an earlier
    /// session was interrupted) the recorded starting branch is reused.
    pub fn open(dataset: &Path, tool: &'a dyn DatasetTool, session_path: &Path) -> Result<Self> {
        let git = Git::new(dataset);
        let current = git.current_branch()?;
        let state = load_session_state(session_path)?;
        let starting_branch = if current == CONFIG_BRANCH {
            state.starting_branch.ok_or_else(|| {
                PipelineError::usage(format!(
                    "{} is on {CONFIG_BRANCH} but no starting branch was recorded; check out the original branch",
                    dataset.display()
                ))
            })?
        } else {
            current
        };
        info!(branch = %starting_branch, "starting branch");
        write_session_state(
            session_path,
            &SessionState {
                starting_branch: Some(starting_branch.clone()),
            },
        )?;
        Ok(Self {
            git,
            tool,
            session_path: session_path.to_path_buf(),
            starting_branch,
        })
    }

    pub fn starting_branch(&self) -> &str {
        &self.starting_branch
    }

    fn dataset(&self) -> &Path {
        self.git.workdir()
    }

    /// Create the configuration branch, or check it out and rebase it onto
    /// the starting branch.
    #[instrument(skip_all)]
    pub fn checkout_config_branch(&self) -> Result<()> {
        if self.git.branch_exists(CONFIG_BRANCH)? {
            self.git.checkout_branch(CONFIG_BRANCH)?;
            self.git.rebase(&self.starting_branch)
        } else {
            self.git.checkout_new_branch(CONFIG_BRANCH)
        }
    }

    /// Switch back to the starting branch, carrying local changes along.
    #[instrument(skip_all)]
    pub fn checkout_starting_branch(&self) -> Result<()> {
        if self.git.current_branch()? == self.starting_branch {
            debug!("already on starting branch");
            return Ok(());
        }
        let stashed = self.git.stash()?;
        self.git.checkout_branch(&self.starting_branch)?;
        if stashed {
            self.git.stash_pop()?;
        }
        Ok(())
    }

    /// Save dataset configuration, rule and procedures when new or changed.
    #[instrument(skip_all)]
    pub fn commit(&self) -> Result<()> {
        let config = Path::new(".datalad/config");
        if self.git.needs_commit(config)? {
            self.tool.save(
                self.dataset(),
                config,
                "Modify datalad config for custom rule and procedures",
                false,
            )?;
        }

        if let Some(rule) = self.registered(RULES_KEY)?
            && self.git.needs_commit(&rule)?
        {
            self.tool
                .save(self.dataset(), &rule, "Add/modify custom rule", true)?;
            let rules_base = rule.with_file_name("rules_base.py");
            if self.git.needs_commit(&rules_base)? {
                self.tool
                    .save(self.dataset(), &rules_base, "Add rule_base file", true)?;
            }
        }

        if let Some(procedures) = self.registered(PROCEDURES_KEY)?
            && self.git.needs_commit(&procedures)?
        {
            self.tool
                .save(self.dataset(), &procedures, "Add procedures", true)?;
        }
        Ok(())
    }

    pub fn remove_config_branch(&self) -> Result<()> {
        if self.git.branch_exists(CONFIG_BRANCH)? {
            self.git.remove_branch(CONFIG_BRANCH)?;
        }
        Ok(())
    }

    /// Forget the recorded starting branch (the session ended cleanly).
    pub fn finish(&self) -> Result<()> {
        write_session_state(&self.session_path, &SessionState::default())
    }

    /// Registered path for `key`, relative to the dataset.
    fn registered(&self, key: &str) -> Result<Option<PathBuf>> {
        Ok(self.tool.config_get(self.dataset(), key)?.map(|value| {
            let path = PathBuf::from(value);
            path.strip_prefix(self.dataset())
                .map(Path::to_path_buf)
                .unwrap_or(path)
        }))
    }
}
