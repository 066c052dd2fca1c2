//! Git adapter for the configuration branch workflow.
//!
//! Rules and procedures are edited on a dedicated branch of the source
//! dataset, so we keep a small, explicit wrapper around `git` subprocess
//! calls. Every call runs with an explicit working directory.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Result, anyhow};
use tracing::{debug, instrument, warn};

use crate::io::process::{CommandOutput, check, run_checked};

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Return the current branch name (errors on detached HEAD).
    #[instrument(skip_all)]
    pub fn current_branch(&self) -> Result<String> {
        let out = self.run_capture(&["branch", "--show-current"])?;
        let name = out.trim().to_string();
        if name.is_empty() {
            warn!("detached HEAD detected");
            return Err(anyhow!(
                "detached HEAD in {} (refuse to switch branches)",
                self.workdir.display()
            ));
        }
        debug!(branch = %name, "current branch");
        Ok(name)
    }

    /// Check whether a local branch exists.
    pub fn branch_exists(&self, branch: &str) -> Result<bool> {
        check(self.command(&[
            "show-ref",
            "--verify",
            "--quiet",
            &format!("refs/heads/{branch}"),
        ]))
    }

    /// Create and checkout a new branch at current HEAD.
    #[instrument(skip_all, fields(branch))]
    pub fn checkout_new_branch(&self, branch: &str) -> Result<()> {
        debug!(branch, "creating and checking out new branch");
        self.run_checked(&["checkout", "-b", branch])?;
        Ok(())
    }

    /// Checkout an existing branch.
    #[instrument(skip_all, fields(branch))]
    pub fn checkout_branch(&self, branch: &str) -> Result<()> {
        debug!(branch, "checking out branch");
        self.run_checked(&["checkout", branch])?;
        Ok(())
    }

    /// Rebase the current branch onto `onto`.
    #[instrument(skip_all, fields(onto))]
    pub fn rebase(&self, onto: &str) -> Result<()> {
        debug!(onto, "rebasing current branch");
        self.run_checked(&["rebase", onto])?;
        Ok(())
    }

    /// Stash local changes. Returns false if there was nothing to stash.
    pub fn stash(&self) -> Result<bool> {
        let before = self.stash_count()?;
        self.run_checked(&["stash", "push"])?;
        let stashed = self.stash_count()? > before;
        debug!(stashed, "git stash");
        Ok(stashed)
    }

    /// Re-apply the most recent stash entry.
    pub fn stash_pop(&self) -> Result<()> {
        self.run_checked(&["stash", "pop"])?;
        Ok(())
    }

    fn stash_count(&self) -> Result<usize> {
        let out = self.run_capture(&["stash", "list"])?;
        Ok(out.lines().filter(|line| !line.trim().is_empty()).count())
    }

    /// True if `path` is tracked by git.
    pub fn is_tracked(&self, path: &Path) -> Result<bool> {
        let mut cmd = self.command(&["ls-files", "--error-unmatch"]);
        cmd.arg(path);
        check(cmd)
    }

    /// True if a tracked `path` differs from the index.
    pub fn was_changed(&self, path: &Path) -> Result<bool> {
        if !self.workdir.join(path).exists() {
            return Ok(false);
        }
        let mut cmd = self.command(&["diff", "--exit-code", "--quiet", "--"]);
        cmd.arg(path);
        Ok(!check(cmd)?)
    }

    /// True if untracked, non-ignored files exist at or below `path`.
    pub fn has_untracked(&self, path: &Path) -> Result<bool> {
        let mut cmd = self.command(&["ls-files", "--others", "--exclude-standard", "--"]);
        cmd.arg(path);
        let out = run_checked(cmd)?;
        Ok(!out.stdout_lossy().trim().is_empty())
    }

    /// True if `path` is new or modified and should be committed.
    ///
    /// Works for files and directories (new files inside a tracked
    /// directory count as a change).
    pub fn needs_commit(&self, path: &Path) -> Result<bool> {
        if !self.workdir.join(path).exists() {
            return Ok(false);
        }
        if self.is_tracked(path)? {
            return Ok(self.was_changed(path)? || self.has_untracked(path)?);
        }
        Ok(true)
    }

    /// Delete a local branch, merged or not.
    #[instrument(skip_all, fields(branch))]
    pub fn remove_branch(&self, branch: &str) -> Result<()> {
        debug!(branch, "removing branch");
        self.run_checked(&["branch", "-D", branch])?;
        Ok(())
    }

    /// Read a key from a git-config formatted file (`None` if unset).
    pub fn config_file_get(&self, file: &Path, key: &str) -> Result<Option<String>> {
        let mut cmd = self.command(&["config", "--file"]);
        cmd.arg(file).args(["--get", key]);
        let out = crate::io::process::run_command(cmd)?;
        // exit 1: key not set
        match out.status.code() {
            Some(0) => Ok(Some(out.stdout_lossy().trim().to_string())),
            Some(1) => Ok(None),
            _ => Err(anyhow!(
                "git config --file {} --get {key} failed: {}",
                file.display(),
                out.stderr_lossy().trim()
            )),
        }
    }

    /// Set a key in a git-config formatted file, replacing all values.
    pub fn config_file_set(&self, file: &Path, key: &str, value: &str) -> Result<()> {
        let mut cmd = self.command(&["config", "--file"]);
        cmd.arg(file).args(["--replace-all", key, value]);
        run_checked(cmd)?;
        Ok(())
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run_checked(args)?;
        Ok(output.stdout_lossy())
    }

    fn run_checked(&self, args: &[&str]) -> Result<CommandOutput> {
        run_checked(self.command(args))
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new("git");
        cmd.args(args).current_dir(&self.workdir);
        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::init_git_repo;
    use std::fs;

    #[test]
    fn branch_lifecycle() {
        let temp = tempfile::tempdir().expect("tempdir");
        init_git_repo(temp.path()).expect("init repo");
        let git = Git::new(temp.path());

        let start = git.current_branch().expect("branch");
        assert!(!git.branch_exists("config").expect("exists"));

        git.checkout_new_branch("config").expect("create");
        assert_eq!(git.current_branch().expect("branch"), "config");
        git.checkout_branch(&start).expect("checkout");
        git.remove_branch("config").expect("remove");
        assert!(!git.branch_exists("config").expect("exists"));
    }

    #[test]
    fn stash_reports_whether_anything_was_stashed() {
        let temp = tempfile::tempdir().expect("tempdir");
        init_git_repo(temp.path()).expect("init repo");
        let git = Git::new(temp.path());

        assert!(!git.stash().expect("stash clean tree"));

        fs::write(temp.path().join("README.md"), "changed\n").expect("write");
        assert!(git.stash().expect("stash"));
        assert_eq!(
            fs::read_to_string(temp.path().join("README.md")).expect("read"),
            "# test\n"
        );
        git.stash_pop().expect("pop");
        assert_eq!(
            fs::read_to_string(temp.path().join("README.md")).expect("read"),
            "changed\n"
        );
    }

    #[test]
    fn needs_commit_covers_tracked_untracked_and_missing() {
        let temp = tempfile::tempdir().expect("tempdir");
        init_git_repo(temp.path()).expect("init repo");
        let git = Git::new(temp.path());

        assert!(!git.needs_commit(Path::new("README.md")).expect("clean"));
        fs::write(temp.path().join("README.md"), "changed\n").expect("write");
        assert!(git.needs_commit(Path::new("README.md")).expect("modified"));

        fs::write(temp.path().join("new.txt"), "new\n").expect("write");
        assert!(git.needs_commit(Path::new("new.txt")).expect("untracked"));
        assert!(!git.needs_commit(Path::new("missing.txt")).expect("missing"));
    }

    #[test]
    fn new_file_in_tracked_directory_needs_commit() {
        let temp = tempfile::tempdir().expect("tempdir");
        init_git_repo(temp.path()).expect("init repo");
        let git = Git::new(temp.path());
        let procedures = temp.path().join("code/procedures");
        fs::create_dir_all(&procedures).expect("mkdir");
        fs::write(procedures.join("a.sh"), "echo a\n").expect("write");
        git.command(&["add", "code"]).status().expect("git add");
        git.command(&["commit", "-q", "-m", "add a"]).status().expect("git commit");

        assert!(!git.needs_commit(Path::new("code/procedures")).expect("clean"));
        fs::write(procedures.join("b.sh"), "echo b\n").expect("write");
        assert!(git.needs_commit(Path::new("code/procedures")).expect("new file"));
    }

    #[test]
    fn config_file_get_and_set() {
        let temp = tempfile::tempdir().expect("tempdir");
        let git = Git::new(temp.path());
        let file = temp.path().join("config");

        assert_eq!(
            git.config_file_get(&file, "datalad.locations.dataset-procedures")
                .expect("get"),
            None
        );
        git.config_file_set(&file, "datalad.locations.dataset-procedures", "code/procedures")
            .expect("set");
        assert_eq!(
            git.config_file_get(&file, "datalad.locations.dataset-procedures")
                .expect("get")
                .as_deref(),
            Some("code/procedures")
        );
    }
}
