//! Fetch raw acquisitions with rsync.

use std::process::Command;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::core::template::{Placeholders, render};
use crate::io::config::{ConfigHandler, RsyncConfig, RsyncEndpoint};
use crate::io::process::{describe, run_checked};
use crate::io::setup::ProjectPaths;
use crate::io::subjects::SubjectList;

/// `[user@host:]path` with `{{ acqid }}` rendered.
pub fn remote_path(endpoint: &RsyncEndpoint, acqid: &str) -> Result<String> {
    let path = render(
        &endpoint.path,
        &Placeholders {
            acqid: Some(acqid),
            ..Placeholders::default()
        },
    )?;
    match (&endpoint.user, &endpoint.host) {
        (Some(user), Some(host)) => Ok(format!("{user}@{host}:{path}")),
        _ => Ok(path),
    }
}

/// Copy the raw data of every subject from `rsync.src` to `rsync.dest`.
pub fn sync(paths: &ProjectPaths, config: &ConfigHandler) -> Result<()> {
    let rsync: RsyncConfig = config.module("rsync")?;
    let subject_file: String = config.module("subject_file")?;
    let subjects = SubjectList::load(&paths.resolve(&subject_file))?;

    for subject in &subjects.subjects {
        let src = remote_path(&rsync.src, &subject.acqid)?;
        let dest = remote_path(&rsync.dest, &subject.acqid)?;
        let mut cmd = Command::new("rsync");
        cmd.args(["-acv", "--progress", "--info=FLIST0"])
            .arg(&src)
            .arg(&dest)
            .current_dir(&paths.root);
        info!(cmd = %describe(&cmd), acqid = %subject.acqid, "sync");
        let output =
            run_checked(cmd).with_context(|| format!("sync acqid={}", subject.acqid))?;
        debug!("{}", output.stdout_lossy().trim_end());
    }
    Ok(())
}
