//! Dataset creation.
//!
//! A dataset is created, configured with its setup procedures and patched.
//! If any of these steps fails the partially created dataset is removed and
//! the original error is returned.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use tracing::{debug, error, info, instrument, warn};

use crate::core::template::{Placeholders, render};
use crate::error::PipelineError;
use crate::io::config::DatasetSettings;
use crate::io::dataset::{DatasetTool, RemoveMode};
use crate::io::process::run_checked;
use crate::io::setup::ProjectPaths;

/// Create the dataset described by `settings`. An existing directory is an
/// error.
#[instrument(skip_all, fields(dataset = %settings.dataset_name))]
pub fn setup_dataset(
    tool: &dyn DatasetTool,
    paths: &ProjectPaths,
    settings: &DatasetSettings,
) -> Result<PathBuf> {
    let dataset = paths.dataset(&settings.dataset_name);
    if dataset.exists() {
        return Err(PipelineError::usage(format!(
            "dataset under {} already exists",
            dataset.display()
        ))
        .into());
    }

    info!(path = %dataset.display(), "create dataset");
    let result = create_and_configure(tool, paths, &dataset, settings);
    if let Err(err) = result {
        error!("dataset setup failed: {err:#}");
        remove_partial(tool, &dataset);
        return Err(err);
    }
    Ok(dataset)
}

/// Return the dataset path, creating the dataset first if it is missing.
pub fn ensure_dataset(
    tool: &dyn DatasetTool,
    paths: &ProjectPaths,
    settings: &DatasetSettings,
) -> Result<PathBuf> {
    let dataset = paths.dataset(&settings.dataset_name);
    if dataset.exists() {
        debug!(path = %dataset.display(), "dataset exists");
        return Ok(dataset);
    }
    setup_dataset(tool, paths, settings)
}

fn create_and_configure(
    tool: &dyn DatasetTool,
    paths: &ProjectPaths,
    dataset: &Path,
    settings: &DatasetSettings,
) -> Result<()> {
    tool.create(dataset)?;
    for procedure in &settings.setup_procedures {
        tool.run_procedure(dataset, std::slice::from_ref(procedure))
            .with_context(|| format!("setup procedure {procedure}"))?;
    }
    apply_patches(paths, dataset, &settings.patches)
}

fn apply_patches(paths: &ProjectPaths, dataset: &Path, patches: &[String]) -> Result<()> {
    if patches.is_empty() {
        debug!("no patches to apply");
        return Ok(());
    }
    let project_dir = paths.root.to_string_lossy();
    for patch in patches {
        let rendered = render(
            patch,
            &Placeholders {
                project_dir: Some(&project_dir),
                ..Placeholders::default()
            },
        )?;
        let patch = paths.resolve(rendered);
        info!(patch = %patch.display(), "apply patch");
        let mut cmd = Command::new("patch");
        cmd.args(["-p0", "-d"]).arg(dataset).arg("-i").arg(&patch);
        run_checked(cmd).with_context(|| format!("apply patch {}", patch.display()))?;
    }
    Ok(())
}

fn remove_partial(tool: &dyn DatasetTool, dataset: &Path) {
    if !dataset.exists() {
        return;
    }
    warn!(path = %dataset.display(), "removing partially created dataset");
    if let Err(err) = tool.remove(dataset, None, RemoveMode::Reckless) {
        error!("failed to remove {}: {err:#}", dataset.display());
    }
}
