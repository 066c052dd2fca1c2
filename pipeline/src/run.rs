//! Non-interactive conversion of every subject in the subject list.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, instrument};

use crate::bids::{BidsConversion, spec_files};
use crate::error::PipelineError;
use crate::io::config::{BidsConversionConfig, ConfigHandler};
use crate::io::dataset::DatasetTool;
use crate::io::setup::ProjectPaths;
use crate::io::subjects::{Subject, SubjectList};
use crate::source::{fetch_converter_container, import_data};

/// Import, convert, post-process and validate each subject in turn. The
/// first failure aborts the run.
pub fn run(paths: &ProjectPaths, config: &ConfigHandler, tool: &dyn DatasetTool) -> Result<()> {
    let cfg: BidsConversionConfig = config.module("bids_conversion")?;
    let subject_file: String = config.module("subject_file")?;
    let subjects = SubjectList::load(&paths.resolve(&subject_file))?;

    let source = existing_dataset(paths, &cfg.source.dataset_name)?;
    let bids = existing_dataset(paths, &cfg.bids.dataset_name)?;

    if subjects.subjects.is_empty() {
        info!(file = %subject_file, "no subjects to convert");
    }
    for subject in &subjects.subjects {
        convert_subject(paths, tool, &cfg, &subjects, subject, &source, &bids).with_context(|| {
            format!(
                "convert acqid={} anon_subject={}",
                subject.acqid, subject.anon_subject
            )
        })?;
    }
    info!(count = subjects.subjects.len(), "conversion finished");
    Ok(())
}

#[instrument(skip_all, fields(acqid = %subject.acqid, anon_subject = %subject.anon_subject))]
fn convert_subject(
    paths: &ProjectPaths,
    tool: &dyn DatasetTool,
    cfg: &BidsConversionConfig,
    subjects: &SubjectList,
    subject: &Subject,
    source: &Path,
    bids: &Path,
) -> Result<()> {
    info!("convert");
    let tarball = paths.resolve(subjects.tarball(subject)?);
    import_data(tool, source, &tarball, &subject.anon_subject, &subject.acqid)?;
    fetch_converter_container(tool, source, cfg)?;

    let conversion = BidsConversion::new(tool, paths, cfg, bids, subject.anon_subject.as_str());
    conversion.install_source_dataset(source)?;
    conversion.convert(&spec_files(&subject.acqid))?;
    conversion.run_procedures(&cfg.active_procedures)?;
    conversion.run_bids_validator()?;
    Ok(())
}

fn existing_dataset(paths: &ProjectPaths, name: &str) -> Result<std::path::PathBuf> {
    let dataset = paths.dataset(name);
    if !dataset.is_dir() {
        return Err(PipelineError::usage(format!(
            "dataset {} does not exist (run --configure first)",
            dataset.display()
        ))
        .into());
    }
    Ok(dataset)
}
