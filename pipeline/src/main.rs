//! DICOM to BIDS conversion pipeline.
//!
//! Sets up a project directory (`config.yaml`, `subjects.yaml`), configures
//! the conversion interactively and runs it for every subject in the list.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use tracing::error;

use data_pipeline::configure::configure;
use data_pipeline::exit_codes;
use data_pipeline::io::config::{BIDS_CONVERSION, ConfigHandler, RSYNC, SUBJECT_FILE};
use data_pipeline::io::dataset::Datalad;
use data_pipeline::io::prompt::LinePrompter;
use data_pipeline::io::setup::{ProjectPaths, SetupOptions, init_project};
use data_pipeline::io::workdir::WorkingDir;
use data_pipeline::logging;
use data_pipeline::run::run;
use data_pipeline::sync::sync;
use data_pipeline::validate::{ProjectStatus, validate_project};

#[derive(Parser)]
#[command(
    name = "data-pipeline",
    version,
    about = "Convert DICOM tarballs into a BIDS dataset"
)]
#[command(group(ArgGroup::new("action").multiple(false).args(["setup", "configure", "run", "sync"])))]
struct Cli {
    /// Project directory.
    #[arg(short, long, default_value = ".")]
    project: PathBuf,
    /// Create `config.yaml` and `subjects.yaml` in the project.
    #[arg(long)]
    setup: bool,
    /// Overwrite existing files during setup.
    #[arg(short, long, requires = "setup")]
    force: bool,
    /// Configure the conversion interactively.
    #[arg(long)]
    configure: bool,
    /// Convert every subject of the subject list.
    #[arg(long)]
    run: bool,
    /// Fetch raw data of the subject list with rsync.
    #[arg(long)]
    sync: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if !cli.project.is_dir() {
        eprintln!("project directory {} does not exist", cli.project.display());
        return ExitCode::from(exit_code(exit_codes::INVALID));
    }
    let project = match cli.project.canonicalize() {
        Ok(project) => project,
        Err(err) => {
            eprintln!("resolve {}: {err}", cli.project.display());
            return ExitCode::from(exit_code(exit_codes::INVALID));
        }
    };
    let paths = ProjectPaths::new(&project);
    if let Err(err) = logging::init(&paths.log_path) {
        eprintln!("{err:#}");
        return ExitCode::from(exit_code(exit_codes::INVALID));
    }

    match dispatch(&cli, &paths) {
        Ok(code) => ExitCode::from(exit_code(code)),
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(exit_code(exit_codes::INVALID))
        }
    }
}

fn exit_code(code: i32) -> u8 {
    u8::try_from(code).unwrap_or(1)
}

fn dispatch(cli: &Cli, paths: &ProjectPaths) -> Result<i32> {
    let _workdir = WorkingDir::enter(&paths.root)?;

    if cli.setup {
        init_project(&paths.root, &SetupOptions { force: cli.force })?;
        return Ok(exit_codes::OK);
    }
    if !paths.is_set_up() {
        error!(
            "project {} is not set up, run with --setup first",
            paths.root.display()
        );
        return Ok(exit_codes::NOT_SET_UP);
    }

    if cli.configure {
        let config = conversion_config(&paths.config_path)?;
        let mut prompter = LinePrompter::stdio();
        configure(paths, &config, &Datalad::default(), &mut prompter)?;
    } else if cli.run {
        let config = conversion_config(&paths.config_path)?;
        run(paths, &config, &Datalad::default())?;
    } else if cli.sync {
        let config = ConfigHandler::with_modules(&paths.config_path, &[RSYNC, SUBJECT_FILE])?;
        sync(paths, &config)?;
    } else {
        let config = conversion_config(&paths.config_path)?;
        if validate_project(paths, &config)? == ProjectStatus::NotSetUp {
            return Ok(exit_codes::NOT_SET_UP);
        }
    }
    Ok(exit_codes::OK)
}

fn conversion_config(path: &Path) -> Result<ConfigHandler> {
    ConfigHandler::with_modules(path, &[BIDS_CONVERSION, SUBJECT_FILE])
        .context("assemble configuration schema")
}
