//! I/O adapters: files, subprocesses, git, the dataset tool and the terminal.

pub mod config;
pub mod dataset;
pub mod git;
pub mod process;
pub mod prompt;
pub mod session_state;
pub mod setup;
pub mod subjects;
pub mod templates;
pub mod workdir;
