//! DICOM to BIDS conversion pipeline.
//!
//! Drives an external dataset tool to import DICOM tarballs into a source
//! dataset, derive a study specification from a conversion rule and convert
//! each acquisition into a BIDS dataset. The crate is split the same way
//! throughout:
//!
//! - **[`core`]**: Pure, deterministic logic (spec reset, registration
//!   decisions, menu model, placeholder rendering). No I/O.
//! - **[`io`]**: Side-effecting operations (config files, git, dataset tool,
//!   subprocesses, prompts). Behind traits where tests need fakes.
//!
//! Orchestration modules ([`configure`], [`run`], [`sync`], [`validate`])
//! combine both to implement the CLI actions.

pub mod bids;
pub mod configure;
pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod procedures;
pub mod repo_flow;
pub mod run;
pub mod setup;
pub mod source;
pub mod sync;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod validate;
