//! Deterministic, pure logic of the pipeline.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data (specification entries, registrations, active procedure sets, menu
//! answers) and return deterministic outputs suitable for tests.

pub mod menu;
pub mod preview;
pub mod procedures;
pub mod registration;
pub mod spec;
pub mod template;
