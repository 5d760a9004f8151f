//! Deterministic, pure logic for the campaign.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data and return deterministic outputs suitable for tests.

pub mod bar;
pub mod batch;
pub mod filestats;
pub mod generation;
pub mod module;
pub mod report;
pub mod result;
pub mod stats;
