//! Parallel output-generation campaign for fuzzing harness modules.
//!
//! Every module is driven through an external driver a fixed number of times;
//! each attempt ends up as one classified record in a line-oriented output
//! log, and a seed-input corpus is carried across generations. The crate is
//! split the same way throughout:
//!
//! - **[`core`]**: Pure, deterministic logic (result taxonomy, batch repair,
//!   seed-corpus transitions, statistics, rendering). No I/O.
//! - **[`io`]**: Side effects (config files, child processes, the driver
//!   adapter, worker tasks, logs, seed files, progress).
//!
//! [`scheduler`] runs the bounded worker pool and [`campaign`] ties one whole
//! invocation together.

pub mod campaign;
pub mod core;
pub mod io;
pub mod logging;
pub mod scheduler;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
