//! Side-effecting operations: filesystem, child processes, progress output.
//!
//! Everything here is kept behind small functions or traits so the campaign
//! can be exercised in tests with scripted drivers and temporary directories.

pub mod config;
pub mod driver;
pub mod filestats;
pub mod module_list;
pub mod output_log;
pub mod process;
pub mod progress;
pub mod seeds;
pub mod worker;
