//! NFS client statistics: parse `/proc/self/mountstats` and turn two samples
//! into per-operation rates and latencies.

pub mod collectors;
pub mod config;
pub mod display;
pub mod metrics;
pub mod models;
pub mod monitor;
pub mod stats;
pub mod util;
