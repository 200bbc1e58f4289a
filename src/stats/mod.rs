pub mod delta;
pub mod filter;

pub use delta::{
    compute_delta, event_deltas, mount_deltas, mount_report, mount_summary,
    AttrCacheDelta, MountReport, MountSummary,
};
pub use filter::OpFilter;
