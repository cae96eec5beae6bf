pub mod source;
pub mod steam_monitor;

pub use source::{HttpSnapshotSource, PrioritySource, SnapshotSource, StoreSource};
pub use steam_monitor::{MonitorHandle, PollReport, SteamMonitor};
