pub mod monitor;

pub use monitor::{CheckinMonitor, CheckinStatus};
