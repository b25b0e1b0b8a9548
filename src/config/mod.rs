// Daemon configuration module
//
// - types: the realm config file structures
// - store: locked in-memory mirror plus load/save
// - watcher: reload on external edits

pub mod store;
pub mod types;
pub mod watcher;

pub use store::ConfigStore;
pub use types::{DaemonConfig, ForwardingRule, NetworkFlags, NewRule};
