// src/dev/mod.rs

//! Dev-mode machinery: change detection, the reload dispatcher, the wire
//! protocol, the reload WebSocket server and the filesystem watcher.
//!
//! The dev loop cycles: watcher events → [`dispatcher`] → [`change`] →
//! orchestrator rebuild → new [`crate::build::BuildOutput`] → wire message
//! over [`server`]. Everything else in the crate flows one direction.

pub mod change;
pub mod dispatcher;
pub mod protocol;
pub mod server;
pub mod watcher;

pub use change::{detect_dev_changes, DevModeChange};
pub use dispatcher::{ReloadDispatcher, SessionCommand};
pub use protocol::{ContentScriptPayload, ReloadMessage};
pub use server::{start_reload_server, ReloadServerHandle};
pub use watcher::{spawn_watcher, WatcherHandle};
