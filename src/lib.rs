//! File-system notifications on top of kqueue.
//!
//! kqueue reports changes per open descriptor. [`KqueueWatcher`] keeps one
//! descriptor per watched path, emulates recursive directory watches and
//! rebuilds Create events by listing directories when they change.
pub mod codec;
pub mod conf;
pub mod diff;
pub mod error;
pub mod event;
pub mod monitor;
pub mod queue;
pub mod table;
pub mod utils;
pub mod watcher;

pub use error::{Error, Result};
pub use event::{Event, EventInfo, KernelFlags, RawNotification};
#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd",
    target_os = "dragonfly"
))]
pub use queue::KqueueQueue;
pub use watcher::{KqueueWatcher, Watcher};
