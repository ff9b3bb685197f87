//! The capability every file-system backend provides.
//!
//! Backends differ in what the kernel gives them. kqueue watches open
//! descriptors one at a time and cannot see inside a directory, so the
//! kqueue backend emulates recursion and Create events on top of it. Callers
//! only see this interface and the events on the channel they handed in.
use std::path::Path;

use crate::error::Result;
use crate::event::Event;

pub trait Watcher {
    /// Starts watching `path` for `events`. Directories are watched
    /// recursively.
    fn watch(&self, path: &Path, events: Event) -> Result<()>;

    fn unwatch(&self, path: &Path) -> Result<()>;

    /// Replaces the events `path` is watched for.
    fn rewatch(&self, path: &Path, old: Event, new: Event) -> Result<()>;

    /// Stops delivering events and releases every kernel resource. Calling
    /// it again is a no-op.
    fn close(&self) -> Result<()>;
}
