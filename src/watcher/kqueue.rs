use std::path::{self, Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use crossbeam_channel::Sender;
use tracing::{debug, error, warn};

use super::Watcher;
use crate::error::{Error, Result};
use crate::event::{Event, EventInfo};
use crate::monitor::Monitor;
use crate::queue::AsQueue;
use crate::table::{Table, WatchTable};
use crate::utils::{is_dir, list_dir};

/// Watcher backed by a kernel event queue that reports per-descriptor vnode
/// changes. Recursion is emulated: watching a directory registers its
/// immediate children, and every watched directory registers the children
/// it gains, so deeper levels are picked up as they change.
pub struct KqueueWatcher<Q: AsQueue> {
    table: Arc<WatchTable<Q>>,
    monitor: Mutex<Option<JoinHandle<Result<()>>>>,
}

#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd",
    target_os = "dragonfly"
))]
impl KqueueWatcher<crate::queue::KqueueQueue> {
    pub fn new(events: Sender<EventInfo>) -> Result<Self> {
        Self::with_queue(crate::queue::KqueueQueue::new()?, events)
    }
}

impl<Q: AsQueue> KqueueWatcher<Q> {
    /// Starts the monitor on `queue`; events are delivered on `events`.
    pub fn with_queue(queue: Q, events: Sender<EventInfo>) -> Result<Self> {
        let table = Arc::new(WatchTable::new(queue));
        let handle = Monitor::new(table.clone(), events).spawn()?;
        Ok(Self {
            table,
            monitor: Mutex::new(Some(handle)),
        })
    }

    /// Waits for the monitor to finish and returns how it ended. A monitor
    /// that found the watch state inconsistent ends with
    /// `Error::Inconsistent`.
    pub fn join(&self) -> Result<()> {
        let handle = self
            .monitor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match handle {
            Some(handle) => handle.join().map_err(|_| Error::MonitorPanicked)?,
            None => Ok(()),
        }
    }
}

impl<Q: AsQueue> Watcher for KqueueWatcher<Q> {
    fn watch(&self, path: &Path, events: Event) -> Result<()> {
        let path = path::absolute(path)?;
        let dir = is_dir(&path)?;
        let mut table = self.table.lock();
        watch_tree(&mut table, &path, events, dir)
    }

    fn unwatch(&self, path: &Path) -> Result<()> {
        let path = path::absolute(path)?;
        let mut table = self.table.lock();
        let dir = table
            .get_path(&path)
            .map(|entry| entry.is_dir())
            .ok_or_else(|| Error::NotWatching(path.clone()))?;
        unwatch_tree(&mut table, &path, dir)
    }

    fn rewatch(&self, path: &Path, old: Event, new: Event) -> Result<()> {
        let path = path::absolute(path)?;
        let mut table = self.table.lock();
        let dir = table
            .get_path(&path)
            .map(|entry| entry.is_dir())
            .ok_or_else(|| Error::NotWatching(path.clone()))?;

        unwatch_tree(&mut table, &path, dir)?;
        if let Err(err) = watch_tree(&mut table, &path, new, dir) {
            warn!(path = %path.display(), "rewatch failed, restoring {old:?}: {err}");
            if let Err(restore) = watch_tree(&mut table, &path, old, dir) {
                error!(path = %path.display(), "failed to restore watch: {restore}");
            }
            return Err(err);
        }
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.table.queue().stop()?;
        self.table.teardown()
    }
}

impl<Q: AsQueue> Drop for KqueueWatcher<Q> {
    fn drop(&mut self) {
        if let Err(err) = Watcher::close(self) {
            warn!("failed to close watcher: {err}");
        }
    }
}

/// Registers `path` directly and its immediate children as implied watches.
fn watch_tree<Q: AsQueue>(table: &mut Table<'_, Q>, path: &Path, mask: Event, dir: bool) -> Result<()> {
    match table.open(path, mask, true, dir) {
        Ok(()) | Err(Error::AlreadyWatching(_)) => {}
        Err(err) => return Err(err),
    }
    debug!(path = %path.display(), ?mask, "watching");
    if !dir {
        return Ok(());
    }

    for child in list_dir(path)? {
        match table.open(&child.path, mask, false, child.is_dir) {
            Ok(()) | Err(Error::AlreadyWatching(_)) => {}
            Err(err) if err.is_vanished() => {}
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

/// Drops the direct watch on `path` and the implied watches it handed down.
fn unwatch_tree<Q: AsQueue>(table: &mut Table<'_, Q>, path: &Path, dir: bool) -> Result<()> {
    if dir {
        for child in implied_descendants(table, path) {
            table.close(&child, false)?;
        }
    }
    debug!(path = %path.display(), "unwatching");
    table.close(path, true)
}

/// Descendants of `root` holding an implied mask that came through `root`.
/// Subtrees below another directly watched path belong to that watch and
/// are skipped. Nothing is returned while `root` is itself covered by a
/// recursive watch further up.
fn implied_descendants<Q: AsQueue>(table: &Table<'_, Q>, root: &Path) -> Vec<PathBuf> {
    if table
        .get_path(root)
        .is_some_and(|entry| !entry.implied().is_empty())
    {
        return Vec::new();
    }

    let below = |entry: &Path| entry != root && entry.starts_with(root);
    let owners: Vec<&Path> = table
        .entries()
        .filter(|entry| !entry.direct().is_empty() && below(entry.path()))
        .map(|entry| entry.path())
        .collect();

    table
        .entries()
        .filter(|entry| !entry.implied().is_empty() && below(entry.path()))
        .map(|entry| entry.path())
        .filter(|path| {
            !owners
                .iter()
                .any(|owner| path != owner && path.starts_with(owner))
        })
        .map(Path::to_path_buf)
        .collect()
}
