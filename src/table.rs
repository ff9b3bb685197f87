//! The registry of watched descriptors.
//!
//! Every open watch descriptor is owned by exactly one `WatchEntry`, and
//! every entry lives in the table. The table keeps two indexes: entries are
//! stored by descriptor and looked up by path through a second map of path
//! to descriptor, so both always see the same set of entries. All mutation
//! happens through a `Table` guard which holds the table lock for the whole
//! operation, kernel subscription included.
use std::collections::{HashMap, HashSet};
use std::os::fd::{AsFd, AsRawFd, OwnedFd, RawFd};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace};

use crate::codec;
use crate::error::{Error, Result};
use crate::event::Event;
use crate::queue::AsQueue;
use crate::utils::open_watch_fd;

#[derive(Debug)]
pub struct WatchEntry {
    path: PathBuf,
    fd: OwnedFd,
    is_dir: bool,
    direct: Event,
    implied: Event,
}

impl WatchEntry {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn descriptor(&self) -> RawFd {
        self.fd.as_raw_fd()
    }

    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    /// Events requested for this exact path.
    pub fn direct(&self) -> Event {
        self.direct
    }

    /// Events requested through a recursively watched parent directory.
    pub fn implied(&self) -> Event {
        self.implied
    }

    pub fn mask(&self) -> Event {
        self.direct | self.implied
    }

    fn add(&mut self, mask: Event, direct: bool) {
        if direct {
            self.direct |= mask;
        } else {
            self.implied |= mask;
        }
    }

    fn clear(&mut self, direct: bool) {
        if direct {
            self.direct = Event::empty();
        } else {
            self.implied = Event::empty();
        }
    }
}

#[derive(Default)]
struct Index {
    by_fd: HashMap<RawFd, WatchEntry>,
    by_path: HashMap<PathBuf, RawFd>,
    /// Descriptor numbers released since they were last in use.
    released: HashSet<RawFd>,
    closed: bool,
}

impl Index {
    fn entry_mut(&mut self, path: &Path) -> Option<&mut WatchEntry> {
        let fd = *self.by_path.get(path)?;
        self.by_fd.get_mut(&fd)
    }

    fn insert(&mut self, entry: WatchEntry) {
        self.released.remove(&entry.descriptor());
        self.by_path.insert(entry.path.clone(), entry.descriptor());
        self.by_fd.insert(entry.descriptor(), entry);
    }

    /// Drops an entry from both indexes. The descriptor is closed when the
    /// returned entry goes out of scope.
    fn release(&mut self, fd: RawFd) -> Option<WatchEntry> {
        let entry = self.by_fd.remove(&fd)?;
        self.by_path.remove(&entry.path);
        self.released.insert(fd);
        trace!(path = %entry.path.display(), fd, "released watch");
        Some(entry)
    }
}

pub struct WatchTable<Q> {
    queue: Q,
    index: Mutex<Index>,
}

impl<Q: AsQueue> WatchTable<Q> {
    pub fn new(queue: Q) -> Self {
        Self {
            queue,
            index: Mutex::new(Index::default()),
        }
    }

    pub fn queue(&self) -> &Q {
        &self.queue
    }

    pub fn lock(&self) -> Table<'_, Q> {
        Table {
            queue: &self.queue,
            index: self.index.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Closes every watch descriptor and then the queue itself. Later calls
    /// are no-ops, and later registrations fail with `Error::Closed`.
    pub fn teardown(&self) -> Result<()> {
        let mut table = self.lock();
        if !table.index.closed {
            table.index.closed = true;
            let fds: Vec<RawFd> = table.index.by_fd.keys().copied().collect();
            debug!(watches = fds.len(), "tearing down watch table");
            for fd in fds {
                drop(table.index.release(fd));
            }
        }
        self.queue.close()?;
        Ok(())
    }
}

/// Exclusive access to the table.
pub struct Table<'a, Q> {
    queue: &'a Q,
    index: MutexGuard<'a, Index>,
}

impl<Q: AsQueue> Table<'_, Q> {
    pub fn get(&self, fd: RawFd) -> Option<&WatchEntry> {
        self.index.by_fd.get(&fd)
    }

    pub fn get_path(&self, path: &Path) -> Option<&WatchEntry> {
        let fd = self.index.by_path.get(path)?;
        self.index.by_fd.get(fd)
    }

    pub fn entries(&self) -> impl Iterator<Item = &WatchEntry> {
        self.index.by_fd.values()
    }

    pub fn len(&self) -> usize {
        self.index.by_fd.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.by_fd.is_empty()
    }

    /// Registers `path` for `mask`, either directly or as the child of a
    /// recursively watched directory.
    ///
    /// If the path already has an entry the mask is merged into it, the
    /// kernel subscription is widened and `Error::AlreadyWatching` is
    /// returned so callers can tell a merge from a fresh registration.
    pub fn open(&mut self, path: &Path, mask: Event, direct: bool, is_dir: bool) -> Result<()> {
        if self.index.closed {
            return Err(Error::Closed);
        }
        if mask.is_empty() {
            return Err(Error::NoEvents(path.to_path_buf()));
        }

        let queue = self.queue;
        if let Some(entry) = self.index.entry_mut(path) {
            let previous = (entry.direct, entry.implied);
            entry.add(mask, direct);
            let flags = codec::subscription(entry.direct, entry.implied, entry.is_dir);
            if let Err(source) = queue.subscribe(entry.fd.as_fd(), flags) {
                (entry.direct, entry.implied) = previous;
                return Err(Error::Subscribe {
                    path: path.to_path_buf(),
                    source,
                });
            }
            return Err(Error::AlreadyWatching(path.to_path_buf()));
        }

        let fd = open_watch_fd(path).map_err(|source| Error::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let mut entry = WatchEntry {
            path: path.to_path_buf(),
            fd,
            is_dir,
            direct: Event::empty(),
            implied: Event::empty(),
        };
        entry.add(mask, direct);
        queue
            .subscribe(entry.fd.as_fd(), codec::subscription(entry.direct, entry.implied, is_dir))
            .map_err(|source| Error::Subscribe {
                path: path.to_path_buf(),
                source,
            })?;
        trace!(path = %path.display(), fd = entry.descriptor(), ?mask, direct, "opened watch");
        self.index.insert(entry);
        Ok(())
    }

    /// Drops the direct or implied part of the watch on `path`. The entry is
    /// released once neither part is left.
    pub fn close(&mut self, path: &Path, direct: bool) -> Result<()> {
        let queue = self.queue;
        let Some(entry) = self.index.entry_mut(path) else {
            return Err(Error::NotWatching(path.to_path_buf()));
        };

        let previous = (entry.direct, entry.implied);
        entry.clear(direct);
        if entry.mask().is_empty() {
            let fd = entry.descriptor();
            let unsubscribed = queue.unsubscribe(entry.fd.as_fd());
            drop(self.index.release(fd));
            return unsubscribed.map_err(|source| Error::Unsubscribe {
                path: path.to_path_buf(),
                source,
            });
        }

        let flags = codec::subscription(entry.direct, entry.implied, entry.is_dir);
        if let Err(source) = queue.subscribe(entry.fd.as_fd(), flags) {
            (entry.direct, entry.implied) = previous;
            return Err(Error::Subscribe {
                path: path.to_path_buf(),
                source,
            });
        }
        Ok(())
    }

    /// Releases the entry for `fd` regardless of its masks. Used when the
    /// kernel reports the file behind the descriptor is gone.
    pub fn remove(&mut self, fd: RawFd) -> bool {
        self.index.release(fd).is_some()
    }

    /// Releases the implied-only entries below `dir` after `dir` was moved
    /// away, since their paths no longer name anything. Returns how many were
    /// released.
    pub fn remove_below(&mut self, dir: &Path) -> usize {
        let stale: Vec<RawFd> = self
            .index
            .by_fd
            .values()
            .filter(|entry| entry.direct.is_empty())
            .filter(|entry| entry.path != dir && entry.path.starts_with(dir))
            .map(WatchEntry::descriptor)
            .collect();
        for fd in &stale {
            drop(self.index.release(*fd));
        }
        stale.len()
    }

    /// True once for a descriptor that was released and not reused since.
    pub fn forget_released(&mut self, fd: RawFd) -> bool {
        self.index.released.remove(&fd)
    }
}
