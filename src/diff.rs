//! Reconstructs Create events for a directory from its listing.
//!
//! kqueue only says that a directory changed. Every child seen in the
//! current listing is registered with the table; children the table did not
//! know yet are the ones that were created. Removed children are not
//! detected here: each child already has its own descriptor, which reports
//! its deletion. A child created and deleted between two wake-ups is never
//! seen.
use std::io;
use std::path::Path;

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::event::{Event, EventInfo};
use crate::queue::AsQueue;
use crate::table::Table;
use crate::utils::list_dir;

/// Registers the children of `dir` for `mask` and queues a Create event in
/// `out` for every child that was not watched before.
///
/// Any failure other than the directory or a child vanishing mid-listing
/// leaves the table out of step with the directory and is reported as
/// `Error::Inconsistent`.
pub fn reconcile<Q: AsQueue>(
    table: &mut Table<'_, Q>,
    dir: &Path,
    mask: Event,
    out: &mut Vec<EventInfo>,
) -> Result<()> {
    let children = match list_dir(dir) {
        Ok(children) => children,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(dir = %dir.display(), "directory vanished before it could be listed");
            return Ok(());
        }
        Err(err) => return Err(Error::inconsistent(dir, err.into())),
    };

    for child in children {
        match table.open(&child.path, mask, false, child.is_dir) {
            Ok(()) => {
                if mask.contains(Event::CREATE) {
                    out.push(EventInfo::new(child.is_dir, child.path, Event::CREATE, None));
                }
            }
            Err(Error::AlreadyWatching(_)) => {}
            Err(err) if err.is_vanished() => {
                trace!(path = %child.path.display(), "child vanished before it could be watched");
            }
            Err(err) => return Err(Error::inconsistent(dir, err)),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::scripted::ScriptedQueue;
    use crate::table::WatchTable;
    use std::fs;

    #[test]
    fn new_children_become_create_events() {
        let dir = tempfile::tempdir().unwrap();
        let table = WatchTable::new(ScriptedQueue::default());
        let mut t = table.lock();
        let mut out = Vec::new();

        reconcile(&mut t, dir.path(), Event::CREATE, &mut out).unwrap();
        assert!(out.is_empty());

        fs::write(dir.path().join("a.txt"), b"a").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        reconcile(&mut t, dir.path(), Event::CREATE, &mut out).unwrap();

        assert_eq!(
            out,
            vec![
                EventInfo::new(false, dir.path().join("a.txt"), Event::CREATE, None),
                EventInfo::new(true, dir.path().join("sub"), Event::CREATE, None),
            ]
        );
        let sub = t.get_path(&dir.path().join("sub")).unwrap();
        assert!(sub.is_dir());
        assert_eq!(sub.implied(), Event::CREATE);
        assert!(sub.direct().is_empty());
    }

    #[test]
    fn known_children_are_not_reported_again() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"a").unwrap();
        let table = WatchTable::new(ScriptedQueue::default());
        let mut t = table.lock();
        let mut out = Vec::new();

        reconcile(&mut t, dir.path(), Event::CREATE, &mut out).unwrap();
        out.clear();
        reconcile(&mut t, dir.path(), Event::CREATE, &mut out).unwrap();

        assert!(out.is_empty());
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn children_are_tracked_without_create_in_mask() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"a").unwrap();
        let table = WatchTable::new(ScriptedQueue::default());
        let mut t = table.lock();
        let mut out = Vec::new();

        reconcile(&mut t, dir.path(), Event::DELETE, &mut out).unwrap();

        assert!(out.is_empty());
        assert_eq!(
            t.get_path(&dir.path().join("a.txt")).unwrap().implied(),
            Event::DELETE
        );
    }

    #[test]
    fn vanished_directory_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let table = WatchTable::new(ScriptedQueue::default());
        let mut t = table.lock();
        let mut out = Vec::new();

        reconcile(&mut t, &dir.path().join("gone"), Event::CREATE, &mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn failed_subscription_is_inconsistent() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"a").unwrap();
        let queue = ScriptedQueue::default();
        let table = WatchTable::new(queue.clone());
        let mut t = table.lock();
        let mut out = Vec::new();

        queue.fail_subscriptions(true);
        let err = reconcile(&mut t, dir.path(), Event::CREATE, &mut out).unwrap_err();

        assert!(matches!(err, Error::Inconsistent { ref path, .. } if path == dir.path()));
        assert!(out.is_empty());
        assert!(t.is_empty());
    }
}
