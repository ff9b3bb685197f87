//! The single reader of the kernel queue.
//!
//! Each wake-up is dispatched under the table lock into a batch of portable
//! events. The batch is sent only after the lock is released, in the order
//! it was built. Sending blocks while the consumer is behind, which stalls
//! the loop instead of buffering.
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;
use tracing::{debug, error, trace, warn};

use crate::codec;
use crate::diff;
use crate::error::Result;
use crate::event::{Event, EventInfo, KernelFlags, RawNotification};
use crate::queue::{AsQueue, Wakeup};
use crate::table::WatchTable;

pub struct Monitor<Q> {
    table: Arc<WatchTable<Q>>,
    events: Sender<EventInfo>,
}

impl<Q: AsQueue> Monitor<Q> {
    pub fn new(table: Arc<WatchTable<Q>>, events: Sender<EventInfo>) -> Self {
        Self { table, events }
    }

    pub fn spawn(self) -> std::io::Result<JoinHandle<Result<()>>> {
        thread::Builder::new()
            .name("kqwatch monitor".to_string())
            .spawn(move || self.run())
    }

    /// Runs until the queue is stopped, the receiver goes away or the watch
    /// state becomes inconsistent. A failed read is logged and retried.
    pub fn run(self) -> Result<()> {
        loop {
            let notification = match self.table.queue().wait() {
                Ok(Wakeup::Notification(notification)) => notification,
                Ok(Wakeup::Stop) => {
                    debug!("monitor stopped");
                    return Ok(());
                }
                Err(err) => {
                    warn!("failed to read kernel events: {err}");
                    continue;
                }
            };

            let batch = match self.dispatch(notification) {
                Ok(batch) => batch,
                Err(err) => {
                    error!("stopping monitor: {err}");
                    return Err(err);
                }
            };
            for event in batch {
                if self.events.send(event).is_err() {
                    debug!("event receiver dropped, stopping monitor");
                    return Ok(());
                }
            }
        }
    }

    fn dispatch(&self, notification: RawNotification) -> Result<Vec<EventInfo>> {
        let mut batch = Vec::new();
        let mut table = self.table.lock();
        let fd = notification.descriptor;

        let Some(entry) = table.get(fd) else {
            if table.forget_released(fd) {
                warn!(fd, flags = ?notification.flags, "notification for a released descriptor");
            } else {
                warn!(fd, flags = ?notification.flags, "notification for an unregistered descriptor");
            }
            return Ok(batch);
        };

        let path = entry.path().to_path_buf();
        let is_dir = entry.is_dir();
        let mask = entry.mask();
        // A child moved out from under a recursive watch no longer has a path.
        let moved = notification.flags.contains(KernelFlags::RENAME) && entry.direct().is_empty();
        let event = codec::decode(notification.flags, mask);
        trace!(path = %path.display(), flags = ?notification.flags, ?event, "dispatching");

        if is_dir {
            if notification.deleted || moved {
                // A deleted directory also reports a write.
                let event = if notification.deleted {
                    event - (Event::WRITE | Event::NOTE_WRITE)
                } else {
                    event
                };
                if !event.is_empty() {
                    batch.push(EventInfo::new(true, path.clone(), event, Some(notification)));
                }
                table.remove(fd);
                if moved {
                    let released = table.remove_below(&path);
                    debug!(path = %path.display(), released, "directory moved away");
                }
                return Ok(batch);
            }
            if notification.flags.contains(KernelFlags::WRITE) {
                diff::reconcile(&mut table, &path, mask, &mut batch)?;
            }
        } else if !event.is_empty() {
            batch.push(EventInfo::new(false, path, event, Some(notification)));
        }

        if notification.deleted || moved {
            table.remove(fd);
        }
        Ok(batch)
    }
}
