//! In-memory queue for driving the table and monitor from tests.
//!
//! Subscriptions are recorded instead of handed to a kernel, and
//! notifications are injected by the test through `notify`.
use std::collections::HashMap;
use std::io;
use std::os::fd::{AsRawFd, BorrowedFd, RawFd};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::{AsQueue, Wakeup};
use crate::event::{KernelFlags, RawNotification};

#[derive(Clone)]
pub struct ScriptedQueue {
    inner: Arc<Inner>,
}

struct Inner {
    subscriptions: Mutex<HashMap<RawFd, KernelFlags>>,
    subscribe_calls: AtomicUsize,
    fail_subscribe: AtomicBool,
    stopped: AtomicBool,
    closed: AtomicBool,
    tx: Sender<io::Result<Wakeup>>,
    rx: Receiver<io::Result<Wakeup>>,
}

impl Default for ScriptedQueue {
    fn default() -> Self {
        let (tx, rx) = unbounded();
        Self {
            inner: Arc::new(Inner {
                subscriptions: Mutex::new(HashMap::new()),
                subscribe_calls: AtomicUsize::new(0),
                fail_subscribe: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                tx,
                rx,
            }),
        }
    }
}

impl ScriptedQueue {
    pub fn notify(&self, fd: RawFd, flags: KernelFlags) {
        let _ = self
            .inner
            .tx
            .send(Ok(Wakeup::Notification(RawNotification::new(fd, flags))));
    }

    /// Makes the next `wait` fail with `errno`.
    pub fn fail_wait(&self, errno: i32) {
        let _ = self.inner.tx.send(Err(io::Error::from_raw_os_error(errno)));
    }

    pub fn subscription(&self, fd: RawFd) -> Option<KernelFlags> {
        self.inner.subscriptions.lock().unwrap().get(&fd).copied()
    }

    pub fn subscribed(&self) -> usize {
        self.inner.subscriptions.lock().unwrap().len()
    }

    pub fn subscribe_calls(&self) -> usize {
        self.inner.subscribe_calls.load(Ordering::SeqCst)
    }

    pub fn fail_subscriptions(&self, fail: bool) {
        self.inner.fail_subscribe.store(fail, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }
}

impl AsQueue for ScriptedQueue {
    fn subscribe(&self, fd: BorrowedFd<'_>, flags: KernelFlags) -> io::Result<()> {
        if self.inner.fail_subscribe.load(Ordering::SeqCst) {
            return Err(io::Error::from_raw_os_error(nix::libc::EMFILE));
        }
        self.inner.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        self.inner
            .subscriptions
            .lock()
            .unwrap()
            .insert(fd.as_raw_fd(), flags);
        Ok(())
    }

    fn unsubscribe(&self, fd: BorrowedFd<'_>) -> io::Result<()> {
        self.inner
            .subscriptions
            .lock()
            .unwrap()
            .remove(&fd.as_raw_fd());
        Ok(())
    }

    fn wait(&self) -> io::Result<Wakeup> {
        if self.inner.stopped.load(Ordering::SeqCst) {
            return Ok(Wakeup::Stop);
        }
        self.inner.rx.recv().unwrap_or(Ok(Wakeup::Stop))
    }

    fn stop(&self) -> io::Result<()> {
        self.inner.stopped.store(true, Ordering::SeqCst);
        let _ = self.inner.tx.send(Ok(Wakeup::Stop));
        Ok(())
    }

    fn close(&self) -> io::Result<()> {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.subscriptions.lock().unwrap().clear();
        self.stop()
    }
}
