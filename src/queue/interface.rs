//! Abstraction over the kernel event queue the watcher is built on.
//!
//! The queue only knows descriptors and flags. Paths, masks and recursion
//! live in the watch table, which is the only caller of `subscribe` and
//! `unsubscribe`. The monitor loop is the only caller of `wait`.
use std::io;
use std::os::fd::BorrowedFd;

use crate::event::{KernelFlags, RawNotification};

pub enum Wakeup {
    Notification(RawNotification),
    Stop,
}

pub trait AsQueue: Send + Sync + 'static {
    /// Subscribes `fd` for `flags`, replacing any previous subscription of
    /// the same descriptor. Notifications are cleared on read.
    fn subscribe(&self, fd: BorrowedFd<'_>, flags: KernelFlags) -> io::Result<()>;

    fn unsubscribe(&self, fd: BorrowedFd<'_>) -> io::Result<()>;

    /// Blocks until a notification arrives or the queue is stopped. Once
    /// stopped, every call returns `Wakeup::Stop`.
    fn wait(&self) -> io::Result<Wakeup>;

    fn stop(&self) -> io::Result<()>;

    /// Stops the queue and releases its descriptor. Safe to call repeatedly.
    fn close(&self) -> io::Result<()>;
}
