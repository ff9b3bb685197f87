use std::io;
use std::os::fd::{AsRawFd, BorrowedFd, OwnedFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use nix::errno::Errno;
use nix::libc::timespec;
use nix::sys::event::{EventFilter, EventFlag, FilterFlag, KEvent, Kqueue};
use nix::unistd::{pipe, write};
use tracing::trace;

use super::{AsQueue, Wakeup};
use crate::event::{KernelFlags, RawNotification};
use crate::utils::set_fd_nonblocking;

const NO_TIME_WAIT: timespec = unsafe { std::mem::zeroed() };

/// kqueue with a self-pipe used as the stop signal.
pub struct KqueueQueue {
    kq: RwLock<Option<Kqueue>>,
    stopped: AtomicBool,
    stop_rx: OwnedFd,
    stop_tx: OwnedFd,
}

impl KqueueQueue {
    pub fn new() -> io::Result<Self> {
        let kq = Kqueue::new()?;
        let (stop_rx, stop_tx) = pipe()?;
        set_fd_nonblocking(stop_rx.as_raw_fd())?;
        set_fd_nonblocking(stop_tx.as_raw_fd())?;

        let ev = KEvent::new(
            stop_rx.as_raw_fd() as _,
            EventFilter::EVFILT_READ,
            EventFlag::EV_ADD,
            FilterFlag::empty(),
            0,
            0,
        );
        kq.kevent(&[ev], &mut [], Some(NO_TIME_WAIT))?;

        Ok(Self {
            kq: RwLock::new(Some(kq)),
            stopped: AtomicBool::new(false),
            stop_rx,
            stop_tx,
        })
    }

    fn change(&self, ev: KEvent) -> io::Result<()> {
        let guard = self.kq.read().unwrap_or_else(PoisonError::into_inner);
        let kq = guard
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "kqueue is closed"))?;
        kq.kevent(&[ev], &mut [], Some(NO_TIME_WAIT))?;
        Ok(())
    }
}

impl AsQueue for KqueueQueue {
    fn subscribe(&self, fd: BorrowedFd<'_>, flags: KernelFlags) -> io::Result<()> {
        self.change(KEvent::new(
            fd.as_raw_fd() as _,
            EventFilter::EVFILT_VNODE,
            EventFlag::EV_ADD | EventFlag::EV_ENABLE | EventFlag::EV_CLEAR,
            FilterFlag::from_bits_truncate(flags.bits() as _),
            0,
            0,
        ))
    }

    fn unsubscribe(&self, fd: BorrowedFd<'_>) -> io::Result<()> {
        self.change(KEvent::new(
            fd.as_raw_fd() as _,
            EventFilter::EVFILT_VNODE,
            EventFlag::EV_DELETE,
            FilterFlag::empty(),
            0,
            0,
        ))
    }

    fn wait(&self) -> io::Result<Wakeup> {
        let guard = self.kq.read().unwrap_or_else(PoisonError::into_inner);
        let Some(kq) = guard.as_ref() else {
            return Ok(Wakeup::Stop);
        };
        let mut eventlist = [KEvent::new(
            0,
            EventFilter::EVFILT_VNODE,
            EventFlag::empty(),
            FilterFlag::empty(),
            0,
            0,
        )];
        loop {
            if self.stopped.load(Ordering::Acquire) {
                return Ok(Wakeup::Stop);
            }
            match kq.kevent(&[], &mut eventlist, None) {
                Ok(0) | Err(Errno::EINTR) => continue,
                Ok(_) => break,
                Err(e) => return Err(e.into()),
            }
        }

        let ev = eventlist[0];
        trace!(ident = ev.ident(), fflags = ?ev.fflags(), "kevent");
        if ev.flags().contains(EventFlag::EV_ERROR) {
            return Err(io::Error::from_raw_os_error(ev.data() as _));
        }
        if ev.ident() == self.stop_rx.as_raw_fd() as usize {
            return Ok(Wakeup::Stop);
        }
        Ok(Wakeup::Notification(RawNotification::new(
            ev.ident() as _,
            KernelFlags::from_bits_truncate(ev.fflags().bits() as _),
        )))
    }

    fn stop(&self) -> io::Result<()> {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        match write(&self.stop_tx, &[1]) {
            Ok(_) | Err(Errno::EAGAIN) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn close(&self) -> io::Result<()> {
        self.stop()?;
        // The monitor releases its read guard once it observes the stop.
        let kq = self
            .kq
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(kq);
        Ok(())
    }
}
