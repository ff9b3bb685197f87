//! The portable event vocabulary shared by every backend.
//!
//! `Event` carries two kinds of bits. The low byte mirrors the kqueue vnode
//! filter flags bit-for-bit, so a caller on a BSD can ask for e.g.
//! `NOTE_ATTRIB` directly. The second byte holds the portable events that
//! every backend understands. `KernelFlags` is the raw flag set a kernel
//! notification carries.
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::os::fd::RawFd;
use std::path::{Path, PathBuf};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct Event: u32 {
        const NOTE_DELETE = 0x0001;
        const NOTE_WRITE = 0x0002;
        const NOTE_EXTEND = 0x0004;
        const NOTE_ATTRIB = 0x0008;
        const NOTE_LINK = 0x0010;
        const NOTE_RENAME = 0x0020;
        const NOTE_REVOKE = 0x0040;

        const CREATE = 0x0100;
        const DELETE = 0x0200;
        const WRITE = 0x0400;
        const RENAME = 0x0800;
    }
}

bitflags! {
    /// Vnode filter flags as reported by the kernel queue.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct KernelFlags: u32 {
        const DELETE = 0x0001;
        const WRITE = 0x0002;
        const EXTEND = 0x0004;
        const ATTRIB = 0x0008;
        const LINK = 0x0010;
        const RENAME = 0x0020;
        const REVOKE = 0x0040;
    }
}

/// A single notification read off the kernel queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawNotification {
    pub descriptor: RawFd,
    pub flags: KernelFlags,
    /// The descriptor no longer refers to a live file (deleted or revoked).
    pub deleted: bool,
}

impl RawNotification {
    pub fn new(descriptor: RawFd, flags: KernelFlags) -> Self {
        Self {
            descriptor,
            flags,
            deleted: flags.intersects(KernelFlags::DELETE | KernelFlags::REVOKE),
        }
    }
}

/// A portable event as delivered on the outbound channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventInfo {
    is_dir: bool,
    path: PathBuf,
    event: Event,
    raw: Option<RawNotification>,
}

impl EventInfo {
    pub fn new(is_dir: bool, path: PathBuf, event: Event, raw: Option<RawNotification>) -> Self {
        Self {
            is_dir,
            path,
            event,
            raw,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn event(&self) -> Event {
        self.event
    }

    /// The kernel notification this event was decoded from. Events that were
    /// synthesized from a directory listing have none.
    pub fn sys(&self) -> Option<&RawNotification> {
        self.raw.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_bits_overlap_kernel_flags() {
        assert_eq!(Event::NOTE_DELETE.bits(), KernelFlags::DELETE.bits());
        assert_eq!(Event::NOTE_WRITE.bits(), KernelFlags::WRITE.bits());
        assert_eq!(Event::NOTE_REVOKE.bits(), KernelFlags::REVOKE.bits());
        assert!(!Event::CREATE.intersects(Event::from_bits_truncate(KernelFlags::all().bits())));
    }

    #[test]
    fn revoke_counts_as_deleted() {
        assert!(RawNotification::new(3, KernelFlags::REVOKE).deleted);
        assert!(RawNotification::new(3, KernelFlags::DELETE | KernelFlags::LINK).deleted);
        assert!(!RawNotification::new(3, KernelFlags::WRITE).deleted);
    }

    #[test]
    fn event_parses_from_text() {
        let parsed: Event = bitflags::parser::from_str("CREATE | WRITE").unwrap();
        assert_eq!(parsed, Event::CREATE | Event::WRITE);
    }
}
