//! Translation between portable events and kqueue vnode flags.
use crate::event::{Event, KernelFlags};

/// Kernel flags and the portable event each one stands for.
const KINDS: [(KernelFlags, Event); 3] = [
    (KernelFlags::WRITE, Event::WRITE),
    (KernelFlags::RENAME, Event::RENAME),
    (KernelFlags::DELETE, Event::DELETE),
];

/// Portable events that kqueue cannot report natively. `CREATE` is
/// synthesized by diffing directory listings instead.
pub const UNREPRESENTABLE: Event = Event::CREATE;

/// Converts requested events to the kernel flags that report them.
pub fn encode(mask: Event) -> KernelFlags {
    let mut flags = KernelFlags::from_bits_truncate((mask - UNREPRESENTABLE).bits());
    for (kernel, portable) in KINDS {
        if mask.contains(portable) {
            flags |= kernel;
        }
    }
    flags
}

/// Converts kernel flags into the events the watcher asked for in `watched`.
pub fn decode(flags: KernelFlags, watched: Event) -> Event {
    let mut event = Event::from_bits_truncate(flags.bits()) & watched;
    for (kernel, portable) in KINDS {
        if flags.contains(kernel) && watched.contains(portable) {
            event |= portable;
        }
    }
    event
}

/// Kernel flags every implied entry is subscribed to, whatever its mask, so
/// a child that leaves its directory is released.
pub const TRACKING: KernelFlags = KernelFlags::DELETE.union(KernelFlags::RENAME);

/// Kernel flags to subscribe with for an entry watched for `direct` and
/// `implied`.
///
/// Directories watched for `CREATE` need `NOTE_WRITE` to learn that their
/// listing changed.
pub fn subscription(direct: Event, implied: Event, is_dir: bool) -> KernelFlags {
    let mask = direct | implied;
    let mut flags = encode(mask);
    if is_dir && mask.contains(Event::CREATE) {
        flags |= KernelFlags::WRITE;
    }
    if !implied.is_empty() {
        flags |= TRACKING;
    }
    flags
}
