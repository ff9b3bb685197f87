use nix::fcntl::{open, OFlag};
use nix::sys::stat::Mode;
use std::fs;
use std::io;
use std::os::fd::{FromRawFd, OwnedFd};
use std::path::{Path, PathBuf};

#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd",
    target_os = "dragonfly"
))]
pub fn set_fd_nonblocking(fd: std::os::fd::RawFd) -> nix::Result<()> {
    use nix::fcntl::{fcntl, FcntlArg};

    let bits = fcntl(fd, FcntlArg::F_GETFL)?;
    let prev_flags = OFlag::from_bits_truncate(bits);
    fcntl(fd, FcntlArg::F_SETFL(prev_flags | OFlag::O_NONBLOCK))?;
    Ok(())
}

/// Opens the descriptor a vnode subscription is attached to.
pub fn open_watch_fd(path: &Path) -> nix::Result<OwnedFd> {
    let fd = open(
        path,
        OFlag::O_RDONLY | OFlag::O_NONBLOCK | OFlag::O_CLOEXEC,
        Mode::empty(),
    )?;
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

pub fn is_dir(path: &Path) -> io::Result<bool> {
    Ok(fs::metadata(path)?.is_dir())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Child {
    pub path: PathBuf,
    pub is_dir: bool,
}

/// Lists the immediate children of `dir`, sorted by path. Symlinks are
/// reported as non-directories and never followed.
pub fn list_dir(dir: &Path) -> io::Result<Vec<Child>> {
    let mut children = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        children.push(Child {
            path: entry.path(),
            is_dir: entry.file_type()?.is_dir(),
        });
    }
    children.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(children)
}
