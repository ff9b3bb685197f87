mod interface;
pub use interface::Watcher;

mod kqueue;
pub use kqueue::KqueueWatcher;
