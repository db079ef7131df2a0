//! Recursive filesystem watch producing an ordered stream of [`FileEvent`]s.
//!
//! On Linux the watch is an inotify descriptor registered on the root and on
//! every directory beneath it. A pump task on the current runtime reads
//! events and forwards them, in kernel order, over an unbounded channel so a
//! slow consumer never overflows the kernel queue. Closing aborts the pump,
//! which drops the descriptor and releases every OS watch with it.
use crate::error::{HarnessError, Result};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use tokio::task::AbortHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileEventKind {
    Created,
    Modified,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    pub path: PathBuf,
    pub kind: FileEventKind,
}

impl FileEvent {
    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: FileEventKind::Created,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WatchOptions {
    /// Report files already present under the root as `Created`.
    pub report_existing: bool,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            report_existing: true,
        }
    }
}

#[derive(Debug, Default)]
struct CloseState {
    closed: AtomicBool,
    notify: Notify,
}

/// Cloneable handle that closes a watch from outside its owner, e.g. from a
/// deadline cleanup callback.
#[derive(Debug, Clone)]
pub struct WatchCloser {
    state: Arc<CloseState>,
    pump: Option<AbortHandle>,
}

impl WatchCloser {
    fn new(pump: Option<AbortHandle>) -> Self {
        Self {
            state: Arc::new(CloseState::default()),
            pump,
        }
    }

    /// Release the watch. Idempotent.
    pub fn close(&self) {
        if self.state.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(pump) = &self.pump {
            pump.abort();
        }
        self.state.notify.notify_waiters();
        tracing::debug!("filesystem watch closed");
    }

    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }
}

type EventResult = io::Result<FileEvent>;

/// Exclusive subscription to a watched tree.
#[derive(Debug)]
pub struct FsWatch {
    root: PathBuf,
    events: mpsc::UnboundedReceiver<EventResult>,
    closer: WatchCloser,
}

/// Producer side of a [`FsWatch::manual`] watch.
#[derive(Debug, Clone)]
pub struct WatchFeed {
    tx: mpsc::UnboundedSender<EventResult>,
    state: Arc<CloseState>,
}

impl WatchFeed {
    /// Push an event. Returns `false` once the watch has been closed.
    pub fn send(&self, event: FileEvent) -> bool {
        !self.state.closed.load(Ordering::SeqCst) && self.tx.send(Ok(event)).is_ok()
    }

    /// Push a watch failure; the consumer sees it as the next event.
    pub fn fail(&self, err: io::Error) -> bool {
        !self.state.closed.load(Ordering::SeqCst) && self.tx.send(Err(err)).is_ok()
    }
}

impl FsWatch {
    /// Start a recursive watch rooted at `root`. Must be called from within a
    /// tokio runtime.
    pub fn start(root: &Path, options: WatchOptions) -> Result<Self> {
        if !root.is_dir() {
            return Err(HarnessError::NotFound(root.to_path_buf()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let pump = inotify::spawn(root, options, tx).map_err(HarnessError::Watch)?;
        tracing::debug!(root = %root.display(), "filesystem watch started");
        Ok(Self {
            root: root.to_path_buf(),
            events: rx,
            closer: WatchCloser::new(Some(pump)),
        })
    }

    /// A watch whose events are pushed through the returned feed instead of
    /// coming from the OS.
    pub fn manual(root: &Path) -> (WatchFeed, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        let closer = WatchCloser::new(None);
        let feed = WatchFeed {
            tx,
            state: closer.state.clone(),
        };
        let watch = Self {
            root: root.to_path_buf(),
            events: rx,
            closer,
        };
        (feed, watch)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Next event in emission order, or `None` once the watch is closed or
    /// its source has ended.
    pub async fn next_event(&mut self) -> Option<EventResult> {
        let closed = self.closer.state.notify.notified();
        if self.closer.is_closed() {
            return None;
        }
        tokio::select! {
            event = self.events.recv() => event,
            _ = closed => None,
        }
    }

    pub fn closer(&self) -> WatchCloser {
        self.closer.clone()
    }

    pub fn close(&mut self) {
        self.closer.close();
        self.events.close();
    }

    pub fn is_closed(&self) -> bool {
        self.closer.is_closed()
    }
}

impl Drop for FsWatch {
    fn drop(&mut self) {
        self.closer.close();
    }
}

#[cfg(target_os = "linux")]
mod inotify {
    use super::{EventResult, FileEvent, FileEventKind, WatchOptions};
    use crate::walk::walk;
    use nix::sys::inotify::{AddWatchFlags, InitFlags, Inotify, InotifyEvent, WatchDescriptor};
    use std::collections::HashMap;
    use std::io;
    use std::os::fd::{AsFd, AsRawFd, RawFd};
    use std::path::{Path, PathBuf};
    use tokio::io::unix::AsyncFd;
    use tokio::sync::mpsc::UnboundedSender;
    use tokio::task::AbortHandle;

    struct InotifyFd(Inotify);

    impl AsRawFd for InotifyFd {
        fn as_raw_fd(&self) -> RawFd {
            self.0.as_fd().as_raw_fd()
        }
    }

    type Directories = HashMap<WatchDescriptor, PathBuf>;

    fn watch_mask() -> AddWatchFlags {
        AddWatchFlags::IN_CREATE
            | AddWatchFlags::IN_MOVED_TO
            | AddWatchFlags::IN_CLOSE_WRITE
            | AddWatchFlags::IN_DELETE
            | AddWatchFlags::IN_MOVED_FROM
    }

    fn event_kind(mask: AddWatchFlags) -> Option<FileEventKind> {
        if mask.intersects(AddWatchFlags::IN_CREATE | AddWatchFlags::IN_MOVED_TO) {
            Some(FileEventKind::Created)
        } else if mask.contains(AddWatchFlags::IN_CLOSE_WRITE) {
            Some(FileEventKind::Modified)
        } else if mask.intersects(AddWatchFlags::IN_DELETE | AddWatchFlags::IN_MOVED_FROM) {
            Some(FileEventKind::Removed)
        } else {
            None
        }
    }

    pub(super) fn spawn(
        root: &Path,
        options: WatchOptions,
        tx: UnboundedSender<EventResult>,
    ) -> io::Result<AbortHandle> {
        let inotify = Inotify::init(InitFlags::IN_CLOEXEC | InitFlags::IN_NONBLOCK)?;
        let mut dirs = Directories::new();
        let existing = register_tree(&inotify, root, &mut dirs)?;
        if options.report_existing {
            for path in existing {
                let _ = tx.send(Ok(FileEvent::created(path)));
            }
        }
        let fd = AsyncFd::new(InotifyFd(inotify))?;
        let pump = tokio::spawn(pump(fd, dirs, tx));
        Ok(pump.abort_handle())
    }

    /// Watch `root` and every directory under it, returning the files found.
    fn register_tree(
        inotify: &Inotify,
        root: &Path,
        dirs: &mut Directories,
    ) -> io::Result<Vec<PathBuf>> {
        let entries = walk(root)
            .map_err(|err| io::Error::new(io::ErrorKind::NotFound, err.to_string()))?
            .entries();
        let mut files = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                // raced with a removal
                Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                Err(err) => return Err(err),
            };
            if entry.is_dir {
                let wd = inotify.add_watch(entry.path.as_path(), watch_mask())?;
                dirs.insert(wd, entry.path);
            } else {
                files.push(entry.path);
            }
        }
        Ok(files)
    }

    async fn read_batch(fd: &AsyncFd<InotifyFd>) -> io::Result<Vec<InotifyEvent>> {
        loop {
            let mut guard = fd.readable().await?;
            match guard.try_io(|inner| inner.get_ref().0.read_events().map_err(io::Error::from)) {
                Ok(result) => return result,
                Err(_would_block) => continue,
            }
        }
    }

    async fn pump(fd: AsyncFd<InotifyFd>, mut dirs: Directories, tx: UnboundedSender<EventResult>) {
        loop {
            let events = match read_batch(&fd).await {
                Ok(events) => events,
                Err(err) => {
                    let _ = tx.send(Err(err));
                    return;
                }
            };
            for event in events {
                if event.mask.contains(AddWatchFlags::IN_Q_OVERFLOW) {
                    let _ = tx.send(Err(io::Error::other(
                        "inotify queue overflow (events were lost)",
                    )));
                    return;
                }
                if event.mask.contains(AddWatchFlags::IN_IGNORED) {
                    dirs.remove(&event.wd);
                    continue;
                }
                let (Some(dir), Some(name)) = (dirs.get(&event.wd).cloned(), event.name) else {
                    continue;
                };
                let path = dir.join(name);

                if event.mask.contains(AddWatchFlags::IN_ISDIR) {
                    if event
                        .mask
                        .intersects(AddWatchFlags::IN_CREATE | AddWatchFlags::IN_MOVED_TO)
                    {
                        match register_tree(&fd.get_ref().0, &path, &mut dirs) {
                            Ok(files) => {
                                for file in files {
                                    if tx.send(Ok(FileEvent::created(file))).is_err() {
                                        return;
                                    }
                                }
                            }
                            Err(err) => {
                                tracing::debug!(path = %path.display(), %err, "skip new directory");
                            }
                        }
                    }
                    continue;
                }

                let Some(kind) = event_kind(event.mask) else {
                    continue;
                };
                if tx.send(Ok(FileEvent { path, kind })).is_err() {
                    return;
                }
            }
        }
    }
}

#[cfg(not(target_os = "linux"))]
mod inotify {
    use super::{EventResult, WatchOptions};
    use std::io;
    use std::path::Path;
    use tokio::sync::mpsc::UnboundedSender;
    use tokio::task::AbortHandle;

    pub(super) fn spawn(
        _root: &Path,
        _options: WatchOptions,
        _tx: UnboundedSender<EventResult>,
    ) -> io::Result<AbortHandle> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "recursive filesystem watch requires inotify (Linux only)",
        ))
    }
}

#[cfg(test)]
#[path = "watch_tests.rs"]
mod tests;
