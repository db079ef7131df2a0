//! Artifact set tracking: reconcile a watch stream against the files a
//! generation run is expected to produce.
//!
//! The tracker is a small state machine. The expected set only ever
//! shrinks, completion is reported exactly once, and the watch is released
//! as soon as the set empties or the tracker is torn down.
use crate::error::{HarnessError, Result};
use crate::watch::{FileEvent, FileEventKind, FsWatch, WatchCloser, WatchOptions};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Absolute paths still expected on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpectedSet {
    remaining: BTreeSet<PathBuf>,
}

impl ExpectedSet {
    pub fn new(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            remaining: paths.into_iter().collect(),
        }
    }

    /// Expected paths given relative to `root`.
    pub fn under<I, P>(root: &Path, relative: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        Self::new(relative.into_iter().map(|rel| root.join(rel)))
    }

    pub fn len(&self) -> usize {
        self.remaining.len()
    }

    pub fn is_empty(&self) -> bool {
        self.remaining.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.remaining.contains(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.remaining.iter().map(PathBuf::as_path)
    }

    fn take(&mut self, path: &Path) -> bool {
        self.remaining.remove(path)
    }
}

/// What a single event did to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconcile {
    /// Not an expected creation, or already matched.
    Ignored,
    Matched { remaining: usize },
    /// The event that emptied the set. Returned once per tracker.
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    Pending,
    Resolved,
}

#[derive(Debug)]
pub struct ArtifactTracker {
    expected: ExpectedSet,
    initial: usize,
    watch: Option<FsWatch>,
    signal: Signal,
}

impl ArtifactTracker {
    /// Watch `root` until every expected path has been created. An empty
    /// expected set resolves immediately without subscribing.
    pub fn start(expected: ExpectedSet, root: &Path) -> Result<Self> {
        if expected.is_empty() {
            return Ok(Self::resolved(expected));
        }
        let watch = FsWatch::start(root, WatchOptions::default())?;
        Ok(Self::with_watch(expected, watch))
    }

    pub fn with_watch(expected: ExpectedSet, mut watch: FsWatch) -> Self {
        if expected.is_empty() {
            watch.close();
            return Self::resolved(expected);
        }
        tracing::debug!(
            expected = expected.len(),
            root = %watch.root().display(),
            "tracking artifacts"
        );
        Self {
            initial: expected.len(),
            expected,
            watch: Some(watch),
            signal: Signal::Pending,
        }
    }

    fn resolved(expected: ExpectedSet) -> Self {
        Self {
            initial: 0,
            expected,
            watch: None,
            signal: Signal::Resolved,
        }
    }

    /// Apply one event. Only creations of still-expected paths count;
    /// re-creations and unrelated paths are no-ops.
    pub fn observe(&mut self, event: &FileEvent) -> Reconcile {
        if self.signal == Signal::Resolved || event.kind != FileEventKind::Created {
            return Reconcile::Ignored;
        }
        if !self.expected.take(&event.path) {
            return Reconcile::Ignored;
        }
        tracing::debug!(
            path = %event.path.display(),
            remaining = self.expected.len(),
            "artifact created"
        );
        if !self.expected.is_empty() {
            return Reconcile::Matched {
                remaining: self.expected.len(),
            };
        }
        self.signal = Signal::Resolved;
        self.release();
        tracing::info!(artifacts = self.initial, "all expected artifacts created");
        Reconcile::Completed
    }

    /// Wait until the expected set is empty.
    ///
    /// Fails with `TrackerClosed` if the tracker was torn down first, and
    /// with `Watch` if the underlying watch reports an error.
    pub async fn completion(&mut self) -> Result<()> {
        loop {
            if self.signal == Signal::Resolved {
                return Ok(());
            }
            let Some(watch) = self.watch.as_mut() else {
                return Err(HarnessError::TrackerClosed(self.expected.len()));
            };
            match watch.next_event().await {
                Some(Ok(event)) => {
                    self.observe(&event);
                }
                Some(Err(err)) => return Err(HarnessError::Watch(err)),
                None => return Err(HarnessError::TrackerClosed(self.expected.len())),
            }
        }
    }

    /// Handle for closing the watch from a deadline cleanup callback.
    pub fn closer(&self) -> Option<WatchCloser> {
        self.watch.as_ref().map(FsWatch::closer)
    }

    /// Tear down. Completion is left unresolved if the set is not empty.
    pub fn close(&mut self) {
        if self.signal == Signal::Pending && self.watch.is_some() {
            tracing::debug!(missing = self.expected.len(), "artifact tracker closed early");
        }
        self.release();
    }

    fn release(&mut self) {
        if let Some(mut watch) = self.watch.take() {
            watch.close();
        }
    }

    pub fn is_complete(&self) -> bool {
        self.signal == Signal::Resolved
    }

    /// Paths not yet observed, sorted.
    pub fn missing(&self) -> Vec<PathBuf> {
        self.expected.iter().map(Path::to_path_buf).collect()
    }
}

impl Drop for ArtifactTracker {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
#[path = "artifacts_tests.rs"]
mod tests;
