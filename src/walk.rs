//! Lazy, stack-based enumeration of files under a root directory.
//!
//! Directories are expanded in the order `read_dir` returns them and popped
//! from the back, so sibling order is reversed and not stable across
//! filesystems. Symlinks are followed; there is no cycle detection.
use crate::error::{HarnessError, Result};
use std::fs;
use std::io;
use std::iter::FusedIterator;
use std::path::{Path, PathBuf};

/// Start walking `root`. The root itself may be a file, in which case it is
/// the only item yielded.
pub fn walk(root: &Path) -> Result<Walk> {
    if fs::metadata(root).is_err() {
        return Err(HarnessError::NotFound(root.to_path_buf()));
    }
    let root = absolute(root)?;
    Ok(Walk {
        stack: vec![Pending::Visit(root)],
    })
}

fn absolute(path: &Path) -> io::Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()?.join(path))
}

/// A single step of a walk, before directories are filtered out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    pub path: PathBuf,
    pub is_dir: bool,
}

#[derive(Debug)]
enum Pending {
    Visit(PathBuf),
    Expand(PathBuf),
}

/// Iterator over absolute file paths. Consumed once; not restartable.
#[derive(Debug)]
pub struct Walk {
    stack: Vec<Pending>,
}

impl Walk {
    /// Iterate directories as well as files.
    ///
    /// A directory is yielded before its listing is read, so a caller that
    /// starts watching it on receipt cannot miss children created meanwhile.
    pub fn entries(self) -> Entries {
        Entries { walk: self }
    }

    fn next_entry(&mut self) -> Option<io::Result<WalkEntry>> {
        loop {
            match self.stack.pop()? {
                Pending::Expand(dir) => {
                    let listing = match fs::read_dir(&dir) {
                        Ok(listing) => listing,
                        Err(err) => return Some(Err(err)),
                    };
                    for entry in listing {
                        match entry {
                            Ok(entry) => self.stack.push(Pending::Visit(entry.path())),
                            Err(err) => return Some(Err(err)),
                        }
                    }
                }
                Pending::Visit(path) => {
                    let metadata = match fs::metadata(&path) {
                        Ok(metadata) => metadata,
                        Err(err) => return Some(Err(err)),
                    };
                    if metadata.is_dir() {
                        self.stack.push(Pending::Expand(path.clone()));
                        return Some(Ok(WalkEntry { path, is_dir: true }));
                    }
                    return Some(Ok(WalkEntry {
                        path,
                        is_dir: false,
                    }));
                }
            }
        }
    }
}

impl Iterator for Walk {
    type Item = io::Result<PathBuf>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.next_entry()? {
                Ok(entry) if entry.is_dir => continue,
                Ok(entry) => {
                    // sockets, fifos and devices are not artifacts
                    if entry.path.is_file() {
                        return Some(Ok(entry.path));
                    }
                }
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

impl FusedIterator for Walk {}

#[derive(Debug)]
pub struct Entries {
    walk: Walk,
}

impl Iterator for Entries {
    type Item = io::Result<WalkEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        self.walk.next_entry()
    }
}

impl FusedIterator for Entries {}
