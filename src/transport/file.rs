use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    time::SystemTime,
};

use crate::event::ChannelEvent;

/// Polls the shared event file for a newer modification time.
#[derive(Debug)]
pub struct FileWatcher {
    path: PathBuf,
    last_modified: Option<SystemTime>,
}

impl FileWatcher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_modified: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns an event when the file's mtime moved forward and its contents
    /// parse. Missing, unreadable or malformed files yield `None`.
    pub fn poll(&mut self) -> Option<ChannelEvent> {
        let modified = match std::fs::metadata(&self.path).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::debug!(path = %self.path.display(), error = %e, "event file stat failed");
                return None;
            }
        };

        if self.last_modified.is_some_and(|last| modified <= last) {
            return None;
        }
        self.last_modified = Some(modified);

        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::debug!(path = %self.path.display(), error = %e, "event file read failed");
                return None;
            }
        };
        match ChannelEvent::from_slice(&bytes) {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::debug!(path = %self.path.display(), error = %e, "ignoring malformed event file");
                None
            }
        }
    }
}
