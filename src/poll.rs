//! Stream completion poller: sample a growing text buffer until a terminal
//! pattern appears and return its status capture.
//!
//! Sources offer no change notification, so the poller samples on demand.
//! Sampling failures are treated as transient and retried forever; bound the
//! wait with [`crate::deadline::race`].
use crate::error::{HarnessError, Result};
use anyhow::anyhow;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Default terminal line written when the generator process exits. `-1`
/// stands for an exit status that could not be collected.
pub const PROCESS_FINISHED_PATTERN: &str = r"Process finished\. Return code (?P<code>-?\d+)\.";

/// A text buffer that can be snapshotted without blocking.
pub trait TextSource {
    fn snapshot(&mut self) -> anyhow::Result<String>;
}

/// Terminal pattern with one named capture holding the status.
#[derive(Debug, Clone)]
pub struct CompletionPattern {
    regex: Regex,
    group: String,
}

impl CompletionPattern {
    pub fn new(pattern: &str, group: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|err| HarnessError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: err.to_string(),
        })?;
        if !regex.capture_names().flatten().any(|name| name == group) {
            return Err(HarnessError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: format!("missing named group {group:?}"),
            });
        }
        Ok(Self {
            regex,
            group: group.to_string(),
        })
    }

    pub fn process_finished() -> Self {
        Self {
            regex: Regex::new(PROCESS_FINISHED_PATTERN).expect("valid built-in pattern"),
            group: "code".to_string(),
        }
    }

    /// Status captured from the first match in `text`.
    pub fn status_in(&self, text: &str) -> Option<String> {
        self.regex
            .captures(text)
            .and_then(|caps| caps.name(&self.group))
            .map(|m| m.as_str().to_string())
    }
}

#[derive(Debug, Clone)]
pub struct StreamPoller {
    pattern: CompletionPattern,
    interval: Duration,
}

impl StreamPoller {
    /// `interval` of zero yields to the runtime between samples instead of
    /// sleeping.
    pub fn new(pattern: CompletionPattern, interval: Duration) -> Self {
        Self { pattern, interval }
    }

    /// Sample `source` until the pattern matches. Never times out on its own.
    pub async fn wait_for_status<S: TextSource + ?Sized>(&self, source: &mut S) -> String {
        let mut samples: u64 = 0;
        let mut failures: u64 = 0;
        loop {
            samples += 1;
            match source.snapshot() {
                Ok(text) => {
                    if let Some(status) = self.pattern.status_in(&text) {
                        tracing::debug!(samples, failures, %status, "terminal pattern matched");
                        return status;
                    }
                }
                Err(err) => {
                    failures += 1;
                    if failures == 1 {
                        tracing::debug!(%err, "text source unavailable, retrying");
                    }
                }
            }
            if self.interval.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(self.interval).await;
            }
        }
    }
}

/// In-memory growing buffer shared between a writer (process output pump)
/// and the poller.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    text: Arc<Mutex<String>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_line(&self, line: &str) {
        if let Ok(mut text) = self.text.lock() {
            text.push_str(line);
            text.push('\n');
        }
    }

    /// Current contents; empty if the lock was poisoned.
    pub fn contents(&self) -> String {
        self.text.lock().map(|text| text.clone()).unwrap_or_default()
    }
}

impl TextSource for SharedBuffer {
    fn snapshot(&mut self) -> anyhow::Result<String> {
        self.text
            .lock()
            .map(|text| text.clone())
            .map_err(|_| anyhow!("output buffer lock poisoned"))
    }
}

/// A log file on disk. A missing file counts as a transient failure.
#[derive(Debug, Clone)]
pub struct FileTextSource {
    path: PathBuf,
}

impl FileTextSource {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl TextSource for FileTextSource {
    fn snapshot(&mut self) -> anyhow::Result<String> {
        let bytes = std::fs::read(&self.path)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deadline::race;

    /// Fails a few times, then grows a line per sample.
    struct ScriptedSource {
        failures_left: usize,
        lines: Vec<&'static str>,
        shown: usize,
    }

    impl TextSource for ScriptedSource {
        fn snapshot(&mut self) -> anyhow::Result<String> {
            if self.failures_left > 0 {
                self.failures_left -= 1;
                return Err(anyhow!("element not interactable"));
            }
            self.shown = (self.shown + 1).min(self.lines.len());
            Ok(self.lines[..self.shown].join("\n"))
        }
    }

    #[tokio::test]
    async fn returns_status_once_marker_appears() {
        let mut source = ScriptedSource {
            failures_left: 3,
            lines: vec![
                "Retrieving document at 'address.wsdl'.",
                "Generating CXF artifacts",
                "Process finished. Return code 0.",
            ],
            shown: 0,
        };
        let poller = StreamPoller::new(CompletionPattern::process_finished(), Duration::ZERO);
        assert_eq!(poller.wait_for_status(&mut source).await, "0");
        assert_eq!(source.shown, 3);
    }

    #[tokio::test]
    async fn captures_non_zero_status() {
        let buffer = SharedBuffer::new();
        buffer.push_line("Process finished. Return code 1.");
        let poller = StreamPoller::new(CompletionPattern::process_finished(), Duration::ZERO);
        assert_eq!(poller.wait_for_status(&mut buffer.clone()).await, "1");
    }

    #[test]
    fn unknown_exit_status_is_captured_with_its_sign() {
        let pattern = CompletionPattern::process_finished();
        assert_eq!(
            pattern.status_in("Process finished. Return code -1.").as_deref(),
            Some("-1")
        );
        assert_eq!(pattern.status_in("Process finished. Return code ."), None);
    }

    #[tokio::test(start_paused = true)]
    async fn never_matching_source_only_ends_by_deadline() {
        let buffer = SharedBuffer::new();
        buffer.push_line("still generating");
        let poller = StreamPoller::new(
            CompletionPattern::process_finished(),
            Duration::from_millis(10),
        );
        let mut source = buffer.clone();
        let result = race(poller.wait_for_status(&mut source), Duration::from_secs(2)).await;
        assert!(result.expect_err("deadline fires").is_timeout());
    }

    #[test]
    fn custom_pattern_requires_named_group() {
        let err = CompletionPattern::new(r"exit (\d+)", "code").expect_err("no named group");
        assert!(matches!(err, HarnessError::InvalidPattern { .. }));
        let ok = CompletionPattern::new(r"BUILD (?P<result>SUCCESS|FAILURE)", "result")
            .expect("valid pattern");
        assert_eq!(ok.status_in("[INFO] BUILD SUCCESS").as_deref(), Some("SUCCESS"));
    }

    #[test]
    fn missing_file_is_a_transient_failure() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut source = FileTextSource::new(&temp.path().join("output.log"));
        assert!(source.snapshot().is_err());
        std::fs::write(temp.path().join("output.log"), "Process finished. Return code 0.\n")
            .expect("write log");
        let text = source.snapshot().expect("readable now");
        assert_eq!(
            CompletionPattern::process_finished().status_in(&text).as_deref(),
            Some("0")
        );
    }
}
