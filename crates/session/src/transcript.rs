//! Append-only transcript of completed turns.
//!
//! Each turn becomes two timestamped lines followed by a blank line:
//!
//! ```text
//! [2026-10-19 14:03:11] USER: how are you
//! [2026-10-19 14:03:11] ASSISTANT: I am fine [StopSignal]
//!
//! ```
//!
//! The file is opened in append mode for every entry, so several sessions
//! can share one log without truncating each other.

use chrono::{DateTime, Local, TimeZone};
use recurchat_core::error::TranscriptError;
use recurchat_core::turn::Turn;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Writes completed turns to a plain-text log.
#[derive(Debug, Clone)]
pub struct TranscriptLog {
    path: PathBuf,
}

impl TranscriptLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `turn`, stamped with the current local time.
    pub async fn append(&self, turn: &Turn) -> Result<(), TranscriptError> {
        self.append_at(&Local::now(), turn).await
    }

    /// Append `turn` with an explicit timestamp.
    pub async fn append_at<Tz>(&self, at: &DateTime<Tz>, turn: &Turn) -> Result<(), TranscriptError>
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        let entry = format_entry(at, turn);

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| TranscriptError::Open {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        file.write_all(entry.as_bytes())
            .await
            .map_err(|e| TranscriptError::Write {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        file.flush().await.map_err(|e| TranscriptError::Write {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;

        debug!(path = %self.path.display(), bytes = entry.len(), "Transcript entry appended");
        Ok(())
    }
}

/// Render one transcript entry. Both lines carry the same timestamp.
pub fn format_entry<Tz>(at: &DateTime<Tz>, turn: &Turn) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let ts = at.format(TIMESTAMP_FORMAT);
    format!(
        "[{ts}] USER: {}\n[{ts}] ASSISTANT: {}\n\n",
        turn.utterance, turn.reply
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 14, 3, 11).unwrap()
    }

    #[test]
    fn entry_format() {
        let turn = Turn::new("how are you", "I am fine [StopSignal]");
        assert_eq!(
            format_entry(&fixed_time(), &turn),
            "[2026-10-19 14:03:11] USER: how are you\n\
             [2026-10-19 14:03:11] ASSISTANT: I am fine [StopSignal]\n\n"
        );
    }

    #[tokio::test]
    async fn appends_without_truncating() {
        let dir = tempfile::tempdir().unwrap();
        let log = TranscriptLog::new(dir.path().join("chat_log.txt"));

        log.append_at(&fixed_time(), &Turn::new("hi", "hello [StopSignal]"))
            .await
            .unwrap();
        log.append_at(&fixed_time(), &Turn::new("bye", "goodbye [StopSignal]"))
            .await
            .unwrap();

        let content = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(content.matches("USER: ").count(), 2);
        assert!(content.starts_with("[2026-10-19 14:03:11] USER: hi\n"));
        assert!(content.ends_with("ASSISTANT: goodbye [StopSignal]\n\n"));
    }

    #[tokio::test]
    async fn missing_directory_is_an_open_error() {
        let log = TranscriptLog::new("/nonexistent/dir/chat_log.txt");
        let err = log
            .append(&Turn::new("hi", "hello [StopSignal]"))
            .await
            .unwrap_err();
        assert!(matches!(err, TranscriptError::Open { .. }));
    }
}
