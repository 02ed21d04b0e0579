//! JSON-lines notification sink.
//!
//! Each notification becomes one line of JSON, stamped with the delivery
//! time. With an output directory the line is appended to
//! `{output_dir}/{date}/{channel}.jsonl`, where the date is the UTC delivery
//! date. Without one it goes to stdout.

use super::{Notification, Sink};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{error, info, instrument};

#[derive(Serialize)]
struct Envelope<'a> {
    delivered_at: DateTime<Utc>,
    #[serde(flatten)]
    notification: &'a Notification,
}

#[derive(Debug, Clone, Default)]
pub struct JsonSink {
    output_dir: Option<PathBuf>,
}

impl JsonSink {
    pub fn new(output_dir: Option<PathBuf>) -> Self {
        Self { output_dir }
    }

    /// File a notification delivered at `at` lands in, if writing to disk.
    pub fn path_for(&self, notification: &Notification, at: DateTime<Utc>) -> Option<PathBuf> {
        self.output_dir.as_deref().map(|dir| {
            dir.join(at.date_naive().to_string())
                .join(format!("{}.jsonl", notification.channel()))
        })
    }
}

impl Sink for JsonSink {
    #[instrument(level = "info", skip_all, fields(channel = notification.channel(), count = notification.len()))]
    async fn deliver(&self, notification: &Notification) -> Result<(), Box<dyn Error + Send + Sync>> {
        let delivered_at = Utc::now();
        let mut line = serde_json::to_string(&Envelope {
            delivered_at,
            notification,
        })?;
        line.push('\n');

        let Some(path) = self.path_for(notification, delivered_at) else {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(line.as_bytes()).await?;
            stdout.flush().await?;
            return Ok(());
        };

        if let Some(dir) = path.parent() {
            if let Err(e) = fs::create_dir_all(dir).await {
                error!(dir = %dir.display(), error = %e, "Failed to create output dir");
                return Err(e.into());
            }
        }
        append(&path, &line).await?;
        info!(path = %path.display(), "Wrote notification");
        Ok(())
    }
}

async fn append(path: &Path, line: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path).await?;
    file.write_all(line.as_bytes()).await?;
    file.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Item, SourceKind};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_appends_json_lines_per_channel() {
        let dir = TempDir::new().unwrap();
        let sink = JsonSink::new(Some(dir.path().to_path_buf()));
        let item = Item::new("Hotfixes: August 23rd", "https://example.com/1", Utc::now());
        let notification = Notification::NewItems {
            source: SourceKind::Posts,
            items: vec![item],
        };

        sink.deliver(&notification).await.unwrap();
        sink.deliver(&notification).await.unwrap();

        let path = sink.path_for(&notification, Utc::now()).unwrap();
        assert!(path.ends_with("posts.jsonl"));
        let raw = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = raw.lines().collect();
        assert_eq!(lines.len(), 2);

        let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(value["type"], "new_items");
        assert_eq!(value["source"], "posts");
        assert_eq!(value["items"][0]["title"], "Hotfixes: August 23rd");
        assert_eq!(value["items"][0]["synthetic"], false);
        assert!(value["delivered_at"].is_string());
    }

    #[test]
    fn test_stdout_sink_has_no_path() {
        let notification = Notification::Latest {
            source: SourceKind::News,
            items: vec![],
        };
        assert!(JsonSink::default().path_for(&notification, Utc::now()).is_none());
        assert_eq!(notification.channel(), "news");
    }
}
