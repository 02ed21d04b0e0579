//! Delivery of notifications.
//!
//! The pipeline never renders messages itself. It hands structured
//! [`Notification`]s to a [`Sink`], which decides where they go.
//!
//! # Submodules
//!
//! - [`json`]: Appends notifications as JSON lines, one file per channel per day
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! └── 2025-08-23/
//!     ├── posts.jsonl
//!     ├── news.jsonl
//!     └── digest.jsonl
//! ```

pub mod json;

use crate::digest::Digest;
use crate::models::{Item, SourceKind};
use serde::Serialize;
use std::error::Error;

/// Something worth telling the outside world about.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// Items not delivered before, from a monitor tick or `check`.
    NewItems { source: SourceKind, items: Vec<Item> },
    /// On-demand preview of what the source lists right now.
    Latest { source: SourceKind, items: Vec<Item> },
    Digest(Digest),
}

impl Notification {
    /// Output channel name: the source, or `digest`.
    pub fn channel(&self) -> &'static str {
        match self {
            Notification::NewItems { source, .. } | Notification::Latest { source, .. } => {
                source.as_str()
            }
            Notification::Digest(_) => "digest",
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Notification::NewItems { items, .. } | Notification::Latest { items, .. } => {
                items.len()
            }
            Notification::Digest(digest) => {
                digest.posts.len() + digest.articles.as_ref().map_or(0, |a| a.len())
            }
        }
    }
}

/// Receives notifications. Sinks never touch dedup state.
pub trait Sink {
    async fn deliver(&self, notification: &Notification) -> Result<(), Box<dyn Error + Send + Sync>>;
}
