//! Runtime configuration.
//!
//! Settings come from an optional YAML file. Every field has a default, so an
//! empty file (or no file at all) yields a working setup that watches both
//! sources on the stock schedule. CLI flags and environment variables are
//! layered on top by [`Config::with_overrides`].
//!
//! ```yaml
//! cache_dir: ./cache
//! region: us
//! limits:
//!   first_run_items: 3
//! schedule:
//!   - every_minutes: 30
//!     monitor: posts
//!   - weekday: mon
//!     hour: 18
//!     minute: 0
//!     digest: reset-warning
//! ```

use crate::models::{DigestKind, SourceKind};
use crate::scheduler::{Action, ScheduleEntry};
use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Browser-like agent; the upstream pages serve bots a stripped listing.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("schedule entry {index}: {reason}")]
    Schedule { index: usize, reason: String },
}

/// Item caps and truncation lengths.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Limits {
    /// Most items delivered on a source's first run.
    pub first_run_items: usize,
    /// Items shown by an on-demand `latest` preview.
    pub preview_items: usize,
    /// Cap for the structural-markup tier.
    pub markup_items: usize,
    /// Cap for the generic-text tier.
    pub text_items: usize,
    /// Articles considered for a digest.
    pub digest_articles: usize,
    /// Articles per category in the reset warning.
    pub digest_per_category: usize,
    /// Characters of body text kept in an item preview.
    pub preview_chars: usize,
    /// Characters of preview kept in a digest entry.
    pub summary_preview_chars: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            first_run_items: 3,
            preview_items: 5,
            markup_items: 10,
            text_items: 5,
            digest_articles: 10,
            digest_per_category: 2,
            preview_chars: 200,
            summary_preview_chars: 100,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceSettings {
    /// Listing URL override.
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Sources {
    pub posts: SourceSettings,
    pub news: SourceSettings,
}

/// One schedule line as written in YAML.
///
/// Either `every_minutes` or `weekday` + `hour` (+ `minute`) picks the
/// trigger; either `monitor` or `digest` picks the action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScheduleSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub every_minutes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weekday: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hour: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minute: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitor: Option<SourceKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<DigestKind>,
}

impl ScheduleSpec {
    fn every(minutes: u64, source: SourceKind) -> Self {
        Self {
            every_minutes: Some(minutes),
            monitor: Some(source),
            ..Self::default()
        }
    }

    fn at(weekday: &str, hour: u32, minute: u32, digest: DigestKind) -> Self {
        Self {
            weekday: Some(weekday.to_string()),
            hour: Some(hour),
            minute: Some(minute),
            digest: Some(digest),
            ..Self::default()
        }
    }

    /// Validate and convert into a live [`ScheduleEntry`].
    pub fn to_entry(&self, index: usize) -> Result<ScheduleEntry, ConfigError> {
        let bad = |reason: &str| ConfigError::Schedule {
            index,
            reason: reason.to_string(),
        };

        let action = match (self.monitor, self.digest) {
            (Some(source), None) => Action::Monitor(source),
            (None, Some(kind)) => Action::Digest(kind),
            _ => return Err(bad("exactly one of `monitor` or `digest` is required")),
        };

        match (self.every_minutes, self.weekday.as_deref()) {
            (Some(0), None) => Err(bad("`every_minutes` must be positive")),
            (Some(minutes), None) => Ok(ScheduleEntry::interval(
                Duration::from_secs(minutes * 60),
                action,
            )),
            (None, Some(day)) => {
                let weekday: Weekday = day
                    .parse()
                    .map_err(|_| bad(&format!("unknown weekday `{day}`")))?;
                let hour = self.hour.ok_or_else(|| bad("`hour` is required with `weekday`"))?;
                let minute = self.minute.unwrap_or(0);
                if hour > 23 {
                    return Err(bad(&format!("hour {hour} is out of range")));
                }
                if minute > 59 {
                    return Err(bad(&format!("minute {minute} is out of range")));
                }
                Ok(ScheduleEntry::clock(weekday, hour, minute, action))
            }
            _ => Err(bad("exactly one of `every_minutes` or `weekday` is required")),
        }
    }
}

fn default_schedule() -> Vec<ScheduleSpec> {
    vec![
        ScheduleSpec::every(30, SourceKind::Posts),
        ScheduleSpec::every(120, SourceKind::News),
        ScheduleSpec::at("mon", 18, 0, DigestKind::ResetWarning),
        ScheduleSpec::at("tue", 16, 0, DigestKind::ResetChecklist),
    ]
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding one `<source>.json` state file per source.
    pub cache_dir: PathBuf,
    /// Where notifications are written. `None` means stdout.
    pub output_dir: Option<PathBuf>,
    /// Target region; items tagged with another region are dropped.
    pub region: Option<String>,
    pub fetch_timeout_secs: u64,
    pub user_agent: String,
    /// Scheduler tick period.
    pub tick_secs: u64,
    /// Deliver the capped first-run batch instead of only recording it.
    pub announce_first_run: bool,
    /// Only official authors can make a post relevant.
    pub official_authors_only: bool,
    /// Age window for digest items.
    pub digest_days_back: i64,
    /// Article pages fetched per run to find banners for image-less items.
    pub banner_lookups: usize,
    pub limits: Limits,
    pub sources: Sources,
    pub schedule: Vec<ScheduleSpec>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("./cache"),
            output_dir: None,
            region: Some("us".to_string()),
            fetch_timeout_secs: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            tick_secs: 60,
            announce_first_run: false,
            official_authors_only: false,
            digest_days_back: 7,
            banner_lookups: 3,
            limits: Limits::default(),
            sources: Sources::default(),
            schedule: default_schedule(),
        }
    }
}

impl Config {
    /// Load from `path`, or return the defaults when no path is given.
    ///
    /// The schedule is validated here so a bad entry fails at startup
    /// rather than on the first tick.
    #[instrument(level = "info", skip_all, fields(path = ?path))]
    pub async fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            debug!("No config file given; using defaults");
            return Ok(Self::default());
        };

        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let config = Self::from_yaml(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.schedule_entries()?;

        info!(
            cache_dir = %config.cache_dir.display(),
            schedule_entries = config.schedule.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parse YAML text. Blank input yields the defaults.
    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }

    /// Layer CLI/env values over the file.
    pub fn with_overrides(
        mut self,
        cache_dir: Option<PathBuf>,
        output_dir: Option<PathBuf>,
        region: Option<String>,
    ) -> Self {
        if let Some(dir) = cache_dir {
            self.cache_dir = dir;
        }
        if output_dir.is_some() {
            self.output_dir = output_dir;
        }
        if let Some(region) = region {
            self.region = Some(region);
        }
        self
    }

    /// Lowercase target region, or `None` when filtering is off.
    pub fn target_region(&self) -> Option<String> {
        self.region
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty() && !r.eq_ignore_ascii_case("all"))
            .map(str::to_lowercase)
    }

    pub fn source_url(&self, kind: SourceKind) -> Option<&str> {
        match kind {
            SourceKind::Posts => self.sources.posts.url.as_deref(),
            SourceKind::News => self.sources.news.url.as_deref(),
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_secs(self.tick_secs.max(1))
    }

    pub fn schedule_entries(&self) -> Result<Vec<ScheduleEntry>, ConfigError> {
        self.schedule
            .iter()
            .enumerate()
            .map(|(i, spec)| spec.to_entry(i))
            .collect()
    }
}
