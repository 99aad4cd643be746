//! Data models for recording scheduling

use serde::{Deserialize, Serialize};

/// Status of a pending record within a scheduling pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingStatus {
    /// Not yet classified by the current pass
    Undetermined,
    /// Assigned to a recorder and waiting for its start time
    Ready,
    /// No recorder available and no duplicate airing to fall back on
    Conflict,
    /// No recorder available, but a later airing of the same show exists
    Later,
    /// Superseded because an earlier airing of the same show was scheduled
    Earlier,
    /// Suppressed because the show has already been recorded
    PreviousRecord,
}

impl PendingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PendingStatus::Undetermined => "undetermined",
            PendingStatus::Ready => "ready",
            PendingStatus::Conflict => "conflict",
            PendingStatus::Later => "later",
            PendingStatus::Earlier => "earlier",
            PendingStatus::PreviousRecord => "previous_record",
        }
    }
}

impl std::str::FromStr for PendingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "undetermined" => Ok(PendingStatus::Undetermined),
            "ready" => Ok(PendingStatus::Ready),
            "conflict" => Ok(PendingStatus::Conflict),
            "later" => Ok(PendingStatus::Later),
            "earlier" => Ok(PendingStatus::Earlier),
            "previous_record" => Ok(PendingStatus::PreviousRecord),
            _ => Err(format!("Unknown pending status: {}", s)),
        }
    }
}

/// Status of a recording entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingStatus {
    Scheduled,
    Recording,
    Completed,
    Failed,
}

impl RecordingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordingStatus::Scheduled => "scheduled",
            RecordingStatus::Recording => "recording",
            RecordingStatus::Completed => "completed",
            RecordingStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for RecordingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(RecordingStatus::Scheduled),
            "recording" => Ok(RecordingStatus::Recording),
            "completed" => Ok(RecordingStatus::Completed),
            "failed" => Ok(RecordingStatus::Failed),
            _ => Err(format!("Unknown recording status: {}", s)),
        }
    }
}

/// Kind of recording rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// Record one specific broadcast, then expire
    Once,
    /// Record every new episode of a series on a channel
    Series,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::Once => "once",
            RuleKind::Series => "series",
        }
    }
}

impl std::str::FromStr for RuleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "once" => Ok(RuleKind::Once),
            "series" => Ok(RuleKind::Series),
            _ => Err(format!("Unknown rule kind: {}", s)),
        }
    }
}

/// A broadcast channel from the program guide
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub listing_id: String,
    pub name: String,
    pub number: String,
}

/// Static program metadata from the guide
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Show {
    pub id: String,
    pub title: String,
    pub episode_title: Option<String>,
    pub description: Option<String>,
    pub series_id: Option<String>,
}

/// One scheduled broadcast of a show
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Airing {
    pub show_id: String,
    pub channel_id: String,
    /// Broadcast start as epoch milliseconds; absent on malformed guide data
    pub air_date: Option<i64>,
    pub duration_secs: i64,
}

/// A show paired with one of its airings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShowAiring {
    pub show: Show,
    pub airing: Airing,
}

/// A user-defined recording rule
///
/// Exactly one of `once_airing` (for `Once`) and `series_id` (for `Series`)
/// is meaningful for a given kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingRule {
    pub id: i64,
    pub kind: RuleKind,
    pub channel_id: String,
    pub listing_id: String,
    pub series_id: Option<String>,
    pub once_airing: Option<ShowAiring>,
    pub begin_padding_secs: i64,
    pub end_padding_secs: i64,
    pub priority: i32,
}

/// A recording entry, drafted by the scheduler and persisted on handoff
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recording {
    /// Database id; 0 until persisted
    pub id: i64,
    pub show_id: String,
    pub title: String,
    pub channel_name: String,
    pub file_path: Option<String>,
    /// Padded start as epoch milliseconds
    pub start: i64,
    pub duration_secs: i64,
    pub status: RecordingStatus,
    pub created_at: i64,
}

/// An interval of wall-clock time in epoch milliseconds
///
/// Callers guarantee `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: i64,
    pub end: i64,
}

impl TimeRange {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// True interval intersection; a shared boundary instant counts as overlap
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

/// A tentative recording produced by expanding a rule against guide data
///
/// Regenerated from scratch on every scheduling pass. Sorts by start time;
/// equality is by the synthetic per-pass id, never by start, so records that
/// happen to share a start instant remain distinct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingRecord {
    /// Synthetic id, unique within a pass
    pub id: u64,
    pub show: Show,
    /// Padded start as epoch milliseconds
    pub start: i64,
    /// Padded duration in seconds
    pub duration_secs: i64,
    pub channel: Channel,
    /// The rule this record was expanded from
    pub rule_id: i64,
    /// Whether the origin rule is a series rule
    pub series_rule: bool,
    /// Draft recording to persist if this record executes
    pub recording: Recording,
    /// Assigned recorder id, set during device assignment
    pub recorder: Option<String>,
    /// Assigned output file, set during device assignment
    pub file: Option<String>,
    pub status: PendingStatus,
    /// A later airing of the same show exists as a fallback
    pub later_available: bool,
    /// An earlier airing of the same show exists
    pub earlier_available: bool,
}

impl PendingRecord {
    pub fn time_range(&self) -> TimeRange {
        TimeRange::new(self.start, self.start + self.duration_secs * 1000)
    }
}

impl PartialEq for PendingRecord {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PendingRecord {}

impl PartialOrd for PendingRecord {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingRecord {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.start, self.id).cmp(&(other.start, other.id))
    }
}

/// Display-oriented projection of a pending record
#[derive(Debug, Clone, Serialize)]
pub struct Upcoming {
    pub title: String,
    pub episode_title: Option<String>,
    pub channel_name: String,
    pub channel_number: String,
    pub starts_at: String,
    pub duration: String,
    pub status: String,
}

impl Upcoming {
    pub fn from_pending(record: &PendingRecord) -> Self {
        let starts_at = chrono::DateTime::from_timestamp_millis(record.start)
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();

        Self {
            title: record.show.title.clone(),
            episode_title: record.show.episode_title.clone(),
            channel_name: record.channel.name.clone(),
            channel_number: record.channel.number.clone(),
            starts_at,
            duration: format_duration(record.duration_secs),
            status: record.status.as_str().to_string(),
        }
    }
}

/// Human-readable duration, rounded up to whole minutes
fn format_duration(secs: i64) -> String {
    format!("{} min", (secs + 59) / 60)
}
