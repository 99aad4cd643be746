//! Trait seams for the external collaborators of the scheduler
//!
//! The scheduler consumes guide data, recording rules, the recording store
//! and the recorder pool through these interfaces; concrete backends are
//! injected at construction time.

use std::sync::Arc;

use anyhow::Result;

use crate::models::{Channel, Recording, RecordingRule, ShowAiring};

/// A recording already underway on a recorder, not managed by the
/// current scheduling pass
#[derive(Debug, Clone)]
pub struct ActiveRecording {
    pub channel: Channel,
    /// Actual start as epoch milliseconds
    pub started_at: i64,
    pub duration_secs: i64,
}

/// Read-only access to electronic program guide data
pub trait GuideProvider: Send + Sync {
    /// Resolve a channel by its guide and listing identifiers
    fn channel_by_id(&self, channel_id: &str, listing_id: &str) -> Option<Channel>;

    /// All airings of a series on a channel, in guide order
    fn show_airings_by_channel_and_series(
        &self,
        channel: &Channel,
        series_id: &str,
    ) -> Vec<ShowAiring>;
}

/// One configured recorder device
pub trait RecorderHandle: Send + Sync {
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    /// Channels this device can tune
    fn channels(&self) -> Vec<Channel>;

    /// Preferred devices are tried first during assignment
    fn preferred(&self) -> bool {
        false
    }

    /// The recording this device is currently busy with, if any
    fn active_recording(&self) -> Option<ActiveRecording> {
        None
    }

    /// Output container extension for files recorded by this device
    fn file_extension(&self) -> &str {
        "mpg"
    }
}

/// The pool of configured recorder devices
pub trait RecorderPool: Send + Sync {
    /// Configured recorders, in configuration order
    fn recorders(&self) -> Vec<Arc<dyn RecorderHandle>>;
}

/// Persistent store of user-defined recording rules
pub trait RuleStore: Send + Sync {
    fn rules(&self) -> Result<Vec<RecordingRule>>;

    /// Remove a rule; used to consume expired one-shot rules
    fn remove_rule(&self, id: i64) -> Result<()>;
}

/// Persistent store of recordings and the recorded-show dedup ledger
pub trait RecordingStore: Send + Sync {
    /// Persist a recording entry, returning its id
    fn add_recording(&self, recording: &Recording) -> Result<i64>;

    /// Whether a show is in the dedup ledger
    fn is_recorded(&self, show_id: &str) -> Result<bool>;

    /// Mark a show as recorded
    fn add_recorded(&self, show_id: &str) -> Result<()>;

    /// Forget a show, forcing it to be re-recordable
    fn remove_recorded(&self, show_id: &str) -> Result<()>;
}

/// Notified after every successful recompute
pub trait ScheduleListener: Send + Sync {
    fn schedule_updated(&self);
}
