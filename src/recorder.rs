//! Per-device scheduling view
//!
//! A `RecorderInfo` is scratch state rebuilt at the start of every scheduling
//! pass: the channels a device can tune plus the time ranges already
//! committed to it. It is never shared outside the pass that built it.

use tracing::debug;

use crate::models::{Channel, TimeRange};
use crate::providers::RecorderHandle;

/// Scheduling view of one recorder device for the duration of a pass
#[derive(Debug, Clone)]
pub struct RecorderInfo {
    recorder_id: String,
    name: String,
    channels: Vec<Channel>,
    file_extension: String,
    /// Committed ranges, kept sorted by start; never overlapping
    committed: Vec<TimeRange>,
}

impl RecorderInfo {
    /// Build a fresh view from a live recorder handle
    ///
    /// A device that is mid-recording gets that range committed up front so
    /// the new plan cannot double-book it.
    pub fn from_handle(handle: &dyn RecorderHandle) -> Self {
        let mut info = Self {
            recorder_id: handle.id().to_string(),
            name: handle.name().to_string(),
            channels: handle.channels(),
            file_extension: handle.file_extension().to_string(),
            committed: Vec::new(),
        };

        if let Some(active) = handle.active_recording() {
            let range = TimeRange::new(
                active.started_at,
                active.started_at + active.duration_secs * 1000,
            );
            debug!(
                "recorder {} busy with a live recording until {}",
                info.recorder_id, range.end
            );
            info.committed.push(range);
        }

        info
    }

    pub fn recorder_id(&self) -> &str {
        &self.recorder_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn file_extension(&self) -> &str {
        &self.file_extension
    }

    /// Whether this device can tune the given channel
    pub fn supports(&self, channel: &Channel) -> bool {
        self.channels.iter().any(|c| c.id == channel.id)
    }

    /// Whether any committed range overlaps the given one
    pub fn is_busy_at(&self, range: &TimeRange) -> bool {
        self.committed.iter().any(|c| c.overlaps(range))
    }

    /// Commit a range to this device
    ///
    /// Returns false without committing if the range overlaps an existing
    /// commitment, so the non-overlap invariant cannot be broken through
    /// this method. Callers check `is_busy_at` first and treat a false
    /// return as the device being taken.
    pub fn try_commit(&mut self, range: TimeRange) -> bool {
        if self.is_busy_at(&range) {
            return false;
        }
        self.committed.push(range);
        self.committed.sort_by_key(|r| r.start);
        true
    }

    /// Forget all committed ranges
    pub fn clear(&mut self) {
        self.committed.clear();
    }

    pub fn committed(&self) -> &[TimeRange] {
        &self.committed
    }
}
