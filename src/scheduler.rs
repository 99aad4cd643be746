//! Recording scheduler
//!
//! Turns recording rules and guide data into a conflict-free assignment of
//! recorder devices to time slots. A pass rebuilds the whole plan from
//! scratch: rules expand into candidate pending records, duplicates and
//! already-recorded shows are resolved, devices and output files are
//! assigned, and the finished plan replaces the published list atomically.
//!
//! Safe to re-run at any time as new guide data or rules arrive; only one
//! pass runs at a time.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::models::{
    Channel, PendingRecord, PendingStatus, Recording, RecordingRule, RecordingStatus, RuleKind,
    ShowAiring, Upcoming,
};
use crate::providers::{
    GuideProvider, RecorderPool, RecordingStore, RuleStore, ScheduleListener,
};
use crate::recorder::RecorderInfo;
use crate::storage::StorageAllocator;

/// How far ahead of its start a pending record becomes extractable
const READY_WINDOW_SECONDS: i64 = 60;

/// Trimmed off every airing to absorb typical guide/tuner slack
const GUIDE_SLACK_TRIM_SECONDS: i64 = 10;

/// Outcome of scanning the recorder pool for one candidate
enum Assignment {
    Ready { recorder: String, file: String },
    NoSpace,
    NoDevice,
}

/// The recording scheduler
///
/// Collaborators are injected as trait objects; the scheduler owns only the
/// published pending-record list.
pub struct Scheduler {
    guide: Arc<dyn GuideProvider>,
    rules: Arc<dyn RuleStore>,
    store: Arc<dyn RecordingStore>,
    pool: Arc<dyn RecorderPool>,
    storage: Arc<StorageAllocator>,
    listeners: Mutex<Vec<Arc<dyn ScheduleListener>>>,
    /// The authoritative plan, sorted by start time
    published: Mutex<Vec<PendingRecord>>,
    /// Held across a whole recompute; one pass in flight at a time
    recompute_gate: Mutex<()>,
    next_id: AtomicU64,
}

impl Scheduler {
    pub fn new(
        guide: Arc<dyn GuideProvider>,
        rules: Arc<dyn RuleStore>,
        store: Arc<dyn RecordingStore>,
        pool: Arc<dyn RecorderPool>,
        storage: Arc<StorageAllocator>,
    ) -> Self {
        Self {
            guide,
            rules,
            store,
            pool,
            storage,
            listeners: Mutex::new(Vec::new()),
            published: Mutex::new(Vec::new()),
            recompute_gate: Mutex::new(()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a listener for schedule-updated notifications
    pub fn add_listener(&self, listener: Arc<dyn ScheduleListener>) {
        self.listeners.lock().push(listener);
    }

    /// Recompute the full recording plan and publish it
    ///
    /// Synchronous; returns after the new plan is visible to readers. On
    /// error the previously published list is left untouched.
    pub fn request_rescheduling(&self) -> Result<()> {
        let _pass = self.recompute_gate.lock();
        let now = Utc::now().timestamp_millis();

        let plan = self.compute_plan(now)?;

        let ready = plan
            .iter()
            .filter(|r| r.status == PendingStatus::Ready)
            .count();
        let conflicts = plan
            .iter()
            .filter(|r| r.status == PendingStatus::Conflict)
            .count();
        info!(
            "scheduling pass complete: {} pending record(s), {} ready, {} in conflict",
            plan.len(),
            ready,
            conflicts
        );

        *self.published.lock() = plan;

        for listener in self.listeners.lock().iter() {
            listener.schedule_updated();
        }

        Ok(())
    }

    /// Snapshot of the published pending-record list
    pub fn pending_records(&self) -> Vec<PendingRecord> {
        self.published.lock().clone()
    }

    /// Display projection of the published list
    pub fn get_upcomings(&self) -> Vec<Upcoming> {
        self.published.lock().iter().map(Upcoming::from_pending).collect()
    }

    /// Dequeue pending records whose start time is within the ready window
    ///
    /// Ready records get their draft recording persisted as in-progress and
    /// their show added to the dedup ledger, then are returned for handoff
    /// to the recording executor. Non-ready records in the window could
    /// never have executed and are dropped.
    pub fn get_ready_pending_records(&self) -> Result<Vec<PendingRecord>> {
        let now = Utc::now().timestamp_millis();
        let horizon = now + READY_WINDOW_SECONDS * 1000;

        let due: Vec<PendingRecord> = {
            let mut published = self.published.lock();
            let (due, rest): (Vec<_>, Vec<_>) =
                published.drain(..).partition(|r| r.start <= horizon);
            *published = rest;
            due
        };

        let mut ready = Vec::new();
        for mut record in due {
            if record.status != PendingStatus::Ready {
                debug!(
                    "dropping {} record for '{}' past its window",
                    record.status.as_str(),
                    record.show.title
                );
                continue;
            }

            record.recording.status = RecordingStatus::Recording;
            record.recording.id = self.store.add_recording(&record.recording)?;
            self.store.add_recorded(&record.show.id)?;
            ready.push(record);
        }

        Ok(ready)
    }

    /// One full scheduling pass over rules, guide data and the recorder pool
    fn compute_plan(&self, now: i64) -> Result<Vec<PendingRecord>> {
        let mut handles = self.pool.recorders();
        handles.sort_by_key(|h| !h.preferred());

        let mut infos: Vec<RecorderInfo> = handles
            .iter()
            .map(|h| RecorderInfo::from_handle(h.as_ref()))
            .collect();
        let live_channels: HashSet<String> = handles
            .iter()
            .filter_map(|h| h.active_recording())
            .map(|a| a.channel.id)
            .collect();

        let mut rules = self.rules.rules()?;
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));

        let mut candidates = Vec::new();
        for rule in &rules {
            self.expand_rule(rule, now, &live_channels, &mut candidates)?;
        }

        for candidate in candidates.iter_mut() {
            if self.store.is_recorded(&candidate.show.id)? {
                debug!("'{}' already recorded, suppressing", candidate.show.title);
                candidate.status = PendingStatus::PreviousRecord;
            }
        }

        tag_duplicate_airings(&mut candidates);
        self.assign_recorders(&mut candidates, &mut infos);

        for candidate in candidates.iter_mut() {
            if candidate.status == PendingStatus::Undetermined {
                candidate.status = if candidate.later_available {
                    PendingStatus::Later
                } else {
                    PendingStatus::Conflict
                };
            }
        }

        candidates.sort();
        Ok(candidates)
    }

    /// Expand one rule into candidate pending records
    fn expand_rule(
        &self,
        rule: &RecordingRule,
        now: i64,
        live_channels: &HashSet<String>,
        candidates: &mut Vec<PendingRecord>,
    ) -> Result<()> {
        let Some(channel) = self.guide.channel_by_id(&rule.channel_id, &rule.listing_id) else {
            warn!(
                "rule {}: channel {}/{} not in guide, skipping",
                rule.id, rule.channel_id, rule.listing_id
            );
            return Ok(());
        };

        let airings: Vec<ShowAiring> = match rule.kind {
            RuleKind::Once => {
                let Some(show_airing) = rule.once_airing.clone() else {
                    warn!("one-shot rule {} has no target airing, skipping", rule.id);
                    return Ok(());
                };

                if let Some(air_date) = show_airing.airing.air_date {
                    if air_date + show_airing.airing.duration_secs * 1000 <= now {
                        info!("one-shot rule {} has expired, removing it", rule.id);
                        self.rules.remove_rule(rule.id)?;
                        return Ok(());
                    }
                }

                // One-shot rules fire even if the show was recorded before.
                self.store.remove_recorded(&show_airing.show.id)?;
                vec![show_airing]
            }
            RuleKind::Series => {
                let Some(series_id) = rule.series_id.as_deref() else {
                    warn!("series rule {} has no series id, skipping", rule.id);
                    return Ok(());
                };

                let mut airings = self
                    .guide
                    .show_airings_by_channel_and_series(&channel, series_id);
                airings.sort_by_key(|sa| sa.airing.air_date.unwrap_or(i64::MAX));
                airings
            }
        };

        for show_airing in airings {
            let Some(air_date) = show_airing.airing.air_date else {
                warn!(
                    "airing of '{}' has no date; malformed guide data, skipping",
                    show_airing.show.title
                );
                continue;
            };

            let in_progress =
                air_date <= now && now < air_date + show_airing.airing.duration_secs * 1000;
            if air_date <= now && !(in_progress && !live_channels.contains(&channel.id)) {
                continue;
            }

            candidates.push(self.candidate_from(rule, &channel, &show_airing, air_date));
        }

        Ok(())
    }

    fn candidate_from(
        &self,
        rule: &RecordingRule,
        channel: &Channel,
        show_airing: &ShowAiring,
        air_date: i64,
    ) -> PendingRecord {
        let start = air_date + rule.begin_padding_secs * 1000;
        let duration_secs = (show_airing.airing.duration_secs - GUIDE_SLACK_TRIM_SECONDS
            + rule.end_padding_secs)
            .max(0);

        let recording = Recording {
            id: 0,
            show_id: show_airing.show.id.clone(),
            title: show_airing.show.title.clone(),
            channel_name: channel.name.clone(),
            file_path: None,
            start,
            duration_secs,
            status: RecordingStatus::Scheduled,
            created_at: Utc::now().timestamp(),
        };

        PendingRecord {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            show: show_airing.show.clone(),
            start,
            duration_secs,
            channel: channel.clone(),
            rule_id: rule.id,
            series_rule: rule.kind == RuleKind::Series,
            recording,
            recorder: None,
            file: None,
            status: PendingStatus::Undetermined,
            later_available: false,
            earlier_available: false,
        }
    }

    /// Assign recorders and output files to undetermined candidates
    fn assign_recorders(&self, candidates: &mut [PendingRecord], infos: &mut [RecorderInfo]) {
        for index in 0..candidates.len() {
            if candidates[index].status != PendingStatus::Undetermined {
                continue;
            }

            let range = candidates[index].time_range();
            let channel = candidates[index].channel.clone();
            let mut assignment = Assignment::NoDevice;

            for info in infos.iter_mut() {
                if !info.supports(&channel) || info.is_busy_at(&range) {
                    continue;
                }

                match self.storage.allocate(
                    &candidates[index].show.title,
                    &candidates[index].show.id,
                    candidates[index].start,
                    info.file_extension(),
                ) {
                    Ok(path) => {
                        if !info.try_commit(range) {
                            continue;
                        }
                        assignment = Assignment::Ready {
                            recorder: info.recorder_id().to_string(),
                            file: path.to_string_lossy().into_owned(),
                        };
                    }
                    Err(err) => {
                        warn!(
                            "cannot record '{}': {}",
                            candidates[index].show.title, err
                        );
                        assignment = Assignment::NoSpace;
                    }
                }
                break;
            }

            match assignment {
                Assignment::Ready { recorder, file } => {
                    candidates[index].recorder = Some(recorder);
                    candidates[index].file = Some(file.clone());
                    candidates[index].recording.file_path = Some(file);
                    candidates[index].status = PendingStatus::Ready;

                    if candidates[index].later_available {
                        collapse_duplicates(candidates, index);
                    }
                }
                Assignment::NoSpace => {
                    candidates[index].status = PendingStatus::Conflict;
                }
                Assignment::NoDevice => {}
            }
        }
    }
}

/// Tag series candidates that have earlier/later airings of the same show
///
/// Within each group of 2+ undetermined series candidates sharing a show id,
/// the earliest learns a later airing exists, the latest learns an earlier
/// one exists, and middle entries learn both. One-shot candidates are exempt.
fn tag_duplicate_airings(candidates: &mut [PendingRecord]) {
    let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
    for (index, candidate) in candidates.iter().enumerate() {
        if candidate.status == PendingStatus::Undetermined && candidate.series_rule {
            groups
                .entry(candidate.show.id.clone())
                .or_default()
                .push(index);
        }
    }

    for (_, mut indexes) in groups {
        if indexes.len() < 2 {
            continue;
        }

        indexes.sort_by_key(|&i| candidates[i].start);
        let last = indexes.len() - 1;
        for (position, &index) in indexes.iter().enumerate() {
            candidates[index].later_available = position < last;
            candidates[index].earlier_available = position > 0;
        }
    }
}

/// A scheduled airing covers its remaining undetermined series duplicates
fn collapse_duplicates(candidates: &mut [PendingRecord], winner: usize) {
    let show_id = candidates[winner].show.id.clone();
    for (index, other) in candidates.iter_mut().enumerate() {
        if index != winner
            && other.series_rule
            && other.status == PendingStatus::Undetermined
            && other.show.id == show_id
        {
            other.status = PendingStatus::Earlier;
        }
    }
}
