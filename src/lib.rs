//! Personal video recorder scheduling engine
//!
//! Turns user-defined recording rules and electronic program guide data into
//! a conflict-free assignment of recorder devices to time slots. The heart
//! of the crate is [`scheduler::Scheduler`]; guide data, rule and recording
//! stores and the recorder pool are injected through the trait seams in
//! [`providers`].

pub mod database;
pub mod models;
pub mod providers;
pub mod recorder;
pub mod scheduler;
pub mod service;
pub mod storage;

pub use database::SqliteStore;
pub use models::{
    Airing, Channel, PendingRecord, PendingStatus, Recording, RecordingRule, RecordingStatus,
    RuleKind, Show, ShowAiring, TimeRange, Upcoming,
};
pub use providers::{
    ActiveRecording, GuideProvider, RecorderHandle, RecorderPool, RecordingStore, RuleStore,
    ScheduleListener,
};
pub use recorder::RecorderInfo;
pub use scheduler::Scheduler;
pub use service::{DvrService, RecordingLauncher};
pub use storage::{StorageAllocator, MIN_FREE_SPACE_BYTES};

/// Initialize logging for scheduler operations
///
/// When debug_logging is false, verbose logs are suppressed and only INFO
/// and above are shown.
pub fn init_logging(debug_logging: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if debug_logging {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    let subscriber = fmt()
        .with_target(true)
        .with_level(true)
        .with_env_filter(filter)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
