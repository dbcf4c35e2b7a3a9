// Degree Planner - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod catalog;        // Degree requirements (immutable)
pub mod store;          // Completed courses (mutable)
pub mod reconciliation; // Progress figures derived from catalog + store
pub mod planner;        // Per-user state container and mutations
pub mod sync;           // Backend contract + retrying write queue
pub mod db;             // SQLite backend
pub mod transcript;     // Upload validation + AI response sanitizing
pub mod payments;       // Donation checkout + webhook signatures
pub mod calendar;       // Academic calendar + registration links
pub mod config;
pub mod logging;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use catalog::{
    Catalog, CategoryKind, Course, ExclusiveGroup, RequirementCategory, Resolved, Sequence,
    DEFAULT_SEMESTER,
};
pub use store::{CompletedCourseRecord, CompletedCourseStore};
pub use reconciliation::{
    completion_percentage, total_credits_completed, CategoryDetail, CategoryProgress,
    ProgressReport, SequenceMismatch, SequenceProgress,
};
pub use planner::{AuthEvent, BulkOutcome, MutationOutcome, Planner, SkipReason, UserSession};
pub use sync::{ProgressBackend, RetryPolicy, SyncOp, SyncQueue, SyncReport, SyncStatus};
pub use db::{load_csv, setup_database, Event, SqliteProgressStore};
pub use transcript::{
    parse_identified_courses, validate_upload, AnalysisRequest, TextExtractor,
    TranscriptAnalyzer, TranscriptError, UploadError,
};
pub use payments::{
    verify_webhook_signature, CheckoutProvider, CheckoutRequest, PaymentError,
};
pub use calendar::{academic_year_for, AcademicCalendar, CalendarEvent, Term};
pub use config::{Config, ServerConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
