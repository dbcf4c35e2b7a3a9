// 🔁 Backend Sync - Queued persistence writes with bounded retry
//
// Mutations update local state first and queue the matching backend writes here.
// Writes are applied in FIFO order. A failing write is retried with exponential
// backoff; after `max_attempts` it is abandoned into the failed list, which stays
// visible through `SyncStatus` until that user's next full reload. The list keeps
// at most `MAX_FAILED` entries, oldest dropped first.
//
// Local state is never rolled back on failure.

use crate::store::CompletedCourseRecord;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Abandoned writes kept for reporting
pub const MAX_FAILED: usize = 100;

// ============================================================================
// PERSISTENCE CONTRACT
// ============================================================================

/// Persistence collaborator: a per-user list of completed courses
pub trait ProgressBackend: Send + Sync {
    fn completed_courses(&self, user_id: &str) -> Result<Vec<CompletedCourseRecord>>;

    fn add_completed_course(&self, user_id: &str, record: &CompletedCourseRecord) -> Result<()>;

    fn remove_completed_course(&self, user_id: &str, code: &str) -> Result<()>;
}

// ============================================================================
// SYNC OPERATIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SyncOp {
    Add {
        user_id: String,
        record: CompletedCourseRecord,
    },
    Remove {
        user_id: String,
        code: String,
    },
}

impl SyncOp {
    pub fn user_id(&self) -> &str {
        match self {
            SyncOp::Add { user_id, .. } | SyncOp::Remove { user_id, .. } => user_id,
        }
    }

    pub fn code(&self) -> &str {
        match self {
            SyncOp::Add { record, .. } => &record.code,
            SyncOp::Remove { code, .. } => code,
        }
    }

    pub fn apply(&self, backend: &dyn ProgressBackend) -> Result<()> {
        match self {
            SyncOp::Add { user_id, record } => backend.add_completed_course(user_id, record),
            SyncOp::Remove { user_id, code } => backend.remove_completed_course(user_id, code),
        }
    }
}

// ============================================================================
// RETRY POLICY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per operation before it is abandoned (at least 1)
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        RetryPolicy {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: Duration::from_secs(30),
        }
    }

    /// No waiting between attempts (tests, one-shot CLI runs)
    pub fn immediate(max_attempts: u32) -> Self {
        RetryPolicy {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (1-based): base × 2^(attempt-1), capped
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_millis(250))
    }
}

// ============================================================================
// SYNC STATUS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedOp {
    pub op: SyncOp,
    pub attempts: u32,
    pub error: String,
}

/// Observable state of the queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SyncStatus {
    /// Nothing pending, nothing abandoned
    Synced,

    /// Writes waiting for their first attempt
    Pending { pending: usize },

    /// The head write failed and will be retried
    Retrying {
        pending: usize,
        attempts: u32,
        last_error: String,
    },

    /// Some writes were abandoned; local and backend state diverge until reload
    Failed { pending: usize, failed: Vec<FailedOp> },
}

impl SyncStatus {
    pub fn is_synced(&self) -> bool {
        matches!(self, SyncStatus::Synced)
    }
}

/// Outcome of one attempt on the head of the queue
#[derive(Debug, Clone, PartialEq)]
pub enum SyncStep {
    Idle,
    Applied(SyncOp),
    /// Failed; caller should wait `delay` before the next attempt
    Retry { delay: Duration, error: String },
    Abandoned(FailedOp),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncReport {
    pub applied: usize,
    pub retries: usize,
    pub abandoned: usize,
}

// ============================================================================
// SYNC QUEUE
// ============================================================================

#[derive(Debug)]
struct PendingOp {
    op: SyncOp,
    attempts: u32,
    last_error: Option<String>,
}

#[derive(Debug)]
pub struct SyncQueue {
    pending: VecDeque<PendingOp>,
    failed: Vec<FailedOp>,
    policy: RetryPolicy,
}

impl SyncQueue {
    pub fn new(policy: RetryPolicy) -> Self {
        SyncQueue {
            pending: VecDeque::new(),
            failed: Vec::new(),
            policy,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn enqueue<I: IntoIterator<Item = SyncOp>>(&mut self, ops: I) {
        for op in ops {
            debug!(user = op.user_id(), code = op.code(), "queued backend write");
            self.pending.push_back(PendingOp {
                op,
                attempts: 0,
                last_error: None,
            });
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn failed(&self) -> &[FailedOp] {
        &self.failed
    }

    /// Forget all abandoned writes
    pub fn clear_failed(&mut self) {
        self.failed.clear();
    }

    /// Forget one user's abandoned writes after their state was reloaded from the backend
    pub fn clear_failed_for(&mut self, user_id: &str) -> usize {
        let before = self.failed.len();
        self.failed.retain(|f| f.op.user_id() != user_id);
        let cleared = before - self.failed.len();
        if cleared > 0 {
            info!(user = user_id, cleared, "cleared abandoned writes after reload");
        }
        cleared
    }

    /// Copy of the operation the next attempt will apply
    pub fn head(&self) -> Option<SyncOp> {
        self.pending.front().map(|p| p.op.clone())
    }

    /// Attempt the head operation once
    pub fn attempt_next(&mut self, backend: &dyn ProgressBackend) -> SyncStep {
        let Some(op) = self.head() else {
            return SyncStep::Idle;
        };
        let result = op.apply(backend);
        self.record_attempt(&op, result)
    }

    /// Record the result of applying `op`, which must still be the head.
    /// Returns `Idle` when the head changed in the meantime.
    pub fn record_attempt(&mut self, op: &SyncOp, result: Result<()>) -> SyncStep {
        let Some(head) = self.pending.front_mut().filter(|p| p.op == *op) else {
            debug!(user = op.user_id(), code = op.code(), "head changed during write, result dropped");
            return SyncStep::Idle;
        };

        head.attempts += 1;
        match result {
            Ok(()) => {
                let done = self.pending.pop_front().map(|p| p.op);
                match done {
                    Some(op) => {
                        debug!(user = op.user_id(), code = op.code(), "backend write applied");
                        SyncStep::Applied(op)
                    }
                    None => SyncStep::Idle,
                }
            }
            Err(e) => {
                let error = format!("{:#}", e);
                head.last_error = Some(error.clone());

                if head.attempts >= self.policy.max_attempts {
                    let attempts = head.attempts;
                    let Some(abandoned) = self.pending.pop_front() else {
                        return SyncStep::Idle;
                    };
                    warn!(
                        user = abandoned.op.user_id(),
                        code = abandoned.op.code(),
                        attempts,
                        "backend write abandoned (local state kept): {}",
                        error
                    );
                    let failed = FailedOp {
                        op: abandoned.op,
                        attempts,
                        error,
                    };
                    if self.failed.len() >= MAX_FAILED {
                        self.failed.remove(0);
                    }
                    self.failed.push(failed.clone());
                    SyncStep::Abandoned(failed)
                } else {
                    let delay = self.policy.delay_for(head.attempts);
                    warn!(
                        user = head.op.user_id(),
                        code = head.op.code(),
                        attempt = head.attempts,
                        "backend write failed, retrying in {:?}: {}",
                        delay,
                        error
                    );
                    SyncStep::Retry { delay, error }
                }
            }
        }
    }

    /// Drain the queue on the current thread, sleeping between retries
    pub fn flush_blocking(&mut self, backend: &dyn ProgressBackend) -> SyncReport {
        drain(|| self.attempt_next(backend))
    }

    pub fn status(&self) -> SyncStatus {
        let pending = self.pending.len();

        if !self.failed.is_empty() {
            return SyncStatus::Failed {
                pending,
                failed: self.failed.clone(),
            };
        }

        match self.pending.front() {
            None => SyncStatus::Synced,
            Some(PendingOp {
                attempts,
                last_error: Some(error),
                ..
            }) => SyncStatus::Retrying {
                pending,
                attempts: *attempts,
                last_error: error.clone(),
            },
            Some(_) => SyncStatus::Pending { pending },
        }
    }
}

impl Default for SyncQueue {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

// ============================================================================
// SHARED QUEUE
// ============================================================================

fn lock(queue: &Mutex<SyncQueue>) -> MutexGuard<'_, SyncQueue> {
    queue.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Attempt the head of a shared queue, holding the lock only to read the head
/// and to record the result. The backend write runs unlocked.
pub fn attempt_shared(queue: &Mutex<SyncQueue>, backend: &dyn ProgressBackend) -> SyncStep {
    let Some(op) = lock(queue).head() else {
        return SyncStep::Idle;
    };
    let result = op.apply(backend);
    lock(queue).record_attempt(&op, result)
}

/// `flush_blocking` for a shared queue
pub fn flush_shared(queue: &Mutex<SyncQueue>, backend: &dyn ProgressBackend) -> SyncReport {
    drain(|| attempt_shared(queue, backend))
}

fn drain(mut attempt: impl FnMut() -> SyncStep) -> SyncReport {
    let mut report = SyncReport::default();

    loop {
        match attempt() {
            SyncStep::Idle => break,
            SyncStep::Applied(_) => report.applied += 1,
            SyncStep::Abandoned(_) => report.abandoned += 1,
            SyncStep::Retry { delay, .. } => {
                report.retries += 1;
                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }
            }
        }
    }

    if report.applied > 0 || report.abandoned > 0 {
        info!(
            applied = report.applied,
            retries = report.retries,
            abandoned = report.abandoned,
            "sync flush finished"
        );
    }
    report
}

// ============================================================================
// TESTS
// ============================================================================
