// 🎓 Planner - State container for one user's degree progress
//
// Owns the completed-course store and the signed-in session. Every mutation:
//   1. updates the store synchronously (optimistic)
//   2. records the backend writes it implies in the outbox
//
// The outbox is drained into a `SyncQueue` by the caller (server worker or CLI).
// Resolution failures are not errors: they come back as `MutationOutcome::Skipped`
// and are logged.

use crate::catalog::{Catalog, Resolved};
use crate::reconciliation::ProgressReport;
use crate::store::{CompletedCourseRecord, CompletedCourseStore};
use crate::sync::{ProgressBackend, SyncOp};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

// ============================================================================
// SESSION & AUTH EVENTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSession {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl UserSession {
    pub fn new(user_id: &str) -> Self {
        UserSession {
            user_id: user_id.to_string(),
            email: None,
        }
    }
}

/// Auth-state change delivered by the authentication collaborator
#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    SignedIn(UserSession),
    SignedOut,
}

// ============================================================================
// MUTATION OUTCOMES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    UnknownCode,
    AlreadyCompleted,
    NotCompleted,
    NotSignedIn,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MutationOutcome {
    Added {
        record: CompletedCourseRecord,
        /// Group members retired by this addition
        evicted: Vec<CompletedCourseRecord>,
    },
    Removed {
        record: CompletedCourseRecord,
    },
    Skipped {
        code: String,
        reason: SkipReason,
    },
}

impl MutationOutcome {
    fn skipped(code: &str, reason: SkipReason) -> Self {
        debug!(code, ?reason, "mutation skipped");
        MutationOutcome::Skipped {
            code: code.to_string(),
            reason,
        }
    }

    pub fn is_applied(&self) -> bool {
        !matches!(self, MutationOutcome::Skipped { .. })
    }
}

/// Result of merging a batch of identified courses
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkOutcome {
    pub added: Vec<CompletedCourseRecord>,
    pub evicted: Vec<CompletedCourseRecord>,
    pub skipped: Vec<String>,
}

// ============================================================================
// PLANNER
// ============================================================================

#[derive(Debug, Clone)]
pub struct Planner {
    catalog: Arc<Catalog>,
    store: CompletedCourseStore,
    session: Option<UserSession>,
    /// Term stamped on new records (e.g. "Fall 2025")
    current_term: String,
    outbox: Vec<SyncOp>,
}

impl Planner {
    pub fn new(catalog: Arc<Catalog>, current_term: &str) -> Self {
        Planner {
            catalog,
            store: CompletedCourseStore::new(),
            session: None,
            current_term: current_term.to_string(),
            outbox: Vec::new(),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn store(&self) -> &CompletedCourseStore {
        &self.store
    }

    pub fn session(&self) -> Option<&UserSession> {
        self.session.as_ref()
    }

    pub fn current_term(&self) -> &str {
        &self.current_term
    }

    pub fn report(&self) -> ProgressReport {
        ProgressReport::build(&self.catalog, &self.store)
    }

    /// Backend writes produced since the last drain, in order
    pub fn drain_outbox(&mut self) -> Vec<SyncOp> {
        std::mem::take(&mut self.outbox)
    }

    // ------------------------------------------------------------------------
    // Auth
    // ------------------------------------------------------------------------

    /// Sign-in replaces local state with the backend copy; sign-out clears it.
    /// A failed load is logged and leaves the store empty.
    ///
    /// Returns false only when a sign-in could not load from the backend.
    pub fn handle_auth_event(&mut self, event: AuthEvent, backend: &dyn ProgressBackend) -> bool {
        match event {
            AuthEvent::SignedIn(session) => {
                info!(user = %session.user_id, "user signed in");
                let (store, loaded) = match backend.completed_courses(&session.user_id) {
                    Ok(records) => (CompletedCourseStore::from_records(records), true),
                    Err(e) => {
                        warn!(user = %session.user_id, "failed to load completed courses: {:#}", e);
                        (CompletedCourseStore::new(), false)
                    }
                };
                self.store = store;
                self.session = Some(session);
                loaded
            }
            AuthEvent::SignedOut => {
                info!("user signed out, clearing state");
                self.session = None;
                self.store.clear();
                true
            }
        }
    }

    // ------------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------------

    /// Mark a course (or a generic category key) complete.
    ///
    /// Members of an exclusive group replace any other completed member.
    pub fn add_completed_course(&mut self, code: &str) -> MutationOutcome {
        let record = match self.catalog.resolve(code) {
            Some(Resolved::Course(course)) => {
                CompletedCourseRecord::from_course(course, &self.current_term)
            }
            Some(Resolved::Generic(category)) => {
                CompletedCourseRecord::placeholder(category, &self.current_term)
            }
            None => return MutationOutcome::skipped(code, SkipReason::UnknownCode),
        };

        let Some(user_id) = self.session.as_ref().map(|s| s.user_id.clone()) else {
            return MutationOutcome::skipped(code, SkipReason::NotSignedIn);
        };

        if self.store.contains(&record.code) {
            return MutationOutcome::skipped(&record.code, SkipReason::AlreadyCompleted);
        }

        let evicted = self.insert_with_eviction(&user_id, record.clone());
        info!(user = %user_id, code = %record.code, evicted = evicted.len(), "course completed");

        MutationOutcome::Added { record, evicted }
    }

    /// Unmark a course. A generic category key resolves to its synthetic record.
    /// Removing a code that is not stored is a no-op.
    pub fn remove_completed_course(&mut self, code: &str) -> MutationOutcome {
        let Some(user_id) = self.session.as_ref().map(|s| s.user_id.clone()) else {
            return MutationOutcome::skipped(code, SkipReason::NotSignedIn);
        };

        let actual_code = match self.catalog.resolve(code) {
            Some(Resolved::Generic(category)) => category.synthetic_code(),
            _ => code.to_string(),
        };

        let Some(record) = self.store.remove(&actual_code) else {
            return MutationOutcome::skipped(&actual_code, SkipReason::NotCompleted);
        };

        self.outbox.push(SyncOp::Remove {
            user_id: user_id.clone(),
            code: actual_code,
        });
        info!(user = %user_id, code = %record.code, "course removed");

        MutationOutcome::Removed { record }
    }

    /// Merge validated courses identified from a transcript.
    ///
    /// Records are taken as given (they need not be catalog courses). Already
    /// completed codes are skipped; exclusive groups still apply. One backend
    /// write per record, no atomicity across the batch.
    pub fn apply_identified_courses(&mut self, records: Vec<CompletedCourseRecord>) -> BulkOutcome {
        let mut outcome = BulkOutcome::default();

        let Some(user_id) = self.session.as_ref().map(|s| s.user_id.clone()) else {
            warn!(count = records.len(), "identified courses dropped: no signed-in user");
            outcome.skipped = records.into_iter().map(|r| r.code).collect();
            return outcome;
        };

        for record in records {
            if self.store.contains(&record.code) {
                outcome.skipped.push(record.code);
                continue;
            }
            let evicted = self.insert_with_eviction(&user_id, record.clone());
            outcome.evicted.extend(evicted);
            outcome.added.push(record);
        }

        info!(
            user = %user_id,
            added = outcome.added.len(),
            skipped = outcome.skipped.len(),
            "identified courses applied"
        );
        outcome
    }

    /// Insert `record`, evicting other members of its exclusive group first.
    /// Queues one remove per evicted record, then the add.
    fn insert_with_eviction(
        &mut self,
        user_id: &str,
        record: CompletedCourseRecord,
    ) -> Vec<CompletedCourseRecord> {
        let evicted = match self.catalog.group_for(&record.code) {
            Some(group) => self.store.evict_except(&group.codes, &record.code),
            None => Vec::new(),
        };

        for old in &evicted {
            self.outbox.push(SyncOp::Remove {
                user_id: user_id.to_string(),
                code: old.code.clone(),
            });
        }

        self.outbox.push(SyncOp::Add {
            user_id: user_id.to_string(),
            record: record.clone(),
        });
        self.store.insert(record);

        evicted
    }
}

// ============================================================================
// TESTS
// ============================================================================
