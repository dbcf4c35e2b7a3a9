// ⚖️ Progress Reconciliation - Completed courses against the requirement catalog
//
// Pure functions over (catalog, store). Nothing here mutates state or touches the
// backend, so every figure can be recomputed at any time from the two inputs.
//
// Sequences report two figures that may disagree:
//   - completion by COUNT  (completed courses >= required_courses)
//   - credits against the sequence's total_credits
// Both are kept and the disagreement is flagged rather than resolved.

use crate::catalog::{Catalog, CategoryKind, Course, RequirementCategory, Sequence};
use crate::store::CompletedCourseStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// CORE FIGURES
// ============================================================================

/// Sum of credits over every stored record
pub fn total_credits_completed(store: &CompletedCourseStore) -> u32 {
    store.iter().map(|r| r.credits).sum()
}

/// round(100 × completed / total), not clamped at 100. A zero total yields 0.
pub fn completion_percentage(store: &CompletedCourseStore, catalog_total_credits: u32) -> u32 {
    if catalog_total_credits == 0 {
        return 0;
    }
    let completed = total_credits_completed(store) as u64;
    let total = catalog_total_credits as u64;
    // Integer round-half-up
    ((200 * completed + total) / (2 * total)) as u32
}

/// Credits of stored records that count toward `category`
pub fn credits_by_category(category: &RequirementCategory, store: &CompletedCourseStore) -> u32 {
    store
        .iter()
        .filter(|r| category.counts_code(&r.code))
        .map(|r| r.credits)
        .sum()
}

/// Count-based completion: at least `required_courses` stored records in the sequence
pub fn is_sequence_complete(sequence: &Sequence, store: &CompletedCourseStore) -> bool {
    completed_in_sequence(sequence, store) >= sequence.required_courses
}

/// True when `code` is a group member, another member is already stored,
/// and `code` itself is not stored
pub fn is_group_locked(group_codes: &[String], code: &str, store: &CompletedCourseStore) -> bool {
    if !group_codes.iter().any(|c| c == code) {
        return false;
    }

    let mut stored = store
        .iter()
        .filter(|r| group_codes.iter().any(|c| *c == r.code))
        .peekable();

    stored.peek().is_some() && !stored.any(|r| r.code == code)
}

/// Lock check using the catalog's declared exclusive groups
pub fn is_locked(catalog: &Catalog, code: &str, store: &CompletedCourseStore) -> bool {
    catalog
        .group_for(code)
        .map(|group| is_group_locked(&group.codes, code, store))
        .unwrap_or(false)
}

fn completed_in_sequence(sequence: &Sequence, store: &CompletedCourseStore) -> usize {
    store.iter().filter(|r| sequence.contains(&r.code)).count()
}

fn credits_in_sequence(sequence: &Sequence, store: &CompletedCourseStore) -> u32 {
    store
        .iter()
        .filter(|r| sequence.contains(&r.code))
        .map(|r| r.credits)
        .sum()
}

// ============================================================================
// SEQUENCE PROGRESS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceMismatch {
    /// Enough courses, but fewer credits than the sequence target
    CountMetCreditsShort,

    /// Credit target reached, but fewer courses than required
    CreditsMetCountShort,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceProgress {
    pub name: String,
    pub completed_courses: usize,
    pub required_courses: usize,
    pub completed_credits: u32,
    pub total_credits: u32,
    /// Completion by course count
    pub complete: bool,
    pub credits_met: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mismatch: Option<SequenceMismatch>,
    pub courses: Vec<CourseStatus>,
}

impl SequenceProgress {
    pub fn is_started(&self) -> bool {
        self.completed_courses > 0
    }
}

pub fn sequence_progress(
    catalog: &Catalog,
    sequence: &Sequence,
    store: &CompletedCourseStore,
) -> SequenceProgress {
    let completed_courses = completed_in_sequence(sequence, store);
    let completed_credits = credits_in_sequence(sequence, store);
    let complete = completed_courses >= sequence.required_courses;
    let credits_met = completed_credits >= sequence.total_credits;

    let mismatch = match (complete, credits_met) {
        (true, false) => Some(SequenceMismatch::CountMetCreditsShort),
        (false, true) => Some(SequenceMismatch::CreditsMetCountShort),
        _ => None,
    };

    SequenceProgress {
        name: sequence.name.clone(),
        completed_courses,
        required_courses: sequence.required_courses,
        completed_credits,
        total_credits: sequence.total_credits,
        complete,
        credits_met,
        mismatch,
        courses: sequence
            .courses
            .iter()
            .map(|c| CourseStatus::of(catalog, c, store))
            .collect(),
    }
}

// ============================================================================
// CATEGORY PROGRESS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseStatus {
    pub code: String,
    pub name: String,
    pub credits: u32,
    pub completed: bool,
    /// Another member of the course's exclusive group is already completed
    pub locked: bool,
}

impl CourseStatus {
    fn of(catalog: &Catalog, course: &Course, store: &CompletedCourseStore) -> Self {
        CourseStatus {
            code: course.code.clone(),
            name: course.name.clone(),
            credits: course.credits,
            completed: store.contains(&course.code),
            locked: is_locked(catalog, &course.code, store),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CategoryDetail {
    Flat {
        courses: Vec<CourseStatus>,
    },
    Sequenced {
        sequences: Vec<SequenceProgress>,
    },
    Generic {
        placeholder_code: String,
        completed: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryProgress {
    pub key: String,
    pub name: String,
    pub target_credits: u32,
    pub completed_credits: u32,
    pub remaining_credits: u32,
    pub complete: bool,
    pub detail: CategoryDetail,
}

pub fn category_progress(
    catalog: &Catalog,
    category: &RequirementCategory,
    store: &CompletedCourseStore,
) -> CategoryProgress {
    let completed_credits = credits_by_category(category, store);

    let detail = match &category.kind {
        CategoryKind::Flat { courses } => CategoryDetail::Flat {
            courses: courses
                .iter()
                .map(|c| CourseStatus::of(catalog, c, store))
                .collect(),
        },
        CategoryKind::Sequenced { sequences } => CategoryDetail::Sequenced {
            sequences: sequences
                .iter()
                .map(|s| sequence_progress(catalog, s, store))
                .collect(),
        },
        CategoryKind::Generic => {
            let placeholder_code = category.synthetic_code();
            CategoryDetail::Generic {
                completed: store.contains(&placeholder_code),
                placeholder_code,
            }
        }
    };

    CategoryProgress {
        key: category.key.clone(),
        name: category.name.clone(),
        target_credits: category.credits,
        completed_credits,
        remaining_credits: category.credits.saturating_sub(completed_credits),
        complete: completed_credits >= category.credits,
        detail,
    }
}

// ============================================================================
// PROGRESS REPORT
// ============================================================================

/// Read-only view model for one user's progress
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressReport {
    pub catalog: String,
    pub completed_credits: u32,
    pub total_credits: u32,
    pub percentage: u32,
    /// Percentage reached 100 (callers celebrate rather than treat overflow as an error)
    pub graduated: bool,
    pub completed_courses: usize,
    pub categories: Vec<CategoryProgress>,
    pub generated_at: DateTime<Utc>,
}

impl ProgressReport {
    pub fn build(catalog: &Catalog, store: &CompletedCourseStore) -> Self {
        let percentage = completion_percentage(store, catalog.total_credits);

        ProgressReport {
            catalog: catalog.name.clone(),
            completed_credits: total_credits_completed(store),
            total_credits: catalog.total_credits,
            percentage,
            graduated: percentage >= 100,
            completed_courses: store.len(),
            categories: catalog
                .categories
                .iter()
                .map(|c| category_progress(catalog, c, store))
                .collect(),
            generated_at: Utc::now(),
        }
    }

    pub fn category(&self, key: &str) -> Option<&CategoryProgress> {
        self.categories.iter().find(|c| c.key == key)
    }

    /// Sequences where count-based completion and credits disagree
    pub fn sequence_mismatches(&self) -> Vec<(&str, &SequenceProgress)> {
        self.categories
            .iter()
            .filter_map(|c| match &c.detail {
                CategoryDetail::Sequenced { sequences } => Some((c.key.as_str(), sequences)),
                _ => None,
            })
            .flat_map(|(key, sequences)| {
                sequences
                    .iter()
                    .filter(|s| s.mismatch.is_some())
                    .map(move |s| (key, s))
            })
            .collect()
    }

    pub fn summary(&self) -> String {
        format!(
            "{}: {}/{} credits ({}%), {} courses, {}/{} categories complete",
            self.catalog,
            self.completed_credits,
            self.total_credits,
            self.percentage,
            self.completed_courses,
            self.categories.iter().filter(|c| c.complete).count(),
            self.categories.len()
        )
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::CompletedCourseRecord;

    fn record(code: &str, credits: u32) -> CompletedCourseRecord {
        CompletedCourseRecord::new(code, "Test Course", credits, "Fall 2025")
    }

    fn store_of(records: &[(&str, u32)]) -> CompletedCourseStore {
        CompletedCourseStore::from_records(records.iter().map(|(c, cr)| record(c, *cr)).collect())
    }

    fn two_course_sequence() -> Sequence {
        Sequence {
            name: "Test Track".to_string(),
            description: String::new(),
            required_courses: 2,
            total_credits: 5,
            courses: vec![
                Course::new("X", "Course X", 4),
                Course::new("Y", "Course Y", 1),
                Course::new("Z", "Course Z", 1),
            ],
        }
    }

    #[test]
    fn test_empty_store_is_zero_percent() {
        let store = CompletedCourseStore::new();

        assert_eq!(total_credits_completed(&store), 0);
        assert_eq!(completion_percentage(&store, 120), 0);
    }

    #[test]
    fn test_single_course_percentage() {
        let store = store_of(&[("01:198:111", 4)]);

        // round(100 * 4 / 120) = round(3.33) = 3
        assert_eq!(completion_percentage(&store, 120), 3);
    }

    #[test]
    fn test_percentage_rounds_half_up_and_is_not_clamped() {
        // 100 * 3 / 120 = 2.5 -> 3
        assert_eq!(completion_percentage(&store_of(&[("A", 3)]), 120), 3);

        let over = store_of(&[("A", 100), ("B", 32)]);
        assert_eq!(completion_percentage(&over, 120), 110);

        assert_eq!(completion_percentage(&over, 0), 0);
    }

    #[test]
    fn test_total_credits_independent_of_order() {
        let a = store_of(&[("A", 4), ("B", 3), ("C", 1)]);
        let b = store_of(&[("C", 1), ("A", 4), ("B", 3)]);

        assert_eq!(total_credits_completed(&a), 8);
        assert_eq!(total_credits_completed(&a), total_credits_completed(&b));
    }

    #[test]
    fn test_percentage_monotonic() {
        let codes = ["A", "B", "C", "D", "E"];
        let mut store = CompletedCourseStore::new();
        let mut last = completion_percentage(&store, 120);

        for code in codes {
            store.insert(record(code, 3));
            let now = completion_percentage(&store, 120);
            assert!(now >= last);
            last = now;
        }

        for code in codes {
            store.remove(code);
            let now = completion_percentage(&store, 120);
            assert!(now <= last);
            last = now;
        }
        assert_eq!(last, 0);
    }

    #[test]
    fn test_sequence_complete_by_count() {
        let sequence = two_course_sequence();

        let both = store_of(&[("X", 4), ("Y", 1)]);
        assert!(is_sequence_complete(&sequence, &both));
        assert_eq!(credits_in_sequence(&sequence, &both), 5);

        // X plus a different member still meets the count threshold
        let other = store_of(&[("X", 4), ("Z", 1)]);
        assert!(is_sequence_complete(&sequence, &other));

        let one = store_of(&[("X", 4)]);
        assert!(!is_sequence_complete(&sequence, &one));
    }

    #[test]
    fn test_sequence_mismatch_flags() {
        let catalog = Catalog::builtin();
        let mut sequence = two_course_sequence();
        sequence.total_credits = 6;

        // Count met, credits short (4 + 1 < 6)
        let progress = sequence_progress(&catalog, &sequence, &store_of(&[("X", 4), ("Y", 1)]));
        assert!(progress.complete);
        assert!(!progress.credits_met);
        assert_eq!(progress.mismatch, Some(SequenceMismatch::CountMetCreditsShort));

        // Credits met by a heavy record, count short
        sequence.total_credits = 4;
        let progress = sequence_progress(&catalog, &sequence, &store_of(&[("X", 4)]));
        assert!(!progress.complete);
        assert_eq!(progress.mismatch, Some(SequenceMismatch::CreditsMetCountShort));
    }

    #[test]
    fn test_group_lock() {
        let group = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        let store = store_of(&[("B", 4)]);

        assert!(is_group_locked(&group, "A", &store));
        assert!(is_group_locked(&group, "C", &store));
        assert!(!is_group_locked(&group, "B", &store));
        assert!(!is_group_locked(&group, "D", &store));
        assert!(!is_group_locked(&group, "A", &CompletedCourseStore::new()));
    }

    #[test]
    fn test_credits_by_category_kinds() {
        let catalog = Catalog::builtin();
        let store = store_of(&[
            ("01:198:111", 4),
            ("01:198:112", 4),
            ("01:750:193", 4),
            ("01:160:171", 1),
            ("naturalSciences_course", 8),
            ("electives_misc", 4),
        ]);

        let cs = catalog.category("computerScience").unwrap();
        assert_eq!(credits_by_category(cs, &store), 8);

        // Any sequence counts; the shared chemistry lab is counted once
        let physics = catalog.category("physics").unwrap();
        assert_eq!(credits_by_category(physics, &store), 5);

        let ns = catalog.category("naturalSciences").unwrap();
        assert_eq!(credits_by_category(ns, &store), 8);

        let ah = catalog.category("artsHumanities").unwrap();
        assert_eq!(credits_by_category(ah, &store), 0);
    }

    #[test]
    fn test_report_build() {
        let catalog = Catalog::builtin();
        let store = store_of(&[("01:198:206", 4), ("01:750:193", 4), ("01:750:194", 1)]);

        let report = ProgressReport::build(&catalog, &store);

        assert_eq!(report.completed_credits, 9);
        assert_eq!(report.percentage, 8);
        assert!(!report.graduated);

        let additional = report.category("csAdditional").unwrap();
        assert!(additional.complete);
        let CategoryDetail::Flat { courses } = &additional.detail else {
            panic!("csAdditional should be flat");
        };
        let locked: Vec<&str> = courses.iter().filter(|c| c.locked).map(|c| c.code.as_str()).collect();
        assert_eq!(locked, vec!["01:640:477", "14:332:226"]);

        let physics = report.category("physics").unwrap();
        let CategoryDetail::Sequenced { sequences } = &physics.detail else {
            panic!("physics should be sequenced");
        };
        assert!(sequences[0].complete);
        assert!(sequences[0].credits_met);
        assert!(!sequences[1].is_started());
        assert!(report.sequence_mismatches().is_empty());

        println!("✅ {}", report.summary());
    }

    #[test]
    fn test_report_graduated_at_full_credits() {
        let catalog = Catalog::builtin();
        let store = store_of(&[("bulk_a", 60), ("bulk_b", 60)]);

        let report = ProgressReport::build(&catalog, &store);
        assert_eq!(report.percentage, 100);
        assert!(report.graduated);
    }
}
