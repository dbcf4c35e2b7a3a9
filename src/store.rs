// 🗂️ Completed-Course Store - The user's finished courses
//
// Ordered, unique by code. The store itself is plain data: mutual exclusivity and
// persistence are handled by the planner that owns it.

use crate::catalog::{Course, RequirementCategory};
use serde::{Deserialize, Serialize};

// ============================================================================
// COMPLETED COURSE RECORD
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedCourseRecord {
    pub code: String,
    pub name: String,
    pub credits: u32,
    /// Term in which the course was completed (e.g. "Fall 2025")
    pub semester: String,
}

impl CompletedCourseRecord {
    pub fn new(code: &str, name: &str, credits: u32, semester: &str) -> Self {
        CompletedCourseRecord {
            code: code.to_string(),
            name: name.to_string(),
            credits,
            semester: semester.to_string(),
        }
    }

    /// Record for a listed catalog course
    pub fn from_course(course: &Course, semester: &str) -> Self {
        Self::new(&course.code, &course.name, course.credits, semester)
    }

    /// Placeholder record that completes a generic category as a whole
    pub fn placeholder(category: &RequirementCategory, semester: &str) -> Self {
        CompletedCourseRecord {
            code: category.synthetic_code(),
            name: format!("{} Course", category.name),
            credits: category.credits,
            semester: semester.to_string(),
        }
    }
}

// ============================================================================
// COMPLETED COURSE STORE
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompletedCourseStore {
    records: Vec<CompletedCourseRecord>,
}

impl CompletedCourseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from backend rows, keeping the first record per code
    pub fn from_records(records: Vec<CompletedCourseRecord>) -> Self {
        let mut store = Self::new();
        for record in records {
            store.insert(record);
        }
        store
    }

    pub fn contains(&self, code: &str) -> bool {
        self.records.iter().any(|r| r.code == code)
    }

    pub fn get(&self, code: &str) -> Option<&CompletedCourseRecord> {
        self.records.iter().find(|r| r.code == code)
    }

    /// Append a record; returns false (and leaves the store unchanged) on a duplicate code
    pub fn insert(&mut self, record: CompletedCourseRecord) -> bool {
        if self.contains(&record.code) {
            return false;
        }
        self.records.push(record);
        true
    }

    pub fn remove(&mut self, code: &str) -> Option<CompletedCourseRecord> {
        let index = self.records.iter().position(|r| r.code == code)?;
        Some(self.records.remove(index))
    }

    /// Remove every record whose code is in `codes` except `keep`, returning what was removed
    pub fn evict_except(&mut self, codes: &[String], keep: &str) -> Vec<CompletedCourseRecord> {
        let mut evicted = Vec::new();
        self.records.retain(|r| {
            let evict = r.code != keep && codes.iter().any(|c| *c == r.code);
            if evict {
                evicted.push(r.clone());
            }
            !evict
        });
        evicted
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn records(&self) -> &[CompletedCourseRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompletedCourseRecord> {
        self.records.iter()
    }

    pub fn codes(&self) -> Vec<String> {
        self.records.iter().map(|r| r.code.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn record(code: &str, credits: u32) -> CompletedCourseRecord {
        CompletedCourseRecord::new(code, "Test Course", credits, "Fall 2025")
    }

    #[test]
    fn test_insert_rejects_duplicate_code() {
        let mut store = CompletedCourseStore::new();

        assert!(store.insert(record("01:198:111", 4)));
        assert!(!store.insert(record("01:198:111", 3)));

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("01:198:111").unwrap().credits, 4);
    }

    #[test]
    fn test_remove_absent_code() {
        let mut store = CompletedCourseStore::from_records(vec![record("A", 1)]);

        assert!(store.remove("B").is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_evict_except_keeps_order() {
        let mut store = CompletedCourseStore::from_records(vec![
            record("A", 1),
            record("X", 4),
            record("B", 1),
            record("Y", 1),
        ]);

        let group = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        let evicted = store.evict_except(&group, "B");

        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].code, "A");
        assert_eq!(store.codes(), vec!["X", "B", "Y"]);
    }

    #[test]
    fn test_from_records_dedupes() {
        let store = CompletedCourseStore::from_records(vec![record("A", 1), record("A", 2)]);

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("A").unwrap().credits, 1);
    }
}
