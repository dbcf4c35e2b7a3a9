// 📚 Requirement Catalog - Immutable degree requirements
//
// A catalog is a list of requirement categories. Each category is exactly one of:
//   - Flat:      a list of courses, any subset counted individually
//   - Sequenced: alternative tracks ("sequences") of courses
//   - Generic:   no course list, completed through a synthetic placeholder record
//
// Catalogs are loaded once (built-in or from JSON) and never mutated.

pub mod rutgers_cs;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Default availability hint for catalog courses and imported records
pub const DEFAULT_SEMESTER: &str = "Fall/Spring";

// ============================================================================
// COURSE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// One academic course as listed in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    /// Institutional course code (e.g. "01:198:111"), treated as opaque
    pub code: String,

    pub name: String,

    pub credits: u32,

    /// Availability hint only, never a scheduling constraint
    #[serde(default = "default_semester")]
    pub semester: String,

    /// Informational, not enforced
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prereqs: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,

    /// Informational tag (e.g. "CC-O")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

fn default_semester() -> String {
    DEFAULT_SEMESTER.to_string()
}

impl Course {
    pub fn new(code: &str, name: &str, credits: u32) -> Self {
        Course {
            code: code.to_string(),
            name: name.to_string(),
            credits,
            semester: default_semester(),
            prereqs: Vec::new(),
            difficulty: None,
            category: None,
        }
    }
}

// ============================================================================
// SEQUENCE
// ============================================================================

/// One alternative track within a sequenced category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sequence {
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Number of courses needed for the track to count as complete
    pub required_courses: usize,

    /// Credit target for the track (displayed, not used for completion)
    pub total_credits: u32,

    pub courses: Vec<Course>,
}

impl Sequence {
    pub fn contains(&self, code: &str) -> bool {
        self.courses.iter().any(|c| c.code == code)
    }
}

// ============================================================================
// REQUIREMENT CATEGORY
// ============================================================================

/// Shape of a requirement category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CategoryKind {
    Flat { courses: Vec<Course> },
    Sequenced { sequences: Vec<Sequence> },
    Generic,
}

/// Informational breakdown of a category (not used in computation)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subcategory {
    pub name: String,
    pub credits: u32,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementCategory {
    /// Stable key (e.g. "computerScience"); also the synthetic code prefix
    pub key: String,

    pub name: String,

    /// Target credits for the bucket
    pub credits: u32,

    #[serde(default)]
    pub description: String,

    #[serde(flatten)]
    pub kind: CategoryKind,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subcategories: Vec<Subcategory>,
}

impl RequirementCategory {
    pub fn is_generic(&self) -> bool {
        matches!(self.kind, CategoryKind::Generic)
    }

    /// Every course listed by the category, across all sequences
    pub fn courses(&self) -> Box<dyn Iterator<Item = &Course> + '_> {
        match &self.kind {
            CategoryKind::Flat { courses } => Box::new(courses.iter()),
            CategoryKind::Sequenced { sequences } => {
                Box::new(sequences.iter().flat_map(|s| s.courses.iter()))
            }
            CategoryKind::Generic => Box::new(std::iter::empty()),
        }
    }

    pub fn find_course(&self, code: &str) -> Option<&Course> {
        self.courses().find(|c| c.code == code)
    }

    /// Code of the placeholder record that completes a generic category
    pub fn synthetic_code(&self) -> String {
        format!("{}_course", self.key)
    }

    /// Prefix carried by every synthetic record of this category
    pub fn synthetic_prefix(&self) -> String {
        format!("{}_", self.key)
    }

    /// Whether a stored record code counts toward this category
    pub fn counts_code(&self, code: &str) -> bool {
        match &self.kind {
            CategoryKind::Flat { courses } => courses.iter().any(|c| c.code == code),
            CategoryKind::Sequenced { sequences } => sequences.iter().any(|s| s.contains(code)),
            CategoryKind::Generic => code.starts_with(&self.synthetic_prefix()),
        }
    }
}

// ============================================================================
// MUTUALLY-EXCLUSIVE GROUPS
// ============================================================================

/// Course codes that are alternative fulfillments of one sub-requirement.
/// At most one member may be completed at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExclusiveGroup {
    /// Key of the category the group belongs to
    pub category: String,
    pub codes: Vec<String>,
}

impl ExclusiveGroup {
    pub fn contains(&self, code: &str) -> bool {
        self.codes.iter().any(|c| c == code)
    }
}

// ============================================================================
// CATALOG
// ============================================================================

/// What a code resolves to when a user marks it complete
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolved<'a> {
    /// A listed course (flat or sequence)
    Course(&'a Course),

    /// A generic category key; completed via its synthetic record
    Generic(&'a RequirementCategory),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    pub name: String,

    /// Credits required for the degree
    pub total_credits: u32,

    pub categories: Vec<RequirementCategory>,

    #[serde(default)]
    pub exclusive_groups: Vec<ExclusiveGroup>,
}

impl Catalog {
    /// Built-in Rutgers CS B.S. catalog
    pub fn builtin() -> Self {
        rutgers_cs::catalog()
    }

    /// Load and validate a catalog from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read catalog file: {:?}", path.as_ref()))?;

        let catalog: Catalog =
            serde_json::from_str(&content).context("Failed to parse catalog JSON")?;

        catalog.validate()?;
        Ok(catalog)
    }

    /// Structural checks: unique keys, positive credits, groups that resolve
    pub fn validate(&self) -> Result<()> {
        if self.total_credits == 0 {
            bail!("Catalog '{}' has zero total credits", self.name);
        }

        let mut keys = HashSet::new();
        for category in &self.categories {
            if !keys.insert(category.key.as_str()) {
                bail!("Duplicate category key: {}", category.key);
            }
            for course in category.courses() {
                if course.credits == 0 {
                    bail!("Course {} in {} has zero credits", course.code, category.key);
                }
            }
            if let CategoryKind::Sequenced { sequences } = &category.kind {
                for seq in sequences {
                    if seq.required_courses > seq.courses.len() {
                        bail!(
                            "Sequence '{}' requires {} courses but lists {}",
                            seq.name,
                            seq.required_courses,
                            seq.courses.len()
                        );
                    }
                }
            }
        }

        for group in &self.exclusive_groups {
            if self.category(&group.category).is_none() {
                bail!("Exclusive group refers to unknown category: {}", group.category);
            }
            for code in &group.codes {
                if self.find_course(code).is_none() {
                    bail!("Exclusive group member not in catalog: {}", code);
                }
            }
        }

        Ok(())
    }

    pub fn category(&self, key: &str) -> Option<&RequirementCategory> {
        self.categories.iter().find(|c| c.key == key)
    }

    /// First listed course with this code, scanning categories in order
    pub fn find_course(&self, code: &str) -> Option<&Course> {
        self.categories.iter().find_map(|c| c.find_course(code))
    }

    /// Resolve a user-supplied code: generic category keys first, then listed courses
    pub fn resolve(&self, code: &str) -> Option<Resolved<'_>> {
        if let Some(category) = self.category(code).filter(|c| c.is_generic()) {
            return Some(Resolved::Generic(category));
        }
        self.find_course(code).map(Resolved::Course)
    }

    /// The exclusive group a code belongs to, if any
    pub fn group_for(&self, code: &str) -> Option<&ExclusiveGroup> {
        self.exclusive_groups.iter().find(|g| g.contains(code))
    }

    /// Sum of category targets (not necessarily equal to `total_credits`)
    pub fn category_credits(&self) -> u32 {
        self.categories.iter().map(|c| c.credits).sum()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builtin_catalog_is_valid() {
        let catalog = Catalog::builtin();
        catalog.validate().unwrap();

        assert_eq!(catalog.total_credits, 120);
        assert!(catalog.category("computerScience").is_some());
        assert!(catalog.category("naturalSciences").unwrap().is_generic());
    }

    #[test]
    fn test_resolve_listed_and_sequence_courses() {
        let catalog = Catalog::builtin();

        match catalog.resolve("01:198:111") {
            Some(Resolved::Course(course)) => assert_eq!(course.credits, 4),
            other => panic!("unexpected resolution: {:?}", other),
        }

        // Sequence courses resolve too
        match catalog.resolve("01:750:194") {
            Some(Resolved::Course(course)) => assert_eq!(course.credits, 1),
            other => panic!("unexpected resolution: {:?}", other),
        }

        assert!(catalog.resolve("99:999:999").is_none());
    }

    #[test]
    fn test_resolve_generic_key() {
        let catalog = Catalog::builtin();

        match catalog.resolve("naturalSciences") {
            Some(Resolved::Generic(category)) => {
                assert_eq!(category.synthetic_code(), "naturalSciences_course");
                assert!(category.counts_code("naturalSciences_course"));
            }
            other => panic!("unexpected resolution: {:?}", other),
        }

        // Flat category keys are not completable as a whole
        assert!(catalog.resolve("computerScience").is_none());
    }

    #[test]
    fn test_group_lookup() {
        let catalog = Catalog::builtin();

        let group = catalog.group_for("14:332:226").unwrap();
        assert_eq!(group.category, "csAdditional");
        assert_eq!(group.codes.len(), 3);
        assert!(catalog.group_for("01:198:111").is_none());
    }

    #[test]
    fn test_catalog_json_roundtrip_through_file() {
        let catalog = Catalog::builtin();
        let json = serde_json::to_string_pretty(&catalog).unwrap();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let loaded = Catalog::from_file(file.path()).unwrap();
        assert_eq!(loaded, catalog);
    }

    #[test]
    fn test_validate_rejects_unknown_group_member() {
        let mut catalog = Catalog::builtin();
        catalog.exclusive_groups.push(ExclusiveGroup {
            category: "csAdditional".to_string(),
            codes: vec!["00:000:000".to_string()],
        });

        assert!(catalog.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_keys() {
        let mut catalog = Catalog::builtin();
        let dup = catalog.categories[0].clone();
        catalog.categories.push(dup);

        assert!(catalog.validate().is_err());
    }

    #[test]
    fn test_generic_category_json_shape() {
        let json = r#"{
            "key": "electivesLite",
            "name": "Free Electives",
            "credits": 6,
            "kind": "generic"
        }"#;

        let category: RequirementCategory = serde_json::from_str(json).unwrap();
        assert!(category.is_generic());
        assert_eq!(category.courses().count(), 0);
    }
}
