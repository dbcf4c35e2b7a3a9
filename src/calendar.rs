// 📅 Academic Calendar - Terms, key dates and registration links
//
// Academic years run September to August ("2025-2026"). Each year holds its
// terms (fall, winter, spring, summer) and each term its dated events.
// The built-in calendar ships as data/academic_calendar.json.

use anyhow::{bail, Context, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const BUILTIN_CALENDAR: &str = include_str!("../data/academic_calendar.json");

const WEBREG_BASE: &str = "https://sims.rutgers.edu/webreg/editSchedule.htm";
const RATE_MY_PROFESSORS_BASE: &str = "https://www.ratemyprofessors.com/search/professors/1260";

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TermKey {
    Fall,
    Winter,
    Spring,
    Summer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    SemesterStart,
    SemesterEnd,
    Holiday,
    Reading,
    Exams,
    Minicourse,
    Special,
    Registration,
    Commencement,
    Session,
    Intersession,
}

/// Either a single day or an inclusive date range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventDates {
    Range {
        #[serde(rename = "startDate")]
        start_date: NaiveDate,
        #[serde(rename = "endDate")]
        end_date: NaiveDate,
    },
    Single {
        date: NaiveDate,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub name: String,
    #[serde(flatten)]
    pub dates: EventDates,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub event_type: EventType,
}

impl CalendarEvent {
    pub fn start(&self) -> NaiveDate {
        match &self.dates {
            EventDates::Range { start_date, .. } => *start_date,
            EventDates::Single { date } => *date,
        }
    }

    pub fn end(&self) -> NaiveDate {
        match &self.dates {
            EventDates::Range { end_date, .. } => *end_date,
            EventDates::Single { date } => *date,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Term {
    pub key: TermKey,
    /// Display label, also used as the completion semester ("Fall 2025")
    pub label: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub events: Vec<CalendarEvent>,
}

impl Term {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcademicYear {
    /// "2025-2026"
    pub year: String,
    pub terms: Vec<Term>,
}

impl AcademicYear {
    pub fn term(&self, key: TermKey) -> Option<&Term> {
        self.terms.iter().find(|t| t.key == key)
    }
}

/// An event together with the term it belongs to
#[derive(Debug, Clone, Serialize)]
pub struct UpcomingEvent {
    pub term: String,
    #[serde(flatten)]
    pub event: CalendarEvent,
}

// ============================================================================
// CALENDAR
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcademicCalendar {
    pub years: Vec<AcademicYear>,
}

impl AcademicCalendar {
    /// Calendar bundled with the crate
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_CALENDAR).context("Failed to parse built-in academic calendar")
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read calendar file: {:?}", path))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let calendar: AcademicCalendar =
            serde_json::from_str(content).context("Failed to parse calendar JSON")?;
        calendar.validate()?;
        Ok(calendar)
    }

    pub fn validate(&self) -> Result<()> {
        for year in &self.years {
            for term in &year.terms {
                if term.end_date < term.start_date {
                    bail!("{} ({}) ends before it starts", term.label, year.year);
                }
                for event in &term.events {
                    if event.end() < event.start() {
                        bail!("Event '{}' in {} ends before it starts", event.name, term.label);
                    }
                }
            }
        }
        Ok(())
    }

    pub fn year(&self, label: &str) -> Option<&AcademicYear> {
        self.years.iter().find(|y| y.year == label)
    }

    /// All terms across all years, ordered by start date
    pub fn terms(&self) -> Vec<&Term> {
        let mut terms: Vec<&Term> = self.years.iter().flat_map(|y| y.terms.iter()).collect();
        terms.sort_by_key(|t| t.start_date);
        terms
    }

    /// The term containing `date`, or else the next one to start
    pub fn term_for(&self, date: NaiveDate) -> Option<&Term> {
        let terms = self.terms();
        terms
            .iter()
            .find(|t| t.contains(date))
            .or_else(|| terms.iter().find(|t| t.start_date > date))
            .copied()
    }

    /// Events starting on or after `date`, soonest first
    pub fn upcoming_events(&self, date: NaiveDate, count: usize) -> Vec<UpcomingEvent> {
        let mut events: Vec<UpcomingEvent> = self
            .years
            .iter()
            .flat_map(|y| y.terms.iter())
            .flat_map(|term| {
                term.events.iter().map(move |event| UpcomingEvent {
                    term: term.label.clone(),
                    event: event.clone(),
                })
            })
            .filter(|e| e.event.start() >= date)
            .collect();

        events.sort_by_key(|e| e.event.start());
        events.truncate(count);
        events
    }
}

/// Academic year label for a date; September starts a new year
pub fn academic_year_for(date: NaiveDate) -> String {
    let year = date.year();
    if date.month() >= 9 {
        format!("{}-{}", year, year + 1)
    } else {
        format!("{}-{}", year - 1, year)
    }
}

/// Label used when the calendar has no term covering a date
pub fn fallback_term_label(date: NaiveDate) -> String {
    let season = match date.month() {
        1..=5 => "Spring",
        6..=8 => "Summer",
        _ => "Fall",
    };
    format!("{} {}", season, date.year())
}

// ============================================================================
// REGISTRATION LINKS
// ============================================================================

/// WebReg semester selection: <year>1 spring, <year>7 summer, <year>9 fall
pub fn webreg_term_code(date: NaiveDate) -> String {
    let suffix = match date.month() {
        1..=4 => '1',
        5..=8 => '7',
        _ => '9',
    };
    format!("{}{}", date.year(), suffix)
}

pub fn webreg_url(course_code: &str, date: NaiveDate) -> String {
    let index = course_code.replace(':', "");
    format!(
        "{}?login=cas&semesterSelection={}&indexList={}",
        WEBREG_BASE,
        webreg_term_code(date),
        urlencoding::encode(&index)
    )
}

/// Professor search link, only offered for computer science (198) courses
pub fn rate_my_professors_url(course_code: &str) -> Option<String> {
    if !course_code.contains("198:") {
        return None;
    }
    Some(format!(
        "{}?q={}",
        RATE_MY_PROFESSORS_BASE,
        urlencoding::encode(course_code)
    ))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_builtin_calendar_loads() {
        let calendar = AcademicCalendar::builtin().unwrap();

        assert!(calendar.year("2025-2026").is_some());
        assert!(calendar.year("2026-2027").is_some());

        let fall = calendar.year("2025-2026").unwrap().term(TermKey::Fall).unwrap();
        assert_eq!(fall.label, "Fall 2025");
        assert_eq!(fall.start_date, day(2025, 9, 2));

        println!("✅ Built-in calendar test PASSED");
    }

    #[test]
    fn test_academic_year_for() {
        assert_eq!(academic_year_for(day(2025, 9, 1)), "2025-2026");
        assert_eq!(academic_year_for(day(2026, 3, 15)), "2025-2026");
        assert_eq!(academic_year_for(day(2026, 8, 31)), "2025-2026");
    }

    #[test]
    fn test_term_for() {
        let calendar = AcademicCalendar::builtin().unwrap();

        assert_eq!(calendar.term_for(day(2025, 10, 17)).unwrap().label, "Fall 2025");
        assert_eq!(calendar.term_for(day(2026, 2, 1)).unwrap().label, "Spring 2026");
        // Between fall classes ending and winter session starting
        assert_eq!(calendar.term_for(day(2025, 12, 15)).unwrap().label, "Winter 2025");
        assert!(calendar.term_for(day(2030, 1, 1)).is_none());
    }

    #[test]
    fn test_upcoming_events() {
        let calendar = AcademicCalendar::builtin().unwrap();

        let events = calendar.upcoming_events(day(2026, 10, 17), 3);

        let names: Vec<&str> = events.iter().map(|e| e.event.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Changes in Designation of Class Days",
                "Thanksgiving Recess (no classes)",
                "Regular Classes End",
            ]
        );
        assert!(events.iter().all(|e| e.term == "Fall 2026"));
        assert_eq!(events[1].event.end(), day(2026, 11, 29));

        // The start day itself counts as upcoming
        let today = calendar.upcoming_events(day(2026, 12, 10), 1);
        assert_eq!(today[0].event.event_type, EventType::SemesterEnd);
    }

    #[test]
    fn test_rejects_inverted_range() {
        let json = r#"{"years": [{"year": "2025-2026", "terms": [
            {"key": "fall", "label": "Fall 2025", "startDate": "2025-12-10", "endDate": "2025-09-02"}
        ]}]}"#;

        assert!(AcademicCalendar::from_json(json).is_err());
    }

    #[test]
    fn test_registration_links() {
        assert_eq!(webreg_term_code(day(2026, 3, 1)), "20261");
        assert_eq!(webreg_term_code(day(2026, 6, 1)), "20267");
        assert_eq!(webreg_term_code(day(2026, 10, 17)), "20269");

        assert_eq!(
            webreg_url("01:198:111", day(2026, 10, 17)),
            "https://sims.rutgers.edu/webreg/editSchedule.htm?login=cas&semesterSelection=20269&indexList=01198111"
        );

        assert!(rate_my_professors_url("01:640:151").is_none());
        assert_eq!(
            rate_my_professors_url("01:198:111").unwrap(),
            "https://www.ratemyprofessors.com/search/professors/1260?q=01%3A198%3A111"
        );
    }

    #[test]
    fn test_fallback_term_label() {
        assert_eq!(fallback_term_label(day(2031, 10, 1)), "Fall 2031");
        assert_eq!(fallback_term_label(day(2031, 2, 1)), "Spring 2031");
    }
}
