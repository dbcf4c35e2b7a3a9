// 🗄️ SQLite persistence backend
//
// Implements `ProgressBackend` over two tables:
//   - user_progress: one row per (user_id, course_code)
//   - events:        append-only audit trail of progress changes

use crate::store::CompletedCourseRecord;
use crate::sync::ProgressBackend;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

// ============================================================================
// EVENTS (audit trail)
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub user_id: String,
    pub course_code: String,
    pub data: serde_json::Value,
}

impl Event {
    pub fn new(event_type: &str, user_id: &str, course_code: &str, data: serde_json::Value) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            user_id: user_id.to_string(),
            course_code: course_code.to_string(),
            data,
        }
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL for crash recovery (no-op for in-memory databases)
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS user_progress (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            course_code TEXT NOT NULL,
            course_name TEXT NOT NULL,
            credits INTEGER NOT NULL,
            semester TEXT NOT NULL,
            completed_at TEXT NOT NULL,
            UNIQUE (user_id, course_code)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            user_id TEXT NOT NULL,
            course_code TEXT NOT NULL,
            data TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_progress_user ON user_progress(user_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_user ON events(user_id, timestamp)",
        [],
    )?;

    Ok(())
}

pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (event_id, timestamp, event_type, user_id, course_code, data)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.user_id,
            event.course_code,
            data_json,
        ],
    )?;

    Ok(())
}

/// Audit events for a user, newest first
pub fn get_events_for_user(conn: &Connection, user_id: &str) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, user_id, course_code, data
         FROM events
         WHERE user_id = ?1
         ORDER BY timestamp DESC, id DESC",
    )?;

    let events = stmt
        .query_map(params![user_id], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                    .map_err(|_| rusqlite::Error::InvalidQuery)?
                    .with_timezone(&Utc),
                event_type: row.get(2)?,
                user_id: row.get(3)?,
                course_code: row.get(4)?,
                data: serde_json::from_str(&data_json)
                    .map_err(|_| rusqlite::Error::InvalidQuery)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

// ============================================================================
// PROGRESS QUERIES
// ============================================================================

/// Completed courses for a user, most recently completed first
pub fn get_completed_courses(conn: &Connection, user_id: &str) -> Result<Vec<CompletedCourseRecord>> {
    let mut stmt = conn.prepare(
        "SELECT course_code, course_name, credits, semester
         FROM user_progress
         WHERE user_id = ?1
         ORDER BY completed_at DESC, id DESC",
    )?;

    let records = stmt
        .query_map(params![user_id], |row| {
            Ok(CompletedCourseRecord {
                code: row.get(0)?,
                name: row.get(1)?,
                credits: row.get(2)?,
                semester: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(records)
}

/// Insert one completed course. Returns false when the row already exists.
pub fn insert_completed_course(
    conn: &Connection,
    user_id: &str,
    record: &CompletedCourseRecord,
) -> Result<bool> {
    let result = conn.execute(
        "INSERT INTO user_progress (user_id, course_code, course_name, credits, semester, completed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            user_id,
            record.code,
            record.name,
            record.credits,
            record.semester,
            Utc::now().to_rfc3339(),
        ],
    );

    match result {
        Ok(_) => {
            let event = Event::new(
                "course_completed",
                user_id,
                &record.code,
                serde_json::json!({
                    "name": record.name,
                    "credits": record.credits,
                    "semester": record.semester,
                }),
            );
            insert_event(conn, &event)?;
            Ok(true)
        }
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            debug!(user = user_id, code = %record.code, "completed course already stored");
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

/// Delete one completed course. Returns the number of rows removed.
pub fn delete_completed_course(conn: &Connection, user_id: &str, code: &str) -> Result<usize> {
    let removed = conn.execute(
        "DELETE FROM user_progress WHERE user_id = ?1 AND course_code = ?2",
        params![user_id, code],
    )?;

    if removed > 0 {
        let event = Event::new("course_removed", user_id, code, serde_json::json!({}));
        insert_event(conn, &event)?;
    }

    Ok(removed)
}

pub fn count_completed_courses(conn: &Connection, user_id: &str) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM user_progress WHERE user_id = ?1",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

// ============================================================================
// CSV IMPORT
// ============================================================================

/// Load completed-course records from a CSV with columns code,name,credits,semester
pub fn load_csv(csv_path: &Path) -> Result<Vec<CompletedCourseRecord>> {
    let mut rdr = csv::Reader::from_path(csv_path)
        .with_context(|| format!("Failed to open CSV file: {:?}", csv_path))?;

    let mut records = Vec::new();
    for (line, result) in rdr.deserialize().enumerate() {
        let record: CompletedCourseRecord =
            result.with_context(|| format!("Failed to deserialize course on row {}", line + 2))?;
        records.push(record);
    }

    Ok(records)
}

// ============================================================================
// SQLITE PROGRESS STORE
// ============================================================================

/// `ProgressBackend` over a single SQLite connection
pub struct SqliteProgressStore {
    conn: Mutex<Connection>,
}

impl SqliteProgressStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {:?}", path))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        setup_database(&conn)?;
        Ok(SqliteProgressStore {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database connection lock poisoned"))
    }

    pub fn events_for_user(&self, user_id: &str) -> Result<Vec<Event>> {
        get_events_for_user(&*self.conn()?, user_id)
    }
}

impl ProgressBackend for SqliteProgressStore {
    fn completed_courses(&self, user_id: &str) -> Result<Vec<CompletedCourseRecord>> {
        get_completed_courses(&*self.conn()?, user_id)
    }

    fn add_completed_course(&self, user_id: &str, record: &CompletedCourseRecord) -> Result<()> {
        insert_completed_course(&*self.conn()?, user_id, record).map(|_| ())
    }

    fn remove_completed_course(&self, user_id: &str, code: &str) -> Result<()> {
        delete_completed_course(&*self.conn()?, user_id, code).map(|_| ())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn record(code: &str, credits: u32) -> CompletedCourseRecord {
        CompletedCourseRecord::new(code, "Test Course", credits, "Fall 2025")
    }

    #[test]
    fn test_insert_twice_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        assert!(insert_completed_course(&conn, "user-1", &record("01:198:111", 4)).unwrap());
        assert!(!insert_completed_course(&conn, "user-1", &record("01:198:111", 4)).unwrap());

        assert_eq!(count_completed_courses(&conn, "user-1").unwrap(), 1);
        println!("✅ Idempotent insert test PASSED");
    }

    #[test]
    fn test_rows_are_scoped_per_user() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        insert_completed_course(&conn, "user-1", &record("A", 3)).unwrap();
        insert_completed_course(&conn, "user-2", &record("A", 3)).unwrap();
        insert_completed_course(&conn, "user-2", &record("B", 4)).unwrap();

        assert_eq!(get_completed_courses(&conn, "user-1").unwrap().len(), 1);
        assert_eq!(get_completed_courses(&conn, "user-2").unwrap().len(), 2);

        assert_eq!(delete_completed_course(&conn, "user-2", "A").unwrap(), 1);
        assert_eq!(delete_completed_course(&conn, "user-2", "A").unwrap(), 0);
        assert_eq!(get_completed_courses(&conn, "user-1").unwrap().len(), 1);
    }

    #[test]
    fn test_event_log() {
        let store = SqliteProgressStore::open_in_memory().unwrap();

        store.add_completed_course("user-1", &record("01:198:111", 4)).unwrap();
        store.remove_completed_course("user-1", "01:198:111").unwrap();
        // Removing an absent row writes no event
        store.remove_completed_course("user-1", "01:198:111").unwrap();

        let events = store.events_for_user("user-1").unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "course_removed");
        assert_eq!(events[1].event_type, "course_completed");
        assert_eq!(events[1].data["credits"], 4);

        println!("✅ Event log test PASSED");
    }

    #[test]
    fn test_backend_roundtrip() {
        let store = SqliteProgressStore::open_in_memory().unwrap();

        store.add_completed_course("user-1", &record("A", 3)).unwrap();
        store.add_completed_course("user-1", &record("B", 1)).unwrap();

        let loaded = store.completed_courses("user-1").unwrap();
        let mut codes: Vec<String> = loaded.iter().map(|r| r.code.clone()).collect();
        codes.sort();
        assert_eq!(codes, vec!["A", "B"]);
        assert!(loaded.iter().all(|r| r.semester == "Fall 2025"));
    }

    #[test]
    fn test_load_csv() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "code,name,credits,semester").unwrap();
        writeln!(file, "01:198:111,Introduction to Computer Science,4,Fall 2024").unwrap();
        writeln!(file, "01:640:151,Calculus I,4,Fall 2024").unwrap();

        let records = load_csv(file.path()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].code, "01:198:111");
        assert_eq!(records[1].credits, 4);
    }

    #[test]
    fn test_load_csv_rejects_bad_credits() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "code,name,credits,semester").unwrap();
        writeln!(file, "01:198:111,Intro,four,Fall 2024").unwrap();

        let err = load_csv(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("row 2"));
    }
}
