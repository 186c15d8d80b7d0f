// Shared fixtures: a small copy of the portal-mammals `surveys` table.

#![allow(dead_code)]

use rusqlite::{params, Connection, Result};
use std::path::PathBuf;
use tempfile::TempDir;

// (record_id, month, day, year, plot_id, species_id, sex, hindfoot_length, weight)
type Survey = (
    i64,
    i64,
    i64,
    i64,
    i64,
    &'static str,
    &'static str,
    Option<i64>,
    Option<i64>,
);

pub const SURVEYS: &[Survey] = &[
    (1, 7, 16, 1977, 2, "NL", "M", Some(32), None),
    (2, 5, 12, 1994, 3, "DM", "M", Some(37), Some(41)),
    (3, 6, 2, 1996, 2, "DM", "F", Some(35), Some(40)),
    (4, 8, 21, 1998, 7, "DM", "M", Some(36), Some(44)),
    (5, 3, 9, 2000, 4, "DM", "F", None, Some(39)),
    (6, 1, 30, 1995, 3, "DM", "F", Some(34), Some(38)),
    (7, 10, 5, 1996, 11, "DS", "M", Some(50), Some(120)),
    (8, 4, 17, 1997, 12, "DS", "F", Some(49), Some(115)),
    (9, 9, 8, 1999, 12, "DS", "M", Some(52), Some(130)),
    (10, 2, 14, 2001, 1, "DS", "F", Some(48), None),
    (11, 11, 23, 1997, 6, "PF", "M", Some(15), Some(7)),
    (12, 12, 1, 1999, 4, "DM", "M", Some(33), Some(42)),
];

pub const COLUMNS: [&str; 9] = [
    "record_id",
    "month",
    "day",
    "year",
    "plot_id",
    "species_id",
    "sex",
    "hindfoot_length",
    "weight",
];

// Initialize the database schema
fn initialize_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE surveys (
            record_id INTEGER PRIMARY KEY,
            month INTEGER,
            day INTEGER,
            year INTEGER,
            plot_id INTEGER,
            species_id TEXT,
            sex TEXT,
            hindfoot_length INTEGER,
            weight INTEGER
        );
        "#,
    )
}

fn populate(conn: &Connection) -> Result<()> {
    let mut stmt = conn.prepare("INSERT INTO surveys VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)")?;
    for s in SURVEYS {
        stmt.execute(params![s.0, s.1, s.2, s.3, s.4, s.5, s.6, s.7, s.8])?;
    }
    Ok(())
}

/// Create a populated database file inside a fresh temporary directory.
///
/// The directory must stay alive for as long as the path is used.
pub fn create_surveys_db() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("portal_mammals.sqlite");
    {
        let conn = Connection::open(&path).unwrap();
        initialize_schema(&conn).unwrap();
        populate(&conn).unwrap();
    }
    (dir, path)
}

/// Record ids of fixture rows matching `pred`, in insertion order.
pub fn record_ids_where(pred: impl Fn(&Survey) -> bool) -> Vec<i64> {
    SURVEYS.iter().filter(|s| pred(s)).map(|s| s.0).collect()
}
