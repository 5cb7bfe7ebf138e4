//! Window and remote-link storage.

use std::collections::HashMap;

use rusqlite::{params, Connection, OptionalExtension};

use super::database::SleepDb;
use crate::error::DatabaseError;
use crate::schedule::{day_name, format_time, parse_time, parse_weekday, ScheduleWindow};

const WINDOW_COLUMNS: &str = "id, start_day, end_day, sleep_time, wake_time, enabled";

/// kv entry counting writes to `night_windows`.
pub const WINDOWS_REVISION_KEY: &str = "windows.revision";

fn bump_revision(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO kv (key, value) VALUES (?1, '1')
         ON CONFLICT(key) DO UPDATE SET value = CAST(value AS INTEGER) + 1",
        params![WINDOWS_REVISION_KEY],
    )?;
    Ok(())
}

fn corrupt(column: &str, value: &str) -> DatabaseError {
    DatabaseError::CorruptValue {
        column: column.to_string(),
        value: value.to_string(),
    }
}

struct WindowRow {
    id: i64,
    start_day: String,
    end_day: String,
    sleep_time: String,
    wake_time: String,
    enabled: bool,
}

impl WindowRow {
    fn from_row(row: &rusqlite::Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get(0)?,
            start_day: row.get(1)?,
            end_day: row.get(2)?,
            sleep_time: row.get(3)?,
            wake_time: row.get(4)?,
            enabled: row.get(5)?,
        })
    }

    fn into_window(self) -> Result<ScheduleWindow, DatabaseError> {
        Ok(ScheduleWindow {
            id: self.id,
            start_day: parse_weekday(&self.start_day)
                .map_err(|_| corrupt("start_day", &self.start_day))?,
            end_day: parse_weekday(&self.end_day).map_err(|_| corrupt("end_day", &self.end_day))?,
            sleep_time: parse_time(&self.sleep_time)
                .map_err(|_| corrupt("sleep_time", &self.sleep_time))?,
            wake_time: parse_time(&self.wake_time)
                .map_err(|_| corrupt("wake_time", &self.wake_time))?,
            enabled: self.enabled,
        })
    }
}

impl SleepDb {
    // === Windows ===

    /// Insert a window. A no-op when a window for the same start day exists.
    ///
    /// Returns the stored window with its assigned id, or `None` if skipped.
    pub fn insert_window(
        &self,
        window: &ScheduleWindow,
    ) -> Result<Option<ScheduleWindow>, DatabaseError> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO night_windows (start_day, end_day, sleep_time, wake_time, enabled)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                day_name(window.start_day),
                day_name(window.end_day),
                format_time(window.sleep_time),
                format_time(window.wake_time),
                window.enabled,
            ],
        )?;
        if inserted == 0 {
            return Ok(None);
        }
        bump_revision(&self.conn)?;
        Ok(Some(ScheduleWindow {
            id: self.conn.last_insert_rowid(),
            ..window.clone()
        }))
    }

    /// Insert a window keeping its id (used when repopulating from the mirror).
    fn insert_window_with_id(&self, window: &ScheduleWindow) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO night_windows (id, start_day, end_day, sleep_time, wake_time, enabled)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                window.id,
                day_name(window.start_day),
                day_name(window.end_day),
                format_time(window.sleep_time),
                format_time(window.wake_time),
                window.enabled,
            ],
        )?;
        Ok(())
    }

    /// Update a window by id. Returns false if no row matched.
    pub fn update_window(&self, window: &ScheduleWindow) -> Result<bool, DatabaseError> {
        let updated = self.conn.execute(
            "UPDATE night_windows
             SET start_day = ?1, end_day = ?2, sleep_time = ?3, wake_time = ?4, enabled = ?5
             WHERE id = ?6",
            params![
                day_name(window.start_day),
                day_name(window.end_day),
                format_time(window.sleep_time),
                format_time(window.wake_time),
                window.enabled,
                window.id,
            ],
        )?;
        if updated > 0 {
            bump_revision(&self.conn)?;
        }
        Ok(updated > 0)
    }

    /// Delete a window and its remote link. Returns false if no row matched.
    pub fn delete_window(&self, id: i64) -> Result<bool, DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        let deleted = tx.execute("DELETE FROM night_windows WHERE id = ?1", params![id])?;
        tx.execute("DELETE FROM remote_links WHERE window_id = ?1", params![id])?;
        if deleted > 0 {
            bump_revision(&tx)?;
        }
        tx.commit()?;
        Ok(deleted > 0)
    }

    /// Delete every window and every remote link.
    pub fn delete_all_windows(&self) -> Result<usize, DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        let deleted = tx.execute("DELETE FROM night_windows", [])?;
        tx.execute("DELETE FROM remote_links", [])?;
        if deleted > 0 {
            bump_revision(&tx)?;
        }
        tx.commit()?;
        Ok(deleted)
    }

    /// All windows, Monday night first.
    pub fn list_windows(&self) -> Result<Vec<ScheduleWindow>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {WINDOW_COLUMNS} FROM night_windows"))?;
        let rows = stmt.query_map([], WindowRow::from_row)?;

        let mut windows = Vec::new();
        for row in rows {
            windows.push(row?.into_window()?);
        }
        windows.sort_by_key(|w| (crate::schedule::week_index(w.start_day), w.id));
        Ok(windows)
    }

    pub fn get_window(&self, id: i64) -> Result<Option<ScheduleWindow>, DatabaseError> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {WINDOW_COLUMNS} FROM night_windows WHERE id = ?1"),
                params![id],
                WindowRow::from_row,
            )
            .optional()?;
        row.map(WindowRow::into_window).transpose()
    }

    pub fn get_window_by_day(
        &self,
        start_day: chrono::Weekday,
    ) -> Result<Option<ScheduleWindow>, DatabaseError> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {WINDOW_COLUMNS} FROM night_windows WHERE start_day = ?1 LIMIT 1"),
                params![day_name(start_day)],
                WindowRow::from_row,
            )
            .optional()?;
        row.map(WindowRow::into_window).transpose()
    }

    /// Replace every local window with `windows`, keeping their ids.
    ///
    /// Runs in one transaction; links are cleared because the caller
    /// rewrites them from the same remote fetch.
    pub fn replace_windows(&self, windows: &[ScheduleWindow]) -> Result<(), DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM night_windows", [])?;
        tx.execute("DELETE FROM remote_links", [])?;
        for window in windows {
            self.insert_window_with_id(window)?;
        }
        bump_revision(&tx)?;
        tx.commit()?;
        Ok(())
    }

    /// Counter bumped by every committed window write, from any connection
    /// to the same file. Zero before the first write.
    pub fn windows_revision(&self) -> Result<i64, DatabaseError> {
        Ok(self
            .conn
            .query_row(
                "SELECT CAST(value AS INTEGER) FROM kv WHERE key = ?1",
                params![WINDOWS_REVISION_KEY],
                |row| row.get::<_, i64>(0),
            )
            .optional()?
            .unwrap_or(0))
    }

    // === Remote links ===

    pub fn set_remote_link(&self, window_id: i64, document_id: &str) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO remote_links (window_id, document_id) VALUES (?1, ?2)",
            params![window_id, document_id],
        )?;
        Ok(())
    }

    pub fn remote_link(&self, window_id: i64) -> Result<Option<String>, DatabaseError> {
        Ok(self
            .conn
            .query_row(
                "SELECT document_id FROM remote_links WHERE window_id = ?1",
                params![window_id],
                |row| row.get::<_, String>(0),
            )
            .optional()?)
    }

    pub fn remote_links(&self) -> Result<HashMap<i64, String>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare("SELECT window_id, document_id FROM remote_links")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?;
        let mut links = HashMap::new();
        for row in rows {
            let (window_id, document_id) = row?;
            links.insert(window_id, document_id);
        }
        Ok(links)
    }

    pub fn remove_remote_link(&self, window_id: i64) -> Result<(), DatabaseError> {
        self.conn.execute(
            "DELETE FROM remote_links WHERE window_id = ?1",
            params![window_id],
        )?;
        Ok(())
    }

    /// Replace the whole link table in one transaction.
    pub fn replace_remote_links(&self, links: &HashMap<i64, String>) -> Result<(), DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM remote_links", [])?;
        for (window_id, document_id) in links {
            tx.execute(
                "INSERT INTO remote_links (window_id, document_id) VALUES (?1, ?2)",
                params![window_id, document_id],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}
