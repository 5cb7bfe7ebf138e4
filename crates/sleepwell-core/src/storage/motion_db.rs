//! Motion sample storage and statistics.
//!
//! Samples are append-only counters per day label. The newest sample for a
//! day is the live counter; a reset appends a fresh sample with count zero.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, TimeZone, Utc};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::database::SleepDb;
use crate::error::DatabaseError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotionSample {
    pub id: i64,
    pub day: String,
    pub count: u32,
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayCount {
    pub day: String,
    /// Current counter value (newest sample).
    pub latest: u32,
    /// Sum over every retained sample for the day.
    pub total: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotionStats {
    pub sample_count: usize,
    pub total_disturbances: u32,
    pub busiest_day: Option<String>,
    pub days: Vec<DayCount>,
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>, DatabaseError> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| DatabaseError::CorruptValue {
            column: "captured_at".into(),
            value: ms.to_string(),
        })
}

fn row_to_sample(row: &rusqlite::Row) -> Result<(i64, String, u32, i64), rusqlite::Error> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn into_sample((id, day, count, ms): (i64, String, u32, i64)) -> Result<MotionSample, DatabaseError> {
    Ok(MotionSample {
        id,
        day,
        count,
        captured_at: from_millis(ms)?,
    })
}

impl SleepDb {
    /// The live counter for `day`, if any.
    pub fn latest_sample_for_day(&self, day: &str) -> Result<Option<MotionSample>, DatabaseError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, day, count, captured_at FROM motion_samples
                 WHERE day = ?1 ORDER BY captured_at DESC, id DESC LIMIT 1",
                params![day],
                row_to_sample,
            )
            .optional()?;
        row.map(into_sample).transpose()
    }

    /// Count one disturbance for `day`: bump the live counter or start one at 1.
    pub fn record_motion(&self, day: &str, now: DateTime<Utc>) -> Result<MotionSample, DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        let sample = match self.latest_sample_for_day(day)? {
            Some(last) => {
                let count = last.count.saturating_add(1);
                tx.execute(
                    "UPDATE motion_samples SET count = ?1 WHERE id = ?2",
                    params![count, last.id],
                )?;
                MotionSample { count, ..last }
            }
            None => self.insert_sample(day, 1, now)?,
        };
        tx.commit()?;
        Ok(sample)
    }

    /// Append a zero-count marker for `day`.
    pub fn reset_motion(&self, day: &str, now: DateTime<Utc>) -> Result<MotionSample, DatabaseError> {
        self.insert_sample(day, 0, now)
    }

    fn insert_sample(&self, day: &str, count: u32, now: DateTime<Utc>) -> Result<MotionSample, DatabaseError> {
        self.conn.execute(
            "INSERT INTO motion_samples (day, count, captured_at) VALUES (?1, ?2, ?3)",
            params![day, count, now.timestamp_millis()],
        )?;
        Ok(MotionSample {
            id: self.conn.last_insert_rowid(),
            day: day.to_string(),
            count,
            captured_at: from_millis(now.timestamp_millis())?,
        })
    }

    /// Delete samples captured strictly before `cutoff`.
    pub fn delete_samples_before(&self, cutoff: DateTime<Utc>) -> Result<usize, DatabaseError> {
        Ok(self.conn.execute(
            "DELETE FROM motion_samples WHERE captured_at < ?1",
            params![cutoff.timestamp_millis()],
        )?)
    }

    /// Drop samples older than `retention_days` before `now`.
    pub fn clean_old_samples(
        &self,
        now: DateTime<Utc>,
        retention_days: u32,
    ) -> Result<usize, DatabaseError> {
        self.delete_samples_before(now - Duration::days(i64::from(retention_days)))
    }

    /// All samples, newest first.
    pub fn list_samples(&self) -> Result<Vec<MotionSample>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, day, count, captured_at FROM motion_samples
             ORDER BY captured_at DESC, id DESC",
        )?;
        let rows = stmt.query_map([], row_to_sample)?;
        let mut samples = Vec::new();
        for row in rows {
            samples.push(into_sample(row?)?);
        }
        Ok(samples)
    }

    pub fn motion_stats(&self) -> Result<MotionStats, DatabaseError> {
        let samples = self.list_samples()?;
        let mut days: BTreeMap<String, DayCount> = BTreeMap::new();

        // newest first, so the first sample seen per day is the live counter
        for sample in &samples {
            let entry = days.entry(sample.day.clone()).or_insert_with(|| DayCount {
                day: sample.day.clone(),
                latest: sample.count,
                total: 0,
            });
            entry.total = entry.total.saturating_add(sample.count);
        }

        let total_disturbances = days.values().map(|d| d.total).sum();
        let busiest_day = days
            .values()
            .filter(|d| d.total > 0)
            .max_by_key(|d| d.total)
            .map(|d| d.day.clone());

        Ok(MotionStats {
            sample_count: samples.len(),
            total_disturbances,
            busiest_day,
            days: days.into_values().collect(),
        })
    }
}
