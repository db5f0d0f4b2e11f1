use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};

use crate::error::{CoreError, Result};
use crate::models::{DailyLedgerEntry, NutritionGoal, ProfileSnapshot};
use crate::store::{RecordStore, UpdateFn};

const DATE_FORMAT: &str = "%Y-%m-%d";

const ENTRY_COLUMNS: &str = "user_id, date, calories_consumed, protein_g, carb_g, fat_g,
     calories_burned, water_units, weight_kg, weight_recorded_at";

const GOAL_COLUMNS: &str = "user_id, computed_at, bmr, tdee, calorie_target,
     protein_target_g, carb_target_g, fat_target_g";

/// SQLite-backed [`RecordStore`]. The connection sits behind a mutex, and
/// `update` runs inside an immediate transaction, so read-modify-writes are
/// serialized within the process and across processes sharing the file.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| {
            CoreError::StoreUnavailable(format!(
                "Failed to open database: {}: {e}",
                path.display()
            ))
        })?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        let store = SqliteStore {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = SqliteStore {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CoreError::StoreUnavailable("database lock poisoned".to_string()))
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn()?;
        let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS ledger_entries (
                    user_id TEXT NOT NULL,
                    date TEXT NOT NULL,
                    calories_consumed INTEGER NOT NULL DEFAULT 0,
                    protein_g REAL NOT NULL DEFAULT 0,
                    carb_g REAL NOT NULL DEFAULT 0,
                    fat_g REAL NOT NULL DEFAULT 0,
                    calories_burned INTEGER NOT NULL DEFAULT 0,
                    water_units INTEGER NOT NULL DEFAULT 0,
                    weight_kg REAL,
                    weight_recorded_at TEXT,
                    PRIMARY KEY (user_id, date)
                );

                CREATE TABLE IF NOT EXISTS nutrition_goals (
                    user_id TEXT PRIMARY KEY NOT NULL,
                    computed_at TEXT NOT NULL,
                    bmr REAL NOT NULL,
                    tdee REAL NOT NULL,
                    calorie_target REAL NOT NULL,
                    protein_target_g REAL NOT NULL,
                    carb_target_g REAL NOT NULL,
                    fat_target_g REAL NOT NULL
                );

                CREATE TABLE IF NOT EXISTS user_settings (
                    key TEXT PRIMARY KEY NOT NULL,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
                );

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    // --- Row mapping helpers ---

    fn parse_date(idx: usize, raw: &str) -> rusqlite::Result<NaiveDate> {
        NaiveDate::parse_from_str(raw, DATE_FORMAT)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    }

    fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    }

    fn entry_from_row(row: &rusqlite::Row) -> rusqlite::Result<DailyLedgerEntry> {
        let date: String = row.get(1)?;
        let recorded_at: Option<String> = row.get(9)?;
        Ok(DailyLedgerEntry {
            user_id: row.get(0)?,
            date: Self::parse_date(1, &date)?,
            calories_consumed: row.get(2)?,
            protein_g: row.get(3)?,
            carb_g: row.get(4)?,
            fat_g: row.get(5)?,
            calories_burned: row.get(6)?,
            water_units: row.get(7)?,
            weight_kg: row.get(8)?,
            weight_recorded_at: recorded_at
                .as_deref()
                .map(|raw| Self::parse_timestamp(9, raw))
                .transpose()?,
        })
    }

    fn goal_from_row(row: &rusqlite::Row) -> rusqlite::Result<NutritionGoal> {
        let computed_at: String = row.get(1)?;
        Ok(NutritionGoal {
            user_id: row.get(0)?,
            computed_at: Self::parse_timestamp(1, &computed_at)?,
            bmr: row.get(2)?,
            tdee: row.get(3)?,
            calorie_target: row.get(4)?,
            protein_target_g: row.get(5)?,
            carb_target_g: row.get(6)?,
            fat_target_g: row.get(7)?,
        })
    }

    // --- Ledger entries ---

    fn select_entry(
        conn: &Connection,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DailyLedgerEntry>> {
        let sql = format!("SELECT {ENTRY_COLUMNS} FROM ledger_entries WHERE user_id = ?1 AND date = ?2");
        let entry = conn
            .query_row(
                &sql,
                params![user_id, date.format(DATE_FORMAT).to_string()],
                Self::entry_from_row,
            )
            .optional()?;
        Ok(entry)
    }

    fn upsert_entry(conn: &Connection, entry: &DailyLedgerEntry) -> Result<()> {
        conn.execute(
            "INSERT INTO ledger_entries (user_id, date, calories_consumed, protein_g, carb_g, fat_g,
                 calories_burned, water_units, weight_kg, weight_recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(user_id, date) DO UPDATE SET
                calories_consumed = excluded.calories_consumed,
                protein_g = excluded.protein_g,
                carb_g = excluded.carb_g,
                fat_g = excluded.fat_g,
                calories_burned = excluded.calories_burned,
                water_units = excluded.water_units,
                weight_kg = excluded.weight_kg,
                weight_recorded_at = excluded.weight_recorded_at",
            params![
                entry.user_id,
                entry.date.format(DATE_FORMAT).to_string(),
                entry.calories_consumed,
                entry.protein_g,
                entry.carb_g,
                entry.fat_g,
                entry.calories_burned,
                entry.water_units,
                entry.weight_kg,
                entry.weight_recorded_at.map(|ts| ts.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    // --- User Settings ---

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn()?.execute(
            "INSERT INTO user_settings (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now],
        )?;
        Ok(())
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn()?
            .query_row(
                "SELECT value FROM user_settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    // --- Profiles ---

    fn profile_key(user_id: &str) -> String {
        format!("profile:{user_id}")
    }

    /// Store the latest profile for `user_id`, replacing any previous one.
    pub fn save_profile(&self, profile: &ProfileSnapshot) -> Result<()> {
        let json = serde_json::to_string(profile)?;
        self.set_setting(&Self::profile_key(&profile.user_id), &json)
    }

    pub fn load_profile(&self, user_id: &str) -> Result<Option<ProfileSnapshot>> {
        match self.get_setting(&Self::profile_key(user_id))? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}

impl RecordStore for SqliteStore {
    fn get(&self, user_id: &str, date: NaiveDate) -> Result<Option<DailyLedgerEntry>> {
        let conn = self.conn()?;
        Self::select_entry(&conn, user_id, date)
    }

    fn put(&self, entry: &DailyLedgerEntry) -> Result<()> {
        let conn = self.conn()?;
        Self::upsert_entry(&conn, entry)
    }

    fn query_range(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyLedgerEntry>> {
        if start > end {
            return Ok(Vec::new());
        }
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM ledger_entries
             WHERE user_id = ?1 AND date >= ?2 AND date <= ?3
             ORDER BY date"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![
                user_id,
                start.format(DATE_FORMAT).to_string(),
                end.format(DATE_FORMAT).to_string()
            ],
            Self::entry_from_row,
        )?;
        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    fn latest_weighed_before(
        &self,
        user_id: &str,
        before: NaiveDate,
    ) -> Result<Option<DailyLedgerEntry>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM ledger_entries
             WHERE user_id = ?1 AND date < ?2 AND weight_kg IS NOT NULL
             ORDER BY date DESC LIMIT 1"
        );
        let entry = conn
            .query_row(
                &sql,
                params![user_id, before.format(DATE_FORMAT).to_string()],
                Self::entry_from_row,
            )
            .optional()?;
        Ok(entry)
    }

    fn update(
        &self,
        user_id: &str,
        date: NaiveDate,
        f: &mut UpdateFn<'_>,
    ) -> Result<Option<DailyLedgerEntry>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let current = Self::select_entry(&tx, user_id, date)?;
        match f(current.clone())? {
            Some(next) => {
                Self::upsert_entry(&tx, &next)?;
                tx.commit()?;
                Ok(Some(next))
            }
            // Dropping the transaction rolls it back; nothing was written.
            None => Ok(current),
        }
    }

    fn get_goal(&self, user_id: &str) -> Result<Option<NutritionGoal>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {GOAL_COLUMNS} FROM nutrition_goals WHERE user_id = ?1");
        let goal = conn
            .query_row(&sql, params![user_id], Self::goal_from_row)
            .optional()?;
        Ok(goal)
    }

    fn put_goal(&self, goal: &NutritionGoal) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO nutrition_goals (user_id, computed_at, bmr, tdee, calorie_target,
                 protein_target_g, carb_target_g, fat_target_g)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(user_id) DO UPDATE SET
                computed_at = excluded.computed_at,
                bmr = excluded.bmr,
                tdee = excluded.tdee,
                calorie_target = excluded.calorie_target,
                protein_target_g = excluded.protein_target_g,
                carb_target_g = excluded.carb_target_g,
                fat_target_g = excluded.fat_target_g",
            params![
                goal.user_id,
                goal.computed_at.to_rfc3339(),
                goal.bmr,
                goal.tdee,
                goal.calorie_target,
                goal.protein_target_g,
                goal.carb_target_g,
                goal.fat_target_g,
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::DailyLedger;
    use crate::models::{ActivityLevel, EventKind, GoalType, LedgerEvent, Op, Sex};
    use chrono::TimeZone;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn sample_entry(d: u32) -> DailyLedgerEntry {
        DailyLedgerEntry {
            calories_consumed: 2150,
            protein_g: 131.5,
            carb_g: 240.25,
            fat_g: 70.0,
            calories_burned: 420,
            water_units: 6,
            weight_kg: Some(79.4),
            weight_recorded_at: Some(Utc.with_ymd_and_hms(2024, 6, d, 7, 30, 0).unwrap()),
            ..DailyLedgerEntry::empty("u1", date(d))
        }
    }

    fn sample_goal(calorie_target: f64) -> NutritionGoal {
        NutritionGoal {
            user_id: "u1".to_string(),
            computed_at: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
            bmr: 1692.5,
            tdee: 2623.375,
            calorie_target,
            protein_target_g: 132.7,
            carb_target_g: 265.4,
            fat_target_g: 59.0,
        }
    }

    #[test]
    fn test_put_and_get_entry() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.get("u1", date(1)).unwrap().is_none());

        let entry = sample_entry(1);
        store.put(&entry).unwrap();
        assert_eq!(store.get("u1", date(1)).unwrap().unwrap(), entry);

        let mut amended = entry.clone();
        amended.calories_consumed = 1900;
        amended.weight_kg = None;
        amended.weight_recorded_at = None;
        store.put(&amended).unwrap();
        assert_eq!(store.get("u1", date(1)).unwrap().unwrap(), amended);
    }

    #[test]
    fn test_query_range_ascending_and_scoped() {
        let store = SqliteStore::open_in_memory().unwrap();
        for d in [9, 2, 5, 12] {
            store.put(&sample_entry(d)).unwrap();
        }
        store
            .put(&DailyLedgerEntry::empty("u2", date(5)))
            .unwrap();

        let dates: Vec<NaiveDate> = store
            .query_range("u1", date(2), date(9))
            .unwrap()
            .iter()
            .map(|e| e.date)
            .collect();
        assert_eq!(dates, vec![date(2), date(5), date(9)]);
        assert!(store.query_range("u1", date(10), date(3)).unwrap().is_empty());
        assert_eq!(store.query_range("u2", date(1), date(30)).unwrap().len(), 1);
    }

    #[test]
    fn test_latest_weighed_before_skips_unweighed_days() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.put(&sample_entry(2)).unwrap();
        store.put(&sample_entry(4)).unwrap();
        store
            .put(&DailyLedgerEntry::empty("u1", date(6)))
            .unwrap();

        let found = store.latest_weighed_before("u1", date(10)).unwrap().unwrap();
        assert_eq!(found, sample_entry(4));
        let found = store.latest_weighed_before("u1", date(4)).unwrap().unwrap();
        assert_eq!(found.date, date(2));
        assert!(store.latest_weighed_before("u1", date(2)).unwrap().is_none());
        assert!(store.latest_weighed_before("u2", date(10)).unwrap().is_none());
    }

    #[test]
    fn test_update_skip_and_error_do_not_write() {
        let store = SqliteStore::open_in_memory().unwrap();
        let skipped = store.update("u1", date(1), &mut |_| Ok(None)).unwrap();
        assert!(skipped.is_none());
        assert!(store.get("u1", date(1)).unwrap().is_none());

        store.put(&sample_entry(1)).unwrap();
        let failed = store.update("u1", date(1), &mut |current| {
            let mut next = current.unwrap();
            next.water_units = 99;
            Err(CoreError::InvalidEvent(format!("rejected {}", next.water_units)))
        });
        assert!(failed.is_err());
        assert_eq!(store.get("u1", date(1)).unwrap().unwrap().water_units, 6);
    }

    #[test]
    fn test_goal_superseded() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.get_goal("u1").unwrap().is_none());
        store.put_goal(&sample_goal(2123.375)).unwrap();
        store.put_goal(&sample_goal(2300.0)).unwrap();
        let goal = store.get_goal("u1").unwrap().unwrap();
        assert!((goal.calorie_target - 2300.0).abs() < f64::EPSILON);
        assert_eq!(goal.computed_at, sample_goal(0.0).computed_at);
    }

    #[test]
    fn test_profile_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.load_profile("u1").unwrap().is_none());
        let profile = ProfileSnapshot {
            user_id: "u1".to_string(),
            sex: Sex::Male,
            age: 30,
            height_cm: 180.0,
            current_weight_kg: 80.0,
            target_weight_kg: 72.5,
            activity_level: ActivityLevel::Moderate,
            goal_type: GoalType::Lose,
            strength_training: true,
        };
        store.save_profile(&profile).unwrap();
        assert_eq!(store.load_profile("u1").unwrap(), Some(profile));
    }

    #[test]
    fn test_corrupt_profile_is_store_error() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set_setting("profile:u1", "{not json").unwrap();
        let err = store.load_profile("u1").unwrap_err();
        assert!(matches!(err, CoreError::StoreUnavailable(_)));
    }

    #[test]
    fn test_reopen_keeps_data_and_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fitledger.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.put(&sample_entry(3)).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get("u1", date(3)).unwrap().unwrap(), sample_entry(3));
        let version: i64 = store
            .conn()
            .unwrap()
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn test_concurrent_disjoint_fields_both_land() {
        let store = SqliteStore::open_in_memory().unwrap();
        let ledger = DailyLedger::new(&store);
        let consume = LedgerEvent::new(
            "u1",
            date(1),
            Op::Add,
            EventKind::Consume {
                calories: 100,
                protein_g: 5.0,
                carb_g: 10.0,
                fat_g: 2.0,
            },
        );
        let water = LedgerEvent::new("u1", date(1), Op::Add, EventKind::Water { units: 1 });
        std::thread::scope(|s| {
            s.spawn(|| {
                for _ in 0..25 {
                    ledger.record(&consume).unwrap();
                }
            });
            s.spawn(|| {
                for _ in 0..25 {
                    ledger.record(&water).unwrap();
                }
            });
        });
        let stored = store.get("u1", date(1)).unwrap().unwrap();
        assert_eq!(stored.calories_consumed, 2500);
        assert_eq!(stored.water_units, 25);
        assert!((stored.protein_g - 125.0).abs() < 1e-9);
    }
}
