use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDate;

use crate::error::{CoreError, Result};
use crate::models::{DailyLedgerEntry, NutritionGoal};

/// Read-modify-write callback for [`RecordStore::update`]. Receives the
/// current entry; returns `Some(entry)` to write it or `None` to leave the
/// key untouched.
pub type UpdateFn<'a> =
    dyn FnMut(Option<DailyLedgerEntry>) -> Result<Option<DailyLedgerEntry>> + 'a;

/// Persistence boundary for ledger entries and goal snapshots.
///
/// Implementations must make `update` atomic per `(user_id, date)` key: two
/// concurrent updates of the same key observe each other's writes. The core
/// never retries a failed call.
pub trait RecordStore: Send + Sync {
    fn get(&self, user_id: &str, date: NaiveDate) -> Result<Option<DailyLedgerEntry>>;

    fn put(&self, entry: &DailyLedgerEntry) -> Result<()>;

    /// Entries for `user_id` with `start <= date <= end`, ascending by date.
    fn query_range(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyLedgerEntry>>;

    /// The most recent entry dated before `before` that carries a weight.
    fn latest_weighed_before(
        &self,
        user_id: &str,
        before: NaiveDate,
    ) -> Result<Option<DailyLedgerEntry>>;

    fn update(
        &self,
        user_id: &str,
        date: NaiveDate,
        f: &mut UpdateFn<'_>,
    ) -> Result<Option<DailyLedgerEntry>>;

    fn get_goal(&self, user_id: &str) -> Result<Option<NutritionGoal>>;

    /// Replace the user's goal snapshot.
    fn put_goal(&self, goal: &NutritionGoal) -> Result<()>;
}

type EntryKey = (String, NaiveDate);

/// In-process store. One mutex guards the ledger map, so `update` is
/// serialized across all keys.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<EntryKey, DailyLedgerEntry>>,
    goals: Mutex<HashMap<String, NutritionGoal>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<MutexGuard<'_, BTreeMap<EntryKey, DailyLedgerEntry>>> {
        self.entries
            .lock()
            .map_err(|_| CoreError::StoreUnavailable("ledger lock poisoned".to_string()))
    }

    fn goals(&self) -> Result<MutexGuard<'_, HashMap<String, NutritionGoal>>> {
        self.goals
            .lock()
            .map_err(|_| CoreError::StoreUnavailable("goal lock poisoned".to_string()))
    }
}

impl RecordStore for MemoryStore {
    fn get(&self, user_id: &str, date: NaiveDate) -> Result<Option<DailyLedgerEntry>> {
        Ok(self.entries()?.get(&(user_id.to_string(), date)).cloned())
    }

    fn put(&self, entry: &DailyLedgerEntry) -> Result<()> {
        self.entries()?
            .insert((entry.user_id.clone(), entry.date), entry.clone());
        Ok(())
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
        let entries = self.entries()?;
        let range = (user_id.to_string(), start)..=(user_id.to_string(), end);
        Ok(entries.range(range).map(|(_, e)| e.clone()).collect())
    }

    fn latest_weighed_before(
        &self,
        user_id: &str,
        before: NaiveDate,
    ) -> Result<Option<DailyLedgerEntry>> {
        let entries = self.entries()?;
        let range = (user_id.to_string(), NaiveDate::MIN)..(user_id.to_string(), before);
        Ok(entries
            .range(range)
            .rev()
            .map(|(_, e)| e)
            .find(|e| e.weight_kg.is_some())
            .cloned())
    }

    fn update(
        &self,
        user_id: &str,
        date: NaiveDate,
        f: &mut UpdateFn<'_>,
    ) -> Result<Option<DailyLedgerEntry>> {
        let mut entries = self.entries()?;
        let key = (user_id.to_string(), date);
        let current = entries.get(&key).cloned();
        match f(current.clone())? {
            Some(next) => {
                entries.insert(key, next.clone());
                Ok(Some(next))
            }
            None => Ok(current),
        }
    }

    fn get_goal(&self, user_id: &str) -> Result<Option<NutritionGoal>> {
        Ok(self.goals()?.get(user_id).cloned())
    }

    fn put_goal(&self, goal: &NutritionGoal) -> Result<()> {
        self.goals()?.insert(goal.user_id.clone(), goal.clone());
        Ok(())
    }
}
