use chrono::{DateTime, Days, Local, NaiveDate, Utc};

use crate::config::TrackerConfig;
use crate::energy;
use crate::error::{CoreError, Result};
use crate::ledger::DailyLedger;
use crate::models::{
    Applied, DailyLedgerEntry, GoalProgress, LedgerEvent, NutritionGoal, ProfileSnapshot,
    WaterTarget, Window, WindowSummary,
};
use crate::progress;
use crate::rollup;
use crate::store::RecordStore;

/// Source of "now" for the tracker.
///
/// The calendar day is the caller's local day; timestamps are UTC.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
    fn today(&self) -> NaiveDate;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// A clock pinned to one instant. `today` is the UTC date of that instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    now: DateTime<Utc>,
}

impl FixedClock {
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn today(&self) -> NaiveDate {
        self.now.date_naive()
    }
}

/// Entry point for front ends: wires a store, a clock and configuration to
/// the pure energy, ledger, progress and rollup components.
pub struct Tracker<S: RecordStore, C: Clock = SystemClock> {
    store: S,
    clock: C,
    config: TrackerConfig,
}

impl<S: RecordStore, C: Clock> Tracker<S, C> {
    pub fn new(store: S, clock: C, config: TrackerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            clock,
            config,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    // --- Goals ---

    /// Compute and store a fresh goal for the profile, superseding the
    /// previous one. Nothing is stored when the profile is invalid.
    pub fn recompute_goal(&self, profile: &ProfileSnapshot) -> Result<NutritionGoal> {
        let goal = energy::compute_goal(profile, &self.config.energy, self.clock.now())?;
        self.store.put_goal(&goal)?;
        tracing::debug!(
            user_id = %goal.user_id,
            bmr = goal.bmr,
            tdee = goal.tdee,
            calorie_target = goal.calorie_target,
            "recomputed nutrition goal"
        );
        Ok(goal)
    }

    pub fn goal(&self, user_id: &str) -> Result<Option<NutritionGoal>> {
        self.store.get_goal(user_id)
    }

    pub fn water_target(&self, profile: &ProfileSnapshot) -> Result<WaterTarget> {
        energy::recommended_water(profile, &self.config)
    }

    // --- Ledger ---

    pub fn day(&self, user_id: &str, date: NaiveDate) -> Result<DailyLedgerEntry> {
        DailyLedger::new(&self.store).get_or_create(user_id, date)
    }

    /// Apply an event. Events without a timestamp are stamped with the
    /// clock's current time.
    pub fn record(&self, mut event: LedgerEvent) -> Result<Applied> {
        if event.recorded_at.is_none() {
            event.recorded_at = Some(self.clock.now());
        }
        DailyLedger::new(&self.store).record(&event)
    }

    // --- Views ---

    /// Progress toward the profile's target. The trend uses the configured
    /// lookback window ending today; when that window holds no weigh-in, the
    /// latest earlier one is the current weight.
    pub fn progress(&self, profile: &ProfileSnapshot) -> Result<GoalProgress> {
        let today = self.clock.today();
        let back = u64::try_from(self.config.progress_lookback_days - 1).unwrap_or(0);
        let start = today.checked_sub_days(Days::new(back)).unwrap_or(NaiveDate::MIN);
        let mut entries = self.store.query_range(&profile.user_id, start, today)?;
        if entries.iter().all(|e| e.weight_kg.is_none()) {
            if let Some(earlier) = self.store.latest_weighed_before(&profile.user_id, start)? {
                entries.insert(0, earlier);
            }
        }
        Ok(progress::compute(&entries, profile))
    }

    pub fn summarize(
        &self,
        user_id: &str,
        window: Window,
        count: u32,
    ) -> Result<Vec<WindowSummary>> {
        self.summarize_at(user_id, window, count, self.clock.today())
    }

    pub fn summarize_at(
        &self,
        user_id: &str,
        window: Window,
        count: u32,
        anchor: NaiveDate,
    ) -> Result<Vec<WindowSummary>> {
        if count > self.config.max_report_periods {
            return Err(CoreError::InvalidConfig(format!(
                "report count must be at most {} (got {count})",
                self.config.max_report_periods
            )));
        }
        let Some((start, end)) = rollup::span(window, anchor, count)? else {
            return Ok(Vec::new());
        };
        let entries = self.store.query_range(user_id, start, end)?;
        rollup::summarize(&entries, window, anchor, count)
    }
}
