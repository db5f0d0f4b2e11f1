use chrono::NaiveDate;

use crate::error::{CoreError, Result};
use crate::models::{
    Applied, ConsistencyWarning, DailyLedgerEntry, EventKind, LedgerEvent, LedgerField, Op,
};
use crate::store::RecordStore;

/// Float residue below this is treated as zero. Repeated add/remove of
/// fractional grams must cancel exactly.
const DRIFT_EPSILON: f64 = 1e-9;

fn validate_event(event: &LedgerEvent) -> Result<()> {
    let bad = |what: &str| Err(CoreError::InvalidEvent(what.to_string()));
    let bad_float = |v: f64| !v.is_finite() || v < 0.0;
    match &event.kind {
        EventKind::Consume {
            calories,
            protein_g,
            carb_g,
            fat_g,
        } => {
            if *calories < 0 {
                return bad("calories must not be negative");
            }
            if bad_float(*protein_g) || bad_float(*carb_g) || bad_float(*fat_g) {
                return bad("macro grams must be finite and non-negative");
            }
        }
        EventKind::Burn { calories } => {
            if *calories < 0 {
                return bad("burned calories must not be negative");
            }
        }
        EventKind::Water { units } => {
            if *units < 0 {
                return bad("water units must not be negative");
            }
        }
        EventKind::Weight { kg } => {
            if bad_float(*kg) || (event.op == Op::Add && *kg <= 0.0) {
                return bad("weight must be greater than 0");
            }
        }
    }
    Ok(())
}

struct Adjuster<'a> {
    user_id: &'a str,
    date: NaiveDate,
    op: Op,
    warnings: Vec<ConsistencyWarning>,
}

impl Adjuster<'_> {
    fn clamped(&mut self, field: LedgerField, requested: f64, available: f64) {
        let warning = ConsistencyWarning {
            user_id: self.user_id.to_string(),
            date: self.date,
            field,
            requested,
            available,
        };
        tracing::warn!(
            user_id = %warning.user_id,
            date = %warning.date,
            field = %warning.field,
            requested,
            available,
            "ledger remove exceeds recorded amount; clamped to zero"
        );
        self.warnings.push(warning);
    }

    #[allow(clippy::cast_precision_loss)]
    fn int(&mut self, field: LedgerField, current: i64, delta: i64) -> i64 {
        match self.op {
            Op::Add => current.saturating_add(delta),
            Op::Remove if delta > current => {
                self.clamped(field, delta as f64, current as f64);
                0
            }
            Op::Remove => current - delta,
        }
    }

    fn float(&mut self, field: LedgerField, current: f64, delta: f64) -> f64 {
        let next = match self.op {
            Op::Add => current + delta,
            Op::Remove => current - delta,
        };
        if next < -DRIFT_EPSILON {
            self.clamped(field, delta, current);
            0.0
        } else if next.abs() < DRIFT_EPSILON {
            0.0
        } else {
            next
        }
    }
}

/// Fold one event into the day's entry. `entry` is `None` when the day has
/// no record yet.
///
/// Removes never drive a field below zero: the field is clamped and a
/// [`ConsistencyWarning`] is returned for it.
pub fn apply(entry: Option<DailyLedgerEntry>, event: &LedgerEvent) -> Result<Applied> {
    validate_event(event)?;

    let mut entry = match entry {
        Some(e) if e.user_id != event.user_id || e.date != event.date => {
            return Err(CoreError::InvalidEvent(format!(
                "event for {}/{} applied to entry {}/{}",
                event.user_id, event.date, e.user_id, e.date
            )));
        }
        Some(e) => e,
        None => DailyLedgerEntry::empty(&event.user_id, event.date),
    };

    let mut adj = Adjuster {
        user_id: &event.user_id,
        date: event.date,
        op: event.op,
        warnings: Vec::new(),
    };

    match &event.kind {
        EventKind::Consume {
            calories,
            protein_g,
            carb_g,
            fat_g,
        } => {
            entry.calories_consumed =
                adj.int(LedgerField::CaloriesConsumed, entry.calories_consumed, *calories);
            entry.protein_g = adj.float(LedgerField::ProteinG, entry.protein_g, *protein_g);
            entry.carb_g = adj.float(LedgerField::CarbG, entry.carb_g, *carb_g);
            entry.fat_g = adj.float(LedgerField::FatG, entry.fat_g, *fat_g);
        }
        EventKind::Burn { calories } => {
            entry.calories_burned =
                adj.int(LedgerField::CaloriesBurned, entry.calories_burned, *calories);
        }
        EventKind::Water { units } => {
            entry.water_units = adj.int(LedgerField::WaterUnits, entry.water_units, *units);
        }
        EventKind::Weight { kg } => match event.op {
            Op::Add => {
                let stale = matches!(
                    (entry.weight_recorded_at, event.recorded_at),
                    (Some(stored), Some(incoming)) if incoming < stored
                );
                if stale {
                    tracing::debug!(
                        user_id = %event.user_id,
                        date = %event.date,
                        kg,
                        "ignoring weight older than the recorded one"
                    );
                } else {
                    entry.weight_kg = Some(*kg);
                    entry.weight_recorded_at = event.recorded_at;
                }
            }
            Op::Remove => {
                if entry.weight_kg.is_some() {
                    entry.weight_kg = None;
                    entry.weight_recorded_at = None;
                } else {
                    adj.clamped(LedgerField::WeightKg, *kg, 0.0);
                }
            }
        },
    }

    Ok(Applied {
        entry,
        warnings: adj.warnings,
    })
}

/// Ledger operations against a record store.
pub struct DailyLedger<'a, S: RecordStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RecordStore + ?Sized> DailyLedger<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// The stored entry, or a zero entry that is not persisted.
    pub fn get_or_create(&self, user_id: &str, date: NaiveDate) -> Result<DailyLedgerEntry> {
        Ok(self
            .store
            .get(user_id, date)?
            .unwrap_or_else(|| DailyLedgerEntry::empty(user_id, date)))
    }

    /// Apply an event inside the store's atomic read-modify-write. A day
    /// that would stay empty is not materialized.
    pub fn record(&self, event: &LedgerEvent) -> Result<Applied> {
        let mut outcome: Option<Applied> = None;
        self.store.update(&event.user_id, event.date, &mut |current| {
            let existed = current.is_some();
            let applied = apply(current, event)?;
            let write = existed || !applied.entry.is_empty();
            let next = write.then(|| applied.entry.clone());
            outcome = Some(applied);
            Ok(next)
        })?;
        outcome.ok_or_else(|| {
            CoreError::StoreUnavailable("store did not run the ledger update".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::{Duration, TimeZone, Utc};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn event(op: Op, kind: EventKind) -> LedgerEvent {
        LedgerEvent::new("u1", day(), op, kind)
    }

    fn water(op: Op, units: i64) -> LedgerEvent {
        event(op, EventKind::Water { units })
    }

    fn meal(op: Op, calories: i64, protein_g: f64, carb_g: f64, fat_g: f64) -> LedgerEvent {
        event(
            op,
            EventKind::Consume {
                calories,
                protein_g,
                carb_g,
                fat_g,
            },
        )
    }

    fn apply_all(events: &[LedgerEvent]) -> (DailyLedgerEntry, Vec<ConsistencyWarning>) {
        let mut entry = None;
        let mut warnings = Vec::new();
        for e in events {
            let applied = apply(entry, e).unwrap();
            warnings.extend(applied.warnings);
            entry = Some(applied.entry);
        }
        (entry.unwrap(), warnings)
    }

    #[test]
    fn test_water_four_adds_one_remove() {
        let mut events = vec![water(Op::Add, 1); 4];
        events.push(water(Op::Remove, 1));
        let (entry, warnings) = apply_all(&events);
        assert_eq!(entry.water_units, 3);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_first_event_creates_entry() {
        let applied = apply(None, &meal(Op::Add, 600, 30.0, 70.0, 20.0)).unwrap();
        assert_eq!(applied.entry.user_id, "u1");
        assert_eq!(applied.entry.date, day());
        assert_eq!(applied.entry.calories_consumed, 600);
        assert!((applied.entry.protein_g - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_burn_affects_net_calories() {
        let (entry, _) = apply_all(&[
            meal(Op::Add, 2000, 0.0, 0.0, 0.0),
            event(Op::Add, EventKind::Burn { calories: 350 }),
        ]);
        assert_eq!(entry.net_calories(), 1650);
    }

    #[test]
    fn test_add_remove_cancellation() {
        let adds = [
            meal(Op::Add, 420, 31.2, 40.1, 12.7),
            meal(Op::Add, 180, 0.1, 22.3, 0.2),
            meal(Op::Add, 650, 45.05, 60.6, 25.9),
        ];
        let removes = [
            meal(Op::Remove, 180, 0.1, 22.3, 0.2),
            meal(Op::Remove, 650, 45.05, 60.6, 25.9),
            meal(Op::Remove, 420, 31.2, 40.1, 12.7),
        ];
        let mut events: Vec<LedgerEvent> = Vec::new();
        events.push(adds[0].clone());
        events.push(adds[1].clone());
        events.push(removes[0].clone());
        events.push(adds[2].clone());
        events.push(removes[2].clone());
        events.push(removes[1].clone());
        events.push(water(Op::Add, 2));
        events.push(event(Op::Add, EventKind::Burn { calories: 300 }));
        events.push(event(Op::Remove, EventKind::Burn { calories: 300 }));
        events.push(water(Op::Remove, 2));

        let (entry, warnings) = apply_all(&events);
        assert!(warnings.is_empty());
        assert!(entry.is_empty(), "expected all-zero entry, got {entry:?}");
    }

    fn permutations(items: &[LedgerEvent]) -> Vec<Vec<LedgerEvent>> {
        if items.len() <= 1 {
            return vec![items.to_vec()];
        }
        let mut out = Vec::new();
        for i in 0..items.len() {
            let mut rest = items.to_vec();
            let head = rest.remove(i);
            for mut tail in permutations(&rest) {
                tail.insert(0, head.clone());
                out.push(tail);
            }
        }
        out
    }

    #[allow(clippy::cast_precision_loss)]
    fn deltas(e: &LedgerEvent) -> [f64; 4] {
        let sign = if e.op == Op::Add { 1.0 } else { -1.0 };
        match e.kind {
            EventKind::Consume {
                calories,
                protein_g,
                carb_g,
                fat_g,
            } => [calories as f64, protein_g, carb_g, fat_g].map(|v| v * sign),
            _ => [0.0; 4],
        }
    }

    #[test]
    fn test_cancellation_in_every_order() {
        let meals = [
            (420, 31.2, 40.1, 12.7),
            (180, 0.1, 22.3, 0.2),
            (650, 45.05, 60.6, 25.9),
        ];
        let mut events = Vec::new();
        for (kcal, p, c, f) in meals {
            events.push(meal(Op::Add, kcal, p, c, f));
            events.push(meal(Op::Remove, kcal, p, c, f));
        }

        let orders = permutations(&events);
        assert_eq!(orders.len(), 720);
        let mut clean = 0;
        for order in &orders {
            // a field is clamped only if its running total would go negative
            let mut running = [0.0_f64; 4];
            let mut goes_negative = false;
            for e in order {
                for (total, d) in running.iter_mut().zip(deltas(e)) {
                    *total += d;
                    goes_negative |= *total < -DRIFT_EPSILON;
                }
            }

            let (entry, warnings) = apply_all(order);
            if goes_negative {
                assert!(!warnings.is_empty(), "clamped order without warning: {order:?}");
                assert!(warnings.iter().all(|w| w.requested > w.available));
            } else {
                clean += 1;
                assert!(warnings.is_empty());
                assert!(entry.is_empty(), "expected all-zero entry, got {entry:?}");
            }
        }
        assert!(clean > 0 && clean < orders.len());
    }

    #[test]
    fn test_out_of_order_remove_warns_once_per_field() {
        let events = [
            meal(Op::Remove, 300, 10.0, 0.0, 5.0),
            meal(Op::Add, 300, 10.0, 0.0, 5.0),
        ];
        let (entry, warnings) = apply_all(&events);
        // carbs delta was 0, so only three fields were clamped
        assert_eq!(warnings.len(), 3);
        let fields: Vec<LedgerField> = warnings.iter().map(|w| w.field).collect();
        assert!(fields.contains(&LedgerField::CaloriesConsumed));
        assert!(fields.contains(&LedgerField::ProteinG));
        assert!(fields.contains(&LedgerField::FatG));
        // The late add is then counted in full
        assert_eq!(entry.calories_consumed, 300);
    }

    #[test]
    fn test_remove_clamps_at_zero() {
        let (entry, warnings) = apply_all(&[water(Op::Add, 1), water(Op::Remove, 3)]);
        assert_eq!(entry.water_units, 0);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].field, LedgerField::WaterUnits);
        assert!((warnings[0].requested - 3.0).abs() < f64::EPSILON);
        assert!((warnings[0].available - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_weight_last_write_wins_by_timestamp() {
        let t0 = Utc.with_ymd_and_hms(2024, 6, 15, 7, 0, 0).unwrap();
        let events = [
            event(Op::Add, EventKind::Weight { kg: 80.4 }).at(t0 + Duration::hours(2)),
            // Arrives later but was recorded earlier
            event(Op::Add, EventKind::Weight { kg: 81.0 }).at(t0),
        ];
        let (entry, _) = apply_all(&events);
        assert_eq!(entry.weight_kg, Some(80.4));
        assert_eq!(entry.weight_recorded_at, Some(t0 + Duration::hours(2)));
    }

    #[test]
    fn test_weight_ties_fall_back_to_insertion_order() {
        let t0 = Utc.with_ymd_and_hms(2024, 6, 15, 7, 0, 0).unwrap();
        let (entry, _) = apply_all(&[
            event(Op::Add, EventKind::Weight { kg: 80.0 }).at(t0),
            event(Op::Add, EventKind::Weight { kg: 79.8 }).at(t0),
        ]);
        assert_eq!(entry.weight_kg, Some(79.8));

        let (entry, _) = apply_all(&[
            event(Op::Add, EventKind::Weight { kg: 80.0 }),
            event(Op::Add, EventKind::Weight { kg: 79.6 }),
        ]);
        assert_eq!(entry.weight_kg, Some(79.6));
    }

    #[test]
    fn test_weight_remove() {
        let (entry, warnings) = apply_all(&[
            event(Op::Add, EventKind::Weight { kg: 80.0 }),
            event(Op::Remove, EventKind::Weight { kg: 80.0 }),
        ]);
        assert!(entry.weight_kg.is_none());
        assert!(warnings.is_empty());

        let applied = apply(None, &event(Op::Remove, EventKind::Weight { kg: 80.0 })).unwrap();
        assert_eq!(applied.warnings.len(), 1);
        assert_eq!(applied.warnings[0].field, LedgerField::WeightKg);
    }

    #[test]
    fn test_invalid_events() {
        assert!(matches!(
            apply(None, &water(Op::Add, -1)),
            Err(CoreError::InvalidEvent(_))
        ));
        assert!(apply(None, &meal(Op::Add, 100, f64::NAN, 0.0, 0.0)).is_err());
        assert!(apply(None, &meal(Op::Add, -100, 0.0, 0.0, 0.0)).is_err());
        assert!(apply(None, &event(Op::Add, EventKind::Weight { kg: 0.0 })).is_err());
    }

    #[test]
    fn test_mismatched_entry_rejected() {
        let other = DailyLedgerEntry::empty("u2", day());
        assert!(apply(Some(other), &water(Op::Add, 1)).is_err());
    }

    #[test]
    fn test_get_or_create_does_not_persist() {
        let store = MemoryStore::new();
        let ledger = DailyLedger::new(&store);
        let entry = ledger.get_or_create("u1", day()).unwrap();
        assert!(entry.is_empty());
        assert!(store.get("u1", day()).unwrap().is_none());
    }

    #[test]
    fn test_record_persists_and_amends() {
        let store = MemoryStore::new();
        let ledger = DailyLedger::new(&store);
        ledger.record(&water(Op::Add, 2)).unwrap();
        ledger.record(&meal(Op::Add, 500, 20.0, 50.0, 10.0)).unwrap();

        let stored = store.get("u1", day()).unwrap().unwrap();
        assert_eq!(stored.water_units, 2);
        assert_eq!(stored.calories_consumed, 500);

        // Amending later is always allowed
        let applied = ledger.record(&meal(Op::Remove, 500, 20.0, 50.0, 10.0)).unwrap();
        assert_eq!(applied.entry.calories_consumed, 0);
        assert_eq!(store.get("u1", day()).unwrap().unwrap().water_units, 2);
    }

    #[test]
    fn test_record_does_not_materialize_empty_day() {
        let store = MemoryStore::new();
        let ledger = DailyLedger::new(&store);
        let applied = ledger.record(&water(Op::Remove, 1)).unwrap();
        assert_eq!(applied.warnings.len(), 1);
        assert!(store.get("u1", day()).unwrap().is_none());
    }

    #[test]
    fn test_record_keeps_entry_that_returns_to_zero() {
        let store = MemoryStore::new();
        let ledger = DailyLedger::new(&store);
        ledger.record(&water(Op::Add, 1)).unwrap();
        ledger.record(&water(Op::Remove, 1)).unwrap();
        let stored = store.get("u1", day()).unwrap().unwrap();
        assert_eq!(stored.water_units, 0);
    }

    #[test]
    fn test_concurrent_disjoint_fields_both_land() {
        let store = MemoryStore::new();
        let ledger = DailyLedger::new(&store);
        std::thread::scope(|s| {
            s.spawn(|| {
                for _ in 0..50 {
                    ledger.record(&water(Op::Add, 1)).unwrap();
                }
            });
            s.spawn(|| {
                for _ in 0..50 {
                    ledger
                        .record(&event(Op::Add, EventKind::Burn { calories: 10 }))
                        .unwrap();
                }
            });
        });
        let stored = store.get("u1", day()).unwrap().unwrap();
        assert_eq!(stored.water_units, 50);
        assert_eq!(stored.calories_burned, 500);
    }
}
