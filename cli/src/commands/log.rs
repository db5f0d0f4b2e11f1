use anyhow::{Result, bail};

use fitledger_core::db::SqliteStore;
use fitledger_core::models::{Applied, EventKind, LedgerEvent, Op};
use fitledger_core::service::{Clock, Tracker};
use fitledger_core::units::{LBS_PER_KG, ml_to_water_units, water_units_to_ml};

use super::helpers::{parse_date, parse_serving, parse_volume, parse_weight, print_json};

fn op(remove: bool) -> Op {
    if remove { Op::Remove } else { Op::Add }
}

fn verb(op: Op) -> &'static str {
    match op {
        Op::Add => "Logged",
        Op::Remove => "Removed",
    }
}

/// Apply the event and report warnings on stderr; returns the result for
/// printing.
fn record(
    app: &Tracker<SqliteStore, impl Clock>,
    user_id: &str,
    date: Option<String>,
    op: Op,
    kind: EventKind,
) -> Result<Applied> {
    let date = parse_date(date)?;
    let applied = app.record(LedgerEvent::new(user_id, date, op, kind))?;
    for warning in &applied.warnings {
        eprintln!("Warning: {warning}");
    }
    Ok(applied)
}

pub(crate) struct FoodArgs {
    pub calories: i64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    /// When set, the nutrition values are per 100 g and scaled to this serving.
    pub serving: Option<String>,
}

impl FoodArgs {
    /// The nutrition actually eaten, scaled by the serving if one was given.
    #[allow(clippy::cast_precision_loss)]
    fn consumed(&self) -> Result<EventKind> {
        let factor = match &self.serving {
            Some(serving) => parse_serving(serving)? / 100.0,
            None => 1.0,
        };
        Ok(EventKind::Consume {
            calories: (self.calories as f64 * factor).round() as i64,
            protein_g: self.protein * factor,
            carb_g: self.carbs * factor,
            fat_g: self.fat * factor,
        })
    }
}

pub(crate) fn cmd_log_food(
    app: &Tracker<SqliteStore, impl Clock>,
    user_id: &str,
    food: &FoodArgs,
    remove: bool,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let op = op(remove);
    let kind = food.consumed()?;
    let applied = record(app, user_id, date, op, kind.clone())?;

    if json {
        return print_json(&applied);
    }
    let e = &applied.entry;
    if let EventKind::Consume {
        calories,
        protein_g,
        carb_g,
        fat_g,
    } = kind
    {
        println!(
            "{} {calories} kcal | P:{protein_g:.0}g C:{carb_g:.0}g F:{fat_g:.0}g for {}",
            verb(op),
            e.date.format("%Y-%m-%d")
        );
    }
    println!(
        "  Day total: {} kcal | P:{:.0}g C:{:.0}g F:{:.0}g",
        e.calories_consumed, e.protein_g, e.carb_g, e.fat_g
    );
    Ok(())
}

pub(crate) fn cmd_log_exercise(
    app: &Tracker<SqliteStore, impl Clock>,
    user_id: &str,
    calories: i64,
    remove: bool,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let op = op(remove);
    let applied = record(app, user_id, date, op, EventKind::Burn { calories })?;

    if json {
        return print_json(&applied);
    }
    let e = &applied.entry;
    println!(
        "{} {calories} kcal burned for {}",
        verb(op),
        e.date.format("%Y-%m-%d")
    );
    println!(
        "  Day total: {} kcal burned, net {} kcal",
        e.calories_burned,
        e.net_calories()
    );
    Ok(())
}

pub(crate) fn cmd_log_water(
    app: &Tracker<SqliteStore, impl Clock>,
    user_id: &str,
    units: Option<i64>,
    volume: Option<&str>,
    remove: bool,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let unit_ml = app.config().water_unit_ml;
    let units = match (units, volume) {
        (Some(_), Some(_)) => bail!("Use either --units or --volume, not both"),
        (Some(n), None) => n,
        (None, Some(v)) => {
            let ml = parse_volume(v)?;
            let n = ml_to_water_units(ml, unit_ml);
            eprintln!("Converting {ml:.0} ml → {n} × {unit_ml:.0} ml");
            n
        }
        (None, None) => 1,
    };
    if units <= 0 {
        bail!("Water units must be greater than 0");
    }

    let op = op(remove);
    let applied = record(app, user_id, date, op, EventKind::Water { units })?;

    if json {
        return print_json(&applied);
    }
    let total = applied.entry.water_units;
    println!(
        "{} {units} water unit(s) for {}",
        verb(op),
        applied.entry.date.format("%Y-%m-%d")
    );
    println!(
        "  Day total: {total} ({:.0} ml)",
        water_units_to_ml(total, unit_ml)
    );
    Ok(())
}

pub(crate) fn cmd_log_weight(
    app: &Tracker<SqliteStore, impl Clock>,
    user_id: &str,
    value: Option<f64>,
    unit: &str,
    remove: bool,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let op = op(remove);
    let kg = match (op, value) {
        (Op::Add, None) => bail!("A weight value is required"),
        (Op::Add, Some(v)) => parse_weight(v, unit)?,
        // the stored weight is cleared regardless of the value given
        (Op::Remove, _) => 0.0,
    };
    let applied = record(app, user_id, date, op, EventKind::Weight { kg })?;

    if json {
        return print_json(&applied);
    }
    let date = applied.entry.date.format("%Y-%m-%d");
    match (op, applied.entry.weight_kg) {
        (Op::Add, Some(stored)) => {
            println!(
                "Logged {stored:.1} kg ({:.1} lbs) for {date}",
                stored * LBS_PER_KG
            );
            if (stored - kg).abs() > f64::EPSILON {
                eprintln!("Note: a newer weigh-in already exists for {date}; kept {stored:.1} kg");
            }
        }
        (Op::Remove, None) if applied.warnings.is_empty() => {
            println!("Removed weight for {date}");
        }
        _ => {}
    }
    Ok(())
}
