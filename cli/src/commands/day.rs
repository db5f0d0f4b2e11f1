use anyhow::Result;
use serde::Serialize;

use fitledger_core::db::SqliteStore;
use fitledger_core::models::{DailyLedgerEntry, NutritionGoal};
use fitledger_core::service::{Clock, Tracker};
use fitledger_core::units::{LBS_PER_KG, water_units_to_ml};

use super::helpers::{no_neg_zero, parse_date, print_json};

/// What is left of the day's goal. Negative values mean the target was
/// exceeded.
#[derive(Debug, Serialize)]
struct Remaining {
    calories: f64,
    protein_g: f64,
    carb_g: f64,
    fat_g: f64,
}

#[derive(Serialize)]
struct DayView {
    #[serde(flatten)]
    entry: DailyLedgerEntry,
    net_calories: i64,
    water_ml: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    goal: Option<NutritionGoal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    remaining: Option<Remaining>,
}

#[allow(clippy::cast_precision_loss)]
fn remaining(entry: &DailyLedgerEntry, goal: &NutritionGoal) -> Remaining {
    // exercise earns calories back
    Remaining {
        calories: no_neg_zero(goal.calorie_target - entry.net_calories() as f64),
        protein_g: no_neg_zero(goal.protein_target_g - entry.protein_g),
        carb_g: no_neg_zero(goal.carb_target_g - entry.carb_g),
        fat_g: no_neg_zero(goal.fat_target_g - entry.fat_g),
    }
}

pub(crate) fn cmd_day(
    app: &Tracker<SqliteStore, impl Clock>,
    user_id: &str,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let date = parse_date(date)?;
    let entry = app.day(user_id, date)?;
    let goal = app.goal(user_id)?;
    let view = DayView {
        net_calories: entry.net_calories(),
        water_ml: water_units_to_ml(entry.water_units, app.config().water_unit_ml),
        remaining: goal.as_ref().map(|g| remaining(&entry, g)),
        goal,
        entry,
    };

    if json {
        return print_json(&view);
    }

    let e = &view.entry;
    println!("=== {} ===\n", e.date.format("%Y-%m-%d"));
    if e.is_empty() {
        eprintln!("No entries for {}", e.date.format("%Y-%m-%d"));
    }
    println!(
        "  EATEN:    {} kcal | P:{:.0}g C:{:.0}g F:{:.0}g",
        e.calories_consumed, e.protein_g, e.carb_g, e.fat_g
    );
    println!("  BURNED:   {} kcal", e.calories_burned);
    println!("  NET:      {} kcal", view.net_calories);
    println!("  WATER:    {} ({:.0} ml)", e.water_units, view.water_ml);
    if let Some(kg) = e.weight_kg {
        println!("  WEIGHT:   {kg:.1} kg ({:.1} lbs)", kg * LBS_PER_KG);
    }

    if let (Some(goal), Some(r)) = (&view.goal, &view.remaining) {
        println!(
            "  TARGET:   {} kcal | P:{:.0}g C:{:.0}g F:{:.0}g",
            goal.calorie_target_kcal(),
            goal.protein_target_g,
            goal.carb_target_g,
            goal.fat_target_g
        );
        println!(
            "  REMAINING: {:.0} kcal | P:{:.0}g C:{:.0}g F:{:.0}g",
            r.calories, r.protein_g, r.carb_g, r.fat_g
        );
    }
    Ok(())
}
