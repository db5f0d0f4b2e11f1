use anyhow::Result;
use serde::Serialize;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use fitledger_core::db::SqliteStore;
use fitledger_core::models::{ActivityLevel, GoalType, NutritionGoal, ProfileSnapshot, Sex};
use fitledger_core::service::{Clock, Tracker};
use fitledger_core::units::{LBS_PER_KG, water_units_to_ml};

use super::helpers::{parse_weight, print_json, require_profile};

pub(crate) struct ProfileArgs {
    pub sex: String,
    pub age: u32,
    pub height_cm: f64,
    pub weight: f64,
    pub weight_unit: String,
    pub target: f64,
    pub activity: String,
    pub goal: Option<String>,
    pub strength: bool,
}

/// Build a profile from command-line arguments. Without `--goal` the goal
/// type follows from the current and target weights.
pub(crate) fn build_profile(user_id: &str, args: &ProfileArgs) -> Result<ProfileSnapshot> {
    let current_weight_kg = parse_weight(args.weight, &args.weight_unit)?;
    let target_weight_kg = parse_weight(args.target, &args.weight_unit)?;
    let goal_type = match &args.goal {
        Some(g) => g.parse::<GoalType>()?,
        None if target_weight_kg < current_weight_kg => GoalType::Lose,
        None if target_weight_kg > current_weight_kg => GoalType::Gain,
        None => GoalType::Maintain,
    };

    Ok(ProfileSnapshot {
        user_id: user_id.to_string(),
        sex: args.sex.parse::<Sex>()?,
        age: args.age,
        height_cm: args.height_cm,
        current_weight_kg,
        target_weight_kg,
        activity_level: args.activity.parse::<ActivityLevel>()?,
        goal_type,
        strength_training: args.strength,
    })
}

fn print_goal(goal: &NutritionGoal) {
    #[derive(Tabled)]
    struct GoalRow {
        #[tabled(rename = "Target")]
        name: &'static str,
        #[tabled(rename = "Value")]
        value: String,
    }

    let rows = vec![
        GoalRow {
            name: "BMR",
            value: format!("{:.0} kcal", goal.bmr),
        },
        GoalRow {
            name: "TDEE",
            value: format!("{:.0} kcal", goal.tdee),
        },
        GoalRow {
            name: "Calories",
            value: format!("{} kcal", goal.calorie_target_kcal()),
        },
        GoalRow {
            name: "Protein",
            value: format!("{:.0}g", goal.protein_target_g),
        },
        GoalRow {
            name: "Carbs",
            value: format!("{:.0}g", goal.carb_target_g),
        },
        GoalRow {
            name: "Fat",
            value: format!("{:.0}g", goal.fat_target_g),
        },
    ];

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn cmd_goal_set(
    app: &Tracker<SqliteStore, impl Clock>,
    user_id: &str,
    args: &ProfileArgs,
    json: bool,
) -> Result<()> {
    let profile = build_profile(user_id, args)?;
    let goal = app.recompute_goal(&profile)?;
    app.store().save_profile(&profile)?;

    if json {
        #[derive(Serialize)]
        struct GoalSet<'a> {
            profile: &'a ProfileSnapshot,
            goal: &'a NutritionGoal,
        }
        return print_json(&GoalSet {
            profile: &profile,
            goal: &goal,
        });
    }

    let current = profile.current_weight_kg;
    let target = profile.target_weight_kg;
    println!(
        "Profile saved for {user_id}: {current:.1} kg → {target:.1} kg ({:.1} → {:.1} lbs)",
        current * LBS_PER_KG,
        target * LBS_PER_KG
    );
    print_goal(&goal);
    Ok(())
}

pub(crate) fn cmd_goal_show(
    app: &Tracker<SqliteStore, impl Clock>,
    user_id: &str,
    json: bool,
) -> Result<()> {
    let Some(goal) = app.goal(user_id)? else {
        if json {
            println!(
                "{}",
                serde_json::json!({ "error": format!("No goal for user '{user_id}'") })
            );
        } else {
            eprintln!("No goal set. Use `fitledger goal set` to create one.");
        }
        return Ok(());
    };

    if json {
        return print_json(&goal);
    }
    println!(
        "Computed {}",
        goal.computed_at.format("%Y-%m-%d %H:%M UTC")
    );
    print_goal(&goal);
    Ok(())
}

pub(crate) fn cmd_goal_water(
    app: &Tracker<SqliteStore, impl Clock>,
    user_id: &str,
    json: bool,
) -> Result<()> {
    let profile = require_profile(app, user_id)?;
    let target = app.water_target(&profile)?;

    if json {
        return print_json(&target);
    }
    let unit_ml = app.config().water_unit_ml;
    println!(
        "Drink {:.0} ml per day: {} × {unit_ml:.0} ml ({:.0} ml)",
        target.ml,
        target.units,
        water_units_to_ml(target.units, unit_ml)
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use fitledger_core::config::TrackerConfig;
    use fitledger_core::service::FixedClock;

    fn args() -> ProfileArgs {
        ProfileArgs {
            sex: "male".to_string(),
            age: 30,
            height_cm: 180.0,
            weight: 80.0,
            weight_unit: "kg".to_string(),
            target: 70.0,
            activity: "moderate".to_string(),
            goal: None,
            strength: false,
        }
    }

    fn app() -> Tracker<SqliteStore, FixedClock> {
        Tracker::new(
            SqliteStore::open_in_memory().unwrap(),
            FixedClock::new(Utc.with_ymd_and_hms(2024, 6, 12, 9, 0, 0).unwrap()),
            TrackerConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_build_profile_infers_goal_type() {
        assert_eq!(build_profile("u1", &args()).unwrap().goal_type, GoalType::Lose);

        let gain = ProfileArgs {
            target: 85.0,
            ..args()
        };
        assert_eq!(build_profile("u1", &gain).unwrap().goal_type, GoalType::Gain);

        let same = ProfileArgs {
            target: 80.0,
            ..args()
        };
        assert_eq!(
            build_profile("u1", &same).unwrap().goal_type,
            GoalType::Maintain
        );
    }

    #[test]
    fn test_build_profile_converts_pounds() {
        let lbs = ProfileArgs {
            weight: 176.0,
            target: 165.0,
            weight_unit: "lbs".to_string(),
            ..args()
        };
        let profile = build_profile("u1", &lbs).unwrap();
        assert!((profile.current_weight_kg - 79.832_257_12).abs() < 1e-6);
        assert!(profile.target_weight_kg < profile.current_weight_kg);
    }

    #[test]
    fn test_build_profile_rejects_bad_enums() {
        let bad = ProfileArgs {
            activity: "couch".to_string(),
            ..args()
        };
        assert!(build_profile("u1", &bad).is_err());
    }

    #[test]
    fn test_goal_set_saves_profile_and_goal() {
        let app = app();
        cmd_goal_set(&app, "u1", &args(), true).unwrap();
        let profile = app.store().load_profile("u1").unwrap().unwrap();
        assert_eq!(profile.sex, Sex::Male);
        let goal = app.goal("u1").unwrap().unwrap();
        assert!((goal.bmr - 1780.0).abs() < 1e-9);
    }

    #[test]
    fn test_goal_set_invalid_profile_saves_nothing() {
        let app = app();
        let bad = ProfileArgs {
            height_cm: 0.0,
            ..args()
        };
        assert!(cmd_goal_set(&app, "u1", &bad, true).is_err());
        assert!(app.store().load_profile("u1").unwrap().is_none());
        assert!(app.goal("u1").unwrap().is_none());
    }

    #[test]
    fn test_goal_water_requires_profile() {
        let app = app();
        assert!(cmd_goal_water(&app, "u1", true).is_err());
        cmd_goal_set(&app, "u1", &args(), true).unwrap();
        cmd_goal_water(&app, "u1", true).unwrap();
    }
}
