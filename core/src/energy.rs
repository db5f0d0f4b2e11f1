use chrono::{DateTime, Utc};

use crate::config::{EnergyConfig, TrackerConfig};
use crate::error::{CoreError, Result};
use crate::models::{GoalType, NutritionGoal, ProfileSnapshot, Sex, WaterTarget};
use crate::units::ml_to_water_units;

pub const KCAL_PER_G_PROTEIN: f64 = 4.0;
pub const KCAL_PER_G_CARB: f64 = 4.0;
pub const KCAL_PER_G_FAT: f64 = 9.0;

const MALE_CONSTANT: f64 = 5.0;
const FEMALE_CONSTANT: f64 = -161.0;
/// Policy for `Sex::Other`: the mean of the male and female constants.
const OTHER_CONSTANT: f64 = (MALE_CONSTANT + FEMALE_CONSTANT) / 2.0;

fn validate_profile(profile: &ProfileSnapshot) -> Result<()> {
    if !profile.height_cm.is_finite() || profile.height_cm <= 0.0 {
        return Err(CoreError::InvalidProfile(format!(
            "height_cm must be greater than 0 (got {})",
            profile.height_cm
        )));
    }
    if !profile.current_weight_kg.is_finite() || profile.current_weight_kg <= 0.0 {
        return Err(CoreError::InvalidProfile(format!(
            "current_weight_kg must be greater than 0 (got {})",
            profile.current_weight_kg
        )));
    }
    if profile.age == 0 {
        return Err(CoreError::InvalidProfile(
            "age must be greater than 0".to_string(),
        ));
    }
    if !profile.target_weight_kg.is_finite() {
        return Err(CoreError::InvalidProfile(
            "target_weight_kg must be a finite number".to_string(),
        ));
    }
    Ok(())
}

/// Basal metabolic rate in kcal/day, by the Mifflin-St Jeor equation:
/// `10 x weight_kg + 6.25 x height_cm - 5 x age + s`, with `s = +5` for men
/// and `s = -161` for women.
#[must_use]
pub fn mifflin_st_jeor(weight_kg: f64, height_cm: f64, age: u32, sex: Sex) -> f64 {
    let constant = match sex {
        Sex::Male => MALE_CONSTANT,
        Sex::Female => FEMALE_CONSTANT,
        Sex::Other => OTHER_CONSTANT,
    };
    10.0 * weight_kg + 6.25 * height_cm - 5.0 * f64::from(age) + constant
}

/// Daily calorie target for the goal type. A deficit never drops the target
/// below BMR.
#[must_use]
pub fn calorie_target(bmr: f64, tdee: f64, goal_type: GoalType, config: &EnergyConfig) -> f64 {
    match goal_type {
        GoalType::Lose => (tdee - config.deficit_kcal).max(bmr),
        GoalType::Gain => tdee + config.surplus_kcal,
        GoalType::Maintain => tdee,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacroTargets {
    pub protein_g: f64,
    pub carb_g: f64,
    pub fat_g: f64,
}

/// Split a calorie target into macro grams. Carbs take whatever energy is
/// left after protein and fat.
#[must_use]
pub fn macro_split(calories: f64, strength_training: bool, config: &EnergyConfig) -> MacroTargets {
    let calories = calories.max(0.0);
    let protein_share = if strength_training {
        config.strength_protein_share
    } else {
        config.protein_share
    };
    let mut protein_g = calories * protein_share / KCAL_PER_G_PROTEIN;
    if strength_training {
        protein_g *= 1.0 + config.strength_protein_bonus;
    }
    let fat_g = calories * config.fat_share / KCAL_PER_G_FAT;

    let remainder = calories - protein_g * KCAL_PER_G_PROTEIN - fat_g * KCAL_PER_G_FAT;
    let carb_g = if remainder < 0.0 {
        tracing::warn!(
            calories,
            protein_g,
            fat_g,
            remainder,
            "protein and fat exceed the calorie target; carb target clamped to 0"
        );
        0.0
    } else {
        remainder / KCAL_PER_G_CARB
    };

    MacroTargets {
        protein_g,
        carb_g,
        fat_g,
    }
}

/// Compute the nutrition goal for a profile. Pure; `computed_at` is supplied
/// by the caller's clock.
pub fn compute_goal(
    profile: &ProfileSnapshot,
    config: &EnergyConfig,
    computed_at: DateTime<Utc>,
) -> Result<NutritionGoal> {
    validate_profile(profile)?;

    let bmr = mifflin_st_jeor(
        profile.current_weight_kg,
        profile.height_cm,
        profile.age,
        profile.sex,
    );
    if bmr <= 0.0 {
        return Err(CoreError::InvalidProfile(format!(
            "profile yields a non-positive BMR ({bmr:.1} kcal)"
        )));
    }
    let tdee = bmr * profile.activity_level.multiplier();
    let target = calorie_target(bmr, tdee, profile.goal_type, config);
    let macros = macro_split(target, profile.strength_training, config);

    Ok(NutritionGoal {
        user_id: profile.user_id.clone(),
        computed_at,
        bmr,
        tdee,
        calorie_target: target,
        protein_target_g: macros.protein_g,
        carb_target_g: macros.carb_g,
        fat_target_g: macros.fat_g,
    })
}

/// Recommended daily water intake for the profile's current weight.
pub fn recommended_water(profile: &ProfileSnapshot, config: &TrackerConfig) -> Result<WaterTarget> {
    if !profile.current_weight_kg.is_finite() || profile.current_weight_kg <= 0.0 {
        return Err(CoreError::InvalidProfile(format!(
            "current_weight_kg must be greater than 0 (got {})",
            profile.current_weight_kg
        )));
    }
    let ml = profile.current_weight_kg * config.water_ml_per_kg;
    Ok(WaterTarget {
        ml,
        units: ml_to_water_units(ml, config.water_unit_ml),
    })
}
