use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    Male,
    Female,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Sedentary,
    Light,
    Moderate,
    Active,
    VeryActive,
}

impl ActivityLevel {
    /// TDEE multiplier applied to BMR.
    #[must_use]
    pub fn multiplier(self) -> f64 {
        match self {
            ActivityLevel::Sedentary => 1.2,
            ActivityLevel::Light => 1.375,
            ActivityLevel::Moderate => 1.55,
            ActivityLevel::Active => 1.725,
            ActivityLevel::VeryActive => 1.9,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalType {
    Lose,
    Gain,
    Maintain,
}

impl FromStr for Sex {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "male" | "m" => Ok(Sex::Male),
            "female" | "f" => Ok(Sex::Female),
            "other" | "x" => Ok(Sex::Other),
            _ => Err(CoreError::InvalidProfile(format!(
                "Invalid sex '{s}'. Must be one of: male, female, other"
            ))),
        }
    }
}

impl FromStr for ActivityLevel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "sedentary" => Ok(ActivityLevel::Sedentary),
            "light" => Ok(ActivityLevel::Light),
            "moderate" => Ok(ActivityLevel::Moderate),
            "active" => Ok(ActivityLevel::Active),
            "very_active" => Ok(ActivityLevel::VeryActive),
            _ => Err(CoreError::InvalidProfile(format!(
                "Invalid activity level '{s}'. Must be one of: sedentary, light, moderate, active, very_active"
            ))),
        }
    }
}

impl FromStr for GoalType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lose" => Ok(GoalType::Lose),
            "gain" => Ok(GoalType::Gain),
            "maintain" => Ok(GoalType::Maintain),
            _ => Err(CoreError::InvalidProfile(format!(
                "Invalid goal type '{s}'. Must be one of: lose, gain, maintain"
            ))),
        }
    }
}

/// Inputs for goal computation. A new snapshot is built whenever any field
/// changes; computations never mutate one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    pub user_id: String,
    pub sex: Sex,
    pub age: u32,
    pub height_cm: f64,
    pub current_weight_kg: f64,
    pub target_weight_kg: f64,
    pub activity_level: ActivityLevel,
    pub goal_type: GoalType,
    pub strength_training: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionGoal {
    pub user_id: String,
    pub computed_at: DateTime<Utc>,
    pub bmr: f64,
    pub tdee: f64,
    /// Unrounded kcal; see [`NutritionGoal::calorie_target_kcal`] for display.
    pub calorie_target: f64,
    pub protein_target_g: f64,
    pub carb_target_g: f64,
    pub fat_target_g: f64,
}

impl NutritionGoal {
    #[must_use]
    pub fn calorie_target_kcal(&self) -> i64 {
        self.calorie_target.round() as i64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WaterTarget {
    pub ml: f64,
    pub units: i64,
}

/// The single per-user-per-day aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyLedgerEntry {
    pub user_id: String,
    pub date: NaiveDate,
    pub calories_consumed: i64,
    pub protein_g: f64,
    pub carb_g: f64,
    pub fat_g: f64,
    pub calories_burned: i64,
    pub water_units: i64,
    pub weight_kg: Option<f64>,
    /// Timestamp of the write that set `weight_kg`, for last-write-wins.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_recorded_at: Option<DateTime<Utc>>,
}

impl DailyLedgerEntry {
    #[must_use]
    pub fn empty(user_id: &str, date: NaiveDate) -> Self {
        Self {
            user_id: user_id.to_string(),
            date,
            calories_consumed: 0,
            protein_g: 0.0,
            carb_g: 0.0,
            fat_g: 0.0,
            calories_burned: 0,
            water_units: 0,
            weight_kg: None,
            weight_recorded_at: None,
        }
    }

    #[must_use]
    pub fn net_calories(&self) -> i64 {
        self.calories_consumed - self.calories_burned
    }

    /// True when no field carries data.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn is_empty(&self) -> bool {
        self.calories_consumed == 0
            && self.protein_g == 0.0
            && self.carb_g == 0.0
            && self.fat_g == 0.0
            && self.calories_burned == 0
            && self.water_units == 0
            && self.weight_kg.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    Add,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    Consume {
        calories: i64,
        protein_g: f64,
        carb_g: f64,
        fat_g: f64,
    },
    Burn {
        calories: i64,
    },
    Water {
        units: i64,
    },
    Weight {
        kg: f64,
    },
}

/// A logging event from the UI layer. Deltas are always non-negative; the
/// direction comes from `op`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub user_id: String,
    pub date: NaiveDate,
    pub op: Op,
    #[serde(flatten)]
    pub kind: EventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<DateTime<Utc>>,
}

impl LedgerEvent {
    #[must_use]
    pub fn new(user_id: &str, date: NaiveDate, op: Op, kind: EventKind) -> Self {
        Self {
            user_id: user_id.to_string(),
            date,
            op,
            kind,
            recorded_at: None,
        }
    }

    #[must_use]
    pub fn at(mut self, recorded_at: DateTime<Utc>) -> Self {
        self.recorded_at = Some(recorded_at);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerField {
    CaloriesConsumed,
    ProteinG,
    CarbG,
    FatG,
    CaloriesBurned,
    WaterUnits,
    WeightKg,
}

impl fmt::Display for LedgerField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LedgerField::CaloriesConsumed => "calories_consumed",
            LedgerField::ProteinG => "protein_g",
            LedgerField::CarbG => "carb_g",
            LedgerField::FatG => "fat_g",
            LedgerField::CaloriesBurned => "calories_burned",
            LedgerField::WaterUnits => "water_units",
            LedgerField::WeightKg => "weight_kg",
        };
        f.write_str(name)
    }
}

/// A remove asked for more than the entry held; the field was clamped at zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsistencyWarning {
    pub user_id: String,
    pub date: NaiveDate,
    pub field: LedgerField,
    pub requested: f64,
    pub available: f64,
}

impl fmt::Display for ConsistencyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on {}: removed {} but only {} was recorded; clamped to 0",
            self.field, self.date, self.requested, self.available
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Applied {
    pub entry: DailyLedgerEntry,
    pub warnings: Vec<ConsistencyWarning>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Losing,
    Gaining,
    Maintaining,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalProgress {
    pub percent_complete: f64,
    pub start_weight: f64,
    pub current_weight: f64,
    pub target_weight: f64,
    pub direction: Direction,
    pub remaining_kg: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend_kg_per_week: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projected_completion: Option<NaiveDate>,
    /// The goal type contradicts the weights (e.g. "lose" with target equal
    /// to start); `percent_complete` is reported as 100.
    pub degenerate_goal: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Window {
    Day,
    Week,
    Month,
    Quarter,
}

impl Window {
    #[must_use]
    pub fn default_count(self) -> u32 {
        match self {
            Window::Day => 7,
            Window::Week => 8,
            Window::Month => 6,
            Window::Quarter => 4,
        }
    }

    #[must_use]
    pub fn current_label(self) -> &'static str {
        match self {
            Window::Day => "Today",
            Window::Week => "This week",
            Window::Month => "This month",
            Window::Quarter => "This quarter",
        }
    }
}

impl FromStr for Window {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "day" | "days" | "daily" => Ok(Window::Day),
            "week" | "weeks" | "weekly" => Ok(Window::Week),
            "month" | "months" | "monthly" => Ok(Window::Month),
            "quarter" | "quarters" | "quarterly" => Ok(Window::Quarter),
            _ => Err(CoreError::InvalidConfig(format!(
                "Invalid window '{s}'. Must be one of: day, week, month, quarter"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricStats {
    pub sum: f64,
    pub avg: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WeightStats {
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    pub last: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowSummary {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub label: String,
    pub is_current: bool,
    pub days: u32,
    pub days_logged: u32,
    pub calories_consumed: MetricStats,
    pub calories_burned: MetricStats,
    pub net_calories: MetricStats,
    pub protein_g: MetricStats,
    pub carb_g: MetricStats,
    pub fat_g: MetricStats,
    pub water_units: MetricStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight_kg: Option<WeightStats>,
}
