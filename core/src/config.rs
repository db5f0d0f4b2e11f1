use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::rollup::MAX_PERIODS;

/// Tunables for the tracking core. Every field has a default so a partial
/// `config.json` only needs to name what it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Volume of one logged water unit (one "glass" on the presentation grid).
    pub water_unit_ml: f64,
    /// Recommended daily water intake per kilogram of body weight.
    pub water_ml_per_kg: f64,
    /// How far back progress queries look for weigh-ins.
    pub progress_lookback_days: i64,
    /// Most periods a single report may cover.
    pub max_report_periods: u32,
    pub energy: EnergyConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            water_unit_ml: 300.0,
            water_ml_per_kg: 35.0,
            progress_lookback_days: 365,
            max_report_periods: 366,
            energy: EnergyConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnergyConfig {
    pub deficit_kcal: f64,
    pub surplus_kcal: f64,
    pub protein_share: f64,
    pub strength_protein_share: f64,
    /// Extra protein (fraction of the protein grams) for strength training.
    pub strength_protein_bonus: f64,
    pub fat_share: f64,
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            deficit_kcal: 500.0,
            surplus_kcal: 500.0,
            protein_share: 0.25,
            strength_protein_share: 0.30,
            strength_protein_bonus: 0.10,
            fat_share: 0.25,
        }
    }
}

fn check_positive(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(CoreError::InvalidConfig(format!(
            "{name} must be a positive number (got {value})"
        )));
    }
    Ok(())
}

fn check_share(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(CoreError::InvalidConfig(format!(
            "{name} must be between 0 and 1 (got {value})"
        )));
    }
    Ok(())
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<()> {
        check_positive("water_unit_ml", self.water_unit_ml)?;
        check_positive("water_ml_per_kg", self.water_ml_per_kg)?;
        if self.progress_lookback_days <= 0 {
            return Err(CoreError::InvalidConfig(format!(
                "progress_lookback_days must be greater than 0 (got {})",
                self.progress_lookback_days
            )));
        }
        if self.max_report_periods == 0 || self.max_report_periods > MAX_PERIODS {
            return Err(CoreError::InvalidConfig(format!(
                "max_report_periods must be between 1 and {MAX_PERIODS} (got {})",
                self.max_report_periods
            )));
        }
        self.energy.validate()
    }
}

impl EnergyConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.deficit_kcal.is_finite() || self.deficit_kcal < 0.0 {
            return Err(CoreError::InvalidConfig(
                "deficit_kcal must be non-negative".to_string(),
            ));
        }
        if !self.surplus_kcal.is_finite() || self.surplus_kcal < 0.0 {
            return Err(CoreError::InvalidConfig(
                "surplus_kcal must be non-negative".to_string(),
            ));
        }
        check_share("protein_share", self.protein_share)?;
        check_share("strength_protein_share", self.strength_protein_share)?;
        check_share("strength_protein_bonus", self.strength_protein_bonus)?;
        check_share("fat_share", self.fat_share)?;
        Ok(())
    }
}
