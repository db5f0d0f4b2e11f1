use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

pub const KG_PER_LB: f64 = 0.453_592_37;
pub const LBS_PER_KG: f64 = 1.0 / KG_PER_LB;
pub const G_PER_OZ: f64 = 28.349_523_125;
pub const ML_PER_FL_OZ: f64 = 29.573_529_562_5;
pub const ML_PER_CUP: f64 = 236.588_236_5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightUnit {
    Kg,
    Lb,
    G,
    Oz,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeUnit {
    Ml,
    L,
    FlOz,
    Cup,
}

impl WeightUnit {
    #[must_use]
    pub fn kg_per_unit(self) -> f64 {
        match self {
            WeightUnit::Kg => 1.0,
            WeightUnit::Lb => KG_PER_LB,
            WeightUnit::G => 0.001,
            WeightUnit::Oz => G_PER_OZ / 1000.0,
        }
    }

    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            WeightUnit::Kg => "kg",
            WeightUnit::Lb => "lbs",
            WeightUnit::G => "g",
            WeightUnit::Oz => "oz",
        }
    }
}

impl VolumeUnit {
    #[must_use]
    pub fn ml_per_unit(self) -> f64 {
        match self {
            VolumeUnit::Ml => 1.0,
            VolumeUnit::L => 1000.0,
            VolumeUnit::FlOz => ML_PER_FL_OZ,
            VolumeUnit::Cup => ML_PER_CUP,
        }
    }

    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            VolumeUnit::Ml => "ml",
            VolumeUnit::L => "l",
            VolumeUnit::FlOz => "fl oz",
            VolumeUnit::Cup => "cup",
        }
    }
}

impl FromStr for WeightUnit {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "kg" | "kgs" | "kilogram" | "kilograms" => Ok(WeightUnit::Kg),
            "lb" | "lbs" | "pound" | "pounds" => Ok(WeightUnit::Lb),
            "g" | "gram" | "grams" => Ok(WeightUnit::G),
            "oz" | "ounce" | "ounces" => Ok(WeightUnit::Oz),
            _ => Err(CoreError::InvalidEvent(format!(
                "Unknown weight unit '{s}'. Supported: kg, lbs, g, oz"
            ))),
        }
    }
}

impl FromStr for VolumeUnit {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ml" | "milliliter" | "milliliters" | "millilitre" | "millilitres" => {
                Ok(VolumeUnit::Ml)
            }
            "l" | "liter" | "liters" | "litre" | "litres" => Ok(VolumeUnit::L),
            "floz" | "fl oz" | "fl_oz" | "fluid ounce" | "fluid ounces" => Ok(VolumeUnit::FlOz),
            "cup" | "cups" => Ok(VolumeUnit::Cup),
            _ => Err(CoreError::InvalidEvent(format!(
                "Unknown volume unit '{s}'. Supported: ml, l, fl oz, cup"
            ))),
        }
    }
}

impl fmt::Display for WeightUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl fmt::Display for VolumeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[must_use]
pub fn to_kg(value: f64, unit: WeightUnit) -> f64 {
    value * unit.kg_per_unit()
}

#[must_use]
pub fn from_kg(kg: f64, unit: WeightUnit) -> f64 {
    kg / unit.kg_per_unit()
}

#[must_use]
pub fn convert_weight(value: f64, from: WeightUnit, to: WeightUnit) -> f64 {
    from_kg(to_kg(value, from), to)
}

#[must_use]
pub fn to_ml(value: f64, unit: VolumeUnit) -> f64 {
    value * unit.ml_per_unit()
}

#[must_use]
pub fn from_ml(ml: f64, unit: VolumeUnit) -> f64 {
    ml / unit.ml_per_unit()
}

#[must_use]
pub fn convert_volume(value: f64, from: VolumeUnit, to: VolumeUnit) -> f64 {
    from_ml(to_ml(value, from), to)
}

/// Volume represented by a count of water units.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn water_units_to_ml(units: i64, unit_ml: f64) -> f64 {
    units as f64 * unit_ml
}

/// Number of whole water units needed to cover `ml`, rounded up.
#[must_use]
pub fn ml_to_water_units(ml: f64, unit_ml: f64) -> i64 {
    if ml <= 0.0 || unit_ml <= 0.0 {
        return 0;
    }
    // Absorb float noise so 600ml / 300ml is 2, not 3.
    ((ml / unit_ml) - 1e-9).ceil() as i64
}

/// Convert a food quantity with a unit to grams.
/// Volume-based conversions assume water density (1 ml = 1 g).
/// Returns `(grams, is_approximate)` where `is_approximate` is true for volume conversions.
#[must_use]
pub fn convert_to_grams(quantity: f64, unit: &str) -> Option<(f64, bool)> {
    let lower = unit.to_lowercase();
    match lower.as_str() {
        "tbsp" | "tablespoon" | "tablespoons" => return Some((quantity * 15.0, true)),
        "tsp" | "teaspoon" | "teaspoons" => return Some((quantity * 5.0, true)),
        _ => {}
    }
    if let Ok(w) = lower.parse::<WeightUnit>() {
        return Some((to_kg(quantity, w) * 1000.0, false));
    }
    if let Ok(v) = lower.parse::<VolumeUnit>() {
        return Some((to_ml(quantity, v), true));
    }
    None
}

/// Split "500ml" or "2.5 l" into (500.0, "ml") or (2.5, "l").
#[must_use]
pub fn split_quantity(s: &str) -> Option<(f64, &str)> {
    let s = s.trim();
    let idx = s.find(|c: char| c.is_alphabetic())?;
    if idx == 0 {
        return None;
    }
    let (num_part, unit_part) = s.split_at(idx);
    let qty: f64 = num_part.trim().parse().ok()?;
    let unit = unit_part.trim();
    if unit.is_empty() {
        return None;
    }
    Some((qty, unit))
}
