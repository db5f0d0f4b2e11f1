use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};

use fitledger_core::db::SqliteStore;
use fitledger_core::models::ProfileSnapshot;
use fitledger_core::service::{Clock, Tracker};
use fitledger_core::units::{
    VolumeUnit, WeightUnit, convert_to_grams, split_quantity, to_kg, to_ml,
};

pub(crate) fn parse_date(date_str: Option<String>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(Local::now().date_naive()),
        Some(s) => match s.as_str() {
            "today" => Ok(Local::now().date_naive()),
            "yesterday" => Ok(Local::now().date_naive() - chrono::Duration::days(1)),
            "tomorrow" => Ok(Local::now().date_naive() + chrono::Duration::days(1)),
            _ => NaiveDate::parse_from_str(&s, "%Y-%m-%d").with_context(|| {
                format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday/tomorrow")
            }),
        },
    }
}

/// Convert a body weight in `unit` to kilograms, noting the conversion.
pub(crate) fn parse_weight(value: f64, unit: &str) -> Result<f64> {
    if !value.is_finite() || value <= 0.0 {
        bail!("Weight must be greater than 0");
    }
    let unit: WeightUnit = unit.parse()?;
    let kg = no_neg_zero(to_kg(value, unit));
    if unit != WeightUnit::Kg {
        eprintln!("Converting {value:.1} {} → {kg:.2} kg", unit.symbol());
    }
    Ok(kg)
}

/// Parse a volume like "500ml", "0.5 l" or "16 fl oz" into millilitres.
/// A bare number is taken as millilitres.
pub(crate) fn parse_volume(s: &str) -> Result<f64> {
    let s = s.trim();
    let ml = if let Ok(ml) = s.parse::<f64>() {
        ml
    } else {
        let (qty, unit) = split_quantity(s)
            .with_context(|| format!("Invalid volume '{s}'. Use '500ml', '0.5 l', '2 cup', etc."))?;
        let unit: VolumeUnit = unit.trim().parse()?;
        to_ml(qty, unit)
    };
    if !ml.is_finite() || ml <= 0.0 {
        bail!("Volume must be greater than 0");
    }
    Ok(ml)
}

/// Parse a serving like "150", "150g", "2 tbsp" or "250ml" into grams.
/// Volumes assume water density.
pub(crate) fn parse_serving(s: &str) -> Result<f64> {
    let s = s.trim();
    let grams = if let Ok(g) = s.parse::<f64>() {
        g
    } else {
        let (qty, unit) = split_quantity(s).with_context(|| {
            format!("Invalid serving format: '{s}'. Use '200g', '500ml', '2 tbsp', etc.")
        })?;
        let Some((grams, is_approx)) = convert_to_grams(qty, unit) else {
            bail!("Unknown unit '{unit}' in '{s}'. Supported: g, kg, lb, oz, tbsp, tsp, ml, l");
        };
        if is_approx {
            eprintln!("Note: {qty} {unit} ≈ {grams:.0}g (approximate, assumes water density)");
        }
        grams
    };
    if !grams.is_finite() || grams <= 0.0 {
        bail!("Serving size must be greater than 0");
    }
    Ok(grams)
}

/// The stored profile for `user_id`, or an error pointing at `goal set`.
pub(crate) fn require_profile(
    app: &Tracker<SqliteStore, impl Clock>,
    user_id: &str,
) -> Result<ProfileSnapshot> {
    app.store().load_profile(user_id)?.with_context(|| {
        format!("No profile for user '{user_id}'. Run `fitledger goal set` first.")
    })
}

pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) fn no_neg_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}
