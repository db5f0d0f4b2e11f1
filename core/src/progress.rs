use chrono::{Days, NaiveDate};

use crate::models::{DailyLedgerEntry, Direction, GoalProgress, GoalType, ProfileSnapshot};

const MAX_PERCENT: f64 = 150.0;
/// Within this distance of the target a maintenance goal counts as met.
const MAINTAIN_TOLERANCE_KG: f64 = 1.0;
/// Edge of the maintenance band; at or beyond it progress is 0%.
const MAINTAIN_BAND_KG: f64 = 5.0;
/// Projections further out than this are not reported.
const MAX_PROJECTION_DAYS: f64 = 3650.0;

fn round_tenth(kg: f64) -> f64 {
    (kg * 10.0).round() / 10.0
}

fn maintenance_percent(current: f64, target: f64) -> f64 {
    let distance = (current - target).abs();
    if distance <= MAINTAIN_TOLERANCE_KG {
        100.0
    } else if distance >= MAINTAIN_BAND_KG {
        0.0
    } else {
        100.0 * (MAINTAIN_BAND_KG - distance) / (MAINTAIN_BAND_KG - MAINTAIN_TOLERANCE_KG)
    }
}

/// Least-squares slope of weight over time, in kg per day, with the date of
/// the last weigh-in. Needs weigh-ins on at least two distinct dates.
#[allow(clippy::cast_precision_loss)]
fn weight_trend(entries: &[DailyLedgerEntry]) -> Option<(f64, NaiveDate)> {
    let points: Vec<(NaiveDate, f64)> = entries
        .iter()
        .filter_map(|e| e.weight_kg.map(|kg| (e.date, kg)))
        .collect();
    let first = points.iter().map(|(d, _)| *d).min()?;
    let last = points.iter().map(|(d, _)| *d).max()?;
    if first == last {
        return None;
    }

    let n = points.len() as f64;
    let xs: Vec<f64> = points
        .iter()
        .map(|(d, _)| (*d - first).num_days() as f64)
        .collect();
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, kg)| kg).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var = 0.0;
    for (x, (_, y)) in xs.iter().zip(&points) {
        cov += (x - mean_x) * (y - mean_y);
        var += (x - mean_x) * (x - mean_x);
    }
    if var <= 0.0 {
        return None;
    }
    Some((cov / var, last))
}

fn project(
    slope_per_day: f64,
    last_weigh_in: NaiveDate,
    current: f64,
    target: f64,
) -> Option<NaiveDate> {
    let gap = target - current;
    if gap.abs() < f64::EPSILON
        || slope_per_day.abs() < f64::EPSILON
        || gap.signum() != slope_per_day.signum()
    {
        return None;
    }
    // slack keeps an exact whole-day quotient from rounding up a day
    let days = (gap / slope_per_day - 1e-9).ceil();
    if !days.is_finite() || days > MAX_PROJECTION_DAYS {
        return None;
    }
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let days = days as u64;
    last_weigh_in.checked_add_days(Days::new(days))
}

/// Progress toward the profile's target weight, from ascending ledger
/// entries.
///
/// The start weight is the profile's weight (the baseline when the goal was
/// set), not the first ledger entry. The current weight is the latest logged
/// weight, falling back to the profile when nothing has been logged.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn compute(entries: &[DailyLedgerEntry], profile: &ProfileSnapshot) -> GoalProgress {
    let start = profile.current_weight_kg;
    let target = profile.target_weight_kg;
    let current = entries
        .iter()
        .filter(|e| e.weight_kg.is_some())
        .max_by_key(|e| e.date)
        .and_then(|e| e.weight_kg)
        .unwrap_or(start);

    let (start_r, target_r) = (round_tenth(start), round_tenth(target));
    let mut direction = if target_r < start_r {
        Direction::Losing
    } else if target_r > start_r {
        Direction::Gaining
    } else {
        Direction::Maintaining
    };

    let mut degenerate_goal = false;
    let percent_complete = match direction {
        Direction::Maintaining if profile.goal_type != GoalType::Maintain => {
            direction = if profile.goal_type == GoalType::Lose {
                Direction::Losing
            } else {
                Direction::Gaining
            };
            degenerate_goal = true;
            100.0
        }
        Direction::Maintaining => maintenance_percent(current, target),
        Direction::Losing | Direction::Gaining => {
            let denominator = start - target;
            if denominator == 0.0 {
                degenerate_goal = true;
                100.0
            } else {
                ((start - current) / denominator * 100.0).clamp(0.0, MAX_PERCENT)
            }
        }
    };

    if degenerate_goal {
        tracing::warn!(
            user_id = %profile.user_id,
            start,
            target,
            goal_type = ?profile.goal_type,
            "goal type contradicts start and target weight; reporting 100%"
        );
    }

    let remaining_kg = match direction {
        Direction::Losing => (current - target).max(0.0),
        Direction::Gaining => (target - current).max(0.0),
        Direction::Maintaining => (current - target).abs(),
    };

    let trend = weight_trend(entries);
    let projected_completion = match (direction, trend) {
        (Direction::Losing | Direction::Gaining, Some((slope, last)))
            if !degenerate_goal && remaining_kg > 0.0 =>
        {
            project(slope, last, current, target)
        }
        _ => None,
    };

    GoalProgress {
        percent_complete,
        start_weight: start,
        current_weight: current,
        target_weight: target,
        direction,
        remaining_kg,
        trend_kg_per_week: trend.map(|(slope, _)| slope * 7.0),
        projected_completion,
        degenerate_goal,
    }
}
