use chrono::{Datelike, Days, Months, NaiveDate};

use crate::error::{CoreError, Result};
use crate::models::{DailyLedgerEntry, MetricStats, WeightStats, Window, WindowSummary};

/// Upper bound on `count` for any window; ten years of days.
pub const MAX_PERIODS: u32 = 3660;

fn check_count(count: u32) -> Result<()> {
    if count > MAX_PERIODS {
        return Err(CoreError::InvalidConfig(format!(
            "report count must be at most {MAX_PERIODS} (got {count})"
        )));
    }
    Ok(())
}

/// First day of the period containing `date`.
#[must_use]
pub fn period_start(window: Window, date: NaiveDate) -> NaiveDate {
    match window {
        Window::Day => date,
        Window::Week => date - Days::new(u64::from(date.weekday().num_days_from_monday())),
        Window::Month => date.with_day(1).unwrap_or(date),
        Window::Quarter => {
            let month = (date.month0() / 3) * 3 + 1;
            NaiveDate::from_ymd_opt(date.year(), month, 1).unwrap_or(date)
        }
    }
}

fn step(window: Window) -> Months {
    match window {
        Window::Quarter => Months::new(3),
        _ => Months::new(1),
    }
}

fn previous_start(window: Window, start: NaiveDate) -> Option<NaiveDate> {
    match window {
        Window::Day => start.pred_opt(),
        Window::Week => start.checked_sub_days(Days::new(7)),
        Window::Month | Window::Quarter => start.checked_sub_months(step(window)),
    }
}

/// Last day of the full period starting at `start`.
fn period_end(window: Window, start: NaiveDate) -> NaiveDate {
    let next = match window {
        Window::Day => start.succ_opt(),
        Window::Week => start.checked_add_days(Days::new(7)),
        Window::Month | Window::Quarter => start.checked_add_months(step(window)),
    };
    next.and_then(|d| d.pred_opt()).unwrap_or(NaiveDate::MAX)
}

fn label(window: Window, start: NaiveDate) -> String {
    match window {
        Window::Day => start.format("%Y-%m-%d").to_string(),
        Window::Week => {
            let week = start.iso_week();
            format!("{}-W{:02}", week.year(), week.week())
        }
        Window::Month => start.format("%Y-%m").to_string(),
        Window::Quarter => format!("{}-Q{}", start.year(), start.month0() / 3 + 1),
    }
}

/// Start dates of the last `count` periods ending with the one holding
/// `anchor`, ascending.
fn period_starts(window: Window, anchor: NaiveDate, count: u32) -> Vec<NaiveDate> {
    let mut starts = Vec::new();
    let mut start = period_start(window, anchor);
    for _ in 0..count {
        starts.push(start);
        match previous_start(window, start) {
            Some(prev) => start = prev,
            None => break,
        }
    }
    starts.reverse();
    starts
}

/// Date range covered by `summarize` for the same arguments, for querying
/// the store. `None` when `count` is zero.
pub fn span(
    window: Window,
    anchor: NaiveDate,
    count: u32,
) -> Result<Option<(NaiveDate, NaiveDate)>> {
    check_count(count)?;
    Ok(period_starts(window, anchor, count)
        .first()
        .map(|&start| (start, anchor)))
}

fn metric(values: &[f64], days: u32) -> MetricStats {
    let sum: f64 = values.iter().sum();
    // unlogged days count as zero
    let floor = if values.len() < days as usize {
        0.0
    } else {
        f64::NEG_INFINITY
    };
    MetricStats {
        sum,
        avg: sum / f64::from(days.max(1)),
        max: values.iter().copied().fold(floor, f64::max),
    }
}

fn weight_stats(entries: &[&DailyLedgerEntry]) -> Option<WeightStats> {
    let weighed: Vec<(NaiveDate, f64)> = entries
        .iter()
        .filter_map(|e| e.weight_kg.map(|kg| (e.date, kg)))
        .collect();
    let (_, last) = *weighed.iter().max_by_key(|(date, _)| *date)?;

    #[allow(clippy::cast_precision_loss)]
    let avg = weighed.iter().map(|(_, kg)| kg).sum::<f64>() / weighed.len() as f64;
    Some(WeightStats {
        avg,
        min: weighed.iter().map(|(_, kg)| *kg).fold(f64::INFINITY, f64::min),
        max: weighed.iter().map(|(_, kg)| *kg).fold(f64::NEG_INFINITY, f64::max),
        last,
    })
}

#[allow(clippy::cast_precision_loss)]
fn summarize_period(
    entries: &[DailyLedgerEntry],
    window: Window,
    start: NaiveDate,
    end: NaiveDate,
    is_current: bool,
) -> WindowSummary {
    let in_period: Vec<&DailyLedgerEntry> = entries
        .iter()
        .filter(|e| e.date >= start && e.date <= end)
        .collect();
    let days = u32::try_from((end - start).num_days() + 1).unwrap_or(u32::MAX);
    let column = |f: fn(&DailyLedgerEntry) -> f64| -> MetricStats {
        let values: Vec<f64> = in_period.iter().map(|e| f(e)).collect();
        metric(&values, days)
    };

    WindowSummary {
        period_start: start,
        period_end: end,
        label: if is_current {
            window.current_label().to_string()
        } else {
            label(window, start)
        },
        is_current,
        days,
        days_logged: u32::try_from(in_period.len()).unwrap_or(u32::MAX),
        calories_consumed: column(|e| e.calories_consumed as f64),
        calories_burned: column(|e| e.calories_burned as f64),
        net_calories: column(|e| e.net_calories() as f64),
        protein_g: column(|e| e.protein_g),
        carb_g: column(|e| e.carb_g),
        fat_g: column(|e| e.fat_g),
        water_units: column(|e| e.water_units as f64),
        weight_kg: weight_stats(&in_period),
    }
}

/// Summaries for the last `count` periods of `window` ending with the one
/// holding `anchor`, ascending by start date.
///
/// Weeks follow ISO 8601 (Monday start); quarters start in January, April,
/// July and October. The last element is the current period, clipped at
/// `anchor` so days that have not happened yet never dilute an average.
/// Entries outside the covered range are ignored. A `count` above
/// [`MAX_PERIODS`] is rejected.
pub fn summarize(
    entries: &[DailyLedgerEntry],
    window: Window,
    anchor: NaiveDate,
    count: u32,
) -> Result<Vec<WindowSummary>> {
    check_count(count)?;
    let current = period_start(window, anchor);
    Ok(period_starts(window, anchor, count)
        .into_iter()
        .map(|start| {
            let is_current = start == current;
            let end = if is_current {
                anchor
            } else {
                period_end(window, start)
            };
            summarize_period(entries, window, start, end, is_current)
        })
        .collect())
}
