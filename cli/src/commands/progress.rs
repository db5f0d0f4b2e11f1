use anyhow::Result;

use fitledger_core::db::SqliteStore;
use fitledger_core::models::{Direction, GoalProgress};
use fitledger_core::service::{Clock, Tracker};

use super::helpers::{print_json, require_profile};

const BAR_WIDTH: usize = 30;

#[allow(clippy::cast_precision_loss, clippy::cast_sign_loss)]
fn bar(percent: f64) -> String {
    let filled = ((percent.clamp(0.0, 100.0) / 100.0) * BAR_WIDTH as f64).round() as usize;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled))
}

fn describe(p: &GoalProgress) -> &'static str {
    match p.direction {
        Direction::Losing => "losing",
        Direction::Gaining => "gaining",
        Direction::Maintaining => "maintaining",
    }
}

pub(crate) fn cmd_progress(
    app: &Tracker<SqliteStore, impl Clock>,
    user_id: &str,
    json: bool,
) -> Result<()> {
    let profile = require_profile(app, user_id)?;
    let progress = app.progress(&profile)?;

    if json {
        return print_json(&progress);
    }

    println!(
        "{} {:.0}% ({})",
        bar(progress.percent_complete),
        progress.percent_complete,
        describe(&progress)
    );
    println!(
        "  Start {:.1} kg → now {:.1} kg → target {:.1} kg ({:.1} kg to go)",
        progress.start_weight, progress.current_weight, progress.target_weight, progress.remaining_kg
    );
    if let Some(trend) = progress.trend_kg_per_week {
        println!("  Trend: {trend:+.2} kg/week");
    }
    if let Some(date) = progress.projected_completion {
        println!("  Projected: {}", date.format("%Y-%m-%d"));
    }
    if progress.degenerate_goal {
        eprintln!(
            "Note: target weight equals start weight; run `fitledger goal set` with a new target."
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar() {
        assert_eq!(bar(0.0), format!("[{}]", "-".repeat(BAR_WIDTH)));
        assert_eq!(bar(150.0), format!("[{}]", "#".repeat(BAR_WIDTH)));
        assert_eq!(bar(50.0).matches('#').count(), BAR_WIDTH / 2);
    }
}
