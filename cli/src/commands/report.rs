use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use fitledger_core::db::SqliteStore;
use fitledger_core::models::{Window, WindowSummary};
use fitledger_core::service::{Clock, Tracker};

use super::helpers::{no_neg_zero, parse_date, print_json};

#[derive(Tabled)]
struct ReportRow {
    #[tabled(rename = "Period")]
    label: String,
    #[tabled(rename = "Days")]
    days: String,
    #[tabled(rename = "Avg kcal")]
    calories: String,
    #[tabled(rename = "Avg burned")]
    burned: String,
    #[tabled(rename = "Avg net")]
    net: String,
    #[tabled(rename = "Protein")]
    protein: String,
    #[tabled(rename = "Carbs")]
    carbs: String,
    #[tabled(rename = "Fat")]
    fat: String,
    #[tabled(rename = "Water")]
    water: String,
    #[tabled(rename = "Weight")]
    weight: String,
}

fn row(s: &WindowSummary) -> ReportRow {
    ReportRow {
        label: s.label.clone(),
        days: format!("{}/{}", s.days_logged, s.days),
        calories: format!("{:.0}", no_neg_zero(s.calories_consumed.avg)),
        burned: format!("{:.0}", no_neg_zero(s.calories_burned.avg)),
        net: format!("{:.0}", no_neg_zero(s.net_calories.avg)),
        protein: format!("{:.0}g", no_neg_zero(s.protein_g.avg)),
        carbs: format!("{:.0}g", no_neg_zero(s.carb_g.avg)),
        fat: format!("{:.0}g", no_neg_zero(s.fat_g.avg)),
        water: format!("{:.1}", no_neg_zero(s.water_units.avg)),
        weight: s
            .weight_kg
            .map_or("-".into(), |w| format!("{:.1} kg", w.avg)),
    }
}

pub(crate) fn cmd_report(
    app: &Tracker<SqliteStore, impl Clock>,
    user_id: &str,
    window: &str,
    count: Option<u32>,
    anchor: Option<String>,
    json: bool,
) -> Result<()> {
    let window: Window = window.parse()?;
    let count = count.unwrap_or_else(|| window.default_count());
    let summaries = match anchor {
        Some(a) => app.summarize_at(user_id, window, count, parse_date(Some(a))?)?,
        None => app.summarize(user_id, window, count)?,
    };

    if json {
        return print_json(&summaries);
    }
    if summaries.iter().all(|s| s.days_logged == 0) {
        eprintln!("Nothing logged in this range");
        return Ok(());
    }

    let rows: Vec<ReportRow> = summaries.iter().map(row).collect();
    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}
