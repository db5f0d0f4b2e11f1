mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process;
use tracing_subscriber::EnvFilter;

use crate::commands::{
    FoodArgs, ProfileArgs, cmd_day, cmd_goal_set, cmd_goal_show, cmd_goal_water,
    cmd_log_exercise, cmd_log_food, cmd_log_water, cmd_log_weight, cmd_progress, cmd_report,
};
use crate::config::Config;
use fitledger_core::db::SqliteStore;
use fitledger_core::service::{SystemClock, Tracker};

#[derive(Parser)]
#[command(
    name = "fitledger",
    version,
    about = "A local-first health tracker: energy targets, daily ledger and progress"
)]
struct Cli {
    /// User to act as (default: `default_user` from config.json)
    #[arg(long, global = true)]
    user: Option<String>,
    /// Log debug output to stderr (FITLEDGER_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the profile and nutrition goal
    Goal {
        #[command(subcommand)]
        command: GoalCommands,
    },
    /// Log food, exercise, water or weight
    Log {
        #[command(subcommand)]
        command: LogCommands,
    },
    /// Show one day's ledger (defaults to today)
    Day {
        /// Date to show (YYYY-MM-DD, today/yesterday/tomorrow)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show progress toward the target weight
    Progress {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Averages over recent days, weeks, months or quarters
    Report {
        /// Window: day, week, month, quarter
        #[arg(short, long, default_value = "week")]
        window: String,
        /// Number of periods, including the current one
        #[arg(short, long)]
        count: Option<u32>,
        /// Last day covered (YYYY-MM-DD, default: today)
        #[arg(long)]
        anchor: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum GoalCommands {
    /// Save the profile and recompute the goal
    Set {
        /// Sex: male, female, other
        #[arg(long)]
        sex: String,
        /// Age in years
        #[arg(long)]
        age: u32,
        /// Height in cm
        #[arg(long)]
        height: f64,
        /// Current weight
        #[arg(long)]
        weight: f64,
        /// Target weight
        #[arg(long)]
        target: f64,
        /// Unit for --weight and --target: kg or lbs
        #[arg(long, default_value = "kg")]
        weight_unit: String,
        /// Activity: sedentary, light, moderate, active, very-active
        #[arg(long, default_value = "moderate")]
        activity: String,
        /// Goal: lose, gain, maintain (default: from weight and target)
        #[arg(long)]
        goal: Option<String>,
        /// Strength training (raises the protein target)
        #[arg(long)]
        strength: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the current goal
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the recommended daily water intake
    Water {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum LogCommands {
    /// Log calories and macros eaten
    Food {
        /// Calories (kcal)
        #[arg(long)]
        calories: i64,
        /// Protein (g)
        #[arg(short, long, default_value = "0")]
        protein: f64,
        /// Carbs (g)
        #[arg(short, long, default_value = "0")]
        carbs: f64,
        /// Fat (g)
        #[arg(short, long, default_value = "0")]
        fat: f64,
        /// Serving eaten (e.g. "150g", "2 tbsp"); the values above are then per 100 g
        #[arg(short, long)]
        serving: Option<String>,
        /// Subtract instead of add
        #[arg(long)]
        remove: bool,
        /// Date to log for (YYYY-MM-DD, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Log calories burned
    Exercise {
        /// Calories burned (kcal)
        #[arg(long)]
        calories: i64,
        /// Subtract instead of add
        #[arg(long)]
        remove: bool,
        /// Date to log for (YYYY-MM-DD, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Log water, as units or a volume (default: one unit)
    Water {
        /// Number of water units
        #[arg(short, long)]
        units: Option<i64>,
        /// Volume (e.g. "500ml", "0.5 l", "16 fl oz"), rounded up to whole units
        #[arg(long)]
        volume: Option<String>,
        /// Subtract instead of add
        #[arg(long)]
        remove: bool,
        /// Date to log for (YYYY-MM-DD, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Log body weight
    Weight {
        /// Weight value (omit with --remove)
        value: Option<f64>,
        /// Unit: kg or lbs
        #[arg(short, long, default_value = "kg")]
        unit: String,
        /// Clear the day's weight
        #[arg(long)]
        remove: bool,
        /// Date to log for (YYYY-MM-DD, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_env("FITLEDGER_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let store = SqliteStore::open(&config.db_path)?;
    let app = Tracker::new(store, SystemClock, config.tracker)?;
    let user = cli.user.unwrap_or(config.default_user);
    tracing::debug!(db = %config.db_path.display(), user = %user, "opened store");

    match cli.command {
        Commands::Goal { command } => match command {
            GoalCommands::Set {
                sex,
                age,
                height,
                weight,
                target,
                weight_unit,
                activity,
                goal,
                strength,
                json,
            } => {
                let args = ProfileArgs {
                    sex,
                    age,
                    height_cm: height,
                    weight,
                    weight_unit,
                    target,
                    activity,
                    goal,
                    strength,
                };
                cmd_goal_set(&app, &user, &args, json)
            }
            GoalCommands::Show { json } => cmd_goal_show(&app, &user, json),
            GoalCommands::Water { json } => cmd_goal_water(&app, &user, json),
        },
        Commands::Log { command } => match command {
            LogCommands::Food {
                calories,
                protein,
                carbs,
                fat,
                serving,
                remove,
                date,
                json,
            } => {
                let food = FoodArgs {
                    calories,
                    protein,
                    carbs,
                    fat,
                    serving,
                };
                cmd_log_food(&app, &user, &food, remove, date, json)
            }
            LogCommands::Exercise {
                calories,
                remove,
                date,
                json,
            } => cmd_log_exercise(&app, &user, calories, remove, date, json),
            LogCommands::Water {
                units,
                volume,
                remove,
                date,
                json,
            } => cmd_log_water(&app, &user, units, volume.as_deref(), remove, date, json),
            LogCommands::Weight {
                value,
                unit,
                remove,
                date,
                json,
            } => cmd_log_weight(&app, &user, value, &unit, remove, date, json),
        },
        Commands::Day { date, json } => cmd_day(&app, &user, date, json),
        Commands::Progress { json } => cmd_progress(&app, &user, json),
        Commands::Report {
            window,
            count,
            anchor,
            json,
        } => cmd_report(&app, &user, &window, count, anchor, json),
    }
}
