mod day;
mod goal;
mod helpers;
mod log;
mod progress;
mod report;

pub(crate) use day::cmd_day;
pub(crate) use goal::{ProfileArgs, cmd_goal_set, cmd_goal_show, cmd_goal_water};
pub(crate) use log::{FoodArgs, cmd_log_exercise, cmd_log_food, cmd_log_water, cmd_log_weight};
pub(crate) use progress::cmd_progress;
pub(crate) use report::cmd_report;
