pub mod config;
pub mod db;
pub mod energy;
pub mod error;
pub mod ledger;
pub mod models;
pub mod progress;
pub mod rollup;
pub mod service;
pub mod store;
pub mod units;

pub use error::{CoreError, Result};
