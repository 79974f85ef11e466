pub mod config;
pub mod enums;
pub mod error;
pub mod models;
pub mod db;
pub mod services;
pub mod notifier;
pub mod price_refresher;
pub mod alert_checker;
pub mod api;
pub mod bot;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use enums::{ AlertDirection, HistorySource, TimeWindow };
pub use error::{ AppError, Result };
