pub mod portfolio;
pub mod holding;
pub mod price_history;
pub mod alert_threshold;

pub use portfolio::Entity as Portfolio;
pub use holding::Entity as Holding;
pub use price_history::Entity as PriceHistory;
pub use alert_threshold::Entity as AlertThreshold;
