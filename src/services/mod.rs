pub mod alert_settings_service;
pub mod cost_basis;
pub mod portfolio_service;
pub mod price_service;
pub mod report_service;

pub use alert_settings_service::AlertSettingsService;
pub use portfolio_service::{ PortfolioService, Trade };
pub use price_service::{ CoinGeckoPriceSource, PriceSource };
pub use report_service::{ HoldingReport, PortfolioReport, ReportService };
