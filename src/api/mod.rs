use std::sync::Arc;

use axum::{ Router, routing::get };
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod portfolio;
pub mod thresholds;

use crate::services::{ AlertSettingsService, PortfolioService, ReportService };

#[derive(Clone)]
pub struct AppState {
    pub portfolio_service: Arc<PortfolioService>,
    pub report_service: Arc<ReportService>,
    pub alert_settings_service: Arc<AlertSettingsService>,
}

impl AppState {
    pub fn new(
        portfolio_service: Arc<PortfolioService>,
        report_service: Arc<ReportService>,
        alert_settings_service: Arc<AlertSettingsService>
    ) -> Self {
        Self {
            portfolio_service,
            report_service,
            alert_settings_service,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/portfolios/{user_id}/report", get(portfolio::get_report))
        .route("/api/portfolios/{user_id}/holdings", get(portfolio::list_holdings))
        .route("/api/portfolios/{user_id}/holdings/{coin_id}/history", get(portfolio::get_history))
        .route(
            "/api/users/{user_id}/thresholds",
            get(thresholds::get_thresholds).put(thresholds::update_threshold)
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn health_check() -> &'static str {
    "OK"
}
