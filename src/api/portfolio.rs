use axum::{ extract::{ Path, State }, Json };

use crate::error::Result;
use crate::models::{ Holding, PriceHistoryEntry };
use crate::services::PortfolioReport;

use super::AppState;

pub async fn get_report(
    State(state): State<AppState>,
    Path(user_id): Path<String>
) -> Result<Json<PortfolioReport>> {
    let portfolio = state.portfolio_service.open(&user_id).await?;
    let report = state.report_service.build_report(portfolio.id).await?;

    Ok(Json(report))
}

pub async fn list_holdings(
    State(state): State<AppState>,
    Path(user_id): Path<String>
) -> Result<Json<Vec<Holding>>> {
    let portfolio = state.portfolio_service.open(&user_id).await?;
    let holdings = state.portfolio_service.holdings(portfolio.id).await?;

    Ok(Json(holdings))
}

pub async fn get_history(
    State(state): State<AppState>,
    Path((user_id, coin_id)): Path<(String, String)>
) -> Result<Json<Vec<PriceHistoryEntry>>> {
    let portfolio = state.portfolio_service.open(&user_id).await?;
    let history = state.portfolio_service.history(portfolio.id, &coin_id).await?;

    Ok(Json(history))
}
