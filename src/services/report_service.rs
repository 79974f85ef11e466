use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::{ Decimal, RoundingStrategy };
use serde::Serialize;
use uuid::Uuid;

use crate::db::HoldingsRepository;
use crate::error::{ AppError, Result };
use crate::models::Holding;
use crate::services::price_service::PriceSource;

pub const REPORT_DP: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HoldingReport {
    pub coin_id: String,
    pub quantity: Decimal,
    pub average_price: Decimal,
    pub current_price: Decimal,
    pub value: Decimal,
    pub cost: Decimal,
    pub price_change: Decimal,
    pub price_change_percent: Decimal,
    pub price_change_value: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PortfolioTotals {
    pub total_value: Decimal,
    pub total_cost: Decimal,
    pub total_change_percent: Decimal,
    pub total_change_value: Decimal,
}

/// Valuation of a portfolio at current market prices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PortfolioReport {
    pub portfolio_id: Uuid,
    pub holdings: Vec<HoldingReport>,
    /// Coins left out because their price could not be fetched.
    pub skipped: Vec<String>,
    pub totals: PortfolioTotals,
}

impl PortfolioReport {
    pub fn is_empty(&self) -> bool {
        self.holdings.is_empty() && self.skipped.is_empty()
    }
}

#[derive(Clone)]
pub struct ReportService {
    repo: Arc<dyn HoldingsRepository>,
    prices: Arc<dyn PriceSource>,
}

impl ReportService {
    pub fn new(repo: Arc<dyn HoldingsRepository>, prices: Arc<dyn PriceSource>) -> Self {
        Self { repo, prices }
    }

    pub async fn build_report(&self, portfolio_id: Uuid) -> Result<PortfolioReport> {
        let holdings = self.repo.list_holdings(portfolio_id).await?;

        let mut report = PortfolioReport {
            portfolio_id,
            ..Default::default()
        };
        let mut prices: HashMap<String, Decimal> = HashMap::new();

        for holding in &holdings {
            let price = match prices.get(&holding.coin_id) {
                Some(price) => *price,
                None => {
                    match self.prices.current_price(&holding.coin_id).await {
                        Ok(price) => {
                            prices.insert(holding.coin_id.clone(), price);
                            price
                        }
                        Err(e) => {
                            tracing::warn!(
                                "Skipping {} in report for portfolio {}: {}",
                                holding.coin_id,
                                portfolio_id,
                                e
                            );
                            report.skipped.push(holding.coin_id.clone());
                            continue;
                        }
                    }
                }
            };

            report.holdings.push(value_holding(holding, price)?);
        }

        report.totals = totals(&report.holdings)?;
        Ok(report)
    }
}

fn truncate(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(REPORT_DP, RoundingStrategy::ToZero)
}

fn mul(a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_mul(b).ok_or_else(|| AppError::Internal(format!("overflow computing {} * {}", a, b)))
}

/// `part / whole * 100`, or zero for a zero base.
fn percent_of(part: Decimal, whole: Decimal) -> Result<Decimal> {
    if whole.is_zero() {
        return Ok(Decimal::ZERO);
    }
    let ratio = part
        .checked_div(whole)
        .ok_or_else(|| AppError::Internal(format!("overflow computing {} / {}", part, whole)))?;
    mul(ratio, Decimal::ONE_HUNDRED)
}

/// Figures are derived from exact inputs and truncated to cents at the end.
/// `price_change_percent` and `price_change_value` both build on the truncated
/// per-unit change, so the three figures agree with each other.
pub fn value_holding(holding: &Holding, current_price: Decimal) -> Result<HoldingReport> {
    let q = holding.quantity;
    let avg = holding.average_price;
    let price_change = truncate(current_price - avg);

    Ok(HoldingReport {
        coin_id: holding.coin_id.clone(),
        quantity: q,
        average_price: avg,
        current_price,
        value: truncate(mul(q, current_price)?),
        cost: truncate(mul(q, avg)?),
        price_change,
        price_change_percent: truncate(percent_of(price_change, avg)?),
        price_change_value: truncate(mul(price_change, q)?),
    })
}

fn totals(holdings: &[HoldingReport]) -> Result<PortfolioTotals> {
    let total_value: Decimal = holdings.iter().map(|h| h.value).sum();
    let total_cost: Decimal = holdings.iter().map(|h| h.cost).sum();
    let total_change_value = total_value - total_cost;

    Ok(PortfolioTotals {
        total_value,
        total_cost,
        total_change_percent: truncate(percent_of(total_change_value, total_cost)?),
        total_change_value,
    })
}
