use std::collections::BTreeMap;

use axum::{ extract::{ Path, State }, Json };
use rust_decimal::Decimal;
use serde::{ Deserialize, Serialize };

use crate::enums::TimeWindow;
use crate::error::Result;
use crate::models::AlertThresholdConfig;

use super::AppState;

#[derive(Deserialize)]
pub struct UpdateThresholdRequest {
    pub window: String,
    /// Omitted or null removes the threshold.
    #[serde(default)]
    pub percent: Option<Decimal>,
}

#[derive(Serialize)]
pub struct ThresholdsResponse {
    pub user_id: String,
    /// Keyed by window (`1m`, `5m`, ...). Unset windows are absent.
    pub thresholds: BTreeMap<String, Decimal>,
}

impl ThresholdsResponse {
    fn new(user_id: String, config: &AlertThresholdConfig) -> Self {
        let thresholds = config
            .configured()
            .map(|(window, percent)| (window.as_str().to_string(), percent))
            .collect();
        Self { user_id, thresholds }
    }
}

pub async fn get_thresholds(
    State(state): State<AppState>,
    Path(user_id): Path<String>
) -> Result<Json<ThresholdsResponse>> {
    let config = state.alert_settings_service.get_thresholds(&user_id).await?;

    Ok(Json(ThresholdsResponse::new(user_id, &config)))
}

pub async fn update_threshold(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(request): Json<UpdateThresholdRequest>
) -> Result<Json<ThresholdsResponse>> {
    let window: TimeWindow = request.window.parse()?;

    match request.percent {
        Some(percent) => state.alert_settings_service.set_threshold(&user_id, window, percent).await?,
        None => state.alert_settings_service.clear_threshold(&user_id, window).await?,
    }

    let config = state.alert_settings_service.get_thresholds(&user_id).await?;
    Ok(Json(ThresholdsResponse::new(user_id, &config)))
}
