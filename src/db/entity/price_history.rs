use sea_orm::entity::prelude::*;
use serde::{ Deserialize, Serialize };

use crate::enums::HistorySource;
use crate::error::AppError;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "price_history")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub holding_id: Uuid,
    pub portfolio_id: Uuid,
    pub coin_id: String,
    pub price: Decimal,
    pub source: String, // "buy", "sell", "refresh"
    pub timestamp: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for crate::models::PriceHistoryEntry {
    type Error = AppError;

    fn try_from(m: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: m.id,
            holding_id: m.holding_id,
            portfolio_id: m.portfolio_id,
            coin_id: m.coin_id,
            price: m.price,
            source: m.source.parse::<HistorySource>()?,
            timestamp: m.timestamp,
        })
    }
}
