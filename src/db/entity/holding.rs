use sea_orm::entity::prelude::*;
use serde::{ Deserialize, Serialize };

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "holdings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub portfolio_id: Uuid,
    pub coin_id: String,
    pub quantity: Decimal,
    pub average_price: Decimal,
    pub current_price: Option<Decimal>,
    pub last_checked_price: Option<Decimal>,
    pub version: i64,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::portfolio::Entity",
        from = "Column::PortfolioId",
        to = "super::portfolio::Column::Id"
    )]
    Portfolio,
}

impl Related<super::portfolio::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Portfolio.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for crate::models::Holding {
    fn from(m: Model) -> Self {
        Self {
            id: m.id,
            portfolio_id: m.portfolio_id,
            coin_id: m.coin_id,
            quantity: m.quantity,
            average_price: m.average_price,
            current_price: m.current_price,
            last_checked_price: m.last_checked_price,
            version: m.version,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}
