use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Append-only record of a completed sale; created exactly once per verified
/// checkout-completed event. `stripe_session_id` carries a unique index and
/// doubles as the idempotency key for redelivered events.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = Transaction)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Uuid")]
    pub id: Uuid,

    #[sea_orm(column_type = "Uuid")]
    pub listing_id: Uuid,

    pub buyer_id: String,
    pub buyer_email: String,
    pub seller_id: String,

    /// Amount in major units, taken from the verified event rather than
    /// recomputed from the listing.
    pub amount: Decimal,
    pub currency: String,

    pub stripe_session_id: String,
    pub stripe_payment_intent_id: Option<String>,

    pub shipping_name: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub shipping_address: Option<String>,
    pub shipping_cost: Option<Decimal>,

    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::listing::Entity",
        from = "Column::ListingId",
        to = "super::listing::Column::Id"
    )]
    Listing,
}

impl Related<super::listing::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Listing.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
