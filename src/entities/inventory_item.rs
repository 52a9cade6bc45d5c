use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An ingredient tracked by the stock ledger.
///
/// `quantity` is the authoritative on-hand amount; it is only mutated through
/// the inventory service (staff edits, settlement deductions, reversal
/// restores) and never allowed below zero.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub quantity: Decimal,
    pub category: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::recipe_line::Entity")]
    RecipeLines,
}

impl Related<super::recipe_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RecipeLines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
