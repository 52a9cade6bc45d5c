use crate::{
    entities::{menu_item, recipe_line, InventoryItem, MenuItem, RecipeLine},
    errors::ServiceError,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

/// Menu management plus the recipe index: which ingredients a menu item
/// consumes and at what rate.
#[derive(Clone)]
pub struct MenuService {
    db: Arc<DatabaseConnection>,
}

impl MenuService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Creates a menu item together with its recipe lines.
    ///
    /// A menu item must consume at least one ingredient; every referenced
    /// inventory item must exist and every per-unit quantity must be
    /// positive.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_item(
        &self,
        input: CreateMenuItemInput,
    ) -> Result<MenuItemWithRecipe, ServiceError> {
        input.validate()?;
        validate_recipe(&input.price, &input.recipe)?;

        let txn = self.db.begin().await?;
        verify_ingredients_exist(&txn, &input.recipe).await?;

        let now = Utc::now();
        let item = menu_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            price: Set(input.price),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let item = item.insert(&txn).await?;

        let lines = insert_recipe_lines(&txn, item.id, &input.recipe).await?;
        txn.commit().await?;

        info!(menu_item_id = %item.id, "Created menu item");
        Ok(MenuItemWithRecipe {
            item,
            recipe: lines,
        })
    }

    /// Updates the menu item and replaces its recipe wholesale, the way the
    /// editing flow submits it.
    #[instrument(skip(self, input))]
    pub async fn update_item(
        &self,
        id: Uuid,
        input: CreateMenuItemInput,
    ) -> Result<MenuItemWithRecipe, ServiceError> {
        input.validate()?;
        validate_recipe(&input.price, &input.recipe)?;

        let txn = self.db.begin().await?;

        let item = MenuItem::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Menu item {} not found", id)))?;

        verify_ingredients_exist(&txn, &input.recipe).await?;

        let mut item: menu_item::ActiveModel = item.into();
        item.name = Set(input.name);
        item.price = Set(input.price);
        item.updated_at = Set(Utc::now());
        let item = item.update(&txn).await?;

        RecipeLine::delete_many()
            .filter(recipe_line::Column::MenuItemId.eq(id))
            .exec(&txn)
            .await?;
        let lines = insert_recipe_lines(&txn, id, &input.recipe).await?;

        txn.commit().await?;
        Ok(MenuItemWithRecipe {
            item,
            recipe: lines,
        })
    }

    pub async fn get_item(&self, id: Uuid) -> Result<MenuItemWithRecipe, ServiceError> {
        let item = MenuItem::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Menu item {} not found", id)))?;

        let recipe = RecipeLine::find()
            .filter(recipe_line::Column::MenuItemId.eq(id))
            .all(&*self.db)
            .await?;

        Ok(MenuItemWithRecipe { item, recipe })
    }

    /// Lists menu items ordered by name with their recipes attached.
    pub async fn list_items(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<MenuItemWithRecipe>, u64), ServiceError> {
        let paginator = MenuItem::find()
            .order_by_asc(menu_item::Column::Name)
            .paginate(&*self.db, per_page);

        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;

        let mut index = recipe_index(&*self.db).await?;
        let merged = items
            .into_iter()
            .map(|item| {
                let recipe = index.remove(&item.id).unwrap_or_default();
                MenuItemWithRecipe { item, recipe }
            })
            .collect();

        Ok((merged, total))
    }

    /// Deletes a menu item; its recipe lines go with it.
    #[instrument(skip(self))]
    pub async fn delete_item(&self, id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        RecipeLine::delete_many()
            .filter(recipe_line::Column::MenuItemId.eq(id))
            .exec(&txn)
            .await?;
        let result = MenuItem::delete_by_id(id).exec(&txn).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!("Menu item {} not found", id)));
        }

        txn.commit().await?;
        info!(menu_item_id = %id, "Deleted menu item");
        Ok(())
    }
}

/// All recipe lines grouped by menu item id.
pub async fn recipe_index<C: ConnectionTrait>(
    conn: &C,
) -> Result<HashMap<Uuid, Vec<recipe_line::Model>>, ServiceError> {
    let lines = RecipeLine::find().all(conn).await?;
    let mut index: HashMap<Uuid, Vec<recipe_line::Model>> = HashMap::new();
    for line in lines {
        index.entry(line.menu_item_id).or_default().push(line);
    }
    Ok(index)
}

fn validate_recipe(price: &Decimal, recipe: &[RecipeLineInput]) -> Result<(), ServiceError> {
    if *price < Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "Price must be non-negative".to_string(),
        ));
    }
    if recipe.is_empty() {
        return Err(ServiceError::ValidationError(
            "A menu item needs at least one recipe line".to_string(),
        ));
    }
    if recipe
        .iter()
        .any(|line| line.quantity_per_unit <= Decimal::ZERO)
    {
        return Err(ServiceError::ValidationError(
            "Recipe quantities must be positive".to_string(),
        ));
    }
    Ok(())
}

async fn verify_ingredients_exist<C: ConnectionTrait>(
    conn: &C,
    recipe: &[RecipeLineInput],
) -> Result<(), ServiceError> {
    for line in recipe {
        let exists = InventoryItem::find_by_id(line.inventory_item_id)
            .one(conn)
            .await?
            .is_some();
        if !exists {
            return Err(ServiceError::ValidationError(format!(
                "Recipe references unknown inventory item {}",
                line.inventory_item_id
            )));
        }
    }
    Ok(())
}

async fn insert_recipe_lines<C: ConnectionTrait>(
    conn: &C,
    menu_item_id: Uuid,
    recipe: &[RecipeLineInput],
) -> Result<Vec<recipe_line::Model>, ServiceError> {
    let mut lines = Vec::with_capacity(recipe.len());
    for input in recipe {
        let line = recipe_line::ActiveModel {
            id: Set(Uuid::new_v4()),
            menu_item_id: Set(menu_item_id),
            inventory_item_id: Set(input.inventory_item_id),
            quantity_per_unit: Set(input.quantity_per_unit),
        };
        lines.push(line.insert(conn).await?);
    }
    Ok(lines)
}

/// Input for creating or updating a menu item.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateMenuItemInput {
    #[validate(length(min = 1, message = "Menu name is required"))]
    pub name: String,
    pub price: Decimal,
    pub recipe: Vec<RecipeLineInput>,
}

#[derive(Debug, Deserialize)]
pub struct RecipeLineInput {
    pub inventory_item_id: Uuid,
    pub quantity_per_unit: Decimal,
}

/// Menu item with its recipe lines attached.
#[derive(Debug, Serialize)]
pub struct MenuItemWithRecipe {
    #[serde(flatten)]
    pub item: menu_item::Model,
    pub recipe: Vec<recipe_line::Model>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn recipe_must_not_be_empty() {
        let err = validate_recipe(&dec!(1500), &[]).unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }

    #[test]
    fn recipe_quantities_must_be_positive() {
        let recipe = vec![RecipeLineInput {
            inventory_item_id: Uuid::new_v4(),
            quantity_per_unit: dec!(0),
        }];
        assert!(validate_recipe(&dec!(1500), &recipe).is_err());

        let recipe = vec![RecipeLineInput {
            inventory_item_id: Uuid::new_v4(),
            quantity_per_unit: dec!(0.5),
        }];
        assert!(validate_recipe(&dec!(1500), &recipe).is_ok());
    }

    #[test]
    fn price_must_be_non_negative() {
        let recipe = vec![RecipeLineInput {
            inventory_item_id: Uuid::new_v4(),
            quantity_per_unit: dec!(1),
        }];
        assert!(validate_recipe(&dec!(-1), &recipe).is_err());
        assert!(validate_recipe(&dec!(0), &recipe).is_ok());
    }
}
