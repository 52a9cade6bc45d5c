use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_inventory_items_table::Migration),
            Box::new(m20240101_000002_create_menu_tables::Migration),
            Box::new(m20240101_000003_create_cart_tables::Migration),
            Box::new(m20240101_000004_create_order_tables::Migration),
        ]
    }
}

mod m20240101_000001_create_inventory_items_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_inventory_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(InventoryItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(InventoryItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(InventoryItems::Name).string().not_null())
                        .col(
                            ColumnDef::new(InventoryItems::Quantity)
                                .decimal()
                                .not_null(),
                        )
                        .col(ColumnDef::new(InventoryItems::Category).string().not_null())
                        .col(
                            ColumnDef::new(InventoryItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryItems::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(InventoryItems::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum InventoryItems {
        Table,
        Id,
        Name,
        Quantity,
        Category,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000002_create_menu_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_menu_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(MenuItems::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(MenuItems::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(MenuItems::Name).string().not_null())
                        .col(
                            ColumnDef::new(MenuItems::Price)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(MenuItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(MenuItems::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(RecipeLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(RecipeLines::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(RecipeLines::MenuItemId).uuid().not_null())
                        .col(
                            ColumnDef::new(RecipeLines::InventoryItemId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RecipeLines::QuantityPerUnit)
                                .decimal()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_recipe_lines_menu_item")
                                .from(RecipeLines::Table, RecipeLines::MenuItemId)
                                .to(MenuItems::Table, MenuItems::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_recipe_lines_menu_item_id")
                        .table(RecipeLines::Table)
                        .col(RecipeLines::MenuItemId)
                        .if_not_exists()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(RecipeLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(MenuItems::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum MenuItems {
        Table,
        Id,
        Name,
        Price,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(Iden)]
    enum RecipeLines {
        Table,
        Id,
        MenuItemId,
        InventoryItemId,
        QuantityPerUnit,
    }
}

mod m20240101_000003_create_cart_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_cart_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Carts::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Carts::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Carts::Status).string_len(20).not_null())
                        .col(
                            ColumnDef::new(Carts::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Carts::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(CartLines::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(CartLines::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(CartLines::CartId).uuid().not_null())
                        .col(ColumnDef::new(CartLines::MenuItemId).uuid().not_null())
                        .col(ColumnDef::new(CartLines::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(CartLines::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CartLines::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_cart_lines_cart")
                                .from(CartLines::Table, CartLines::CartId)
                                .to(Carts::Table, Carts::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_cart_lines_cart_id")
                        .table(CartLines::Table)
                        .col(CartLines::CartId)
                        .if_not_exists()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(CartLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Carts::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Carts {
        Table,
        Id,
        Status,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(Iden)]
    enum CartLines {
        Table,
        Id,
        CartId,
        MenuItemId,
        Quantity,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000004_create_order_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_order_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Orders::Total).decimal().not_null())
                        .col(ColumnDef::new(Orders::Status).string_len(20).not_null())
                        .col(
                            ColumnDef::new(Orders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderLines::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderLines::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderLines::MenuItemId).uuid().not_null())
                        .col(ColumnDef::new(OrderLines::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(OrderLines::UnitPrice)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderLines::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_lines_order")
                                .from(OrderLines::Table, OrderLines::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_order_lines_order_id")
                        .table(OrderLines::Table)
                        .col(OrderLines::OrderId)
                        .if_not_exists()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(StockMovements::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockMovements::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockMovements::OrderId).uuid().not_null())
                        .col(
                            ColumnDef::new(StockMovements::InventoryItemId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockMovements::QuantityDeducted)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockMovements::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_stock_movements_order")
                                .from(StockMovements::Table, StockMovements::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_stock_movements_order_id")
                        .table(StockMovements::Table)
                        .col(StockMovements::OrderId)
                        .if_not_exists()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockMovements::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(OrderLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Orders {
        Table,
        Id,
        Total,
        Status,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(Iden)]
    enum OrderLines {
        Table,
        Id,
        OrderId,
        MenuItemId,
        Quantity,
        UnitPrice,
        CreatedAt,
    }

    #[derive(Iden)]
    enum StockMovements {
        Table,
        Id,
        OrderId,
        InventoryItemId,
        QuantityDeducted,
        CreatedAt,
    }
}
