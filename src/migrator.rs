//! Embedded schema migrations, run at startup when `auto_migrate` is set.

use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_movement_records::Migration),
            Box::new(m20240301_000002_create_material_definitions::Migration),
            Box::new(m20240301_000003_create_audit_entries::Migration),
            Box::new(m20240301_000004_create_stock_count_tables::Migration),
            Box::new(m20240301_000005_create_role_permissions::Migration),
        ]
    }
}

mod m20240301_000001_create_movement_records {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_movement_records"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(MovementRecords::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(MovementRecords::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(MovementRecords::MaterialRef)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(MovementRecords::Direction)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(MovementRecords::Quantity)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(MovementRecords::Company).string().null())
                        .col(ColumnDef::new(MovementRecords::WaybillRef).string().null())
                        .col(
                            ColumnDef::new(MovementRecords::OccurredDate)
                                .date()
                                .not_null(),
                        )
                        .col(ColumnDef::new(MovementRecords::Year).integer().not_null())
                        .col(ColumnDef::new(MovementRecords::Month).integer().not_null())
                        .col(ColumnDef::new(MovementRecords::Week).integer().not_null())
                        .col(ColumnDef::new(MovementRecords::Note).string().null())
                        .col(ColumnDef::new(MovementRecords::ModifiedBy).uuid().null())
                        .col(
                            ColumnDef::new(MovementRecords::SoftDeletedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(MovementRecords::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_movement_records_material_ref")
                        .table(MovementRecords::Table)
                        .col(MovementRecords::MaterialRef)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_movement_records_occurred_date")
                        .table(MovementRecords::Table)
                        .col(MovementRecords::OccurredDate)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_movement_records_soft_deleted_at")
                        .table(MovementRecords::Table)
                        .col(MovementRecords::SoftDeletedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(MovementRecords::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum MovementRecords {
        Table,
        Id,
        MaterialRef,
        Direction,
        Quantity,
        Company,
        WaybillRef,
        OccurredDate,
        Year,
        Month,
        Week,
        Note,
        ModifiedBy,
        SoftDeletedAt,
        CreatedAt,
    }
}

mod m20240301_000002_create_material_definitions {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_material_definitions"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(MaterialDefinitions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(MaterialDefinitions::Reference)
                                .string()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(MaterialDefinitions::MinStock)
                                .integer()
                                .not_null()
                                .default(20),
                        )
                        .col(ColumnDef::new(MaterialDefinitions::AbcClass).string().null())
                        .col(
                            ColumnDef::new(MaterialDefinitions::DefaultLocation)
                                .string()
                                .null(),
                        )
                        .col(ColumnDef::new(MaterialDefinitions::Unit).string().null())
                        .col(
                            ColumnDef::new(MaterialDefinitions::Description)
                                .string()
                                .null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(MaterialDefinitions::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum MaterialDefinitions {
        Table,
        Reference,
        MinStock,
        AbcClass,
        DefaultLocation,
        Unit,
        Description,
    }
}

mod m20240301_000003_create_audit_entries {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_audit_entries"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(AuditEntries::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(AuditEntries::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(AuditEntries::UserId).uuid().null())
                        .col(ColumnDef::new(AuditEntries::Action).string().not_null())
                        .col(ColumnDef::new(AuditEntries::Entity).string().not_null())
                        .col(ColumnDef::new(AuditEntries::EntityId).string().not_null())
                        .col(ColumnDef::new(AuditEntries::Details).json().null())
                        .col(
                            ColumnDef::new(AuditEntries::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_audit_entries_entity")
                        .table(AuditEntries::Table)
                        .col(AuditEntries::Entity)
                        .col(AuditEntries::EntityId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(AuditEntries::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum AuditEntries {
        Table,
        Id,
        UserId,
        Action,
        Entity,
        EntityId,
        Details,
        CreatedAt,
    }
}

mod m20240301_000004_create_stock_count_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000004_create_stock_count_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockCountSessions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockCountSessions::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockCountSessions::SessionDate)
                                .date()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockCountSessions::CreatedBy)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockCountSessions::Status)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockCountSessions::WorkDays)
                                .json()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockCountSessions::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_count_sessions_creator_date")
                        .table(StockCountSessions::Table)
                        .col(StockCountSessions::CreatedBy)
                        .col(StockCountSessions::SessionDate)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(StockCountEntries::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockCountEntries::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockCountEntries::SessionId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockCountEntries::MaterialRef)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockCountEntries::CountedQty)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockCountEntries::SystemQty)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockCountEntries::Difference)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockCountEntries::Status).string().not_null())
                        .col(ColumnDef::new(StockCountEntries::Note).string().null())
                        .col(
                            ColumnDef::new(StockCountEntries::CountedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_count_entries_session_material")
                        .table(StockCountEntries::Table)
                        .col(StockCountEntries::SessionId)
                        .col(StockCountEntries::MaterialRef)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockCountEntries::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(StockCountSessions::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum StockCountSessions {
        Table,
        Id,
        SessionDate,
        CreatedBy,
        Status,
        WorkDays,
        CreatedAt,
    }

    #[derive(Iden)]
    enum StockCountEntries {
        Table,
        Id,
        SessionId,
        MaterialRef,
        CountedQty,
        SystemQty,
        Difference,
        Status,
        Note,
        CountedAt,
    }
}

mod m20240301_000005_create_role_permissions {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000005_create_role_permissions"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(RolePermissions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(RolePermissions::Id)
                                .integer()
                                .auto_increment()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(RolePermissions::Role).string().not_null())
                        .col(ColumnDef::new(RolePermissions::Action).string().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_role_permissions_role_action")
                        .table(RolePermissions::Table)
                        .col(RolePermissions::Role)
                        .col(RolePermissions::Action)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(RolePermissions::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum RolePermissions {
        Table,
        Id,
        Role,
        Action,
    }
}
