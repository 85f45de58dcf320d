use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SyncConfig::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SyncConfig::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SyncConfig::SourceKey)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(SyncConfig::Mode).string().not_null())
                    .col(
                        ColumnDef::new(SyncConfig::AutoEnabled)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(SyncConfig::IntervalMinutes)
                            .integer()
                            .not_null()
                            .default(60),
                    )
                    .col(
                        ColumnDef::new(SyncConfig::Status)
                            .string()
                            .not_null()
                            .default("IDLE"),
                    )
                    .col(ColumnDef::new(SyncConfig::LastRunStartedAt).date_time())
                    .col(ColumnDef::new(SyncConfig::LastRunEndedAt).date_time())
                    .col(ColumnDef::new(SyncConfig::LastRunDurationSeconds).big_integer())
                    .col(ColumnDef::new(SyncConfig::LastRecordsSynced).big_integer())
                    .col(ColumnDef::new(SyncConfig::LastError).string())
                    .col(ColumnDef::new(SyncConfig::NextRunAt).date_time())
                    .col(ColumnDef::new(SyncConfig::LastTriggeredBy).string())
                    .col(ColumnDef::new(SyncConfig::UpdatedAt).date_time())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SyncConfig::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum SyncConfig {
    Table,
    Id,
    SourceKey,
    Mode,
    AutoEnabled,
    IntervalMinutes,
    Status,
    LastRunStartedAt,
    LastRunEndedAt,
    LastRunDurationSeconds,
    LastRecordsSynced,
    LastError,
    NextRunAt,
    LastTriggeredBy,
    UpdatedAt,
}
