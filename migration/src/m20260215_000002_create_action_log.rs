use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ActionLog::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ActionLog::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ActionLog::ActorId).string().not_null())
                    .col(ColumnDef::new(ActionLog::ActionKind).string().not_null())
                    .col(ColumnDef::new(ActionLog::TargetKind).string().not_null())
                    .col(ColumnDef::new(ActionLog::TargetId).string().not_null())
                    .col(ColumnDef::new(ActionLog::IpAddress).string())
                    .col(ColumnDef::new(ActionLog::UserAgent).string())
                    .col(ColumnDef::new(ActionLog::Path).string())
                    .col(ColumnDef::new(ActionLog::Method).string())
                    .col(ColumnDef::new(ActionLog::DetailsJson).text())
                    .col(ColumnDef::new(ActionLog::CreatedAt).date_time().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_action_log_target_created")
                    .table(ActionLog::Table)
                    .col(ActionLog::TargetId)
                    .col(ActionLog::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ActionLog::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ActionLog {
    Table,
    Id,
    ActorId,
    ActionKind,
    TargetKind,
    TargetId,
    IpAddress,
    UserAgent,
    Path,
    Method,
    DetailsJson,
    CreatedAt,
}
