use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(FacultyMembers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FacultyMembers::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(FacultyMembers::EmployeeNo)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(FacultyMembers::FullName).string().not_null())
                    .col(ColumnDef::new(FacultyMembers::Department).string())
                    .col(ColumnDef::new(FacultyMembers::AcademicRank).string())
                    .col(ColumnDef::new(FacultyMembers::UpdatedAt).date_time())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Students::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Students::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Students::StudentNo)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Students::FullName).string().not_null())
                    .col(ColumnDef::new(Students::Pardis).string())
                    .col(ColumnDef::new(Students::Term).string())
                    .col(ColumnDef::new(Students::UpdatedAt).date_time())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(LmsActivity::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LmsActivity::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(LmsActivity::Zone).string().not_null())
                    .col(ColumnDef::new(LmsActivity::StudentNo).string().not_null())
                    .col(ColumnDef::new(LmsActivity::CourseCode).string().not_null())
                    .col(
                        ColumnDef::new(LmsActivity::ActivityCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(LmsActivity::LastSeenAt).date_time())
                    .col(ColumnDef::new(LmsActivity::SyncedAt).date_time())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_lms_activity_zone")
                    .table(LmsActivity::Table)
                    .col(LmsActivity::Zone)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(LmsActivity::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Students::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(FacultyMembers::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum FacultyMembers {
    Table,
    Id,
    EmployeeNo,
    FullName,
    Department,
    AcademicRank,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Students {
    Table,
    Id,
    StudentNo,
    FullName,
    Pardis,
    Term,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum LmsActivity {
    Table,
    Id,
    Zone,
    StudentNo,
    CourseCode,
    ActivityCount,
    LastSeenAt,
    SyncedAt,
}
