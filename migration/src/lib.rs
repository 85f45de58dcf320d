pub use sea_orm_migration::prelude::*;

mod m20260215_000001_create_sync_config;
mod m20260215_000002_create_action_log;
mod m20260216_000001_create_source_tables;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260215_000001_create_sync_config::Migration),
            Box::new(m20260215_000002_create_action_log::Migration),
            Box::new(m20260216_000001_create_source_tables::Migration),
        ]
    }
}
