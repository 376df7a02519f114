//! Schema migrations for the default session state table.
//!
//! Stores on a custom table name should call [`SeaOrmStore::migrate`](crate::SeaOrmStore::migrate)
//! instead, which creates the configured table.

pub use sea_orm_migration::prelude::*;

mod m20240101_000001_create_session_state_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    // Override the name of migration table to avoid conflicts
    fn migration_table_name() -> sea_orm::DynIden {
        Alias::new("sessionstate_seaorm_migrations").into_iden()
    }

    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(
            m20240101_000001_create_session_state_table::Migration,
        )]
    }
}
