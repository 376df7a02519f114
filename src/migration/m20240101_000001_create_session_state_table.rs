use sea_orm_migration::prelude::*;

use crate::entity::session_state::{create_table_statement, DEFAULT_TABLE_NAME};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(create_table_statement(DEFAULT_TABLE_NAME))
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(Alias::new(DEFAULT_TABLE_NAME))
                    .if_exists()
                    .to_owned(),
            )
            .await
    }
}
