//! Session state entity model for Sea-ORM database interaction.
//!
//! Column names are the stored field names of a session record and must not change
//! between releases: rows written by one version are read and conditionally updated by
//! the next.

use sea_orm::entity::prelude::*;
use sea_orm::sea_query::{Alias, ColumnDef, Index, Table, TableCreateStatement};

/// Table used when no other name is configured.
pub const DEFAULT_TABLE_NAME: &str = "session_state";

/// Sea-ORM entity model representing one session record.
///
/// # Database Schema
///
/// | Column          | Type               | Description                                  |
/// |-----------------|--------------------|----------------------------------------------|
/// | id              | TEXT (PK)          | Session ID                                   |
/// | applicationName | TEXT (PK)          | Application scope the session belongs to     |
/// | created         | TIMESTAMPTZ        | Creation time                                |
/// | expires         | TIMESTAMPTZ        | Absolute expiry instant                      |
/// | lockDate        | TIMESTAMPTZ        | Time of the most recent lock acquisition     |
/// | locked          | BOOLEAN            | Whether a holder has exclusive access        |
/// | lockId          | BIGINT             | Fencing token                                |
/// | sessionItems    | TEXT               | Base64 encoded session payload               |
/// | timeout         | INTEGER            | Idle timeout in minutes                      |
/// | flags           | INTEGER            | Action flags (1 marks an uninitialized item) |
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "session_state")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub id: String,

    #[sea_orm(
        primary_key,
        auto_increment = false,
        column_type = "Text",
        column_name = "applicationName"
    )]
    pub application_name: String,

    pub created: DateTimeWithTimeZone,

    pub expires: DateTimeWithTimeZone,

    #[sea_orm(column_name = "lockDate")]
    pub lock_date: DateTimeWithTimeZone,

    pub locked: bool,

    #[sea_orm(column_name = "lockId")]
    pub lock_id: i64,

    #[sea_orm(column_type = "Text", column_name = "sessionItems")]
    pub session_items: String,

    pub timeout: i32,

    pub flags: i32,
}

/// Required enum for Sea-ORM entity relations.
///
/// This entity doesn't have any relations to other entities, so this enum is empty.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Builds the `CREATE TABLE IF NOT EXISTS` statement for a session state table.
///
/// `(id, applicationName)` is the composite primary key, which is what rejects a
/// second insert for a live session.
pub fn create_table_statement(table_name: &str) -> TableCreateStatement {
    Table::create()
        .table(Alias::new(table_name))
        .if_not_exists()
        .col(ColumnDef::new(Column::Id).text().not_null())
        .col(ColumnDef::new(Column::ApplicationName).text().not_null())
        .col(
            ColumnDef::new(Column::Created)
                .timestamp_with_time_zone()
                .not_null(),
        )
        .col(
            ColumnDef::new(Column::Expires)
                .timestamp_with_time_zone()
                .not_null(),
        )
        .col(
            ColumnDef::new(Column::LockDate)
                .timestamp_with_time_zone()
                .not_null(),
        )
        .col(ColumnDef::new(Column::Locked).boolean().not_null())
        .col(ColumnDef::new(Column::LockId).big_integer().not_null())
        .col(ColumnDef::new(Column::SessionItems).text().not_null())
        .col(ColumnDef::new(Column::Timeout).integer().not_null())
        .col(ColumnDef::new(Column::Flags).integer().not_null())
        .primary_key(
            Index::create()
                .col(Column::Id)
                .col(Column::ApplicationName),
        )
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::sea_query::{PostgresQueryBuilder, SchemaStatementBuilder};
    use sea_orm::IdenStatic;

    #[test]
    fn column_names_match_stored_field_names() {
        assert_eq!(Column::ApplicationName.as_str(), "applicationName");
        assert_eq!(Column::LockDate.as_str(), "lockDate");
        assert_eq!(Column::LockId.as_str(), "lockId");
        assert_eq!(Column::SessionItems.as_str(), "sessionItems");
        assert_eq!(Column::Expires.as_str(), "expires");
    }

    #[test]
    fn create_statement_uses_configured_table() {
        let sql = create_table_statement("my_sessions").to_string(PostgresQueryBuilder);
        assert!(sql.starts_with(r#"CREATE TABLE IF NOT EXISTS "my_sessions""#));
        assert!(sql.contains("PRIMARY KEY"));
        assert!(sql.contains(r#""applicationName" text NOT NULL"#));
    }
}
