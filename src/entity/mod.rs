//! Database entity models for sessionstate-seaorm-store.
//!
//! This module contains the Sea-ORM entity definition used by [`SeaOrmStore`](crate::SeaOrmStore)
//! to map rows onto session records, along with the statement that creates the table.

/// Session state entity model for Sea-ORM database interaction.
///
/// Contains the row layout of a persisted session record and the table-creation
/// statement shared by [`SeaOrmStore::migrate`](crate::SeaOrmStore::migrate) and the
/// migrator.
pub mod session_state;
