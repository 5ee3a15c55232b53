//! Session entity model for Sea-ORM database interaction.
//!
//! Maps to the `sessions` table used by [`crate::session_store::SeaOrmStore`].

use sea_orm::entity::prelude::*;

/// A persisted session row.
///
/// | Column      | Type               | Description                          |
/// |-------------|--------------------|--------------------------------------|
/// | id          | TEXT (Primary Key) | Session ID                           |
/// | data        | BLOB / BYTEA       | MessagePack serialized session data  |
/// | expiry_date | TIMESTAMPTZ        | Session expiration timestamp         |
///
/// No schema name is pinned so the same entity works against PostgreSQL
/// and SQLite.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "sessions")]
pub struct Model {
    /// String form of `tower_sessions::session::Id`.
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub id: String,

    /// MessagePack encoding of the whole `tower_sessions::session::Record`.
    pub data: Vec<u8>,

    /// Rows at or past this instant are treated as absent and are removed
    /// by the expired-session cleanup.
    pub expiry_date: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
