//! User entity model.

use sea_orm::entity::prelude::*;

/// A registered user row in the `users` table.
///
/// `email` carries a unique index; the store relies on it to reject a
/// second registration atomically instead of trusting a prior lookup.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub address: String,
    pub age: i32,
    #[sea_orm(unique)]
    pub email: String,
    /// Hex digest produced by [`crate::credentials::hash_password`].
    pub password: String,
    /// File name of the profile photo under `/uploads`.
    pub photo: String,
    /// Phone in international form (`+549...`).
    pub phone: String,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
