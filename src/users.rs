//! User persistence.
//!
//! [`UserStore`] is the seam the registration and login handlers talk to;
//! [`SeaOrmUserStore`] is the database-backed implementation.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, NotSet, QueryFilter,
    Set, SqlErr,
};

use crate::entity::user::{self, ActiveModel as UserActiveModel, Entity as UserEntity};

/// A stored user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: i32,
    pub name: String,
    pub address: String,
    pub age: i32,
    pub email: String,
    /// Password digest, never the plaintext.
    pub password: String,
    pub photo: String,
    pub phone: String,
}

/// Fields of a user about to be created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    pub address: String,
    pub age: i32,
    pub email: String,
    pub password: String,
    pub photo: String,
    pub phone: String,
}

#[derive(Debug, thiserror::Error)]
pub enum UserStoreError {
    /// Another user already holds this email.
    #[error("email {0} is already registered")]
    DuplicateEmail(String),

    #[error("user store failure: {0}")]
    Database(#[from] DbErr),
}

/// Append/query access to user records.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Exact, case-sensitive match on email.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserStoreError>;

    async fn find_by_id(&self, id: i32) -> Result<Option<User>, UserStoreError>;

    /// Inserts the user, or fails with [`UserStoreError::DuplicateEmail`]
    /// when the email is taken, including by a concurrent insert.
    async fn insert(&self, user: NewUser) -> Result<User, UserStoreError>;
}

/// [`UserStore`] over a Sea-ORM connection.
#[derive(Debug, Clone)]
pub struct SeaOrmUserStore {
    conn: DatabaseConnection,
}

impl SeaOrmUserStore {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl UserStore for SeaOrmUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserStoreError> {
        let found = UserEntity::find()
            .filter(user::Column::Email.eq(email))
            .one(&self.conn)
            .await?;
        Ok(found.map(User::from))
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<User>, UserStoreError> {
        let found = UserEntity::find_by_id(id).one(&self.conn).await?;
        Ok(found.map(User::from))
    }

    async fn insert(&self, user: NewUser) -> Result<User, UserStoreError> {
        let email = user.email.clone();
        let model = UserActiveModel {
            id: NotSet,
            name: Set(user.name),
            address: Set(user.address),
            age: Set(user.age),
            email: Set(user.email),
            password: Set(user.password),
            photo: Set(user.photo),
            phone: Set(user.phone),
            created_at: Set(Utc::now().into()),
        };

        match model.insert(&self.conn).await {
            Ok(inserted) => Ok(User::from(inserted)),
            Err(err) => match err.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => {
                    Err(UserStoreError::DuplicateEmail(email))
                }
                _ => Err(UserStoreError::Database(err)),
            },
        }
    }
}

impl From<user::Model> for User {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            address: model.address,
            age: model.age,
            email: model.email,
            password: model.password,
            photo: model.photo,
            phone: model.phone,
        }
    }
}
