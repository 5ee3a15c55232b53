use async_trait::async_trait;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set, TransactionTrait,
};
use time::OffsetDateTime;
use tower_sessions::{session::Id, session::Record, session_store, ExpiredDeletion, SessionStore};

use crate::entity::session::{self, ActiveModel as SessionActiveModel, Entity as SessionEntity};

/// A `tower-sessions` store persisting records through Sea-ORM.
///
/// Every worker process opens its own connection pool; the `sessions`
/// table is the only state they share, so a session created by one worker
/// is visible to all of them.
///
/// Records are serialized whole with MessagePack. Errors map onto
/// `tower_sessions::session_store::Error`:
///
/// - Database errors → `session_store::Error::Backend`
/// - Serialization errors → `session_store::Error::Encode`
/// - Deserialization errors → `session_store::Error::Decode`
#[derive(Debug, Clone)]
pub struct SeaOrmStore {
    conn: DatabaseConnection,
}

impl SeaOrmStore {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn encode(record: &Record) -> session_store::Result<(Vec<u8>, DateTimeWithTimeZone)> {
        let data =
            rmp_serde::to_vec(record).map_err(|e| session_store::Error::Encode(e.to_string()))?;
        let expiry_date = to_db_timestamp(record.expiry_date)?;
        Ok((data, expiry_date))
    }
}

#[async_trait]
impl SessionStore for SeaOrmStore {
    /// Inserts a new record, regenerating its ID until it does not collide
    /// with an existing row.
    async fn create(&self, record: &mut Record) -> session_store::Result<()> {
        let txn = self.conn.begin().await.map_err(backend)?;

        while SessionEntity::find_by_id(record.id.to_string())
            .one(&txn)
            .await
            .map_err(backend)?
            .is_some()
        {
            record.id = Id::default();
        }

        let (data, expiry_date) = Self::encode(record)?;
        let model = SessionActiveModel {
            id: Set(record.id.to_string()),
            data: Set(data),
            expiry_date: Set(expiry_date),
        };

        SessionEntity::insert(model)
            .exec(&txn)
            .await
            .map_err(backend)?;

        txn.commit().await.map_err(backend)?;

        Ok(())
    }

    /// Upserts the record.
    async fn save(&self, record: &Record) -> session_store::Result<()> {
        let (data, expiry_date) = Self::encode(record)?;
        let model = SessionActiveModel {
            id: Set(record.id.to_string()),
            data: Set(data),
            expiry_date: Set(expiry_date),
        };

        SessionEntity::insert(model)
            .on_conflict(
                OnConflict::column(session::Column::Id)
                    .update_columns([session::Column::Data, session::Column::ExpiryDate])
                    .to_owned(),
            )
            .exec(&self.conn)
            .await
            .map_err(backend)?;

        Ok(())
    }

    /// Loads a record that has not yet expired.
    async fn load(&self, session_id: &Id) -> session_store::Result<Option<Record>> {
        let now = to_db_timestamp(OffsetDateTime::now_utc())?;

        let session = SessionEntity::find_by_id(session_id.to_string())
            .filter(session::Column::ExpiryDate.gt(now))
            .one(&self.conn)
            .await
            .map_err(backend)?;

        match session {
            Some(model) => {
                let record = rmp_serde::from_slice(&model.data)
                    .map_err(|e| session_store::Error::Decode(e.to_string()))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, session_id: &Id) -> session_store::Result<()> {
        SessionEntity::delete_by_id(session_id.to_string())
            .exec(&self.conn)
            .await
            .map_err(backend)?;

        Ok(())
    }
}

#[async_trait]
impl ExpiredDeletion for SeaOrmStore {
    /// Bulk-deletes every row whose expiry is in the past.
    ///
    /// Driven by `continuously_delete_expired` from the bootstrap code.
    async fn delete_expired(&self) -> session_store::Result<()> {
        let now = to_db_timestamp(OffsetDateTime::now_utc())?;

        let result = SessionEntity::delete_many()
            .filter(session::Column::ExpiryDate.lt(now))
            .exec(&self.conn)
            .await
            .map_err(backend)?;

        tracing::debug!(deleted = result.rows_affected, "deleted expired sessions");

        Ok(())
    }
}

fn backend(err: DbErr) -> session_store::Error {
    session_store::Error::Backend(err.to_string())
}

// `tower-sessions` speaks `time`, the entity columns speak `chrono`
fn to_db_timestamp(at: OffsetDateTime) -> session_store::Result<DateTimeWithTimeZone> {
    chrono::DateTime::from_timestamp(at.unix_timestamp(), at.nanosecond())
        .map(Into::into)
        .ok_or_else(|| session_store::Error::Encode(format!("timestamp {at} is out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_conversion_keeps_the_instant() {
        let at = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let converted = to_db_timestamp(at).unwrap();
        assert_eq!(converted.timestamp(), 1_700_000_000);
    }

    #[test]
    fn timestamp_conversion_keeps_nanoseconds() {
        let at = OffsetDateTime::from_unix_timestamp_nanos(1_700_000_000_123_456_789).unwrap();
        let converted = to_db_timestamp(at).unwrap();
        assert_eq!(converted.timestamp_subsec_nanos(), 123_456_789);
    }
}
