use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use crate::models::{Encounter, Message, OwnerId};

mod encounters;
mod memory;

pub use memory::MemoryHistoryStore;

/// Upper bound on encounters returned by a history listing.
pub const MAX_HISTORY_LIMIT: usize = 50;

pub type HistoryStoreFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, HistoryStoreError>> + Send + 'a>>;

#[derive(Debug, Error)]
pub enum HistoryStoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("invalid persisted data: {0}")]
    InvalidData(String),
    #[error("encounter has no messages")]
    EmptyEncounter,
    #[error("history store unavailable: {0}")]
    Unavailable(String),
}

/// Result of an encounter upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertAck {
    pub encounter_id: String,
    /// `true` when the write created the record.
    pub created: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Durable encounter storage keyed by `(owner, encounter_id)`.
pub trait HistoryStore: Send + Sync {
    /// Most recently created first, at most `min(limit, MAX_HISTORY_LIMIT)`.
    fn fetch_encounters<'a>(
        &'a self,
        owner: &'a OwnerId,
        limit: usize,
    ) -> HistoryStoreFuture<'a, Vec<Encounter>>;

    /// Replaces the messages of an existing record and keeps its `created_at`,
    /// or creates the record. A missing id is minted by the store.
    fn upsert_encounter<'a>(
        &'a self,
        owner: &'a OwnerId,
        encounter_id: Option<&'a str>,
        messages: &'a [Message],
    ) -> HistoryStoreFuture<'a, UpsertAck>;

    fn ping(&self) -> HistoryStoreFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }
}

#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn ping(&self) -> Result<(), HistoryStoreError> {
        let _: i32 = sqlx::query_scalar("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}

pub(crate) fn effective_limit(limit: usize) -> usize {
    limit.clamp(1, MAX_HISTORY_LIMIT)
}

pub(crate) fn resolve_encounter_id(encounter_id: Option<&str>) -> String {
    encounter_id
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}
