use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::postgres::PgRow;
use sqlx::types::Json;

use super::{
    HistoryStore, HistoryStoreError, HistoryStoreFuture, Store, UpsertAck, effective_limit,
    resolve_encounter_id,
};
use crate::models::{Encounter, Message, OwnerId};

impl Store {
    pub async fn list_encounters(
        &self,
        owner: &OwnerId,
        limit: usize,
    ) -> Result<Vec<Encounter>, HistoryStoreError> {
        let rows = sqlx::query(
            "SELECT encounter_id, messages, created_at, updated_at
             FROM chat_encounters
             WHERE user_id = $1
             ORDER BY created_at DESC, encounter_id DESC
             LIMIT $2",
        )
        .bind(owner.as_str())
        .bind(effective_limit(limit) as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(|row| row_to_encounter(owner, row)).collect()
    }

    pub async fn save_encounter(
        &self,
        owner: &OwnerId,
        encounter_id: Option<&str>,
        messages: &[Message],
    ) -> Result<UpsertAck, HistoryStoreError> {
        if messages.is_empty() {
            return Err(HistoryStoreError::EmptyEncounter);
        }

        let encounter_id = resolve_encounter_id(encounter_id);
        let row = sqlx::query(
            "INSERT INTO chat_encounters (user_id, encounter_id, messages, created_at, updated_at)
             VALUES ($1, $2, $3, NOW(), NOW())
             ON CONFLICT (user_id, encounter_id)
             DO UPDATE SET
               messages = EXCLUDED.messages,
               updated_at = NOW()
             RETURNING created_at, updated_at, (xmax = 0) AS inserted",
        )
        .bind(owner.as_str())
        .bind(&encounter_id)
        .bind(Json(messages))
        .fetch_one(&self.pool)
        .await?;

        Ok(UpsertAck {
            encounter_id,
            created: row.try_get("inserted")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl HistoryStore for Store {
    fn fetch_encounters<'a>(
        &'a self,
        owner: &'a OwnerId,
        limit: usize,
    ) -> HistoryStoreFuture<'a, Vec<Encounter>> {
        Box::pin(self.list_encounters(owner, limit))
    }

    fn upsert_encounter<'a>(
        &'a self,
        owner: &'a OwnerId,
        encounter_id: Option<&'a str>,
        messages: &'a [Message],
    ) -> HistoryStoreFuture<'a, UpsertAck> {
        Box::pin(self.save_encounter(owner, encounter_id, messages))
    }

    fn ping(&self) -> HistoryStoreFuture<'_, ()> {
        Box::pin(Store::ping(self))
    }
}

fn row_to_encounter(owner: &OwnerId, row: &PgRow) -> Result<Encounter, HistoryStoreError> {
    let encounter_id: String = row.try_get("encounter_id")?;
    let Json(messages): Json<Vec<Message>> = row.try_get("messages").map_err(|err| {
        HistoryStoreError::InvalidData(format!(
            "messages for encounter {encounter_id} could not be decoded: {err}"
        ))
    })?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

    Ok(Encounter {
        encounter_id,
        owner: owner.clone(),
        messages,
        created_at,
        updated_at,
    })
}
