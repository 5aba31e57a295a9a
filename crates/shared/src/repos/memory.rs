use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::{
    HistoryStore, HistoryStoreError, HistoryStoreFuture, UpsertAck, effective_limit,
    resolve_encounter_id,
};
use crate::models::{Encounter, Message, OwnerId};

/// Process-local store used when no database is configured, and in tests.
#[derive(Default)]
pub struct MemoryHistoryStore {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    records: HashMap<(OwnerId, String), StoredEncounter>,
    next_seq: u64,
}

struct StoredEncounter {
    encounter: Encounter,
    /// Insertion order; breaks ties between equal `created_at` values.
    seq: u64,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn get(&self, owner: &OwnerId, encounter_id: &str) -> Option<Encounter> {
        self.state
            .lock()
            .await
            .records
            .get(&(owner.clone(), encounter_id.to_string()))
            .map(|stored| stored.encounter.clone())
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn fetch_encounters<'a>(
        &'a self,
        owner: &'a OwnerId,
        limit: usize,
    ) -> HistoryStoreFuture<'a, Vec<Encounter>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            let mut owned: Vec<&StoredEncounter> = state
                .records
                .iter()
                .filter(|((record_owner, _), _)| record_owner == owner)
                .map(|(_, stored)| stored)
                .collect();
            owned.sort_by(|left, right| {
                right
                    .encounter
                    .created_at
                    .cmp(&left.encounter.created_at)
                    .then(right.seq.cmp(&left.seq))
            });

            Ok(owned
                .into_iter()
                .take(effective_limit(limit))
                .map(|stored| stored.encounter.clone())
                .collect())
        })
    }

    fn upsert_encounter<'a>(
        &'a self,
        owner: &'a OwnerId,
        encounter_id: Option<&'a str>,
        messages: &'a [Message],
    ) -> HistoryStoreFuture<'a, UpsertAck> {
        Box::pin(async move {
            if messages.is_empty() {
                return Err(HistoryStoreError::EmptyEncounter);
            }

            let encounter_id = resolve_encounter_id(encounter_id);
            let now: DateTime<Utc> = Utc::now();
            let mut state = self.state.lock().await;
            let key = (owner.clone(), encounter_id.clone());

            if let Some(stored) = state.records.get_mut(&key) {
                stored.encounter.messages = messages.to_vec();
                stored.encounter.updated_at = now;
                return Ok(UpsertAck {
                    encounter_id,
                    created: false,
                    created_at: stored.encounter.created_at,
                    updated_at: now,
                });
            }

            let seq = state.next_seq;
            state.next_seq += 1;
            state.records.insert(
                key,
                StoredEncounter {
                    encounter: Encounter {
                        encounter_id: encounter_id.clone(),
                        owner: owner.clone(),
                        messages: messages.to_vec(),
                        created_at: now,
                        updated_at: now,
                    },
                    seq,
                },
            );

            Ok(UpsertAck {
                encounter_id,
                created: true,
                created_at: now,
                updated_at: now,
            })
        })
    }
}
