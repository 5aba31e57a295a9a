use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::models::{Message, OwnerId};
use crate::repos::HistoryStore;

type EncounterKey = (OwnerId, String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceEvent {
    Saved {
        encounter_id: String,
        durable_id: String,
    },
    Failed {
        encounter_id: String,
        reason: String,
    },
}

#[derive(Default)]
struct Slot {
    /// Latest snapshot waiting behind the in-flight write.
    pending: Option<Vec<Message>>,
}

/// Serializes encounter writes: at most one in-flight upsert per encounter,
/// and a snapshot queued behind it is replaced by any newer one.
pub struct PersistenceQueue<H> {
    store: Arc<H>,
    slots: Arc<Mutex<HashMap<EncounterKey, Slot>>>,
    events: mpsc::UnboundedSender<PersistenceEvent>,
    in_flight: Arc<watch::Sender<usize>>,
    runtime: Handle,
}

impl<H> Clone for PersistenceQueue<H> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            slots: Arc::clone(&self.slots),
            events: self.events.clone(),
            in_flight: Arc::clone(&self.in_flight),
            runtime: self.runtime.clone(),
        }
    }
}

impl<H> PersistenceQueue<H>
where
    H: HistoryStore + 'static,
{
    /// Binds the queue to the current tokio runtime; panics outside one.
    pub fn new(store: Arc<H>) -> (Self, mpsc::UnboundedReceiver<PersistenceEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let (in_flight, _) = watch::channel(0);
        (
            Self {
                store,
                slots: Arc::new(Mutex::new(HashMap::new())),
                events,
                in_flight: Arc::new(in_flight),
                runtime: Handle::current(),
            },
            receiver,
        )
    }

    /// Schedules a write of `messages` under `encounter_id`. Callable from any
    /// thread.
    pub fn enqueue(&self, owner: OwnerId, encounter_id: String, messages: Vec<Message>) {
        let key = (owner, encounter_id);
        {
            let mut slots = self.lock_slots();
            if let Some(slot) = slots.get_mut(&key) {
                if slot.pending.is_some() {
                    debug!(encounter_id = %key.1, "superseding queued encounter write");
                }
                slot.pending = Some(messages);
                return;
            }
            slots.insert(key.clone(), Slot::default());
        }

        self.in_flight.send_modify(|count| *count += 1);
        let worker = self.clone();
        self.runtime.spawn(async move {
            worker.drain(key, messages).await;
        });
    }

    pub fn is_in_flight(&self, owner: &OwnerId, encounter_id: &str) -> bool {
        self.lock_slots()
            .contains_key(&(owner.clone(), encounter_id.to_string()))
    }

    /// Resolves once no write is in flight or queued.
    pub async fn settle(&self) {
        let mut receiver = self.in_flight.subscribe();
        let _ = receiver.wait_for(|count| *count == 0).await;
    }

    async fn drain(&self, key: EncounterKey, first: Vec<Message>) {
        let (owner, encounter_id) = (&key.0, key.1.as_str());
        let mut next = Some(first);

        while let Some(messages) = next {
            let event = match self
                .store
                .upsert_encounter(owner, Some(encounter_id), &messages)
                .await
            {
                Ok(ack) => {
                    debug!(
                        encounter_id,
                        message_count = messages.len(),
                        created = ack.created,
                        "encounter persisted"
                    );
                    PersistenceEvent::Saved {
                        encounter_id: encounter_id.to_string(),
                        durable_id: ack.encounter_id,
                    }
                }
                Err(err) => {
                    warn!(encounter_id, error = %err, "failed to persist encounter");
                    PersistenceEvent::Failed {
                        encounter_id: encounter_id.to_string(),
                        reason: err.to_string(),
                    }
                }
            };
            // The controller may already be gone; its events are then moot.
            let _ = self.events.send(event);

            next = self.take_pending(&key);
        }

        self.in_flight
            .send_modify(|count| *count = count.saturating_sub(1));
    }

    /// Pops the queued snapshot, or releases the slot when there is none.
    fn take_pending(&self, key: &EncounterKey) -> Option<Vec<Message>> {
        let mut slots = self.lock_slots();
        let pending = slots.get_mut(key).and_then(|slot| slot.pending.take());
        if pending.is_none() {
            slots.remove(key);
        }
        pending
    }

    fn lock_slots(&self) -> MutexGuard<'_, HashMap<EncounterKey, Slot>> {
        match self.slots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
