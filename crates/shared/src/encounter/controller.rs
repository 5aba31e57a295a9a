use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use super::persistence::{PersistenceEvent, PersistenceQueue};
use super::seeds::{
    COMPLETION_FAILURE_MESSAGE, QUICK_ACTIONS, QuickAction, find_quick_action,
    welcome_back_message, welcome_message,
};
use crate::content::{RenderTree, render};
use crate::llm::{
    CompletionKind, CompletionRequest, CompletionResponse, CompletionService, HistoryTurn,
    validate_structured_json,
};
use crate::models::{ContentKind, Encounter, Message, MessageContent, OwnerId, Role};
use crate::repos::{HistoryStore, MAX_HISTORY_LIMIT};

const DEFAULT_CONTEXT_WINDOW: usize = 10;
const NO_PREVIEW: &str = "No preview available";

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Prior messages sent along with each new user turn.
    pub context_window: usize,
    pub history_limit: usize,
    /// Persist the active encounter before a stored one replaces it.
    pub flush_on_resume: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            context_window: DEFAULT_CONTEXT_WINDOW,
            history_limit: MAX_HISTORY_LIMIT,
            flush_on_resume: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncounterPhase {
    /// Only the seeded greeting so far.
    Empty,
    Active,
    /// A write for the current encounter is in flight.
    Persisting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendRejection {
    EmptyInput,
    Busy,
    UnknownQuickAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Rejected(SendRejection),
    Answered { kind: ContentKind },
    /// The canned apology was appended in place of a reply.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    PersistenceFailed,
    HistoryUnavailable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub id: u64,
    pub kind: NoticeKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub encounter_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub preview: String,
    pub message_count: usize,
    pub is_active: bool,
    pub encounter: Encounter,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub tree: RenderTree,
}

struct ControllerState {
    encounter_id: String,
    messages: Vec<Message>,
    next_seq: u64,
    /// Bumped whenever the active encounter is replaced.
    generation: u64,
    busy: bool,
    last_error: Option<String>,
    notices: Vec<Notice>,
    next_notice_id: u64,
    events: mpsc::UnboundedReceiver<PersistenceEvent>,
}

impl ControllerState {
    fn next_message_id(&mut self) -> String {
        let id = self.next_seq;
        self.next_seq = self.next_seq.saturating_add(1);
        id.to_string()
    }

    fn reset(&mut self, encounter_id: String, seed: Message) {
        self.encounter_id = encounter_id;
        self.messages = vec![seed];
        self.next_seq = next_seq_after(&self.messages);
        self.generation += 1;
        self.last_error = None;
    }

    fn push_notice(&mut self, kind: NoticeKind, message: impl Into<String>) {
        let id = self.next_notice_id;
        self.next_notice_id += 1;
        self.notices.push(Notice {
            id,
            kind,
            message: message.into(),
        });
    }

    fn drain_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            if let PersistenceEvent::Failed { encounter_id, .. } = event {
                let message = if encounter_id == self.encounter_id {
                    "Failed to save chat session."
                } else {
                    "Failed to save previous chat session."
                };
                self.push_notice(NoticeKind::PersistenceFailed, message);
            }
        }
    }
}

/// Owns the active encounter for one user: message sequence, identity,
/// completion round-trips and queued persistence.
pub struct EncounterController<C, H> {
    owner: OwnerId,
    completions: Arc<C>,
    history: Arc<H>,
    queue: PersistenceQueue<H>,
    config: ControllerConfig,
    state: Mutex<ControllerState>,
}

impl<C, H> EncounterController<C, H>
where
    C: CompletionService,
    H: HistoryStore + 'static,
{
    /// Must be called inside a tokio runtime; writes are later spawned onto
    /// that runtime, so the other methods may be called from any thread.
    pub fn new(owner: OwnerId, completions: Arc<C>, history: Arc<H>) -> Self {
        Self::with_config(owner, completions, history, ControllerConfig::default())
    }

    pub fn with_config(
        owner: OwnerId,
        completions: Arc<C>,
        history: Arc<H>,
        config: ControllerConfig,
    ) -> Self {
        let (queue, events) = PersistenceQueue::new(Arc::clone(&history));
        let messages = vec![welcome_message(Utc::now())];
        let state = ControllerState {
            encounter_id: new_encounter_id(),
            next_seq: next_seq_after(&messages),
            messages,
            generation: 0,
            busy: false,
            last_error: None,
            notices: Vec::new(),
            next_notice_id: 1,
            events,
        };

        Self {
            owner,
            completions,
            history,
            queue,
            config,
            state: Mutex::new(state),
        }
    }

    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    pub fn encounter_id(&self) -> String {
        self.lock_state().encounter_id.clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.lock_state().messages.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.lock_state().busy
    }

    pub fn last_error(&self) -> Option<String> {
        self.lock_state().last_error.clone()
    }

    pub fn phase(&self) -> EncounterPhase {
        let state = self.lock_state();
        if self.queue.is_in_flight(&self.owner, &state.encounter_id) {
            EncounterPhase::Persisting
        } else if state.messages.iter().any(|message| message.role == Role::User) {
            EncounterPhase::Active
        } else {
            EncounterPhase::Empty
        }
    }

    /// Flushes the current encounter when it holds a conversation, then
    /// starts a fresh one with the welcome greeting. Returns the new id.
    pub fn start_encounter(&self) -> String {
        let mut state = self.lock_state();
        if state.messages.len() > 1 {
            self.queue.enqueue(
                self.owner.clone(),
                state.encounter_id.clone(),
                state.messages.clone(),
            );
        }
        state.reset(new_encounter_id(), welcome_message(Utc::now()));
        info!(owner = %self.owner, encounter_id = %state.encounter_id, "started encounter");
        state.encounter_id.clone()
    }

    /// Resets the visible conversation under the same encounter id without
    /// persisting. Refused while a send is outstanding.
    pub fn clear_encounter(&self) -> bool {
        let mut state = self.lock_state();
        if state.busy {
            return false;
        }
        let encounter_id = state.encounter_id.clone();
        state.reset(encounter_id, welcome_back_message(Utc::now()));
        true
    }

    /// Replaces the active encounter with a stored one. Returns `false` when
    /// the stored encounter is empty or belongs to another owner.
    pub fn resume_encounter(&self, stored: Encounter) -> bool {
        if stored.messages.is_empty() || stored.owner != self.owner {
            return false;
        }

        let mut state = self.lock_state();
        if self.config.flush_on_resume && state.messages.len() > 1 {
            self.queue.enqueue(
                self.owner.clone(),
                state.encounter_id.clone(),
                state.messages.clone(),
            );
        }

        state.encounter_id = stored.encounter_id;
        state.next_seq = next_seq_after(&stored.messages);
        state.messages = stored.messages;
        state.generation += 1;
        state.last_error = None;
        info!(owner = %self.owner, encounter_id = %state.encounter_id, "resumed encounter");
        true
    }

    /// Quick actions are offered until the user has said something.
    pub fn quick_actions(&self) -> &'static [QuickAction] {
        if self.lock_state().messages.len() <= 1 {
            &QUICK_ACTIONS
        } else {
            &[]
        }
    }

    pub async fn send_quick_action(&self, action_id: &str) -> SendOutcome {
        match find_quick_action(action_id) {
            Some(action) => self.send_message(action.message).await,
            None => SendOutcome::Rejected(SendRejection::UnknownQuickAction),
        }
    }

    pub async fn send_message(&self, text: &str) -> SendOutcome {
        let text = text.trim();
        if text.is_empty() {
            return SendOutcome::Rejected(SendRejection::EmptyInput);
        }

        let (generation, encounter_id, snapshot, reply_id, history) = {
            let mut state = self.lock_state();
            if state.busy {
                return SendOutcome::Rejected(SendRejection::Busy);
            }

            let history = context_window(&state.messages, self.config.context_window);
            let user_id = state.next_message_id();
            let reply_id = state.next_message_id();
            state.messages.push(Message::user(user_id, text, Utc::now()));
            state.busy = true;
            state.last_error = None;
            (
                state.generation,
                state.encounter_id.clone(),
                state.messages.clone(),
                reply_id,
                history,
            )
        };

        let request = CompletionRequest::new(text, history).with_requester_id(self.owner.as_str());
        let (content, outcome, error) = match self.completions.complete(request).await {
            Ok(response) => {
                let content = classify_response(&response);
                let kind = content.kind();
                (content, SendOutcome::Answered { kind }, None)
            }
            Err(err) => {
                warn!(
                    owner = %self.owner,
                    encounter_id = %encounter_id,
                    error = %err,
                    "completion failed"
                );
                (
                    MessageContent::Plain(COMPLETION_FAILURE_MESSAGE.to_string()),
                    SendOutcome::Failed,
                    Some(err.to_string()),
                )
            }
        };
        let reply = Message::assistant(reply_id, content, Utc::now());

        let mut state = self.lock_state();
        state.busy = false;
        if error.is_some() {
            state.last_error = error;
        }

        if state.generation == generation {
            state.messages.push(reply);
            self.queue.enqueue(
                self.owner.clone(),
                state.encounter_id.clone(),
                state.messages.clone(),
            );
        } else {
            // The encounter was replaced mid-flight; the reply completes the
            // detached one in storage only.
            let mut detached = snapshot;
            detached.push(reply);
            info!(encounter_id = %encounter_id, "reply arrived for a replaced encounter");
            self.queue.enqueue(self.owner.clone(), encounter_id, detached);
        }

        outcome
    }

    /// Lists stored encounters for selection, newest first.
    pub async fn load_history_index(&self) -> Vec<HistoryEntry> {
        let limit = self.config.history_limit.min(MAX_HISTORY_LIMIT);
        match self.history.fetch_encounters(&self.owner, limit).await {
            Ok(encounters) => {
                let active_id = self.encounter_id();
                encounters
                    .into_iter()
                    .map(|encounter| HistoryEntry {
                        encounter_id: encounter.encounter_id.clone(),
                        created_at: encounter.created_at,
                        updated_at: encounter.updated_at,
                        preview: preview(&encounter.messages),
                        message_count: encounter.messages.len(),
                        is_active: encounter.encounter_id == active_id,
                        encounter,
                    })
                    .collect()
            }
            Err(err) => {
                warn!(owner = %self.owner, error = %err, "failed to load encounter history");
                self.lock_state()
                    .push_notice(NoticeKind::HistoryUnavailable, "Failed to load chat history.");
                Vec::new()
            }
        }
    }

    pub fn render_messages(&self) -> Vec<RenderedMessage> {
        self.lock_state()
            .messages
            .iter()
            .map(|message| RenderedMessage {
                id: message.id.clone(),
                timestamp: message.timestamp,
                tree: render(&message.content, message.role),
            })
            .collect()
    }

    /// Pending notices, including persistence failures reported so far.
    pub fn notices(&self) -> Vec<Notice> {
        self.lock_state().notices.clone()
    }

    pub fn dismiss_notice(&self, notice_id: u64) -> bool {
        let mut state = self.lock_state();
        let before = state.notices.len();
        state.notices.retain(|notice| notice.id != notice_id);
        state.notices.len() != before
    }

    /// Waits for every queued write to finish.
    pub async fn settle(&self) {
        self.queue.settle().await;
    }

    /// Every access first folds in the persistence outcomes reported so far.
    fn lock_state(&self) -> MutexGuard<'_, ControllerState> {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.drain_events();
        state
    }
}

fn new_encounter_id() -> String {
    Uuid::new_v4().to_string()
}

/// An id of `u64::MAX` cannot be followed and is skipped.
fn next_seq_after(messages: &[Message]) -> u64 {
    let highest = messages
        .iter()
        .filter_map(|message| message.id.parse::<u64>().ok())
        .filter(|id| *id < u64::MAX)
        .max()
        .unwrap_or(0);
    highest.max(messages.len() as u64).saturating_add(1)
}

/// The last `window` messages, oldest first, with content flattened to text.
fn context_window(messages: &[Message], window: usize) -> Vec<HistoryTurn> {
    let start = messages.len().saturating_sub(window);
    messages[start..]
        .iter()
        .map(|message| HistoryTurn {
            role: message.role,
            content: message.content.to_transport_text(),
        })
        .collect()
}

/// Structured output is accepted only if it validates, whatever the service claims.
fn classify_response(response: &CompletionResponse) -> MessageContent {
    match validate_structured_json(&response.content) {
        Ok(structured) => MessageContent::Structured(structured),
        Err(err) => {
            if response.kind == CompletionKind::Structured {
                warn!(error = %err, "structured completion failed validation; rendering as text");
            }
            MessageContent::Plain(response.content.clone())
        }
    }
}

/// First user message, else first assistant message; a blank one falls through.
fn preview(messages: &[Message]) -> String {
    let first_text = |role: Role| {
        messages
            .iter()
            .find(|message| message.role == role)
            .map(|message| message.content.to_transport_text())
            .filter(|text| !text.trim().is_empty())
    };

    first_text(Role::User)
        .or_else(|| first_text(Role::Assistant))
        .unwrap_or_else(|| NO_PREVIEW.to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use super::{EncounterController, context_window, next_seq_after, preview};
    use crate::llm::{
        CompletionFuture, CompletionKind, CompletionRequest, CompletionResponse, CompletionService,
    };
    use crate::models::{Message, MessageContent, OwnerId, Role};
    use crate::repos::MemoryHistoryStore;

    struct EchoCompletions;

    impl CompletionService for EchoCompletions {
        fn complete<'a>(&'a self, request: CompletionRequest) -> CompletionFuture<'a> {
            Box::pin(async move {
                Ok(CompletionResponse {
                    content: format!("echo: {}", request.user_message),
                    kind: CompletionKind::Plain,
                    model: None,
                    usage: None,
                })
            })
        }
    }

    #[test]
    fn context_window_keeps_most_recent_messages_in_order() {
        let messages: Vec<Message> = (1..=14)
            .map(|index| Message::user(index.to_string(), format!("m{index}"), Utc::now()))
            .collect();
        let window = context_window(&messages, 10);
        assert_eq!(window.len(), 10);
        assert_eq!(window[0].content, "m5");
        assert_eq!(window[9].content, "m14");
        assert!(window.iter().all(|turn| turn.role == Role::User));
    }

    #[test]
    fn sequence_continues_after_highest_numeric_id() {
        let messages = vec![
            Message::user("1", "a", Utc::now()),
            Message::user("1700000000000", "b", Utc::now()),
            Message::user("not-a-number", "c", Utc::now()),
        ];
        assert_eq!(next_seq_after(&messages), 1_700_000_000_001);
    }

    #[test]
    fn sequence_skips_an_id_that_cannot_be_followed() {
        let messages = vec![
            Message::user("3", "a", Utc::now()),
            Message::user(u64::MAX.to_string(), "b", Utc::now()),
        ];
        assert_eq!(next_seq_after(&messages), 4);
        assert_eq!(
            next_seq_after(&[Message::user(u64::MAX.to_string(), "c", Utc::now())]),
            2
        );
    }

    #[test]
    fn preview_prefers_first_user_message() {
        let messages = vec![
            Message::assistant("1", MessageContent::Plain("hello".to_string()), Utc::now()),
            Message::user("2", "my knee hurts", Utc::now()),
        ];
        assert_eq!(preview(&messages), "my knee hurts");
        assert_eq!(preview(&messages[..1]), "hello");
        assert_eq!(preview(&[]), "No preview available");
    }

    #[test]
    fn preview_falls_back_to_assistant_when_user_text_is_blank() {
        let messages = vec![
            Message::assistant(
                "1",
                MessageContent::Plain("Hello from assistant".to_string()),
                Utc::now(),
            ),
            Message::user("2", "  ", Utc::now()),
        ];
        assert_eq!(preview(&messages), "Hello from assistant");
    }

    #[tokio::test]
    async fn persistence_outcomes_are_consumed_without_polling_notices() {
        let owner = OwnerId::new("owner-1").expect("owner id should be valid");
        let controller = EncounterController::new(
            owner,
            Arc::new(EchoCompletions),
            Arc::new(MemoryHistoryStore::new()),
        );

        for turn in 0..5 {
            controller.send_message(&format!("question {turn}")).await;
            controller.settle().await;
        }
        assert_eq!(controller.messages().len(), 11);

        let mut state = controller.state.lock().expect("state lock should not be poisoned");
        assert!(state.events.try_recv().is_err());
        assert!(state.notices.is_empty());
    }
}
