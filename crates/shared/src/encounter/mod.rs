mod controller;
mod persistence;
mod seeds;

pub use controller::{
    ControllerConfig, EncounterController, EncounterPhase, HistoryEntry, Notice, NoticeKind,
    RenderedMessage, SendOutcome, SendRejection,
};
pub use persistence::{PersistenceEvent, PersistenceQueue};
pub use seeds::{
    COMPLETION_FAILURE_MESSAGE, QUICK_ACTIONS, QuickAction, find_quick_action,
    welcome_back_message, welcome_message,
};
