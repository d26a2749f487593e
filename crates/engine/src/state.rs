use sotto_core::{ChatMessage, RequestId};

/// What `submit` did with the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Input was blank after trimming; nothing changed.
    Ignored,
    /// The active slot is taken and the wait queue is at capacity. The
    /// input was not consumed, so the caller keeps its draft.
    RejectedQueueFull,
    /// The request took the free active slot and started immediately.
    Started(RequestId),
    /// The request joined the wait queue at this 1-based position.
    Queued {
        request_id: RequestId,
        position: usize,
    },
}

/// What `stop` found when it ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    Idle,
}

/// Point-in-time view of the engine, republished after every mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSnapshot {
    pub transcript: Vec<ChatMessage>,
    pub status_message: String,
    pub queue_len: usize,
    pub is_active: bool,
    pub is_queue_full: bool,
    pub active_request_id: Option<RequestId>,
}
