use crate::error::RequestError;
use crate::ids::{MessageId, RequestId};
use crate::model::GenerationParameters;

/// Lifecycle phase of the single in-flight request.
#[derive(Debug, Clone, PartialEq)]
pub enum ActiveRequestStatus {
    Preflight,
    Streaming,
    Completed,
    Failed(RequestError),
    Stopped,
}

impl ActiveRequestStatus {
    /// Terminal phases accept no further stream events.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed(_) | Self::Stopped)
    }
}

/// Mutable state for the request occupying the active slot.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveRequestState {
    pub request_id: RequestId,
    pub status: ActiveRequestStatus,
    pub accumulated_text: String,
    pub assistant_message_id: Option<MessageId>,
}

impl ActiveRequestState {
    /// Starts a fresh slot in preflight with an empty output buffer.
    pub fn new(request_id: RequestId) -> Self {
        Self {
            request_id,
            status: ActiveRequestStatus::Preflight,
            accumulated_text: String::new(),
            assistant_message_id: None,
        }
    }
}

/// Everything needed to run one request, frozen at submission time.
///
/// Settings edits made while a request waits in the queue must not leak into
/// it, so provider, model, and parameters are captured here and never
/// re-read from live configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueItemSnapshot {
    pub request_id: RequestId,
    pub prompt: String,
    pub provider_id: String,
    pub model_id: String,
    pub parameters: GenerationParameters,
    pub user_message_id: MessageId,
    pub created_at_unix_seconds: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses_reject_further_events() {
        assert!(!ActiveRequestStatus::Preflight.is_terminal());
        assert!(!ActiveRequestStatus::Streaming.is_terminal());
        assert!(ActiveRequestStatus::Completed.is_terminal());
        assert!(ActiveRequestStatus::Failed(RequestError::Cancelled).is_terminal());
        assert!(ActiveRequestStatus::Stopped.is_terminal());
    }

    #[test]
    fn fresh_slot_starts_in_preflight_with_empty_buffer() {
        let request_id = RequestId::new();
        let state = ActiveRequestState::new(request_id);
        assert_eq!(state.request_id, request_id);
        assert_eq!(state.status, ActiveRequestStatus::Preflight);
        assert!(state.accumulated_text.is_empty());
        assert!(state.assistant_message_id.is_none());
    }
}
