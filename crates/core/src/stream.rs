use crate::error::RequestError;
use crate::ids::RequestId;

/// One event on a provider response stream.
///
/// Every variant carries the id of the request it belongs to. Consumers must
/// drop events whose id no longer matches the active request, because a
/// cancelled provider task may keep emitting for a while.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Started {
        request_id: RequestId,
    },
    Delta {
        request_id: RequestId,
        text: String,
    },
    Completed {
        request_id: RequestId,
    },
    Failed {
        request_id: RequestId,
        error: RequestError,
    },
}

impl StreamEvent {
    /// Returns the request this event belongs to.
    pub fn request_id(&self) -> RequestId {
        match self {
            Self::Started { request_id }
            | Self::Delta { request_id, .. }
            | Self::Completed { request_id }
            | Self::Failed { request_id, .. } => *request_id,
        }
    }

    /// Returns true for events that end the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }
}
