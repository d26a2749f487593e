mod config;
mod engine;
mod state;

pub use config::{
    DEFAULT_GENERATION_TIMEOUT, DEFAULT_PREFLIGHT_TIMEOUT, DEFAULT_QUEUE_CAPACITY, EngineConfig,
};
pub use engine::{
    ChatEngine, STATUS_CONVERSATION_CLEARED, STATUS_NO_ACTIVE_REQUEST, STATUS_PROCESSING,
    STATUS_READY, STATUS_REQUEST_STOPPED, STATUS_RESPONSE_COMPLETE, STOPPED_PLACEHOLDER,
};
pub use state::{EngineSnapshot, StopOutcome, SubmitOutcome};
