use std::time::Duration;

pub const DEFAULT_QUEUE_CAPACITY: usize = 5;
pub const DEFAULT_PREFLIGHT_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Limits governing the request lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// How many requests may wait behind the active one.
    pub queue_capacity: usize,
    /// Deadline for the preflight model validation race.
    pub preflight_timeout: Duration,
    /// Deadline covering a stream from its start to a terminal event.
    pub generation_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            preflight_timeout: DEFAULT_PREFLIGHT_TIMEOUT,
            generation_timeout: DEFAULT_GENERATION_TIMEOUT,
        }
    }
}
