use snafu::Snafu;

/// Terminal classification for a request that did not complete normally.
///
/// Display strings are user-facing: they become the status line and, when a
/// request fails before producing any output, the body of a synthetic
/// assistant message.
#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(visibility(pub))]
pub enum RequestError {
    #[snafu(display("Provider '{provider_id}' not found in configuration"))]
    ProviderMissing { provider_id: String },

    #[snafu(display("Provider '{provider_id}' is disabled"))]
    ProviderDisabled { provider_id: String },

    #[snafu(display("No runtime implementation registered for provider '{provider_id}'"))]
    ProviderNotRegistered { provider_id: String },

    #[snafu(display("Model '{model_id}' is not available from provider '{provider_id}'"))]
    ModelInvalid {
        provider_id: String,
        model_id: String,
    },

    #[snafu(display("Preflight validation timed out after {seconds:.1}s"))]
    PreflightTimeout { seconds: f64 },

    #[snafu(display("Generation timed out after {seconds:.0}s"))]
    GenerationTimeout { seconds: f64 },

    #[snafu(display("Remote error from '{provider_id}': {message}"))]
    Remote {
        provider_id: String,
        message: String,
    },

    #[snafu(display("Request queue is full (max {capacity})"))]
    QueueFull { capacity: usize },

    #[snafu(display("Request was cancelled"))]
    Cancelled,
}
