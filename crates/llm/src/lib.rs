mod mock;
mod provider;
mod registry;

pub use mock::{MOCK_VISION_MODEL_ID, MockProvider, MockStreamBehavior};
pub use provider::{
    BoxFuture, CompletionRequest, LlmProvider, ProviderError, ProviderEventStream, ProviderResult,
    ProviderStreamHandle, ProviderWorker, StreamItem, StreamRequest, make_event_stream,
};
pub use registry::ProviderRegistry;
