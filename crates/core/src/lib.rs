pub mod error;
pub mod ids;
pub mod message;
pub mod model;
pub mod request;
pub mod settings;
pub mod stream;

pub use error::RequestError;
pub use ids::{MessageId, RequestId};
pub use message::{ChatMessage, ChatRole, now_unix_seconds};
pub use model::{GenerationParameters, ModelCapability, ModelDescriptor};
pub use request::{ActiveRequestState, ActiveRequestStatus, QueueItemSnapshot};
pub use settings::{
    AppSettings, HotkeyBinding, MOCK_DEFAULT_MODEL_ID, MOCK_PROVIDER_ENDPOINT, MOCK_PROVIDER_ID,
    ProviderEntry, ProviderKind, ThemeMode,
};
pub use stream::StreamEvent;
