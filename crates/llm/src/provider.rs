use snafu::Snafu;
use tokio::sync::{mpsc, oneshot};

pub use futures::future::BoxFuture;

use sotto_core::{ChatMessage, GenerationParameters, ModelDescriptor, RequestId, StreamEvent};

/// Conversation context for one non-streaming completion.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model_id: String,
    pub messages: Vec<ChatMessage>,
    pub parameters: GenerationParameters,
}

impl CompletionRequest {
    pub fn new(model_id: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model_id: model_id.into(),
            messages,
            parameters: GenerationParameters::standard(),
        }
    }

    pub fn with_parameters(mut self, parameters: GenerationParameters) -> Self {
        self.parameters = parameters;
        self
    }
}

/// Conversation context for one streaming generation.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRequest {
    pub request_id: RequestId,
    pub model_id: String,
    pub messages: Vec<ChatMessage>,
    pub parameters: GenerationParameters,
}

impl StreamRequest {
    pub fn new(
        request_id: RequestId,
        model_id: impl Into<String>,
        messages: Vec<ChatMessage>,
    ) -> Self {
        Self {
            request_id,
            model_id: model_id.into(),
            messages,
            parameters: GenerationParameters::standard(),
        }
    }

    pub fn with_parameters(mut self, parameters: GenerationParameters) -> Self {
        self.parameters = parameters;
        self
    }
}

/// Detached emission task returned by `open_stream`; the caller decides
/// where it runs.
pub type ProviderWorker = BoxFuture<'static, ()>;
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Transport-level failures raised by provider implementations.
///
/// Distinct from the user-facing request outcome: the lifecycle engine wraps
/// whatever surfaces here into its own remote-error classification.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderError {
    #[snafu(display("model listing failed on `{stage}`: {message}"))]
    ListModels {
        stage: &'static str,
        provider_id: String,
        message: String,
    },
    #[snafu(display("completion failed on `{stage}`: {message}"))]
    Completion {
        stage: &'static str,
        provider_id: String,
        message: String,
    },
    #[snafu(display("stream request for {request_id} has no messages"))]
    EmptyMessageSet {
        stage: &'static str,
        request_id: RequestId,
    },
    #[snafu(display("stream transport failed on `{stage}`: {message}"))]
    StreamTransport {
        stage: &'static str,
        provider_id: String,
        message: String,
    },
}

/// Item on the event channel: a lifecycle event, or a transport failure that
/// ends the stream.
pub type StreamItem = Result<StreamEvent, ProviderError>;

pub struct ProviderEventStream {
    request_id: RequestId,
    events: mpsc::UnboundedReceiver<StreamItem>,
    cancel_tx: Option<oneshot::Sender<()>>,
}

pub struct ProviderStreamHandle {
    pub stream: ProviderEventStream,
    pub worker: ProviderWorker,
}

impl std::fmt::Debug for ProviderStreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderStreamHandle").finish_non_exhaustive()
    }
}

impl ProviderEventStream {
    pub(crate) fn new(
        request_id: RequestId,
        events: mpsc::UnboundedReceiver<StreamItem>,
        cancel_tx: oneshot::Sender<()>,
    ) -> Self {
        Self {
            request_id,
            events,
            cancel_tx: Some(cancel_tx),
        }
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub async fn recv(&mut self) -> Option<StreamItem> {
        self.events.recv().await
    }

    pub fn try_recv(&mut self) -> Option<StreamItem> {
        self.events.try_recv().ok()
    }

    pub fn cancel(&mut self) -> bool {
        self.cancel_tx
            .take()
            .map(|tx| tx.send(()).is_ok())
            .unwrap_or(false)
    }
}

impl Drop for ProviderEventStream {
    fn drop(&mut self) {
        if let Some(cancel_tx) = self.cancel_tx.take() {
            let _ = cancel_tx.send(());
        }
    }
}

/// Runtime implementation behind one configured provider id.
///
/// `open_stream` hands back the event stream together with an unstarted
/// worker future; the caller decides where the worker runs. Workers must
/// stop promptly once the cancel signal fires or the event channel closes,
/// and must emit at most one terminal event. Ending the channel without a
/// terminal event is a legal way to finish.
pub trait LlmProvider: Send + Sync {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn list_models<'a>(&'a self) -> BoxFuture<'a, ProviderResult<Vec<ModelDescriptor>>>;
    fn send_once<'a>(
        &'a self,
        request: CompletionRequest,
    ) -> BoxFuture<'a, ProviderResult<ChatMessage>>;
    fn open_stream(&self, request: StreamRequest) -> ProviderResult<ProviderStreamHandle>;
}

pub fn make_event_stream(
    request_id: RequestId,
) -> (
    mpsc::UnboundedSender<StreamItem>,
    ProviderEventStream,
    oneshot::Receiver<()>,
) {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (cancel_tx, cancel_rx) = oneshot::channel();
    (
        event_tx,
        ProviderEventStream::new(request_id, event_rx, cancel_tx),
        cancel_rx,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dropping_the_stream_fires_the_cancel_signal() {
        let request_id = RequestId::new();
        let (_event_tx, stream, mut cancel_rx) = make_event_stream(request_id);
        assert_eq!(stream.request_id(), request_id);

        drop(stream);
        cancel_rx
            .try_recv()
            .expect("drop should have sent the cancel signal");
    }

    #[tokio::test]
    async fn explicit_cancel_consumes_the_sender() {
        let (_event_tx, mut stream, mut cancel_rx) = make_event_stream(RequestId::new());
        assert!(stream.cancel());
        assert!(!stream.cancel());
        cancel_rx.try_recv().expect("cancel should be observable");
    }
}
