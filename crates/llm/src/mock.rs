use std::time::Duration;

use snafu::ensure;
use tokio::sync::{mpsc, oneshot};

use sotto_core::{
    ChatMessage, ChatRole, MOCK_DEFAULT_MODEL_ID, MOCK_PROVIDER_ID, ModelCapability,
    ModelDescriptor, RequestError, StreamEvent,
};

use crate::provider::{
    BoxFuture, CompletionRequest, EmptyMessageSetSnafu, LlmProvider, ProviderResult,
    ProviderStreamHandle, ProviderWorker, StreamItem, StreamRequest, make_event_stream,
};

pub const MOCK_VISION_MODEL_ID: &str = "mock-vision-1";

/// Scripted behavior for the mock stream, so callers can rehearse partial
/// output and mid-stream failures without a real backend.
#[derive(Debug, Clone)]
pub struct MockStreamBehavior {
    pub chunks: Vec<String>,
    pub delay_per_chunk: Duration,
    pub fail_after_chunks: Option<usize>,
    pub failure: Option<RequestError>,
}

impl Default for MockStreamBehavior {
    fn default() -> Self {
        Self {
            chunks: vec!["Mock".into(), " response".into(), " streaming".into()],
            delay_per_chunk: Duration::from_millis(50),
            fail_after_chunks: None,
            failure: None,
        }
    }
}

impl MockStreamBehavior {
    /// Emits `after` deltas, then fails with the given error.
    pub fn failing(after: usize, failure: RequestError) -> Self {
        Self {
            fail_after_chunks: Some(after),
            failure: Some(failure),
            ..Self::default()
        }
    }
}

/// Local in-process provider used in development and tests.
pub struct MockProvider {
    behavior: MockStreamBehavior,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::with_behavior(MockStreamBehavior::default())
    }

    pub fn with_behavior(behavior: MockStreamBehavior) -> Self {
        Self { behavior }
    }

    fn catalog() -> Vec<ModelDescriptor> {
        vec![
            ModelDescriptor::new(MOCK_DEFAULT_MODEL_ID, "Mock Text v1", vec![
                ModelCapability::Text,
            ]),
            ModelDescriptor::new(MOCK_VISION_MODEL_ID, "Mock Vision v1", vec![
                ModelCapability::Text,
                ModelCapability::Image,
            ]),
        ]
    }

    fn latest_prompt(messages: &[ChatMessage]) -> String {
        messages
            .iter()
            .rev()
            .find(|message| message.role == ChatRole::User)
            .map(|message| message.content.clone())
            .unwrap_or_default()
    }

    async fn run_stream_worker(
        behavior: MockStreamBehavior,
        request: StreamRequest,
        event_tx: mpsc::UnboundedSender<StreamItem>,
        mut cancel_rx: oneshot::Receiver<()>,
    ) {
        let request_id = request.request_id;
        if event_tx
            .send(Ok(StreamEvent::Started { request_id }))
            .is_err()
        {
            return;
        }

        for (index, chunk) in behavior.chunks.iter().enumerate() {
            if let Some(fail_after) = behavior.fail_after_chunks
                && index >= fail_after
            {
                let error =
                    behavior
                        .failure
                        .clone()
                        .unwrap_or_else(|| RequestError::Remote {
                            provider_id: MOCK_PROVIDER_ID.to_string(),
                            message: "Mock stream failure".to_string(),
                        });
                let _ = event_tx.send(Ok(StreamEvent::Failed { request_id, error }));
                return;
            }

            tokio::select! {
                _ = &mut cancel_rx => {
                    tracing::debug!(request_id = %request_id, "mock stream cancelled");
                    return;
                }
                _ = tokio::time::sleep(behavior.delay_per_chunk) => {}
            }

            if event_tx
                .send(Ok(StreamEvent::Delta {
                    request_id,
                    text: chunk.clone(),
                }))
                .is_err()
            {
                return;
            }
        }

        let _ = event_tx.send(Ok(StreamEvent::Completed { request_id }));
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl LlmProvider for MockProvider {
    fn id(&self) -> &str {
        MOCK_PROVIDER_ID
    }

    fn name(&self) -> &str {
        "Local Mock"
    }

    fn list_models<'a>(&'a self) -> BoxFuture<'a, ProviderResult<Vec<ModelDescriptor>>> {
        Box::pin(async move { Ok(Self::catalog()) })
    }

    fn send_once<'a>(
        &'a self,
        request: CompletionRequest,
    ) -> BoxFuture<'a, ProviderResult<ChatMessage>> {
        Box::pin(async move {
            let reply = format!(
                "Mock[{}] temp={:.2}: {}",
                request.model_id,
                request.parameters.temperature,
                Self::latest_prompt(&request.messages)
            );
            Ok(ChatMessage::assistant(reply))
        })
    }

    fn open_stream(&self, request: StreamRequest) -> ProviderResult<ProviderStreamHandle> {
        ensure!(
            !request.messages.is_empty(),
            EmptyMessageSetSnafu {
                stage: "mock-open-stream",
                request_id: request.request_id,
            }
        );

        let (event_tx, stream, cancel_rx) = make_event_stream(request.request_id);
        let worker: ProviderWorker = Box::pin(Self::run_stream_worker(
            self.behavior.clone(),
            request,
            event_tx,
            cancel_rx,
        ));
        Ok(ProviderStreamHandle { stream, worker })
    }
}
