use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

use sotto_core::{
    ActiveRequestState, ActiveRequestStatus, AppSettings, ChatMessage, MessageId,
    QueueItemSnapshot, RequestError, RequestId, StreamEvent, now_unix_seconds,
};
use sotto_llm::{LlmProvider, ProviderRegistry, ProviderStreamHandle, StreamRequest};
use sotto_settings::DebouncedSettings;

use crate::config::EngineConfig;
use crate::state::{EngineSnapshot, StopOutcome, SubmitOutcome};

pub const STATUS_READY: &str = "Ready";
pub const STATUS_PROCESSING: &str = "Processing...";
pub const STATUS_RESPONSE_COMPLETE: &str = "Response complete";
pub const STATUS_REQUEST_STOPPED: &str = "Request stopped";
pub const STATUS_NO_ACTIVE_REQUEST: &str = "No active request to stop";
pub const STATUS_CONVERSATION_CLEARED: &str = "Conversation cleared";

/// Assistant message left behind when a request is stopped before any
/// output arrived.
pub const STOPPED_PLACEHOLDER: &str = "[Request stopped]";

/// Single-flight request engine over one conversation.
///
/// One request occupies the active slot at a time; further submissions wait
/// in a bounded FIFO queue and every terminal outcome advances it. The
/// handle is cheap to clone and all clones share the same state.
#[derive(Clone)]
pub struct ChatEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    config: EngineConfig,
    registry: Arc<ProviderRegistry>,
    settings: DebouncedSettings,
    state: Mutex<EngineState>,
    snapshot_tx: watch::Sender<EngineSnapshot>,
    snapshot_rx: watch::Receiver<EngineSnapshot>,
}

/// Everything behind the state lock. No lock is held across an await.
struct EngineState {
    transcript: Vec<ChatMessage>,
    active: Option<ActiveRequestState>,
    queue: VecDeque<QueueItemSnapshot>,
    status_message: String,
    pipeline: Option<JoinHandle<()>>,
}

impl EngineState {
    fn new() -> Self {
        Self {
            transcript: Vec::new(),
            active: None,
            queue: VecDeque::new(),
            status_message: STATUS_READY.to_string(),
            pipeline: None,
        }
    }
}

impl ChatEngine {
    pub fn new(
        config: EngineConfig,
        registry: Arc<ProviderRegistry>,
        settings: DebouncedSettings,
    ) -> Self {
        let state = EngineState::new();
        let (snapshot_tx, snapshot_rx) = watch::channel(EngineSnapshot {
            transcript: Vec::new(),
            status_message: state.status_message.clone(),
            queue_len: 0,
            is_active: false,
            is_queue_full: false,
            active_request_id: None,
        });
        Self {
            inner: Arc::new(EngineInner {
                config,
                registry,
                settings,
                state: Mutex::new(state),
                snapshot_tx,
                snapshot_rx,
            }),
        }
    }

    pub fn config(&self) -> EngineConfig {
        self.inner.config
    }

    /// Submits user input. Blank input is ignored; when the active slot is
    /// taken and the queue is at capacity the input is rejected without
    /// touching the transcript, so the caller keeps its draft.
    ///
    /// Provider, model, and parameters are frozen into the request here.
    /// Settings edits made while the request waits do not reach it.
    pub async fn submit(&self, text: impl Into<String>) -> SubmitOutcome {
        let prompt = text.into().trim().to_string();
        if prompt.is_empty() {
            return SubmitOutcome::Ignored;
        }

        let settings = self.inner.settings.current();
        let mut state = self.inner.state.lock().await;

        if state.active.is_some() && state.queue.len() >= self.inner.config.queue_capacity {
            state.status_message = format!(
                "Queue full: request rejected (max {})",
                self.inner.config.queue_capacity
            );
            tracing::warn!(queue_len = state.queue.len(), "submission rejected, queue full");
            self.publish_locked(&state);
            return SubmitOutcome::RejectedQueueFull;
        }

        let user_message = ChatMessage::user(prompt.clone());
        let user_message_id = user_message.id;
        state.transcript.push(user_message);

        let item = QueueItemSnapshot {
            request_id: RequestId::new(),
            prompt,
            provider_id: settings.selected_provider_id.clone(),
            model_id: settings.selected_model_id.clone(),
            parameters: settings.parameters,
            user_message_id,
            created_at_unix_seconds: now_unix_seconds(),
        };
        let request_id = item.request_id;

        let outcome = if state.active.is_none() {
            self.start_request_locked(&mut state, item);
            SubmitOutcome::Started(request_id)
        } else {
            state.queue.push_back(item);
            let position = state.queue.len();
            state.status_message = format!(
                "Queued ({}/{})",
                position, self.inner.config.queue_capacity
            );
            tracing::debug!(request_id = %request_id, position, "request queued");
            SubmitOutcome::Queued {
                request_id,
                position,
            }
        };

        self.publish_locked(&state);
        outcome
    }

    /// Stops the active request, leaving `[Request stopped]` in the
    /// transcript when nothing had streamed yet. The next queued request
    /// starts immediately.
    pub async fn stop(&self) -> StopOutcome {
        let mut state = self.inner.state.lock().await;
        let EngineState {
            active, transcript, ..
        } = &mut *state;
        let Some(active_state) = active.as_mut() else {
            state.status_message = STATUS_NO_ACTIVE_REQUEST.to_string();
            self.publish_locked(&state);
            return StopOutcome::Idle;
        };

        let request_id = active_state.request_id;
        if active_state.accumulated_text.is_empty() {
            transcript.push(ChatMessage::assistant(STOPPED_PLACEHOLDER));
        }
        active_state.status = ActiveRequestStatus::Stopped;

        if let Some(pipeline) = state.pipeline.take() {
            // Aborting drops the consumer and with it the event stream,
            // which signals the provider worker to stop.
            pipeline.abort();
        }
        state.active = None;
        state.status_message = STATUS_REQUEST_STOPPED.to_string();
        tracing::info!(request_id = %request_id, "request stopped");
        self.advance_queue_locked(&mut state);
        self.publish_locked(&state);
        StopOutcome::Stopped
    }

    /// Drops the conversation, the queue, and whatever is in flight.
    pub async fn reset(&self) {
        let mut state = self.inner.state.lock().await;
        if let Some(pipeline) = state.pipeline.take() {
            pipeline.abort();
        }
        state.active = None;
        state.queue.clear();
        state.transcript.clear();
        state.status_message = STATUS_CONVERSATION_CLEARED.to_string();
        tracing::info!("conversation reset");
        self.publish_locked(&state);
    }

    pub async fn transcript(&self) -> Vec<ChatMessage> {
        self.inner.state.lock().await.transcript.clone()
    }

    pub async fn status_message(&self) -> String {
        self.inner.state.lock().await.status_message.clone()
    }

    pub async fn queue_len(&self) -> usize {
        self.inner.state.lock().await.queue.len()
    }

    pub async fn is_active(&self) -> bool {
        self.inner.state.lock().await.active.is_some()
    }

    pub async fn is_queue_full(&self) -> bool {
        self.inner.state.lock().await.queue.len() >= self.inner.config.queue_capacity
    }

    pub async fn active_request_id(&self) -> Option<RequestId> {
        self.inner
            .state
            .lock()
            .await
            .active
            .as_ref()
            .map(|active| active.request_id)
    }

    pub async fn snapshot(&self) -> EngineSnapshot {
        let state = self.inner.state.lock().await;
        self.snapshot_locked(&state)
    }

    /// Receiver over the snapshot published after every mutation.
    pub fn watch_snapshot(&self) -> watch::Receiver<EngineSnapshot> {
        self.inner.snapshot_rx.clone()
    }

    /// Resolves once the active slot and the queue are both empty.
    pub async fn wait_until_idle(&self) {
        let mut snapshots = self.watch_snapshot();
        loop {
            {
                let state = self.inner.state.lock().await;
                if state.active.is_none() && state.queue.is_empty() {
                    return;
                }
            }
            if snapshots.changed().await.is_err() {
                return;
            }
        }
    }

    fn snapshot_locked(&self, state: &EngineState) -> EngineSnapshot {
        EngineSnapshot {
            transcript: state.transcript.clone(),
            status_message: state.status_message.clone(),
            queue_len: state.queue.len(),
            is_active: state.active.is_some(),
            is_queue_full: state.queue.len() >= self.inner.config.queue_capacity,
            active_request_id: state.active.as_ref().map(|active| active.request_id),
        }
    }

    fn publish_locked(&self, state: &EngineState) {
        let _ = self.inner.snapshot_tx.send(self.snapshot_locked(state));
    }

    fn start_request_locked(&self, state: &mut EngineState, item: QueueItemSnapshot) {
        let request_id = item.request_id;
        state.active = Some(ActiveRequestState::new(request_id));
        state.status_message = STATUS_PROCESSING.to_string();
        tracing::info!(
            request_id = %request_id,
            provider_id = %item.provider_id,
            model_id = %item.model_id,
            "request started"
        );

        let engine = self.clone();
        state.pipeline = Some(tokio::spawn(async move {
            engine.run_pipeline(item).await;
        }));
    }

    fn advance_queue_locked(&self, state: &mut EngineState) {
        if let Some(next) = state.queue.pop_front() {
            tracing::debug!(
                request_id = %next.request_id,
                remaining = state.queue.len(),
                "advancing queue"
            );
            self.start_request_locked(state, next);
        }
    }

    async fn run_pipeline(&self, item: QueueItemSnapshot) {
        let request_id = item.request_id;

        // Resolution runs against live settings; only identity and
        // parameters were frozen at submission.
        let settings = self.inner.settings.current();
        let provider = match self.resolve_provider(&settings, &item.provider_id) {
            Ok(provider) => provider,
            Err(error) => {
                self.fail_active(request_id, error).await;
                return;
            }
        };

        if let Err(error) = self.preflight(provider.as_ref(), &item).await {
            self.fail_active(request_id, error).await;
            return;
        }

        let context = {
            let mut state = self.inner.state.lock().await;
            let Some(active) = state.active.as_mut() else {
                tracing::debug!(request_id = %request_id, "slot cleared during preflight, abandoning");
                return;
            };
            if active.request_id != request_id {
                tracing::debug!(request_id = %request_id, "slot reassigned during preflight, abandoning");
                return;
            }
            active.status = ActiveRequestStatus::Streaming;
            let context = context_for(&state.transcript, item.user_message_id);
            self.publish_locked(&state);
            context
        };

        let request = StreamRequest::new(request_id, item.model_id.clone(), context)
            .with_parameters(item.parameters);
        let handle = match provider.open_stream(request) {
            Ok(handle) => handle,
            Err(error) => {
                self.fail_active(
                    request_id,
                    RequestError::Remote {
                        provider_id: item.provider_id.clone(),
                        message: error.to_string(),
                    },
                )
                .await;
                return;
            }
        };

        self.consume_stream(&item, handle).await;
    }

    fn resolve_provider(
        &self,
        settings: &AppSettings,
        provider_id: &str,
    ) -> Result<Arc<dyn LlmProvider>, RequestError> {
        let Some(entry) = settings.provider(provider_id) else {
            return Err(RequestError::ProviderMissing {
                provider_id: provider_id.to_string(),
            });
        };
        if !entry.enabled {
            return Err(RequestError::ProviderDisabled {
                provider_id: provider_id.to_string(),
            });
        }
        let Some(provider) = self.inner.registry.lookup(provider_id) else {
            return Err(RequestError::ProviderNotRegistered {
                provider_id: provider_id.to_string(),
            });
        };
        Ok(provider)
    }

    /// Validates the requested model against the provider's catalog, racing
    /// the listing call against the preflight deadline. The losing side is
    /// dropped.
    async fn preflight(
        &self,
        provider: &dyn LlmProvider,
        item: &QueueItemSnapshot,
    ) -> Result<(), RequestError> {
        let deadline = self.inner.config.preflight_timeout;
        let models = match tokio::time::timeout(deadline, provider.list_models()).await {
            Ok(Ok(models)) => models,
            Ok(Err(error)) => {
                return Err(RequestError::Remote {
                    provider_id: item.provider_id.clone(),
                    message: error.to_string(),
                });
            }
            Err(_) => {
                return Err(RequestError::PreflightTimeout {
                    seconds: deadline.as_secs_f64(),
                });
            }
        };

        if models.iter().any(|model| model.id == item.model_id) {
            Ok(())
        } else {
            Err(RequestError::ModelInvalid {
                provider_id: item.provider_id.clone(),
                model_id: item.model_id.clone(),
            })
        }
    }

    /// Drains the event stream against a single generation deadline armed
    /// for the whole stream. Exiting by any path drops the stream, which
    /// cancels the provider worker.
    async fn consume_stream(&self, item: &QueueItemSnapshot, handle: ProviderStreamHandle) {
        let ProviderStreamHandle { mut stream, worker } = handle;
        tokio::spawn(worker);

        let deadline = tokio::time::sleep(self.inner.config.generation_timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => {
                    tracing::warn!(request_id = %item.request_id, "generation deadline elapsed");
                    self.fail_active(
                        item.request_id,
                        RequestError::GenerationTimeout {
                            seconds: self.inner.config.generation_timeout.as_secs_f64(),
                        },
                    )
                    .await;
                    break;
                }
                received = stream.recv() => {
                    match received {
                        Some(Ok(event)) => {
                            if self.apply_stream_event(item, event).await {
                                break;
                            }
                        }
                        Some(Err(error)) => {
                            self.fail_active(
                                item.request_id,
                                RequestError::Remote {
                                    provider_id: item.provider_id.clone(),
                                    message: error.to_string(),
                                },
                            )
                            .await;
                            break;
                        }
                        None => {
                            // Channel closed without a terminal event:
                            // treated as a normal completion.
                            self.complete_active(item.request_id).await;
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Routes one event. Returns true once this request reached a terminal
    /// state and consumption should end.
    async fn apply_stream_event(&self, item: &QueueItemSnapshot, event: StreamEvent) -> bool {
        match event {
            StreamEvent::Started { request_id } => {
                tracing::debug!(request_id = %request_id, "stream started");
                false
            }
            StreamEvent::Delta { request_id, text } => {
                self.apply_delta(request_id, text).await;
                false
            }
            StreamEvent::Completed { request_id } => {
                self.complete_active(request_id).await;
                request_id == item.request_id
            }
            StreamEvent::Failed { request_id, error } => {
                self.fail_active(request_id, error).await;
                request_id == item.request_id
            }
        }
    }

    /// Appends streamed text to the active request's buffer and mirrors the
    /// full buffer into its assistant message, creating the message on the
    /// first delta.
    ///
    /// The stale guard runs first: the event's request id must match the
    /// active slot and the slot must be non-terminal. Task cancellation
    /// alone is not enough, a provider may emit between the cancel signal
    /// and its teardown.
    async fn apply_delta(&self, request_id: RequestId, text: String) {
        let mut state = self.inner.state.lock().await;
        let EngineState {
            active, transcript, ..
        } = &mut *state;
        let Some(active_state) = active.as_mut() else {
            tracing::debug!(request_id = %request_id, "delta after slot cleared, discarded");
            return;
        };
        if active_state.request_id != request_id || active_state.status.is_terminal() {
            tracing::debug!(request_id = %request_id, "stale delta discarded");
            return;
        }

        active_state.accumulated_text.push_str(&text);
        match active_state.assistant_message_id {
            Some(message_id) => {
                if let Some(message) = transcript.iter_mut().find(|message| message.id == message_id)
                {
                    message.content = active_state.accumulated_text.clone();
                }
            }
            None => {
                let message = ChatMessage::assistant(active_state.accumulated_text.clone());
                active_state.assistant_message_id = Some(message.id);
                transcript.push(message);
            }
        }
        self.publish_locked(&state);
    }

    async fn complete_active(&self, request_id: RequestId) {
        let mut state = self.inner.state.lock().await;
        let Some(active_state) = state.active.as_mut() else {
            tracing::debug!(request_id = %request_id, "completion after slot cleared, discarded");
            return;
        };
        if active_state.request_id != request_id || active_state.status.is_terminal() {
            tracing::debug!(request_id = %request_id, "stale completion discarded");
            return;
        }

        active_state.status = ActiveRequestStatus::Completed;
        state.status_message = STATUS_RESPONSE_COMPLETE.to_string();
        tracing::info!(request_id = %request_id, "request completed");
        self.finish_locked(&mut state);
    }

    async fn fail_active(&self, request_id: RequestId, error: RequestError) {
        let mut state = self.inner.state.lock().await;
        let EngineState {
            active, transcript, ..
        } = &mut *state;
        let Some(active_state) = active.as_mut() else {
            tracing::debug!(request_id = %request_id, %error, "failure after slot cleared, discarded");
            return;
        };
        if active_state.request_id != request_id || active_state.status.is_terminal() {
            tracing::debug!(request_id = %request_id, %error, "stale failure discarded");
            return;
        }

        let description = error.to_string();
        if active_state.accumulated_text.is_empty() {
            // Nothing streamed yet, so the failure becomes the reply.
            // Partial output, when present, stays untouched.
            transcript.push(ChatMessage::assistant(format!("Error: {description}")));
        }
        active_state.status = ActiveRequestStatus::Failed(error);
        state.status_message = description;
        tracing::warn!(request_id = %request_id, status = %state.status_message, "request failed");
        self.finish_locked(&mut state);
    }

    /// Terminal tail shared by completion and failure: the pipeline handle
    /// is dropped without aborting because the caller is that very task.
    fn finish_locked(&self, state: &mut EngineState) {
        state.pipeline.take();
        state.active = None;
        self.advance_queue_locked(state);
        self.publish_locked(state);
    }
}

/// Transcript prefix through the originating user message, inclusive. When
/// the message is gone the full transcript stands in.
fn context_for(transcript: &[ChatMessage], user_message_id: MessageId) -> Vec<ChatMessage> {
    match transcript
        .iter()
        .position(|message| message.id == user_message_id)
    {
        Some(index) => transcript[..=index].to_vec(),
        None => transcript.to_vec(),
    }
}
