#![allow(dead_code)]

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tempfile::TempDir;

use sotto_core::{
    ChatMessage, ChatRole, ModelCapability, ModelDescriptor, RequestId, StreamEvent,
};
use sotto_engine::{ChatEngine, EngineConfig};
use sotto_llm::{
    BoxFuture, CompletionRequest, LlmProvider, ProviderError, ProviderRegistry, ProviderResult,
    ProviderStreamHandle, StreamRequest, make_event_stream,
};
use sotto_settings::{DebouncedSettings, SettingsStore};

/// Engine wired to a throwaway settings directory. The directory guard must
/// stay alive for the duration of the test.
pub struct EngineFixture {
    pub engine: ChatEngine,
    pub settings: DebouncedSettings,
    _config_dir: TempDir,
}

pub fn fixture(providers: Vec<Arc<dyn LlmProvider>>) -> EngineFixture {
    let config_dir = TempDir::new().expect("temp settings dir");
    let store = SettingsStore::new(config_dir.path().join("settings.json"));
    let settings = DebouncedSettings::new(store);

    let mut registry = ProviderRegistry::new();
    for provider in providers {
        registry.register(provider);
    }

    let engine = ChatEngine::new(EngineConfig::default(), Arc::new(registry), settings.clone());
    EngineFixture {
        engine,
        settings,
        _config_dir: config_dir,
    }
}

/// How a scripted stream plays out once opened.
#[derive(Debug, Clone)]
pub enum StreamScript {
    /// Emit these deltas, then a completion event.
    Complete(Vec<&'static str>),
    /// Emit these deltas, then stay silent until cancelled.
    ThenHang(Vec<&'static str>),
    /// Emit these deltas, then close the channel with no terminal event.
    CloseSilently(Vec<&'static str>),
    /// Emit these deltas, then a transport failure.
    TransportError(Vec<&'static str>),
    /// Emit one delta, one delta under a fabricated request id, then
    /// complete.
    ForeignDelta,
    /// Stay silent until cancelled, then emit a late delta and completion
    /// anyway.
    EmitAfterCancel,
}

/// Provider double registered under the default `mock` id. Records every
/// stream request it receives so tests can inspect frozen parameters.
pub struct ScriptedProvider {
    script: StreamScript,
    preflight_delay: Option<Duration>,
    requests: Arc<Mutex<Vec<StreamRequest>>>,
}

impl ScriptedProvider {
    pub fn new(script: StreamScript) -> Self {
        Self {
            script,
            preflight_delay: None,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_preflight_delay(mut self, delay: Duration) -> Self {
        self.preflight_delay = Some(delay);
        self
    }

    pub fn recorded_requests(&self) -> Vec<StreamRequest> {
        lock_unpoisoned(&self.requests).clone()
    }
}

fn catalog() -> Vec<ModelDescriptor> {
    vec![ModelDescriptor::new("mock-text-1", "Mock Text v1", vec![
        ModelCapability::Text,
    ])]
}

impl LlmProvider for ScriptedProvider {
    fn id(&self) -> &str {
        "mock"
    }

    fn name(&self) -> &str {
        "Scripted Mock"
    }

    fn list_models<'a>(&'a self) -> BoxFuture<'a, ProviderResult<Vec<ModelDescriptor>>> {
        let delay = self.preflight_delay;
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            Ok(catalog())
        })
    }

    fn send_once<'a>(
        &'a self,
        _request: CompletionRequest,
    ) -> BoxFuture<'a, ProviderResult<ChatMessage>> {
        Box::pin(async { Ok(ChatMessage::assistant("scripted reply")) })
    }

    fn open_stream(&self, request: StreamRequest) -> ProviderResult<ProviderStreamHandle> {
        lock_unpoisoned(&self.requests).push(request.clone());
        let request_id = request.request_id;
        let script = self.script.clone();
        let (event_tx, stream, cancel_rx) = make_event_stream(request_id);

        let worker = Box::pin(async move {
            let _ = event_tx.send(Ok(StreamEvent::Started { request_id }));
            match script {
                StreamScript::Complete(chunks) => {
                    for chunk in chunks {
                        let _ = event_tx.send(Ok(StreamEvent::Delta {
                            request_id,
                            text: chunk.to_string(),
                        }));
                    }
                    let _ = event_tx.send(Ok(StreamEvent::Completed { request_id }));
                }
                StreamScript::ThenHang(chunks) => {
                    for chunk in chunks {
                        let _ = event_tx.send(Ok(StreamEvent::Delta {
                            request_id,
                            text: chunk.to_string(),
                        }));
                    }
                    let _ = cancel_rx.await;
                }
                StreamScript::CloseSilently(chunks) => {
                    for chunk in chunks {
                        let _ = event_tx.send(Ok(StreamEvent::Delta {
                            request_id,
                            text: chunk.to_string(),
                        }));
                    }
                }
                StreamScript::TransportError(chunks) => {
                    for chunk in chunks {
                        let _ = event_tx.send(Ok(StreamEvent::Delta {
                            request_id,
                            text: chunk.to_string(),
                        }));
                    }
                    let _ = event_tx.send(Err(ProviderError::StreamTransport {
                        stage: "read_chunk",
                        provider_id: "mock".to_string(),
                        message: "socket closed".to_string(),
                    }));
                }
                StreamScript::ForeignDelta => {
                    let _ = event_tx.send(Ok(StreamEvent::Delta {
                        request_id,
                        text: "real".to_string(),
                    }));
                    let _ = event_tx.send(Ok(StreamEvent::Delta {
                        request_id: RequestId::new(),
                        text: " ghost".to_string(),
                    }));
                    let _ = event_tx.send(Ok(StreamEvent::Completed { request_id }));
                }
                StreamScript::EmitAfterCancel => {
                    let _ = cancel_rx.await;
                    let _ = event_tx.send(Ok(StreamEvent::Delta {
                        request_id,
                        text: "late".to_string(),
                    }));
                    let _ = event_tx.send(Ok(StreamEvent::Completed { request_id }));
                }
            }
        });

        Ok(ProviderStreamHandle { stream, worker })
    }
}

pub fn roles(transcript: &[ChatMessage]) -> Vec<ChatRole> {
    transcript.iter().map(|message| message.role).collect()
}

pub fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
