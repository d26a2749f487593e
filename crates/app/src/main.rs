use std::io::Write;
use std::sync::Arc;

use snafu::{ResultExt, Snafu};
use tokio::io::{AsyncBufReadExt, BufReader};

use sotto_core::ChatRole;
use sotto_engine::{
    ChatEngine, EngineConfig, STATUS_RESPONSE_COMPLETE, StopOutcome, SubmitOutcome,
};
use sotto_llm::{MockProvider, ProviderRegistry};
use sotto_settings::{DebouncedSettings, SettingsError, SettingsStore};

#[derive(Debug, Snafu)]
enum AppError {
    #[snafu(display("reading stdin failed: {source}"))]
    ReadInput { source: std::io::Error },
    #[snafu(display("saving settings on exit failed: {source}"))]
    FlushSettings { source: SettingsError },
}

/// Console commands. Anything that does not parse as a command is submitted
/// as a prompt.
#[derive(Debug, PartialEq)]
enum Command {
    Stop,
    Reset,
    Status,
    Temperature(f64),
    Quit,
    Unknown(String),
}

fn parse_command(line: &str) -> Option<Command> {
    let trimmed = line.trim();
    let rest = trimmed.strip_prefix('/')?;
    let mut parts = rest.split_whitespace();
    let command = match parts.next() {
        Some("stop") => Command::Stop,
        Some("reset") => Command::Reset,
        Some("status") => Command::Status,
        Some("temp") => match parts.next().and_then(|raw| raw.parse::<f64>().ok()) {
            Some(value) => Command::Temperature(value),
            None => Command::Unknown(trimmed.to_string()),
        },
        Some("quit") => Command::Quit,
        _ => Command::Unknown(trimmed.to_string()),
    };
    Some(command)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    if let Err(error) = run().await {
        eprintln!("sotto: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    let store = SettingsStore::at_default_path();
    tracing::info!(path = ?store.path(), "loading settings");
    let settings = DebouncedSettings::new(store);

    let mut registry = ProviderRegistry::new();
    registry.register(Arc::new(MockProvider::new()));

    let engine = ChatEngine::new(
        EngineConfig::default(),
        Arc::new(registry),
        settings.clone(),
    );
    tokio::spawn(announce_updates(engine.clone()));

    let current = settings.current();
    println!(
        "sotto ready: provider '{}', model '{}'. Type /quit to exit.",
        current.selected_provider_id, current.selected_model_id
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt();
        let Some(line) = lines.next_line().await.context(ReadInputSnafu)? else {
            break;
        };
        match parse_command(&line) {
            Some(Command::Quit) => break,
            Some(command) => run_command(&engine, &settings, command).await,
            None => submit_prompt(&engine, &line).await,
        }
    }

    settings.flush().context(FlushSettingsSnafu)?;
    println!("goodbye");
    Ok(())
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

async fn submit_prompt(engine: &ChatEngine, line: &str) {
    match engine.submit(line).await {
        SubmitOutcome::Ignored | SubmitOutcome::Started(_) => {}
        SubmitOutcome::RejectedQueueFull => {
            println!("queue full, try again once the current request finishes");
        }
        SubmitOutcome::Queued { position, .. } => {
            println!("queued at position {position}");
        }
    }
}

async fn run_command(engine: &ChatEngine, settings: &DebouncedSettings, command: Command) {
    match command {
        Command::Stop => {
            if engine.stop().await == StopOutcome::Idle {
                println!("nothing to stop");
            }
        }
        Command::Reset => engine.reset().await,
        Command::Status => print_status(engine, settings).await,
        Command::Temperature(value) => {
            if !(0.0..=2.0).contains(&value) {
                println!("temperature must be between 0.0 and 2.0");
                return;
            }
            settings.update(|settings| settings.parameters.temperature = value);
            println!("temperature set to {value:.2}");
        }
        Command::Quit => {}
        Command::Unknown(raw) => println!("unknown command: {raw}"),
    }
}

async fn print_status(engine: &ChatEngine, settings: &DebouncedSettings) {
    let snapshot = engine.snapshot().await;
    let current = settings.current();
    println!("status: {}", snapshot.status_message);
    println!(
        "active: {}, queued: {}/{}",
        snapshot.is_active,
        snapshot.queue_len,
        engine.config().queue_capacity
    );
    println!(
        "provider: {}, model: {}, temperature: {:.2}",
        current.selected_provider_id, current.selected_model_id, current.parameters.temperature
    );
    if let Some(save_status) = settings.save_status() {
        println!("settings: {save_status}");
    }
    println!("transcript: {} messages", snapshot.transcript.len());
}

/// Prints status transitions and finished responses as they happen.
async fn announce_updates(engine: ChatEngine) {
    let mut snapshots = engine.watch_snapshot();
    let mut last_status = snapshots.borrow().status_message.clone();

    while snapshots.changed().await.is_ok() {
        let snapshot = snapshots.borrow().clone();
        if snapshot.status_message == last_status {
            continue;
        }
        last_status = snapshot.status_message.clone();
        println!("[{last_status}]");

        if last_status == STATUS_RESPONSE_COMPLETE
            && let Some(reply) = snapshot
                .transcript
                .iter()
                .rev()
                .find(|message| message.role == ChatRole::Assistant)
        {
            println!("{}", reply.content);
        }
    }
}
