//! `itzai ask` — Single-question or interactive mode over loaded documents.

use itzai_config::AppConfig;
use itzai_core::document::{DocumentSlot, DocumentSource};
use itzai_pipeline::{
    PdfExtractor, PromptAssembler, QueryEngine, QueryResult, SessionId, SessionRegistry,
    SessionView, SlotStatus, Trigger, TriggerOutcome,
};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{self, AsyncBufReadExt, BufReader};

pub struct AskOptions {
    pub history: Option<PathBuf>,
    pub protocol: Option<PathBuf>,
    pub use_protocol: bool,
    pub message: Option<String>,
}

/// One line of interactive input.
#[derive(Debug, PartialEq)]
enum Input {
    Question(String),
    Load { slot: DocumentSlot, path: PathBuf },
    Protocol(bool),
    Status,
    Help,
    Exit,
    Invalid(String),
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();

    if matches!(line, "exit" | "quit" | "/exit" | "/quit" | ":q") {
        return Input::Exit;
    }

    let Some(command) = line.strip_prefix('/') else {
        return Input::Question(line.to_string());
    };

    let mut parts = command.splitn(3, char::is_whitespace);
    match (parts.next(), parts.next(), parts.next()) {
        (Some("status"), None, None) => Input::Status,
        (Some("help"), None, None) => Input::Help,
        (Some("protocol"), Some("on"), None) => Input::Protocol(true),
        (Some("protocol"), Some("off"), None) => Input::Protocol(false),
        (Some("load"), Some(slot), Some(path)) if !path.trim().is_empty() => {
            match slot.parse::<DocumentSlot>() {
                Ok(slot) => Input::Load {
                    slot,
                    path: PathBuf::from(path.trim()),
                },
                Err(e) => Input::Invalid(e),
            }
        }
        _ => Input::Invalid(format!("unknown command '/{command}' (try /help)")),
    }
}

pub async fn run(options: AskOptions) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Check for API key early — give a clear error
    if !config.has_api_key() && config.default_provider != "ollama" {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    GEMINI_API_KEY=...       (default provider)");
        eprintln!("    OPENROUTER_API_KEY=...   (with default_provider = \"openrouter\")");
        eprintln!("    ITZAI_API_KEY=...        (generic)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let router = itzai_providers::router::build_from_config(&config);
    let provider = router.default().ok_or("No default provider configured")?;
    let engine = Arc::new(QueryEngine::from_config(provider, &config));
    let registry = SessionRegistry::new(Arc::new(PdfExtractor::new()), engine.clone())
        .with_assembler(PromptAssembler::from_config(&config));
    let session = registry.open().await;

    let history = options
        .history
        .unwrap_or_else(|| config.documents.history_path.clone());
    load(&registry, &session, DocumentSlot::Primary, history).await?;

    if let Some(protocol) = options.protocol.or_else(|| config.documents.protocol_path.clone()) {
        load(&registry, &session, DocumentSlot::Supplementary, protocol).await?;
    }

    let include = options.use_protocol || config.documents.include_protocol;
    registry
        .dispatch(&session, Trigger::SetIncludeSupplementary(include))
        .await?;

    if let Some(question) = options.message {
        // Single question mode
        eprint!("  Analyzing...");
        let result = analyze(&registry, &session, question).await?;
        eprint!("\r               \r");
        print_answer(&result.into_answer()?);
        return Ok(());
    }

    // Interactive mode
    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║        ItzAI Assistant — Interactive Mode      ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Provider:  {}", engine.provider_name());
    println!("  Model:     {}", engine.model());
    print_status(&registry.view(&session).await?);
    println!();
    print_help();
    println!();

    let mut lines = BufReader::new(io::stdin()).lines();
    prompt()?;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            prompt()?;
            continue;
        }

        match parse_input(&line) {
            Input::Exit => break,
            Input::Question(question) => {
                eprint!("  ...");
                let result = analyze(&registry, &session, question).await?;
                eprint!("\r     \r");
                print_result(&result);
            }
            Input::Load { slot, path } => load(&registry, &session, slot, path).await?,
            Input::Protocol(enabled) => {
                registry
                    .dispatch(&session, Trigger::SetIncludeSupplementary(enabled))
                    .await?;
                let view = registry.view(&session).await?;
                if enabled && !view.supplementary.loaded {
                    println!("  Protocol enabled, but none is loaded (use /load protocol PATH)");
                } else {
                    println!("  Protocol {}", if enabled { "enabled" } else { "disabled" });
                }
            }
            Input::Status => print_status(&registry.view(&session).await?),
            Input::Help => print_help(),
            Input::Invalid(reason) => eprintln!("  [Error] {reason}"),
        }

        println!();
        prompt()?;
    }

    registry.close(&session).await;
    println!();
    println!("  Goodbye!");
    println!();

    Ok(())
}

async fn load(
    registry: &SessionRegistry,
    session: &SessionId,
    slot: DocumentSlot,
    path: PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    let trigger = Trigger::LoadDocument {
        slot,
        source: DocumentSource::Path(path),
    };
    match registry.dispatch(session, trigger).await? {
        TriggerOutcome::Loaded { slot, chars } => {
            println!("  ✅ Loaded {} ({} characters)", slot.label().to_lowercase(), chars)
        }
        TriggerOutcome::LoadFailed { slot, error } => {
            eprintln!("  ❌ Could not load {}: {error}", slot.label().to_lowercase())
        }
        other => tracing::debug!(?other, "Unexpected load outcome"),
    }
    Ok(())
}

async fn analyze(
    registry: &SessionRegistry,
    session: &SessionId,
    question: String,
) -> Result<QueryResult, Box<dyn std::error::Error>> {
    registry
        .dispatch(session, Trigger::EditQuestion(question))
        .await?;
    match registry.dispatch(session, Trigger::Analyze).await? {
        TriggerOutcome::Settled(result) => Ok(result),
        other => Err(format!("query cycle did not settle: {other:?}").into()),
    }
}

fn print_result(result: &QueryResult) {
    match (result.answer(), result.error()) {
        (Some(answer), _) => print_answer(answer),
        (None, Some(err)) => eprintln!("  [Error] {err}"),
        (None, None) => {}
    }
}

fn print_answer(answer: &str) {
    println!();
    for line in answer.lines() {
        println!("  {line}");
    }
}

fn print_status(view: &SessionView) {
    println!("  History:   {}", describe_slot(&view.primary));
    println!("  Protocol:  {}", describe_slot(&view.supplementary));
    println!(
        "  Include protocol: {}",
        if view.include_supplementary { "yes" } else { "no" }
    );
    if let Some(err) = &view.primary_error {
        println!("  Last history error:  {err}");
    }
    if let Some(err) = &view.supplementary_error {
        println!("  Last protocol error: {err}");
    }
}

fn describe_slot(status: &SlotStatus) -> String {
    match (&status.source, status.loaded_at) {
        (Some(source), Some(loaded_at)) if status.loaded => format!(
            "{source} ({} chars, loaded {})",
            status.chars,
            loaded_at.with_timezone(&chrono::Local).format("%d/%m/%Y %H:%M")
        ),
        _ => "not loaded".into(),
    }
}

fn print_help() {
    println!("  Type a question and press Enter.");
    println!("  Commands: /load history|protocol PATH, /protocol on|off, /status, /help");
    println!("  Type 'exit' or Ctrl+C to quit.");
}

fn prompt() -> std::io::Result<()> {
    print!("  You > ");
    std::io::stdout().flush()
}
