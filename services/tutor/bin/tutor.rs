//! Main Entrypoint for the Tutor
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Opening the concept graph and the completion service client.
//! 3. Running either the interactive tutoring loop or a batch ingestion pass.
//! 4. Releasing the graph connection on every exit path.

use anyhow::Context;
use async_openai::config::OpenAIConfig;
use clap::Parser;
use edugraph_core::{
    TutorServices, TutorSession,
    grader::LlmAnswerGrader,
    ingest::{LlmConceptExtractor, ingest_text},
    intent::LlmIntentClassifier,
    ledger::JsonFileLedger,
    llm_client::{CompletionService, OpenAICompatibleClient},
    prompts::PromptSet,
    store::{ConceptStore, SqliteConceptStore},
};
use edugraph_tutor::{
    cli::{Cli, Command},
    config::Config,
    prompts::load_prompts,
    repl::run_turn_loop,
};
use std::{path::Path, sync::Arc};
use tokio::io::{AsyncReadExt, BufReader};
use tracing::{error, info};

/// Resolves when the user presses `Ctrl+C`.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal. Shutting down gracefully...");
}

async fn run_chat(
    config: &Config,
    store: Arc<SqliteConceptStore>,
    llm: Arc<dyn CompletionService>,
    prompts: Arc<PromptSet>,
) -> anyhow::Result<()> {
    let ledger = JsonFileLedger::load(&config.progress_path)
        .context("Failed to load student progress")?;
    info!(path = %ledger.path().display(), "Recording progress");

    let services = TutorServices {
        store,
        classifier: Arc::new(LlmIntentClassifier::new(llm.clone(), prompts.clone())),
        grader: Arc::new(LlmAnswerGrader::new(llm.clone(), prompts.clone())),
        llm,
        prompts,
    };
    let mut session = TutorSession::new(services, Box::new(ledger), config.tutor_config());

    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    let result = tokio::select! {
        result = run_turn_loop(&mut session, stdin, stdout) => result,
        _ = shutdown_signal() => Ok(()),
    };

    session.shutdown().await;
    result
}

async fn run_ingest(
    store: Arc<SqliteConceptStore>,
    llm: Arc<dyn CompletionService>,
    prompts: Arc<PromptSet>,
    path: &Path,
) -> anyhow::Result<()> {
    let text = if path == Path::new("-") {
        let mut text = String::new();
        tokio::io::stdin()
            .read_to_string(&mut text)
            .await
            .context("Failed to read study material from stdin")?;
        text
    } else {
        tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read study material from {}", path.display()))?
    };

    let extractor = LlmConceptExtractor::new(llm, prompts);
    let report = ingest_text(&extractor, store.as_ref(), &text).await?;

    println!(
        "Graph ingestion complete: {} concepts, {} requires edges ({} rejected as cycles).",
        report.concepts, report.edges, report.rejected_edges
    );
    if report.concepts == 0 {
        println!("No concepts found. Check the model output in the logs.");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    // Logs go to stderr so they never interleave with the dialogue on stdout.
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();
    info!("Configuration loaded. Initializing tutor...");

    // --- 3. Initialize Shared Services ---
    let prompts = Arc::new(load_prompts(&config.prompts_path)?);
    let openai_config = OpenAIConfig::new()
        .with_api_key(&config.llm_api_key)
        .with_api_base(&config.llm_base_url);
    let llm: Arc<dyn CompletionService> = Arc::new(OpenAICompatibleClient::new(
        openai_config,
        config.chat_model.clone(),
        config.llm_timeout,
    ));
    info!(
        provider = ?config.provider,
        model = %config.chat_model,
        base_url = %config.llm_base_url,
        "Completion service configured"
    );

    let store = Arc::new(
        SqliteConceptStore::connect(&config.graph_database_url)
            .await
            .context("Failed to open the concept graph")?,
    );

    // --- 4. Run ---
    let result = match cli.into_command() {
        Command::Chat => run_chat(&config, store.clone(), llm, prompts).await,
        Command::Ingest { path } => run_ingest(store.clone(), llm, prompts, &path).await,
    };

    store.close().await;
    info!("Tutor has shut down.");
    result
}
