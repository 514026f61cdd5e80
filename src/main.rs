// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! chainsmith - prompt chains and history-aware chat on local models
//!
//! Entry point for the chainsmith CLI application.

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use crossterm::{
    style::{Color, ResetColor, SetForegroundColor},
    ExecutableCommand,
};

use chainsmith::chain::CodegenPipeline;
use chainsmith::chat::{run_repl, ChatConfig, ChatDriver};
use chainsmith::cli::{AskArgs, ChatArgs, Cli, CodeArgs, Commands};
use chainsmith::config::Settings;
use chainsmith::error::Result;
use chainsmith::history::SessionHistoryStore;
use chainsmith::llm::providers::OllamaProvider;
use chainsmith::rag::{Document, QaConfig, RetrievalQa, TextSplitter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());

    // `RUST_LOG` still takes precedence over these
    if cli.verbose > 0 {
        let level = if cli.verbose > 1 { "trace" } else { "debug" };
        if let Ok(parsed) = format!("chainsmith={}", level).parse() {
            env_filter = env_filter.add_directive(parsed);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .init();

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };
    settings.validate()?;

    let provider = OllamaProvider::with_timeout(
        settings.ollama_base_url(),
        Duration::from_secs(settings.ollama.request_timeout_secs),
    )?;

    match cli.command {
        Commands::Code(args) => run_code(args, provider, &settings).await,
        Commands::Chat(args) => run_chat(args, provider, &settings).await,
        Commands::Ask(args) => run_ask(args, provider, &settings).await,
    }
}

fn print_heading(stdout: &mut io::Stdout, heading: &str) -> Result<()> {
    stdout.execute(SetForegroundColor(Color::Cyan))?;
    writeln!(stdout, "{}", heading)?;
    stdout.execute(ResetColor)?;
    Ok(())
}

fn print_warning(message: &str) -> Result<()> {
    let mut stderr = io::stderr();
    stderr.execute(SetForegroundColor(Color::Yellow))?;
    writeln!(stderr, "{}", message)?;
    stderr.execute(ResetColor)?;
    Ok(())
}

/// Warn, without failing, when Ollama is down or lacks one of `models`
async fn check_ollama(provider: &OllamaProvider, models: &[&str]) -> Result<()> {
    let local = match provider.list_local_models().await {
        Ok(local) => local,
        Err(e) => {
            tracing::debug!(error = %e, "listing local models failed");
            return print_warning(&format!(
                "Ollama is not reachable at {}; replies will fail until it is running.",
                provider.base_url()
            ));
        }
    };

    for model in models {
        let pulled = local
            .iter()
            .any(|name| name == model || *name == format!("{}:latest", model));
        if !pulled {
            print_warning(&format!(
                "Model '{}' is not pulled; run `ollama pull {}` first.",
                model, model
            ))?;
        }
    }
    Ok(())
}

/// Generate a function and its test, then print both
async fn run_code(args: CodeArgs, provider: OllamaProvider, settings: &Settings) -> Result<()> {
    let pipeline = CodegenPipeline::from_settings(Arc::new(provider), settings)?;
    let output = pipeline.run(&args.language, &args.task).await?;

    let mut stdout = io::stdout();
    print_heading(&mut stdout, "THE FUNCTION:")?;
    writeln!(stdout, "{}", output.code)?;
    writeln!(stdout)?;
    print_heading(&mut stdout, "THE TEST:")?;
    writeln!(stdout, "{}", output.test)?;
    Ok(())
}

/// Run the interactive chat loop on stdin/stdout
async fn run_chat(args: ChatArgs, provider: OllamaProvider, settings: &Settings) -> Result<()> {
    let mut config = ChatConfig::from_settings(settings);
    if let Some(session) = args.session {
        config.session_id = session;
    }
    if let Some(model) = args.model {
        config.model = model;
    }
    if args.no_stream {
        config.stream = false;
    }

    check_ollama(&provider, &[config.model.as_str()]).await?;

    let store = Arc::new(SessionHistoryStore::new());
    let driver = ChatDriver::new(store, Arc::new(provider), config)?;

    println!(
        "chainsmith chat ({}), session '{}'. Type /help for commands, /exit to leave.",
        driver.config().model,
        driver.config().session_id
    );

    let stdin = io::stdin();
    run_repl(&driver, stdin.lock(), io::stdout()).await
}

/// Index the documents, then answer the given questions or read them from stdin
async fn run_ask(args: AskArgs, provider: OllamaProvider, settings: &Settings) -> Result<()> {
    let mut config = QaConfig::from_settings(settings);
    if let Some(session) = args.session {
        config.session_id = session;
    }
    if let Some(model) = args.model {
        config.model = model;
    }
    if let Some(top_k) = args.top_k {
        config.top_k = top_k;
    }

    check_ollama(
        &provider,
        &[config.model.as_str(), config.embedding_model.as_str()],
    )
    .await?;

    let documents = args
        .documents
        .iter()
        .map(|path| Document::load(path))
        .collect::<Result<Vec<_>>>()?;
    let splitter = TextSplitter::from_settings(&settings.retrieval)?;

    let provider = Arc::new(provider);
    let store = Arc::new(SessionHistoryStore::new());
    let session_id = config.session_id.clone();
    let mut qa = RetrievalQa::new(store, provider.clone(), provider, config)?;
    let chunks = qa.add_documents(&documents, &splitter).await?;
    eprintln!(
        "Indexed {} chunks from {} documents.",
        chunks,
        documents.len()
    );

    if args.questions.is_empty() {
        println!(
            "chainsmith ask ({}), session '{}'. Type /help for commands, /exit to leave.",
            qa.config().model,
            session_id
        );
        let stdin = io::stdin();
        return run_repl(&qa, stdin.lock(), io::stdout()).await;
    }

    let mut stdout = io::stdout();
    for question in &args.questions {
        let answer = qa.ask(&session_id, question).await?;
        print_heading(&mut stdout, &format!("Q: {}", question))?;
        writeln!(stdout, "{}", answer.text)?;
        for source in &answer.sources {
            writeln!(
                stdout,
                "  [{} #{} score {:.3}]",
                source.chunk.source, source.chunk.index, source.score
            )?;
        }
        writeln!(stdout)?;
    }
    Ok(())
}
