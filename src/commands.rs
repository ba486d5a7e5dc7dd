use std::io::Write as _;
use std::path::Path;

use anyhow::{Context, bail};
use dialoguer::Confirm;
use quarry_core::bootstrap::{
    AppBuilder, build_app, build_session_service, check_domain, create_provider,
};
use quarry_core::ChatRequest;
use quarry_llm::AnyProvider;
use quarry_memory::{DomainIndex, SplitterConfig, TextSplitter};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Index handle for management commands. Only ingestion needs a reachable
/// embedder, so the health check runs only when `embeddings` is set.
async fn open_index(builder: &AppBuilder, embeddings: bool) -> anyhow::Result<DomainIndex<AnyProvider>> {
    let provider = if embeddings {
        builder.build_provider().await?
    } else {
        create_provider(builder.config())?
    };
    builder.build_index(provider.as_ref())
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn ask(
    builder: &AppBuilder,
    query: String,
    domain: Option<String>,
    chat_id: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let (_, chat) = build_app(builder).await?;
    let outcome = chat
        .handle(ChatRequest {
            query,
            domain,
            chat_id,
        })
        .await?;

    if json {
        return print_json(&outcome);
    }
    println!("{}", outcome.answer);
    if !outcome.sources.is_empty() {
        println!("\nSources: {}", outcome.sources.join(", "));
    }
    eprintln!("chat id: {}", outcome.chat_id);
    Ok(())
}

pub async fn chat(
    builder: &AppBuilder,
    domain: Option<String>,
    mut chat_id: Option<String>,
    trace: bool,
) -> anyhow::Result<()> {
    let (_, chat) = build_app(builder).await?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("you> ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line.context("failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if matches!(query, "exit" | "quit") {
            break;
        }

        let outcome = chat
            .handle(ChatRequest {
                query: query.to_owned(),
                domain: domain.clone(),
                chat_id: chat_id.clone(),
            })
            .await?;
        println!("quarry> {}", outcome.answer);
        if trace {
            for step in &outcome.reasoning_chain {
                eprintln!("  - {step}");
            }
        }
        chat_id = Some(outcome.chat_id);
    }

    println!();
    if let Some(id) = chat_id {
        eprintln!("chat id: {id}");
    }
    Ok(())
}

pub async fn domain_create(builder: &AppBuilder, domain: &str) -> anyhow::Result<()> {
    let domain = check_domain(domain)?;
    let index = open_index(builder, false).await?;
    let status = index.ensure_domain(&domain).await?;
    print_json(&status)
}

pub async fn domain_list(builder: &AppBuilder) -> anyhow::Result<()> {
    let index = open_index(builder, false).await?;
    let domains = index.list_domains().await?;
    if domains.is_empty() {
        println!("no domains");
        return Ok(());
    }
    for d in domains {
        println!("{}\t{} chunks\t{}", d.domain, d.point_count, d.status);
    }
    Ok(())
}

pub async fn domain_stats(builder: &AppBuilder, domain: &str) -> anyhow::Result<()> {
    let domain = check_domain(domain)?;
    let index = open_index(builder, false).await?;
    print_json(&index.domain_stats(&domain).await?)
}

pub async fn domain_delete(builder: &AppBuilder, domain: &str, yes: bool) -> anyhow::Result<()> {
    let domain = check_domain(domain)?;
    if !yes {
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete domain '{domain}' and all of its chunks?"))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("Aborted.");
            return Ok(());
        }
    }

    let index = open_index(builder, false).await?;
    if index.delete_domain(&domain).await? {
        println!("deleted domain '{domain}'");
    } else {
        println!("domain '{domain}' does not exist");
    }
    Ok(())
}

pub async fn ingest(
    builder: &AppBuilder,
    domain: &str,
    file: &Path,
    chunk_size: Option<usize>,
    chunk_overlap: Option<usize>,
) -> anyhow::Result<()> {
    let domain = check_domain(domain)?;
    let defaults = &builder.config().ingest;
    let config = SplitterConfig {
        chunk_size: chunk_size.unwrap_or(defaults.chunk_size),
        chunk_overlap: chunk_overlap.unwrap_or(defaults.chunk_overlap),
        sentence_aware: true,
    };
    if config.chunk_size == 0 || config.chunk_overlap >= config.chunk_size {
        bail!(
            "chunk_overlap ({}) must be smaller than a non-zero chunk_size ({})",
            config.chunk_overlap,
            config.chunk_size
        );
    }

    let text = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let chunks = TextSplitter::new(config).split(&text);
    if chunks.is_empty() {
        bail!("{} contains no text to index", file.display());
    }

    // Stable ids make re-ingesting the same file overwrite rather than duplicate.
    let stem = file
        .file_stem()
        .map_or_else(|| "chunk".into(), |s| s.to_string_lossy().into_owned());
    let ids: Vec<String> = (0..chunks.len()).map(|i| format!("{stem}-{i}")).collect();

    let index = open_index(builder, true).await?;
    let report = index.upsert_chunks(&domain, &chunks, Some(&ids)).await?;
    tracing::info!(domain = %report.domain, chunks = report.ids.len(), file = %file.display(), "ingested file");
    println!(
        "indexed {} chunks from {} into '{}'",
        report.ids.len(),
        file.display(),
        report.domain
    );
    Ok(())
}

pub async fn chunks(builder: &AppBuilder, domain: &str, page_size: Option<u32>) -> anyhow::Result<()> {
    let domain = check_domain(domain)?;
    let index = open_index(builder, false).await?;
    let page = page_size.unwrap_or(builder.config().index.scroll_page_size);
    let chunks = index.list_chunks(&domain, page).await?;
    if chunks.is_empty() {
        println!("domain '{domain}' has no chunks");
    }
    for chunk in chunks {
        println!("--- {}\n{}\n", chunk.id, chunk.text().unwrap_or_default());
    }
    Ok(())
}

pub async fn sessions(builder: &AppBuilder) -> anyhow::Result<()> {
    let sessions = build_session_service(builder).await?.sessions().await?;
    if sessions.is_empty() {
        println!("no chat sessions");
        return Ok(());
    }
    for s in sessions {
        println!("{}\t{} messages\t{} .. {}", s.chat_id, s.message_count, s.first_at, s.last_at);
    }
    Ok(())
}

pub async fn history(builder: &AppBuilder, chat_id: &str) -> anyhow::Result<()> {
    let entries = build_session_service(builder).await?.history(chat_id).await?;
    if entries.is_empty() {
        println!("no messages for chat '{chat_id}'");
    }
    for e in entries {
        println!("[{}] {}: {}", e.timestamp, e.role.as_str(), e.text);
    }
    Ok(())
}

pub async fn forget(builder: &AppBuilder, chat_id: &str, yes: bool) -> anyhow::Result<()> {
    if !yes {
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete the transcript of chat '{chat_id}'?"))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("Aborted.");
            return Ok(());
        }
    }

    let removed = build_session_service(builder)
        .await?
        .delete_session(chat_id)
        .await?;
    println!("removed {removed} messages");
    Ok(())
}
