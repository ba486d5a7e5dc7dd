mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use quarry_core::bootstrap::AppBuilder;
use quarry_core::config::resolve_config_path;

#[derive(Parser, Debug)]
#[command(name = "quarry")]
#[command(about = "Domain-scoped question answering over your own documents, with web fallback")]
#[command(version)]
struct Cli {
    /// Config file (default: $QUARRY_CONFIG or config/default.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log output format; logs go to stderr
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ask a single question
    Ask {
        query: String,
        /// Knowledge domain (default: index.default_domain)
        #[arg(short, long)]
        domain: Option<String>,
        /// Continue an existing chat
        #[arg(long)]
        chat_id: Option<String>,
        /// Print the full outcome, including sources and reasoning, as JSON
        #[arg(long)]
        json: bool,
    },
    /// Interactive chat on stdin; `exit` or Ctrl-C to leave
    Chat {
        #[arg(short, long)]
        domain: Option<String>,
        #[arg(long)]
        chat_id: Option<String>,
        /// Print the reasoning chain after every answer
        #[arg(long)]
        trace: bool,
    },
    /// Manage knowledge domains
    Domain {
        #[command(subcommand)]
        action: DomainAction,
    },
    /// Split a text file into chunks and index them into a domain
    Ingest {
        domain: String,
        file: PathBuf,
        /// Override ingest.chunk_size
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Override ingest.chunk_overlap
        #[arg(long)]
        chunk_overlap: Option<usize>,
    },
    /// Print every chunk stored in a domain
    Chunks {
        domain: String,
        /// Scroll page size (default: index.scroll_page_size)
        #[arg(long)]
        page_size: Option<u32>,
    },
    /// List chat sessions, most recently active first
    Sessions,
    /// Print a chat's transcript
    History { chat_id: String },
    /// Delete a chat's transcript
    Forget {
        chat_id: String,
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
enum DomainAction {
    /// Create a domain if it does not exist
    Create { domain: String },
    /// List every domain with its size
    List,
    /// Size and health of one domain
    Stats { domain: String },
    /// Drop a domain and all of its chunks
    Delete {
        domain: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_subscriber(cli.log_format);

    let config_path = cli.config.clone().unwrap_or_else(resolve_config_path);
    let builder = AppBuilder::from_path(&config_path)?;
    tracing::debug!(config = %builder.config_path().display(), "configuration loaded");

    match cli.command {
        Command::Ask {
            query,
            domain,
            chat_id,
            json,
        } => commands::ask(&builder, query, domain, chat_id, json).await,
        Command::Chat {
            domain,
            chat_id,
            trace,
        } => commands::chat(&builder, domain, chat_id, trace).await,
        Command::Domain { action } => match action {
            DomainAction::Create { domain } => commands::domain_create(&builder, &domain).await,
            DomainAction::List => commands::domain_list(&builder).await,
            DomainAction::Stats { domain } => commands::domain_stats(&builder, &domain).await,
            DomainAction::Delete { domain, yes } => {
                commands::domain_delete(&builder, &domain, yes).await
            }
        },
        Command::Ingest {
            domain,
            file,
            chunk_size,
            chunk_overlap,
        } => commands::ingest(&builder, &domain, &file, chunk_size, chunk_overlap).await,
        Command::Chunks { domain, page_size } => {
            commands::chunks(&builder, &domain, page_size).await
        }
        Command::Sessions => commands::sessions(&builder).await,
        Command::History { chat_id } => commands::history(&builder, &chat_id).await,
        Command::Forget { chat_id, yes } => commands::forget(&builder, &chat_id, yes).await,
    }
}

fn init_subscriber(format: LogFormat) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "quarry",
            "ask",
            "how many vacation days?",
            "--domain",
            "hr",
            "--log-format",
            "json",
            "--config",
            "alt.toml",
        ])
        .unwrap();
        assert_eq!(cli.log_format, LogFormat::Json);
        assert_eq!(cli.config, Some(PathBuf::from("alt.toml")));
        match cli.command {
            Command::Ask { query, domain, .. } => {
                assert_eq!(query, "how many vacation days?");
                assert_eq!(domain.as_deref(), Some("hr"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn domain_delete_requires_name() {
        assert!(Cli::try_parse_from(["quarry", "domain", "delete"]).is_err());
        let cli = Cli::try_parse_from(["quarry", "domain", "delete", "hr", "-y"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Domain {
                action: DomainAction::Delete { yes: true, .. }
            }
        ));
    }
}
