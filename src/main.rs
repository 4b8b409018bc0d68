use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use drive_registry_lib::commands::{indexing_commands, registry_commands};
use drive_registry_lib::services::auth_service::{FixedFolderPicker, StaticTokenProvider};
use drive_registry_lib::services::search_service::format_size;
use drive_registry_lib::{AppState, Config, IndexingProgress, IndexingStatus, Registry};

#[derive(Debug, Parser)]
#[command(
    name = "drive-registry",
    version,
    about = "Index the media files under a Google Drive folder into a local registry"
)]
struct Cli {
    /// Registry database path (defaults to $DRIVE_REGISTRY_DB or the user data dir)
    #[arg(long, short = 'd', global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Recursively index a folder (id or Drive folder URL)
    Index {
        folder: String,
        /// OAuth access token (defaults to $DRIVE_ACCESS_TOKEN)
        #[arg(long)]
        token: Option<String>,
    },
    /// Show every indexed file, newest first
    List,
    /// Show files whose name or type contains QUERY
    Search { query: String },
    /// Delete every indexed record
    Clear,
    /// Show record count and total size
    Stats,
}

fn print_progress(progress: &IndexingProgress) {
    let mut stderr = std::io::stderr();
    if progress.is_terminal() {
        let _ = writeln!(stderr, "\r\x1b[2K[{}]", progress.status);
    } else if progress.status == IndexingStatus::Indexing {
        let current = progress.current_file.as_deref().unwrap_or("");
        let _ = write!(
            stderr,
            "\r\x1b[2K[indexing] {} folders, {} files {}",
            progress.folders_processed, progress.files_processed, current
        );
    }
    let _ = stderr.flush();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(database) = cli.database {
        config.database_path = database;
    }
    tracing::debug!(?config, "resolved configuration");

    let registry = Registry::open_deferred(config.database_path.clone());
    let state = Arc::new(AppState::new(registry, config));

    match cli.command {
        Commands::Index { folder, token } => {
            let tokens =
                StaticTokenProvider::new(token.or_else(|| state.config.access_token.clone()));
            let picker = FixedFolderPicker::new(&folder)?;

            let interrupt_state = state.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("interrupt received, stopping after the current page");
                    indexing_commands::stop_indexing(&interrupt_state);
                }
            });

            let summary =
                match indexing_commands::start_indexing(&state, &tokens, &picker, print_progress)
                    .await
                {
                    Ok(summary) => summary,
                    Err(e) => {
                        let stopped = indexing_commands::get_indexing_status(&state);
                        if stopped.is_terminal() {
                            eprintln!(
                                "Stopped after {} files across {} folders",
                                stopped.files_processed, stopped.folders_processed
                            );
                        }
                        return Err(e.into());
                    }
                };
            println!(
                "Indexed {} media files across {} folders",
                summary.files_found, summary.folders_processed
            );
        }
        Commands::List => {
            let records = registry_commands::list_media(&state).await?;
            print!("{}", registry_commands::render_table(&records));
        }
        Commands::Search { query } => {
            let records = registry_commands::search_media(&state, &query).await?;
            print!("{}", registry_commands::render_table(&records));
            println!("{} matching files", records.len());
        }
        Commands::Clear => {
            let removed = indexing_commands::clear_registry(&state).await?;
            println!("Removed {removed} records");
        }
        Commands::Stats => {
            let stats = registry_commands::registry_stats(&state).await?;
            println!(
                "{} files, {} total",
                stats.file_count,
                format_size(stats.total_bytes)
            );
        }
    }

    Ok(())
}
