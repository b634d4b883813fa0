use std::{fs::OpenOptions, net::SocketAddr, path::{Path, PathBuf}, sync::Arc};

use anyhow::Context;
use clap::{Parser, Subcommand};
use gpx_viewer_engine::{default_database_path, persistence::SqliteStore, GpxSource, ViewerConfig};
use gpx_viewer_lib::color::Color;
use server::{routes, server_state::ServerState};
use tower_http::services::ServeDir;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "gpx-viewer")]
#[command(about = "Serves GPX tracks to a map viewer", long_about = None)]
struct Cli {
    #[arg(long, default_value_t = 3000)]
    port: u16,
    /// SQLite database holding the persisted viewer state
    #[arg(long)]
    database: Option<PathBuf>,
    #[arg(long, default_value = "server/log/server.log")]
    log_file: PathBuf,
    /// Color for new tracks, `#rrggbb`
    #[arg(long)]
    default_color: Option<Color>,
    #[arg(long)]
    line_width: Option<f64>,
    /// Static web client served for unknown routes
    #[arg(long, default_value = "server/static")]
    static_dir: PathBuf,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server (default)
    Serve,
    /// Ingest GPX files into the persisted state
    Import { files: Vec<PathBuf> },
    /// Drop every persisted track
    Reset,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_file)?;

    let mut config = ViewerConfig::default();
    if let Some(color) = cli.default_color.clone() {
        config.default_color = color;
    }
    if let Some(width) = cli.line_width {
        config.line_width = width;
    }

    let database = cli.database.clone().unwrap_or_else(default_database_path);
    tracing::info!("Using database {}", database.display());
    let store = SqliteStore::connect(&database).await?;
    let state = Arc::new(ServerState::start(config, Arc::new(store)).await?);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(state.clone(), cli.port, &cli.static_dir).await?,
        Commands::Import { files } => {
            let report = state.session.ingest(files.into_iter().map(GpxSource::Path).collect()).await;
            for file in &report.ingested {
                println!("{} -> track {}", file.file_name, file.track_id);
            }
            for file in &report.skipped {
                println!("{} skipped: {}", file.file_name, file.reason);
            }
        }
        Commands::Reset => {
            state.session.reset().await?;
            println!("Reset viewer state");
        }
    }

    state.session.shutdown().await?;
    Ok(())
}

fn init_tracing(log_file: &Path) -> anyhow::Result<()> {
    if let Some(dir) = log_file.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("Failed to create log directory {}", dir.display()))?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("Failed to open log file {}", log_file.display()))?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| format!("{}=trace,gpx_viewer_engine=debug", env!("CARGO_CRATE_NAME")).into())
        )
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file))
        .init();

    Ok(())
}

async fn serve(state: Arc<ServerState>, port: u16, static_dir: &Path) -> anyhow::Result<()> {
    let app = routes::router(state)
        .fallback_service(ServeDir::new(static_dir));

    let listener = tokio::net::TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port))).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {err}");
            }
        })
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}
