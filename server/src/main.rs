use anyhow::Context;
use clap::Parser;
use oro_execution::Reconciler;
use oro_server::{Api, Backend, Config, RateLimit};
use oro_store::{Memory, RecordStore, Sheets};
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(short, long)]
    port: Option<u16>,

    /// Service account key file
    #[arg(long)]
    credentials: Option<PathBuf>,

    /// Serve from an in-process store instead of the spreadsheet
    #[arg(long)]
    memory: bool,

    #[arg(long)]
    log_level: Option<String>,
}

async fn serve<S: RecordStore + 'static>(
    store: S,
    port: u16,
    rate_limit: RateLimit,
) -> anyhow::Result<()> {
    let api = Api::new(Arc::new(Reconciler::new(store)), rate_limit);
    let app = api.router();

    // Start server
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Listening on {}", addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("axum server error")?;

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse args
    let args = Args::parse();

    // Load config
    let mut config = match &args.config {
        Some(path) => {
            let file = std::fs::read_to_string(path)
                .with_context(|| format!("could not read config file {}", path.display()))?;
            serde_yaml::from_str::<Config>(&file).context("could not parse config file")?
        }
        None => Config::default(),
    };
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(credentials) = args.credentials {
        config.credentials = credentials;
    }
    if let Some(log_level) = args.log_level {
        config.log_level = log_level;
    }
    config.memory |= args.memory;
    let config = config.with_env().validate().context("invalid configuration")?;

    // Create logger
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .init();

    match config.backend {
        Backend::Memory => {
            info!("using in-memory store");
            serve(Memory::new(), config.port, config.rate_limit).await
        }
        Backend::Sheets {
            spreadsheet_id,
            key,
        } => {
            info!(%spreadsheet_id, client_email = %key.client_email, "using spreadsheet");
            let sheets = Sheets::new(spreadsheet_id, key).context("failed to create sheets client")?;
            serve(sheets, config.port, config.rate_limit).await
        }
    }
}
