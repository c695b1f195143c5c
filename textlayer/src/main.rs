use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use textlayer::api::{create_router, AppState};
use textlayer::config::Config;

#[derive(Parser)]
#[command(name = "textlayer")]
#[command(about = "HTTP service adding a searchable OCR text layer to PDFs")]
struct Args {
    /// Bind address, overriding TEXTLAYER_HOST
    #[arg(long)]
    host: Option<String>,

    /// Bind port, overriding TEXTLAYER_PORT
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "textlayer=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = Config::from_env();
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    if let Some(root) = &config.ocr.temp_root {
        std::fs::create_dir_all(root)?;
    }

    let state = AppState::new(config.clone());

    let toolchain = state.invoker.probe().await;
    match &toolchain.ocrmypdf {
        Some(version) => tracing::info!(version = %version, "OCR toolchain detected"),
        None => tracing::warn!(
            binary = %config.ocr.binary,
            "OCR toolchain not found - /ocr/ requests will fail until it is installed"
        ),
    }

    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("textlayer starting on http://{}", addr);
    tracing::info!("  Health check: http://{}/health", addr);
    tracing::info!("  OpenAPI spec: http://{}/openapi.json", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
