use anyhow::Result;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::path::PathBuf;
use std::time::Duration;

use food_health_analyzer::client::{classify_outcome, AnalyzerClient};
use food_health_analyzer::config::ClientConfig;
use food_health_analyzer::models::{ImageFile, Submission};

#[derive(Parser)]
#[command(name = "food-health-analyzer", version, about = "Food label health analysis")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the analysis HTTP API
    #[cfg(feature = "server")]
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Submit one product to a running analysis API and print the result
    Analyze {
        /// Product name, e.g. "Nutella"
        #[arg(long)]
        name: Option<String>,
        /// Path to a photo of the product or its label
        #[arg(long)]
        image: Option<PathBuf>,
        #[arg(long, env = "ANALYZER_URL")]
        base_url: Option<String>,
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger
    env_logger::init();

    // Load environment variables
    dotenv().ok();

    match Cli::parse().command {
        #[cfg(feature = "server")]
        Command::Serve { host, port } => serve(host, port).await,
        Command::Analyze {
            name,
            image,
            base_url,
            timeout_secs,
        } => analyze(name, image, base_url, timeout_secs).await,
    }
}

#[cfg(feature = "server")]
async fn serve(host: Option<String>, port: Option<u16>) -> Result<()> {
    use food_health_analyzer::config::ServerConfig;
    use food_health_analyzer::server::{create_router, AppState};

    log::info!("🚀 Starting Food Health Analyzer API...");

    let mut config = ServerConfig::from_env()?;
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }

    let state = AppState::from_config(&config)?;
    log::info!(
        "✅ Analysis service initialized (precedence: {:?}, max image: {} bytes)",
        config.precedence,
        config.max_image_bytes
    );

    let app = create_router(state);
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("🌐 Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            log::info!("🛑 Shutting down...");
        })
        .await?;

    Ok(())
}

async fn analyze(
    name: Option<String>,
    image: Option<PathBuf>,
    base_url: Option<String>,
    timeout_secs: Option<u64>,
) -> Result<()> {
    let mut config = ClientConfig::from_env()?;
    if let Some(base_url) = base_url {
        config.base_url = base_url;
    }
    if let Some(secs) = timeout_secs {
        config.timeout = Duration::from_secs(secs.max(1));
    }

    let image = image.map(ImageFile::from_path).transpose()?;
    let submission = Submission::new(name, image);

    let client = AnalyzerClient::from_config(&config)?;
    let result = classify_outcome(client.analyze(&submission).await)?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
