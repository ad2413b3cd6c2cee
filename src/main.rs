use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use comfy_relay::{api, config};

#[derive(Parser, Debug)]
#[command(name = "comfy-relay", about = "HTTP relay for running ComfyUI workflows", version)]
struct Args {
    /// Override API_HOST
    #[arg(long)]
    host: Option<String>,
    /// Override API_PORT
    #[arg(long)]
    port: Option<u16>,
    /// Load environment from this file instead of ./.env
    #[arg(short = 'c', long, value_name = "PATH")]
    env_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize tracing
    comfy_relay::init_tracing();

    // Load configuration
    match &args.env_file {
        Some(path) => config::Config::dotenv_load_from(path),
        None => config::Config::dotenv_load(),
    }
    let mut config = config::Config::new();
    if let Some(host) = args.host {
        config.api_host = host;
    }
    if let Some(port) = args.port {
        config.api_port = port.to_string();
    }
    config.print_env_vars();

    let state = Arc::new(api::routes::AppState::from_config(&config));
    let app = api::routes::router(state, &config.static_dir);

    let socket_address = config.socket_addr();
    let builder = match axum::Server::try_bind(&socket_address) {
        Ok(builder) => builder,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", socket_address, e);
            std::process::exit(1);
        }
    };
    tracing::info!("listening on {}", socket_address);
    if let Err(e) = builder.serve(app.into_make_service()).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
