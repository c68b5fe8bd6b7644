use coinvault_server::{ServiceConfig, Vault};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn print_help() {
    eprintln!(
        r#"Coinvault - account ledger and order/portfolio engine

USAGE:
    coinvault [OPTIONS]

OPTIONS:
    --config <PATH>     Load configuration from JSON file
    --help              Print this help message

ENVIRONMENT VARIABLES:
    HOST                Server host (default: 0.0.0.0)
    PORT                Server port (default: 8080)
    PIN_PEPPER          Secret mixed into withdrawal PIN hashes
    RUST_LOG            Log level filter

EXAMPLES:
    # Run in memory with fixture prices
    coinvault

    # Run with config file
    coinvault --config coinvault.json

    # Run with custom port
    PORT=9000 coinvault
"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing; `log` records from the library crates are bridged in
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "coinvault=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();
    let mut config_path: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--config" | "-c" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
                config_path = Some(args[i].clone());
            }
            arg => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let mut config = match config_path {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path);
            ServiceConfig::from_file(&path)?
        }
        None => {
            tracing::info!("Using default configuration");
            ServiceConfig::default()
        }
    };
    config.apply_overrides(|key| std::env::var(key).ok())?;

    match &config.storage.data_dir {
        Some(dir) => tracing::info!("Data directory: {}", dir.display()),
        None => tracing::info!("Data directory: none (in memory)"),
    }
    tracing::info!("Price source: {:?}", config.market_data.provider);
    tracing::info!("Trading fee rate: {}", config.trading.fee_rate);

    let vault = Vault::from_config(config)?;

    tracing::info!("Starting Coinvault");
    tracing::info!("Available endpoints:");
    tracing::info!("  POST   /accounts");
    tracing::info!("  POST   /trading/orders");
    tracing::info!("  GET    /portfolio");
    tracing::info!("  POST   /wallet/deposits");
    tracing::info!("  POST   /wallet/withdrawals");
    tracing::info!("  GET    /admin/accounts/{{id}}/verify");

    vault.run().await
}
