use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "redline", version, about = "Grammar fixing and rephrasing service")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service
    Serve {
        #[arg(long, env = "REDLINE_CONFIG", default_value = "./config/example-config.yaml")]
        config: String,
    },
    /// Validate a config file (schema, runtime support, env overrides) and exit
    CheckConfig {
        #[arg(long, env = "REDLINE_CONFIG", default_value = "./config/example-config.yaml")]
        config: String,
    },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let (config_path, check_only) = match cli.command {
        Commands::Serve { config } => (config, false),
        Commands::CheckConfig { config } => (config, true),
    };

    let cfg = match redline_config::load_and_validate(&config_path) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("failed to load config: {e}");
            std::process::exit(1);
        }
    };
    if check_only {
        println!("config ok: environment={} sink={}", cfg.environment, cfg.logging.sink);
        return;
    }

    let default_filter = if cfg.is_production() {
        "redline=info,redline_server=info,tower_http=info"
    } else {
        "redline=debug,redline_server=debug,tower_http=debug"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    tracing::info!(
        environment = %cfg.environment,
        model_id = %cfg.generation.model_id,
        sink = %cfg.logging.sink,
        "starting redline"
    );

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
    };
    if let Err(e) = redline_server::serve(cfg, shutdown).await {
        tracing::error!(error = %e, "server exited with error");
        std::process::exit(1);
    }
}
