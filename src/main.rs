//! doa-bridge binary entry point.

use std::process::ExitCode;

use doa_bridge::api::{serve, AppState, ServerConfig};
use doa_bridge::config::Config;
use doa_bridge::engine::{discover_angles, TcpEngineLink};
use doa_bridge::{cli, logging};
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::from(2);
        }
    };

    if args.help {
        cli::print_help();
        return ExitCode::SUCCESS;
    }
    if args.version {
        cli::print_version();
        return ExitCode::SUCCESS;
    }

    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::from(2);
        }
    };
    let server_config = match config.to_server_config() {
        Ok(server_config) => server_config,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::from(2);
        }
    };

    logging::init_with_filter(&format!("doa_bridge={}", config.log_filter()));
    info!("doa-bridge v{}", env!("CARGO_PKG_VERSION"));

    match run(config, server_config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "startup failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config, server_config: ServerConfig) -> doa_bridge::Result<()> {
    let engine = &config.engine;

    // One-shot scoped discovery; a missing classification plug-in
    // aborts startup before any session is accepted.
    let angles = discover_angles(
        &engine.host,
        engine.port,
        engine.timeout(),
        &engine.classification_id,
    )
    .await?;
    info!(
        min = angles.min,
        max = angles.max,
        count = angles.count,
        "resolved classifier angle grid"
    );

    // Long-lived control connection shared by all sessions.
    let link = TcpEngineLink::connect(&engine.host, engine.port, engine.timeout()).await?;
    info!(
        host = %engine.host,
        port = engine.port,
        "engine control connection established"
    );

    let state = AppState::new(link, config.bridge_settings(), angles);
    serve(server_config, state).await
}
