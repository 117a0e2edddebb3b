//! chatroute HTTP server
//!
//! Starts an Axum web server that stores chats and routes each turn to a
//! hosted model with failover.

use chatroute::{
    cli::{Cli, Command, generate_config_template},
    config::Config,
    handlers::{self, AppState},
    telemetry,
};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Some(Command::Config { output }) = cli.command {
        let template = generate_config_template();
        match output {
            Some(path) => {
                std::fs::write(&path, template)?;
                eprintln!("Wrote configuration template to {}", path);
            }
            None => print!("{}", template),
        }
        return Ok(());
    }

    // A missing file means "defaults plus environment"
    let config = if std::path::Path::new(&cli.config).exists() {
        Config::from_file(&cli.config)?
    } else {
        let mut config = Config::default();
        config.apply_env_overrides();
        config.validate()?;
        config
    };

    telemetry::init(&config.observability.log_level);

    tracing::info!(
        config_path = %cli.config,
        host = %config.server.host,
        port = config.server.port,
        "Starting chatroute server"
    );

    let config = Arc::new(config);
    let state = AppState::new(config.clone())?;
    let app = handlers::app(state);

    let addr = SocketAddr::from((
        config
            .server
            .host
            .parse::<std::net::IpAddr>()
            .unwrap_or_else(|_| std::net::IpAddr::from([0, 0, 0, 0])),
        config.server.port,
    ));

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
