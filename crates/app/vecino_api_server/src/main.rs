//! Vecino API server binary.
//!
//! Connects to PostgreSQL, applies migrations and serves the HTTP and
//! realtime routes.

use std::sync::Arc;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use vecino_api::config::ApiConfig;
use vecino_core::store::PgCredentialStore;

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "vecino_api_server", about = "Vecino API server")]
struct Args {
    /// Port to listen on (0 = ephemeral). Overrides the port of `BIND_ADDR`.
    #[arg(long)]
    port: Option<u16>,

    /// PostgreSQL connection URL.
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost:5432/vecino"
    )]
    database_url: String,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,vecino_api=debug,vecino_core=debug".into()),
        )
        .init();

    let args = Args::parse();

    let mut config = ApiConfig::from_env();
    if let Some(port) = args.port {
        let host = config
            .bind_addr
            .rsplit_once(':')
            .map_or("127.0.0.1", |(host, _)| host);
        config.bind_addr = format!("{host}:{port}");
    }
    config.pg_connection_url = args.database_url;

    // Refuse to start without a way to deliver verification codes.
    let verifier = config.verification_provider()?;

    info!(
        bind = %config.bind_addr,
        max_connections = args.max_connections,
        tokens = ?config.tokens,
        "starting vecino_api_server"
    );

    let pool = PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect(&config.pg_connection_url)
        .await?;

    let store = PgCredentialStore::new(pool);
    info!("running database migrations");
    store.migrate().await?;

    let bind_addr = config.bind_addr.clone();
    let state = vecino_api::AppState::new(config, Arc::new(store), verifier)?;
    let app = vecino_api::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %listener.local_addr()?, "API listening");

    axum::serve(listener, app).await?;

    Ok(())
}
