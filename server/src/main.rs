use std::error::Error;
use std::sync::Arc;

use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use rsvp_server::config::Config;
use rsvp_server::routes::create_routes;
use rsvp_server::state::AppState;
use rsvp_server::store::PgStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await?;
    tracing::info!("Successfully connected to database");

    sqlx::migrate!().run(&pool).await?;
    tracing::info!("Migrations run successfully");

    let state = AppState::from_config(&config, Arc::new(PgStore::new(pool)))?;
    let app = create_routes(
        state,
        config.cors_allowed_origins.as_deref(),
        config.production,
    );

    let addr = config.socket_addr();
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Server running at http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
