use anyhow::Context;
use tracing::info;

pub(crate) mod auth;
pub(crate) mod config;
pub(crate) mod db;
pub(crate) mod errors;
pub(crate) mod models;
mod router;
mod routes;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = config::Environment::from_env();
    config
        .validate()
        .context("Invalid environment configuration")?;
    init_tracing(&config);

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://coffee_shop.db".to_string());
    let pool = db::connect(&database_url)
        .await
        .with_context(|| format!("Failed to open database {database_url}"))?;
    db::migrate(&pool).await.context("Failed to run migrations")?;

    let addr = config.listen_addr()?;
    info!(
        %addr,
        production = config.production,
        audience = %config.auth0.audience,
        "starting coffee shop api"
    );
    if !config.production {
        info!("interactive login: {}", config.auth0.authorize_url());
    }

    let router = router::init_router(pool, config);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, router).await.context("Server error")?;
    Ok(())
}

fn init_tracing(config: &config::Environment) {
    let default_filter = if config.production {
        "info"
    } else {
        "coffee_shop=debug,info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
