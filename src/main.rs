mod config;
mod db;
mod dtos;
mod error;
mod extractors;
mod handler;
mod mail;
mod middleware;
mod models;
mod policy;
mod routes;
mod service;
mod tracing_config;
mod utils;

use axum::http::{
    HeaderValue, Method,
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
};
use config::Config;
use db::DBClient;
use dotenv::dotenv;
use mail::MailClient;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

#[derive(Clone)]
pub struct AppState {
    pub env: Arc<Config>,
    pub db_client: DBClient,
    pub mail_client: MailClient,
}

#[tokio::main]
async fn main() {
    dotenv().ok();

    let config = match Config::init() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("🔥 Invalid configuration: {}", err);
            std::process::exit(1);
        }
    };

    // Keep the guard alive until shutdown so buffered log lines get flushed
    let _guard = tracing_config::init_tracing(&config.log_dir);

    let pool = match PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
    {
        Ok(pool) => {
            tracing::info!("✅Connection to the database is successful!");
            pool
        }
        Err(err) => {
            tracing::error!("🔥 Failed to connect to the database: {:?}", err);
            std::process::exit(1);
        }
    };

    let db_client = DBClient::new(pool);
    if let Err(err) = db_client.migrate().await {
        tracing::error!("🔥 Failed to run database migrations: {}", err);
        std::process::exit(1);
    }

    let frontend_origin = match config.frontend_url.parse::<HeaderValue>() {
        Ok(origin) => origin,
        Err(err) => {
            tracing::error!("🔥 FRONTEND_URL is not a valid origin: {}", err);
            std::process::exit(1);
        }
    };
    let cors = CorsLayer::new()
        .allow_origin(frontend_origin)
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE])
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ]);

    let mail_client = MailClient::from_config(config.smtp.clone());
    if matches!(mail_client, MailClient::Log) {
        tracing::warn!("SMTP_SERVER not set, confirmation codes will only be logged");
    }

    let port = config.port;
    let app_state = AppState {
        env: Arc::new(config),
        db_client,
        mail_client,
    };

    let app = routes::create_router(app_state).layer(cors);

    let listener = match tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("🔥 Failed to bind port {}: {}", port, err);
            std::process::exit(1);
        }
    };

    tracing::info!("🚀 Server is running on http://localhost:{}", port);

    if let Err(err) = axum::serve(listener, app).await {
        tracing::error!("🔥 Server error: {}", err);
        std::process::exit(1);
    }
}
