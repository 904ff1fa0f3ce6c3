use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Context;
use dotenv::dotenv;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod analytics;
mod config;
mod database;
mod error;
mod models;
mod routes;
mod state;
mod store;

use config::{Config, StorageBackend};
use database::{MemorySlotStore, MongoSlotStore, SlotStore};
use models::user::SessionMiddlewareFactory;
use state::AppState;

/// Inline photos travel as data URLs inside JSON bodies.
const JSON_LIMIT: usize = 16 * 1024 * 1024;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chmrs_server=info,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;

    let store: Arc<dyn SlotStore> = match config.storage.backend {
        StorageBackend::MongoDb => {
            let db = database::connect(
                &config.storage.mongodb_uri,
                &config.storage.mongodb_database,
            )
            .await
            .context("Failed to connect to MongoDB")?;
            Arc::new(MongoSlotStore::new(&db))
        }
        StorageBackend::Memory => {
            info!("using in-memory storage, nothing will outlive this process");
            Arc::new(MemorySlotStore::new())
        }
    };

    let state = web::Data::new(
        AppState::open(store, &config)
            .await
            .context("Failed to initialize application state")?,
    );
    state::spawn_refresh(state.clone(), config.storage.poll_interval);

    let server = config.server.clone();
    info!("chmrs-server listening on {}:{}", server.host, server.port);

    HttpServer::new(move || {
        let cors = match &server.cors_allowed_origin {
            Some(origin) => Cors::default()
                .allowed_origin(origin)
                .allow_any_method()
                .allow_any_header()
                .expose_headers([routes::PERSISTENCE_WARNING]),
            None => Cors::permissive(),
        };

        App::new()
            .app_data(state.clone())
            .app_data(web::JsonConfig::default().limit(JSON_LIMIT))
            .wrap(SessionMiddlewareFactory::new(state.tokens.clone()))
            .wrap(cors)
            .wrap(Logger::default())
            .configure(routes::configure)
    })
    .bind((config.server.host, config.server.port))
    .context("Failed to bind server address")?
    .run()
    .await
    .context("Server terminated unexpectedly")
}
