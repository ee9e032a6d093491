use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod api;
mod config;
mod crypto;
mod db;
mod errors;
mod models;
mod services;

use config::Config;
use db::Database;
use services::broker::Broker;
use services::callback_service::CallbackDispatcher;
use services::credential_service::CredentialStore;
use services::intake_service::IntakeService;
use services::intent_service::IntentStore;
use services::transaction_service::TransactionStore;
use services::worker::Worker;

pub struct AppState {
    pub credentials: Arc<CredentialStore>,
    pub intake: Arc<IntakeService>,
    pub config: Arc<Config>,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let config = Config::from_env().expect("failed to load configuration");

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .init();

    let db = Database::new(&config.database.connection_string())
        .await
        .expect("failed to connect to database");

    db.run_migrations()
        .await
        .expect("failed to run migrations");

    let pool = db.get_pool().clone();
    let hash_key = Arc::new(config.api_key_hash_key.clone().into_bytes());

    let broker = Broker::new(config.rabbitmq.amqp_uri());
    let publisher = Arc::new(
        broker
            .publisher()
            .await
            .expect("failed to connect publisher to broker"),
    );

    let credentials = Arc::new(CredentialStore::new(pool.clone(), hash_key));
    let intents = Arc::new(IntentStore::new(pool.clone()));
    let transactions = Arc::new(TransactionStore::new(pool.clone()));
    let callbacks = Arc::new(CallbackDispatcher::new());

    let intake = Arc::new(IntakeService::new(
        credentials.clone(),
        intents.clone(),
        publisher,
    ));

    let worker_consumer = broker
        .consumer()
        .await
        .expect("failed to connect consumer to broker");
    let worker = Worker::new(
        intents.clone(),
        transactions.clone(),
        credentials.clone(),
        callbacks.clone(),
    );

    let worker_handle = tokio::spawn(async move {
        worker.run(worker_consumer).await;
    });

    let app_state = web::Data::new(AppState {
        credentials,
        intake,
        config: Arc::new(config.clone()),
    });

    info!(host = %config.host, port = config.port, "starting cashflow gateway");

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(app_state.clone())
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::NormalizePath::trim())
            .configure(api::configure)
            .route("/health", web::get().to(health_check))
    })
    .bind((config.host.clone(), config.port))?
    .run();

    let result = server.await;

    // The worker task only exits when its consumer stream ends; a clean
    // HTTP shutdown doesn't need to wait on it, but a crash is worth logging.
    if worker_handle.is_finished() {
        if let Err(err) = worker_handle.await {
            error!(error = %err, "worker task panicked");
        }
    } else {
        worker_handle.abort();
    }

    result
}

async fn health_check() -> actix_web::HttpResponse {
    actix_web::HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "cash-flow-financial",
    }))
}
