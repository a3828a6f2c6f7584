use event_bus::{EventBus, InMemoryBus, KafkaBus, KafkaBusConfig};
use payment_checker::kv::{InMemoryKv, KvStore, RedisKv};
use payment_checker::{Config, PaymentChecker, UpstreamFetcher};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::load();

    tracing::info!("connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(16)
        .connect(&config.database_url())
        .await
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to connect to database");
            std::process::exit(1);
        });

    tracing::info!("running migrations...");
    sqlx::migrate!("./db/migrations")
        .run(&pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to run migrations");
            std::process::exit(1);
        });

    let http_client = reqwest::ClientBuilder::new()
        .pool_max_idle_per_host(16)
        .build()
        .expect("failed to build http client");

    let fetcher = UpstreamFetcher::new(
        http_client,
        config.payment_server_base_url.clone(),
        config.payment_server_api_key.clone(),
    );

    tracing::info!("probing upstream payment server...");
    if let Err(e) = fetcher.health_check().await {
        tracing::error!(error = %e, "upstream payment server health check failed, aborting startup");
        std::process::exit(1);
    }

    let kv: Arc<dyn KvStore> = match config.env.as_str() {
        "test" => Arc::new(InMemoryKv::new()),
        _ => match RedisKv::connect(&config.redis_url()).await {
            Ok(kv) => Arc::new(kv),
            Err(e) => {
                tracing::error!(error = %e, "failed to connect to redis");
                std::process::exit(1);
            }
        },
    };

    let bus: Arc<dyn EventBus> = match config.bus_type.as_str() {
        "inmemory" => Arc::new(InMemoryBus::new()),
        "kafka" => {
            let kafka_config = KafkaBusConfig::new(config.kafka_bootstrap_servers());
            match KafkaBus::connect(kafka_config) {
                Ok(bus) => Arc::new(bus),
                Err(e) => {
                    tracing::error!(error = %e, "failed to connect to kafka");
                    std::process::exit(1);
                }
            }
        }
        other => {
            tracing::error!(bus_type = other, "invalid BUS_TYPE, must be 'inmemory' or 'kafka'");
            std::process::exit(1);
        }
    };

    let checker = Arc::new(PaymentChecker::new(
        pool,
        bus.clone(),
        kv,
        fetcher,
        config.kafka_topic_payment_success.clone(),
    ));

    checker.restore().await;

    let root_cancel = checker.root_cancel_token();
    payment_checker::consumer::spawn_consumer(
        bus,
        config.kafka_topic_payment_success.clone(),
        checker.clone(),
        root_cancel.clone(),
    );

    let admin_api_key = Arc::new(config.admin_api_key.clone());
    let app = payment_checker::handlers::router(checker, admin_api_key).layer(
        CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.app_port));
    tracing::info!(%addr, "payment-checker listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to bind listener");
            std::process::exit(1);
        });

    let shutdown_signal = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "server exited with error");
            }
        }
        _ = shutdown_signal => {
            tracing::info!("shutdown signal received, cancelling pollers and consumer");
        }
    }

    root_cancel.cancel();
}
