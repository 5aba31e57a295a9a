use std::net::SocketAddr;
use std::sync::Arc;

use api_server::http::{AppState, build_router};
use shared::config::{ApiConfig, load_dotenv};
use shared::llm::{ChatCompletionsConfig, ChatCompletionsService};
use shared::repos::{HistoryStore, MemoryHistoryStore, Store};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    if let Err(err) = load_dotenv() {
        eprintln!("{err}");
        std::process::exit(1);
    }

    init_tracing();

    let config = match ApiConfig::from_env() {
        Ok(cfg) => cfg,
        Err(err) => {
            error!("failed to read config: {err}");
            std::process::exit(1);
        }
    };

    let completions_config = match ChatCompletionsConfig::from_env() {
        Ok(cfg) => cfg,
        Err(err) => {
            error!("failed to read completions config: {err}");
            std::process::exit(1);
        }
    };
    let completions = match ChatCompletionsService::new(completions_config) {
        Ok(service) => service,
        Err(err) => {
            error!("failed to build completions client: {err}");
            std::process::exit(1);
        }
    };

    let history: Arc<dyn HistoryStore> = match config.database_url.as_deref() {
        Some(database_url) => Arc::new(connect_store(&config, database_url).await),
        None => {
            warn!("DATABASE_URL is not set; encounters are kept in memory only");
            Arc::new(MemoryHistoryStore::new())
        }
    };

    let app = build_router(AppState {
        history,
        completions: Arc::new(completions),
        history_limit: config.history_limit,
    });

    let addr: SocketAddr = config
        .bind_addr
        .parse()
        .unwrap_or_else(|_| "127.0.0.1:8080".parse().expect("valid default bind addr"));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("bind should succeed");

    info!(
        "api server listening on {}",
        listener.local_addr().unwrap_or(addr)
    );
    axum::serve(listener, app).await.expect("server should run");
}

/// `LOG_FORMAT=json` switches to flattened JSON events for log shipping.
fn init_tracing() {
    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "api_server=debug,shared=info,axum=info".to_string());
    let json = std::env::var("LOG_FORMAT")
        .map(|format| format.trim().eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn connect_store(config: &ApiConfig, database_url: &str) -> Store {
    let store = match Store::connect(database_url, config.database_max_connections).await {
        Ok(store) => store,
        Err(err) => {
            error!("failed to connect to postgres: {err}");
            std::process::exit(1);
        }
    };

    let migrator = match sqlx::migrate::Migrator::new(config.migrations_dir.clone()).await {
        Ok(migrator) => migrator,
        Err(err) => {
            error!("failed to load migrations: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = migrator.run(store.pool()).await {
        error!("failed to run migrations: {err}");
        std::process::exit(1);
    }

    store
}
