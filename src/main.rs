use std::sync::Arc;

use axum::Router;
use tokio::{net::TcpListener, signal, sync::mpsc};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
};
use tracing::{error, info};

use fnb_pos_api as api;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    // Init DB
    let db_pool = api::db::establish_connection_from_app_config(&cfg).await?;
    if cfg.auto_migrate {
        api::db::run_migrations(&db_pool).await.map_err(|e| {
            error!("Failed running migrations: {}", e);
            e
        })?;
    }

    let db = Arc::new(db_pool);
    let cfg = Arc::new(cfg);

    // Init events
    let (event_tx, event_rx) = mpsc::channel(1024);
    let event_sender = api::events::EventSender::new(event_tx);
    tokio::spawn(api::events::process_events(event_rx));

    // Build services
    let services = api::handlers::AppServices {
        inventory: api::services::InventoryService::new(
            db.clone(),
            event_sender.clone(),
            cfg.clone(),
        ),
        menu: api::services::MenuService::new(db.clone()),
        cart: api::services::CartService::new(db.clone(), event_sender.clone()),
        settlement: api::services::SettlementService::new(
            db.clone(),
            event_sender.clone(),
            cfg.clone(),
        ),
        reports: api::services::ReportService::new(db.clone(), cfg.clone()),
    };

    let app_state = Arc::new(api::AppState {
        db,
        config: cfg.clone(),
        event_sender,
        services,
    });

    let app = Router::new()
        .nest("/api/v1", api::api_v1_routes())
        .layer(CompressionLayer::new())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(axum::middleware::from_fn(api::request_logging_middleware))
        .with_state(app_state);

    let addr = cfg.bind_addr();
    info!("Listening on {}", addr);
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
