use actix_web::{middleware::NormalizePath, web, App, HttpServer};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use image_host::{
    background_task::start_reconcile_task,
    entities::owner::{Owner, ROLE_ADMIN},
    graceful_shutdown::shutdown_signal,
    middlewares::auth::AuthMiddleware,
    repositories::owner::OwnerRepository,
    routes::configure_routes,
    settings::AppConfig,
    AppState, MetadataBackend,
};

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// The in-memory store starts without accounts; give local runs one to use.
async fn seed_dev_owner(state: &AppState) -> anyhow::Result<()> {
    let mut owner = Owner::new(Uuid::new_v4(), "dev", 0);
    owner.role = ROLE_ADMIN.to_string();
    state.repo.create_owner(&owner).await.map_err(|e| anyhow::anyhow!("{}", e))?;

    let token = state
        .token_service
        .create_jwt(&owner.id, &owner.role)
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    tracing::warn!(owner_id = %owner.id, "Seeded development owner; bearer token: {}", token);
    Ok(())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let config = match AppConfig::new() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(config.is_production());
    tracing::info!("Loaded configuration: {:?}", config);

    let backend = match MetadataBackend::open(&config).await {
        Ok(backend) => backend,
        Err(e) => {
            tracing::error!("Failed to open metadata store: {:#}", e);
            std::process::exit(1);
        }
    };

    let app_state = web::Data::new(AppState::new(&config, backend.repo.clone()));

    if let Err(e) = app_state.content_store.init().await {
        tracing::error!("Failed to prepare storage root: {}", e);
        std::process::exit(1);
    }

    if config.uses_memory_store() {
        if let Err(e) = seed_dev_owner(&app_state).await {
            tracing::error!("Failed to seed development owner: {:#}", e);
        }
    }

    let server_addr = format!("{}:{}", config.host, config.port);

    tracing::info!(
        "🚀 Starting {} v{} on {}",
        config.name,
        env!("CARGO_PKG_VERSION"),
        server_addr
    );

    let reconcile = tokio::spawn(start_reconcile_task(app_state.clone()));
    let server_state = app_state.clone();

    let server = HttpServer::new(move || {
        App::new()
            .app_data(server_state.clone())
            .wrap(AuthMiddleware)
            .wrap(NormalizePath::trim())
            .wrap(TracingLogger::default())
            .configure(configure_routes)
    })
    .workers(config.worker_count.max(1))
    .disable_signals()
    .bind(server_addr)?
    .run();

    let handle = server.handle();
    tokio::spawn(async move {
        shutdown_signal().await;
        handle.stop(true).await;
    });

    let result = server.await;

    reconcile.abort();
    backend.close().await;
    tracing::info!("Server stopped");
    result
}
