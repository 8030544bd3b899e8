use std::sync::Arc;

mod domain;
mod interfaces;
mod infrastructure;
pub mod errors;
pub mod settings;
pub mod constants;
pub mod graceful_shutdown;
pub mod background_task;

pub use domain::{entities, use_cases};
pub use interfaces::{handlers, repositories, middlewares, routes};
pub use infrastructure::{auth, db, storage, utils};

use auth::jwt::JwtService;
use repositories::{memory::MemoryRepo, sqlx_repo::SqlxRepo, MetadataStore};
use settings::AppConfig;
use storage::content_store::ContentStore;
use use_cases::{assets::AssetHandler, quota::QuotaLedger, resolver::PublicResolver, upload::UploadPipeline};

/// Metadata store shared by every component.
pub type Store = dyn MetadataStore;

pub struct AppState {
    pub config: AppConfig,
    pub token_service: JwtService,
    pub repo: Arc<Store>,
    pub content_store: ContentStore,
    pub pipeline: UploadPipeline<Store>,
    pub resolver: PublicResolver<Store>,
    pub asset_handler: AssetHandler<Store>,
    pub ledger: QuotaLedger<Store>,
}

impl AppState {
    pub fn new(config: &AppConfig, repo: Arc<Store>) -> Self {
        let content_store = ContentStore::new(&config.upload.storage_path);

        AppState {
            config: config.clone(),
            token_service: JwtService::new(config),
            pipeline: UploadPipeline::new(repo.clone(), content_store.clone(), config.upload.clone()),
            resolver: PublicResolver::new(repo.clone(), content_store.clone()),
            asset_handler: AssetHandler::new(repo.clone(), content_store.clone()),
            ledger: QuotaLedger::new(repo.clone()),
            content_store,
            repo,
        }
    }
}

/// Opened metadata backend. `pool` is set for Postgres and must be closed
/// on shutdown.
pub struct MetadataBackend {
    pub repo: Arc<Store>,
    pub pool: Option<sqlx::PgPool>,
}

impl MetadataBackend {
    /// Connects to Postgres and applies migrations, or builds the in-process
    /// store when the database URL is `memory`.
    pub async fn open(config: &AppConfig) -> anyhow::Result<Self> {
        if config.uses_memory_store() {
            tracing::warn!("Using the in-memory metadata store; data is lost on restart");
            return Ok(MetadataBackend { repo: Arc::new(MemoryRepo::new()), pool: None });
        }

        let pool = db::postgres::create_pool(&config.database_url).await?;
        db::postgres::run_migrations(&pool).await?;

        Ok(MetadataBackend {
            repo: Arc::new(SqlxRepo::new(pool.clone())),
            pool: Some(pool),
        })
    }

    pub async fn close(self) {
        if let Some(pool) = self.pool {
            pool.close().await;
            tracing::info!("Database pool closed.");
        }
    }
}
