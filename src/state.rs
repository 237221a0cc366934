use std::sync::Arc;

use anyhow::Context;
use axum::extract::FromRef;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use crate::auth::jwt::JwtKeys;
use crate::auth::password::PasswordHasher;
use crate::auth::repo::{MemoryUserRepository, PgUserRepository, UserRepository};
use crate::config::{AppConfig, StorageConfig};
use crate::posts::repo::{MemoryPostRepository, PgPostRepository, PostRepository};
use crate::storage::{DiskStorage, S3Storage, StorageClient};

/// Everything a handler needs, built once at startup and shared read-only.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepository>,
    pub posts: Arc<dyn PostRepository>,
    pub storage: Arc<dyn StorageClient>,
    pub keys: JwtKeys,
    pub hasher: PasswordHasher,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.keys.clone()
    }
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let storage = build_storage(&config.storage).await?;

        let (users, posts): (Arc<dyn UserRepository>, Arc<dyn PostRepository>) =
            match &config.database_url {
                Some(url) => {
                    let db = PgPoolOptions::new()
                        .max_connections(config.database_max_connections)
                        .connect(url)
                        .await
                        .context("connect to database")?;
                    sqlx::migrate!("./migrations")
                        .run(&db)
                        .await
                        .context("run migrations")?;
                    info!("connected to postgres, migrations applied");
                    (
                        Arc::new(PgUserRepository::new(db.clone())),
                        Arc::new(PgPostRepository::new(db)),
                    )
                }
                None => {
                    warn!("DATABASE_URL not set; using in-memory store, data is lost on restart");
                    (
                        Arc::new(MemoryUserRepository::new()),
                        Arc::new(MemoryPostRepository::new()),
                    )
                }
            };

        Self::from_parts(config, users, posts, storage)
    }

    /// Memory-backed state with the configured storage backend.
    pub async fn in_memory(config: AppConfig) -> anyhow::Result<Self> {
        let storage = build_storage(&config.storage).await?;
        Self::from_parts(
            config,
            Arc::new(MemoryUserRepository::new()),
            Arc::new(MemoryPostRepository::new()),
            storage,
        )
    }

    pub fn from_parts(
        config: AppConfig,
        users: Arc<dyn UserRepository>,
        posts: Arc<dyn PostRepository>,
        storage: Arc<dyn StorageClient>,
    ) -> anyhow::Result<Self> {
        let keys = JwtKeys::new(&config.jwt);
        let hasher = PasswordHasher::new(config.hash).context("password hasher config")?;
        Ok(Self {
            config: Arc::new(config),
            users,
            posts,
            storage,
            keys,
            hasher,
        })
    }

    #[cfg(test)]
    pub(crate) async fn for_tests(dir: &std::path::Path) -> Self {
        Self::in_memory(crate::config::AppConfig::for_tests(dir))
            .await
            .expect("test state")
    }
}

async fn build_storage(cfg: &StorageConfig) -> anyhow::Result<Arc<dyn StorageClient>> {
    let storage: Arc<dyn StorageClient> = match cfg {
        StorageConfig::Disk { assets_dir } => Arc::new(DiskStorage::new(assets_dir.clone()).await?),
        StorageConfig::S3(s3) => Arc::new(S3Storage::new(s3).await?),
    };
    Ok(storage)
}
