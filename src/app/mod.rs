use crate::api::{ApiServer, AppState, SessionStore};
use crate::config::Config;
use crate::poller::{PollerRegistry, SlidePoller};
use crate::storage::S3ObjectStore;
use crate::{db, global};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

pub async fn run_service() -> Result<()> {
    info!("Starting Podium service");

    let config = Config::load()?;

    if config.storage.bucket.is_empty() {
        anyhow::bail!(
            "No storage bucket configured. Set storage.bucket in the config file \
             or the S3_BUCKET_NAME environment variable."
        );
    }

    let db_path = global::db_file()?;
    {
        let conn = db::open(&db_path).context("Failed to open database")?;
        db::migrate(&conn).context("Failed to run database migrations")?;
    }

    let gateway = Arc::new(S3ObjectStore::new(&config.storage).await?);
    let poller = Arc::new(SlidePoller::new(
        gateway.clone(),
        db_path.clone(),
        config.storage.public_endpoint.clone(),
        config.poll,
    ));

    let state = AppState {
        gateway,
        db_path,
        sessions: SessionStore::new(),
        pollers: PollerRegistry::new(),
        poller,
        session_config: config.session.clone(),
        max_upload_bytes: config.server.max_upload_bytes,
    };

    info!(
        bucket = %config.storage.bucket,
        region = %config.storage.region,
        "Storage gateway ready"
    );

    ApiServer::new(state, &config).start().await
}
