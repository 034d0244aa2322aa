//! Firmament server binary

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use firmament::{
    auth::JwtValidator,
    blob::{BlobStore, MemoryBlobStore, S3BlobStore},
    config::Args,
    db::{Backend, MemoryBackend, MongoClient},
    server::{self, AppState},
    services::{Services, SignTtl},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("firmament={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Firmament");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("MongoDB: {}/{}", args.mongodb_uri, args.mongodb_db);
    info!("======================================");

    let backend: Arc<dyn Backend> = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => {
            info!("MongoDB connected successfully");
            Arc::new(client)
        }
        Err(e) if args.dev_mode => {
            warn!("MongoDB connection failed (dev mode, using in-memory store): {}", e);
            Arc::new(MemoryBackend::new())
        }
        Err(e) => {
            error!("MongoDB connection failed: {}", e);
            std::process::exit(1);
        }
    };

    let blobs: Arc<dyn BlobStore> = match args.s3_config() {
        Some(config) => Arc::new(S3BlobStore::new(config)?),
        None => {
            warn!("Object store not configured (dev mode, keeping uploads in memory)");
            Arc::new(MemoryBlobStore::new())
        }
    };

    let jwt = match args.jwt_secret() {
        Some(secret) => JwtValidator::new(secret, args.jwt_expiry_seconds)?,
        None => JwtValidator::new_dev(),
    };

    let policies = args.policy_table().map_err(anyhow::Error::msg)?;
    let ttl = SignTtl {
        list: args.sign_ttl_list_seconds,
        detail: args.sign_ttl_detail_seconds,
    };

    let services = Services::new(backend, blobs, policies, ttl);
    services.ensure_indexes().await?;

    let state = Arc::new(AppState::new(args, services, jwt));
    server::run(state).await?;

    Ok(())
}
