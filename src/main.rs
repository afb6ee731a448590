use anyhow::Result;
use image_gallery::{
    config::AppConfig,
    db,
    identity::{Anonymous, IdentityProvider, JwtIdentityProvider},
    services::{
        image_repository::SqliteImageRepository, image_service::ImageService,
        revalidate::Revalidator,
    },
    state::AppState,
    storage::{LocalStore, ObjectStore, SupabaseStore},
};
use std::{io::ErrorKind, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = AppConfig::from_env_and_args()?;

    tracing::info!("Starting image-gallery with config: {:?}", cfg);

    // --- Initialize SQLite connection ---
    let pool = db::connect(&cfg.database_url).await?;

    // --- Handle migration mode ---
    if migrate {
        db::run_migrations(&pool).await?;
        tracing::info!("Database migration complete.");
        return Ok(()); // exit after migration
    }
    if cfg.auto_migrate {
        db::run_migrations(&pool).await?;
    }

    // --- Object storage ---
    let mut local_store = None;
    let store: Option<Arc<dyn ObjectStore>> = match (&cfg.supabase, &cfg.storage_dir) {
        (Some(supabase), _) => {
            tracing::info!(
                "Using Supabase storage at {} (bucket `{}`)",
                supabase.url,
                supabase.bucket
            );
            Some(Arc::new(SupabaseStore::new(
                &supabase.url,
                supabase.key.expose(),
                supabase.bucket.clone(),
            )?))
        }
        (None, Some(dir)) => {
            let local = Arc::new(LocalStore::new(dir, &cfg.public_url).await?);
            tracing::info!("Using local storage at {}", dir);
            local_store = Some(local.clone());
            Some(local)
        }
        (None, None) => {
            tracing::warn!(
                "No object storage configured (SUPABASE_URL/SUPABASE_KEY or IMAGE_GALLERY_STORAGE_DIR); uploads will fail"
            );
            None
        }
    };

    // --- Identity ---
    let identity: Arc<dyn IdentityProvider> = match &cfg.jwt_secret {
        Some(secret) => Arc::new(JwtIdentityProvider::new(secret.expose().as_bytes())),
        None => {
            tracing::warn!("IMAGE_GALLERY_JWT_SECRET is not set; every request is anonymous");
            Arc::new(Anonymous)
        }
    };

    // --- Initialize core service ---
    let repo = Arc::new(SqliteImageRepository::new(Arc::new(pool)));
    let images = ImageService::new(repo, store, Revalidator::new());

    let state = AppState {
        images,
        identity,
        local_store,
        sign_in_url: cfg.sign_in_url.clone(),
    };

    // --- Build router ---
    let app = image_gallery::app(state, cfg.max_upload_bytes);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
