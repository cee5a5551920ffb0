mod api;
mod middleware;
mod scheduler;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use bizscout_core::{Classifier, SearchSettings};
use bizscout_db::{PgProfileStore, PgSettingsStore, PgTaskStore, ProfileStore};
use bizscout_extractor::{Extractor, ExtractorConfig};
use bizscout_scraper::BrowserlessLauncher;

use crate::{
    api::{build_app, default_rate_limit_state, AppState},
    middleware::AuthState,
    scheduler::TaskScheduler,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = bizscout_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = bizscout_db::PoolConfig::from_app_config(&config);
    let pool = bizscout_db::connect_pool(&config.database_url, pool_config).await?;
    let applied = bizscout_db::run_migrations(&pool).await?;
    tracing::info!(applied, "migrations up to date");

    bizscout_db::ensure_search_settings(&pool, &SearchSettings::default()).await?;

    let profiles: Arc<dyn ProfileStore> = Arc::new(PgProfileStore::new(pool.clone()));
    let extractor = Arc::new(Extractor::new(
        Arc::new(BrowserlessLauncher::from_config(&config)?),
        Arc::clone(&profiles),
        Classifier::from_config(&config),
        ExtractorConfig::from_app_config(&config),
    ));

    let scheduler = Arc::new(
        TaskScheduler::new(Arc::new(PgTaskStore::new(pool.clone())), Arc::clone(&extractor)).await?,
    );
    scheduler.initialize().await?;
    scheduler
        .register_default_search(
            Arc::new(PgSettingsStore::new(pool.clone())),
            &config.default_search_cron,
        )
        .await?;
    scheduler.start().await?;

    let auth = AuthState::from_env(matches!(
        config.env,
        bizscout_core::Environment::Development
    ))?;
    let app = build_app(
        AppState {
            pool,
            scheduler: Arc::clone(&scheduler),
            extractor,
            profiles,
        },
        auth,
        default_rate_limit_state(),
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, env = %config.env, "bizscout-server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Err(e) = scheduler.shutdown().await {
        tracing::warn!(error = %e, "scheduler did not stop cleanly");
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
