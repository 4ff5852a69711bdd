use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use crate::application::ports::auth_ports::SessionStoragePort;
use crate::application::services::revocation_cache::RevocationCache;
use crate::common::config::SweeperConfig;

/// Resultado de un barrido
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub refresh_tokens_deleted: u64,
    pub sessions_deleted: u64,
    pub blacklist_entries_deleted: u64,
    pub cached_blacklist_entries: usize,
}

/// Servicio para la limpieza periódica de sesiones, tokens y lista negra
pub struct ExpirySweeper {
    session_storage: Arc<dyn SessionStoragePort>,
    revocation_cache: Arc<RevocationCache>,
    retention: chrono::Duration,
    cache_refresh_interval: Duration,
    sweep_interval: Duration,
}

impl ExpirySweeper {
    pub fn new(
        session_storage: Arc<dyn SessionStoragePort>,
        revocation_cache: Arc<RevocationCache>,
        revoked_retention_days: i64,
        config: &SweeperConfig,
    ) -> Self {
        Self {
            session_storage,
            revocation_cache,
            retention: chrono::Duration::days(revoked_retention_days.max(0)),
            cache_refresh_interval: config.cache_refresh_interval(),
            sweep_interval: config.sweep_interval(),
        }
    }

    /// Inicia los trabajos periódicos hasta que se cancele `shutdown`
    #[instrument(skip(self, shutdown))]
    pub fn start(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        info!(
            "Starting expiry sweeper: cache refresh every {:?}, sweep every {:?}",
            self.cache_refresh_interval, self.sweep_interval
        );

        tokio::spawn(async move {
            let mut refresh = time::interval(self.cache_refresh_interval);
            let mut sweep = time::interval(self.sweep_interval);
            refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);
            sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

            // The first sweep runs immediately and reloads the cache itself
            refresh.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("Expiry sweeper stopped");
                        break;
                    }
                    _ = sweep.tick() => {
                        self.run_sweep_once().await;
                    }
                    _ = refresh.tick() => {
                        debug!("Reloading revocation cache");
                        if let Err(e) = self.revocation_cache.reload().await {
                            error!("Error reloading revocation cache: {}", e);
                        }
                    }
                }
            }
        })
    }

    /// Runs every cleanup step once. A failing step is logged and the rest still run.
    #[instrument(skip(self))]
    pub async fn run_sweep_once(&self) -> SweepReport {
        let retention_cutoff = Utc::now() - self.retention;
        let mut report = SweepReport::default();

        match self.session_storage.delete_stale_refresh_tokens(retention_cutoff).await {
            Ok(deleted) => report.refresh_tokens_deleted = deleted,
            Err(e) => error!("Error deleting stale refresh tokens: {}", e),
        }

        match self.session_storage.delete_dead_sessions(retention_cutoff).await {
            Ok(deleted) => report.sessions_deleted = deleted,
            Err(e) => error!("Error deleting dead sessions: {}", e),
        }

        match self.revocation_cache.purge_expired().await {
            Ok(deleted) => report.blacklist_entries_deleted = deleted,
            Err(e) => error!("Error purging expired blacklist entries: {}", e),
        }

        match self.revocation_cache.reload().await {
            Ok(count) => report.cached_blacklist_entries = count,
            Err(e) => error!("Error reloading revocation cache: {}", e),
        }

        info!(
            "Sweep finished: {} refresh tokens, {} sessions, {} blacklist entries removed",
            report.refresh_tokens_deleted, report.sessions_deleted, report.blacklist_entries_deleted
        );
        report
    }
}
