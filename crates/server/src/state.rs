use std::sync::Arc;
use std::time::Duration;

use baywatch_core::catalog::Catalog;
use baywatch_core::session::Session;
use baywatch_core::store::MemoryStore;
use baywatch_db::DbError;
use sqlx::SqlitePool;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::ServerConfig;

pub type SharedSession = Arc<Mutex<Session<MemoryStore>>>;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub session: SharedSession,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Seed the session from the persisted rows and write back whatever
    /// reconciliation changed.
    pub async fn open(
        db: SqlitePool,
        catalog: Arc<Catalog>,
        config: ServerConfig,
    ) -> Result<Self, DbError> {
        let backend = baywatch_db::repo::view_state::load_store(&db).await?;
        let mut session = Session::start(catalog, backend, None, config.session_config());
        let written = baywatch_db::repo::view_state::flush(&db, session.backend_mut()).await?;
        debug!(written, "session started");
        Ok(Self {
            db,
            session: Arc::new(Mutex::new(session)),
            config: Arc::new(config),
        })
    }
}

/// Write the session's pending key changes. Call with the session lock held
/// so flushes are applied in the order the actions happened.
pub async fn flush(db: &SqlitePool, session: &mut Session<MemoryStore>) -> Result<(), DbError> {
    baywatch_db::repo::view_state::flush(db, session.backend_mut()).await?;
    Ok(())
}

/// Drive coalesced scroll writes and debounced work until the task is dropped.
pub async fn run_ticker(state: AppState, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        let mut session = state.session.lock().await;
        let due = session
            .next_deadline()
            .is_some_and(|deadline| deadline <= std::time::Instant::now());
        if !due {
            continue;
        }
        if let Some(update) = session.tick(std::time::Instant::now()) {
            debug!(
                item_type = %update.item_type,
                query = %update.query,
                count = update.suggestions.len(),
                "suggestions settled"
            );
        }
        if let Err(e) = flush(&state.db, &mut session).await {
            warn!(error = %e, "failed to persist coalesced view state");
        }
    }
}

/// Page-unload equivalent on shutdown: nothing pending may be lost.
pub async fn shutdown(state: &AppState) -> Result<(), DbError> {
    let mut session = state.session.lock().await;
    session.unload();
    flush(&state.db, &mut session).await
}
