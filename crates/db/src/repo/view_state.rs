use baywatch_core::store::{KvChange, MemoryStore};
use sqlx::SqlitePool;
use tracing::debug;

use crate::DbError;

/// Get a persisted value by key.
pub async fn get(pool: &SqlitePool, key: &str) -> Result<Option<String>, DbError> {
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM view_state WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|(v,)| v))
}

/// Every persisted key/value pair.
pub async fn load_all(pool: &SqlitePool) -> Result<Vec<(String, String)>, DbError> {
    let rows = sqlx::query_as("SELECT key, value FROM view_state ORDER BY key")
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Seed an in-process store from the table.
pub async fn load_store(pool: &SqlitePool) -> Result<MemoryStore, DbError> {
    Ok(MemoryStore::from_entries(load_all(pool).await?))
}

/// Apply a batch of changes in one transaction.
pub async fn apply(pool: &SqlitePool, changes: &[KvChange]) -> Result<(), DbError> {
    if changes.is_empty() {
        return Ok(());
    }
    let now = chrono::Utc::now().timestamp();
    let mut tx = pool.begin().await?;
    for change in changes {
        match change {
            KvChange::Set(key, value) => {
                sqlx::query(
                    "INSERT INTO view_state (key, value, updated_ts) VALUES (?, ?, ?) \
                     ON CONFLICT(key) DO UPDATE SET \
                     value = excluded.value, updated_ts = excluded.updated_ts",
                )
                .bind(key)
                .bind(value)
                .bind(now)
                .execute(&mut *tx)
                .await?;
            }
            KvChange::Remove(key) => {
                sqlx::query("DELETE FROM view_state WHERE key = ?")
                    .bind(key)
                    .execute(&mut *tx)
                    .await?;
            }
        }
    }
    tx.commit().await?;
    debug!(changes = changes.len(), "view state flushed");
    Ok(())
}

/// Write whatever `store` changed since the last flush. On failure the
/// keys stay marked so the next flush retries them.
pub async fn flush(pool: &SqlitePool, store: &mut MemoryStore) -> Result<usize, DbError> {
    let changes = store.take_changes();
    if let Err(e) = apply(pool, &changes).await {
        store.mark_changed(changes.iter().map(KvChange::key));
        return Err(e);
    }
    Ok(changes.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use baywatch_core::store::{KeyValueStore, ViewStateStore};
    use baywatch_core::types::{ItemRef, Section};
    use baywatch_core::view_state::ViewState;

    async fn pool() -> SqlitePool {
        let pool = crate::connect(":memory:").await.unwrap();
        crate::migrate::run(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn set_and_remove_are_applied() {
        let pool = pool().await;
        apply(
            &pool,
            &[
                KvChange::Set("a".into(), "1".into()),
                KvChange::Set("b".into(), "2".into()),
            ],
        )
        .await
        .unwrap();
        apply(
            &pool,
            &[KvChange::Set("a".into(), "3".into()), KvChange::Remove("b".into())],
        )
        .await
        .unwrap();

        assert_eq!(get(&pool, "a").await.unwrap().as_deref(), Some("3"));
        assert_eq!(get(&pool, "b").await.unwrap(), None);
        assert_eq!(load_all(&pool).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn view_state_survives_a_restart() {
        let pool = pool().await;

        let mut state = ViewState {
            active_section: Section::WatchLater,
            ..ViewState::default()
        };
        state.watch_later.add(ItemRef::movie("m1"));
        state.scroll_offsets.insert(Section::WatchLater, 77);

        let mut store = ViewStateStore::new(load_store(&pool).await.unwrap());
        store.save(&state);
        let written = flush(&pool, store.backend_mut()).await.unwrap();
        assert!(written > 0);
        assert_eq!(flush(&pool, store.backend_mut()).await.unwrap(), 0);

        let reloaded = ViewStateStore::new(load_store(&pool).await.unwrap());
        assert!(!reloaded.backend().has_changes());
        assert_eq!(reloaded.load(), state);
        assert_eq!(reloaded.backend().get("lastActiveSection").as_deref(), Some("watchLater"));
    }

    #[tokio::test]
    async fn failed_flush_reports_db_error_and_keeps_keys_marked() {
        // No migrations, so the table is missing.
        let pool = crate::connect(":memory:").await.unwrap();
        let mut store = MemoryStore::default();
        store.set("lastActiveSection", "movies".to_string());

        let err = flush(&pool, &mut store).await.unwrap_err();
        assert!(matches!(err, DbError::Sqlx(_)));
        assert!(err.to_string().starts_with("database error:"));
        assert!(store.has_changes());

        crate::migrate::run(&pool).await.unwrap();
        assert_eq!(flush(&pool, &mut store).await.unwrap(), 1);
        assert_eq!(get(&pool, "lastActiveSection").await.unwrap().as_deref(), Some("movies"));
    }
}
