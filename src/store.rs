//! Article persistence.
//!
//! An [`ArticleStore`] opens a [`StoreSession`], which wraps one transaction
//! spanning the whole run. Inserts are idempotent on `url`: a second insert of
//! the same URL is a no-op that reports `false`, never an update.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE articles (
//!     id                  BIGSERIAL PRIMARY KEY,
//!     source_domain       TEXT NOT NULL,
//!     title               TEXT NOT NULL,
//!     url                 TEXT NOT NULL UNIQUE,
//!     scraped_text        TEXT NOT NULL,
//!     classification_json TEXT
//! );
//! ```
//!
//! The table is managed outside this crate.

use crate::error::StoreError;
use crate::models::ArticleRecord;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Connection, Postgres, Transaction};
use tracing::{debug, info, instrument, warn};

const INSERT_ARTICLE: &str = r#"
    INSERT INTO articles (source_domain, title, url, scraped_text, classification_json)
    VALUES ($1, $2, $3, $4, $5)
    ON CONFLICT (url) DO NOTHING
"#;

/// Opens sessions against a backing store.
pub trait ArticleStore {
    type Session: StoreSession;

    /// Connect and begin the run's transaction.
    ///
    /// # Errors
    ///
    /// [`StoreError::Connect`] when the database is unreachable or refuses
    /// the connection. The run aborts before any network call to GDELT.
    async fn open(&self) -> Result<Self::Session, StoreError>;
}

/// One run's worth of writes. All inserts share a transaction; `commit` or
/// `rollback` ends it and `close` releases the connection.
pub trait StoreSession {
    /// Insert `record` unless a row with the same `url` exists.
    ///
    /// # Returns
    ///
    /// `true` if a new row was written, `false` if the URL already existed.
    ///
    /// # Errors
    ///
    /// [`StoreError::Query`] when the statement fails; earlier inserts of the
    /// session are unaffected. [`StoreError::SessionFinished`] after
    /// `commit` or `rollback`.
    async fn insert_if_absent(&mut self, record: &ArticleRecord) -> Result<bool, StoreError>;

    /// Make every insert of this session durable.
    ///
    /// # Errors
    ///
    /// [`StoreError::Query`] when the database rejects the commit, or
    /// [`StoreError::SessionFinished`] if the session already ended.
    async fn commit(&mut self) -> Result<(), StoreError>;

    /// Discard every insert of this session. A no-op once the session has
    /// already been committed or rolled back.
    async fn rollback(&mut self) -> Result<(), StoreError>;

    /// Release the connection. Uncommitted inserts are discarded.
    async fn close(self);
}

/// Postgres store.
#[derive(Debug, Clone)]
pub struct PgArticleStore {
    database_url: String,
}

impl PgArticleStore {
    /// Create a store; nothing connects until [`ArticleStore::open`].
    ///
    /// # Arguments
    ///
    /// * `database_url` - A `postgres://` connection string
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
        }
    }
}

impl ArticleStore for PgArticleStore {
    type Session = PgSession;

    #[instrument(level = "info", skip_all)]
    async fn open(&self) -> Result<PgSession, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect(&self.database_url)
            .await
            .map_err(StoreError::Connect)?;
        let tx = pool.begin().await.map_err(StoreError::Connect)?;
        info!("DB connected, transaction open");
        Ok(PgSession { pool, tx: Some(tx) })
    }
}

/// A single Postgres connection holding the run's transaction.
pub struct PgSession {
    pool: PgPool,
    tx: Option<Transaction<'static, Postgres>>,
}

impl StoreSession for PgSession {
    #[instrument(level = "debug", skip_all, fields(url = %record.url))]
    async fn insert_if_absent(&mut self, record: &ArticleRecord) -> Result<bool, StoreError> {
        let tx = self.tx.as_mut().ok_or(StoreError::SessionFinished)?;

        // A failed statement poisons the whole Postgres transaction, so each
        // insert runs inside its own savepoint.
        let mut savepoint = Connection::begin(&mut **tx).await.map_err(StoreError::Query)?;
        let result = sqlx::query(INSERT_ARTICLE)
            .bind(&record.source_domain)
            .bind(&record.title)
            .bind(&record.url)
            .bind(&record.scraped_text)
            .bind(record.classification_json.as_deref())
            .execute(&mut *savepoint)
            .await
            .map_err(StoreError::Query)?;
        savepoint.commit().await.map_err(StoreError::Query)?;

        let inserted = result.rows_affected() > 0;
        debug!(inserted, "Insert executed");
        Ok(inserted)
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        let tx = self.tx.take().ok_or(StoreError::SessionFinished)?;
        tx.commit().await.map_err(StoreError::Query)?;
        info!("Transaction committed");
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        match self.tx.take() {
            Some(tx) => {
                tx.rollback().await.map_err(StoreError::Query)?;
                warn!("Transaction rolled back");
            }
            None => debug!("Rollback requested on finished session; nothing to do"),
        }
        Ok(())
    }

    async fn close(mut self) {
        // An unfinished transaction is rolled back when dropped.
        drop(self.tx.take());
        self.pool.close().await;
        info!("Database connection closed");
    }
}

#[cfg(test)]
pub mod memory {
    //! In-memory store for tests. Shares its state through an `Arc` so tests
    //! can inspect rows and call counts after the runner consumed the store.

    use super::*;
    use std::sync::{Arc, Mutex, MutexGuard};

    #[derive(Debug, Default)]
    pub struct MemoryState {
        pub rows: Vec<ArticleRecord>,
        pub opens: usize,
        pub insert_attempts: usize,
        pub commits: usize,
        pub rollbacks: usize,
        pub closes: usize,
    }

    #[derive(Debug, Clone, Default)]
    pub struct MemoryArticleStore {
        state: Arc<Mutex<MemoryState>>,
        fail_open: bool,
        fail_commit: bool,
        fail_insert_url: Option<String>,
    }

    impl MemoryArticleStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing_open() -> Self {
            Self {
                fail_open: true,
                ..Self::default()
            }
        }

        pub fn failing_commit() -> Self {
            Self {
                fail_commit: true,
                ..Self::default()
            }
        }

        pub fn failing_insert_for(url: &str) -> Self {
            Self {
                fail_insert_url: Some(url.to_string()),
                ..Self::default()
            }
        }

        pub fn state(&self) -> MutexGuard<'_, MemoryState> {
            self.state.lock().unwrap()
        }
    }

    impl ArticleStore for MemoryArticleStore {
        type Session = MemorySession;

        async fn open(&self) -> Result<MemorySession, StoreError> {
            if self.fail_open {
                return Err(StoreError::Connect(sqlx::Error::PoolTimedOut));
            }
            self.state().opens += 1;
            Ok(MemorySession {
                state: Arc::clone(&self.state),
                pending: Vec::new(),
                finished: false,
                fail_commit: self.fail_commit,
                fail_insert_url: self.fail_insert_url.clone(),
            })
        }
    }

    #[derive(Debug)]
    pub struct MemorySession {
        state: Arc<Mutex<MemoryState>>,
        pending: Vec<ArticleRecord>,
        finished: bool,
        fail_commit: bool,
        fail_insert_url: Option<String>,
    }

    impl StoreSession for MemorySession {
        async fn insert_if_absent(&mut self, record: &ArticleRecord) -> Result<bool, StoreError> {
            if self.finished {
                return Err(StoreError::SessionFinished);
            }
            let mut state = self.state.lock().unwrap();
            state.insert_attempts += 1;
            if self.fail_insert_url.as_deref() == Some(record.url.as_str()) {
                return Err(StoreError::Query(sqlx::Error::Protocol("insert failed".into())));
            }
            let exists = state.rows.iter().chain(&self.pending).any(|r| r.url == record.url);
            if exists {
                return Ok(false);
            }
            self.pending.push(record.clone());
            Ok(true)
        }

        async fn commit(&mut self) -> Result<(), StoreError> {
            if self.finished {
                return Err(StoreError::SessionFinished);
            }
            if self.fail_commit {
                return Err(StoreError::Query(sqlx::Error::Protocol("commit failed".into())));
            }
            let mut state = self.state.lock().unwrap();
            state.rows.append(&mut self.pending);
            state.commits += 1;
            self.finished = true;
            Ok(())
        }

        async fn rollback(&mut self) -> Result<(), StoreError> {
            if !self.finished {
                self.pending.clear();
                self.state.lock().unwrap().rollbacks += 1;
                self.finished = true;
            }
            Ok(())
        }

        async fn close(self) {
            self.state.lock().unwrap().closes += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryArticleStore;
    use super::*;

    fn record(url: &str, title: &str) -> ArticleRecord {
        ArticleRecord {
            source_domain: "cnn.com".to_string(),
            title: title.to_string(),
            url: url.to_string(),
            scraped_text: "text".to_string(),
            classification_json: None,
        }
    }

    #[tokio::test]
    async fn test_insert_twice_is_true_then_false() {
        let store = MemoryArticleStore::new();
        let mut session = store.open().await.unwrap();

        assert!(session.insert_if_absent(&record("https://cnn.com/a", "first")).await.unwrap());
        assert!(!session.insert_if_absent(&record("https://cnn.com/a", "second")).await.unwrap());
        session.commit().await.unwrap();
        session.close().await;

        let state = store.state();
        assert_eq!(state.rows.len(), 1);
        assert_eq!(state.rows[0].title, "first");
    }

    #[tokio::test]
    async fn test_duplicate_across_runs_is_not_overwritten() {
        let store = MemoryArticleStore::new();

        let mut first = store.open().await.unwrap();
        assert!(first.insert_if_absent(&record("https://cnn.com/a", "original")).await.unwrap());
        first.commit().await.unwrap();
        first.close().await;

        let mut second = store.open().await.unwrap();
        assert!(!second.insert_if_absent(&record("https://cnn.com/a", "changed")).await.unwrap());
        second.commit().await.unwrap();
        second.close().await;

        let state = store.state();
        assert_eq!(state.rows.len(), 1);
        assert_eq!(state.rows[0].title, "original");
    }

    #[tokio::test]
    async fn test_rollback_discards_session_inserts() {
        let store = MemoryArticleStore::new();
        let mut session = store.open().await.unwrap();
        session.insert_if_absent(&record("https://cnn.com/a", "a")).await.unwrap();
        session.insert_if_absent(&record("https://cnn.com/b", "b")).await.unwrap();
        session.rollback().await.unwrap();
        session.close().await;

        let state = store.state();
        assert!(state.rows.is_empty());
        assert_eq!(state.rollbacks, 1);
        assert_eq!(state.closes, 1);
    }

    #[tokio::test]
    async fn test_finished_session_rejects_inserts() {
        let store = MemoryArticleStore::new();
        let mut session = store.open().await.unwrap();
        session.commit().await.unwrap();
        let err = session.insert_if_absent(&record("https://cnn.com/a", "a")).await.unwrap_err();
        assert!(matches!(err, StoreError::SessionFinished));
        // rollback after commit changes nothing
        session.rollback().await.unwrap();
        assert_eq!(store.state().rollbacks, 0);
    }
}
