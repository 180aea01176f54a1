//! Postgres-backed credential store.
//!
//! ## Error Mapping
//!
//! | SQLx error | PostgreSQL code | StoreError |
//! |------------|-----------------|------------|
//! | Database (unique violation) on register | `23505` | `Conflict` |
//! | Any error during dataset import | any | `Init` (batch rolled back) |
//! | Anything else | any | `Storage` |
//!
//! ## Thread Safety
//!
//! `PostgresUserStore` is `Send + Sync`; the SQLx pool manages connections and
//! the engine provides concurrency control. Every operation is a single
//! statement except the dataset import, which is one transaction.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::instrument;

use warden_auth::CredentialHasher;
use warden_core::{UserId, validate_pair};

use super::r#trait::{StoreError, StoredUser, UserStore, equalize_timing, hash_password, verify_password};

const CREATE_LOGIN_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS login (
        id          UUID PRIMARY KEY,
        email       TEXT NOT NULL UNIQUE,
        salted_hash TEXT NOT NULL,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at  TIMESTAMPTZ NOT NULL DEFAULT now()
    )
"#;

const INSERT_LOGIN: &str =
    "INSERT INTO login (id, email, salted_hash, created_at, updated_at) VALUES ($1, $2, $3, $4, $5)";

const SELECT_LOGIN_BY_EMAIL: &str = "SELECT id, salted_hash FROM login WHERE email = $1";

#[derive(Debug, Clone)]
pub struct PostgresUserStore {
    pool: Arc<PgPool>,
    hasher: CredentialHasher,
}

impl PostgresUserStore {
    pub fn new(pool: PgPool, hasher: CredentialHasher) -> Self {
        Self {
            pool: Arc::new(pool),
            hasher,
        }
    }

    /// Connect, create the `login` table if needed, and import `dataset`.
    pub async fn connect(
        url: &str,
        hasher: CredentialHasher,
        dataset: Option<Vec<StoredUser>>,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await
            .map_err(|e| StoreError::Init(format!("unable to connect to postgres: {e}")))?;

        let store = Self::new(pool, hasher);
        store.ensure_schema().await?;
        if let Some(users) = dataset {
            store.import(&users).await?;
        }
        Ok(store)
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_LOGIN_TABLE)
            .execute(&*self.pool)
            .await
            .map_err(|e| StoreError::Init(format!("unable to create login table: {e}")))?;
        Ok(())
    }

    /// Insert pre-existing users in one transaction.
    ///
    /// Any failing row (duplicate email, duplicate id, ...) rolls back the
    /// whole batch and surfaces as `Init`.
    #[instrument(skip(self, users), fields(records = users.len()), err)]
    pub async fn import(&self, users: &[StoredUser]) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Init(format!("unable to begin import transaction: {e}")))?;

        for (idx, user) in users.iter().enumerate() {
            let inserted = sqlx::query(INSERT_LOGIN)
                .bind(user.id.as_uuid())
                .bind(&user.email)
                .bind(&user.salted_hash)
                .bind(user.created_at)
                .bind(user.updated_at)
                .execute(&mut *tx)
                .await;

            if let Err(e) = inserted {
                tx.rollback()
                    .await
                    .map_err(|e| StoreError::Init(format!("rollback failed: {e}")))?;
                return Err(StoreError::Init(format!(
                    "dataset record {idx} ({}) rejected: {}",
                    user.email,
                    describe(&e)
                )));
            }
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::Init(format!("unable to commit import: {e}")))?;

        tracing::info!("dataset imported");
        Ok(())
    }
}

#[async_trait]
impl UserStore for PostgresUserStore {
    #[instrument(skip(self, password), fields(email = %email), err(level = "warn"))]
    async fn register_user(&self, email: &str, password: &str) -> Result<UserId, StoreError> {
        validate_pair(email, password)?;

        let salted_hash = hash_password(&self.hasher, password).await?;
        let user = StoredUser::new(email, salted_hash);

        sqlx::query(INSERT_LOGIN)
            .bind(user.id.as_uuid())
            .bind(&user.email)
            .bind(&user.salted_hash)
            .bind(user.created_at)
            .bind(user.updated_at)
            .execute(&*self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::Conflict
                } else {
                    map_sqlx_error("register_user", e)
                }
            })?;

        tracing::info!(user_id = %user.id, "user registered");
        Ok(user.id)
    }

    #[instrument(skip(self, password), fields(email = %email), err(level = "warn"))]
    async fn authenticate(&self, email: &str, password: &str) -> Result<UserId, StoreError> {
        validate_pair(email, password)?;

        let row = sqlx::query(SELECT_LOGIN_BY_EMAIL)
            .bind(email)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("authenticate", e))?;

        let Some(row) = row else {
            equalize_timing(&self.hasher, password).await;
            return Err(StoreError::NotFound);
        };

        let id: uuid::Uuid = row
            .try_get("id")
            .map_err(|e| map_sqlx_error("authenticate", e))?;
        let salted_hash: String = row
            .try_get("salted_hash")
            .map_err(|e| map_sqlx_error("authenticate", e))?;

        if !verify_password(&self.hasher, salted_hash, password).await? {
            return Err(StoreError::AuthFailed);
        }

        Ok(UserId::from_uuid(id))
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    StoreError::Storage(format!("{operation}: {}", describe(&err)))
}

fn describe(err: &sqlx::Error) -> String {
    match err {
        sqlx::Error::Database(db_err) => match db_err.code() {
            Some(code) => format!("database error {code}: {}", db_err.message()),
            None => format!("database error: {}", db_err.message()),
        },
        sqlx::Error::PoolClosed => "connection pool closed".to_string(),
        sqlx::Error::PoolTimedOut => "timed out acquiring a connection".to_string(),
        other => other.to_string(),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}
