//! Credential store boundary.
//!
//! Two backends implement [`UserStore`]: an in-memory map for development and
//! tests, and a Postgres table for deployments. The backend is picked once at
//! startup by [`build_user_store`].

pub mod dataset;
pub mod in_memory;
pub mod postgres;
pub mod r#trait;

use std::sync::Arc;

use warden_auth::CredentialHasher;

use crate::config::{Config, RepoType};

pub use dataset::{load_dataset, parse_dataset};
pub use in_memory::InMemoryUserStore;
pub use postgres::PostgresUserStore;
pub use r#trait::{StoreError, StoredUser, UserStore};

/// Construct the configured backend, importing the dataset if one is set.
pub async fn build_user_store(
    config: &Config,
    hasher: CredentialHasher,
) -> Result<Arc<dyn UserStore>, StoreError> {
    let dataset = config
        .init_dataset
        .as_deref()
        .map(load_dataset)
        .transpose()?;

    match &config.repo_type {
        RepoType::InMemory => {
            let store = match dataset {
                Some(users) => InMemoryUserStore::with_dataset(hasher, users)?,
                None => InMemoryUserStore::new(hasher),
            };
            tracing::info!("using in-memory user store");
            Ok(Arc::new(store))
        }
        RepoType::Postgres { url } => {
            let store = PostgresUserStore::connect(url, hasher, dataset).await?;
            tracing::info!("using postgres user store");
            Ok(Arc::new(store))
        }
    }
}
