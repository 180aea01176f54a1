//! Infrastructure layer: credential storage backends and process configuration.

pub mod config;
pub mod user_store;

pub use config::{Config, ConfigError, LifeCycle, RepoType};
pub use user_store::{InMemoryUserStore, PostgresUserStore, StoreError, StoredUser, UserStore, build_user_store};
