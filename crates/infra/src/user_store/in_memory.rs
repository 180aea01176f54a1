use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::instrument;

use warden_auth::CredentialHasher;
use warden_core::{UserId, validate_pair};

use super::r#trait::{StoreError, StoredUser, UserStore, equalize_timing, hash_password, verify_password};

/// In-memory credential store keyed by email.
///
/// A single mutex guards the map and is held only for one lookup or one
/// check-and-insert. Hashing runs outside the lock; the insert re-checks the
/// email so concurrent registrations of the same address yield exactly one
/// success.
#[derive(Debug)]
pub struct InMemoryUserStore {
    users: Mutex<HashMap<String, StoredUser>>,
    hasher: CredentialHasher,
}

impl InMemoryUserStore {
    pub fn new(hasher: CredentialHasher) -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
            hasher,
        }
    }

    /// Build a store pre-populated with `users`.
    ///
    /// Two records sharing an email reject the whole dataset.
    pub fn with_dataset(hasher: CredentialHasher, users: Vec<StoredUser>) -> Result<Self, StoreError> {
        let mut by_email = HashMap::with_capacity(users.len());
        for (idx, user) in users.into_iter().enumerate() {
            match by_email.entry(user.email.clone()) {
                Entry::Occupied(_) => {
                    return Err(StoreError::Init(format!(
                        "dataset record {idx} duplicates email {}",
                        user.email
                    )));
                }
                Entry::Vacant(slot) => {
                    slot.insert(user);
                }
            }
        }

        tracing::info!(records = by_email.len(), "in-memory user store pre-populated");
        Ok(Self {
            users: Mutex::new(by_email),
            hasher,
        })
    }

    /// Snapshot of the record stored for `email`.
    #[cfg(test)]
    pub(crate) fn find_by_email(&self, email: &str) -> Result<Option<StoredUser>, StoreError> {
        Ok(self.lock()?.get(email).cloned())
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.len())
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, StoredUser>>, StoreError> {
        self.users
            .lock()
            .map_err(|_| StoreError::Storage("lock poisoned".to_string()))
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    #[instrument(skip(self, password), fields(email = %email), err(level = "warn"))]
    async fn register_user(&self, email: &str, password: &str) -> Result<UserId, StoreError> {
        validate_pair(email, password)?;

        // Cheap early exit; the insert below re-checks under the lock.
        if self.lock()?.contains_key(email) {
            return Err(StoreError::Conflict);
        }

        let salted_hash = hash_password(&self.hasher, password).await?;
        let user = StoredUser::new(email, salted_hash);
        let id = user.id;

        match self.lock()?.entry(email.to_owned()) {
            Entry::Occupied(_) => return Err(StoreError::Conflict),
            Entry::Vacant(slot) => {
                slot.insert(user);
            }
        }

        tracing::info!(user_id = %id, "user registered");
        Ok(id)
    }

    #[instrument(skip(self, password), fields(email = %email), err(level = "warn"))]
    async fn authenticate(&self, email: &str, password: &str) -> Result<UserId, StoreError> {
        validate_pair(email, password)?;

        let found = self
            .lock()?
            .get(email)
            .map(|u| (u.id, u.salted_hash.clone()));

        let Some((id, salted_hash)) = found else {
            equalize_timing(&self.hasher, password).await;
            return Err(StoreError::NotFound);
        };

        if !verify_password(&self.hasher, salted_hash, password).await? {
            return Err(StoreError::AuthFailed);
        }

        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use proptest::prelude::*;

    use super::*;
    use crate::user_store::test_support::{fast_hasher, stored_user};

    fn store() -> InMemoryUserStore {
        InMemoryUserStore::new(fast_hasher())
    }

    #[tokio::test]
    async fn register_then_authenticate_returns_same_id() {
        let store = store();
        let id = store.register_user("a@b.com", "pw1").await.unwrap();
        assert_eq!(store.authenticate("a@b.com", "pw1").await.unwrap(), id);
    }

    #[tokio::test]
    async fn duplicate_email_conflicts_regardless_of_password() {
        let store = store();
        store.register_user("a@b.com", "pw1").await.unwrap();
        assert_eq!(store.register_user("a@b.com", "pw1").await, Err(StoreError::Conflict));
        assert_eq!(store.register_user("a@b.com", "other").await, Err(StoreError::Conflict));
        assert_eq!(store.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn wrong_password_fails_authentication() {
        let store = store();
        store.register_user("a@b.com", "pw1").await.unwrap();
        assert_eq!(store.authenticate("a@b.com", "wrong").await, Err(StoreError::AuthFailed));
    }

    #[tokio::test]
    async fn unknown_email_is_not_found() {
        assert_eq!(store().authenticate("nobody@b.com", "pw1").await, Err(StoreError::NotFound));
    }

    #[tokio::test]
    async fn empty_fields_are_validation_errors() {
        let store = store();
        for (email, password) in [("", "pw1"), ("a@b.com", ""), ("", "")] {
            assert!(matches!(store.register_user(email, password).await, Err(StoreError::Validation(_))));
            assert!(matches!(store.authenticate(email, password).await, Err(StoreError::Validation(_))));
        }
        assert_eq!(store.len().unwrap(), 0);
    }

    #[tokio::test]
    async fn stored_record_holds_only_a_salted_hash() {
        let store = store();
        store.register_user("a@b.com", "same-password").await.unwrap();
        store.register_user("c@d.com", "same-password").await.unwrap();

        let a = store.find_by_email("a@b.com").unwrap().unwrap();
        let c = store.find_by_email("c@d.com").unwrap().unwrap();
        assert!(!a.salted_hash.contains("same-password"));
        assert_ne!(a.salted_hash, c.salted_hash);
        assert_ne!(a.id, c.id);
        assert_eq!(a.created_at, a.updated_at);
    }

    #[tokio::test]
    async fn concurrent_registration_of_one_email_has_one_winner() {
        let store = Arc::new(store());
        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.register_user("race@b.com", &format!("pw{i}")).await
            }));
        }

        let mut wins = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => wins += 1,
                Err(e) => assert_eq!(e, StoreError::Conflict),
            }
        }
        assert_eq!(wins, 1);
        assert_eq!(store.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn dataset_users_can_authenticate() {
        let user = stored_user("user@x.net", "secret");
        let id = user.id;
        let store = InMemoryUserStore::with_dataset(fast_hasher(), vec![user]).unwrap();

        assert_eq!(store.authenticate("user@x.net", "secret").await.unwrap(), id);
        assert_eq!(store.register_user("user@x.net", "again").await, Err(StoreError::Conflict));
    }

    /// Records the level of every event emitted while installed.
    #[derive(Clone, Default)]
    struct LevelRecorder(Arc<std::sync::Mutex<Vec<tracing::Level>>>);

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for LevelRecorder {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
            self.0.lock().unwrap().push(*event.metadata().level());
        }
    }

    #[tokio::test]
    async fn client_faults_are_not_logged_as_errors() {
        use tracing_subscriber::layer::SubscriberExt;

        let recorder = LevelRecorder::default();
        let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(recorder.clone()));

        let store = store();
        store.register_user("a@b.com", "pw1").await.unwrap();
        assert_eq!(store.register_user("a@b.com", "pw1").await, Err(StoreError::Conflict));
        assert_eq!(store.authenticate("a@b.com", "wrong").await, Err(StoreError::AuthFailed));
        assert_eq!(store.authenticate("x@b.com", "pw1").await, Err(StoreError::NotFound));
        assert!(store.register_user("", "pw1").await.is_err());

        let levels = recorder.0.lock().unwrap().clone();
        assert!(!levels.contains(&tracing::Level::ERROR), "{levels:?}");
        assert_eq!(levels.iter().filter(|l| **l == tracing::Level::WARN).count(), 4);
    }

    #[test]
    fn duplicate_dataset_emails_fail_construction() {
        let users = vec![stored_user("dup@x.net", "a"), stored_user("dup@x.net", "b")];
        let err = InMemoryUserStore::with_dataset(fast_hasher(), users).unwrap_err();
        assert!(matches!(err, StoreError::Init(_)));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn any_non_empty_pair_round_trips(email in "[a-z0-9.]{1,16}@[a-z]{1,8}\\.com", password in ".{1,24}") {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let store = store();
                let id = store.register_user(&email, &password).await.unwrap();
                assert_eq!(store.authenticate(&email, &password).await.unwrap(), id);
            });
        }
    }
}
