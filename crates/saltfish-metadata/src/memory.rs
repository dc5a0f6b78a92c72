//! In-memory [`MetadataStore`] backend for tests and local development.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{MetadataError, Result};
use crate::types::{DatasetConfig, DatasetDetail};
use crate::MetadataStore;

#[derive(Clone)]
struct User {
    username: String,
    email: String,
}

#[derive(Clone)]
struct Stored {
    config: DatasetConfig,
    created: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<i64, User>,
    datasets: HashMap<Vec<u8>, Stored>,
}

/// Mutex-guarded maps mirroring the relational schema: a users relation
/// (seed it with [`add_user`](MemoryMetadataStore::add_user)) and the
/// dataset rows with their unique `(user_id, name)` constraint.
#[derive(Default)]
pub struct MemoryMetadataStore {
    inner: Mutex<Inner>,
    fail: AtomicBool,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user so foreign-key and username lookups succeed.
    pub fn add_user(&self, user_id: i64, username: &str, email: &str) {
        self.inner.lock().unwrap().users.insert(
            user_id,
            User {
                username: username.to_string(),
                email: email.to_string(),
            },
        );
    }

    /// Makes every subsequent operation fail with a connection error.
    pub fn fail_operations(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn dataset_count(&self) -> usize {
        self.inner.lock().unwrap().datasets.len()
    }

    fn check_available(&self) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            Err(MetadataError::Sql("injected sql failure".to_string()))
        } else {
            Ok(())
        }
    }
}

fn detail(inner: &Inner, stored: &Stored) -> DatasetDetail {
    let user = inner.users.get(&stored.config.user_id);
    DatasetDetail {
        id: stored.config.id.clone(),
        user_id: stored.config.user_id,
        schema: stored.config.schema.clone(),
        name: stored.config.name.clone(),
        private: stored.config.private,
        frozen: stored.config.frozen,
        created: stored.created,
        username: user.map(|u| u.username.clone()).unwrap_or_default(),
        email: user.map(|u| u.email.clone()).unwrap_or_default(),
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn fetch_schema(&self, dataset_id: &[u8]) -> Result<Vec<u8>> {
        self.check_available()?;
        let inner = self.inner.lock().unwrap();
        inner
            .datasets
            .get(dataset_id)
            .map(|stored| stored.config.schema.clone())
            .ok_or(MetadataError::InvalidDatasetId)
    }

    async fn create_dataset(&self, dataset: DatasetConfig) -> Result<()> {
        self.check_available()?;
        let mut inner = self.inner.lock().unwrap();
        if !inner.users.contains_key(&dataset.user_id) {
            return Err(MetadataError::InvalidUserId);
        }
        if inner.datasets.contains_key(&dataset.id) {
            // Callers check idempotency before inserting; a collision here
            // is a lost race on the primary key.
            return Err(MetadataError::Sql("duplicate source_id".to_string()));
        }
        if inner
            .datasets
            .values()
            .any(|s| s.config.user_id == dataset.user_id && s.config.name == dataset.name)
        {
            return Err(MetadataError::DuplicateDatasetName);
        }
        inner.datasets.insert(
            dataset.id.clone(),
            Stored {
                config: dataset,
                created: Utc::now(),
            },
        );
        Ok(())
    }

    async fn delete_dataset(&self, dataset_id: &[u8]) -> Result<u64> {
        self.check_available()?;
        let mut inner = self.inner.lock().unwrap();
        Ok(inner.datasets.remove(dataset_id).map(|_| 1).unwrap_or(0))
    }

    async fn get_dataset_by_id(&self, dataset_id: &[u8]) -> Result<DatasetDetail> {
        self.check_available()?;
        let inner = self.inner.lock().unwrap();
        inner
            .datasets
            .get(dataset_id)
            .map(|stored| detail(&inner, stored))
            .ok_or(MetadataError::InvalidDatasetId)
    }

    async fn get_datasets_by_user(&self, user_id: i64) -> Result<Vec<DatasetDetail>> {
        self.check_available()?;
        let inner = self.inner.lock().unwrap();
        let mut details: Vec<_> = inner
            .datasets
            .values()
            .filter(|s| s.config.user_id == user_id)
            .map(|stored| detail(&inner, stored))
            .collect();
        details.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(details)
    }

    async fn get_datasets_by_username(&self, username: &str) -> Result<Vec<DatasetDetail>> {
        self.check_available()?;
        let user_id = {
            let inner = self.inner.lock().unwrap();
            inner
                .users
                .iter()
                .find(|(_, user)| user.username == username)
                .map(|(id, _)| *id)
        };
        match user_id {
            Some(user_id) => self.get_datasets_by_user(user_id).await,
            None => Err(MetadataError::InvalidUsername(username.to_string())),
        }
    }
}
