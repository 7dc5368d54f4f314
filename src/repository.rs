//! Storage for group snapshots.
//!
//! The engine never touches storage: handlers [`load`](Repository::load) a
//! [`Group`], run engine operations on it and [`update`](Repository::update)
//! the result back. Updates are conditional on the revision that was loaded,
//! so a snapshot that went stale in the meantime is refused with
//! [`RepositoryError::Conflict`] instead of overwriting newer data.
//! [`Retrying`] adds a backoff policy on top of any backend.
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use bson::doc;
use futures::TryStreamExt;
use log::{error, warn};
use mongodb::options::{ReplaceOptions, UpdateOptions};
use mongodb::{Client, Collection};
use thiserror::Error;

use crate::schemas::{Group, GroupId};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RepositoryError {
    #[error("group `{0}` not found")]
    NotFound(GroupId),
    #[error("group `{0}` already exists")]
    AlreadyExists(GroupId),
    #[error("group `{0}` was changed by another request")]
    Conflict(GroupId),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl From<mongodb::error::Error> for RepositoryError {
    fn from(value: mongodb::error::Error) -> Self {
        RepositoryError::Unavailable(value.to_string())
    }
}

impl From<bson::ser::Error> for RepositoryError {
    fn from(value: bson::ser::Error) -> Self {
        RepositoryError::Unavailable(value.to_string())
    }
}

#[allow(async_fn_in_trait)]
pub trait Repository {
    async fn list(&self) -> Result<Vec<Group>, RepositoryError>;
    async fn load(&self, id: &str) -> Result<Group, RepositoryError>;
    /// Stores a new group; fails with `AlreadyExists` when the id is taken.
    async fn create(&self, group: &Group) -> Result<(), RepositoryError>;
    /// Replaces the stored group only if its revision is still
    /// `expected_revision`, otherwise fails with `Conflict`.
    async fn update(&self, group: &Group, expected_revision: u64) -> Result<(), RepositoryError>;
    /// Stores the group unconditionally, creating it when it does not exist yet.
    async fn save(&self, group: &Group) -> Result<(), RepositoryError>;
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0-based), doubling each time.
    pub fn backoff(&self, retry: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(2u32.saturating_pow(retry))
    }

    /// Runs `op` until it succeeds, fails with something other than
    /// [`RepositoryError::Unavailable`], or runs out of attempts.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, RepositoryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RepositoryError>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Err(RepositoryError::Unavailable(reason)) if attempt < attempts => {
                    let delay = self.backoff(attempt - 1);
                    warn!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        what, attempt, attempts, reason, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(RepositoryError::Unavailable(reason)) => {
                    error!("{} failed after {} attempts: {}", what, attempt, reason);
                    return Err(RepositoryError::Unavailable(reason));
                }
                other => return other,
            }
        }
    }
}

/// Wraps a backend so transient failures are retried.
pub struct Retrying<R> {
    inner: R,
    policy: RetryPolicy,
}

impl<R> Retrying<R> {
    pub fn new(inner: R, policy: RetryPolicy) -> Self {
        Retrying { inner, policy }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }
}

impl<R: Repository> Repository for Retrying<R> {
    async fn list(&self) -> Result<Vec<Group>, RepositoryError> {
        self.policy.run("list groups", || self.inner.list()).await
    }

    async fn load(&self, id: &str) -> Result<Group, RepositoryError> {
        self.policy.run("load group", || self.inner.load(id)).await
    }

    async fn create(&self, group: &Group) -> Result<(), RepositoryError> {
        self.policy.run("create group", || self.inner.create(group)).await
    }

    async fn update(&self, group: &Group, expected_revision: u64) -> Result<(), RepositoryError> {
        self.policy
            .run("update group", || self.inner.update(group, expected_revision))
            .await
    }

    async fn save(&self, group: &Group) -> Result<(), RepositoryError> {
        self.policy.run("save group", || self.inner.save(group)).await
    }
}

/// Groups stored as documents in a MongoDB collection, keyed by `id`.
pub struct MongoRepository {
    groups: Collection<Group>,
}

impl MongoRepository {
    pub async fn connect(
        uri: &str,
        database: &str,
        collection: &str,
    ) -> Result<Self, RepositoryError> {
        let client = Client::with_uri_str(uri).await?;
        Ok(MongoRepository {
            groups: client.database(database).collection(collection),
        })
    }
}

impl Repository for MongoRepository {
    async fn list(&self) -> Result<Vec<Group>, RepositoryError> {
        let cursor = self.groups.find(None, None).await?;
        let groups: Vec<Group> = cursor.try_collect().await?;
        Ok(groups)
    }

    async fn load(&self, id: &str) -> Result<Group, RepositoryError> {
        match self.groups.find_one(doc! { "id": id }, None).await? {
            Some(group) => Ok(group),
            None => Err(RepositoryError::NotFound(id.to_string())),
        }
    }

    async fn create(&self, group: &Group) -> Result<(), RepositoryError> {
        let options = UpdateOptions::builder().upsert(true).build();
        let result = self
            .groups
            .update_one(
                doc! { "id": group.id() },
                doc! { "$setOnInsert": bson::to_document(group)? },
                options,
            )
            .await?;
        match result.upserted_id {
            Some(_) => Ok(()),
            None => Err(RepositoryError::AlreadyExists(group.id().to_string())),
        }
    }

    async fn update(&self, group: &Group, expected_revision: u64) -> Result<(), RepositoryError> {
        let filter = doc! { "id": group.id(), "revision": expected_revision as i64 };
        let result = self.groups.replace_one(filter, group, None).await?;
        if result.matched_count == 0 {
            return Err(RepositoryError::Conflict(group.id().to_string()));
        }
        Ok(())
    }

    async fn save(&self, group: &Group) -> Result<(), RepositoryError> {
        let options = ReplaceOptions::builder().upsert(true).build();
        self.groups
            .replace_one(doc! { "id": group.id() }, group, options)
            .await?;
        Ok(())
    }
}

/// Process-local storage, lost on restart.
#[derive(Default)]
pub struct MemoryRepository {
    groups: Mutex<BTreeMap<GroupId, Group>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<GroupId, Group>>, RepositoryError> {
        self.groups
            .lock()
            .map_err(|_| RepositoryError::Unavailable("memory store poisoned".to_string()))
    }
}

impl Repository for MemoryRepository {
    async fn list(&self) -> Result<Vec<Group>, RepositoryError> {
        Ok(self.lock()?.values().cloned().collect())
    }

    async fn load(&self, id: &str) -> Result<Group, RepositoryError> {
        self.lock()?
            .get(id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn create(&self, group: &Group) -> Result<(), RepositoryError> {
        match self.lock()?.entry(group.id().to_string()) {
            Entry::Occupied(_) => Err(RepositoryError::AlreadyExists(group.id().to_string())),
            Entry::Vacant(slot) => {
                slot.insert(group.clone());
                Ok(())
            }
        }
    }

    async fn update(&self, group: &Group, expected_revision: u64) -> Result<(), RepositoryError> {
        let mut groups = self.lock()?;
        match groups.get_mut(group.id()) {
            Some(stored) if stored.revision() == expected_revision => {
                *stored = group.clone();
                Ok(())
            }
            _ => Err(RepositoryError::Conflict(group.id().to_string())),
        }
    }

    async fn save(&self, group: &Group) -> Result<(), RepositoryError> {
        self.lock()?.insert(group.id().to_string(), group.clone());
        Ok(())
    }
}
