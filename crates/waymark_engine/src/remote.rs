//! Remote store interface.
//!
//! The remote API is plain CRUD over one resource collection. The trait
//! abstracts the network layer so the coordinator can be exercised
//! against a scripted mock; [`HttpRemote`] adapts any HTTP client to the
//! trait and owns the transient/permanent classification of responses.

use crate::config::SyncConfig;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;
use thiserror::Error;
use waymark_protocol::{Entity, EntityId, RegionFilter};

/// Result type for remote calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Errors from the remote store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Network unreachable, timeout, or server 5xx. Retried up to the
    /// configured budget.
    #[error("transient remote failure: {message}")]
    Transient {
        /// Description of the failure.
        message: String,
    },

    /// The remote rejected the request (validation, authorization).
    /// Never retried.
    #[error("permanent remote failure: {message}")]
    Permanent {
        /// Description of the failure.
        message: String,
    },
}

impl RemoteError {
    /// Creates a transient failure.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    /// Creates a permanent failure.
    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Permanent {
            message: message.into(),
        }
    }

    /// Returns true if the failure may succeed on retry.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, RemoteError::Transient { .. })
    }
}

/// Thin interface to the remote authoritative store.
///
/// Each call is a single atomic request with a bounded timeout; there is
/// no session state between calls.
pub trait RemoteStore: Send + Sync {
    /// Creates an entity remotely.
    fn insert(&self, entity: &Entity) -> RemoteResult<()>;

    /// Updates an entity remotely.
    fn update(&self, entity: &Entity) -> RemoteResult<()>;

    /// Deletes an entity remotely.
    ///
    /// Idempotent: deleting an already-absent id succeeds.
    fn delete(&self, id: EntityId) -> RemoteResult<()>;

    /// Lists remote entities, optionally scoped to a region.
    fn list(&self, filter: Option<&RegionFilter>) -> RemoteResult<Vec<Entity>>;
}

/// A single HTTP exchange result.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

/// HTTP client abstraction.
///
/// Implement this to plug in an actual HTTP library (reqwest, ureq, a
/// platform networking stack). Transport-level failures are reported as
/// strings and classified as transient by [`HttpRemote`].
pub trait HttpClient: Send + Sync {
    /// Performs one request and returns the raw response.
    fn request(
        &self,
        method: &str,
        url: &str,
        body: Option<&[u8]>,
        timeout: Duration,
    ) -> Result<HttpResponse, String>;
}

/// A [`RemoteStore`] over JSON CRUD endpoints.
///
/// Status classification:
/// - 2xx: success
/// - 404 on delete: success (idempotent delete)
/// - 408, 429, 5xx: transient
/// - any other 4xx: permanent
pub struct HttpRemote<C: HttpClient> {
    base_url: String,
    client: C,
    timeout: Duration,
}

impl<C: HttpClient> HttpRemote<C> {
    /// Creates a remote over `base_url` (no trailing slash).
    ///
    /// Every request uses [`SyncConfig::request_timeout`].
    pub fn new(base_url: impl Into<String>, client: C, config: &SyncConfig) -> Self {
        Self {
            base_url: base_url.into(),
            client,
            timeout: config.request_timeout,
        }
    }

    /// Returns the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn classify(response: &HttpResponse, deleting: bool) -> RemoteResult<()> {
        match response.status {
            200..=299 => Ok(()),
            404 if deleting => Ok(()),
            408 | 429 => Err(RemoteError::transient(format!(
                "HTTP {}",
                response.status
            ))),
            500..=599 => Err(RemoteError::transient(format!(
                "HTTP {}",
                response.status
            ))),
            status => Err(RemoteError::permanent(format!("HTTP {status}"))),
        }
    }

    fn send(
        &self,
        method: &str,
        url: &str,
        body: Option<&[u8]>,
        deleting: bool,
    ) -> RemoteResult<HttpResponse> {
        let response = self
            .client
            .request(method, url, body, self.timeout)
            .map_err(RemoteError::transient)?;
        Self::classify(&response, deleting)?;
        Ok(response)
    }

    fn encode(entity: &Entity) -> RemoteResult<Vec<u8>> {
        serde_json::to_vec(entity)
            .map_err(|e| RemoteError::permanent(format!("encode entity: {e}")))
    }
}

impl<C: HttpClient> RemoteStore for HttpRemote<C> {
    fn insert(&self, entity: &Entity) -> RemoteResult<()> {
        let url = format!("{}/entities", self.base_url);
        self.send("POST", &url, Some(&Self::encode(entity)?), false)?;
        Ok(())
    }

    fn update(&self, entity: &Entity) -> RemoteResult<()> {
        let url = format!("{}/entities/{}", self.base_url, entity.id);
        self.send("PUT", &url, Some(&Self::encode(entity)?), false)?;
        Ok(())
    }

    fn delete(&self, id: EntityId) -> RemoteResult<()> {
        let url = format!("{}/entities/{id}", self.base_url);
        self.send("DELETE", &url, None, true)?;
        Ok(())
    }

    fn list(&self, filter: Option<&RegionFilter>) -> RemoteResult<Vec<Entity>> {
        let url = match filter {
            Some(filter) => format!(
                "{}/entities?{}",
                self.base_url,
                filter.to_query_string()
            ),
            None => format!("{}/entities", self.base_url),
        };
        let response = self.send("GET", &url, None, false)?;
        serde_json::from_slice(&response.body)
            .map_err(|e| RemoteError::permanent(format!("decode entity list: {e}")))
    }
}

/// A recorded call against [`MockRemote`].
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    /// Insert of the given entity id.
    Insert(EntityId),
    /// Update of the given entity id.
    Update(EntityId),
    /// Delete of the given entity id.
    Delete(EntityId),
    /// List query.
    List,
}

/// An in-memory remote store for tests.
///
/// Failures are scripted per call kind: each queued error is consumed by
/// the next matching call. All calls are recorded.
#[derive(Default)]
pub struct MockRemote {
    entities: RwLock<BTreeMap<EntityId, Entity>>,
    fail_writes: Mutex<VecDeque<RemoteError>>,
    fail_lists: Mutex<VecDeque<RemoteError>>,
    calls: Mutex<Vec<RemoteCall>>,
}

impl MockRemote {
    /// Creates an empty mock remote.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the remote with an entity.
    pub fn seed(&self, entity: Entity) {
        self.entities.write().insert(entity.id, entity);
    }

    /// Queues a failure for the next write call (insert/update/delete).
    pub fn fail_next_write(&self, error: RemoteError) {
        self.fail_writes.lock().push_back(error);
    }

    /// Queues a failure for the next list call.
    pub fn fail_next_list(&self, error: RemoteError) {
        self.fail_lists.lock().push_back(error);
    }

    /// Returns the recorded calls.
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().clone()
    }

    /// Returns the remote copy of an entity.
    pub fn get(&self, id: EntityId) -> Option<Entity> {
        self.entities.read().get(&id).cloned()
    }

    /// Returns the number of remote entities.
    pub fn len(&self) -> usize {
        self.entities.read().len()
    }

    /// Returns true if the remote holds no entities.
    pub fn is_empty(&self) -> bool {
        self.entities.read().is_empty()
    }

    fn check_write(&self) -> RemoteResult<()> {
        match self.fail_writes.lock().pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// The authoritative store accepts every write but never lets an
    /// older version regress newer state (server-side last-write-wins).
    fn put_lww(&self, entity: &Entity) {
        let mut entities = self.entities.write();
        match entities.get(&entity.id) {
            Some(existing) if existing.last_modified > entity.last_modified => {}
            _ => {
                entities.insert(entity.id, entity.clone());
            }
        }
    }
}

impl RemoteStore for MockRemote {
    fn insert(&self, entity: &Entity) -> RemoteResult<()> {
        self.calls.lock().push(RemoteCall::Insert(entity.id));
        self.check_write()?;
        self.put_lww(entity);
        Ok(())
    }

    fn update(&self, entity: &Entity) -> RemoteResult<()> {
        self.calls.lock().push(RemoteCall::Update(entity.id));
        self.check_write()?;
        self.put_lww(entity);
        Ok(())
    }

    fn delete(&self, id: EntityId) -> RemoteResult<()> {
        self.calls.lock().push(RemoteCall::Delete(id));
        self.check_write()?;
        // Removing an absent id still succeeds: delete is idempotent.
        self.entities.write().remove(&id);
        Ok(())
    }

    fn list(&self, _filter: Option<&RegionFilter>) -> RemoteResult<Vec<Entity>> {
        self.calls.lock().push(RemoteCall::List);
        if let Some(error) = self.fail_lists.lock().pop_front() {
            return Err(error);
        }
        Ok(self.entities.read().values().cloned().collect())
    }
}
