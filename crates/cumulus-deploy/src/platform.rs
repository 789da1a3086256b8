// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Platform API trait definitions and the in-memory mock.
//!
//! The planner talks to the execution platform only through
//! [`PlatformApi`]. Production code wires in an HTTP client elsewhere;
//! tests use [`MockPlatform`], which records every call. Transient
//! (5xx-class) failures are retried here with bounded exponential
//! backoff; nothing above this layer retries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::warn;

/// A platform object ID (`applet-xxxx`, `workflow-xxxx`, `file-xxxx`).
pub type ObjectId = String;

/// Errors from platform operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PlatformError {
    /// The API rejected the request.
    #[error("platform error [{code}]: {message}")]
    Api {
        /// Platform error code.
        code: String,
        /// Human-readable message.
        message: String,
        /// Whether the failure class is transient (5xx) and worth
        /// retrying.
        retryable: bool,
    },

    /// The referenced object does not exist.
    #[error("object not found: {0}")]
    NotFound(String),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PlatformError {
    /// Whether retrying the operation may help.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PlatformError::Api { retryable: true, .. })
    }
}

/// Result type for platform operations.
pub type Result<T> = std::result::Result<T, PlatformError>;

/// The class of a data object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectClass {
    /// A single-executable applet.
    Applet,
    /// A workflow of stages.
    Workflow,
}

/// Description of a platform data object.
#[derive(Debug, Clone)]
pub struct ObjectDescriptor {
    /// Object ID.
    pub id: ObjectId,
    /// Object name.
    pub name: String,
    /// Object class.
    pub class: ObjectClass,
    /// Folder the object lives in.
    pub folder: String,
    /// Creation timestamp.
    pub created: DateTime<Utc>,
    /// Properties attached to the object.
    pub properties: HashMap<String, String>,
}

/// The platform operations the compiler core needs.
///
/// All calls are blocking I/O from the core's perspective; the planner
/// invokes them strictly sequentially, so implementations need no
/// internal ordering guarantees.
#[async_trait]
pub trait PlatformApi: Send + Sync {
    /// Create a new applet from a rendered request. Returns its ID.
    async fn applet_new(&self, project: &str, request: &JsonValue) -> Result<ObjectId>;

    /// Create a new (open) workflow from a rendered request.
    async fn workflow_new(&self, project: &str, request: &JsonValue) -> Result<ObjectId>;

    /// Close an object, freezing its spec.
    async fn close(&self, id: &ObjectId) -> Result<()>;

    /// Describe an object.
    async fn describe(&self, id: &ObjectId) -> Result<ObjectDescriptor>;

    /// Find data objects in a project carrying the given property key,
    /// optionally restricted to one folder.
    async fn find_objects_by_property(
        &self,
        project: &str,
        folder: Option<&str>,
        property: &str,
    ) -> Result<Vec<ObjectDescriptor>>;

    /// Move objects into the project's archive folder.
    async fn archive(&self, project: &str, ids: &[ObjectId]) -> Result<()>;

    /// Permanently remove objects.
    async fn remove(&self, project: &str, ids: &[ObjectId]) -> Result<()>;

    /// Resolve a project-relative path to an object ID.
    async fn resolve_path(&self, project: &str, path: &str) -> Result<ObjectId>;

    /// Resolve a published app by name.
    async fn resolve_app(&self, name: &str) -> Result<ObjectId>;
}

/// Maximum attempts for one platform call.
const MAX_ATTEMPTS: u32 = 3;

/// Base delay between retry attempts.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Run a platform operation, retrying transient failures with bounded
/// exponential backoff.
pub async fn with_retries<T, F, Fut>(operation: &str, mut call: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < MAX_ATTEMPTS => {
                let delay = RETRY_BASE_DELAY * 2u32.pow(attempt - 1);
                warn!(
                    operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient platform error, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

// ============================================================================
// Mock Platform
// ============================================================================

/// One object held by the mock platform.
#[derive(Debug, Clone)]
pub struct MockObject {
    /// The object's descriptor.
    pub descriptor: ObjectDescriptor,
    /// The request it was created from.
    pub request: JsonValue,
    /// Whether the object has been closed.
    pub closed: bool,
    /// Whether the object has been archived.
    pub archived: bool,
}

/// Counters for the calls a test cares about.
#[derive(Debug, Default)]
pub struct MockCounters {
    /// `applet_new` calls.
    pub applet_new: AtomicUsize,
    /// `workflow_new` calls.
    pub workflow_new: AtomicUsize,
    /// `close` calls.
    pub close: AtomicUsize,
    /// `archive` calls.
    pub archive: AtomicUsize,
    /// `remove` calls.
    pub remove: AtomicUsize,
}

/// An in-memory platform for tests.
pub struct MockPlatform {
    objects: Arc<Mutex<HashMap<ObjectId, MockObject>>>,
    next_id: AtomicUsize,
    /// Call counters.
    pub counters: MockCounters,
    /// When set, every mutating call fails with a transient error.
    pub fail_transiently: std::sync::atomic::AtomicBool,
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPlatform {
    /// Create an empty mock platform.
    pub fn new() -> Self {
        Self {
            objects: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicUsize::new(1),
            counters: MockCounters::default(),
            fail_transiently: std::sync::atomic::AtomicBool::new(false),
        }
    }

    fn fresh_id(&self, prefix: &str) -> ObjectId {
        // Stable, readable IDs; a uuid suffix keeps them unique across
        // mock instances the way real platform IDs are.
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        format!("{}-{:04}{}", prefix, n, &uuid::Uuid::new_v4().simple().to_string()[..8])
    }

    fn transient_failure(&self) -> Option<PlatformError> {
        if self.fail_transiently.load(Ordering::SeqCst) {
            Some(PlatformError::Api {
                code: "InternalError".to_string(),
                message: "mock transient failure".to_string(),
                retryable: true,
            })
        } else {
            None
        }
    }

    async fn create(
        &self,
        prefix: &str,
        class: ObjectClass,
        project: &str,
        request: &JsonValue,
    ) -> Result<ObjectId> {
        let _ = project;
        if let Some(err) = self.transient_failure() {
            return Err(err);
        }
        let id = self.fresh_id(prefix);
        let name = request
            .get("name")
            .and_then(JsonValue::as_str)
            .unwrap_or("unnamed")
            .to_string();
        let folder = request
            .get("folder")
            .and_then(JsonValue::as_str)
            .unwrap_or("/")
            .to_string();
        let properties = request
            .get("properties")
            .and_then(JsonValue::as_object)
            .map(|obj| {
                obj.iter()
                    .filter_map(|(key, value)| {
                        value.as_str().map(|v| (key.clone(), v.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default();
        let object = MockObject {
            descriptor: ObjectDescriptor {
                id: id.clone(),
                name,
                class,
                folder,
                created: Utc::now(),
                properties,
            },
            request: request.clone(),
            closed: false,
            archived: false,
        };
        self.objects.lock().await.insert(id.clone(), object);
        Ok(id)
    }

    /// Seed an object directly, for tests that prepare platform state.
    pub async fn seed(&self, descriptor: ObjectDescriptor) {
        self.objects.lock().await.insert(
            descriptor.id.clone(),
            MockObject {
                descriptor,
                request: JsonValue::Null,
                closed: true,
                archived: false,
            },
        );
    }

    /// Look at an object's mock state.
    pub async fn object(&self, id: &str) -> Option<MockObject> {
        self.objects.lock().await.get(id).cloned()
    }

    /// Number of live (non-archived) objects.
    pub async fn live_count(&self) -> usize {
        self.objects
            .lock()
            .await
            .values()
            .filter(|object| !object.archived)
            .count()
    }
}

#[async_trait]
impl PlatformApi for MockPlatform {
    async fn applet_new(&self, project: &str, request: &JsonValue) -> Result<ObjectId> {
        self.counters.applet_new.fetch_add(1, Ordering::SeqCst);
        self.create("applet", ObjectClass::Applet, project, request).await
    }

    async fn workflow_new(&self, project: &str, request: &JsonValue) -> Result<ObjectId> {
        self.counters.workflow_new.fetch_add(1, Ordering::SeqCst);
        self.create("workflow", ObjectClass::Workflow, project, request)
            .await
    }

    async fn close(&self, id: &ObjectId) -> Result<()> {
        self.counters.close.fetch_add(1, Ordering::SeqCst);
        let mut objects = self.objects.lock().await;
        match objects.get_mut(id) {
            Some(object) => {
                object.closed = true;
                Ok(())
            }
            None => Err(PlatformError::NotFound(id.clone())),
        }
    }

    async fn describe(&self, id: &ObjectId) -> Result<ObjectDescriptor> {
        self.objects
            .lock()
            .await
            .get(id)
            .map(|object| object.descriptor.clone())
            .ok_or_else(|| PlatformError::NotFound(id.clone()))
    }

    async fn find_objects_by_property(
        &self,
        project: &str,
        folder: Option<&str>,
        property: &str,
    ) -> Result<Vec<ObjectDescriptor>> {
        let _ = project;
        Ok(self
            .objects
            .lock()
            .await
            .values()
            .filter(|object| !object.archived)
            .filter(|object| object.descriptor.properties.contains_key(property))
            .filter(|object| match folder {
                Some(folder) => object.descriptor.folder == folder,
                None => true,
            })
            .map(|object| object.descriptor.clone())
            .collect())
    }

    async fn archive(&self, project: &str, ids: &[ObjectId]) -> Result<()> {
        let _ = project;
        self.counters.archive.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.transient_failure() {
            return Err(err);
        }
        let mut objects = self.objects.lock().await;
        for id in ids {
            if let Some(object) = objects.get_mut(id) {
                object.archived = true;
            }
        }
        Ok(())
    }

    async fn remove(&self, project: &str, ids: &[ObjectId]) -> Result<()> {
        let _ = project;
        self.counters.remove.fetch_add(1, Ordering::SeqCst);
        let mut objects = self.objects.lock().await;
        for id in ids {
            objects.remove(id);
        }
        Ok(())
    }

    async fn resolve_path(&self, project: &str, path: &str) -> Result<ObjectId> {
        let _ = project;
        let objects = self.objects.lock().await;
        objects
            .values()
            .find(|object| {
                format!(
                    "{}/{}",
                    object.descriptor.folder.trim_end_matches('/'),
                    object.descriptor.name
                ) == path
            })
            .map(|object| object.descriptor.id.clone())
            .ok_or_else(|| PlatformError::NotFound(path.to_string()))
    }

    async fn resolve_app(&self, name: &str) -> Result<ObjectId> {
        let objects = self.objects.lock().await;
        objects
            .values()
            .find(|object| object.descriptor.name == name)
            .map(|object| object.descriptor.id.clone())
            .ok_or_else(|| PlatformError::NotFound(name.to_string()))
    }
}
