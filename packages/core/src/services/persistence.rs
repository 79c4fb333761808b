//! Persistence Collaborator
//!
//! The graph model mirrors server state and sends every structural change as
//! one call on a `PersistenceService`. The wire format is the implementor's
//! business; the model only deals in JSON payloads and the small response
//! types below.
//!
//! `InMemoryPersistence` records every call and can be told to reject the
//! next operation, which makes it usable both as an offline backend and as a
//! test double.

use crate::behaviors::EntityKind;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PersistenceError {
    /// The server refused the change
    #[error("Rejected by server: {reason}")]
    Rejected { reason: String },

    /// The request never completed
    #[error("Transport error: {0}")]
    Transport(String),

    /// Payload or response could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl PersistenceError {
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }
}

/// Result of a `create` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateResponse {
    /// Id assigned to the created entity
    pub id: String,

    /// Fields the server computed (aliases, edge ids, card ids ...)
    #[serde(default)]
    pub server_fields: Value,
}

/// Result of an `update` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResponse {
    #[serde(default)]
    pub updated_values: Value,
}

/// Result of a `delete` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub success: bool,
}

#[async_trait]
pub trait PersistenceService: Send + Sync {
    async fn create(&self, kind: EntityKind, payload: Value) -> Result<CreateResponse, PersistenceError>;

    async fn update(
        &self,
        kind: EntityKind,
        id: &str,
        payload: Value,
    ) -> Result<UpdateResponse, PersistenceError>;

    async fn delete(&self, kind: EntityKind, id: &str) -> Result<DeleteResponse, PersistenceError>;
}

/// One recorded call on `InMemoryPersistence`
#[derive(Debug, Clone, PartialEq)]
pub struct PersistenceCall {
    pub operation: &'static str,
    pub kind: EntityKind,
    pub id: Option<String>,
    pub payload: Value,
}

/// Persistence backend that keeps records in memory
///
/// `create` uses `payload.id` when it is a string and otherwise assigns a
/// UUID. `update` echoes the payload back under the entity kind's key, the
/// way the designer server reports `updated_values`.
#[derive(Debug, Default)]
pub struct InMemoryPersistence {
    records: Mutex<HashMap<(EntityKind, String), Value>>,
    calls: Mutex<Vec<PersistenceCall>>,
    reject_next: AtomicBool,
    fail_next: AtomicBool,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call answer with a server rejection
    ///
    /// `delete` reports `success: false`; `create` and `update` return
    /// `PersistenceError::Rejected`.
    pub fn reject_next(&self) {
        self.reject_next.store(true, Ordering::SeqCst);
    }

    /// Make the next call fail with a transport error
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<PersistenceCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn record(&self, kind: EntityKind, id: &str) -> Option<Value> {
        self.records
            .lock()
            .ok()
            .and_then(|records| records.get(&(kind, id.to_string())).cloned())
    }

    fn log(&self, operation: &'static str, kind: EntityKind, id: Option<&str>, payload: &Value) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(PersistenceCall {
                operation,
                kind,
                id: id.map(str::to_string),
                payload: payload.clone(),
            });
        }
    }

    fn check_failures(&self) -> Result<bool, PersistenceError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(PersistenceError::Transport("connection reset".to_string()));
        }
        Ok(self.reject_next.swap(false, Ordering::SeqCst))
    }

    fn store(&self, kind: EntityKind, id: &str, payload: Value) -> Result<(), PersistenceError> {
        let mut records = self
            .records
            .lock()
            .map_err(|e| PersistenceError::Transport(e.to_string()))?;
        records.insert((kind, id.to_string()), payload);
        Ok(())
    }
}

#[async_trait]
impl PersistenceService for InMemoryPersistence {
    async fn create(&self, kind: EntityKind, payload: Value) -> Result<CreateResponse, PersistenceError> {
        self.log("create", kind, None, &payload);
        if self.check_failures()? {
            return Err(PersistenceError::rejected(format!("create {} refused", kind)));
        }

        let id = payload
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        self.store(kind, &id, payload)?;

        Ok(CreateResponse {
            id,
            server_fields: json!({}),
        })
    }

    async fn update(
        &self,
        kind: EntityKind,
        id: &str,
        payload: Value,
    ) -> Result<UpdateResponse, PersistenceError> {
        self.log("update", kind, Some(id), &payload);
        if self.check_failures()? {
            return Err(PersistenceError::rejected(format!("update {} {} refused", kind, id)));
        }

        self.store(kind, id, payload.clone())?;
        let mut updated_values = serde_json::Map::new();
        updated_values.insert(kind.as_str().to_string(), payload);

        Ok(UpdateResponse {
            updated_values: Value::Object(updated_values),
        })
    }

    async fn delete(&self, kind: EntityKind, id: &str) -> Result<DeleteResponse, PersistenceError> {
        self.log("delete", kind, Some(id), &Value::Null);
        if self.check_failures()? {
            return Ok(DeleteResponse { success: false });
        }

        let mut records = self
            .records
            .lock()
            .map_err(|e| PersistenceError::Transport(e.to_string()))?;
        records.remove(&(kind, id.to_string()));
        Ok(DeleteResponse { success: true })
    }
}
