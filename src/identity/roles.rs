//! Role records and the side datastore they live in.
//!
//! Roles are keyed by provider subject. A verified subject with no record gets a
//! minimal one provisioned on first sight (`RoleDirectory::resolve`); the store's
//! `insert_if_absent` is the atomic upsert that keeps concurrent first logins from
//! producing duplicates.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use super::claim::{IdentityClaim, DEFAULT_ROLE};
use super::provider::ProviderIdentity;

pub const STATUS_ACTIVE: &str = "active";
const PLACEHOLDER_NAME: &str = "New user";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoleRecord {
    pub subject: String,
    #[serde(default)]
    pub email: Option<String>,
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl RoleRecord {
    /// Minimal record for a subject seen for the first time.
    pub fn provisioned(identity: &ProviderIdentity, now: DateTime<Utc>) -> Self {
        let name = identity
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(PLACEHOLDER_NAME)
            .to_string();
        Self {
            subject: identity.subject.clone(),
            email: identity.email.clone(),
            name,
            role: Some(DEFAULT_ROLE.to_string()),
            status: STATUS_ACTIVE.to_string(),
            created_at: now,
        }
    }

    /// Stored role, or the default sentinel when absent or blank.
    pub fn effective_role(&self) -> &str {
        match self.role.as_deref().map(str::trim) {
            Some(r) if !r.is_empty() => r,
            _ => DEFAULT_ROLE,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("role store io: {0}")]
    Io(String),
    #[error("role store data: {0}")]
    Data(String),
}

#[async_trait]
pub trait RoleStore: Send + Sync {
    async fn get(&self, subject: &str) -> Result<Option<RoleRecord>, StoreError>;

    /// Insert `record` unless its subject already exists. Returns the stored record
    /// and whether this call created it.
    async fn insert_if_absent(&self, record: RoleRecord) -> Result<(RoleRecord, bool), StoreError>;

    /// Create or replace a record (administrative flows, seeding).
    async fn upsert(&self, record: RoleRecord) -> Result<(), StoreError>;
}

/// In-process role store with optional write-through JSON snapshot.
///
/// Mutations are serialised by `write_gate`, held across the snapshot write, so
/// snapshots land on disk in mutation order. The record map lock is never held
/// across an await.
#[derive(Debug, Default)]
pub struct MemoryRoleStore {
    records: RwLock<HashMap<String, RoleRecord>>,
    snapshot: Option<PathBuf>,
    write_gate: tokio::sync::Mutex<()>,
}

impl MemoryRoleStore {
    pub fn new() -> Self { Self::default() }

    /// Load records from `path` if it exists; later writes are persisted back to it.
    pub fn with_snapshot(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let mut records = HashMap::new();
        if path.exists() {
            let text = std::fs::read_to_string(&path).map_err(|e| StoreError::Io(e.to_string()))?;
            if !text.trim().is_empty() {
                let list: Vec<RoleRecord> = serde_json::from_str(&text).map_err(|e| StoreError::Data(e.to_string()))?;
                for r in list { records.insert(r.subject.clone(), r); }
            }
        }
        info!(target: "roles", "role store snapshot={} records={}", path.display(), records.len());
        Ok(Self { records: RwLock::new(records), snapshot: Some(path), write_gate: Default::default() })
    }

    pub fn len(&self) -> usize { self.records.read().len() }

    pub fn is_empty(&self) -> bool { self.records.read().is_empty() }

    /// Snapshot text for the current records, `None` when the store is memory only.
    fn render(&self, records: &HashMap<String, RoleRecord>) -> Result<Option<String>, StoreError> {
        if self.snapshot.is_none() { return Ok(None); }
        let mut list: Vec<&RoleRecord> = records.values().collect();
        list.sort_by(|a, b| a.subject.cmp(&b.subject));
        serde_json::to_string_pretty(&list).map(Some).map_err(|e| StoreError::Data(e.to_string()))
    }

    async fn persist(&self, text: Option<String>) -> Result<(), StoreError> {
        let (Some(path), Some(text)) = (self.snapshot.clone(), text) else { return Ok(()); };
        tokio::task::spawn_blocking(move || {
            if let Some(dir) = path.parent() {
                if !dir.as_os_str().is_empty() {
                    std::fs::create_dir_all(dir)?;
                }
            }
            std::fs::write(&path, text)
        })
        .await
        .map_err(|e| StoreError::Io(e.to_string()))?
        .map_err(|e| StoreError::Io(e.to_string()))
    }
}

#[async_trait]
impl RoleStore for MemoryRoleStore {
    async fn get(&self, subject: &str) -> Result<Option<RoleRecord>, StoreError> {
        Ok(self.records.read().get(subject).cloned())
    }

    async fn insert_if_absent(&self, record: RoleRecord) -> Result<(RoleRecord, bool), StoreError> {
        let _gate = self.write_gate.lock().await;
        let text = {
            let mut map = self.records.write();
            if let Some(existing) = map.get(&record.subject) {
                return Ok((existing.clone(), false));
            }
            map.insert(record.subject.clone(), record.clone());
            self.render(&map)
        };
        let written = match text { Ok(t) => self.persist(t).await, Err(e) => Err(e) };
        if let Err(e) = written {
            self.records.write().remove(&record.subject);
            return Err(e);
        }
        Ok((record, true))
    }

    async fn upsert(&self, record: RoleRecord) -> Result<(), StoreError> {
        let _gate = self.write_gate.lock().await;
        let (previous, text) = {
            let mut map = self.records.write();
            let previous = map.insert(record.subject.clone(), record.clone());
            (previous, self.render(&map))
        };
        let written = match text { Ok(t) => self.persist(t).await, Err(e) => Err(e) };
        if let Err(e) = written {
            let mut map = self.records.write();
            match previous {
                Some(p) => { map.insert(p.subject.clone(), p); }
                None => { map.remove(&record.subject); }
            }
            return Err(e);
        }
        Ok(())
    }
}

/// Turns a provider identity into an [`IdentityClaim`] by attaching the stored role,
/// provisioning a default record when the subject is unknown.
#[derive(Clone)]
pub struct RoleDirectory {
    store: Arc<dyn RoleStore>,
}

impl RoleDirectory {
    pub fn new(store: Arc<dyn RoleStore>) -> Self { Self { store } }

    pub async fn resolve(&self, identity: &ProviderIdentity) -> Result<IdentityClaim, StoreError> {
        let record = match self.store.get(&identity.subject).await? {
            Some(r) => r,
            None => {
                let (r, created) = self
                    .store
                    .insert_if_absent(RoleRecord::provisioned(identity, Utc::now()))
                    .await?;
                if created {
                    info!(target: "roles", "provisioned default role record for subject={}", identity.subject);
                    crate::tprintln!("roles.provision sub={} role={}", r.subject, r.effective_role());
                } else {
                    debug!(target: "roles", "record for subject={} appeared concurrently", identity.subject);
                }
                r
            }
        };
        Ok(IdentityClaim::new(
            identity.subject.clone(),
            identity.email.clone(),
            Some(record.effective_role()),
            identity.issued_at,
            identity.expires_at,
        ))
    }
}
