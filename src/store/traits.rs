use chrono::{DateTime, Utc};

use crate::model::{AppError, Id};

/// A persisted entity document with its audit columns.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub id: Id,
    pub data: serde_json::Value,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

/// A change staged by a unit of work, waiting for commit.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedChange {
    pub kind: ChangeKind,
    pub entity_type: &'static str,
    pub id: Id,
    pub data: serde_json::Value,
    /// Whether the audit interceptor stamps this change
    pub auditable: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl StagedChange {
    pub fn new(kind: ChangeKind, entity_type: &'static str, id: Id, data: serde_json::Value) -> Self {
        Self {
            kind,
            entity_type,
            id,
            data,
            auditable: false,
            created_at: None,
            modified_at: None,
        }
    }

    pub fn auditable(mut self, auditable: bool) -> Self {
        self.auditable = auditable;
        self
    }

    pub fn is_same_entity(&self, entity_type: &str, id: Id) -> bool {
        self.entity_type == entity_type && self.id == id
    }
}

/// Durable storage of entity documents, partitioned by entity type.
#[async_trait::async_trait]
pub trait PersistenceStore: Send + Sync + 'static {
    /// Every record of `entity_type`, oldest first.
    async fn load_all(&self, entity_type: &str) -> Result<Vec<StoredRecord>, AppError>;

    async fn load(&self, entity_type: &str, id: Id) -> Result<Option<StoredRecord>, AppError>;

    /// Apply every change or none of them.
    async fn apply(&self, changes: Vec<StagedChange>) -> Result<(), AppError>;
}

/// Unique document fields enforced by the stores: `(entity type, field)`.
pub const UNIQUE_KEYS: &[(&str, &str)] = &[("User", "user_name")];
