use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type Id = Uuid;

pub fn generate_id() -> Id {
    Uuid::new_v4()
}

/// Parse a command-supplied identifier. Empty, malformed and nil ids all mean
/// "no identifier" and yield `None`.
pub fn parse_identifier(raw: &str) -> Option<Id> {
    Uuid::parse_str(raw.trim()).ok().filter(|id| !id.is_nil())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub total: usize,
}

impl<T> ListResponse<T> {
    pub fn new(items: Vec<T>) -> Self {
        let total = items.len();
        Self { items, total }
    }
}

/// Identity embedded by every entity. A nil id means "not persisted yet";
/// the repository assigns a fresh one when the entity is staged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub id: Id,
}

impl Identity {
    pub fn new() -> Self {
        Self { id: generate_id() }
    }

    pub fn with_id(id: Id) -> Self {
        Self { id }
    }

    pub fn is_assigned(&self) -> bool {
        !self.id.is_nil()
    }

    /// Generate an id if none was assigned. Returns true when one was generated.
    pub fn ensure_assigned(&mut self) -> bool {
        if self.is_assigned() {
            return false;
        }
        self.id = generate_id();
        true
    }
}

/// Audit timestamps of an auditable entity.
///
/// Only the persistence layer writes these: application code can read them
/// but has no setter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuditInfo {
    created_at: Option<DateTime<Utc>>,
    last_modified_at: Option<DateTime<Utc>>,
}

impl AuditInfo {
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn last_modified_at(&self) -> Option<DateTime<Utc>> {
        self.last_modified_at
    }

    pub(crate) fn restore(
        &mut self,
        created_at: Option<DateTime<Utc>>,
        last_modified_at: Option<DateTime<Utc>>,
    ) {
        self.created_at = created_at;
        self.last_modified_at = last_modified_at;
    }
}
