use std::collections::HashMap;

use parking_lot::RwLock;

use crate::model::{AppError, Id};
use crate::store::traits::{ChangeKind, PersistenceStore, StagedChange, StoredRecord, UNIQUE_KEYS};

type Tables = HashMap<String, Vec<StoredRecord>>;

/// In-process store with the same contract as [`crate::store::PostgresStore`].
///
/// A batch is applied to a copy of the tables under one write lock and only
/// swapped in when every change succeeded.
#[derive(Debug)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    unique_keys: Vec<(String, String)>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Store enforcing the application's unique keys.
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            unique_keys: UNIQUE_KEYS
                .iter()
                .map(|(entity_type, field)| (entity_type.to_string(), field.to_string()))
                .collect(),
        }
    }

    pub fn len(&self, entity_type: &str) -> usize {
        self.tables
            .read()
            .get(entity_type)
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.read().values().all(Vec::is_empty)
    }

    fn check_unique(
        &self,
        table: &[StoredRecord],
        change: &StagedChange,
    ) -> Result<(), AppError> {
        for (_, field) in self
            .unique_keys
            .iter()
            .filter(|(entity_type, _)| entity_type == change.entity_type)
        {
            let Some(value) = change.data.get(field).filter(|v| !v.is_null()) else {
                continue;
            };
            let taken = table
                .iter()
                .any(|record| record.id != change.id && record.data.get(field) == Some(value));
            if taken {
                return Err(AppError::ObjectAlreadyExists(format!(
                    "{} with {} {} already exists",
                    change.entity_type, field, value
                )));
            }
        }
        Ok(())
    }

    fn apply_change(&self, tables: &mut Tables, change: StagedChange) -> Result<(), AppError> {
        let table = tables.entry(change.entity_type.to_string()).or_default();
        let position = table.iter().position(|record| record.id == change.id);

        match change.kind {
            ChangeKind::Added => {
                if position.is_some() {
                    return Err(AppError::ObjectAlreadyExists(format!(
                        "{} {} already exists",
                        change.entity_type, change.id
                    )));
                }
                self.check_unique(table, &change)?;
                table.push(StoredRecord {
                    id: change.id,
                    data: change.data,
                    created_at: change.created_at,
                    modified_at: change.modified_at,
                });
            }
            ChangeKind::Modified => {
                let Some(position) = position else {
                    return Err(AppError::not_found(change.entity_type, change.id));
                };
                self.check_unique(table, &change)?;
                let record = &mut table[position];
                record.data = change.data;
                if change.modified_at.is_some() {
                    record.modified_at = change.modified_at;
                }
            }
            ChangeKind::Deleted => {
                let Some(position) = position else {
                    return Err(AppError::not_found(change.entity_type, change.id));
                };
                table.remove(position);
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl PersistenceStore for MemoryStore {
    async fn load_all(&self, entity_type: &str) -> Result<Vec<StoredRecord>, AppError> {
        Ok(self
            .tables
            .read()
            .get(entity_type)
            .cloned()
            .unwrap_or_default())
    }

    async fn load(&self, entity_type: &str, id: Id) -> Result<Option<StoredRecord>, AppError> {
        Ok(self
            .tables
            .read()
            .get(entity_type)
            .and_then(|table| table.iter().find(|record| record.id == id).cloned()))
    }

    async fn apply(&self, changes: Vec<StagedChange>) -> Result<(), AppError> {
        let mut tables = self.tables.write();
        let mut working = tables.clone();
        for change in changes {
            self.apply_change(&mut working, change)?;
        }
        *tables = working;
        Ok(())
    }
}
