//! Generic repository over a [`PersistenceStore`] with a per-request unit of work.
//!
//! Reads return detached copies deserialized from the stored documents.
//! Writes are staged together with a domain event and become durable only on
//! [`Repository::commit`].

use std::cmp::Ordering;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use crate::logic::results::map_to_failure;
use crate::model::{
    AppError, AppResult, DomainEvent, DomainEvents, Entity, EventAction, Id, IncludePaths,
};
use crate::store::interceptor::{AuditInterceptor, SaveChangesInterceptor};
use crate::store::traits::{ChangeKind, PersistenceStore, StagedChange, StoredRecord};

type FilterFn<E> = Box<dyn Fn(&E) -> bool + Send + Sync>;
type OrderFn<E> = Box<dyn Fn(&E, &E) -> Ordering + Send + Sync>;

/// Filter, ordering and navigation includes for a query.
pub struct QueryOptions<E> {
    filter: Option<FilterFn<E>>,
    order_by: Option<OrderFn<E>>,
    include: Option<String>,
}

impl<E> Default for QueryOptions<E> {
    fn default() -> Self {
        Self {
            filter: None,
            order_by: None,
            include: None,
        }
    }
}

impl<E> QueryOptions<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self {
        self.filter = Some(Box::new(filter));
        self
    }

    pub fn order_by(mut self, order: impl Fn(&E, &E) -> Ordering + Send + Sync + 'static) -> Self {
        self.order_by = Some(Box::new(order));
        self
    }

    /// Comma-separated navigation paths, e.g. `"addresses"`. Without it every
    /// navigation is loaded.
    pub fn include(mut self, include: impl Into<String>) -> Self {
        self.include = Some(include.into());
        self
    }
}

fn include_paths<E: Entity>(include: Option<&str>) -> IncludePaths {
    match include.map(str::trim) {
        Some(spec) if !spec.is_empty() => IncludePaths::parse(spec),
        _ => IncludePaths::all_for::<E>(),
    }
}

fn hydrate<E: Entity>(record: StoredRecord, include: &IncludePaths) -> Result<E, AppError> {
    let mut entity: E = serde_json::from_value(record.data)?;
    if let Some(audit) = entity.audit_mut() {
        audit.restore(record.created_at, record.modified_at);
    }
    entity.retain_navigations(include);
    Ok(entity)
}

pub struct Repository<S> {
    store: Arc<S>,
    staged: Vec<StagedChange>,
    events: DomainEvents,
    interceptors: Vec<Box<dyn SaveChangesInterceptor>>,
}

impl<S: PersistenceStore> Repository<S> {
    /// Repository with the audit interceptor installed.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            staged: Vec::new(),
            events: DomainEvents::new(),
            interceptors: vec![Box::new(AuditInterceptor::new())],
        }
    }

    pub async fn query<E: Entity>(&self, options: QueryOptions<E>) -> Result<Vec<E>, AppError> {
        let include = include_paths::<E>(options.include.as_deref());
        let records = self.store.load_all(E::ENTITY_TYPE).await?;

        let mut entities = Vec::with_capacity(records.len());
        for record in records {
            let entity: E = hydrate(record, &include)?;
            if options.filter.as_ref().map_or(true, |filter| filter(&entity)) {
                entities.push(entity);
            }
        }
        if let Some(order) = &options.order_by {
            entities.sort_by(|a, b| order(a, b));
        }
        Ok(entities)
    }

    pub async fn find_by_id<E: Entity>(
        &self,
        id: Id,
        include: Option<&str>,
    ) -> Result<Option<E>, AppError> {
        let include = include_paths::<E>(include);
        match self.store.load(E::ENTITY_TYPE, id).await? {
            Some(record) => Ok(Some(hydrate(record, &include)?)),
            None => Ok(None),
        }
    }

    /// Inner join of `E` and `J` on `key(e) == join_key(j)`, projected with
    /// `selector`. Results follow the order of `E`, then of `J`.
    pub async fn query_with_join<E, J, K, R>(
        &self,
        filter: impl Fn(&E) -> bool,
        join_filter: impl Fn(&J) -> bool,
        key: impl Fn(&E) -> K,
        join_key: impl Fn(&J) -> K,
        selector: impl Fn(&E, &J) -> R,
    ) -> Result<Vec<R>, AppError>
    where
        E: Entity,
        J: Entity,
        K: Eq + Hash,
    {
        let outer: Vec<E> = self.query(QueryOptions::new()).await?;
        let inner: Vec<J> = self.query(QueryOptions::new()).await?;

        let mut by_key: HashMap<K, Vec<&J>> = HashMap::new();
        for joined in inner.iter().filter(|j| join_filter(*j)) {
            by_key.entry(join_key(joined)).or_default().push(joined);
        }

        let mut results = Vec::new();
        for entity in outer.iter().filter(|e| filter(*e)) {
            if let Some(matches) = by_key.get(&key(entity)) {
                for joined in matches {
                    results.push(selector(entity, joined));
                }
            }
        }
        Ok(results)
    }

    /// Stage a new entity. Missing ids, its own and its children's, are generated.
    pub fn add<E: Entity>(&mut self, entity: &mut E) -> Result<(), AppError> {
        entity.assign_identities();
        self.stage(ChangeKind::Added, entity)
    }

    /// Stage changes to an existing entity. New children get ids.
    pub fn update<E: Entity>(&mut self, entity: &mut E) -> Result<(), AppError> {
        Self::require_id(entity, "update")?;
        entity.assign_identities();
        self.stage(ChangeKind::Modified, entity)
    }

    pub fn delete<E: Entity>(&mut self, entity: &E) -> Result<(), AppError> {
        Self::require_id(entity, "delete")?;
        self.stage(ChangeKind::Deleted, entity)
    }

    fn require_id<E: Entity>(entity: &E, operation: &str) -> Result<(), AppError> {
        if entity.identity().is_assigned() {
            Ok(())
        } else {
            Err(AppError::ArgumentNull(format!(
                "Cannot {} a {} without an id",
                operation,
                E::ENTITY_TYPE
            )))
        }
    }

    fn stage<E: Entity>(&mut self, kind: ChangeKind, entity: &E) -> Result<(), AppError> {
        let id = entity.id();
        let data = serde_json::to_value(entity)?;
        let position = self
            .staged
            .iter()
            .position(|change| change.is_same_entity(E::ENTITY_TYPE, id));

        if let Some(position) = position {
            let previous = self.staged[position].kind;
            if previous == ChangeKind::Deleted {
                return Err(AppError::InvalidOperation(format!(
                    "{} {} is already staged for deletion",
                    E::ENTITY_TYPE,
                    id
                )));
            }
            match (previous, kind) {
                (ChangeKind::Added, ChangeKind::Added)
                | (ChangeKind::Modified, ChangeKind::Added) => {
                    return Err(AppError::InvalidOperation(format!(
                        "{} {} is already staged",
                        E::ENTITY_TYPE,
                        id
                    )));
                }
                // Never persisted: the add and the delete cancel out
                (ChangeKind::Added, ChangeKind::Deleted) => {
                    self.staged.remove(position);
                }
                (ChangeKind::Added, _) => self.staged[position].data = data.clone(),
                _ => {
                    self.staged[position].kind = kind;
                    self.staged[position].data = data.clone();
                }
            }
        } else {
            self.staged.push(
                StagedChange::new(kind, E::ENTITY_TYPE, id, data.clone())
                    .auditable(entity.audit().is_some()),
            );
        }

        let action = match kind {
            ChangeKind::Added => EventAction::Create,
            ChangeKind::Modified => EventAction::Update,
            ChangeKind::Deleted => EventAction::Delete,
        };
        self.events
            .push(DomainEvent::new(action, E::ENTITY_TYPE, id, data));
        Ok(())
    }

    /// Events raised by the staged changes, not yet released.
    pub fn pending_events(&self) -> &DomainEvents {
        &self.events
    }

    pub fn has_changes(&self) -> bool {
        !self.staged.is_empty()
    }

    /// Apply every staged change atomically. On success the pending events are
    /// drained and returned for dispatch; on failure the unit of work is
    /// discarded and the store error comes back as a typed failure.
    pub async fn commit(&mut self) -> AppResult<Vec<DomainEvent>> {
        let mut changes = std::mem::take(&mut self.staged);
        if changes.is_empty() {
            return Ok(self.events.take());
        }

        for interceptor in &self.interceptors {
            interceptor.saving_changes(&mut changes);
        }

        let count = changes.len();
        match self.store.apply(changes).await {
            Ok(()) => {
                log::debug!("Committed {} staged change(s)", count);
                Ok(self.events.take())
            }
            Err(error) => {
                self.events.clear();
                Err(map_to_failure(error))
            }
        }
    }
}
