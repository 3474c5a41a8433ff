use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::Id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventAction {
    Create,
    Update,
    Delete,
}

/// Pending notification about a mutated entity, dispatched after a successful commit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainEvent {
    pub action: EventAction,
    pub entity_id: Id,
    pub entity_type: String,
    /// Snapshot of the entity when the change was staged
    pub data: serde_json::Value,
    pub raised_at: DateTime<Utc>,
}

impl DomainEvent {
    pub fn new(
        action: EventAction,
        entity_type: &str,
        entity_id: Id,
        data: serde_json::Value,
    ) -> Self {
        Self {
            action,
            entity_id,
            entity_type: entity_type.to_string(),
            data,
            raised_at: Utc::now(),
        }
    }
}

/// Ordered accumulator of domain events for one unit of work.
#[derive(Debug, Default)]
pub struct DomainEvents {
    events: Vec<DomainEvent>,
}

impl DomainEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: DomainEvent) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DomainEvent> {
        self.events.iter()
    }

    pub fn for_entity(&self, entity_id: Id) -> impl Iterator<Item = &DomainEvent> {
        self.events.iter().filter(move |event| event.entity_id == entity_id)
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Remove and return every pending event, oldest first.
    pub fn take(&mut self) -> Vec<DomainEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::generate_id;
    use serde_json::json;

    #[test]
    fn test_events_keep_order_and_drain() {
        let first = generate_id();
        let second = generate_id();
        let mut events = DomainEvents::new();
        events.push(DomainEvent::new(EventAction::Create, "User", first, json!({})));
        events.push(DomainEvent::new(EventAction::Update, "User", second, json!({})));
        events.push(DomainEvent::new(EventAction::Delete, "User", first, json!({})));

        assert_eq!(events.for_entity(first).count(), 2);

        let drained = events.take();
        assert!(events.is_empty());
        let actions: Vec<EventAction> = drained.iter().map(|e| e.action).collect();
        assert_eq!(
            actions,
            vec![EventAction::Create, EventAction::Update, EventAction::Delete]
        );
    }
}
