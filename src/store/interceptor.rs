use chrono::{DateTime, Utc};

use crate::store::traits::{ChangeKind, StagedChange};

/// Hook run over the staged changes right before they are applied.
pub trait SaveChangesInterceptor: Send + Sync {
    fn saving_changes(&self, changes: &mut [StagedChange]);
}

/// Stamps audit timestamps: creation and modification time on added entities,
/// modification time on modified ones. Deletions are left alone.
pub struct AuditInterceptor {
    clock: fn() -> DateTime<Utc>,
}

impl AuditInterceptor {
    pub fn new() -> Self {
        Self { clock: Utc::now }
    }

    pub fn with_clock(clock: fn() -> DateTime<Utc>) -> Self {
        Self { clock }
    }
}

impl Default for AuditInterceptor {
    fn default() -> Self {
        Self::new()
    }
}

impl SaveChangesInterceptor for AuditInterceptor {
    fn saving_changes(&self, changes: &mut [StagedChange]) {
        let now = (self.clock)();
        for change in changes.iter_mut().filter(|change| change.auditable) {
            match change.kind {
                ChangeKind::Added => {
                    change.created_at = Some(now);
                    change.modified_at = Some(now);
                }
                ChangeKind::Modified => change.modified_at = Some(now),
                ChangeKind::Deleted => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::generate_id;
    use chrono::TimeZone;
    use serde_json::json;

    fn fixed_clock() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_stamps_by_change_kind() {
        let interceptor = AuditInterceptor::with_clock(fixed_clock);
        let mut changes = vec![
            StagedChange::new(ChangeKind::Added, "User", generate_id(), json!({})).auditable(true),
            StagedChange::new(ChangeKind::Modified, "User", generate_id(), json!({})).auditable(true),
            StagedChange::new(ChangeKind::Deleted, "User", generate_id(), json!({})).auditable(true),
            StagedChange::new(ChangeKind::Added, "Log", generate_id(), json!({})),
        ];

        interceptor.saving_changes(&mut changes);

        assert_eq!(changes[0].created_at, Some(fixed_clock()));
        assert_eq!(changes[0].modified_at, Some(fixed_clock()));
        assert_eq!(changes[1].created_at, None);
        assert_eq!(changes[1].modified_at, Some(fixed_clock()));
        assert_eq!(changes[2].created_at, None);
        assert_eq!(changes[2].modified_at, None);
        assert_eq!(changes[3].created_at, None);
    }
}
