use std::collections::BTreeSet;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::model::{AuditInfo, Id, Identity};

/// Navigation chains deeper than this are not followed during discovery.
pub const MAX_NAVIGATION_DEPTH: usize = 8;

/// A persisted domain entity.
///
/// Identity and audit data are embedded by composition; pending domain events
/// are accumulated by the repository's unit of work, not by the entity.
pub trait Entity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Stable name used as the storage partition and in messages
    const ENTITY_TYPE: &'static str;

    fn identity(&self) -> &Identity;

    fn identity_mut(&mut self) -> &mut Identity;

    fn id(&self) -> Id {
        self.identity().id
    }

    fn audit(&self) -> Option<&AuditInfo> {
        None
    }

    fn audit_mut(&mut self) -> Option<&mut AuditInfo> {
        None
    }

    /// Relations to other entities that can be eagerly loaded.
    fn navigations() -> Vec<Navigation> {
        Vec::new()
    }

    /// Drop the navigations that are not part of `include`.
    fn retain_navigations(&mut self, _include: &IncludePaths) {}

    /// Generate ids for this entity and any owned children that lack one.
    fn assign_identities(&mut self) {
        self.identity_mut().ensure_assigned();
    }
}

/// A named relation from one entity type to another.
#[derive(Clone, Copy)]
pub struct Navigation {
    pub name: &'static str,
    target: fn() -> Vec<Navigation>,
}

impl Navigation {
    pub fn to<E: Entity>(name: &'static str) -> Self {
        Self {
            name,
            target: E::navigations,
        }
    }

    pub fn target_navigations(&self) -> Vec<Navigation> {
        (self.target)()
    }
}

impl std::fmt::Debug for Navigation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Navigation").field("name", &self.name).finish()
    }
}

/// Every dot-separated navigation path reachable from `navigations`.
pub fn discover_paths(navigations: &[Navigation]) -> Vec<String> {
    let mut paths = Vec::new();
    collect_paths(navigations, None, 0, &mut paths);
    paths
}

fn collect_paths(
    navigations: &[Navigation],
    prefix: Option<&str>,
    depth: usize,
    paths: &mut Vec<String>,
) {
    if depth >= MAX_NAVIGATION_DEPTH {
        return;
    }
    for navigation in navigations {
        let path = match prefix {
            Some(prefix) => format!("{}.{}", prefix, navigation.name),
            None => navigation.name.to_string(),
        };
        paths.push(path.clone());
        collect_paths(&navigation.target_navigations(), Some(&path), depth + 1, paths);
    }
}

/// Set of navigation paths to eagerly load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncludePaths {
    paths: BTreeSet<String>,
}

impl IncludePaths {
    /// Parse a comma-separated list of dot paths. Including `a.b` also includes `a`.
    pub fn parse(spec: &str) -> Self {
        Self::from_paths(
            spec.split(',')
                .map(str::trim)
                .filter(|path| !path.is_empty())
                .map(str::to_string),
        )
    }

    /// Every navigation of `E`, discovered recursively.
    pub fn all_for<E: Entity>() -> Self {
        Self::from_paths(discover_paths(&E::navigations()))
    }

    fn from_paths(paths: impl IntoIterator<Item = String>) -> Self {
        let mut set = BTreeSet::new();
        for path in paths {
            let mut prefix = String::new();
            for segment in path.split('.') {
                if !prefix.is_empty() {
                    prefix.push('.');
                }
                prefix.push_str(segment);
                set.insert(prefix.clone());
            }
        }
        Self { paths: set }
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn includes(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    /// Paths below `name`, relative to it.
    pub fn nested(&self, name: &str) -> IncludePaths {
        let prefix = format!("{}.", name);
        Self {
            paths: self
                .paths
                .iter()
                .filter_map(|path| path.strip_prefix(&prefix).map(str::to_string))
                .collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }
}
