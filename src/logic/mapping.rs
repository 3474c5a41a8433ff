//! Command -> entity mapping driven by per-type field rule tables.
//!
//! Each destination type lists, once, how every tri-state command field lands
//! on it. Applying a command runs those rules in registration order:
//! unset fields are skipped, null clears the destination, values are written.

use crate::model::{parse_identifier, AppError, Entity, Optional};

/// Separator used when a list is stored in a single string field.
pub const LIST_SEPARATOR: &str = ";";

type ApplyFn<C, E> = Box<dyn Fn(&C, &mut E) -> Result<(), AppError> + Send + Sync>;

struct FieldRule<C, E> {
    field: &'static str,
    apply: ApplyFn<C, E>,
}

/// A type that can be produced or updated from command `C`.
pub trait FromCommand<C>: Default + Clone + Sized + 'static {
    fn field_rules() -> FieldRules<C, Self>;
}

/// Sub-commands that reference an existing child by id.
pub trait CommandId {
    /// Raw identifier from the payload; empty means "new child"
    fn command_id(&self) -> &str;
}

/// Ordered table of `(field, apply)` rules from command `C` onto `E`.
pub struct FieldRules<C, E> {
    rules: Vec<FieldRule<C, E>>,
}

impl<C: 'static, E: 'static> Default for FieldRules<C, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: 'static, E: 'static> FieldRules<C, E> {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.rules.iter().map(|rule| rule.field)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn push(
        mut self,
        field: &'static str,
        apply: impl Fn(&C, &mut E) -> Result<(), AppError> + Send + Sync + 'static,
    ) -> Self {
        self.rules.push(FieldRule {
            field,
            apply: Box::new(apply),
        });
        self
    }

    /// Scalar field; null writes `T::default()`.
    pub fn value<T>(
        self,
        field: &'static str,
        source: fn(&C) -> &Optional<T>,
        target: fn(&mut E) -> &mut T,
    ) -> Self
    where
        T: Clone + Default + 'static,
    {
        self.push(field, move |command, destination| {
            match source(command).as_set() {
                None => {}
                Some(None) => *target(destination) = T::default(),
                Some(Some(value)) => *target(destination) = value.clone(),
            }
            Ok(())
        })
    }

    /// Nullable field; null writes `None`.
    pub fn nullable<T>(
        self,
        field: &'static str,
        source: fn(&C) -> &Optional<T>,
        target: fn(&mut E) -> &mut Option<T>,
    ) -> Self
    where
        T: Clone + 'static,
    {
        self.push(field, move |command, destination| {
            if let Some(value) = source(command).as_set() {
                *target(destination) = value.cloned();
            }
            Ok(())
        })
    }

    /// Scalar list, replaced wholesale. Null empties it.
    pub fn list<T>(
        self,
        field: &'static str,
        source: fn(&C) -> &Optional<Vec<T>>,
        target: fn(&mut E) -> &mut Vec<T>,
    ) -> Self
    where
        T: Clone + 'static,
    {
        self.value(field, source, target)
    }

    /// List written into a string field, joined with [`LIST_SEPARATOR`].
    pub fn joined<T>(
        self,
        field: &'static str,
        source: fn(&C) -> &Optional<Vec<T>>,
        target: fn(&mut E) -> &mut String,
    ) -> Self
    where
        T: ToString + 'static,
    {
        self.push(field, move |command, destination| {
            match source(command).as_set() {
                None => {}
                Some(None) => target(destination).clear(),
                Some(Some(items)) => {
                    *target(destination) = items
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(LIST_SEPARATOR)
                }
            }
            Ok(())
        })
    }

    /// Nested single object, mapped with its own rules onto the existing value
    /// or onto a default one.
    pub fn nested<S, D>(
        self,
        field: &'static str,
        source: fn(&C) -> &Optional<S>,
        target: fn(&mut E) -> &mut Option<D>,
    ) -> Self
    where
        S: 'static,
        D: FromCommand<S>,
    {
        self.push(field, move |command, destination| {
            match source(command).as_set() {
                None => {}
                Some(None) => *target(destination) = None,
                Some(Some(nested)) => {
                    let slot = target(destination);
                    let mut current = slot.take().unwrap_or_default();
                    D::field_rules().apply_to(nested, &mut current)?;
                    *slot = Some(current);
                }
            }
            Ok(())
        })
    }

    /// Child entity list reconciled by id.
    ///
    /// A sub-command with an id updates the matching child, one without creates
    /// a new child. An id matching no child fails with `NotFound`. The result
    /// holds exactly the commanded children, in command order; a repeated id
    /// yields one copy of that child per sub-command.
    pub fn children<S, D>(
        self,
        field: &'static str,
        source: fn(&C) -> &Optional<Vec<S>>,
        target: fn(&mut E) -> &mut Vec<D>,
    ) -> Self
    where
        S: CommandId + 'static,
        D: FromCommand<S> + Entity,
    {
        self.push(field, move |command, destination| {
            let commands = match source(command).as_set() {
                None => return Ok(()),
                Some(None) => {
                    target(destination).clear();
                    return Ok(());
                }
                Some(Some(commands)) => commands,
            };

            // Lookups go against the untouched list so a repeated id resolves every time
            let existing = std::mem::take(target(destination));
            let mut mapped = Vec::with_capacity(commands.len());
            for child_command in commands {
                let mut child = match parse_identifier(child_command.command_id()) {
                    Some(id) => existing
                        .iter()
                        .find(|child| child.id() == id)
                        .cloned()
                        .ok_or_else(|| {
                            AppError::NotFound(format!(
                                "Failed to recover a {} of id {} from {} in destination entity {}",
                                D::ENTITY_TYPE,
                                id,
                                field,
                                short_type_name::<E>()
                            ))
                        })?,
                    None => D::default(),
                };
                D::field_rules().apply_to(child_command, &mut child)?;
                mapped.push(child);
            }
            *target(destination) = mapped;
            Ok(())
        })
    }

    /// Run every rule against `destination`. Stops at the first failing rule.
    pub fn apply_to(&self, command: &C, destination: &mut E) -> Result<(), AppError> {
        for rule in &self.rules {
            (rule.apply)(command, destination)?;
        }
        Ok(())
    }
}

/// Apply `command` to a copy of `destination`. On failure the caller's value is
/// left as it was.
pub fn apply_command<C, E>(command: &C, destination: &E) -> Result<E, AppError>
where
    C: 'static,
    E: FromCommand<C>,
{
    let mut updated = destination.clone();
    E::field_rules().apply_to(command, &mut updated)?;
    Ok(updated)
}

/// Build a fresh `E` from `command`.
pub fn map_command<C, E>(command: &C) -> Result<E, AppError>
where
    C: 'static,
    E: FromCommand<C>,
{
    apply_command(command, &E::default())
}

/// Last path segment of a type name, e.g. `User` for `crate::model::user::User`.
pub fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
