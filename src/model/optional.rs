use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Command field that separates "absent from the request" from "explicitly null".
///
/// Use it on partial-update commands together with
/// `#[serde(default, skip_serializing_if = "Optional::is_unset")]`:
/// - field missing from the payload -> `Unset`
/// - field sent as `null` -> `Null`
/// - field sent with a value -> `Value`
///
/// Reading the value of an unset field yields `T::default()`, never an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Optional<T> {
    Unset,
    Null,
    Value(T),
}

impl<T> Default for Optional<T> {
    fn default() -> Self {
        Self::Unset
    }
}

impl<T> Optional<T> {
    pub fn new(value: T) -> Self {
        Self::Value(value)
    }

    pub fn null() -> Self {
        Self::Null
    }

    /// True when the field was present in the request, even as `null`.
    pub fn has_value(&self) -> bool {
        !matches!(self, Self::Unset)
    }

    pub fn has_no_value(&self) -> bool {
        !self.has_value()
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }

    pub fn is_not_null(&self) -> bool {
        matches!(self, Self::Value(_))
    }

    /// `None` when unset, `Some(None)` when explicitly null.
    pub fn as_set(&self) -> Option<Option<&T>> {
        match self {
            Self::Unset => None,
            Self::Null => Some(None),
            Self::Value(value) => Some(Some(value)),
        }
    }
}

impl<T: Default + Clone> Optional<T> {
    /// The value, or `T::default()` when unset or null.
    pub fn value(&self) -> T {
        match self {
            Self::Value(value) => value.clone(),
            Self::Unset | Self::Null => T::default(),
        }
    }

    /// Returns `(value, has_value)`.
    pub fn get(&self) -> (T, bool) {
        (self.value(), self.has_value())
    }
}

impl<T> From<T> for Optional<T> {
    fn from(value: T) -> Self {
        Self::Value(value)
    }
}

impl<T: Serialize> Serialize for Optional<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Value(value) => value.serialize(serializer),
            Self::Unset | Self::Null => serializer.serialize_none(),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Optional<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(value) => Self::Value(value),
            None => Self::Null,
        })
    }
}
