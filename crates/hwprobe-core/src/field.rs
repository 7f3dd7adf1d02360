//! Per-field acquisition status.
//!
//! Internally every attribute is a [`Field`], an explicit tagged status. The
//! integer and string sentinels below exist only for the raw projection that
//! callers observing plain values depend on.

use serde::Serialize;

/// Raw value of a field that was never attempted.
pub const NOT_INITIALIZED: i64 = -3;
/// Raw value of a field whose privileged read is in flight.
pub const INITIALIZATION_STARTED: i64 = -2;
/// Raw value of a field that was attempted and failed.
pub const INVALID: i64 = -1;

/// String form of [`NOT_INITIALIZED`].
pub const NOT_INITIALIZED_STR: &str = "---3";
/// String form of [`INITIALIZATION_STARTED`].
pub const INITIALIZATION_STARTED_STR: &str = "---2";
/// String form of [`INVALID`].
pub const INVALID_STR: &str = "---1";

/// Placeholder shown for unset or invalid values.
pub const UNAVAILABLE: &str = "Unavailable";

/// Acquisition status of a single attribute.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Field<T> {
    /// Never attempted.
    #[default]
    Unset,
    /// Privileged read issued, awaiting completion.
    Pending,
    /// Read and parsed.
    Resolved(T),
    /// Attempted and failed (unreadable or unparseable).
    Invalid,
}

impl<T> Field<T> {
    /// Builds a field from an optional parse result.
    pub fn from_option(value: Option<T>) -> Self {
        match value {
            Some(value) => Field::Resolved(value),
            None => Field::Invalid,
        }
    }

    /// True while the field is unset or pending.
    pub fn is_initializing(&self) -> bool {
        matches!(self, Field::Unset | Field::Pending)
    }

    /// True unless the field is unset or invalid.
    ///
    /// A pending field counts as valid: it is on its way.
    pub fn is_valid(&self) -> bool {
        !matches!(self, Field::Unset | Field::Invalid)
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Field::Resolved(_))
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Field::Invalid)
    }

    /// Turns `Invalid` back into `Unset` so it can be retried.
    pub fn reset_invalid(&mut self) {
        if self.is_invalid() {
            *self = Field::Unset;
        }
    }

    /// Returns the resolved value, if any.
    pub fn value(&self) -> Option<&T> {
        match self {
            Field::Resolved(value) => Some(value),
            _ => None,
        }
    }

    /// Maps the resolved value, keeping the status otherwise.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Field<U> {
        match self {
            Field::Unset => Field::Unset,
            Field::Pending => Field::Pending,
            Field::Resolved(value) => Field::Resolved(f(value)),
            Field::Invalid => Field::Invalid,
        }
    }

    /// Like [`Field::map`], but a `None` result degrades to `Invalid`.
    pub fn and_then<U>(self, f: impl FnOnce(T) -> Option<U>) -> Field<U> {
        match self {
            Field::Unset => Field::Unset,
            Field::Pending => Field::Pending,
            Field::Resolved(value) => Field::from_option(f(value)),
            Field::Invalid => Field::Invalid,
        }
    }
}

impl Field<i64> {
    /// Projects to the integer sentinel encoding.
    pub fn raw(&self) -> i64 {
        match self {
            Field::Unset => NOT_INITIALIZED,
            Field::Pending => INITIALIZATION_STARTED,
            Field::Resolved(value) => *value,
            Field::Invalid => INVALID,
        }
    }

    /// Decodes the integer sentinel encoding.
    pub fn from_raw(raw: i64) -> Self {
        match raw {
            NOT_INITIALIZED => Field::Unset,
            INITIALIZATION_STARTED => Field::Pending,
            INVALID => Field::Invalid,
            value => Field::Resolved(value),
        }
    }
}

impl Field<String> {
    /// Projects to the string sentinel encoding.
    pub fn raw(&self) -> String {
        match self {
            Field::Unset => NOT_INITIALIZED_STR.to_string(),
            Field::Pending => INITIALIZATION_STARTED_STR.to_string(),
            Field::Resolved(value) => value.clone(),
            Field::Invalid => INVALID_STR.to_string(),
        }
    }

    /// Decodes the string sentinel encoding.
    pub fn from_raw(raw: &str) -> Self {
        match raw {
            NOT_INITIALIZED_STR => Field::Unset,
            INITIALIZATION_STARTED_STR => Field::Pending,
            INVALID_STR => Field::Invalid,
            value => Field::Resolved(value.to_string()),
        }
    }
}

impl<T: Clone> Field<Vec<T>> {
    /// Projects a list field; anything but a resolved list is empty.
    pub fn raw(&self) -> Vec<T> {
        self.value().cloned().unwrap_or_default()
    }
}

impl<T: std::fmt::Display> Field<T> {
    /// Renders the value, or "Unavailable" when unset or invalid.
    pub fn display_or_unavailable(&self) -> String {
        match self {
            Field::Resolved(value) => value.to_string(),
            Field::Pending => "pending".to_string(),
            Field::Unset | Field::Invalid => UNAVAILABLE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicates() {
        let unset: Field<i64> = Field::Unset;
        let pending: Field<i64> = Field::Pending;
        let resolved = Field::Resolved(0);
        let invalid: Field<i64> = Field::Invalid;

        assert!(unset.is_initializing());
        assert!(pending.is_initializing());
        assert!(!resolved.is_initializing());
        assert!(!invalid.is_initializing());

        assert!(!unset.is_valid());
        assert!(pending.is_valid());
        assert!(resolved.is_valid());
        assert!(!invalid.is_valid());
    }

    #[test]
    fn test_int_sentinels_are_bit_exact() {
        assert_eq!(Field::<i64>::Unset.raw(), -3);
        assert_eq!(Field::<i64>::Pending.raw(), -2);
        assert_eq!(Field::<i64>::Invalid.raw(), -1);
        assert_eq!(Field::Resolved(1_400_000).raw(), 1_400_000);
        assert_eq!(Field::<i64>::from_raw(-2), Field::<i64>::Pending);
        assert_eq!(Field::<i64>::from_raw(0), Field::Resolved(0));
    }

    #[test]
    fn test_string_sentinels_are_bit_exact() {
        assert_eq!(Field::<String>::Unset.raw(), "---3");
        assert_eq!(Field::<String>::Pending.raw(), "---2");
        assert_eq!(Field::<String>::Invalid.raw(), "---1");
        assert_eq!(
            Field::<String>::from_raw("schedutil"),
            Field::Resolved("schedutil".to_string())
        );
        assert_eq!(Field::<String>::from_raw("---1"), Field::Invalid);
    }

    #[test]
    fn test_list_projection_is_empty_unless_resolved() {
        assert!(Field::<Vec<i64>>::Invalid.raw().is_empty());
        assert!(Field::<Vec<i64>>::Unset.raw().is_empty());
        assert_eq!(Field::Resolved(vec![1, 2]).raw(), vec![1, 2]);
    }

    #[test]
    fn test_reset_invalid() {
        let mut field: Field<i64> = Field::Invalid;
        field.reset_invalid();
        assert_eq!(field, Field::Unset);

        let mut field = Field::Resolved(5);
        field.reset_invalid();
        assert_eq!(field, Field::Resolved(5));
    }

    #[test]
    fn test_and_then_degrades_to_invalid() {
        let field = Field::Resolved("12x".to_string());
        assert_eq!(field.and_then(|s| s.parse::<i64>().ok()), Field::Invalid);

        let pending: Field<String> = Field::Pending;
        assert_eq!(pending.and_then(|s| s.parse::<i64>().ok()), Field::Pending);
    }

    #[test]
    fn test_zero_is_not_unavailable() {
        assert_eq!(Field::Resolved(0).display_or_unavailable(), "0");
        assert_eq!(Field::<i64>::Invalid.display_or_unavailable(), UNAVAILABLE);
    }
}
