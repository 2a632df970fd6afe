//! Route params, query params, and query-param change detection.
//!
//! Query values are coerced to strings when they are constructed, so a
//! number and its string form compare equal and never produce a spurious
//! change.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Dynamic-segment values for a single route, keyed by segment name.
pub type Params = BTreeMap<String, String>;

/// Query-string values keyed by parameter name.
pub type QueryParams = BTreeMap<String, QueryValue>;

/// A query-string value: a single string or a list of strings.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    Single(String),
    List(Vec<String>),
}

impl QueryValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Single(value) => Some(value),
            Self::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::Single(_) => None,
            Self::List(values) => Some(values),
        }
    }
}

impl fmt::Display for QueryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(value) => f.write_str(value),
            Self::List(values) => f.write_str(&values.join(",")),
        }
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        Self::Single(value.to_owned())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        Self::Single(value)
    }
}

impl From<&String> for QueryValue {
    fn from(value: &String) -> Self {
        Self::Single(value.clone())
    }
}

impl From<bool> for QueryValue {
    fn from(value: bool) -> Self {
        Self::Single(value.to_string())
    }
}

macro_rules! query_value_from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for QueryValue {
                fn from(value: $ty) -> Self {
                    Self::Single(value.to_string())
                }
            }
        )*
    };
}

query_value_from_number!(i32, i64, u32, u64, usize, f64);

impl<T: ToString> From<Vec<T>> for QueryValue {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.iter().map(ToString::to_string).collect())
    }
}

impl<T: ToString, const N: usize> From<[T; N]> for QueryValue {
    fn from(values: [T; N]) -> Self {
        Self::List(values.iter().map(ToString::to_string).collect())
    }
}

/// Difference between two query-param maps.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Changelist {
    /// Every param of the new map.
    pub all: QueryParams,
    /// Params added or whose value changed.
    pub changed: QueryParams,
    /// Params present before and now gone, with their old values.
    pub removed: QueryParams,
}

/// Compare two query-param maps.
///
/// Returns `None` when nothing changed so callers can test the result
/// cheaply. Lists compare by length and then element-wise.
///
/// # Example
///
/// ```rust
/// use waypost::core::get_changelist;
/// use waypost::query_params;
///
/// let old = query_params! { "a" => 1, "b" => [1, 2] };
/// assert!(get_changelist(&old, &old.clone()).is_none());
///
/// let changes = get_changelist(&query_params! { "a" => 1 }, &query_params! { "a" => "1" });
/// assert!(changes.is_none());
///
/// let changes = get_changelist(&query_params! { "a" => 1 }, &query_params! {}).unwrap();
/// assert_eq!(changes.removed, query_params! { "a" => 1 });
/// assert!(changes.changed.is_empty());
/// assert!(changes.all.is_empty());
/// ```
pub fn get_changelist(old: &QueryParams, new: &QueryParams) -> Option<Changelist> {
    let mut changes = Changelist {
        all: new.clone(),
        ..Changelist::default()
    };

    for (key, value) in old {
        if !new.contains_key(key) {
            changes.removed.insert(key.clone(), value.clone());
        }
    }

    for (key, value) in new {
        if old.get(key) != Some(value) {
            changes.changed.insert(key.clone(), value.clone());
        }
    }

    if changes.changed.is_empty() && changes.removed.is_empty() {
        None
    } else {
        Some(changes)
    }
}

/// Key-by-key comparison used when deciding whether a handler info
/// supersedes another. Only the keys of `ours` are inspected.
pub(crate) fn params_match(ours: Option<&Params>, theirs: Option<&Params>) -> bool {
    match (ours, theirs) {
        (None, None) => true,
        (Some(ours), Some(theirs)) => ours.iter().all(|(key, value)| theirs.get(key) == Some(value)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query_params;

    #[test]
    fn identical_maps_have_no_changelist() {
        let params = query_params! { "a" => 1, "b" => [1, 2] };
        assert_eq!(get_changelist(&params, &params.clone()), None);
    }

    #[test]
    fn numbers_and_strings_are_interchangeable() {
        let old = query_params! { "a" => 1 };
        let new = query_params! { "a" => "1" };
        assert_eq!(get_changelist(&old, &new), None);
    }

    #[test]
    fn removal_is_reported_with_old_value() {
        let changes = get_changelist(&query_params! { "a" => 1 }, &QueryParams::new()).unwrap();
        assert_eq!(changes.removed, query_params! { "a" => "1" });
        assert!(changes.changed.is_empty());
        assert!(changes.all.is_empty());
    }

    #[test]
    fn list_length_change_is_a_change() {
        let old = query_params! { "tags" => ["a", "b"] };
        let new = query_params! { "tags" => ["a"] };
        let changes = get_changelist(&old, &new).unwrap();
        assert_eq!(changes.changed, new);
    }

    #[test]
    fn list_element_change_is_a_change() {
        let old = query_params! { "tags" => ["a", "b"] };
        let new = query_params! { "tags" => ["a", "c"] };
        assert!(get_changelist(&old, &new).is_some());
    }

    #[test]
    fn single_to_list_is_a_change() {
        let old = query_params! { "tags" => "a" };
        let new = query_params! { "tags" => ["a"] };
        assert!(get_changelist(&old, &new).is_some());
    }

    #[test]
    fn added_key_appears_in_changed_and_all() {
        let changes =
            get_changelist(&QueryParams::new(), &query_params! { "sort" => "asc" }).unwrap();
        assert_eq!(changes.changed, query_params! { "sort" => "asc" });
        assert_eq!(changes.all, query_params! { "sort" => "asc" });
        assert!(changes.removed.is_empty());
    }

    #[test]
    fn params_match_only_checks_own_keys() {
        let ours = Params::from([("id".to_string(), "1".to_string())]);
        let theirs = Params::from([
            ("id".to_string(), "1".to_string()),
            ("extra".to_string(), "x".to_string()),
        ]);
        assert!(params_match(Some(&ours), Some(&theirs)));
        assert!(!params_match(Some(&theirs), Some(&ours)));
        assert!(!params_match(Some(&ours), None));
        assert!(params_match(None, None));
    }
}
