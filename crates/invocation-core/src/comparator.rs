//! Named comparison strategies and the policy that applies them
//!
//! A [`Comparator`] extracts an optional [`SortKey`] from a record. A
//! [`SortPolicy`] pairs it with a direction and with the placement of records
//! whose key is absent.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::record::{Record, SortKey};

type KeyFn<R> = dyn Fn(&R) -> Option<SortKey> + Send + Sync;

/// A named, pure key extractor
///
/// The extractor is consulted once per record per sort pass; callers cache
/// the result alongside the record rather than calling it inside the
/// comparison closure.
pub struct Comparator<R> {
    name: String,
    key: Arc<KeyFn<R>>,
}

impl<R> Comparator<R> {
    /// Create a comparator from a typed key extractor
    ///
    /// # Example
    ///
    /// ```
    /// use invocation_core::{Comparator, Project};
    ///
    /// let by_title = Comparator::new("title", |project: &Project| project.title.clone());
    /// assert_eq!(by_title.name(), "title");
    /// ```
    pub fn new<K, F>(name: impl Into<String>, key: F) -> Self
    where
        K: Into<SortKey>,
        F: Fn(&R) -> Option<K> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            key: Arc::new(move |record: &R| key(record).map(Into::into)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Extract the sort key of a record
    pub fn key(&self, record: &R) -> Option<SortKey> {
        (self.key)(record)
    }
}

impl<R: Record> Comparator<R> {
    /// Comparator reading one of the record's named sort keys
    pub fn field(name: &'static str) -> Self {
        Self {
            name: name.to_string(),
            key: Arc::new(move |record: &R| record.sort_key(name)),
        }
    }
}

impl<R> Clone for Comparator<R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            key: Arc::clone(&self.key),
        }
    }
}

impl<R> fmt::Debug for Comparator<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Comparator").field("name", &self.name).finish()
    }
}

/// The active sort policy of a projection
pub struct SortPolicy<R> {
    pub comparator: Comparator<R>,
    /// `true` places smaller keys first
    pub ascending: bool,
    /// `true` places records with an absent key before every present key
    pub empty_first: bool,
}

impl<R> Clone for SortPolicy<R> {
    fn clone(&self) -> Self {
        Self {
            comparator: self.comparator.clone(),
            ascending: self.ascending,
            empty_first: self.empty_first,
        }
    }
}

impl<R> fmt::Debug for SortPolicy<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SortPolicy")
            .field("comparator", &self.comparator.name)
            .field("ascending", &self.ascending)
            .field("empty_first", &self.empty_first)
            .finish()
    }
}

impl<R> SortPolicy<R> {
    pub fn new(comparator: Comparator<R>, ascending: bool, empty_first: bool) -> Self {
        Self {
            comparator,
            ascending,
            empty_first,
        }
    }

    /// Order two extracted keys under this policy
    ///
    /// Absent keys go to the end chosen by `empty_first` regardless of
    /// direction; two absent keys compare equal.
    pub fn compare_keys(&self, a: Option<&SortKey>, b: Option<&SortKey>) -> Ordering {
        match (a, b) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => {
                if self.empty_first {
                    Ordering::Less
                } else {
                    Ordering::Greater
                }
            }
            (Some(_), None) => {
                if self.empty_first {
                    Ordering::Greater
                } else {
                    Ordering::Less
                }
            }
            (Some(a), Some(b)) => {
                if self.ascending {
                    a.cmp(b)
                } else {
                    b.cmp(a)
                }
            }
        }
    }
}

impl<R: Record> SortPolicy<R> {
    /// Total order over records with their cached keys
    ///
    /// Equal keys fall back to the persisted sibling index, then identity,
    /// so a full sort and incremental maintenance agree on every position.
    pub fn compare(
        &self,
        a_key: Option<&SortKey>,
        a: &R,
        b_key: Option<&SortKey>,
        b: &R,
    ) -> Ordering {
        self.compare_keys(a_key, b_key)
            .then_with(|| a.sibling_index().cmp(&b.sibling_index()))
            .then_with(|| a.id().cmp(&b.id()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn policy(ascending: bool, empty_first: bool) -> SortPolicy<i64> {
        SortPolicy::new(Comparator::new("value", |v: &i64| Some(*v)), ascending, empty_first)
    }

    #[rstest]
    #[case(true, false, Some(3), None, Ordering::Less)]
    #[case(true, true, Some(3), None, Ordering::Greater)]
    #[case(false, false, Some(3), None, Ordering::Less)]
    #[case(false, true, None, Some(3), Ordering::Less)]
    #[case(true, false, Some(3), Some(5), Ordering::Less)]
    #[case(false, false, Some(3), Some(5), Ordering::Greater)]
    #[case(true, true, None, None, Ordering::Equal)]
    fn compare_keys_applies_direction_and_empty_placement(
        #[case] ascending: bool,
        #[case] empty_first: bool,
        #[case] a: Option<i64>,
        #[case] b: Option<i64>,
        #[case] expected: Ordering,
    ) {
        let a = a.map(SortKey::from);
        let b = b.map(SortKey::from);
        let ordering = policy(ascending, empty_first).compare_keys(a.as_ref(), b.as_ref());
        assert_eq!(ordering, expected);
    }

    #[test]
    fn comparator_debug_shows_name() {
        let comparator = Comparator::new("value", |v: &i64| Some(*v));
        assert_eq!(format!("{:?}", comparator), "Comparator { name: \"value\" }");
    }
}
