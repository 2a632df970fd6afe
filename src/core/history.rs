//! Log of committed transitions.
//!
//! `record` returns a new log with the entry added. The log keeps at most
//! `capacity` records; the oldest are dropped first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// Records kept by a log created with [`TransitionLog::new`].
pub const DEFAULT_LOG_CAPACITY: usize = 256;

fn default_capacity() -> usize {
    DEFAULT_LOG_CAPACITY
}

/// One committed transition.
///
/// # Example
///
/// ```rust
/// use waypost::core::TransitionRecord;
/// use chrono::Utc;
///
/// let record = TransitionRecord {
///     sequence: 0,
///     from: None,
///     to: "index".to_string(),
///     url: Some("/".to_string()),
///     timestamp: Utc::now(),
/// };
/// assert!(record.from.is_none());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// Sequence number of the transition that committed.
    pub sequence: u64,
    /// Target route before the transition, if any.
    pub from: Option<String>,
    pub to: String,
    /// URL reflected to the host, if any.
    pub url: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Ordered, bounded record of committed transitions.
///
/// # Example
///
/// ```rust
/// use waypost::core::{TransitionLog, TransitionRecord};
/// use chrono::Utc;
///
/// let log = TransitionLog::new()
///     .record(TransitionRecord {
///         sequence: 0,
///         from: None,
///         to: "index".into(),
///         url: Some("/".into()),
///         timestamp: Utc::now(),
///     })
///     .record(TransitionRecord {
///         sequence: 1,
///         from: Some("index".into()),
///         to: "post".into(),
///         url: Some("/posts/1".into()),
///         timestamp: Utc::now(),
///     });
///
/// assert_eq!(log.get_path(), ["index", "post"]);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionLog {
    records: VecDeque<TransitionRecord>,
    #[serde(default = "default_capacity")]
    capacity: usize,
}

impl Default for TransitionLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY)
    }
}

impl TransitionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A log that keeps the `capacity` most recent records (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Return a new log with `record` appended. `self` is unchanged.
    pub fn record(&self, record: TransitionRecord) -> Self {
        let mut next = self.clone();
        next.push(record);
        next
    }

    /// Append in place, dropping the oldest record when full.
    pub(crate) fn push(&mut self, record: TransitionRecord) {
        while self.records.len() >= self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// Routes visited: the first transition's origin (when there was one),
    /// then every target in order.
    pub fn get_path(&self) -> Vec<&str> {
        let mut path = Vec::new();
        if let Some(from) = self.records.front().and_then(|first| first.from.as_deref()) {
            path.push(from);
        }
        path.extend(self.records.iter().map(|record| record.to.as_str()));
        path
    }

    /// Time between the first and the last committed transition.
    pub fn duration(&self) -> Option<Duration> {
        let (first, last) = (self.records.front()?, self.records.back()?);
        last.timestamp
            .signed_duration_since(first.timestamp)
            .to_std()
            .ok()
    }

    /// Records from oldest to newest.
    pub fn records(&self) -> impl DoubleEndedIterator<Item = &TransitionRecord> + '_ {
        self.records.iter()
    }

    /// Record at `index`, counting from the oldest kept record.
    pub fn get(&self, index: usize) -> Option<&TransitionRecord> {
        self.records.get(index)
    }

    pub fn last(&self) -> Option<&TransitionRecord> {
        self.records.back()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
