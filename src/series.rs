use crate::types::{QueryResult, Timestamp, Values};
use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in nanoseconds since epoch.
pub fn now() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

/// Append-only history of results for a single query, plus the labels naming its values.
///
/// Results are kept in append order, which is also chronological order: timestamps handed to
/// [`TimeSeries::put_at`] are clamped to the last stored time, so the sequence never goes
/// backwards even if the wall clock does.
///
/// Positions are absolute. When history is pruned the oldest results are dropped and
/// [`TimeSeries::first_index`] moves forward, but [`TimeSeries::len`] keeps counting every
/// result ever appended, so reader positions stay valid across pruning.
#[derive(Debug, Default, Clone)]
pub struct TimeSeries {
    /// Names for result values, corresponding by index.
    labels: Vec<String>,
    /// Retained results, oldest first.
    results: Vec<QueryResult>,
    /// Number of results dropped from the front by pruning.
    pruned: usize,
}

impl TimeSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a series whose labels are the value positions (`"0"`, `"1"`, ...), the implicit
    /// naming used when no explicit labels are supplied.
    pub fn with_index_labels(size: usize) -> Self {
        Self {
            labels: (0..size).map(|i| i.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Gets the first result stamped exactly at `time`, or the empty result.
    pub fn get(&self, time: Timestamp) -> QueryResult {
        self.results
            .iter()
            .find(|r| r.time == time)
            .cloned()
            .unwrap_or_default()
    }

    /// Gets results with `start <= time <= end`, in ascending order.
    ///
    /// Scanning stops at the first result past `end`, which is sound because times never
    /// decrease.
    pub fn get_range(&self, start: Timestamp, end: Timestamp) -> Vec<QueryResult> {
        self.results
            .iter()
            .skip_while(|r| r.time < start)
            .take_while(|r| r.time <= end)
            .cloned()
            .collect()
    }

    /// Appends a result stamped with the current time and returns the stored copy.
    pub fn put(&mut self, value: impl Into<String>, values: Values) -> QueryResult {
        self.put_at(now(), value, values)
    }

    /// Appends a result stamped with `time` (clamped to the last stored time).
    pub fn put_at(&mut self, time: Timestamp, value: impl Into<String>, values: Values) -> QueryResult {
        let time = self.results.last().map_or(time, |last| time.max(last.time));
        let next = QueryResult::new(time, value, values);
        self.results.push(next.clone());
        next
    }

    /// Overwrites the labels. Safe before or after any `put`.
    pub fn set_labels(&mut self, labels: Vec<String>) {
        self.labels = labels;
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Position of `label` among the labels.
    pub fn value_index(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    /// Total number of results ever appended, including pruned ones.
    pub fn len(&self) -> usize {
        self.pruned + self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Absolute position of the oldest retained result.
    pub fn first_index(&self) -> usize {
        self.pruned
    }

    /// Retained results, oldest first.
    pub fn results(&self) -> &[QueryResult] {
        &self.results
    }

    /// Result at an absolute position, if it is still retained.
    pub fn result_at(&self, position: usize) -> Option<&QueryResult> {
        position
            .checked_sub(self.pruned)
            .and_then(|i| self.results.get(i))
    }

    /// Retained results with absolute positions below `position`.
    pub fn results_to(&self, position: usize) -> &[QueryResult] {
        let end = position.saturating_sub(self.pruned).min(self.results.len());
        &self.results[..end]
    }

    /// Drops the oldest results so that at most `window` remain. Returns how many were dropped.
    pub fn prune_to(&mut self, window: usize) -> usize {
        let excess = self.results.len().saturating_sub(window);
        if excess > 0 {
            self.results.drain(..excess);
            self.pruned += excess;
        }
        excess
    }
}
