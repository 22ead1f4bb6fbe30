//! Core store logic: the per-query series registry, reader protocol, labels and sink fan-out.

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::reader::ReaderIndex;
use crate::series::TimeSeries;
use crate::sink::ExternalSink;
use crate::telemetry::{store_metrics, StoreEvent};
use crate::types::{QueryResult, Timestamp, Values};

#[cfg(feature = "prometheus")]
use crate::sink::PrometheusSink;

use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, Instant};

/// One query's series plus the condition readers park on while waiting for new results.
#[derive(Debug, Default)]
struct SeriesSlot {
    series: Mutex<TimeSeries>,
    appended: Condvar,
}

impl SeriesSlot {
    fn lock(&self) -> MutexGuard<'_, TimeSeries> {
        self.series.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The concurrent result store.
///
/// Producers append with [`Storage::put`]; any number of consumers read through their own
/// [`ReaderIndex`], replaying history once with [`Storage::get_to_index`] and then tailing with
/// [`Storage::next`] or [`Storage::next_or_empty`]. Share it between threads as `Arc<Storage>`.
///
/// Locking is per series: the registry lock is only held to look a series up (or create it), and
/// a blocked `next` waits on its series' condition variable, which releases the series lock
/// while parked. `put` never waits on readers.
#[derive(Debug)]
pub struct Storage {
    /// Series by query name, created lazily.
    series: RwLock<HashMap<String, Arc<SeriesSlot>>>,
    /// Registered external sinks, in registration order.
    sinks: RwLock<Vec<Arc<dyn ExternalSink>>>,
    #[cfg(feature = "prometheus")]
    prometheus: Option<Arc<PrometheusSink>>,
    closed: AtomicBool,
    config: StoreConfig,
}

impl Storage {
    /// Creates a store with default configuration and the given history policy.
    pub fn new(retain_history: bool) -> Self {
        let config = StoreConfig {
            retain_history,
            ..StoreConfig::default()
        };
        Self::build(config)
    }

    /// Creates a store from a full configuration.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or a configured sink cannot initialize.
    pub fn with_config(config: StoreConfig) -> Result<Self, StoreError> {
        config.validate()?;

        #[cfg(feature = "prometheus")]
        {
            let prometheus = match &config.prometheus_namespace {
                Some(ns) => Some(Arc::new(PrometheusSink::new(ns)?)),
                None => None,
            };
            let mut storage = Self::build(config);
            if let Some(sink) = &prometheus {
                storage.add_external_storage(sink.clone());
            }
            storage.prometheus = prometheus;
            Ok(storage)
        }

        #[cfg(not(feature = "prometheus"))]
        {
            if config.prometheus_namespace.is_some() {
                return Err(StoreError::SinkInit {
                    sink: "prometheus".to_string(),
                    reason: "built without the `prometheus` feature".to_string(),
                });
            }
            Ok(Self::build(config))
        }
    }

    fn build(config: StoreConfig) -> Self {
        store_metrics::describe_all();
        Storage {
            series: RwLock::new(HashMap::new()),
            sinks: RwLock::new(Vec::new()),
            #[cfg(feature = "prometheus")]
            prometheus: None,
            closed: AtomicBool::new(false),
            config,
        }
    }

    pub fn get_config(&self) -> &StoreConfig {
        &self.config
    }

    /// The Prometheus sink registered from configuration, if any.
    #[cfg(feature = "prometheus")]
    pub fn prometheus_sink(&self) -> Option<&Arc<PrometheusSink>> {
        self.prometheus.as_ref()
    }

    fn slot(&self, query: &str) -> Option<Arc<SeriesSlot>> {
        self.series
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(query)
            .cloned()
    }

    fn slot_or_create(&self, query: &str) -> Arc<SeriesSlot> {
        if let Some(slot) = self.slot(query) {
            return slot;
        }

        let mut series = self.series.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = series.get(query) {
            return slot.clone();
        }
        let slot = Arc::new(SeriesSlot::default());
        series.insert(query.to_string(), slot.clone());
        let count = series.len();
        drop(series);

        self.config.event_listener.on_event(StoreEvent::SeriesCreated {
            query: query.to_string(),
        });
        store_metrics::record_series_count(count);
        slot
    }

    /// Stores a new result for `query` and replicates it to every registered sink.
    ///
    /// The series is created if this is its first result. History is kept in full only when
    /// both the store and this call retain it; otherwise the series is pruned to the configured
    /// window after the append. Sink failures are logged and never fail the put.
    pub fn put(&self, query: &str, value: &str, retain: bool, values: Values) -> QueryResult {
        let slot = self.slot_or_create(query);
        let events = &self.config.event_listener;

        let (stored, mismatch, dropped, first_index) = {
            let mut series = slot.lock();
            let stored = series.put(value, values);

            let labels = series.labels().len();
            let mismatch = (labels > 0 && labels != stored.values.len())
                .then_some((labels, stored.values.len()));

            let dropped = if self.config.retain_history && retain {
                0
            } else {
                series.prune_to(self.config.history_window)
            };
            (stored, mismatch, dropped, series.first_index())
        };
        slot.appended.notify_all();

        tracing::trace!(query, time = stored.time, "result stored");
        store_metrics::record_put(query);
        if let Some((labels, values)) = mismatch {
            events.on_event(StoreEvent::LabelMismatch {
                query: query.to_string(),
                labels,
                values,
            });
        }
        if dropped > 0 {
            store_metrics::record_pruned(query, dropped);
            events.on_event(StoreEvent::HistoryPruned {
                query: query.to_string(),
                dropped,
                first_index,
            });
        }

        self.replicate(query, &stored);
        stored
    }

    /// Writes a stored result to every sink. Runs on the caller's thread and returns once every
    /// sink has finished.
    fn replicate(&self, query: &str, result: &QueryResult) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let sinks = self
            .sinks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let write = |sink: &Arc<dyn ExternalSink>| {
            if let Err(e) = sink.write(query, result) {
                store_metrics::record_sink_failure();
                self.config.event_listener.on_event(StoreEvent::SinkWriteFailed {
                    query: query.to_string(),
                    error: e.to_string(),
                });
            }
        };

        if sinks.len() > 1 {
            sinks.par_iter().for_each(write);
        } else {
            sinks.iter().for_each(write);
        }
    }

    /// Sets the labels for `query`, creating its series if needed.
    pub fn put_labels(&self, query: &str, labels: Vec<String>) {
        let slot = self.slot_or_create(query);
        slot.lock().set_labels(labels.clone());

        for sink in self.sinks.read().unwrap_or_else(PoisonError::into_inner).iter() {
            sink.put_labels(query, &labels);
        }
        self.config.event_listener.on_event(StoreEvent::LabelsChanged {
            query: query.to_string(),
            labels,
        });
    }

    /// Labels currently applied to `query` (empty for unknown queries).
    pub fn labels(&self, query: &str) -> Vec<String> {
        self.slot(query)
            .map(|slot| slot.lock().labels().to_vec())
            .unwrap_or_default()
    }

    /// Resolves a filter name to a position in the query's values.
    ///
    /// # Errors
    /// Returns [`StoreError::LabelNotFound`] if the query has no such label (or is unknown).
    pub fn get_value_index(&self, query: &str, label: &str) -> Result<usize, StoreError> {
        self.slot(query)
            .and_then(|slot| slot.lock().value_index(label))
            .ok_or_else(|| StoreError::LabelNotFound {
                query: query.to_string(),
                label: label.to_string(),
            })
    }

    /// Registers a sink for the remainder of the store's lifetime.
    ///
    /// Labels already applied to any query are handed to the sink first, so it exports the same
    /// names whether it was registered before or after `put_labels`.
    pub fn add_external_storage(&self, sink: Arc<dyn ExternalSink>) {
        // Held across the replay so a concurrent `put_labels` either is replayed here or sees
        // the new sink.
        let mut sinks = self.sinks.write().unwrap_or_else(PoisonError::into_inner);

        let series: Vec<(String, Arc<SeriesSlot>)> = self
            .series
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(query, slot)| (query.clone(), slot.clone()))
            .collect();
        for (query, slot) in series {
            let labels = slot.lock().labels().to_vec();
            if !labels.is_empty() {
                sink.put_labels(&query, &labels);
            }
        }

        sinks.push(sink);
    }

    /// Creates an independent cursor at the start of `query`'s history.
    pub fn new_reader_index(&self, query: &str) -> ReaderIndex {
        ReaderIndex::new(query)
    }

    /// Reads the result at the reader's position, moving readers that fell behind the retention
    /// window up to the oldest retained result first.
    fn read_at(series: &TimeSeries, reader: &mut ReaderIndex) -> Option<QueryResult> {
        let position = reader.position().max(series.first_index());
        let result = series.result_at(position)?.clone();
        reader.advance_to(position + 1);
        Some(result)
    }

    /// Returns the next result for the reader, blocking until one is stored.
    ///
    /// Waiting parks the calling thread on the series' condition variable without holding any
    /// lock; any `put` on the same query wakes it.
    pub fn next(&self, reader: &mut ReaderIndex) -> QueryResult {
        let slot = self.slot_or_create(reader.query());
        let mut series = slot.lock();
        loop {
            if let Some(result) = Self::read_at(&series, reader) {
                return result;
            }
            series = slot
                .appended
                .wait(series)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like [`Storage::next`], but gives up after `timeout` and returns the empty result.
    ///
    /// A timeout too large to represent as a deadline waits like [`Storage::next`].
    pub fn next_timeout(&self, reader: &mut ReaderIndex, timeout: Duration) -> QueryResult {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return self.next(reader);
        };
        let slot = self.slot_or_create(reader.query());
        let mut series = slot.lock();
        loop {
            if let Some(result) = Self::read_at(&series, reader) {
                return result;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return QueryResult::default();
            }
            series = slot
                .appended
                .wait_timeout(series, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Returns the next result for the reader, or the empty result if nothing new is stored.
    pub fn next_or_empty(&self, reader: &mut ReaderIndex) -> QueryResult {
        self.slot(reader.query())
            .and_then(|slot| Self::read_at(&slot.lock(), reader))
            .unwrap_or_default()
    }

    /// Returns every retained result before the reader's position, oldest first: the replay
    /// snapshot a consumer draws once at startup.
    pub fn get_to_index(&self, reader: &ReaderIndex) -> Vec<QueryResult> {
        self.slot(reader.query())
            .map(|slot| slot.lock().results_to(reader.position()).to_vec())
            .unwrap_or_default()
    }

    /// Result of `query` stamped exactly at `time`, or the empty result.
    pub fn get(&self, query: &str, time: Timestamp) -> QueryResult {
        self.slot(query)
            .map(|slot| slot.lock().get(time))
            .unwrap_or_default()
    }

    /// Results of `query` with `start <= time <= end`, ascending.
    pub fn get_range(&self, query: &str, start: Timestamp, end: Timestamp) -> Vec<QueryResult> {
        self.slot(query)
            .map(|slot| slot.lock().get_range(start, end))
            .unwrap_or_default()
    }

    /// Total number of results ever stored for `query`.
    pub fn len(&self, query: &str) -> usize {
        self.slot(query).map(|slot| slot.lock().len()).unwrap_or(0)
    }

    /// Names of all tracked queries, sorted.
    ///
    /// A query is tracked from its first `put` or `put_labels`, or from the moment a reader
    /// blocks in [`Storage::next`] or [`Storage::next_timeout`] waiting for it, so a reader
    /// waiting on a query that is never produced still shows up here.
    pub fn queries(&self) -> Vec<String> {
        let mut queries: Vec<String> = self
            .series
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        queries.sort();
        queries
    }

    /// Closes every registered sink. Later calls do nothing.
    ///
    /// Results stored after closing are kept but no longer replicated.
    ///
    /// # Errors
    /// Every sink is closed even if some fail; the first failure is returned.
    pub fn close(&self) -> Result<(), StoreError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let mut first_error = None;
        for sink in self.sinks.read().unwrap_or_else(PoisonError::into_inner).iter() {
            if let Err(e) = sink.close() {
                self.config.event_listener.on_event(StoreEvent::SinkCloseFailed {
                    error: e.to_string(),
                });
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Default store keeps full history.
impl Default for Storage {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Closes sinks if the owner never called `close`.
impl Drop for Storage {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
