use std::sync::Arc;

/// Structured, in-process event hook for observability.
///
/// The store never prints. Hosts provide an implementation that forwards these events to their
/// own logging or alerting; [`TracingEventListener`] (the default) forwards them to `tracing`.
pub trait StoreEventListener: std::fmt::Debug + Send + Sync + 'static {
    fn on_event(&self, event: StoreEvent);
}

/// Structured events emitted by the store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    SeriesCreated { query: String },
    LabelsChanged { query: String, labels: Vec<String> },
    LabelMismatch { query: String, labels: usize, values: usize },

    SinkWriteFailed { query: String, error: String },
    SinkCloseFailed { error: String },

    HistoryPruned { query: String, dropped: usize, first_index: usize },
}

#[derive(Debug)]
pub struct NoopEventListener;

impl StoreEventListener for NoopEventListener {
    #[inline]
    fn on_event(&self, _event: StoreEvent) {}
}

pub fn noop_event_listener() -> Arc<dyn StoreEventListener> {
    Arc::new(NoopEventListener)
}

/// Forwards store events to `tracing`.
#[derive(Debug, Default)]
pub struct TracingEventListener;

impl StoreEventListener for TracingEventListener {
    fn on_event(&self, event: StoreEvent) {
        match event {
            StoreEvent::SeriesCreated { query } => {
                tracing::debug!(%query, "series created");
            }
            StoreEvent::LabelsChanged { query, labels } => {
                tracing::debug!(%query, ?labels, "labels changed");
            }
            StoreEvent::LabelMismatch { query, labels, values } => {
                tracing::warn!(%query, labels, values, "result values do not match labels");
            }
            StoreEvent::SinkWriteFailed { query, error } => {
                tracing::warn!(%query, %error, "external sink write failed");
            }
            StoreEvent::SinkCloseFailed { error } => {
                tracing::warn!(%error, "external sink close failed");
            }
            StoreEvent::HistoryPruned { query, dropped, first_index } => {
                tracing::trace!(%query, dropped, first_index, "history pruned");
            }
        }
    }
}

pub fn tracing_event_listener() -> Arc<dyn StoreEventListener> {
    Arc::new(TracingEventListener)
}

/// Store metrics, recorded through the `metrics` facade.
///
/// Emitting is a no-op until the host installs a recorder.
pub mod store_metrics {
    use ::metrics::{describe_counter, describe_gauge, Unit};
    use std::sync::Once;

    // Counters are exposed as `<name>_total` by the Prometheus exporter.
    pub const RESULTS_PUT: &str = "cryptarch_results_put";
    pub const RESULTS_PRUNED: &str = "cryptarch_results_pruned";
    pub const SINK_WRITE_FAILURES: &str = "cryptarch_sink_write_failures";
    pub const SOURCE_FAILURES: &str = "cryptarch_source_failures";
    pub const SERIES: &str = "cryptarch_series";

    #[inline]
    pub fn record_put(query: &str) {
        ::metrics::counter!(RESULTS_PUT, "query" => query.to_string()).increment(1);
    }

    #[inline]
    pub fn record_pruned(query: &str, dropped: usize) {
        if dropped > 0 {
            ::metrics::counter!(RESULTS_PRUNED, "query" => query.to_string())
                .increment(dropped as u64);
        }
    }

    #[inline]
    pub fn record_sink_failure() {
        ::metrics::counter!(SINK_WRITE_FAILURES).increment(1);
    }

    #[inline]
    pub fn record_source_failure(query: &str) {
        ::metrics::counter!(SOURCE_FAILURES, "query" => query.to_string()).increment(1);
    }

    #[inline]
    pub fn record_series_count(count: usize) {
        ::metrics::gauge!(SERIES).set(count as f64);
    }

    /// Registers descriptions with whatever recorder is installed. Safe to call repeatedly.
    pub fn describe_all() {
        static DESCRIBED: Once = Once::new();
        DESCRIBED.call_once(|| {
            describe_counter!(
                RESULTS_PUT,
                Unit::Count,
                "Total number of results stored via Storage::put."
            );
            describe_counter!(
                RESULTS_PRUNED,
                Unit::Count,
                "Total number of results dropped by the history retention window."
            );
            describe_counter!(
                SINK_WRITE_FAILURES,
                Unit::Count,
                "Total number of failed external sink writes."
            );
            describe_counter!(
                SOURCE_FAILURES,
                Unit::Count,
                "Total number of failed query executions."
            );
            describe_gauge!(SERIES, Unit::Count, "Number of tracked queries.");
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct Collect(Mutex<Vec<StoreEvent>>);

    impl StoreEventListener for Collect {
        fn on_event(&self, event: StoreEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    #[test]
    fn test_listener_receives_events() {
        let listener = Collect::default();
        listener.on_event(StoreEvent::SeriesCreated {
            query: "q".to_string(),
        });
        let events = listener.0.lock().unwrap();
        assert_eq!(
            events.as_slice(),
            &[StoreEvent::SeriesCreated {
                query: "q".to_string()
            }]
        );
    }

    #[test]
    fn test_builtin_listeners_accept_all_events() {
        let events = vec![
            StoreEvent::SeriesCreated { query: "q".into() },
            StoreEvent::LabelsChanged { query: "q".into(), labels: vec!["a".into()] },
            StoreEvent::LabelMismatch { query: "q".into(), labels: 2, values: 1 },
            StoreEvent::SinkWriteFailed { query: "q".into(), error: "down".into() },
            StoreEvent::SinkCloseFailed { error: "down".into() },
            StoreEvent::HistoryPruned { query: "q".into(), dropped: 1, first_index: 1 },
        ];
        let noop = noop_event_listener();
        let tracing = tracing_event_listener();
        for event in events {
            noop.on_event(event.clone());
            tracing.on_event(event);
        }
        store_metrics::describe_all();
        store_metrics::describe_all();
    }
}
