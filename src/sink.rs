//! External sinks: systems that receive a copy of every stored result.

use crate::error::SinkError;
use crate::types::QueryResult;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

/// Capability consumed by [`Storage`](crate::Storage) to replicate each new result.
///
/// Writes happen synchronously on the producer's thread, so implementations should return
/// quickly. A failed write is logged by the store and otherwise ignored.
pub trait ExternalSink: std::fmt::Debug + Send + Sync {
    /// Replicates one stored result.
    fn write(&self, query: &str, result: &QueryResult) -> Result<(), SinkError>;

    /// Called when labels are applied to a query.
    fn put_labels(&self, _query: &str, _labels: &[String]) {}

    /// Releases held resources (flush, disconnect). Called once, from `Storage::close`.
    fn close(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Sink keeping every write in memory, in arrival order.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<(String, QueryResult)>>,
    closed: AtomicBool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every `(query, result)` written so far.
    pub fn records(&self) -> Vec<(String, QueryResult)> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl ExternalSink for MemorySink {
    fn write(&self, query: &str, result: &QueryResult) -> Result<(), SinkError> {
        if self.is_closed() {
            return Err(SinkError::Closed);
        }
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((query.to_string(), result.clone()));
        Ok(())
    }

    fn close(&self) -> Result<(), SinkError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[cfg(feature = "prometheus")]
pub use prometheus::PrometheusSink;

#[cfg(feature = "prometheus")]
mod prometheus {
    use super::ExternalSink;
    use crate::error::{SinkError, StoreError};
    use crate::normalize::normalize;
    use crate::types::QueryResult;

    use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{PoisonError, RwLock};

    /// Exposes the latest numeric values of every query as Prometheus gauges.
    ///
    /// Each numeric value becomes `<namespace>_<label>{query="<query>"}`, with the label passed
    /// through [`normalize`]. Values without a label are named by their position. The sink keeps
    /// a private recorder, so it never conflicts with a globally installed one; scrape it with
    /// [`PrometheusSink::render`].
    pub struct PrometheusSink {
        namespace: String,
        recorder: PrometheusRecorder,
        handle: PrometheusHandle,
        labels: RwLock<HashMap<String, Vec<String>>>,
        closed: AtomicBool,
    }

    impl std::fmt::Debug for PrometheusSink {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("PrometheusSink")
                .field("namespace", &self.namespace)
                .field("closed", &self.closed)
                .finish()
        }
    }

    impl PrometheusSink {
        pub fn new(namespace: &str) -> Result<Self, StoreError> {
            let normalized = normalize(namespace);
            if normalized.is_empty() || normalized.starts_with(|c: char| c.is_ascii_digit()) {
                return Err(StoreError::SinkInit {
                    sink: "prometheus".to_string(),
                    reason: format!("invalid metric namespace {:?}", namespace),
                });
            }

            let recorder = PrometheusBuilder::new().build_recorder();
            let handle = recorder.handle();
            Ok(Self {
                namespace: normalized,
                recorder,
                handle,
                labels: RwLock::new(HashMap::new()),
                closed: AtomicBool::new(false),
            })
        }

        /// Renders the current gauges in the Prometheus text exposition format.
        pub fn render(&self) -> String {
            self.handle.render()
        }

        pub fn metric_name(&self, label: &str) -> String {
            match normalize(label) {
                l if l.is_empty() => self.namespace.clone(),
                l => format!("{}_{}", self.namespace, l),
            }
        }
    }

    impl ExternalSink for PrometheusSink {
        fn write(&self, query: &str, result: &QueryResult) -> Result<(), SinkError> {
            if self.closed.load(Ordering::Acquire) {
                return Err(SinkError::Closed);
            }

            let labels = self
                .labels
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(query)
                .cloned()
                .unwrap_or_default();

            metrics::with_local_recorder(&self.recorder, || {
                for (i, token) in result.values.iter().enumerate() {
                    let Some(value) = token.as_f64() else {
                        continue;
                    };
                    let label = labels.get(i).cloned().unwrap_or_else(|| i.to_string());
                    metrics::gauge!(self.metric_name(&label), "query" => query.to_string())
                        .set(value);
                }
            });
            Ok(())
        }

        fn put_labels(&self, query: &str, labels: &[String]) {
            self.labels
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(query.to_string(), labels.to_vec());
        }

        fn close(&self) -> Result<(), SinkError> {
            self.closed.store(true, Ordering::Release);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::tokenize;

    fn result(time: u64, raw: &str) -> QueryResult {
        QueryResult::new(time, raw, tokenize(raw))
    }

    #[test]
    fn test_memory_sink_records_in_order() {
        let sink = MemorySink::new();
        sink.write("a", &result(1, "1")).unwrap();
        sink.write("b", &result(2, "2")).unwrap();

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].0, "a");
        assert_eq!(records[1].1.value, "2");
    }

    #[test]
    fn test_memory_sink_rejects_after_close() {
        let sink = MemorySink::new();
        sink.close().unwrap();
        assert!(sink.is_closed());
        assert_eq!(sink.write("a", &result(1, "1")), Err(SinkError::Closed));
    }

    #[cfg(feature = "prometheus")]
    #[test]
    fn test_prometheus_sink_renders_labelled_gauges() {
        let sink = PrometheusSink::new("cryptarch").unwrap();
        sink.put_labels("load", &["one min".to_string(), "host".to_string()]);
        sink.write("load", &result(1, "0.5 web-1")).unwrap();

        let rendered = sink.render();
        assert!(rendered.contains("cryptarch_one_min{query=\"load\"} 0.5"), "{}", rendered);
        // Text values are not exported.
        assert!(!rendered.contains("cryptarch_host"), "{}", rendered);
    }

    #[cfg(feature = "prometheus")]
    #[test]
    fn test_prometheus_sink_unlabelled_values_use_positions() {
        let sink = PrometheusSink::new("app").unwrap();
        sink.write("q", &result(1, "7 8")).unwrap();
        sink.write("q", &result(2, "9 10")).unwrap();

        let rendered = sink.render();
        assert!(rendered.contains("app_0{query=\"q\"} 9"), "{}", rendered);
        assert!(rendered.contains("app_1{query=\"q\"} 10"), "{}", rendered);
    }

    #[cfg(feature = "prometheus")]
    #[test]
    fn test_prometheus_sink_invalid_namespace() {
        assert!(matches!(
            PrometheusSink::new("!!"),
            Err(crate::error::StoreError::SinkInit { .. })
        ));
        assert!(PrometheusSink::new("9lives").is_err());
    }

    #[cfg(feature = "prometheus")]
    #[test]
    fn test_prometheus_sink_closed() {
        let sink = PrometheusSink::new("app").unwrap();
        sink.close().unwrap();
        assert_eq!(sink.write("q", &result(1, "1")), Err(SinkError::Closed));
    }
}
