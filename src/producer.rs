//! Producer side: run a query repeatedly and store each output.

use crate::control::ProducerControl;
use crate::core::Storage;
use crate::error::StoreError;
use crate::telemetry::store_metrics;
use crate::tokenizer::tokenize;
use crate::types::QueryResult;

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Default delay between executions.
pub const DEFAULT_DELAY: Duration = Duration::from_secs(3);

/// Something that executes a query and returns its raw text output.
///
/// Running processes or profilers lives outside this crate; hosts implement this trait for
/// their executor. Closures work too.
pub trait QuerySource: Send {
    fn execute(&mut self, query: &str) -> Result<String, StoreError>;
}

impl<F> QuerySource for F
where
    F: FnMut(&str) -> Result<String, StoreError> + Send,
{
    fn execute(&mut self, query: &str) -> Result<String, StoreError> {
        self(query)
    }
}

/// Source replaying a fixed list of outputs, one per execution.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    outputs: VecDeque<String>,
}

impl ScriptedSource {
    pub fn new<I, S>(outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            outputs: outputs.into_iter().map(Into::into).collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.outputs.len()
    }
}

impl QuerySource for ScriptedSource {
    fn execute(&mut self, query: &str) -> Result<String, StoreError> {
        self.outputs
            .pop_front()
            .ok_or_else(|| StoreError::Source(format!("no scripted output left for {}", query)))
    }
}

/// Trims and tokenizes raw output, then stores it under `query`.
pub fn add_result(storage: &Storage, query: &str, raw: &str, retain: bool) -> QueryResult {
    let raw = raw.trim();
    storage.put(query, raw, retain, tokenize(raw))
}

/// How many times a producer executes its query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempts {
    Count(usize),
    /// Until stopped.
    Continuous,
}

impl Default for Attempts {
    fn default() -> Self {
        Attempts::Count(1)
    }
}

/// Command-line style count: any negative number means continuous.
impl From<i64> for Attempts {
    fn from(n: i64) -> Self {
        match usize::try_from(n) {
            Ok(n) => Attempts::Count(n),
            Err(_) => Attempts::Continuous,
        }
    }
}

impl Attempts {
    fn allows(&self, executed: usize) -> bool {
        match self {
            Attempts::Count(n) => executed < *n,
            Attempts::Continuous => true,
        }
    }
}

/// Executes one query on a schedule and stores every output.
///
/// Failed executions are logged and counted, and do not end the run. The producer's pause and
/// stop state is its own; consumers of the same query never slow it down.
#[derive(Debug)]
pub struct Producer<S> {
    storage: Arc<Storage>,
    query: String,
    source: S,
    attempts: Attempts,
    delay: Duration,
    retain: bool,
    control: Arc<ProducerControl>,
}

impl<S: QuerySource> Producer<S> {
    pub fn new(storage: Arc<Storage>, query: &str, source: S) -> Self {
        Self {
            storage,
            query: query.to_string(),
            source,
            attempts: Attempts::default(),
            delay: DEFAULT_DELAY,
            retain: true,
            control: Arc::new(ProducerControl::new()),
        }
    }

    pub fn with_attempts(mut self, attempts: Attempts) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Whether outputs should be kept in full history (see [`Storage::put`]).
    pub fn with_retain(mut self, retain: bool) -> Self {
        self.retain = retain;
        self
    }

    pub fn with_control(mut self, control: Arc<ProducerControl>) -> Self {
        self.control = control;
        self
    }

    pub fn control(&self) -> Arc<ProducerControl> {
        Arc::clone(&self.control)
    }

    /// Runs until the attempts are used up or the producer is stopped. Returns the number of
    /// results stored.
    pub fn run(mut self) -> usize {
        let tick = self.storage.get_config().poll_interval;
        let mut executed = 0;
        let mut stored = 0;

        while self.attempts.allows(executed) && !self.control.is_interrupted() {
            if self.control.is_paused() {
                self.control.sleep(tick, tick);
                continue;
            }

            executed += 1;
            match self.source.execute(&self.query) {
                Ok(raw) => {
                    add_result(&self.storage, &self.query, &raw, self.retain);
                    stored += 1;
                }
                Err(e) => {
                    store_metrics::record_source_failure(&self.query);
                    tracing::warn!(query = %self.query, error = %e, "query execution failed");
                }
            }

            if self.attempts.allows(executed) && !self.control.sleep(self.delay, tick) {
                break;
            }
        }

        tracing::debug!(query = %self.query, executed, stored, "producer finished");
        stored
    }
}

impl<S: QuerySource + 'static> Producer<S> {
    /// Runs the producer on its own thread.
    pub fn spawn(self) -> JoinHandle<usize> {
        thread::spawn(move || self.run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Token;
    use std::time::Instant;

    #[test]
    fn test_add_result_trims_and_tokenizes() {
        let storage = Storage::default();
        let stored = add_result(&storage, "q", "  3 4.5 foo\n", true);
        assert_eq!(stored.value, "3 4.5 foo");
        assert_eq!(
            stored.values.as_slice(),
            &[Token::Integer(3), Token::Float(4.5), Token::from("foo")]
        );
    }

    #[test]
    fn test_attempts_from_count() {
        assert_eq!(Attempts::from(3), Attempts::Count(3));
        assert_eq!(Attempts::from(0), Attempts::Count(0));
        assert_eq!(Attempts::from(-1), Attempts::Continuous);
        assert_eq!(Attempts::default(), Attempts::Count(1));
    }

    #[test]
    fn test_scripted_source_exhausts() {
        let mut source = ScriptedSource::new(["a"]);
        assert_eq!(source.execute("q").unwrap(), "a");
        assert_eq!(source.remaining(), 0);
        assert!(matches!(source.execute("q"), Err(StoreError::Source(_))));
    }

    #[test]
    fn test_producer_runs_counted_attempts() {
        let storage = Arc::new(Storage::default());
        let stored = Producer::new(storage.clone(), "q", ScriptedSource::new(["1", "2", "3"]))
            .with_attempts(Attempts::Count(2))
            .with_delay(Duration::from_millis(1))
            .run();

        assert_eq!(stored, 2);
        assert_eq!(storage.len("q"), 2);
    }

    #[test]
    fn test_producer_survives_source_failures() {
        let storage = Arc::new(Storage::default());
        let mut calls = 0;
        let source = move |_: &str| {
            calls += 1;
            if calls % 2 == 0 {
                Err(StoreError::Source("exit status 1".to_string()))
            } else {
                Ok(calls.to_string())
            }
        };

        let stored = Producer::new(storage.clone(), "q", source)
            .with_attempts(Attempts::Count(4))
            .with_delay(Duration::from_millis(1))
            .run();

        assert_eq!(stored, 2);
        let mut reader = storage.new_reader_index("q");
        assert_eq!(storage.next_or_empty(&mut reader).value, "1");
        assert_eq!(storage.next_or_empty(&mut reader).value, "3");
    }

    #[test]
    fn test_continuous_producer_stops() {
        let storage = Arc::new(Storage::default());
        let producer = Producer::new(storage.clone(), "q", |_: &str| Ok("1".to_string()))
            .with_attempts(Attempts::Continuous)
            .with_delay(Duration::from_millis(5));
        let control = producer.control();
        let handle = producer.spawn();

        thread::sleep(Duration::from_millis(40));
        let start = Instant::now();
        control.interrupt();
        let stored = handle.join().unwrap();

        assert!(stored >= 1);
        assert_eq!(storage.len("q"), stored);
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
