//! Consumer side of the read protocol: synchronize, replay history once, then tail.

use crate::control::ConsumerControl;
use crate::core::Storage;
use crate::reader::ReaderIndex;
use crate::types::QueryResult;
use std::sync::Arc;
use std::time::Duration;

/// Waits for the next result of `reader`, checking `control` every `poll_interval`.
///
/// Returns `None` if interrupted first. Pausing is not honoured here; this is the startup wait.
pub fn wait_for_result(
    storage: &Storage,
    reader: &mut ReaderIndex,
    poll_interval: Duration,
    control: &ConsumerControl,
) -> Option<QueryResult> {
    loop {
        if control.is_interrupted() {
            return None;
        }
        let result = storage.next_timeout(reader, poll_interval);
        if !result.is_empty() {
            return Some(result);
        }
    }
}

/// One consumer of one query, owning its own [`ReaderIndex`].
///
/// The startup protocol is: [`Consumer::synchronize`] to wait for the first result and step
/// back over it, [`Consumer::replay`] once to render everything before that point, then
/// [`Consumer::next_result`] in a loop. [`Consumer::run`] does all three.
#[derive(Debug)]
pub struct Consumer {
    storage: Arc<Storage>,
    reader: ReaderIndex,
    control: Arc<ConsumerControl>,
    poll_interval: Duration,
}

impl Consumer {
    pub fn new(storage: Arc<Storage>, query: &str, control: Arc<ConsumerControl>) -> Self {
        let reader = storage.new_reader_index(query);
        let poll_interval = storage.get_config().poll_interval;
        Self {
            storage,
            reader,
            control,
            poll_interval,
        }
    }

    pub fn query(&self) -> &str {
        self.reader.query()
    }

    pub fn reader(&self) -> &ReaderIndex {
        &self.reader
    }

    pub fn control(&self) -> &Arc<ConsumerControl> {
        &self.control
    }

    /// Waits until at least one result exists past the current position, then steps back so the
    /// tail will deliver it. Returns `false` if interrupted first.
    pub fn synchronize(&mut self) -> bool {
        match wait_for_result(&self.storage, &mut self.reader, self.poll_interval, &self.control) {
            Some(_) => {
                self.reader.dec();
                true
            }
            None => false,
        }
    }

    /// Retained results before the current position, oldest first.
    pub fn replay(&self) -> Vec<QueryResult> {
        self.storage.get_to_index(&self.reader)
    }

    /// Next result in the tail. Waits while paused; returns `None` once interrupted.
    pub fn next_result(&mut self) -> Option<QueryResult> {
        loop {
            if self.control.is_interrupted() {
                return None;
            }
            if self.control.is_paused() {
                self.control.sleep(self.poll_interval, self.poll_interval);
                continue;
            }
            let result = self.storage.next_timeout(&mut self.reader, self.poll_interval);
            if !result.is_empty() {
                return Some(result);
            }
        }
    }

    /// Runs the whole protocol, handing every result to `render` until interrupted. Returns the
    /// number of results delivered.
    pub fn run<F: FnMut(&QueryResult)>(&mut self, mut render: F) -> usize {
        if !self.synchronize() {
            return 0;
        }
        let replay = self.replay();
        replay.iter().for_each(&mut render);

        let mut delivered = replay.len();
        while let Some(result) = self.next_result() {
            render(&result);
            delivered += 1;
        }
        tracing::debug!(query = self.query(), delivered, "consumer stopped");
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::tokenize;
    use std::thread;

    fn put(storage: &Storage, query: &str, raw: &str) {
        storage.put(query, raw, true, tokenize(raw));
    }

    #[test]
    fn test_wait_for_result_interrupted() {
        let storage = Storage::default();
        let mut reader = storage.new_reader_index("q");
        let control = ConsumerControl::new();
        control.interrupt();
        assert!(wait_for_result(&storage, &mut reader, Duration::from_millis(5), &control).is_none());
    }

    #[test]
    fn test_synchronize_then_replay_then_tail() {
        let storage = Arc::new(Storage::default());
        put(&storage, "q", "1");
        put(&storage, "q", "2");

        let mut consumer = Consumer::new(storage.clone(), "q", Arc::new(ConsumerControl::new()));
        assert!(consumer.synchronize());
        assert_eq!(consumer.reader().position(), 0);
        assert!(consumer.replay().is_empty());

        assert_eq!(consumer.next_result().unwrap().value, "1");
        assert_eq!(consumer.next_result().unwrap().value, "2");
    }

    #[test]
    fn test_restart_replays_history() {
        let storage = Arc::new(Storage::default());
        for raw in ["1", "2", "3"] {
            put(&storage, "q", raw);
        }

        let mut consumer = Consumer::new(storage.clone(), "q", Arc::new(ConsumerControl::new()));
        consumer.synchronize();
        for _ in 0..3 {
            consumer.next_result();
        }

        // A restarted display synchronizes again and replays everything it has seen.
        put(&storage, "q", "4");
        assert!(consumer.synchronize());
        let replay: Vec<_> = consumer.replay().into_iter().map(|r| r.value).collect();
        assert_eq!(replay, vec!["1", "2", "3"]);
        assert_eq!(consumer.next_result().unwrap().value, "4");
    }

    #[test]
    fn test_run_stops_on_interrupt() {
        let storage = Arc::new(Storage::default());
        let control = Arc::new(ConsumerControl::new());
        put(&storage, "q", "1");

        let mut consumer = Consumer::new(storage.clone(), "q", control.clone());
        let handle = thread::spawn(move || {
            let mut seen = Vec::new();
            let delivered = consumer.run(|r| seen.push(r.value.clone()));
            (delivered, seen)
        });

        thread::sleep(Duration::from_millis(30));
        put(&storage, "q", "2");
        thread::sleep(Duration::from_millis(30));
        control.interrupt();

        let (delivered, seen) = handle.join().unwrap();
        assert_eq!(delivered, 2);
        assert_eq!(seen, vec!["1", "2"]);
    }
}
