/// A per-consumer cursor into one query's time series.
///
/// Every consumer creates its own index through
/// [`Storage::new_reader_index`](crate::Storage::new_reader_index) and advances it with
/// `next`, `next_or_empty` and `get_to_index`. Indexes are never shared, so consumers read the
/// same history at their own pace and the producer never touches cursor state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderIndex {
    query: String,
    position: usize,
}

impl ReaderIndex {
    pub(crate) fn new(query: &str) -> Self {
        Self {
            query: query.to_string(),
            position: 0,
        }
    }

    /// The query this index reads from.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Absolute position of the next result this index will read.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Steps back one result, floored at zero.
    ///
    /// Used after the startup synchronization read so that the first result seen is included in
    /// the following replay instead of being skipped.
    pub fn dec(&mut self) {
        self.position = self.position.saturating_sub(1);
    }

    pub(crate) fn advance_to(&mut self, position: usize) {
        self.position = position;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_index_starts_at_zero() {
        let reader = ReaderIndex::new("uptime");
        assert_eq!(reader.position(), 0);
        assert_eq!(reader.query(), "uptime");
    }

    #[test]
    fn test_dec_floors_at_zero() {
        let mut reader = ReaderIndex::new("q");
        reader.dec();
        assert_eq!(reader.position(), 0);

        reader.advance_to(2);
        reader.dec();
        assert_eq!(reader.position(), 1);
        reader.dec();
        reader.dec();
        assert_eq!(reader.position(), 0);
    }
}
