use crate::error::StoreError;
use crate::types::{QueryResult, Values};

/// Projects `source` onto `indexes`, in the order given.
///
/// Indexes may repeat or appear in any order. An empty index list yields an empty projection.
///
/// # Errors
/// Returns [`StoreError::IndexOutOfRange`] for the first index past the end of `source`.
pub fn filter_slice<T: Clone>(source: &[T], indexes: &[usize]) -> Result<Vec<T>, StoreError> {
    indexes
        .iter()
        .map(|&index| {
            source
                .get(index)
                .cloned()
                .ok_or(StoreError::IndexOutOfRange {
                    index,
                    len: source.len(),
                })
        })
        .collect()
}

/// Keeps only the values of `result` named by `filters`, in filter order.
///
/// `labels` are the query's labels; each filter is resolved to its position among them. Time
/// and raw text are carried over unchanged.
///
/// # Errors
/// Returns [`StoreError::LabelNotFound`] for a filter that is not a label, or
/// [`StoreError::IndexOutOfRange`] when the result has fewer values than the label points at.
pub fn filter_result(
    query: &str,
    result: &QueryResult,
    labels: &[String],
    filters: &[String],
) -> Result<QueryResult, StoreError> {
    let indexes = filters
        .iter()
        .map(|filter| {
            labels
                .iter()
                .position(|label| label == filter)
                .ok_or_else(|| StoreError::LabelNotFound {
                    query: query.to_string(),
                    label: filter.clone(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let values = filter_slice(result.values.as_slice(), &indexes)?;
    Ok(QueryResult {
        time: result.time,
        value: result.value.clone(),
        values: Values::new(values),
    })
}

/// Returns the item after `current`, wrapping around at the end.
///
/// Used to cycle the active query or display mode while consumers run. If `current` is not in
/// `items` the first item is returned; an empty ring has no next item.
pub fn next_in_ring<T: PartialEq + Clone>(items: &[T], current: &T) -> Option<T> {
    let next = match items.iter().position(|item| item == current) {
        Some(i) => (i + 1) % items.len(),
        None => 0,
    };
    items.get(next).cloned()
}
