#![doc = include_str!("../README.md")]
// Declare modules
pub mod config;
pub mod consumer;
pub mod control;
pub mod core;
pub mod error;
pub mod normalize;
pub mod producer;
pub mod query;
pub mod reader;
pub mod series;
pub mod sink;
pub mod telemetry;
pub mod tokenizer;
pub mod types;

/// Configuration options for the store.
pub use crate::config::StoreConfig;
/// Startup/replay/tail protocol for one consumer.
pub use crate::consumer::{wait_for_result, Consumer};
/// Interrupt and pause signals for producer and consumer loops.
pub use crate::control::{ConsumerControl, Control, ProducerControl};
/// Main entry point: the concurrent result store.
pub use crate::core::Storage;
/// Error types for store and sink operations.
pub use crate::error::{SinkError, StoreError};
/// Label to sink-safe identifier.
pub use crate::normalize::normalize;
/// Query execution and result ingestion.
pub use crate::producer::{add_result, Attempts, Producer, QuerySource, ScriptedSource};
/// Projection and cycling helpers.
pub use crate::query::{filter_result, filter_slice, next_in_ring};
/// Per-consumer cursor.
pub use crate::reader::ReaderIndex;
/// History of one query.
pub use crate::series::TimeSeries;
/// External replication targets.
pub use crate::sink::{ExternalSink, MemorySink};
#[cfg(feature = "prometheus")]
pub use crate::sink::PrometheusSink;
/// Structured event hook for observability.
pub use crate::telemetry::{StoreEvent, StoreEventListener};
/// Raw text to typed values.
pub use crate::tokenizer::tokenize;
/// Result, value and timestamp types.
pub use crate::types::{QueryResult, Timestamp, Token, Values};
