pub mod api;
pub mod error;
pub mod logger;
pub mod metadata;
pub mod parser;
pub mod sinks;
pub mod value;

pub use crate::error::{Error, Result, Section};
pub use api::{ReadOutcome, ReadSummary, SasReader, read_header};
pub use metadata::{ColumnDescriptor, ColumnType, FileHeader, Platform, WordSize};
pub use sinks::{CollectedRow, CsvSink, RowCollector, SasConsumer};
pub use value::Value;
