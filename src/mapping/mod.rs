//! Record mapping - turn nested records into flat rows
//!
//! This module resolves array paths against raw records and denormalizes
//! substructures, producing rows ready for relational storage.
//!
//! ## Reusing a plan
//!
//! `RecordMapper::map_records` compiles the column configuration on every
//! call. For a stream of payloads sharing one configuration, compile a
//! `MappingPlan` once and call `map_with_plan`.

pub mod mapper;
pub mod messages;
pub mod path;
pub mod plan;
pub mod types;
pub mod validate;
pub mod writer;

pub use mapper::{MappingResult, RecordMapper};
pub use messages::{Message, MessageLog, MessageSink, Severity};
pub use path::{Path, PathResolver, PathSegment, WILDCARD};
pub use plan::{ColumnPlan, MappingPlan, ValueSource};
pub use types::{ColumnConfig, ColumnSpec, GeneralConfig, Row, DEFAULT_SEPARATOR};
pub use validate::validate_minimum_records;
pub use writer::{CsvRowWriter, JsonLinesWriter};
