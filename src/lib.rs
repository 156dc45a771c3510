//! # Crucible - Record Mapping Toolkit
//!
//! Maps externally sourced, nested records into flat rows ready for a
//! relational schema.
//!
//! ## Modules
//!
//! - **mapping**: array path resolution, record mapping and denormalization
//! - **expression**: the condition language used inside array paths
//! - **config**: JSON configuration files
//!
//! ## Quick Start
//!
//! ```rust
//! use crucible::mapping::{ColumnConfig, ColumnSpec, GeneralConfig, RecordMapper};
//! use serde_json::json;
//!
//! # fn main() -> anyhow::Result<()> {
//! let data = json!({
//!     "orders": [
//!         {"id": 1, "lines": [{"sku": "A", "qty": 2}, {"sku": "B", "qty": 0}]},
//!         {"id": 2, "lines": [{"sku": "C", "qty": 5}]}
//!     ]
//! });
//!
//! let columns = ColumnConfig::new()
//!     .with("order", ColumnSpec::field("id"))
//!     .with(
//!         "sku",
//!         ColumnSpec::field("lines").with_substructure(ColumnConfig::new().with("sku", ColumnSpec::field("sku"))),
//!     );
//! let general = GeneralConfig::default().with_array_path("orders/*{id > 0}");
//!
//! let result = RecordMapper::new().map_records(&data, &columns, &general)?;
//!
//! // One row per order line, each carrying its order id
//! assert_eq!(result.rows.len(), 3);
//! assert_eq!(result.rows[1]["order"], 1);
//! assert_eq!(result.rows[1]["sku"], "B");
//! assert_eq!(result.rows[2]["sku"], "C");
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use std::io::Read;

pub mod config;
pub mod error;
pub mod expression;
pub mod input;
pub mod mapping;

// Re-export commonly used types for convenience
pub use config::ImportConfig;
pub use error::{ExpressionError, MapError};
pub use expression::{ConditionEvaluator, ExpressionLanguage};
pub use mapping::{
    ColumnConfig, ColumnSpec, GeneralConfig, MappingPlan, MappingResult, Message, Path, PathResolver, RecordMapper,
    Row, Severity,
};

/// Main entry point: map a JSON payload read from `reader`
pub fn map_json<R: Read>(mut reader: R, config: &ImportConfig) -> Result<MappingResult> {
    let mut content = Vec::new();
    reader
        .read_to_end(&mut content)
        .context("Failed to read payload")?;
    let payload = input::parse_payload(&mut content, false)?;

    let mapper = RecordMapper::new();
    let result = mapper
        .map_records(&payload, &config.columns, &config.general)
        .context("Failed to map records")?;

    Ok(result)
}
