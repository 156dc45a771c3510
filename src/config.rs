//! Import configuration files
//!
//! A configuration file is a JSON object with a `general` section and a
//! `columns` section:
//!
//! ```json
//! {
//!   "general": {"arrayPath": "orders", "minimumRecords": 1},
//!   "columns": {
//!     "order_id": {"field": "id"},
//!     "client": {"arrayPath": "customer/name"}
//!   }
//! }
//! ```

use crate::error::Result;
use crate::mapping::{ColumnConfig, GeneralConfig};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    pub columns: ColumnConfig,
}

impl ImportConfig {
    pub fn new(general: GeneralConfig, columns: ColumnConfig) -> Self {
        ImportConfig { general, columns }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MapError;
    use crate::mapping::ColumnSpec;
    use std::io::Write;

    const ORDERS: &str = r#"{
        "general": {"arrayPath": "orders", "minimumRecords": 1},
        "columns": {
            "order_id": {"field": "id"},
            "products": {
                "field": "products",
                "substructureFields": {"products": {"field": "product"}}
            }
        }
    }"#;

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(ORDERS.as_bytes()).unwrap();

        let config = ImportConfig::from_path(file.path()).unwrap();
        assert_eq!(config.general.array_path.as_deref(), Some("orders"));
        assert_eq!(config.general.minimum_records, Some(1));
        assert_eq!(config.columns.get("order_id"), Some(&ColumnSpec::field("id")));
    }

    #[test]
    fn test_general_section_is_optional() {
        let config = ImportConfig::from_json_str(r#"{"columns": {"a": {"field": "A"}}}"#).unwrap();
        assert_eq!(config.general, GeneralConfig::default());
        assert_eq!(config.columns.len(), 1);
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(ImportConfig::from_json_str("{\"general\": {}}"), Err(MapError::Json(_))));
        assert!(matches!(ImportConfig::from_path("/nonexistent/config.json"), Err(MapError::Io(_))));
    }
}
