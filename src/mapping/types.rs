use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

/// Separator used to split array paths when none is configured
pub const DEFAULT_SEPARATOR: &str = "/";

/// One flat output row: column name to value
pub type Row = Map<String, Value>;

/// Settings that apply to the whole payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneralConfig {
    /// Path selecting the record collection inside the payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub array_path: Option<String>,

    /// Separator for `array_path` (defaults to "/")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub array_path_separator: Option<String>,

    /// Minimum number of mapped rows for the import to proceed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_records: Option<usize>,
}

impl GeneralConfig {
    pub fn with_array_path(mut self, path: impl Into<String>) -> Self {
        self.array_path = Some(path.into());
        self
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.array_path_separator = Some(separator.into());
        self
    }

    pub fn with_minimum_records(mut self, minimum: usize) -> Self {
        self.minimum_records = Some(minimum);
        self
    }
}

/// How to obtain the value of one target column
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ColumnSpec {
    /// Key looked up directly in the record
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,

    /// Array path resolved against the record; takes precedence over `field`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub array_path: Option<String>,

    /// Separator for `array_path` (defaults to "/")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub array_path_separator: Option<String>,

    /// Columns extracted from each item of the value, denormalized into rows
    #[serde(skip_serializing_if = "Option::is_none")]
    pub substructure_fields: Option<ColumnConfig>,
}

impl ColumnSpec {
    pub fn field(name: impl Into<String>) -> Self {
        ColumnSpec {
            field: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn path(path: impl Into<String>) -> Self {
        ColumnSpec {
            array_path: Some(path.into()),
            ..Default::default()
        }
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.array_path_separator = Some(separator.into());
        self
    }

    pub fn with_substructure(mut self, fields: ColumnConfig) -> Self {
        self.substructure_fields = Some(fields);
        self
    }
}

/// Column configurations in declaration order
///
/// Deserializes from a JSON object and keeps the order in which the keys
/// appear, which is also the order of the columns in every output row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnConfig {
    columns: Vec<(String, ColumnSpec)>,
}

impl ColumnConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a column, replacing any earlier column with the same name in place
    pub fn with(mut self, name: impl Into<String>, spec: ColumnSpec) -> Self {
        self.insert(name.into(), spec);
        self
    }

    pub fn insert(&mut self, name: String, spec: ColumnSpec) {
        match self.columns.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = spec,
            None => self.columns.push((name, spec)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, spec)| spec)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ColumnSpec)> {
        self.columns.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, ColumnSpec)> for ColumnConfig {
    fn from_iter<I: IntoIterator<Item = (S, ColumnSpec)>>(iter: I) -> Self {
        let mut config = ColumnConfig::new();
        for (name, spec) in iter {
            config.insert(name.into(), spec);
        }
        config
    }
}

impl Serialize for ColumnConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, spec) in &self.columns {
            map.serialize_entry(name, spec)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ColumnConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ColumnConfigVisitor;

        impl<'de> Visitor<'de> for ColumnConfigVisitor {
            type Value = ColumnConfig;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map of column names to column configurations")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut config = ColumnConfig::new();
                while let Some((name, spec)) = access.next_entry::<String, ColumnSpec>()? {
                    config.insert(name, spec);
                }
                Ok(config)
            }
        }

        deserializer.deserialize_map(ColumnConfigVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_column_order_follows_document() {
        let config: ColumnConfig = serde_json::from_value(json!({
            "zeta": {"field": "Z"},
            "alpha": {"arrayPath": "a/b", "arrayPathSeparator": "/"},
            "mid": {"field": "M"}
        }))
        .unwrap();

        let names: Vec<&str> = config.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
        assert_eq!(config.get("alpha").unwrap().array_path.as_deref(), Some("a/b"));
    }

    #[test]
    fn test_nested_substructure_config() {
        let config: ColumnConfig = serde_json::from_value(json!({
            "products": {
                "field": "products",
                "substructureFields": {
                    "products": {"field": "product"},
                    "quantity": {"field": "qty"}
                }
            }
        }))
        .unwrap();

        let sub = config.get("products").unwrap().substructure_fields.as_ref().unwrap();
        assert_eq!(sub.len(), 2);
        assert_eq!(sub.get("quantity"), Some(&ColumnSpec::field("qty")));
    }

    #[test]
    fn test_general_config_camel_case() {
        let general: GeneralConfig = serde_json::from_value(json!({
            "arrayPath": "orders",
            "minimumRecords": 2
        }))
        .unwrap();

        assert_eq!(general, GeneralConfig::default().with_array_path("orders").with_minimum_records(2));
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let config = ColumnConfig::new()
            .with("a", ColumnSpec::field("x"))
            .with("b", ColumnSpec::field("y"))
            .with("a", ColumnSpec::field("z"));

        let entries: Vec<(&str, &ColumnSpec)> = config.iter().collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], ("a", &ColumnSpec::field("z")));
    }
}
