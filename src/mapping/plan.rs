//! Pre-compiled mapping plans
//!
//! Column configurations are strings: paths still to be split, conditions
//! still to be extracted. A `MappingPlan` does that work once, so a payload
//! with thousands of records (or a stream of payloads sharing one
//! configuration) never re-parses a path. Invalid separators are rejected
//! here rather than in the middle of a mapping run.

use crate::error::Result;
use crate::mapping::path::Path;
use crate::mapping::types::{ColumnConfig, ColumnSpec, GeneralConfig, DEFAULT_SEPARATOR};

/// Where a column's value comes from
#[derive(Debug, Clone, PartialEq)]
pub enum ValueSource {
    /// Direct key lookup in the record
    Field(String),
    /// Array path resolved against the record
    Path(Path),
    /// Neither configured: the column never has a value here. Such columns
    /// are filled by later import steps, so an empty spec is not an error.
    Unset,
}

impl ValueSource {
    fn from_spec(spec: &ColumnSpec) -> Result<Self> {
        if let Some(path) = spec.array_path.as_deref().filter(|p| !p.is_empty()) {
            let separator = spec.array_path_separator.as_deref().unwrap_or(DEFAULT_SEPARATOR);
            return Ok(ValueSource::Path(Path::parse(path, separator)?));
        }
        Ok(match &spec.field {
            Some(field) => ValueSource::Field(field.clone()),
            None => ValueSource::Unset,
        })
    }
}

/// Pre-computed extraction for one target column
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnPlan {
    pub name: String,
    pub source: ValueSource,
    /// Sub-columns applied to each item of the value, if this column is a substructure
    pub substructure: Option<Vec<ColumnPlan>>,
}

/// The top-level array path, kept with its configured text for messages
#[derive(Debug, Clone, PartialEq)]
pub struct RecordPath {
    pub text: String,
    pub path: Path,
}

/// Complete plan for mapping payloads with one configuration
#[derive(Debug, Clone, PartialEq)]
pub struct MappingPlan {
    pub record_path: Option<RecordPath>,
    pub columns: Vec<ColumnPlan>,
}

impl MappingPlan {
    pub fn compile(columns: &ColumnConfig, general: &GeneralConfig) -> Result<Self> {
        let record_path = match general.array_path.as_deref().filter(|p| !p.is_empty()) {
            Some(text) => {
                let separator = general.array_path_separator.as_deref().unwrap_or(DEFAULT_SEPARATOR);
                Some(RecordPath {
                    text: text.to_string(),
                    path: Path::parse(text, separator)?,
                })
            }
            None => None,
        };

        Ok(MappingPlan {
            record_path,
            columns: Self::compile_columns(columns, true)?,
        })
    }

    /// Substructures only nest one level: sub-columns are plain value lookups
    fn compile_columns(columns: &ColumnConfig, allow_substructure: bool) -> Result<Vec<ColumnPlan>> {
        columns
            .iter()
            .map(|(name, spec)| {
                let substructure = match &spec.substructure_fields {
                    Some(fields) if allow_substructure => Some(Self::compile_columns(fields, false)?),
                    _ => None,
                };
                Ok(ColumnPlan {
                    name: name.to_string(),
                    source: ValueSource::from_spec(spec)?,
                    substructure,
                })
            })
            .collect()
    }

    pub fn has_substructures(&self) -> bool {
        self.columns.iter().any(|c| c.substructure.is_some())
    }
}
