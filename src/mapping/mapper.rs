use crate::error::Result;
use crate::expression::{ConditionEvaluator, ExpressionLanguage};
use crate::mapping::messages::{Message, MessageLog, MessageSink, Severity};
use crate::mapping::path::{children, is_container, lookup_key, PathResolver};
use crate::mapping::plan::{ColumnPlan, MappingPlan, ValueSource};
use crate::mapping::types::{ColumnConfig, GeneralConfig, Row};
use log::debug;
use serde_json::Value;
use std::borrow::Cow;

/// Rows produced by one mapping run, with the messages reported along the way
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappingResult {
    pub rows: Vec<Row>,
    pub messages: Vec<Message>,
}

impl MappingResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.severity == Severity::Warning)
    }

    pub fn summary(&self) -> String {
        format!("Mapped {} rows, {} messages", self.rows.len(), self.messages.len())
    }
}

/// Maps raw nested records to flat rows
pub struct RecordMapper<E = ExpressionLanguage> {
    resolver: PathResolver<E>,
}

impl RecordMapper<ExpressionLanguage> {
    pub fn new() -> Self {
        RecordMapper {
            resolver: PathResolver::default(),
        }
    }
}

impl Default for RecordMapper<ExpressionLanguage> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ConditionEvaluator> RecordMapper<E> {
    pub fn with_evaluator(evaluator: E) -> Self {
        RecordMapper {
            resolver: PathResolver::new(evaluator),
        }
    }

    pub fn resolver(&self) -> &PathResolver<E> {
        &self.resolver
    }

    /// Map a raw collection using the given column and general configuration
    pub fn map_records(&self, raw: &Value, columns: &ColumnConfig, general: &GeneralConfig) -> Result<MappingResult> {
        let plan = MappingPlan::compile(columns, general)?;
        self.map_with_plan(raw, &plan)
    }

    /// Map a raw collection with a pre-compiled plan
    pub fn map_with_plan(&self, raw: &Value, plan: &MappingPlan) -> Result<MappingResult> {
        let mut log = MessageLog::new();
        let rows = self.collect_rows(raw, plan, &mut log)?;

        debug!("Mapped {} rows using {} columns", rows.len(), plan.columns.len());

        Ok(MappingResult {
            rows,
            messages: log.into_messages(),
        })
    }

    fn collect_rows(&self, raw: &Value, plan: &MappingPlan, sink: &mut dyn MessageSink) -> Result<Vec<Row>> {
        if !is_filled_container(raw) {
            return Ok(Vec::new());
        }

        // Extract the targeted sub-collection first, if configured
        let collection = match &plan.record_path {
            Some(record_path) => match self.resolver.resolve(raw, &record_path.path)? {
                // A path that ends on null found nothing either
                None | Some(Value::Null) => {
                    sink.add_message(
                        format!(
                            "Using arrayPath property (value {}) returned an empty set",
                            record_path.text
                        ),
                        Severity::Warning,
                    );
                    return Ok(Vec::new());
                }
                Some(extracted) if !is_filled_container(&extracted) => return Ok(Vec::new()),
                Some(extracted) => Cow::Owned(extracted),
            },
            None => Cow::Borrowed(raw),
        };

        let mut rows = Vec::new();
        for record in items(&collection).unwrap_or_default() {
            // Entries that are not records are skipped
            if !is_container(record) {
                continue;
            }
            rows.extend(self.map_record(record, &plan.columns)?);
        }

        // Records where no column yielded anything leave empty rows behind
        rows.retain(|row| !row.is_empty());
        Ok(rows)
    }

    /// Map one record to one or more rows
    fn map_record(&self, record: &Value, columns: &[ColumnPlan]) -> Result<Vec<Row>> {
        let mut base = Row::new();
        let mut substructures: Vec<Vec<Row>> = Vec::new();

        for column in columns {
            let Some(value) = self.get_value(record, &column.source)? else {
                continue;
            };

            match &column.substructure {
                Some(sub_columns) => {
                    let Some(partials) = self.substructure_rows(&value, sub_columns)? else {
                        continue;
                    };
                    // Stays null unless a substructure item sets it
                    base.insert(column.name.clone(), Value::Null);
                    substructures.push(partials);
                }
                None => {
                    base.insert(column.name.clone(), value);
                }
            }
        }

        Ok(denormalize(base, &substructures))
    }

    /// Look up a column value in a record
    ///
    /// `None` means the value was not found; a value that is present but
    /// null counts as not found too.
    pub fn get_value(&self, record: &Value, source: &ValueSource) -> Result<Option<Value>> {
        let value = match source {
            ValueSource::Path(path) => self.resolver.resolve(record, path)?,
            ValueSource::Field(field) => lookup_key(record, field).cloned(),
            ValueSource::Unset => None,
        };
        Ok(value.filter(|v| !v.is_null()))
    }

    /// One partial row per item of a substructure value
    ///
    /// Returns `None` when the value is a scalar and has no items.
    fn substructure_rows(&self, value: &Value, columns: &[ColumnPlan]) -> Result<Option<Vec<Row>>> {
        let Some(items) = items(value) else {
            return Ok(None);
        };

        let mut rows = Vec::with_capacity(items.len());
        for item in items {
            let mut row = Row::new();
            for column in columns {
                if let Some(value) = self.get_value(item, &column.source)? {
                    row.insert(column.name.clone(), value);
                }
            }
            rows.push(row);
        }
        Ok(Some(rows))
    }
}

/// Expand a base row with the items of each substructure
///
/// Produces as many rows as the longest substructure; row `i` carries the
/// `i`-th item of every substructure that has one.
fn denormalize(base: Row, substructures: &[Vec<Row>]) -> Vec<Row> {
    let max_items = substructures.iter().map(Vec::len).max().unwrap_or(0);
    if max_items == 0 {
        return vec![base];
    }

    (0..max_items)
        .map(|i| {
            let mut row = base.clone();
            for partial in substructures.iter().filter_map(|rows| rows.get(i)) {
                for (key, value) in partial {
                    row.insert(key.clone(), value.clone());
                }
            }
            row
        })
        .collect()
}

/// The items of a collection value
///
/// Lists yield their elements and mappings their values. Scalars have no items.
fn items(value: &Value) -> Option<Vec<&Value>> {
    match value {
        Value::Array(_) | Value::Object(_) => Some(children(value).collect()),
        _ => None,
    }
}

fn is_filled_container(value: &Value) -> bool {
    match value {
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        _ => false,
    }
}
