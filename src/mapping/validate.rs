//! Checks applied to mapped rows before they are handed to storage

use crate::mapping::messages::{MessageSink, Severity};
use crate::mapping::types::{GeneralConfig, Row};

/// Check that enough rows were mapped
///
/// Returns `false` and reports an error when `minimum_records` is set and
/// the row count falls short. An unset or zero minimum always passes.
pub fn validate_minimum_records(rows: &[Row], general: &GeneralConfig, sink: &mut dyn MessageSink) -> bool {
    let Some(minimum) = general.minimum_records.filter(|m| *m > 0) else {
        return true;
    };

    if rows.len() < minimum {
        sink.add_message(
            format!("Not enough records: {} found, {} required", rows.len(), minimum),
            Severity::Error,
        );
        return false;
    }

    true
}
