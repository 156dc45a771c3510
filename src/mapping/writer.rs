use crate::error::Result;
use crate::mapping::types::Row;
use serde_json::Value;
use std::io::Write;

/// Writes rows as JSON Lines, one object per line
pub struct JsonLinesWriter<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesWriter<W> {
    pub fn new(writer: W) -> Self {
        JsonLinesWriter { writer }
    }

    pub fn write_rows(&mut self, rows: &[Row]) -> Result<()> {
        for row in rows {
            serde_json::to_writer(&mut self.writer, row)?;
            self.writer.write_all(b"\n")?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Writes rows as CSV
///
/// The header is the union of the row keys in first-seen order. Absent
/// and null cells are empty; lists and mappings are written as compact JSON.
pub struct CsvRowWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> CsvRowWriter<W> {
    pub fn new(writer: W) -> Self {
        CsvRowWriter {
            writer: csv::Writer::from_writer(writer),
        }
    }

    pub fn write_rows(&mut self, rows: &[Row]) -> Result<()> {
        let header = header(rows);
        if header.is_empty() {
            return Ok(());
        }

        self.writer.write_record(&header)?;
        for row in rows {
            let record = header
                .iter()
                .map(|column| row.get(*column).map(cell).unwrap_or_else(|| Ok(String::new())))
                .collect::<Result<Vec<String>>>()?;
            self.writer.write_record(&record)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

fn header(rows: &[Row]) -> Vec<&str> {
    let mut columns: Vec<&str> = Vec::new();
    for key in rows.iter().flat_map(|row| row.keys()) {
        if !columns.contains(&key.as_str()) {
            columns.push(key);
        }
    }
    columns
}

fn cell(value: &Value) -> Result<String> {
    Ok(match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => serde_json::to_string(other)?,
    })
}
