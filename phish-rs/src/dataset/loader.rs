//! Training CSV loading
//!
//! Rows without a body or label are dropped. An unrecognized label aborts the
//! load: silently skipping it would shift the class balance the model sees.

use std::path::Path;
use tracing::{debug, info, warn};

use super::types::{CsvRow, EmailRecord, Language};
use crate::classifier::Label;
use crate::error::{Result, ScanError};

/// Load labeled records from a CSV file
pub fn load_dataset<P: AsRef<Path>>(path: P) -> Result<Vec<EmailRecord>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ScanError::Dataset(format!(
            "dataset {} not found",
            path.display()
        )));
    }

    let reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let records = read_records(reader)?;

    info!("Loaded {} records from {}", records.len(), path.display());
    Ok(records)
}

/// Parse records from any CSV source with a header row
pub fn read_records<R: std::io::Read>(mut reader: csv::Reader<R>) -> Result<Vec<EmailRecord>> {
    let mut records = Vec::new();
    let mut dropped = 0usize;

    for (i, row) in reader.deserialize::<CsvRow>().enumerate() {
        let row = row?;
        // Header is line 1
        let line = i + 2;

        let body = match row.body.filter(|b| !b.is_empty()) {
            Some(body) => body,
            None => {
                dropped += 1;
                continue;
            }
        };
        let label = match row.label.filter(|l| !l.trim().is_empty()) {
            Some(label) => label.parse::<Label>().map_err(|e| {
                ScanError::Dataset(format!("line {}: {}", line, e))
            })?,
            None => {
                dropped += 1;
                continue;
            }
        };
        let language = match row.lang.as_deref().map(str::parse::<Language>) {
            Some(Ok(lang)) => Some(lang),
            Some(Err(e)) => {
                debug!("line {}: {}", line, e);
                None
            }
            None => None,
        };

        records.push(EmailRecord {
            date: row.date.unwrap_or_default(),
            sender: row.from.unwrap_or_default(),
            subject: row.subject.unwrap_or_default(),
            body,
            language,
            label,
        });
    }

    if dropped > 0 {
        warn!("Dropped {} rows with missing body or label", dropped);
    }

    if records.is_empty() {
        return Err(ScanError::Dataset(
            "dataset is empty after dropping incomplete rows".to_string(),
        ));
    }

    Ok(records)
}

/// Write records in the training CSV layout
pub fn write_dataset<P: AsRef<Path>>(path: P, records: &[EmailRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path.as_ref())?;
    for record in records {
        writer.serialize(CsvRow::from(record))?;
    }
    writer.flush()?;
    Ok(())
}
