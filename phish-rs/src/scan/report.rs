//! Scan report files: `scan_results.csv` and `scan_results.json`

use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use super::types::ScanResult;
use crate::error::Result;

pub const CSV_FILE: &str = "scan_results.csv";
pub const JSON_FILE: &str = "scan_results.json";

#[derive(Debug, Clone, PartialEq)]
pub struct ReportPaths {
    pub csv: PathBuf,
    pub json: PathBuf,
}

/// CSV row; the probability triple is rendered as one `[a, b, c]` cell
#[derive(Serialize)]
struct CsvRow<'a> {
    email_id: &'a str,
    from: &'a str,
    subject: &'a str,
    snippet: &'a str,
    prediction_probs: String,
    label: &'static str,
}

impl<'a> From<&'a ScanResult> for CsvRow<'a> {
    fn from(result: &'a ScanResult) -> Self {
        let probs = result.prediction_probs.as_array();
        CsvRow {
            email_id: &result.email_id,
            from: &result.from,
            subject: &result.subject,
            snippet: &result.snippet,
            prediction_probs: format!("[{}, {}, {}]", probs[0], probs[1], probs[2]),
            label: result.label.as_str(),
        }
    }
}

pub struct ReportWriter {
    dir: PathBuf,
}

impl ReportWriter {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Write both reports. Nothing is written for an empty result set.
    pub fn write(&self, results: &[ScanResult]) -> Result<Option<ReportPaths>> {
        if results.is_empty() {
            info!("No results, skipping report files");
            return Ok(None);
        }

        fs::create_dir_all(&self.dir)?;
        let paths = ReportPaths {
            csv: self.dir.join(CSV_FILE),
            json: self.dir.join(JSON_FILE),
        };

        let mut csv = csv::Writer::from_path(&paths.csv)?;
        for result in results {
            csv.serialize(CsvRow::from(result))?;
        }
        csv.flush()?;

        let mut json = BufWriter::new(File::create(&paths.json)?);
        serde_json::to_writer_pretty(&mut json, results)?;
        json.flush()?;

        info!(
            "Saved {} results to {} and {}",
            results.len(),
            paths.csv.display(),
            paths.json.display()
        );
        Ok(Some(paths))
    }
}
