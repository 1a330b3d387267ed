//! Mailbox scanning: pagination, per-message classification and reports

pub mod orchestrator;
pub mod paginator;
pub mod report;
pub mod types;

pub use orchestrator::Scanner;
pub use paginator::{Paginator, DEFAULT_PAGE_SIZE};
pub use report::{ReportPaths, ReportWriter};
pub use types::{resolve_labels, LabelCounts, ScanOutcome, ScanRequest, ScanResult, ScanSummary, LABEL_SHORTCUTS};
