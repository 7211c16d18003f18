use serde::{Deserialize, Serialize};
use serde_json::Value;
use indexmap::IndexMap;
use chrono::{DateTime, Utc};
use crate::engine::PruneReport;

/// Metadata for a run report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Version of the report format
    pub version: String,

    /// Timestamp when the report was generated
    pub generated_at: DateTime<Utc>,

    /// Number of source files scanned for usage
    pub files_processed: usize,

    /// Number of stylesheets processed
    pub css_files: usize,

    /// `purge`, `critical` or `combine`
    pub mode: String,

    /// Pruner version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pruner_version: Option<String>,

    /// Processing time in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,
}

/// Per-stylesheet results
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReport {
    pub blocks_in: usize,
    pub retained: usize,
    pub removed: usize,
    pub merged_media_queries: usize,
    pub bytes_in: usize,
    pub bytes_out: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejected_selectors: Vec<String>,
}

impl FileReport {
    pub fn from_prune(input_css: &str, report: &PruneReport) -> Self {
        Self {
            blocks_in: report.stats.total_blocks_in,
            retained: report.stats.retained,
            removed: report.stats.removed,
            merged_media_queries: report.stats.merged_media_queries,
            bytes_in: input_css.len(),
            bytes_out: report.css.len(),
            rejected_selectors: report.stats.rejected_selectors.clone(),
        }
    }
}

/// Sums over every file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportTotals {
    pub blocks_in: usize,
    pub retained: usize,
    pub removed: usize,
    pub merged_media_queries: usize,
    pub bytes_in: usize,
    pub bytes_out: usize,
}

impl ReportTotals {
    /// Bytes saved as a percentage of the input
    pub fn reduction_percent(&self) -> f64 {
        if self.bytes_in == 0 {
            return 0.0;
        }
        (self.bytes_in.saturating_sub(self.bytes_out) as f64 / self.bytes_in as f64) * 100.0
    }
}

/// Complete run report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,

    /// Stylesheet path to its results
    pub files: IndexMap<String, FileReport>,

    pub totals: ReportTotals,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl Report {
    /// Create an empty report for `mode`
    pub fn new(mode: &str) -> Self {
        Self {
            metadata: ReportMetadata {
                version: "1.0.0".to_string(),
                generated_at: Utc::now(),
                files_processed: 0,
                css_files: 0,
                mode: mode.to_string(),
                pruner_version: Some(env!("CARGO_PKG_VERSION").to_string()),
                processing_time_ms: None,
            },
            files: IndexMap::new(),
            totals: ReportTotals::default(),
            warnings: Vec::new(),
        }
    }

    /// Add or replace one file and update the totals
    pub fn add_file(&mut self, path: String, file: FileReport) {
        self.files.insert(path, file);
        self.recalculate_totals();
    }

    fn recalculate_totals(&mut self) {
        let mut totals = ReportTotals::default();
        for file in self.files.values() {
            totals.blocks_in += file.blocks_in;
            totals.retained += file.retained;
            totals.removed += file.removed;
            totals.merged_media_queries += file.merged_media_queries;
            totals.bytes_in += file.bytes_in;
            totals.bytes_out += file.bytes_out;
        }
        self.totals = totals;
        self.metadata.css_files = self.files.len();
    }

    /// Record a warning once
    pub fn add_warning(&mut self, warning: String) {
        if !self.warnings.contains(&warning) {
            self.warnings.push(warning);
        }
    }

    /// Convert report to JSON value
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({}))
    }

    /// Convert report to pretty JSON string
    pub fn to_pretty_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Convert report to compact JSON string
    pub fn to_compact_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Builder pattern for creating reports
pub struct ReportBuilder {
    report: Report,
    start_time: Option<std::time::Instant>,
}

impl ReportBuilder {
    /// Create a new report builder
    pub fn new(mode: &str) -> Self {
        Self {
            report: Report::new(mode),
            start_time: Some(std::time::Instant::now()),
        }
    }

    /// Set the number of source files scanned
    pub fn with_files_processed(mut self, count: usize) -> Self {
        self.report.metadata.files_processed = count;
        self
    }

    /// Add one stylesheet result
    pub fn with_file(mut self, path: impl Into<String>, input_css: &str, prune: &PruneReport) -> Self {
        for warning in &prune.stats.warnings {
            self.report.add_warning(warning.clone());
        }
        self.report.add_file(path.into(), FileReport::from_prune(input_css, prune));
        self
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.report.add_warning(warning.into());
        self
    }

    /// Build the final report with timing
    pub fn build(mut self) -> Report {
        self.report.metadata.processing_time_ms = self.start_time.map(|t| t.elapsed().as_millis() as u64);
        self.report
    }
}
