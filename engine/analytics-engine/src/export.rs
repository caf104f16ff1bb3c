//! Export and re-import of stored records

use crate::error::{AnalyticsError, Result};
use crate::metric::MetricRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Csv,
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Json => write!(f, "json"),
            ExportFormat::Csv => write!(f, "csv"),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(AnalyticsError::validation(format!("unknown export format: {other}"))),
        }
    }
}

/// Snapshot of records handed out by an export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsExport {
    pub records: Vec<MetricRecord>,
    pub exported_at: DateTime<Utc>,
    pub format: ExportFormat,
    pub total_records: usize,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ImportPayload {
    Export(AnalyticsExport),
    Records(Vec<MetricRecord>),
}

const CSV_HEADER: &str = "id,metricType,value,timestamp,category,aggregationType,metadata";

fn csv_field(raw: &str) -> String {
    if raw.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

impl AnalyticsExport {
    pub fn new(records: Vec<MetricRecord>, format: ExportFormat) -> Self {
        Self { total_records: records.len(), records, exported_at: Utc::now(), format }
    }

    /// Render in the export's own format
    pub fn render(&self) -> Result<String> {
        match self.format {
            ExportFormat::Json => Ok(serde_json::to_string_pretty(self)?),
            ExportFormat::Csv => self.to_csv(),
        }
    }

    fn to_csv(&self) -> Result<String> {
        let mut out = String::from(CSV_HEADER);
        out.push('\n');

        for r in &self.records {
            let metadata = serde_json::to_string(&r.metadata)?;
            let row = [
                r.id.to_string(),
                r.metric_type.to_string(),
                r.value.to_string(),
                crate::metric::instant_key(r.timestamp),
                r.category.clone(),
                r.aggregation_type.to_string(),
                metadata,
            ];
            let row: Vec<String> = row.iter().map(|f| csv_field(f)).collect();
            out.push_str(&row.join(","));
            out.push('\n');
        }

        Ok(out)
    }

    /// Parse a JSON export, or a bare JSON array of records
    pub fn from_json(content: &str) -> Result<Self> {
        match serde_json::from_str(content)? {
            ImportPayload::Export(export) => Ok(export),
            ImportPayload::Records(records) => Ok(Self::new(records, ExportFormat::Json)),
        }
    }
}
