use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use tabled::Tabled;

/// Column names the analyzers recognize. Anything else passes through
/// untouched in raw-table exports but is ignored by analysis.
pub const DATE_COLUMN: &str = "Tanggal";
pub const LIKELIHOOD_COLUMN: &str = "Likelihood";
pub const SEVERITY_COLUMN: &str = "Severity";
pub const TRACKED_COLUMNS: [&str; 3] = ["Jenis", "Severity", "Status"];

/// One scalar cell of a loaded sheet.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Date(NaiveDate),
    Empty,
}

/// One named table within a workbook: a header row plus data rows, each row
/// aligned to `columns`.
#[derive(Debug, Clone)]
pub struct Sheet {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl Sheet {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A loaded workbook. Immutable once loaded for the session; sheet names are
/// unique within the file.
#[derive(Debug, Clone)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }
}

/// Analysis mode for a sheet, decided once at classification time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetKind {
    RiskAssessment,
    IncidentTracking,
}

/// Per-sheet, per-session filter selections. Filtering is non-destructive:
/// applying criteria produces a derived view, the loaded sheet is untouched.
#[derive(Debug, Clone, Default)]
pub struct FilterCriteria {
    /// Inclusive [start, end] range over the Tanggal column. When set, rows
    /// whose date is missing or unparseable are dropped by the filter.
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    /// Inclusion set per tracked categorical column. A column with no entry
    /// here keeps all its values.
    pub included: Vec<(String, BTreeSet<String>)>,
}

impl FilterCriteria {
    pub fn inclusion(&self, column: &str) -> Option<&BTreeSet<String>> {
        self.included
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, set)| set)
    }
}

/// A scalar entry in a sheet summary, e.g. a dominant category or a risk
/// statistic.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Text(String),
    Number(f64),
    Count(u64),
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Text(s) => write!(f, "{}", s),
            ScalarValue::Number(n) => write!(f, "{}", crate::util::format_number(*n, 2)),
            ScalarValue::Count(c) => write!(f, "{}", c),
        }
    }
}

/// Count of records bucketed by calendar month, keys "YYYY-MM", sorted
/// chronologically ascending.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrendTable {
    pub rows: Vec<(String, u64)>,
}

impl TrendTable {
    pub fn total(&self) -> u64 {
        self.rows.iter().map(|(_, n)| n).sum()
    }

    pub fn preview_rows(&self) -> Vec<TrendRow> {
        self.rows
            .iter()
            .map(|(bulan, jumlah)| TrendRow {
                tanggal: bulan.clone(),
                jumlah: *jumlah,
            })
            .collect()
    }
}

/// Count of records per distinct category value, sorted by descending count
/// (ties broken by first occurrence in the filtered row order).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrequencyTable {
    pub column: String,
    pub rows: Vec<(String, u64)>,
}

impl FrequencyTable {
    pub fn total(&self) -> u64 {
        self.rows.iter().map(|(_, n)| n).sum()
    }
}

/// 2-D frequency table over the observed Likelihood/Severity values only,
/// heat-map ready: Likelihood as rows, Severity as columns.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskMatrix {
    pub likelihood: Vec<i64>,
    pub severity: Vec<i64>,
    /// counts[likelihood index][severity index]
    pub counts: Vec<Vec<u64>>,
}

impl RiskMatrix {
    pub fn count(&self, likelihood: i64, severity: i64) -> u64 {
        let li = match self.likelihood.iter().position(|v| *v == likelihood) {
            Some(i) => i,
            None => return 0,
        };
        let si = match self.severity.iter().position(|v| *v == severity) {
            Some(i) => i,
            None => return 0,
        };
        self.counts[li][si]
    }

    pub fn row_total(&self, likelihood: i64) -> u64 {
        self.likelihood
            .iter()
            .position(|v| *v == likelihood)
            .map(|li| self.counts[li].iter().sum())
            .unwrap_or(0)
    }

    pub fn column_total(&self, severity: i64) -> u64 {
        self.severity
            .iter()
            .position(|v| *v == severity)
            .map(|si| self.counts.iter().map(|row| row[si]).sum())
            .unwrap_or(0)
    }

    pub fn max_count(&self) -> u64 {
        self.counts
            .iter()
            .flat_map(|row| row.iter().copied())
            .max()
            .unwrap_or(0)
    }
}

/// Per-sheet summary: short scalar labels plus at most one trend table.
#[derive(Debug, Clone, Default)]
pub struct Summary {
    pub scalars: Vec<(String, ScalarValue)>,
    pub trend: Option<TrendTable>,
}

/// Rendering kind chosen for a chart. Trend charts pick from {line, column},
/// distribution charts from {column, pie}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Line,
    Column,
    Pie,
}

impl ChartKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "line" => Some(ChartKind::Line),
            "column" => Some(ChartKind::Column),
            "pie" => Some(ChartKind::Pie),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChartKind::Line => "line",
            ChartKind::Column => "column",
            ChartKind::Pie => "pie",
        }
    }
}

/// A rendered chart image plus the metadata tying it back to its sheet.
/// Created during analysis, consumed once by the exporters.
#[derive(Debug, Clone)]
pub struct ChartArtifact {
    pub sheet: String,
    /// "Trend", "RiskMatrix", or a tracked column name.
    pub category: String,
    pub kind: ChartKind,
    pub png: Vec<u8>,
}

impl ChartArtifact {
    pub fn key(&self) -> String {
        format!("{}_{}", self.sheet, self.category)
    }
}

#[derive(Debug, Clone, Serialize, Tabled)]
pub struct TrendRow {
    #[serde(rename = "Tanggal")]
    #[tabled(rename = "Tanggal")]
    pub tanggal: String,
    #[serde(rename = "Jumlah")]
    #[tabled(rename = "Jumlah")]
    pub jumlah: u64,
}

#[derive(Debug, Clone, Serialize, Tabled)]
pub struct SummaryRow {
    #[serde(rename = "Item")]
    #[tabled(rename = "Item")]
    pub item: String,
    #[serde(rename = "Nilai")]
    #[tabled(rename = "Nilai")]
    pub nilai: String,
}

/// Session-level stats written next to the exported reports.
#[derive(Debug, Serialize)]
pub struct SessionSummary {
    pub sheets_analyzed: usize,
    pub total_filtered_rows: u64,
    pub charts_rendered: usize,
}
