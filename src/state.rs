//! Session-scoped report state: everything derived while the user browses a
//! workbook, owned by one `ReportState` value created on load and passed
//! explicitly to analyzers and exporters. Exporters read, never mutate.

use crate::types::{ChartArtifact, ChartKind, SessionSummary, Sheet, Summary, Workbook};

/// Results recorded for one visited sheet.
#[derive(Debug, Clone)]
pub struct SheetRecord {
    pub summary: Summary,
    /// The filtered incident table; absent for risk-assessment sheets, which
    /// only contribute to the PDF.
    pub table: Option<Sheet>,
    pub charts: Vec<ChartArtifact>,
}

/// Per-session aggregate of the loaded workbook and every per-sheet result.
/// Revisiting a sheet replaces its stored record in place, so export output
/// follows first-visitation order without accumulating duplicates.
#[derive(Debug)]
pub struct ReportState {
    pub workbook: Workbook,
    records: Vec<(String, SheetRecord)>,
    chart_kinds: Vec<(String, ChartKind)>,
}

impl ReportState {
    pub fn new(workbook: Workbook) -> Self {
        ReportState {
            workbook,
            records: Vec::new(),
            chart_kinds: Vec::new(),
        }
    }

    /// Merge one sheet's results into the session, overwriting any prior
    /// entry for the same sheet name.
    pub fn record(
        &mut self,
        sheet: &str,
        summary: Summary,
        table: Option<Sheet>,
        charts: Vec<ChartArtifact>,
    ) {
        for artifact in &charts {
            self.set_chart_kind(&artifact.key(), artifact.kind);
        }
        let record = SheetRecord {
            summary,
            table,
            charts,
        };
        match self.records.iter_mut().find(|(name, _)| name == sheet) {
            Some((_, existing)) => *existing = record,
            None => self.records.push((sheet.to_string(), record)),
        }
    }

    pub fn set_chart_kind(&mut self, key: &str, kind: ChartKind) {
        match self.chart_kinds.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = kind,
            None => self.chart_kinds.push((key.to_string(), kind)),
        }
    }

    pub fn chart_kind(&self, key: &str, default: ChartKind) -> ChartKind {
        self.chart_kinds
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, kind)| *kind)
            .unwrap_or(default)
    }

    /// Recorded sheets in visitation order.
    pub fn recorded(&self) -> impl Iterator<Item = (&str, &SheetRecord)> {
        self.records.iter().map(|(name, r)| (name.as_str(), r))
    }

    pub fn get(&self, sheet: &str) -> Option<&SheetRecord> {
        self.records
            .iter()
            .find(|(name, _)| name == sheet)
            .map(|(_, r)| r)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn session_summary(&self) -> SessionSummary {
        SessionSummary {
            sheets_analyzed: self.records.len(),
            total_filtered_rows: self
                .records
                .iter()
                .filter_map(|(_, r)| r.table.as_ref())
                .map(|t| t.rows.len() as u64)
                .sum(),
            charts_rendered: self.records.iter().map(|(_, r)| r.charts.len()).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ScalarValue, Summary};

    fn workbook() -> Workbook {
        Workbook { sheets: vec![] }
    }

    fn summary(label: &str) -> Summary {
        Summary {
            scalars: vec![(label.to_string(), ScalarValue::Count(1))],
            trend: None,
        }
    }

    #[test]
    fn revisiting_a_sheet_replaces_in_place() {
        let mut state = ReportState::new(workbook());
        state.record("A", summary("first"), None, vec![]);
        state.record("B", summary("b"), None, vec![]);
        state.record("A", summary("second"), None, vec![]);

        let order: Vec<&str> = state.recorded().map(|(name, _)| name).collect();
        assert_eq!(order, vec!["A", "B"]);
        assert_eq!(state.get("A").unwrap().summary.scalars[0].0, "second");
    }

    #[test]
    fn chart_kind_falls_back_to_default() {
        let mut state = ReportState::new(workbook());
        assert_eq!(state.chart_kind("A_Trend", ChartKind::Line), ChartKind::Line);
        state.set_chart_kind("A_Trend", ChartKind::Column);
        state.set_chart_kind("A_Trend", ChartKind::Column);
        assert_eq!(
            state.chart_kind("A_Trend", ChartKind::Line),
            ChartKind::Column
        );
    }

    #[test]
    fn session_summary_counts_recorded_work() {
        let mut state = ReportState::new(workbook());
        assert!(state.is_empty());
        let table = Sheet {
            name: "A".to_string(),
            columns: vec!["Status".to_string()],
            rows: vec![vec![crate::types::CellValue::Text("Open".to_string())]],
        };
        state.record("A", summary("a"), Some(table), vec![]);
        let s = state.session_summary();
        assert_eq!(s.sheets_analyzed, 1);
        assert_eq!(s.total_filtered_rows, 1);
        assert_eq!(s.charts_rendered, 0);
    }
}
