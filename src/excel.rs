//! Spreadsheet exporter: one tab per analyzed sheet with its raw filtered
//! table, a `{sheet}_Trend` tab and `{sheet}_{column}` frequency tabs, each
//! paired with a native chart anchored at E2.

use crate::analysis;
use crate::state::ReportState;
use crate::types::{CellValue, ChartKind, Sheet, TRACKED_COLUMNS};
use anyhow::{Context, Result};
use rust_xlsxwriter::{Chart, ChartDataLabel, ChartType, Format, Workbook};

/// Serialize the session's filtered tables and derived frequency tables into
/// one workbook. Sheets without a stored filtered table (risk sheets, empty
/// sheets) are skipped.
pub fn render(state: &ReportState) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();

    for (sheet, record) in state.recorded() {
        let Some(table) = &record.table else {
            continue;
        };

        write_raw_tab(&mut workbook, &tab_name(sheet), table, &header_format)?;

        if let Some(trend) = &record.summary.trend {
            let tab = tab_name(&format!("{}_Trend", sheet));
            let ws = workbook.add_worksheet();
            ws.set_name(tab.as_str())?;
            ws.write_string_with_format(0, 0, "Tanggal", &header_format)?;
            ws.write_string_with_format(0, 1, "Jumlah", &header_format)?;
            for (i, (month, count)) in trend.rows.iter().enumerate() {
                ws.write_string(i as u32 + 1, 0, month.as_str())?;
                ws.write_number(i as u32 + 1, 1, *count as f64)?;
            }

            if !trend.rows.is_empty() {
                let kind = state.chart_kind(&format!("{}_Trend", sheet), ChartKind::Line);
                let mut chart = Chart::new(chart_type(kind));
                chart
                    .add_series()
                    .set_name(&format!("Trend {}", sheet))
                    .set_categories((tab.as_str(), 1, 0, trend.rows.len() as u32, 0))
                    .set_values((tab.as_str(), 1, 1, trend.rows.len() as u32, 1))
                    .set_data_label(ChartDataLabel::new().show_value());
                chart.title().set_name(&format!("Trend {}", sheet));
                chart.x_axis().set_name("Bulan");
                chart.y_axis().set_name("Jumlah");
                ws.insert_chart(1, 4, &chart)?;
            }
        }

        for column in TRACKED_COLUMNS {
            if !table.has_column(column) {
                continue;
            }
            let counts = analysis::frequency_table(table, column);
            if counts.rows.is_empty() {
                continue;
            }

            let tab = tab_name(&format!("{}_{}", sheet, column));
            let ws = workbook.add_worksheet();
            ws.set_name(tab.as_str())?;
            ws.write_string_with_format(0, 0, column, &header_format)?;
            ws.write_string_with_format(0, 1, "Jumlah", &header_format)?;
            for (i, (label, count)) in counts.rows.iter().enumerate() {
                ws.write_string(i as u32 + 1, 0, label.as_str())?;
                ws.write_number(i as u32 + 1, 1, *count as f64)?;
            }

            let kind = state.chart_kind(&format!("{}_{}", sheet, column), ChartKind::Column);
            let mut chart = Chart::new(chart_type(kind));
            let series = chart
                .add_series()
                .set_name(&format!("Distribusi {} - {}", column, sheet))
                .set_categories((tab.as_str(), 1, 0, counts.rows.len() as u32, 0))
                .set_values((tab.as_str(), 1, 1, counts.rows.len() as u32, 1));
            if kind == ChartKind::Pie {
                series.set_data_label(ChartDataLabel::new().show_percentage());
            } else {
                series.set_data_label(ChartDataLabel::new().show_value());
            }
            chart.title().set_name(&format!("Distribusi {}", column));
            ws.insert_chart(1, 4, &chart)?;
        }
    }

    let buffer = workbook
        .save_to_buffer()
        .context("failed to serialize spreadsheet report")?;
    Ok(buffer)
}

fn write_raw_tab(
    workbook: &mut Workbook,
    tab: &str,
    table: &Sheet,
    header_format: &Format,
) -> Result<()> {
    let ws = workbook.add_worksheet();
    ws.set_name(tab)?;
    for (col, name) in table.columns.iter().enumerate() {
        ws.write_string_with_format(0, col as u16, name, header_format)?;
    }
    for (r, row) in table.rows.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            let (r, c) = (r as u32 + 1, c as u16);
            match cell {
                CellValue::Text(s) => {
                    ws.write_string(r, c, s)?;
                }
                CellValue::Number(n) => {
                    ws.write_number(r, c, *n)?;
                }
                CellValue::Date(d) => {
                    ws.write_string(r, c, d.format("%Y-%m-%d").to_string())?;
                }
                CellValue::Empty => {}
            }
        }
    }
    Ok(())
}

fn chart_type(kind: ChartKind) -> ChartType {
    match kind {
        ChartKind::Line => ChartType::Line,
        ChartKind::Column => ChartType::Column,
        ChartKind::Pie => ChartType::Pie,
    }
}

/// Excel rejects tab names longer than 31 characters; clamp rather than
/// letting the writer error out on long sheet names.
fn tab_name(name: &str) -> String {
    name.chars().take(31).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader;
    use crate::types::{ScalarValue, Summary, TrendTable};

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    fn recorded_state() -> ReportState {
        let table = Sheet {
            name: "Incidents".to_string(),
            columns: vec!["Tanggal".to_string(), "Status".to_string()],
            rows: vec![
                vec![text("2025-01-10"), text("Open")],
                vec![text("2025-01-20"), text("Closed")],
                vec![text("2025-02-05"), text("Open")],
            ],
        };
        let summary = Summary {
            scalars: vec![(
                "Status dominan".to_string(),
                ScalarValue::Text("Open".to_string()),
            )],
            trend: Some(TrendTable {
                rows: vec![("2025-01".to_string(), 2), ("2025-02".to_string(), 1)],
            }),
        };
        let mut state = ReportState::new(crate::types::Workbook { sheets: vec![] });
        state.record("Incidents", summary, Some(table), vec![]);
        state
    }

    #[test]
    fn round_trip_exposes_status_counts() {
        let bytes = render(&recorded_state()).unwrap();
        let (workbook, _) = loader::load_workbook_from_bytes(&bytes).unwrap();

        let status = workbook.sheet("Incidents_Status").unwrap();
        assert_eq!(status.columns, vec!["Status", "Jumlah"]);
        let rows: Vec<(String, u64)> = status
            .rows
            .iter()
            .map(|r| {
                let label = match &r[0] {
                    CellValue::Text(s) => s.clone(),
                    other => panic!("unexpected label cell {:?}", other),
                };
                let count = match &r[1] {
                    CellValue::Number(n) => *n as u64,
                    other => panic!("unexpected count cell {:?}", other),
                };
                (label, count)
            })
            .collect();
        assert!(rows.contains(&("Open".to_string(), 2)));
        assert!(rows.contains(&("Closed".to_string(), 1)));
        assert_eq!(rows.iter().map(|(_, n)| n).sum::<u64>(), 3);
    }

    #[test]
    fn trend_and_raw_tabs_are_written() {
        let bytes = render(&recorded_state()).unwrap();
        let (workbook, _) = loader::load_workbook_from_bytes(&bytes).unwrap();

        let raw = workbook.sheet("Incidents").unwrap();
        assert_eq!(raw.rows.len(), 3);

        let trend = workbook.sheet("Incidents_Trend").unwrap();
        assert_eq!(trend.columns, vec!["Tanggal", "Jumlah"]);
        assert_eq!(trend.rows.len(), 2);
    }

    #[test]
    fn sheets_without_tables_are_skipped() {
        let mut state = ReportState::new(crate::types::Workbook { sheets: vec![] });
        state.record("HIRADC", Summary::default(), None, vec![]);
        let bytes = render(&state).unwrap();
        let (workbook, _) = loader::load_workbook_from_bytes(&bytes).unwrap();
        assert!(workbook.sheet("HIRADC").is_none());
    }

    #[test]
    fn long_tab_names_are_clamped() {
        assert_eq!(tab_name("short"), "short");
        let long = "a".repeat(40);
        assert_eq!(tab_name(&long).len(), 31);
    }
}
