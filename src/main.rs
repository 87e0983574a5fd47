// Entry point and high-level console flow.
//
// The shell is a thin wrapper around the analysis and export core:
// - Option [1] loads a workbook, printing load diagnostics.
// - Option [2] analyzes one sheet (filters + chart kinds are prompted,
//   with defaults) and records the results into the session.
// - Option [3] exports the PDF report, the spreadsheet report, and a JSON
//   session summary.
// - After exporting, the user can go back to the menu or exit.
mod analysis;
mod charts;
mod excel;
mod loader;
mod output;
mod pdf;
mod state;
mod types;
mod util;

use analysis::SheetAnalysis;
use state::ReportState;
use std::io::{self, Write};
use types::{ChartKind, FilterCriteria, Sheet, DATE_COLUMN, TRACKED_COLUMNS};

/// Read a single line of input after printing the common "Enter choice:" prompt.
fn read_choice() -> String {
    read_line("Enter choice: ")
}

fn read_line(prompt: &str) -> String {
    print!("{}", prompt);
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

/// Ask the user whether to go back to the menu after exporting reports.
///
/// Returns `true` if the user chose `Y`, `false` if they chose `N`.
fn prompt_back_to_menu() -> bool {
    loop {
        let resp = read_line("Back to Menu (Y/N): ").to_uppercase();
        match resp.as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

/// Handle option [1]: load a workbook and start a fresh session around it.
fn handle_load() -> Option<ReportState> {
    let path = read_line("Workbook path [hse_monitoring.xlsx]: ");
    let path = if path.is_empty() {
        "hse_monitoring.xlsx".to_string()
    } else {
        path
    };
    match loader::load_workbook(&path) {
        Ok((workbook, report)) => {
            println!(
                "Workbook loaded. ({} sheets, {} rows)",
                util::format_int(report.sheet_count as i64),
                util::format_int(report.total_rows as i64)
            );
            if report.skipped_cells > 0 {
                println!(
                    "Note: {} cells skipped due to parse errors.",
                    util::format_int(report.skipped_cells as i64)
                );
            }
            println!();
            Some(ReportState::new(workbook))
        }
        Err(e) => {
            eprintln!("Failed to load workbook: {}\n", e);
            None
        }
    }
}

/// Handle option [2]: pick a sheet, prompt filters and chart kinds, analyze,
/// preview, and record the results into the session.
fn handle_analyze(session: &mut ReportState) {
    let names = session.workbook.sheet_names();
    if names.is_empty() {
        println!("The workbook has no sheets.\n");
        return;
    }
    println!("Sheets:");
    for (i, name) in names.iter().enumerate() {
        println!("[{}] {}", i + 1, name);
    }
    let chosen = match read_choice().parse::<usize>() {
        Ok(n) if (1..=names.len()).contains(&n) => names[n - 1].clone(),
        _ => {
            println!("Invalid sheet choice.\n");
            return;
        }
    };
    // Clone so prompts and recording do not fight over the session borrow.
    let Some(sheet) = session.workbook.sheet(&chosen).cloned() else {
        println!("Invalid sheet choice.\n");
        return;
    };

    println!("\nAnalisa Sheet: {}", sheet.name);
    let criteria = prompt_criteria(&sheet);

    match analysis::analyze_sheet(&sheet, &criteria) {
        SheetAnalysis::Empty => {
            println!("Warning: sheet is empty, nothing to analyze.\n");
        }
        SheetAnalysis::Risk(risk) => {
            println!(
                "Analisa HIRADC ({} rated rows)",
                util::format_int(risk.rated_rows as i64)
            );
            output::preview_summary(&risk.summary);
            println!("Risk Matrix:");
            output::preview_matrix(&risk.matrix);

            let mut charts = Vec::new();
            match charts::render_risk_matrix_chart(&sheet.name, &risk.matrix) {
                Ok(artifact) => charts.push(artifact),
                Err(e) => eprintln!("Chart error: {}", e),
            }
            session.record(&sheet.name, risk.summary, None, charts);
        }
        SheetAnalysis::Incidents(incidents) => {
            println!(
                "{} rows after filtering.",
                util::format_int(incidents.filtered.rows.len() as i64)
            );
            println!("Ringkasan:");
            output::preview_summary(&incidents.summary);

            let mut charts = Vec::new();
            if let Some(trend) = &incidents.summary.trend {
                println!("Trend Perbulan:");
                output::preview_table_rows(&trend.preview_rows(), trend.rows.len().max(1));
                let kind = prompt_chart_kind(
                    &format!("Jenis grafik tren {} (line/column)", sheet.name),
                    ChartKind::Line,
                    &[ChartKind::Line, ChartKind::Column],
                );
                match charts::render_trend_chart(&sheet.name, trend, kind) {
                    Ok(artifact) => charts.push(artifact),
                    Err(e) => eprintln!("Chart error: {}", e),
                }
            }
            for table in &incidents.distributions {
                println!("Distribusi {}:", table.column);
                output::preview_frequency(table);
                if table.rows.is_empty() {
                    continue;
                }
                let kind = prompt_chart_kind(
                    &format!(
                        "Jenis grafik distribusi {} - {} (column/pie)",
                        table.column, sheet.name
                    ),
                    ChartKind::Column,
                    &[ChartKind::Column, ChartKind::Pie],
                );
                match charts::render_distribution_chart(&sheet.name, table, kind) {
                    Ok(artifact) => charts.push(artifact),
                    Err(e) => eprintln!("Chart error: {}", e),
                }
            }

            session.record(
                &sheet.name,
                incidents.summary,
                Some(incidents.filtered),
                charts,
            );
        }
    }
}

/// Prompt the date range and category inclusion filters, defaulting to the
/// full observed range and all observed values.
fn prompt_criteria(sheet: &Sheet) -> FilterCriteria {
    let mut criteria = FilterCriteria::default();

    if sheet.has_column(DATE_COLUMN) {
        if let Some((min, max)) = analysis::observed_date_range(sheet) {
            let start = read_line(&format!("Filter tanggal mulai (YYYY-MM-DD) [{}]: ", min));
            let end = read_line(&format!("Filter tanggal akhir (YYYY-MM-DD) [{}]: ", max));
            let start = util::parse_date_safe(&start).unwrap_or(min);
            let end = util::parse_date_safe(&end).unwrap_or(max);
            criteria.date_range = Some((start, end));
        }
    }

    for col in TRACKED_COLUMNS {
        if !sheet.has_column(col) {
            continue;
        }
        let options = analysis::observed_values(sheet, col);
        if options.is_empty() {
            continue;
        }
        println!("Nilai {}: {}", col, options.join(", "));
        let input = read_line(&format!("Filter {} (comma separated) [all]: ", col));
        if !input.is_empty() {
            let set = input
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            criteria.included.push((col.to_string(), set));
        }
    }
    criteria
}

fn prompt_chart_kind(prompt: &str, default: ChartKind, allowed: &[ChartKind]) -> ChartKind {
    let input = read_line(&format!("{} [{}]: ", prompt, default.as_str()));
    match ChartKind::parse(&input) {
        Some(kind) if allowed.contains(&kind) => kind,
        _ => default,
    }
}

/// Handle option [3]: export the PDF, the spreadsheet, and the JSON session
/// summary. Blocked with a warning while nothing has been analyzed yet.
fn handle_export(session: &ReportState) {
    if session.is_empty() {
        println!("Warning: no analysis recorded yet. Analyze a sheet first.\n");
        return;
    }

    println!("Generating reports...");
    match pdf::render(session) {
        Ok(bytes) => {
            let file = "laporan_hse.pdf";
            match output::write_bytes(file, &bytes) {
                Ok(()) => println!("PDF report exported to {}", file),
                Err(e) => eprintln!("Write error: {}", e),
            }
        }
        Err(e) => eprintln!("PDF export error: {}", e),
    }
    match excel::render(session) {
        Ok(bytes) => {
            let file = "laporan_hse.xlsx";
            match output::write_bytes(file, &bytes) {
                Ok(()) => println!("Spreadsheet report exported to {}", file),
                Err(e) => eprintln!("Write error: {}", e),
            }
        }
        Err(e) => eprintln!("Spreadsheet export error: {}", e),
    }
    let summary = session.session_summary();
    if let Err(e) = output::write_json("laporan_hse_summary.json", &summary) {
        eprintln!("Write error: {}", e);
    }
    println!(
        "Session: {} sheets analyzed, {} filtered rows, {} charts.\n",
        summary.sheets_analyzed,
        util::format_int(summary.total_filtered_rows as i64),
        summary.charts_rendered
    );
}

fn main() {
    let mut session: Option<ReportState> = None;
    loop {
        println!("HSE Monitoring Report");
        println!("[1] Load workbook");
        println!("[2] Analyze sheet");
        println!("[3] Export reports");
        println!("[4] Exit\n");
        match read_choice().as_str() {
            "1" => {
                if let Some(state) = handle_load() {
                    session = Some(state);
                }
            }
            "2" => match session.as_mut() {
                Some(state) => handle_analyze(state),
                None => println!("Error: No workbook loaded. Please load one first (option 1).\n"),
            },
            "3" => {
                println!();
                match session.as_ref() {
                    Some(state) => {
                        handle_export(state);
                        if !state.is_empty() && !prompt_back_to_menu() {
                            println!("Exiting the program.");
                            break;
                        }
                    }
                    None => {
                        println!("Error: No workbook loaded. Please load one first (option 1).\n")
                    }
                }
            }
            "4" => {
                println!("Exiting the program.");
                break;
            }
            _ => {
                println!("Invalid choice. Please enter 1-4.\n");
            }
        }
    }
}
