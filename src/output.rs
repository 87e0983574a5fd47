use crate::types::{FrequencyTable, RiskMatrix, Summary, SummaryRow};
use anyhow::{Context, Result};
use serde::Serialize;
use tabled::{builder::Builder, settings::Style, Table, Tabled};

pub fn write_json<T: Serialize>(path: &str, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s).with_context(|| format!("failed to write {}", path))?;
    Ok(())
}

pub fn write_bytes(path: &str, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes).with_context(|| format!("failed to write {}", path))?;
    Ok(())
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().cloned().take(max_rows).collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}

/// Print the scalar part of a sheet summary as an Item/Nilai table.
pub fn preview_summary(summary: &Summary) {
    let rows: Vec<SummaryRow> = summary
        .scalars
        .iter()
        .map(|(item, value)| SummaryRow {
            item: item.clone(),
            nilai: value.to_string(),
        })
        .collect();
    preview_table_rows(&rows, rows.len().max(1));
}

pub fn preview_frequency(table: &FrequencyTable) {
    if table.rows.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let mut builder = Builder::default();
    builder.push_record([table.column.as_str(), "Jumlah"]);
    for (label, count) in &table.rows {
        builder.push_record([label.clone(), count.to_string()]);
    }
    println!("{}\n", builder.build().with(Style::markdown()));
}

/// Console rendering of the risk matrix: Severity as columns, Likelihood as
/// rows, matching the heat-map orientation.
pub fn preview_matrix(matrix: &RiskMatrix) {
    if matrix.likelihood.is_empty() || matrix.severity.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let mut builder = Builder::default();
    let mut header = vec!["Likelihood \\ Severity".to_string()];
    header.extend(matrix.severity.iter().map(|s| s.to_string()));
    builder.push_record(header);
    for (li, l) in matrix.likelihood.iter().enumerate() {
        let mut row = vec![l.to_string()];
        row.extend(matrix.counts[li].iter().map(|c| c.to_string()));
        builder.push_record(row);
    }
    println!("{}\n", builder.build().with(Style::markdown()));
}
