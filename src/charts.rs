//! Chart rendering: a frequency table or time series plus a chosen kind in,
//! PNG bytes out. Pure with respect to the analysis state, so aggregation
//! stays testable without touching a drawing backend.

use crate::types::{ChartArtifact, ChartKind, FrequencyTable, RiskMatrix, TrendTable};
use anyhow::{anyhow, Context, Result};
use image::{DynamicImage, ImageOutputFormat, RgbImage};
use plotters::prelude::*;
use std::io::Cursor;

const CHART_WIDTH: u32 = 800;
const CHART_HEIGHT: u32 = 500;

const PALETTE: [RGBColor; 8] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
    RGBColor(227, 119, 194),
    RGBColor(127, 127, 127),
];

/// Render the monthly trend of a sheet as a line or column chart.
pub fn render_trend_chart(sheet: &str, trend: &TrendTable, kind: ChartKind) -> Result<ChartArtifact> {
    let title = format!("Trend {} Perbulan", sheet);
    let labels: Vec<&str> = trend.rows.iter().map(|(m, _)| m.as_str()).collect();
    let counts: Vec<u64> = trend.rows.iter().map(|(_, n)| *n).collect();

    let png = render_series_png(&title, "Bulan", "Jumlah", &labels, &counts, kind)?;
    Ok(ChartArtifact {
        sheet: sheet.to_string(),
        category: "Trend".to_string(),
        kind,
        png,
    })
}

/// Render a categorical distribution as a column or pie chart.
pub fn render_distribution_chart(
    sheet: &str,
    table: &FrequencyTable,
    kind: ChartKind,
) -> Result<ChartArtifact> {
    let title = format!("Distribusi {} - {}", table.column, sheet);
    let labels: Vec<&str> = table.rows.iter().map(|(l, _)| l.as_str()).collect();
    let counts: Vec<u64> = table.rows.iter().map(|(_, n)| *n).collect();

    let png = match kind {
        ChartKind::Pie => render_pie_png(&title, &labels, &counts)?,
        _ => render_series_png(&title, &table.column, "Jumlah", &labels, &counts, kind)?,
    };
    Ok(ChartArtifact {
        sheet: sheet.to_string(),
        category: table.column.clone(),
        kind,
        png,
    })
}

/// Render the Likelihood × Severity matrix as an annotated heat map,
/// Severity on the x axis and Likelihood on the y axis.
pub fn render_risk_matrix_chart(sheet: &str, matrix: &RiskMatrix) -> Result<ChartArtifact> {
    let mut raw = vec![0u8; (CHART_WIDTH * CHART_HEIGHT * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut raw, (CHART_WIDTH, CHART_HEIGHT))
            .into_drawing_area();
        root.fill(&WHITE).map_err(|e| anyhow!("heat map fill: {}", e))?;

        let cols = matrix.severity.len().max(1);
        let rows = matrix.likelihood.len().max(1);
        let mut chart = ChartBuilder::on(&root)
            .caption("Risk Matrix (Likelihood vs Severity)", ("sans-serif", 24))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(40)
            .build_cartesian_2d(0f64..cols as f64, 0f64..rows as f64)
            .map_err(|e| anyhow!("heat map axes: {}", e))?;

        let severity = matrix.severity.clone();
        let likelihood = matrix.likelihood.clone();
        chart
            .configure_mesh()
            .disable_mesh()
            .x_desc("Severity")
            .y_desc("Likelihood")
            .x_labels(cols)
            .y_labels(rows)
            .x_label_formatter(&|x| axis_label(&severity, *x))
            .y_label_formatter(&|y| axis_label(&likelihood, *y))
            .draw()
            .map_err(|e| anyhow!("heat map mesh: {}", e))?;

        let max = matrix.max_count().max(1) as f64;
        chart
            .draw_series(matrix.counts.iter().enumerate().flat_map(|(li, row)| {
                row.iter().enumerate().map(move |(si, count)| {
                    let shade = RED.mix(*count as f64 / max);
                    Rectangle::new(
                        [(si as f64, li as f64), (si as f64 + 1.0, li as f64 + 1.0)],
                        shade.filled(),
                    )
                })
            }))
            .map_err(|e| anyhow!("heat map cells: {}", e))?;
        chart
            .draw_series(matrix.counts.iter().enumerate().flat_map(|(li, row)| {
                row.iter().enumerate().map(move |(si, count)| {
                    Text::new(
                        format!("{}", count),
                        (si as f64 + 0.5, li as f64 + 0.5),
                        ("sans-serif", 18),
                    )
                })
            }))
            .map_err(|e| anyhow!("heat map labels: {}", e))?;

        root.present().map_err(|e| anyhow!("heat map present: {}", e))?;
    }

    Ok(ChartArtifact {
        sheet: sheet.to_string(),
        category: "RiskMatrix".to_string(),
        kind: ChartKind::Column,
        png: encode_png(raw)?,
    })
}

fn axis_label(domain: &[i64], coord: f64) -> String {
    // Tick marks land on cell boundaries; label the cell below each tick.
    let idx = coord.floor() as usize;
    domain
        .get(idx)
        .map(|v| v.to_string())
        .unwrap_or_default()
}

fn render_series_png(
    title: &str,
    x_label: &str,
    y_label: &str,
    labels: &[&str],
    counts: &[u64],
    kind: ChartKind,
) -> Result<Vec<u8>> {
    let mut raw = vec![0u8; (CHART_WIDTH * CHART_HEIGHT * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut raw, (CHART_WIDTH, CHART_HEIGHT))
            .into_drawing_area();
        root.fill(&WHITE).map_err(|e| anyhow!("chart fill: {}", e))?;

        let n = labels.len().max(1);
        let max_y = counts.iter().copied().max().unwrap_or(0) + 1;
        let mut chart = ChartBuilder::on(&root)
            .caption(title, ("sans-serif", 24))
            .margin(10)
            .x_label_area_size(45)
            .y_label_area_size(45)
            .build_cartesian_2d(-0.5f64..n as f64 - 0.5, 0f64..max_y as f64)
            .map_err(|e| anyhow!("chart axes: {}", e))?;

        let owned: Vec<String> = labels.iter().map(|l| l.to_string()).collect();
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_desc(x_label)
            .y_desc(y_label)
            .x_labels(n)
            .x_label_formatter(&|x| {
                let idx = x.round();
                if idx < 0.0 {
                    return String::new();
                }
                owned.get(idx as usize).cloned().unwrap_or_default()
            })
            .draw()
            .map_err(|e| anyhow!("chart mesh: {}", e))?;

        match kind {
            ChartKind::Line => {
                chart
                    .draw_series(LineSeries::new(
                        counts.iter().enumerate().map(|(i, c)| (i as f64, *c as f64)),
                        &BLUE,
                    ))
                    .map_err(|e| anyhow!("line series: {}", e))?;
                chart
                    .draw_series(
                        counts
                            .iter()
                            .enumerate()
                            .map(|(i, c)| Circle::new((i as f64, *c as f64), 4, BLUE.filled())),
                    )
                    .map_err(|e| anyhow!("line markers: {}", e))?;
            }
            _ => {
                chart
                    .draw_series(counts.iter().enumerate().map(|(i, c)| {
                        Rectangle::new(
                            [(i as f64 - 0.4, 0.0), (i as f64 + 0.4, *c as f64)],
                            BLUE.filled(),
                        )
                    }))
                    .map_err(|e| anyhow!("bar series: {}", e))?;
            }
        }

        // Value labels above each point, matching the exported native charts.
        chart
            .draw_series(counts.iter().enumerate().map(|(i, c)| {
                Text::new(format!("{}", c), (i as f64, *c as f64), ("sans-serif", 16))
            }))
            .map_err(|e| anyhow!("value labels: {}", e))?;

        root.present().map_err(|e| anyhow!("chart present: {}", e))?;
    }
    encode_png(raw)
}

fn render_pie_png(title: &str, labels: &[&str], counts: &[u64]) -> Result<Vec<u8>> {
    let mut raw = vec![0u8; (CHART_WIDTH * CHART_HEIGHT * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut raw, (CHART_WIDTH, CHART_HEIGHT))
            .into_drawing_area();
        root.fill(&WHITE).map_err(|e| anyhow!("pie fill: {}", e))?;
        root.titled(title, ("sans-serif", 24))
            .map_err(|e| anyhow!("pie title: {}", e))?;

        if !counts.is_empty() {
            let sizes: Vec<f64> = counts.iter().map(|c| *c as f64).collect();
            let owned: Vec<String> = labels.iter().map(|l| l.to_string()).collect();
            let colors: Vec<RGBColor> = (0..sizes.len())
                .map(|i| PALETTE[i % PALETTE.len()])
                .collect();
            let center = (CHART_WIDTH as i32 / 2, CHART_HEIGHT as i32 / 2 + 15);
            let radius = (CHART_HEIGHT as f64 / 2.0) - 60.0;

            let mut pie = Pie::new(&center, &radius, &sizes, &colors, &owned);
            pie.label_style(("sans-serif", 18).into_font());
            pie.percentages(("sans-serif", 16).into_font());
            root.draw(&pie).map_err(|e| anyhow!("pie slices: {}", e))?;
        }

        root.present().map_err(|e| anyhow!("pie present: {}", e))?;
    }
    encode_png(raw)
}

fn encode_png(raw: Vec<u8>) -> Result<Vec<u8>> {
    let img = RgbImage::from_raw(CHART_WIDTH, CHART_HEIGHT, raw)
        .context("chart buffer has unexpected size")?;
    let mut png = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)
        .context("failed to encode chart as PNG")?;
    Ok(png)
}
