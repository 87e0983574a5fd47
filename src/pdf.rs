//! PDF exporter: serializes the aggregated summaries, trend tables, and
//! chart images into one paginated A4 document, one section per sheet.

use crate::state::ReportState;
use crate::types::TrendTable;
use anyhow::{Context, Result};
use printpdf::{
    BuiltinFont, Color, Image, ImageTransform, IndirectFontRef, Line, Mm, PdfDocument,
    PdfDocumentReference, PdfLayerReference, Point, Rgb,
};
use std::io::BufWriter;

const PAGE_WIDTH: f64 = 210.0;
const PAGE_HEIGHT: f64 = 297.0;
const MARGIN: f64 = 20.0;

// Charts embed at a fixed display size regardless of their pixel size.
const CHART_DISPLAY_WIDTH: f64 = 141.0;

const TABLE_COL_WIDTH: f64 = 40.0;
const TABLE_ROW_HEIGHT: f64 = 7.0;

struct PdfWriter {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    font: IndirectFontRef,
    bold: IndirectFontRef,
    y: f64,
}

impl PdfWriter {
    fn new(title: &str) -> Result<Self> {
        let (doc, page, layer) = PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        let font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .context("failed to register base font")?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .context("failed to register bold font")?;
        let layer = doc.get_page(page).get_layer(layer);
        Ok(PdfWriter {
            doc,
            layer,
            font,
            bold,
            y: PAGE_HEIGHT - MARGIN,
        })
    }

    /// Start a new page when fewer than `needed` millimeters remain.
    fn ensure_space(&mut self, needed: f64) {
        if self.y - needed < MARGIN {
            let (page, layer) = self.doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = PAGE_HEIGHT - MARGIN;
        }
    }

    fn text_line(&mut self, text: &str, size: f64, bold: bool) {
        self.ensure_space(size * 0.6);
        let font = if bold { &self.bold } else { &self.font };
        self.layer
            .use_text(text, size, Mm(MARGIN), Mm(self.y), font);
        self.y -= size * 0.55;
    }

    fn spacer(&mut self, mm: f64) {
        self.y -= mm;
    }

    fn set_fill(&self, r: f64, g: f64, b: f64) {
        self.layer
            .set_fill_color(Color::Rgb(Rgb::new(r, g, b, None)));
    }

    fn rect(&self, x: f64, y: f64, w: f64, h: f64, filled: bool) {
        let shape = Line {
            points: vec![
                (Point::new(Mm(x), Mm(y)), false),
                (Point::new(Mm(x + w), Mm(y)), false),
                (Point::new(Mm(x + w), Mm(y - h)), false),
                (Point::new(Mm(x), Mm(y - h)), false),
            ],
            is_closed: true,
            has_fill: filled,
            has_stroke: true,
            is_clipping_path: false,
        };
        self.layer.add_shape(shape);
    }

    /// Bordered two-column table with a styled header row, one row per month.
    fn trend_table(&mut self, trend: &TrendTable) {
        let total_height = TABLE_ROW_HEIGHT * (trend.rows.len() + 1) as f64;
        self.ensure_space(total_height + 4.0);
        self.layer.set_outline_thickness(0.5);

        // Header row: grey background, near-white text.
        self.set_fill(0.5, 0.5, 0.5);
        self.rect(MARGIN, self.y, TABLE_COL_WIDTH, TABLE_ROW_HEIGHT, true);
        self.rect(
            MARGIN + TABLE_COL_WIDTH,
            self.y,
            TABLE_COL_WIDTH,
            TABLE_ROW_HEIGHT,
            true,
        );
        self.set_fill(0.96, 0.96, 0.96);
        self.layer.use_text(
            "Tanggal",
            10.0,
            Mm(MARGIN + 2.0),
            Mm(self.y - TABLE_ROW_HEIGHT + 2.0),
            &self.bold,
        );
        self.layer.use_text(
            "Jumlah",
            10.0,
            Mm(MARGIN + TABLE_COL_WIDTH + 2.0),
            Mm(self.y - TABLE_ROW_HEIGHT + 2.0),
            &self.bold,
        );
        self.y -= TABLE_ROW_HEIGHT;

        self.set_fill(0.0, 0.0, 0.0);
        for (month, count) in &trend.rows {
            self.rect(MARGIN, self.y, TABLE_COL_WIDTH, TABLE_ROW_HEIGHT, false);
            self.rect(
                MARGIN + TABLE_COL_WIDTH,
                self.y,
                TABLE_COL_WIDTH,
                TABLE_ROW_HEIGHT,
                false,
            );
            self.layer.use_text(
                month,
                10.0,
                Mm(MARGIN + 2.0),
                Mm(self.y - TABLE_ROW_HEIGHT + 2.0),
                &self.font,
            );
            self.layer.use_text(
                count.to_string(),
                10.0,
                Mm(MARGIN + TABLE_COL_WIDTH + 2.0),
                Mm(self.y - TABLE_ROW_HEIGHT + 2.0),
                &self.font,
            );
            self.y -= TABLE_ROW_HEIGHT;
        }
        self.spacer(4.0);
    }

    fn chart_image(&mut self, png: &[u8]) -> Result<()> {
        let decoded = image::load_from_memory(png).context("failed to decode chart image")?;
        let px_width = decoded.width() as f64;
        let px_height = decoded.height() as f64;
        // Pick a dpi that maps the pixel width onto the fixed display width.
        let dpi = px_width * 25.4 / CHART_DISPLAY_WIDTH;
        let display_height = px_height * 25.4 / dpi;

        self.ensure_space(display_height + 6.0);
        let pdf_image = Image::from_dynamic_image(&decoded);
        pdf_image.add_to_layer(
            self.layer.clone(),
            ImageTransform {
                translate_x: Some(Mm(MARGIN)),
                translate_y: Some(Mm(self.y - display_height)),
                dpi: Some(dpi),
                ..Default::default()
            },
        );
        self.y -= display_height + 6.0;
        Ok(())
    }

    fn finish(self) -> Result<Vec<u8>> {
        let mut buffer = BufWriter::new(Vec::new());
        self.doc
            .save(&mut buffer)
            .context("failed to serialize PDF report")?;
        let bytes = buffer
            .into_inner()
            .context("failed to flush PDF buffer")?;
        Ok(bytes)
    }
}

/// Render the session's recorded sheets into one document. Sheets whose
/// record holds nothing (no scalars, no trend, no charts) are skipped.
pub fn render(state: &ReportState) -> Result<Vec<u8>> {
    let mut writer = PdfWriter::new("Laporan HSE")?;
    writer.text_line("Laporan HSE", 20.0, true);
    writer.spacer(6.0);

    for (sheet, record) in state.recorded() {
        let empty = record.summary.scalars.is_empty()
            && record.summary.trend.is_none()
            && record.charts.is_empty();
        if empty {
            continue;
        }

        writer.ensure_space(20.0);
        writer.text_line(sheet, 14.0, true);
        writer.spacer(2.0);

        // Scalar entries as line items; the trend table is rendered once
        // below, never as a line item.
        for (label, value) in &record.summary.scalars {
            writer.text_line(&format!("- {}: {}", label, value), 11.0, false);
        }
        writer.spacer(3.0);

        if let Some(trend) = &record.summary.trend {
            if !trend.rows.is_empty() {
                writer.trend_table(trend);
            }
        }

        for artifact in &record.charts {
            if artifact.sheet == sheet {
                writer.chart_image(&artifact.png)?;
            }
        }
        writer.spacer(4.0);
    }

    writer.ensure_space(20.0);
    writer.spacer(10.0);
    let attribution = "(c) 2025 HSE Monitoring";
    // Rough centering for the single attribution line.
    let x = (PAGE_WIDTH - attribution.len() as f64 * 1.9) / 2.0;
    writer
        .layer
        .use_text(attribution, 10.0, Mm(x), Mm(writer.y), &writer.font);

    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ScalarValue, Summary, Workbook};

    fn state_with(trend: Option<TrendTable>) -> ReportState {
        let mut state = ReportState::new(Workbook { sheets: vec![] });
        let summary = Summary {
            scalars: vec![(
                "Status dominan".to_string(),
                ScalarValue::Text("Open".to_string()),
            )],
            trend,
        };
        state.record("Incidents", summary, None, vec![]);
        state
    }

    #[test]
    fn renders_pdf_bytes() {
        let bytes = render(&state_with(None)).unwrap();
        assert_eq!(&bytes[..5], b"%PDF-");
    }

    #[test]
    fn trend_table_adds_content() {
        let without = render(&state_with(None)).unwrap();
        let with = render(&state_with(Some(TrendTable {
            rows: vec![("2025-01".to_string(), 2), ("2025-02".to_string(), 1)],
        })))
        .unwrap();
        assert!(with.len() > without.len());
    }

    #[test]
    fn empty_records_are_skipped() {
        let mut state = ReportState::new(Workbook { sheets: vec![] });
        state.record("Kosong", Summary::default(), None, vec![]);
        let bytes = render(&state).unwrap();
        assert_eq!(&bytes[..5], b"%PDF-");
    }

    #[test]
    fn embeds_chart_artifacts() {
        use crate::charts;
        use crate::types::ChartKind;

        let mut state = ReportState::new(Workbook { sheets: vec![] });
        let trend = TrendTable {
            rows: vec![("2025-01".to_string(), 3)],
        };
        let artifact =
            charts::render_trend_chart("Incidents", &trend, ChartKind::Line).unwrap();
        let summary = Summary {
            scalars: vec![],
            trend: Some(trend),
        };
        state.record("Incidents", summary, None, vec![artifact]);

        let bytes = render(&state).unwrap();
        assert_eq!(&bytes[..5], b"%PDF-");
        // The embedded image dominates the document size.
        assert!(bytes.len() > 5_000);
    }
}
