//! Pure aggregation over loaded sheets: classification, the risk matrix,
//! and incident trend/distribution summaries. No rendering happens here so
//! the numbers can be tested without any chart or export dependency.

use crate::types::{
    FilterCriteria, FrequencyTable, RiskMatrix, ScalarValue, Sheet, SheetKind, Summary, TrendTable,
    DATE_COLUMN, LIKELIHOOD_COLUMN, SEVERITY_COLUMN, TRACKED_COLUMNS,
};
use crate::util::{cell_as_date, cell_as_int, cell_to_label};
use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;

/// Route a sheet to its analysis mode. Pure and total: a sheet with both
/// Likelihood and Severity columns is a risk assessment, everything else is
/// incident tracking.
pub fn classify(sheet: &Sheet) -> SheetKind {
    if sheet.has_column(LIKELIHOOD_COLUMN) && sheet.has_column(SEVERITY_COLUMN) {
        SheetKind::RiskAssessment
    } else {
        SheetKind::IncidentTracking
    }
}

/// Outcome of analyzing one sheet. `Empty` is the warning marker for a sheet
/// with no data rows: it contributes nothing to either exporter.
#[derive(Debug, Clone)]
pub enum SheetAnalysis {
    Empty,
    Risk(RiskAnalysis),
    Incidents(IncidentAnalysis),
}

#[derive(Debug, Clone)]
pub struct RiskAnalysis {
    /// Mean over rows with numeric Likelihood and Severity only.
    pub mean_rating: f64,
    pub max_rating: i64,
    pub rated_rows: usize,
    pub matrix: RiskMatrix,
    pub summary: Summary,
}

#[derive(Debug, Clone)]
pub struct IncidentAnalysis {
    /// The derived view after date-range and inclusion filters.
    pub filtered: Sheet,
    pub summary: Summary,
    pub distributions: Vec<FrequencyTable>,
}

/// Analyze one sheet under the given filter criteria. Classification happens
/// once here; downstream steps are gated on column presence only.
pub fn analyze_sheet(sheet: &Sheet, criteria: &FilterCriteria) -> SheetAnalysis {
    if sheet.is_empty() {
        return SheetAnalysis::Empty;
    }
    match classify(sheet) {
        SheetKind::RiskAssessment => SheetAnalysis::Risk(analyze_risk(sheet)),
        SheetKind::IncidentTracking => SheetAnalysis::Incidents(analyze_incidents(sheet, criteria)),
    }
}

/// Risk-assessment analysis: `RiskRating = Likelihood × Severity` per row,
/// aggregate statistics, and the observed-domain frequency matrix.
pub fn analyze_risk(sheet: &Sheet) -> RiskAnalysis {
    let li = sheet.column_index(LIKELIHOOD_COLUMN);
    let si = sheet.column_index(SEVERITY_COLUMN);

    let mut pairs: Vec<(i64, i64)> = Vec::new();
    if let (Some(li), Some(si)) = (li, si) {
        for row in &sheet.rows {
            // Non-numeric values propagate as missing, never as zero.
            let l = row.get(li).and_then(cell_as_int);
            let s = row.get(si).and_then(cell_as_int);
            if let (Some(l), Some(s)) = (l, s) {
                pairs.push((l, s));
            }
        }
    }

    let ratings: Vec<i64> = pairs.iter().map(|(l, s)| l * s).collect();
    let mean_rating = if ratings.is_empty() {
        0.0
    } else {
        ratings.iter().sum::<i64>() as f64 / ratings.len() as f64
    };
    let max_rating = ratings.iter().copied().max().unwrap_or(0);
    let matrix = build_matrix(&pairs);

    let summary = Summary {
        scalars: vec![
            (
                "Rata-rata Risk Rating".to_string(),
                ScalarValue::Number(mean_rating),
            ),
            (
                "Risk Rating tertinggi".to_string(),
                ScalarValue::Count(max_rating.max(0) as u64),
            ),
        ],
        trend: None,
    };

    RiskAnalysis {
        mean_rating,
        max_rating,
        rated_rows: pairs.len(),
        matrix,
        summary,
    }
}

fn build_matrix(pairs: &[(i64, i64)]) -> RiskMatrix {
    // Axis domains are the observed distinct values, not a fixed 1-5 grid.
    let mut likelihood: Vec<i64> = pairs.iter().map(|(l, _)| *l).collect();
    likelihood.sort_unstable();
    likelihood.dedup();
    let mut severity: Vec<i64> = pairs.iter().map(|(_, s)| *s).collect();
    severity.sort_unstable();
    severity.dedup();

    let mut counts = vec![vec![0u64; severity.len()]; likelihood.len()];
    for (l, s) in pairs {
        let li = likelihood.iter().position(|v| v == l).unwrap_or(0);
        let si = severity.iter().position(|v| v == s).unwrap_or(0);
        counts[li][si] += 1;
    }

    RiskMatrix {
        likelihood,
        severity,
        counts,
    }
}

/// Incident-tracking analysis: filter, then recompute dominant values, the
/// monthly trend, and per-column distributions on the filtered view. Zero
/// matching rows yield empty aggregates rather than an error.
pub fn analyze_incidents(sheet: &Sheet, criteria: &FilterCriteria) -> IncidentAnalysis {
    let filtered = apply_filters(sheet, criteria);

    let mut scalars = Vec::new();
    for col in TRACKED_COLUMNS {
        if !filtered.has_column(col) {
            continue;
        }
        if let Some(value) = mode(&filtered, col) {
            scalars.push((dominant_label(col), ScalarValue::Text(value)));
        }
    }

    let trend = if filtered.has_column(DATE_COLUMN) {
        Some(monthly_trend(&filtered))
    } else {
        None
    };

    let distributions = TRACKED_COLUMNS
        .iter()
        .filter(|col| filtered.has_column(col))
        .map(|col| frequency_table(&filtered, col))
        .collect();

    IncidentAnalysis {
        filtered,
        summary: Summary { scalars, trend },
        distributions,
    }
}

/// Apply the date range and category inclusion filters, producing a derived
/// view. The underlying sheet is never mutated, and applying the same
/// criteria to an already-filtered view is a no-op.
pub fn apply_filters(sheet: &Sheet, criteria: &FilterCriteria) -> Sheet {
    let date_idx = sheet.column_index(DATE_COLUMN);

    let rows = sheet
        .rows
        .iter()
        .filter(|row| {
            if let (Some((start, end)), Some(di)) = (criteria.date_range, date_idx) {
                // Rows whose date is missing are dropped by the date filter.
                match row.get(di).and_then(cell_as_date) {
                    Some(d) => {
                        if d < start || d > end {
                            return false;
                        }
                    }
                    None => return false,
                }
            }
            for col in TRACKED_COLUMNS {
                let Some(ci) = sheet.column_index(col) else {
                    continue;
                };
                let Some(set) = criteria.inclusion(col) else {
                    continue;
                };
                if let Some(label) = row.get(ci).and_then(cell_to_label) {
                    if !set.contains(&label) {
                        return false;
                    }
                }
            }
            true
        })
        .cloned()
        .collect();

    Sheet {
        name: sheet.name.clone(),
        columns: sheet.columns.clone(),
        rows,
    }
}

/// Default criteria for a sheet: the full observed date range and every
/// observed category value included.
pub fn default_criteria(sheet: &Sheet) -> FilterCriteria {
    let mut criteria = FilterCriteria {
        date_range: observed_date_range(sheet),
        included: Vec::new(),
    };
    for col in TRACKED_COLUMNS {
        if sheet.has_column(col) {
            let set = observed_values(sheet, col).into_iter().collect();
            criteria.included.push((col.to_string(), set));
        }
    }
    criteria
}

/// Distinct values of a column in first-occurrence order.
pub fn observed_values(sheet: &Sheet, column: &str) -> Vec<String> {
    let Some(ci) = sheet.column_index(column) else {
        return Vec::new();
    };
    let mut values: Vec<String> = Vec::new();
    for row in &sheet.rows {
        if let Some(label) = row.get(ci).and_then(cell_to_label) {
            if !values.contains(&label) {
                values.push(label);
            }
        }
    }
    values
}

pub fn observed_date_range(sheet: &Sheet) -> Option<(NaiveDate, NaiveDate)> {
    let di = sheet.column_index(DATE_COLUMN)?;
    let mut dates = sheet
        .rows
        .iter()
        .filter_map(|row| row.get(di).and_then(cell_as_date));
    let first = dates.next()?;
    let (min, max) = dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d)));
    Some((min, max))
}

/// Most frequent value of a column; ties resolved by first occurrence in the
/// filtered row order. `None` when the column holds no values.
fn mode(sheet: &Sheet, column: &str) -> Option<String> {
    let counts = counted_labels(sheet, column);
    // max_by_key would return the last maximum; a strict comparison keeps
    // the first-encountered value on ties.
    let mut best: Option<(&String, u64)> = None;
    for (label, n) in &counts {
        if best.map_or(true, |(_, bn)| *n > bn) {
            best = Some((label, *n));
        }
    }
    best.map(|(label, _)| label.clone())
}

/// Value → count in descending count order, ties by first occurrence.
pub fn frequency_table(sheet: &Sheet, column: &str) -> FrequencyTable {
    let mut rows = counted_labels(sheet, column);
    rows.sort_by(|a, b| b.1.cmp(&a.1));
    FrequencyTable {
        column: column.to_string(),
        rows,
    }
}

fn counted_labels(sheet: &Sheet, column: &str) -> Vec<(String, u64)> {
    let Some(ci) = sheet.column_index(column) else {
        return Vec::new();
    };
    let mut counts: Vec<(String, u64)> = Vec::new();
    for row in &sheet.rows {
        if let Some(label) = row.get(ci).and_then(cell_to_label) {
            match counts.iter_mut().find(|(l, _)| *l == label) {
                Some((_, n)) => *n += 1,
                None => counts.push((label, 1)),
            }
        }
    }
    counts
}

/// Count of rows per calendar month, keyed "YYYY-MM" ascending. Rows without
/// a parseable date do not contribute.
fn monthly_trend(sheet: &Sheet) -> TrendTable {
    let Some(di) = sheet.column_index(DATE_COLUMN) else {
        return TrendTable::default();
    };
    let mut buckets: BTreeMap<String, u64> = BTreeMap::new();
    for row in &sheet.rows {
        if let Some(d) = row.get(di).and_then(cell_as_date) {
            let key = format!("{:04}-{:02}", d.year(), d.month());
            *buckets.entry(key).or_insert(0) += 1;
        }
    }
    TrendTable {
        rows: buckets.into_iter().collect(),
    }
}

fn dominant_label(column: &str) -> String {
    match column {
        "Jenis" => "Jenis terbanyak".to_string(),
        other => format!("{} dominan", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CellValue as V;

    fn text(s: &str) -> V {
        V::Text(s.to_string())
    }

    fn date(y: i32, m: u32, d: u32) -> V {
        V::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    fn risk_sheet() -> Sheet {
        Sheet {
            name: "HIRADC".to_string(),
            columns: vec![
                "Hazard".to_string(),
                "Likelihood".to_string(),
                "Severity".to_string(),
            ],
            rows: vec![
                vec![text("Noise"), V::Number(3.0), V::Number(4.0)],
                vec![text("Fall"), V::Number(3.0), V::Number(4.0)],
                vec![text("Fire"), V::Number(5.0), V::Number(2.0)],
                vec![text("Dust"), text("unknown"), V::Number(1.0)],
            ],
        }
    }

    fn incident_sheet() -> Sheet {
        Sheet {
            name: "Incidents".to_string(),
            columns: vec![
                "Tanggal".to_string(),
                "Jenis".to_string(),
                "Status".to_string(),
            ],
            rows: vec![
                vec![date(2025, 1, 10), text("Near Miss"), text("Open")],
                vec![date(2025, 1, 20), text("Near Miss"), text("Closed")],
                vec![date(2025, 2, 5), text("First Aid"), text("Open")],
                vec![V::Empty, text("First Aid"), text("Open")],
            ],
        }
    }

    #[test]
    fn classifier_requires_both_risk_columns() {
        assert_eq!(classify(&risk_sheet()), SheetKind::RiskAssessment);
        assert_eq!(classify(&incident_sheet()), SheetKind::IncidentTracking);

        let mut only_severity = incident_sheet();
        only_severity.columns.push("Severity".to_string());
        for row in &mut only_severity.rows {
            row.push(V::Number(2.0));
        }
        assert_eq!(classify(&only_severity), SheetKind::IncidentTracking);
    }

    #[test]
    fn risk_ratings_exclude_missing_rows() {
        let analysis = analyze_risk(&risk_sheet());
        // Ratings: 12, 12, 10; the non-numeric Likelihood row is excluded.
        assert_eq!(analysis.rated_rows, 3);
        assert!((analysis.mean_rating - 34.0 / 3.0).abs() < 1e-9);
        assert_eq!(analysis.max_rating, 12);
    }

    #[test]
    fn risk_matrix_counts_and_marginals() {
        let analysis = analyze_risk(&risk_sheet());
        let m = &analysis.matrix;
        assert_eq!(m.likelihood, vec![3, 5]);
        assert_eq!(m.severity, vec![2, 4]);
        assert_eq!(m.count(3, 4), 2);
        assert_eq!(m.count(5, 2), 1);
        assert_eq!(m.count(5, 4), 0);
        assert_eq!(m.row_total(3), 2);
        assert_eq!(m.row_total(5), 1);
        assert_eq!(m.column_total(4), 2);
        assert_eq!(m.column_total(2), 1);
    }

    #[test]
    fn empty_sheet_yields_warning_marker() {
        let sheet = Sheet {
            name: "Kosong".to_string(),
            columns: vec!["Likelihood".to_string(), "Severity".to_string()],
            rows: vec![],
        };
        assert!(matches!(
            analyze_sheet(&sheet, &FilterCriteria::default()),
            SheetAnalysis::Empty
        ));
    }

    #[test]
    fn trend_counts_sum_to_dated_rows() {
        let sheet = incident_sheet();
        let analysis = analyze_incidents(&sheet, &FilterCriteria::default());
        let trend = analysis.summary.trend.as_ref().unwrap();
        assert_eq!(
            trend.rows,
            vec![("2025-01".to_string(), 2), ("2025-02".to_string(), 1)]
        );
        // The row with a missing date is still in the unfiltered view but
        // contributes no month bucket.
        assert_eq!(trend.total(), 3);
        assert_eq!(analysis.filtered.rows.len(), 4);
    }

    #[test]
    fn date_filter_drops_missing_dates_and_is_idempotent() {
        let sheet = incident_sheet();
        let criteria = FilterCriteria {
            date_range: Some((
                NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
            )),
            included: Vec::new(),
        };
        let once = apply_filters(&sheet, &criteria);
        assert_eq!(once.rows.len(), 2);
        let twice = apply_filters(&once, &criteria);
        assert_eq!(twice.rows, once.rows);
    }

    #[test]
    fn inclusion_filter_keeps_selected_categories() {
        let sheet = incident_sheet();
        let criteria = FilterCriteria {
            date_range: None,
            included: vec![(
                "Status".to_string(),
                ["Open".to_string()].into_iter().collect(),
            )],
        };
        let view = apply_filters(&sheet, &criteria);
        assert_eq!(view.rows.len(), 3);
        let analysis = analyze_incidents(&sheet, &criteria);
        let status = analysis
            .distributions
            .iter()
            .find(|t| t.column == "Status")
            .unwrap();
        assert_eq!(status.rows, vec![("Open".to_string(), 3)]);
    }

    #[test]
    fn mode_prefers_first_encountered_on_ties() {
        let sheet = Sheet {
            name: "T".to_string(),
            columns: vec!["Jenis".to_string()],
            rows: vec![
                vec![text("A")],
                vec![text("A")],
                vec![text("B")],
            ],
        };
        let analysis = analyze_incidents(&sheet, &FilterCriteria::default());
        assert_eq!(
            analysis.summary.scalars[0],
            (
                "Jenis terbanyak".to_string(),
                ScalarValue::Text("A".to_string())
            )
        );

        // Tie between B and A resolves to the first one seen.
        let tied = Sheet {
            name: "T".to_string(),
            columns: vec!["Jenis".to_string()],
            rows: vec![vec![text("B")], vec![text("A")], vec![text("B")], vec![text("A")]],
        };
        let analysis = analyze_incidents(&tied, &FilterCriteria::default());
        assert_eq!(
            analysis.summary.scalars[0].1,
            ScalarValue::Text("B".to_string())
        );
    }

    #[test]
    fn frequency_sorts_by_count_then_first_occurrence() {
        let sheet = Sheet {
            name: "T".to_string(),
            columns: vec!["Status".to_string()],
            rows: vec![
                vec![text("Open")],
                vec![text("Closed")],
                vec![text("Closed")],
                vec![text("Hold")],
            ],
        };
        let analysis = analyze_incidents(&sheet, &FilterCriteria::default());
        let table = &analysis.distributions[0];
        assert_eq!(
            table.rows,
            vec![
                ("Closed".to_string(), 2),
                ("Open".to_string(), 1),
                ("Hold".to_string(), 1),
            ]
        );
        assert_eq!(table.total(), 4);
    }

    #[test]
    fn all_rows_filtered_out_still_yields_empty_aggregates() {
        let sheet = incident_sheet();
        let criteria = FilterCriteria {
            date_range: Some((
                NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2030, 12, 31).unwrap(),
            )),
            included: Vec::new(),
        };
        let analysis = analyze_incidents(&sheet, &criteria);
        assert!(analysis.filtered.rows.is_empty());
        assert!(analysis.summary.scalars.is_empty());
        assert_eq!(analysis.summary.trend, Some(TrendTable::default()));
        for table in &analysis.distributions {
            assert!(table.rows.is_empty());
        }
    }

    #[test]
    fn default_criteria_covers_observed_range_and_values() {
        let sheet = incident_sheet();
        let criteria = default_criteria(&sheet);
        assert_eq!(
            criteria.date_range,
            Some((
                NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
                NaiveDate::from_ymd_opt(2025, 2, 5).unwrap()
            ))
        );
        let jenis = criteria.inclusion("Jenis").unwrap();
        assert!(jenis.contains("Near Miss") && jenis.contains("First Aid"));
        // Applying the defaults drops only the row with no date.
        let view = apply_filters(&sheet, &criteria);
        assert_eq!(view.rows.len(), 3);
    }
}
