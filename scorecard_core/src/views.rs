//! Shapes handed to the display layer: headline counts, chart series and
//! column-oriented tables.

use std::collections::HashSet;

use crate::config::*;
use crate::scoring::{mean_by_group, mean_of};

/// Headline figures for a table.
#[derive(PartialEq, Debug, Clone)]
pub struct Summary {
    pub records: usize,
    pub providers: usize,
    pub provinces: usize,
    pub guilds: usize,
    /// None if no record has a final score.
    pub mean_final_score: Option<f64>,
    /// None if no weights are given or no record can be scored.
    pub mean_composite: Option<f64>,
}

fn distinct(table: &CanonicalTable, field: GroupField) -> usize {
    table
        .iter()
        .filter_map(|r| r.label(field).map(|l| l.key()))
        .collect::<HashSet<&str>>()
        .len()
}

pub fn summarize(
    table: &CanonicalTable,
    weights: Option<&Weights>,
) -> Result<Summary, ScorecardError> {
    if table.is_empty() {
        return Err(ScorecardError::EmptyResult {
            operation: "summary".to_string(),
        });
    }
    let mean_composite = match weights {
        Some(w) if !w.is_empty() => mean_of(table, &Metric::Composite(w.clone())).ok(),
        _ => None,
    };
    Ok(Summary {
        records: table.len(),
        providers: distinct(table, GroupField::Provider),
        provinces: distinct(table, GroupField::Province),
        guilds: distinct(table, GroupField::Guild),
        mean_final_score: mean_of(table, &Metric::Field(NumericField::FinalScore)).ok(),
        mean_composite,
    })
}

/// (category, value) pairs for a bar chart: the mean of a metric per group value.
pub fn bar_series(
    table: &CanonicalTable,
    group: GroupField,
    metric: NumericField,
) -> Result<Vec<(String, f64)>, ScorecardError> {
    let agg = mean_by_group(table, GroupKeys::One(group), &[metric])?;
    Ok(agg
        .groups
        .iter()
        .filter_map(|g| g.means[0].map(|m| (g.key[0].display().to_string(), m)))
        .collect())
}

/// (metric, value) pairs describing one record, for a radial chart.
pub fn profile_series(record: &CanonicalRecord, metrics: &[NumericField]) -> Vec<(String, f64)> {
    metrics
        .iter()
        .filter_map(|m| {
            record
                .value(*m)
                .map(|v| (m.field().display_name().to_string(), v))
        })
        .collect()
}

#[derive(PartialEq, Debug, Clone)]
pub struct ScatterPoint {
    pub x: f64,
    pub y: f64,
    pub category: String,
    pub provider: String,
}

/// One point per record that has both metrics and a category.
pub fn scatter_series(
    table: &CanonicalTable,
    x: NumericField,
    y: NumericField,
    category: GroupField,
) -> Vec<ScatterPoint> {
    table
        .iter()
        .filter_map(|r| match (r.value(x), r.value(y), r.label(category)) {
            (Some(x), Some(y), Some(c)) => Some(ScatterPoint {
                x,
                y,
                category: c.display().to_string(),
                provider: r.provider.display().to_string(),
            }),
            _ => None,
        })
        .collect()
}

#[derive(PartialEq, Debug, Clone)]
pub enum ColumnValues {
    Text(Vec<Option<String>>),
    Numeric(Vec<Option<f64>>),
}

#[derive(PartialEq, Debug, Clone)]
pub struct Column {
    pub name: String,
    pub values: ColumnValues,
}

pub const COMPOSITE_COLUMN: &str = "CompositeScore";

/// The table as columns, with the display names of the canonical fields.
///
/// A composite score column is appended when weights are given.
pub fn table_columns(table: &CanonicalTable, weights: Option<&Weights>) -> Vec<Column> {
    let mut res: Vec<Column> = Vec::new();
    for field in GroupField::ALL.iter() {
        res.push(Column {
            name: field.field().display_name().to_string(),
            values: ColumnValues::Text(
                table
                    .iter()
                    .map(|r| r.label(*field).map(|l| l.display().to_string()))
                    .collect(),
            ),
        });
    }
    for field in NumericField::ALL.iter() {
        res.push(Column {
            name: field.field().display_name().to_string(),
            values: ColumnValues::Numeric(table.iter().map(|r| r.value(*field)).collect()),
        });
    }
    if let Some(w) = weights.filter(|w| !w.is_empty()) {
        let metric = Metric::Composite(w.clone());
        res.push(Column {
            name: COMPOSITE_COLUMN.to_string(),
            values: ColumnValues::Numeric(table.iter().map(|r| metric.value(r)).collect()),
        });
    }
    res
}

/// The same content as `table_columns`, row by row and as text, for file export.
pub fn export_rows(
    table: &CanonicalTable,
    weights: Option<&Weights>,
) -> (Vec<String>, Vec<Vec<String>>) {
    let columns = table_columns(table, weights);
    let header: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
    let rows: Vec<Vec<String>> = (0..table.len())
        .map(|idx| {
            columns
                .iter()
                .map(|c| match &c.values {
                    ColumnValues::Text(v) => v[idx].clone().unwrap_or_default(),
                    ColumnValues::Numeric(v) => v[idx].map(|x| x.to_string()).unwrap_or_default(),
                })
                .collect()
        })
        .collect();
    (header, rows)
}
