//! Weighted scores, rankings and group aggregates over a canonical table.
//!
//! None of these functions modify their input. All of them fail with
//! `ScorecardError::EmptyResult` when there is nothing to aggregate, rather
//! than returning degenerate statistics.

use log::debug;
use std::collections::HashMap;

use crate::config::*;

/// The weighted sum of the configured fields.
///
/// A record that is missing any of the weighted fields cannot be scored.
pub fn composite_score(record: &CanonicalRecord, weights: &Weights) -> Option<f64> {
    if weights.is_empty() {
        return None;
    }
    let mut total = 0.0;
    for (field, weight) in weights.entries() {
        total += weight * record.value(*field)?;
    }
    Some(total)
}

/// A record with the value it was ranked on.
#[derive(PartialEq, Debug, Clone)]
pub struct Ranked<'a> {
    pub record: &'a CanonicalRecord,
    pub value: f64,
}

/// The best record of a group.
#[derive(PartialEq, Debug, Clone)]
pub struct GroupBest<'a> {
    pub key: Vec<Label>,
    pub record: &'a CanonicalRecord,
    pub value: f64,
}

/// The mean of each metric for one group.
#[derive(PartialEq, Debug, Clone)]
pub struct GroupMean {
    pub key: Vec<Label>,
    /// Number of records in the group.
    pub records: usize,
    /// One entry per metric, in the order of `GroupedAggregate::metrics`.
    /// None if no record of the group has a value for that metric.
    pub means: Vec<Option<f64>>,
}

#[derive(PartialEq, Debug, Clone)]
pub struct GroupedAggregate {
    pub keys: GroupKeys,
    pub metrics: Vec<NumericField>,
    /// In order of first appearance in the table.
    pub groups: Vec<GroupMean>,
}

impl GroupedAggregate {
    /// The mean of a metric for the group with the given key values.
    pub fn mean(&self, key: &[&str], metric: NumericField) -> Option<f64> {
        let midx = self.metrics.iter().position(|m| *m == metric)?;
        let keys: Vec<String> = key.iter().map(|k| Label::key_of(k)).collect();
        self.groups
            .iter()
            .find(|g| g.key.iter().map(|l| l.key()).eq(keys.iter().map(|k| k.as_str())))
            .and_then(|g| g.means[midx])
    }

    /// The values of one grouping field, one per group.
    pub fn key_column(&self, position: usize) -> Vec<String> {
        self.groups
            .iter()
            .filter_map(|g| g.key.get(position).map(|l| l.display().to_string()))
            .collect()
    }

    /// The means of one metric, one per group.
    pub fn metric_column(&self, metric: NumericField) -> Vec<Option<f64>> {
        match self.metrics.iter().position(|m| *m == metric) {
            Some(midx) => self.groups.iter().map(|g| g.means[midx]).collect(),
            None => vec![None; self.groups.len()],
        }
    }
}

fn empty_result(operation: &str) -> ScorecardError {
    ScorecardError::EmptyResult {
        operation: operation.to_string(),
    }
}

/// Arithmetic mean of each metric for every combination of group values present in the table.
///
/// Missing values are left out of the mean. Records with a missing group value
/// are left out of the aggregate.
pub fn mean_by_group(
    table: &CanonicalTable,
    keys: GroupKeys,
    metrics: &[NumericField],
) -> Result<GroupedAggregate, ScorecardError> {
    if table.is_empty() {
        return Err(empty_result("mean_by_group"));
    }

    // (key, record count, (sum, count) per metric)
    let mut acc: Vec<(Vec<Label>, usize, Vec<(f64, usize)>)> = Vec::new();
    let mut positions: HashMap<Vec<Label>, usize> = HashMap::new();
    for record in table.iter() {
        let key = match keys.key_of(record) {
            Some(k) => k,
            None => continue,
        };
        let pos = *positions.entry(key.clone()).or_insert_with(|| {
            acc.push((key, 0, vec![(0.0, 0); metrics.len()]));
            acc.len() - 1
        });
        let (_, count, sums) = &mut acc[pos];
        *count += 1;
        for (midx, metric) in metrics.iter().enumerate() {
            if let Some(v) = record.value(*metric) {
                sums[midx].0 += v;
                sums[midx].1 += 1;
            }
        }
    }

    if acc.is_empty() {
        return Err(empty_result("mean_by_group"));
    }
    debug!("mean_by_group: {:?}: {} groups", keys, acc.len());

    let groups = acc
        .into_iter()
        .map(|(key, records, sums)| GroupMean {
            key,
            records,
            means: sums
                .iter()
                .map(|(s, n)| if *n > 0 { Some(s / *n as f64) } else { None })
                .collect(),
        })
        .collect();
    Ok(GroupedAggregate {
        keys,
        metrics: metrics.to_vec(),
        groups,
    })
}

/// For each group, the record with the best value of the metric.
///
/// Ties go to the record that comes first in the table. Groups in which no
/// record has a value are left out.
pub fn best_per_group<'a>(
    table: &'a CanonicalTable,
    keys: GroupKeys,
    metric: &Metric,
    direction: Direction,
) -> Result<Vec<GroupBest<'a>>, ScorecardError> {
    let mut res: Vec<GroupBest<'a>> = Vec::new();
    let mut positions: HashMap<Vec<Label>, usize> = HashMap::new();
    for record in table.iter() {
        let (key, value) = match (keys.key_of(record), metric.value(record)) {
            (Some(k), Some(v)) => (k, v),
            _ => continue,
        };
        match positions.get(&key).copied() {
            Some(pos) => {
                let current = &mut res[pos];
                if direction.prefers(value, current.value) {
                    current.record = record;
                    current.value = value;
                }
            }
            None => {
                positions.insert(key.clone(), res.len());
                res.push(GroupBest { key, record, value });
            }
        }
    }
    if res.is_empty() {
        return Err(empty_result("best_per_group"));
    }
    Ok(res)
}

/// The `n` best records, best first.
///
/// Records without a value for the metric are not ranked. Ties keep the order of the table.
pub fn top_n<'a>(
    table: &'a CanonicalTable,
    metric: &Metric,
    direction: Direction,
    n: usize,
) -> Result<Vec<Ranked<'a>>, ScorecardError> {
    let mut ranked: Vec<Ranked<'a>> = table
        .iter()
        .filter_map(|record| metric.value(record).map(|value| Ranked { record, value }))
        .collect();
    if ranked.is_empty() {
        return Err(empty_result("top_n"));
    }
    // Stable sort: ties stay in table order.
    ranked.sort_by(|a, b| direction.compare(a.value, b.value));
    ranked.truncate(n);
    Ok(ranked)
}

/// The single best record of the table. The first one wins in case of a tie.
pub fn extremal_record<'a>(
    table: &'a CanonicalTable,
    metric: &Metric,
    direction: Direction,
) -> Result<Ranked<'a>, ScorecardError> {
    let mut best: Option<Ranked<'a>> = None;
    for record in table.iter() {
        if let Some(value) = metric.value(record) {
            let better = match &best {
                Some(b) => direction.prefers(value, b.value),
                None => true,
            };
            if better {
                best = Some(Ranked { record, value });
            }
        }
    }
    best.ok_or_else(|| empty_result("extremal_record"))
}

/// The mean of a metric over the whole table, ignoring missing values.
pub fn mean_of(table: &CanonicalTable, metric: &Metric) -> Result<f64, ScorecardError> {
    let values: Vec<f64> = table.iter().filter_map(|r| metric.value(r)).collect();
    if values.is_empty() {
        return Err(empty_result("mean"));
    }
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}
