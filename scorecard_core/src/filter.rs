use log::debug;
use std::collections::HashSet;

use crate::config::*;

/// An inclusive range of values.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct ValueRange {
    pub lo: f64,
    pub hi: f64,
}

impl ValueRange {
    pub fn new(lo: f64, hi: f64) -> ValueRange {
        ValueRange { lo, hi }
    }

    pub fn contains(&self, v: f64) -> bool {
        self.lo <= v && v <= self.hi
    }
}

/// A selection over a canonical table.
///
/// Each criterion that is set must hold. A record lacking a value for a
/// criterion that is set does not match. A criterion set to an empty list
/// matches nothing.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct RecordFilter {
    provinces: Option<HashSet<String>>,
    guilds: Option<HashSet<String>>,
    providers: Option<HashSet<String>>,
    price: Option<ValueRange>,
    speed: Option<ValueRange>,
}

fn key_set(names: &[String]) -> HashSet<String> {
    names.iter().map(|n| Label::key_of(n)).collect()
}

fn label_in(label: Option<&Label>, selection: &Option<HashSet<String>>) -> bool {
    match selection {
        None => true,
        Some(keys) => label.map(|l| keys.contains(l.key())).unwrap_or(false),
    }
}

fn value_in(value: Option<f64>, range: &Option<ValueRange>) -> bool {
    match range {
        None => true,
        Some(r) => value.map(|v| r.contains(v)).unwrap_or(false),
    }
}

impl RecordFilter {
    pub fn new() -> RecordFilter {
        RecordFilter::default()
    }

    pub fn provinces(mut self, names: &[String]) -> RecordFilter {
        self.provinces = Some(key_set(names));
        self
    }

    pub fn guilds(mut self, names: &[String]) -> RecordFilter {
        self.guilds = Some(key_set(names));
        self
    }

    pub fn providers(mut self, names: &[String]) -> RecordFilter {
        self.providers = Some(key_set(names));
        self
    }

    pub fn price_range(mut self, range: ValueRange) -> RecordFilter {
        self.price = Some(range);
        self
    }

    pub fn speed_range(mut self, range: ValueRange) -> RecordFilter {
        self.speed = Some(range);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == RecordFilter::default()
    }

    pub fn matches(&self, record: &CanonicalRecord) -> bool {
        label_in(record.province.as_ref(), &self.provinces)
            && label_in(record.guild.as_ref(), &self.guilds)
            && label_in(Some(&record.provider), &self.providers)
            && value_in(record.price, &self.price)
            && value_in(record.speed, &self.speed)
    }

    /// The records of the table that match, as a new table.
    pub fn apply(&self, table: &CanonicalTable) -> CanonicalTable {
        let records: Vec<CanonicalRecord> =
            table.iter().filter(|r| self.matches(r)).cloned().collect();
        debug!(
            "RecordFilter::apply: kept {} of {} records",
            records.len(),
            table.len()
        );
        table.derive(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(provider: &str, province: &str, guild: &str, price: Option<f64>) -> CanonicalRecord {
        let mut r = CanonicalRecord::new(Label::new(provider).unwrap());
        r.province = Label::new(province);
        r.guild = Label::new(guild);
        r.price = price;
        r.speed = Some(5.0);
        r
    }

    fn table() -> CanonicalTable {
        CanonicalTable::from_records(vec![
            record("A", "Madrid", "Pintura", Some(10.0)),
            record("B", "Sevilla", "Pintura", Some(30.0)),
            record("C", "Madrid", "Fontanería", None),
            record("D", "", "Pintura", Some(12.0)),
        ])
    }

    #[test]
    fn empty_filter_keeps_everything() {
        let t = table();
        let f = RecordFilter::new();
        assert!(f.is_empty());
        assert_eq!(f.apply(&t), t);
    }

    #[test]
    fn selections_are_case_insensitive() {
        let t = table();
        let f = RecordFilter::new().provinces(&["MADRID".to_string()]);
        let res = f.apply(&t);
        let names: Vec<&str> = res.iter().map(|r| r.provider.display()).collect();
        assert_eq!(names, vec!["A", "C"]);
        // The source table is unchanged.
        assert_eq!(t.len(), 4);
    }

    #[test]
    fn ranges_exclude_missing_values() {
        let t = table();
        let f = RecordFilter::new()
            .guilds(&["pintura".to_string(), "fontanería".to_string()])
            .price_range(ValueRange::new(0.0, 15.0));
        let names: Vec<String> = f
            .apply(&t)
            .iter()
            .map(|r| r.provider.display().to_string())
            .collect();
        assert_eq!(names, vec!["A".to_string(), "D".to_string()]);
    }

    #[test]
    fn empty_selection_matches_nothing() {
        let f = RecordFilter::new().providers(&[]);
        assert!(f.apply(&table()).is_empty());
    }
}
