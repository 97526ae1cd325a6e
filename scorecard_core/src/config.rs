// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;
use std::hash::{Hash, Hasher};

use crate::resolver::normalize_name;

/// A single cell of a raw table, as delivered by the file readers.
///
/// Spreadsheets mix numbers, text and blanks in the same column. The readers
/// keep that distinction and leave any coercion to the resolver.
#[derive(PartialEq, Debug, Clone)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    /// The textual content of the cell, trimmed. Blank cells have no text.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Text(s) if s.trim().is_empty() => None,
            Cell::Text(s) => Some(s.trim().to_string()),
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                Some(format!("{}", *n as i64))
            }
            Cell::Number(n) => Some(n.to_string()),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.as_text().is_none()
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Cell {
        if s.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(s.to_string())
        }
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Cell {
        Cell::Number(n)
    }
}

/// The content of a worksheet before any header has been identified.
///
/// Rows may have different lengths. No row is assumed to be the header.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct RawTable {
    pub rows: Vec<Vec<Cell>>,
}

impl RawTable {
    pub fn new(rows: Vec<Vec<Cell>>) -> RawTable {
        RawTable { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ********* Canonical schema ***********

/// The fixed slots of the canonical schema.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum CanonicalField {
    Provider,
    Province,
    Guild,
    Price,
    Speed,
    Quality,
    Documentation,
    FinalScore,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 8] = [
        CanonicalField::Provider,
        CanonicalField::Province,
        CanonicalField::Guild,
        CanonicalField::Price,
        CanonicalField::Speed,
        CanonicalField::Quality,
        CanonicalField::Documentation,
        CanonicalField::FinalScore,
    ];

    /// The name used in configuration files and in the JSON output.
    pub fn name(&self) -> &'static str {
        match self {
            CanonicalField::Provider => "Provider",
            CanonicalField::Province => "Province",
            CanonicalField::Guild => "Guild",
            CanonicalField::Price => "Price",
            CanonicalField::Speed => "Speed",
            CanonicalField::Quality => "Quality",
            CanonicalField::Documentation => "Documentation",
            CanonicalField::FinalScore => "FinalScore",
        }
    }

    /// The column title used when the table is handed back for display or download.
    pub fn display_name(&self) -> &'static str {
        match self {
            CanonicalField::Provider => "Colaborador",
            CanonicalField::Province => "Provincia",
            CanonicalField::Guild => "Gremio",
            CanonicalField::Price => "Precio",
            CanonicalField::Speed => "Velocidad",
            CanonicalField::Quality => "Calidad",
            CanonicalField::Documentation => "Documentación",
            CanonicalField::FinalScore => "Nota final",
        }
    }

    /// Accepts either the configuration name or the display name, in any case or accentuation.
    pub fn parse(s: &str) -> Option<CanonicalField> {
        let key = normalize_name(s);
        CanonicalField::ALL.iter().cloned().find(|f| {
            normalize_name(f.name()) == key
                || normalize_name(f.display_name()) == key
                || key.replace(' ', "") == f.name().to_lowercase()
        })
    }

    pub fn as_numeric(&self) -> Option<NumericField> {
        NumericField::ALL.iter().cloned().find(|nf| nf.field() == *self)
    }

    pub fn as_group(&self) -> Option<GroupField> {
        GroupField::ALL.iter().cloned().find(|gf| gf.field() == *self)
    }
}

impl Display for CanonicalField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The canonical fields that hold measurements.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum NumericField {
    Price,
    Speed,
    Quality,
    Documentation,
    FinalScore,
}

impl NumericField {
    pub const ALL: [NumericField; 5] = [
        NumericField::Price,
        NumericField::Speed,
        NumericField::Quality,
        NumericField::Documentation,
        NumericField::FinalScore,
    ];

    pub fn field(&self) -> CanonicalField {
        match self {
            NumericField::Price => CanonicalField::Price,
            NumericField::Speed => CanonicalField::Speed,
            NumericField::Quality => CanonicalField::Quality,
            NumericField::Documentation => CanonicalField::Documentation,
            NumericField::FinalScore => CanonicalField::FinalScore,
        }
    }

    pub fn name(&self) -> &'static str {
        self.field().name()
    }

    pub fn parse(s: &str) -> Option<NumericField> {
        CanonicalField::parse(s).and_then(|f| f.as_numeric())
    }
}

impl Display for NumericField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The canonical fields that identify a record and may be used to group records.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum GroupField {
    Provider,
    Province,
    Guild,
}

impl GroupField {
    pub const ALL: [GroupField; 3] = [GroupField::Provider, GroupField::Province, GroupField::Guild];

    pub fn field(&self) -> CanonicalField {
        match self {
            GroupField::Provider => CanonicalField::Provider,
            GroupField::Province => CanonicalField::Province,
            GroupField::Guild => CanonicalField::Guild,
        }
    }

    pub fn name(&self) -> &'static str {
        self.field().name()
    }

    pub fn parse(s: &str) -> Option<GroupField> {
        CanonicalField::parse(s).and_then(|f| f.as_group())
    }
}

impl Display for GroupField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// An identifying value (provider, province, guild).
///
/// Two labels are equal when their comparison keys are equal: the display
/// form is only used for output.
#[derive(Debug, Clone)]
pub struct Label {
    display: String,
    key: String,
}

impl Label {
    /// Returns None for blank input.
    pub fn new(raw: &str) -> Option<Label> {
        let words: Vec<&str> = raw.split_whitespace().collect();
        if words.is_empty() {
            return None;
        }
        let display = words
            .iter()
            .map(|w| title_case_word(w))
            .collect::<Vec<String>>()
            .join(" ");
        Some(Label {
            display,
            key: Label::key_of(raw),
        })
    }

    /// The comparison key for a raw value: trimmed, case-folded, with single spaces.
    pub fn key_of(raw: &str) -> String {
        raw.split_whitespace()
            .map(|w| w.to_lowercase())
            .collect::<Vec<String>>()
            .join(" ")
    }

    pub fn display(&self) -> &str {
        &self.display
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

fn title_case_word(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(|c| c.to_lowercase()))
            .collect(),
        None => String::new(),
    }
}

impl PartialEq for Label {
    fn eq(&self, other: &Label) -> bool {
        self.key == other.key
    }
}

impl Eq for Label {}

impl Hash for Label {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display)
    }
}

/// One row of the resolved table.
///
/// Numeric fields that are absent or failed to parse are None.
#[derive(PartialEq, Debug, Clone)]
pub struct CanonicalRecord {
    /// Position of the row in the raw table, for diagnostics.
    pub source_row: usize,
    pub provider: Label,
    pub province: Option<Label>,
    pub guild: Option<Label>,
    pub price: Option<f64>,
    pub speed: Option<f64>,
    pub quality: Option<f64>,
    pub documentation: Option<f64>,
    pub final_score: Option<f64>,
}

impl CanonicalRecord {
    /// A record with only a provider. Mostly useful to build tables by hand.
    pub fn new(provider: Label) -> CanonicalRecord {
        CanonicalRecord {
            source_row: 0,
            provider,
            province: None,
            guild: None,
            price: None,
            speed: None,
            quality: None,
            documentation: None,
            final_score: None,
        }
    }

    pub fn value(&self, field: NumericField) -> Option<f64> {
        match field {
            NumericField::Price => self.price,
            NumericField::Speed => self.speed,
            NumericField::Quality => self.quality,
            NumericField::Documentation => self.documentation,
            NumericField::FinalScore => self.final_score,
        }
    }

    pub fn set_value(&mut self, field: NumericField, value: Option<f64>) {
        match field {
            NumericField::Price => self.price = value,
            NumericField::Speed => self.speed = value,
            NumericField::Quality => self.quality = value,
            NumericField::Documentation => self.documentation = value,
            NumericField::FinalScore => self.final_score = value,
        }
    }

    pub fn label(&self, field: GroupField) -> Option<&Label> {
        match field {
            GroupField::Provider => Some(&self.provider),
            GroupField::Province => self.province.as_ref(),
            GroupField::Guild => self.guild.as_ref(),
        }
    }
}

/// Which raw column was bound to a canonical field.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ColumnBinding {
    pub field: CanonicalField,
    pub column_index: usize,
    pub original_name: String,
    /// The alias (normalized) that produced the match.
    pub alias: String,
}

/// The resolved table. It is never modified once built: filters produce new tables.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct CanonicalTable {
    records: Vec<CanonicalRecord>,
    bindings: Vec<ColumnBinding>,
    header_row: usize,
    coercion_issues: usize,
}

impl CanonicalTable {
    pub(crate) fn new(
        records: Vec<CanonicalRecord>,
        bindings: Vec<ColumnBinding>,
        header_row: usize,
        coercion_issues: usize,
    ) -> CanonicalTable {
        CanonicalTable {
            records,
            bindings,
            header_row,
            coercion_issues,
        }
    }

    /// Builds a table directly from records, without any resolution step.
    pub fn from_records(records: Vec<CanonicalRecord>) -> CanonicalTable {
        CanonicalTable {
            records,
            ..CanonicalTable::default()
        }
    }

    /// A new table with the same provenance and a different selection of records.
    pub fn derive(&self, records: Vec<CanonicalRecord>) -> CanonicalTable {
        CanonicalTable {
            records,
            bindings: self.bindings.clone(),
            header_row: self.header_row,
            coercion_issues: self.coercion_issues,
        }
    }

    pub fn records(&self) -> &[CanonicalRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CanonicalRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn bindings(&self) -> &[ColumnBinding] {
        &self.bindings
    }

    pub fn binding(&self, field: CanonicalField) -> Option<&ColumnBinding> {
        self.bindings.iter().find(|b| b.field == field)
    }

    /// Index of the row of the raw table that was used as the header.
    pub fn header_row(&self) -> usize {
        self.header_row
    }

    /// Number of cells that should have been numeric and could not be read.
    pub fn coercion_issues(&self) -> usize {
        self.coercion_issues
    }
}

// ********* Aliases ***********

/// The accepted spellings of the column holding a canonical field.
///
/// Aliases are tried in order: the most specific ones should come first.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ColumnAlias {
    pub field: CanonicalField,
    pub aliases: Vec<String>,
    pub required: bool,
}

impl ColumnAlias {
    pub fn new(field: CanonicalField, aliases: &[&str], required: bool) -> ColumnAlias {
        ColumnAlias {
            field,
            aliases: aliases.iter().map(|s| s.to_string()).collect(),
            required,
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct AliasTable {
    entries: Vec<ColumnAlias>,
}

impl AliasTable {
    pub fn new(entries: Vec<ColumnAlias>) -> AliasTable {
        AliasTable { entries }
    }

    pub fn entries(&self) -> &[ColumnAlias] {
        &self.entries
    }

    pub fn get(&self, field: CanonicalField) -> Option<&ColumnAlias> {
        self.entries.iter().find(|e| e.field == field)
    }

    /// Replaces the entry for the same field. The provider column stays required:
    /// records cannot exist without it.
    pub fn with_override(mut self, alias: ColumnAlias) -> AliasTable {
        let mut alias = alias;
        if alias.field == CanonicalField::Provider {
            alias.required = true;
        }
        match self.entries.iter_mut().find(|e| e.field == alias.field) {
            Some(e) => *e = alias,
            None => self.entries.push(alias),
        }
        self
    }

    /// The fields that must be matched for a resolution to succeed.
    pub fn required_fields(&self) -> Vec<CanonicalField> {
        self.entries
            .iter()
            .filter(|e| e.required)
            .map(|e| e.field)
            .collect()
    }
}

impl Default for AliasTable {
    fn default() -> AliasTable {
        AliasTable::new(vec![
            ColumnAlias::new(
                CanonicalField::Provider,
                &[
                    "nombre colaborador",
                    "colaborador",
                    "nombre proveedor",
                    "proveedor",
                    "provider",
                    "empresa",
                ],
                true,
            ),
            ColumnAlias::new(
                CanonicalField::Province,
                &["provincia", "province", "zona"],
                true,
            ),
            ColumnAlias::new(
                CanonicalField::Guild,
                &["gremio", "guild", "especialidad", "oficio"],
                true,
            ),
            ColumnAlias::new(
                CanonicalField::Price,
                &[
                    "puntuacion coste",
                    "puntuacion precio",
                    "coste",
                    "precio",
                    "price",
                ],
                true,
            ),
            ColumnAlias::new(
                CanonicalField::Speed,
                &[
                    "puntuacion velocidad",
                    "tiempo total",
                    "puntuacion sla",
                    "velocidad",
                    "speed",
                ],
                true,
            ),
            ColumnAlias::new(
                CanonicalField::Quality,
                &["puntuacion calidad", "calidad", "quality"],
                true,
            ),
            ColumnAlias::new(
                CanonicalField::Documentation,
                &[
                    "puntuacion documentacion",
                    "documentacion",
                    "documentation",
                ],
                true,
            ),
            ColumnAlias::new(
                CanonicalField::FinalScore,
                &[
                    "nota final",
                    "puntuacion final",
                    "nota media",
                    "final score",
                ],
                true,
            ),
        ])
    }
}

// ********* Scoring configuration **********

/// Which end of a metric is considered best.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default)]
pub enum Direction {
    /// Lower is better (costs, delays).
    #[default]
    Ascending,
    /// Higher is better (grades).
    Descending,
}

impl Direction {
    pub fn parse(s: &str) -> Option<Direction> {
        match s.trim().to_lowercase().as_str() {
            "ascending" | "asc" | "lower" => Some(Direction::Ascending),
            "descending" | "desc" | "higher" => Some(Direction::Descending),
            _ => None,
        }
    }

    /// Orders two values so that the best one comes first.
    pub fn compare(&self, a: f64, b: f64) -> std::cmp::Ordering {
        match self {
            Direction::Ascending => a.total_cmp(&b),
            Direction::Descending => b.total_cmp(&a),
        }
    }

    /// True if `candidate` is strictly better than `current`.
    pub fn prefers(&self, candidate: f64, current: f64) -> bool {
        self.compare(candidate, current) == std::cmp::Ordering::Less
    }

    pub fn name(&self) -> &'static str {
        match self {
            Direction::Ascending => "ascending",
            Direction::Descending => "descending",
        }
    }
}

/// Non-negative weights over a subset of the numeric fields.
///
/// The weights are expected to sum to 1.0 but this is not enforced.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct Weights {
    entries: Vec<(NumericField, f64)>,
}

impl Weights {
    /// A later entry for the same field replaces the earlier one.
    pub fn new(entries: &[(NumericField, f64)]) -> Result<Weights, ScorecardError> {
        let mut res: Vec<(NumericField, f64)> = Vec::new();
        for (field, weight) in entries.iter().cloned() {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ScorecardError::InvalidWeight { field, weight });
            }
            match res.iter_mut().find(|(f, _)| *f == field) {
                Some(e) => e.1 = weight,
                None => res.push((field, weight)),
            }
        }
        Ok(Weights { entries: res })
    }

    pub fn entries(&self) -> &[(NumericField, f64)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.entries.iter().map(|(_, w)| *w).sum()
    }
}

/// What a ranking is computed on.
#[derive(PartialEq, Debug, Clone)]
pub enum Metric {
    Field(NumericField),
    Composite(Weights),
}

impl Metric {
    pub fn name(&self) -> String {
        match self {
            Metric::Field(f) => f.name().to_string(),
            Metric::Composite(_) => "CompositeScore".to_string(),
        }
    }

    /// The value of the metric for this record, if it can be computed.
    pub fn value(&self, record: &CanonicalRecord) -> Option<f64> {
        match self {
            Metric::Field(f) => record.value(*f),
            Metric::Composite(w) => crate::scoring::composite_score(record, w),
        }
    }
}

/// One or two categorical fields to group on.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum GroupKeys {
    One(GroupField),
    Two(GroupField, GroupField),
}

impl GroupKeys {
    pub fn from_fields(fields: &[GroupField]) -> Option<GroupKeys> {
        match fields {
            [a] => Some(GroupKeys::One(*a)),
            [a, b] => Some(GroupKeys::Two(*a, *b)),
            _ => None,
        }
    }

    pub fn fields(&self) -> Vec<GroupField> {
        match self {
            GroupKeys::One(a) => vec![*a],
            GroupKeys::Two(a, b) => vec![*a, *b],
        }
    }

    /// The group of a record. Records with a missing key belong to no group.
    pub fn key_of(&self, record: &CanonicalRecord) -> Option<Vec<Label>> {
        self.fields()
            .iter()
            .map(|f| record.label(*f).cloned())
            .collect()
    }
}

// ********* Errors **********

/// Errors that prevent a resolution or an aggregate from being computed.
#[derive(PartialEq, Debug, Clone)]
pub enum ScorecardError {
    /// Some required fields have no matching column. All of them are listed.
    SchemaResolution {
        missing: Vec<CanonicalField>,
        observed: Vec<String>,
    },
    /// An aggregate or a ranking was requested over zero eligible records.
    EmptyResult { operation: String },
    InvalidWeight { field: NumericField, weight: f64 },
}

impl Error for ScorecardError {}

impl Display for ScorecardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScorecardError::SchemaResolution { missing, observed } => {
                let missing_s: Vec<&str> = missing.iter().map(|m| m.name()).collect();
                write!(
                    f,
                    "Could not find a column for: {}. Columns found in the file: [{}]",
                    missing_s.join(", "),
                    observed.join(", ")
                )
            }
            ScorecardError::EmptyResult { operation } => {
                write!(f, "No data for this selection ({})", operation)
            }
            ScorecardError::InvalidWeight { field, weight } => {
                write!(
                    f,
                    "Invalid weight {} for {}: weights must be finite and non-negative",
                    weight, field
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_compare_on_folded_case() {
        let a = Label::new("  MADRID ").unwrap();
        let b = Label::new("madrid").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.display(), "Madrid");
        assert_eq!(Label::new("a  coruña").unwrap().display(), "A Coruña");
        assert!(Label::new("   ").is_none());
    }

    #[test]
    fn cells_render_integers_without_fraction() {
        assert_eq!(Cell::Number(12.0).as_text(), Some("12".to_string()));
        assert_eq!(Cell::Number(1.5).as_text(), Some("1.5".to_string()));
        assert_eq!(Cell::Text("  ".to_string()).as_text(), None);
        assert!(Cell::from("").is_blank());
    }

    #[test]
    fn field_names_parse_in_both_languages() {
        assert_eq!(CanonicalField::parse("finalscore"), Some(CanonicalField::FinalScore));
        assert_eq!(CanonicalField::parse("Nota Final"), Some(CanonicalField::FinalScore));
        assert_eq!(CanonicalField::parse("documentacion"), Some(CanonicalField::Documentation));
        assert_eq!(NumericField::parse("Provider"), None);
        assert_eq!(GroupField::parse("Provincia"), Some(GroupField::Province));
    }

    #[test]
    fn weights_reject_negative_values() {
        let res = Weights::new(&[(NumericField::Speed, -0.1)]);
        assert!(matches!(res, Err(ScorecardError::InvalidWeight { .. })));
        let w = Weights::new(&[(NumericField::Speed, 0.5), (NumericField::Speed, 0.7)]).unwrap();
        assert_eq!(w.entries(), &[(NumericField::Speed, 0.7)]);
    }

    #[test]
    fn provider_override_stays_required() {
        let table = AliasTable::default().with_override(ColumnAlias::new(
            CanonicalField::Provider,
            &["socio"],
            false,
        ));
        let provider = table.get(CanonicalField::Provider).unwrap();
        assert!(provider.required);
        assert_eq!(provider.aliases, vec!["socio".to_string()]);
    }

    #[test]
    fn direction_prefers_strictly_better() {
        assert!(Direction::Ascending.prefers(1.0, 2.0));
        assert!(!Direction::Ascending.prefers(2.0, 2.0));
        assert!(Direction::Descending.prefers(3.0, 2.0));
        assert_eq!(Direction::default(), Direction::Ascending);
    }
}
