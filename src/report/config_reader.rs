use crate::report::*;

use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;
use std::collections::BTreeMap;

pub const DEFAULT_INPUT: &str = "proveedores_principales_provincias.xlsx";
pub const DEFAULT_HEADER_KEYWORD: &str = "Colaborador";
pub const DEFAULT_TOP_N: usize = 5;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct OutputSettings {
    #[serde(rename = "reportName", default)]
    pub report_name: String,
    #[serde(rename = "outputFile")]
    pub output_file: Option<String>,
    #[serde(rename = "exportFile")]
    pub export_file: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct FileSource {
    /// excel or csv. Guessed from the extension when absent.
    pub provider: Option<String>,
    #[serde(rename = "filePath")]
    pub file_path: String,
    #[serde(rename = "excelWorksheetName")]
    pub excel_worksheet_name: Option<String>,
    #[serde(rename = "headerKeyword")]
    pub header_keyword: Option<String>,
    #[serde(rename = "csvDelimiter")]
    pub csv_delimiter: Option<String>,
}

impl Default for FileSource {
    fn default() -> FileSource {
        FileSource {
            provider: None,
            file_path: DEFAULT_INPUT.to_string(),
            excel_worksheet_name: None,
            header_keyword: None,
            csv_delimiter: None,
        }
    }
}

impl FileSource {
    pub fn header_keyword(&self) -> &str {
        self.header_keyword
            .as_deref()
            .unwrap_or(DEFAULT_HEADER_KEYWORD)
    }

    pub fn csv_delimiter_byte(&self) -> ReportResult<Option<u8>> {
        match self.csv_delimiter.as_deref() {
            None => Ok(None),
            Some("\\t") | Some("tab") => Ok(Some(b'\t')),
            Some(s) if s.len() == 1 => Ok(Some(s.as_bytes()[0])),
            Some(s) => whatever!("csvDelimiter must be a single character, got {:?}", s),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSettings {
    pub field: String,
    pub aliases: Vec<String>,
    pub required: Option<bool>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct ScoringSettings {
    pub weights: Option<BTreeMap<String, f64>>,
    pub direction: Option<String>,
    #[serde(rename = "topN")]
    pub top_n: Option<usize>,
    #[serde(rename = "groupBy")]
    pub group_by: Option<Vec<String>>,
    /// "composite" or the name of a numeric field.
    #[serde(rename = "rankMetric")]
    pub rank_metric: Option<String>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct FilterSettings {
    pub provinces: Option<Vec<String>>,
    pub guilds: Option<Vec<String>>,
    pub providers: Option<Vec<String>>,
    pub price: Option<[f64; 2]>,
    pub speed: Option<[f64; 2]>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct ReportConfig {
    #[serde(rename = "outputSettings", default)]
    pub output_settings: OutputSettings,
    #[serde(rename = "fileSource", default)]
    pub file_source: FileSource,
    #[serde(default)]
    pub columns: Vec<ColumnSettings>,
    #[serde(default)]
    pub scoring: ScoringSettings,
    #[serde(default)]
    pub filter: FilterSettings,
}

/// The scoring settings, checked and converted.
#[derive(PartialEq, Debug, Clone)]
pub struct ScoringPlan {
    pub weights: Weights,
    pub rank_metric: Metric,
    pub direction: Direction,
    pub top_n: usize,
    pub group_keys: GroupKeys,
}

pub fn read_config(path: &str) -> ReportResult<ReportConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: ReportConfig =
        serde_json::from_str(&contents).context(ParsingJsonSnafu { path })?;
    debug!("read_config: {:?}", config);
    Ok(config)
}

pub fn read_reference(path: &str) -> ReportResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(&contents).context(ParsingJsonSnafu { path })?;
    Ok(js)
}

pub fn validate_aliases(columns: &[ColumnSettings]) -> ReportResult<AliasTable> {
    let mut table = AliasTable::default();
    for c in columns {
        let field = match CanonicalField::parse(&c.field) {
            Some(f) => f,
            None => whatever!("Unknown field in columns: {:?}", c.field),
        };
        if c.aliases.is_empty() {
            whatever!("No aliases given for field {}", field);
        }
        let required = c
            .required
            .unwrap_or_else(|| table.get(field).map(|e| e.required).unwrap_or(true));
        if field == CanonicalField::Provider && !required {
            warn!("validate_aliases: the provider column is always required");
        }
        table = table.with_override(ColumnAlias {
            field,
            aliases: c.aliases.clone(),
            required,
        });
    }
    Ok(table)
}

pub fn validate_weights(weights: &BTreeMap<String, f64>) -> ReportResult<Weights> {
    let mut entries: Vec<(NumericField, f64)> = Vec::new();
    for (name, w) in weights.iter() {
        match NumericField::parse(name) {
            Some(f) => entries.push((f, *w)),
            None => whatever!("Cannot use {:?} as a weighted field: it is not numeric", name),
        }
    }
    let res = Weights::new(&entries)?;
    if !res.is_empty() && (res.total() - 1.0).abs() > 1e-6 {
        info!(
            "validate_weights: the weights sum to {}, not 1.0",
            res.total()
        );
    }
    Ok(res)
}

/// Parses weights given as `Speed=0.7,Price=0.3`.
pub fn parse_weights(s: &str) -> ReportResult<BTreeMap<String, f64>> {
    let mut res: BTreeMap<String, f64> = BTreeMap::new();
    for part in s.split(',').map(|p| p.trim()).filter(|p| !p.is_empty()) {
        let (name, value) = match part.split_once('=') {
            Some(x) => x,
            None => whatever!("Expected FIELD=WEIGHT, got {:?}", part),
        };
        let w: f64 = match value.trim().parse() {
            Ok(w) => w,
            Err(_) => whatever!("Cannot read the weight of {}: {:?}", name.trim(), value),
        };
        res.insert(name.trim().to_string(), w);
    }
    Ok(res)
}

pub fn validate_scoring(settings: &ScoringSettings) -> ReportResult<ScoringPlan> {
    let weights = match &settings.weights {
        Some(w) => validate_weights(w)?,
        None => Weights::default(),
    };

    let rank_metric = match settings.rank_metric.as_deref() {
        Some(s) if s.eq_ignore_ascii_case("composite") => {
            if weights.is_empty() {
                whatever!("rankMetric is composite but no weights are given");
            }
            Metric::Composite(weights.clone())
        }
        Some(s) => match NumericField::parse(s) {
            Some(f) => Metric::Field(f),
            None => whatever!("Cannot rank on {:?}: it is not a numeric field", s),
        },
        None if !weights.is_empty() => Metric::Composite(weights.clone()),
        None => Metric::Field(NumericField::FinalScore),
    };

    let direction = match settings.direction.as_deref() {
        Some(s) => match Direction::parse(s) {
            Some(d) => d,
            None => whatever!("Unknown direction {:?}: use ascending or descending", s),
        },
        None => default_direction(&rank_metric),
    };

    let group_names: Vec<String> = settings
        .group_by
        .clone()
        .unwrap_or_else(|| vec![GroupField::Province.name().to_string()]);
    let mut group_fields: Vec<GroupField> = Vec::new();
    for name in group_names.iter() {
        match GroupField::parse(name) {
            Some(g) => group_fields.push(g),
            None => whatever!("Cannot group on {:?}: use Provider, Province or Guild", name),
        }
    }
    let group_keys = match GroupKeys::from_fields(&group_fields) {
        Some(k) => k,
        None => whatever!("groupBy takes one or two fields, got {:?}", group_names),
    };

    Ok(ScoringPlan {
        weights,
        rank_metric,
        direction,
        top_n: settings.top_n.unwrap_or(DEFAULT_TOP_N),
        group_keys,
    })
}

/// Costs and delays rank lower-is-better, grades rank higher-is-better.
fn default_direction(metric: &Metric) -> Direction {
    match metric {
        Metric::Composite(_) => Direction::Ascending,
        Metric::Field(NumericField::Price) | Metric::Field(NumericField::Speed) => {
            Direction::Ascending
        }
        Metric::Field(_) => Direction::Descending,
    }
}

pub fn validate_filter(settings: &FilterSettings) -> ReportResult<RecordFilter> {
    let mut res = RecordFilter::new();
    if let Some(p) = &settings.provinces {
        res = res.provinces(p);
    }
    if let Some(g) = &settings.guilds {
        res = res.guilds(g);
    }
    if let Some(p) = &settings.providers {
        res = res.providers(p);
    }
    if let Some([lo, hi]) = settings.price {
        if lo > hi {
            whatever!("Empty price range [{}, {}]", lo, hi);
        }
        res = res.price_range(ValueRange::new(lo, hi));
    }
    if let Some([lo, hi]) = settings.speed {
        if lo > hi {
            whatever!("Empty speed range [{}, {}]", lo, hi);
        }
        res = res.speed_range(ValueRange::new(lo, hi));
    }
    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_parses_with_defaults() {
        let js = r#"{ "fileSource": { "filePath": "datos.csv" } }"#;
        let config: ReportConfig = serde_json::from_str(js).unwrap();
        assert_eq!(config.file_source.header_keyword(), DEFAULT_HEADER_KEYWORD);
        let plan = validate_scoring(&config.scoring).unwrap();
        assert_eq!(plan.rank_metric, Metric::Field(NumericField::FinalScore));
        assert_eq!(plan.direction, Direction::Descending);
        assert_eq!(plan.top_n, DEFAULT_TOP_N);
        assert_eq!(plan.group_keys, GroupKeys::One(GroupField::Province));
    }

    #[test]
    fn weights_default_to_composite_ascending() {
        let settings = ScoringSettings {
            weights: Some(parse_weights("Speed=0.7, Price=0.3").unwrap()),
            ..ScoringSettings::default()
        };
        let plan = validate_scoring(&settings).unwrap();
        assert!(matches!(plan.rank_metric, Metric::Composite(_)));
        assert_eq!(plan.direction, Direction::Ascending);
        assert_eq!(plan.weights.entries().len(), 2);
    }

    #[test]
    fn bad_settings_are_rejected() {
        assert!(parse_weights("Speed:0.7").is_err());
        assert!(validate_weights(&parse_weights("Province=1").unwrap()).is_err());
        let settings = ScoringSettings {
            group_by: Some(vec![
                "Province".to_string(),
                "Guild".to_string(),
                "Provider".to_string(),
            ]),
            ..ScoringSettings::default()
        };
        assert!(validate_scoring(&settings).is_err());
        let filter = FilterSettings {
            price: Some([10.0, 1.0]),
            ..FilterSettings::default()
        };
        assert!(validate_filter(&filter).is_err());
    }

    #[test]
    fn column_overrides_keep_other_defaults() {
        let columns = vec![ColumnSettings {
            field: "Velocidad".to_string(),
            aliases: vec!["plazo medio".to_string()],
            required: Some(false),
        }];
        let table = validate_aliases(&columns).unwrap();
        let speed = table.get(CanonicalField::Speed).unwrap();
        assert_eq!(speed.aliases, vec!["plazo medio".to_string()]);
        assert!(!speed.required);
        assert!(table.get(CanonicalField::Price).unwrap().required);
    }

    #[test]
    fn negative_weights_surface_the_core_error() {
        let mut w = BTreeMap::new();
        w.insert("Price".to_string(), -1.0);
        assert!(matches!(
            validate_weights(&w),
            Err(ReportError::Scoring {
                source: ScorecardError::InvalidWeight { .. }
            })
        ));
    }
}
