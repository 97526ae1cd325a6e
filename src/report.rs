use log::{debug, info, warn};

use scorecard_core::cache::ResolutionCache;
use scorecard_core::filter::{RecordFilter, ValueRange};
use scorecard_core::scoring::{
    best_per_group, extremal_record, mean_by_group, top_n, GroupedAggregate, Ranked,
};
use scorecard_core::views::{
    bar_series, profile_series, scatter_series, summarize, table_columns, ColumnValues, Summary,
};
use scorecard_core::*;
use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::Path;

use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::Args;
use crate::report::config_reader::*;
use crate::report::io_common::{simplify_file_name, InputKind};
use crate::report::io_csv::{read_csv_table, write_export};
use crate::report::io_excel::read_excel_table;

pub mod config_reader;
pub mod io_common;
pub mod io_csv;
pub mod io_excel;

#[derive(Debug, Snafu)]
pub enum ReportError {
    #[snafu(display("Cannot read {path}: {reason}"))]
    UnsupportedFile { path: String, reason: String },
    #[snafu(display("Error opening file {path}"))]
    OpeningFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error opening configuration file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON file {path}: {source}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error serializing the report"))]
    SerializingJson { source: serde_json::Error },
    #[snafu(display("Worksheet {name} not found in {path}"))]
    MissingWorksheet { name: String, path: String },
    #[snafu(display(
        "Several worksheets of {path} look like data ({names:?}): choose one with excelWorksheetName"
    ))]
    AmbiguousWorksheet { path: String, names: Vec<String> },
    #[snafu(display("The workbook {path} has no worksheet"))]
    EmptyWorkbook { path: String },
    #[snafu(display("Error writing the export file {path}"))]
    WritingExport { source: csv::Error, path: String },
    #[snafu(display("Error writing {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("The report differs from the reference {path}"))]
    ReferenceMismatch { path: String },
    #[snafu(context(false), display("{source}"))]
    Scoring { source: ScorecardError },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type ReportResult<T> = Result<T, ReportError>;

/// State shared by the reports of one invocation.
#[derive(Debug, Default)]
pub struct Session {
    cache: ResolutionCache,
}

impl Session {
    pub fn new() -> Session {
        Session::default()
    }

    /// Reads the source file and resolves it, unless the same content was resolved before.
    fn load_table(
        &mut self,
        cfs: &FileSource,
        aliases: &AliasTable,
    ) -> ReportResult<&CanonicalTable> {
        let path = cfs.file_path.as_str();
        let kind = match cfs.provider.as_deref() {
            Some(p) => match InputKind::parse(p) {
                Some(k) => k,
                None => whatever!("Unknown provider {:?}: use excel or csv", p),
            },
            None => match InputKind::from_path(path) {
                Some(k) => k,
                None => {
                    return UnsupportedFileSnafu {
                        path,
                        reason: "unknown file extension, expected a spreadsheet or a CSV file",
                    }
                    .fail();
                }
            },
        };
        info!("load_table: reading {:?} as {:?}", path, kind);
        let bytes = fs::read(path).context(OpeningFileSnafu { path })?;
        self.cache
            .get_or_resolve(&bytes, cfs.header_keyword(), aliases, || match kind {
                InputKind::Excel => read_excel_table(path, cfs),
                InputKind::Csv => read_csv_table(path, &bytes, cfs),
            })
    }

    pub fn cache_hits(&self) -> usize {
        self.cache.hits()
    }
}

fn resolve_relative(root: &Path, p: &str) -> String {
    let path = Path::new(p);
    if path.is_absolute() {
        p.to_string()
    } else {
        root.join(path).display().to_string()
    }
}

/// The configuration of one report: the config file if any, then the command line on top.
pub fn config_from_args(args: &Args, config_path: Option<&str>) -> ReportResult<ReportConfig> {
    let mut config = match config_path {
        Some(cp) => {
            let mut config = read_config(cp)?;
            // Paths in the config file are relative to the file itself.
            let root = Path::new(cp).parent().unwrap_or_else(|| Path::new(""));
            config.file_source.file_path = resolve_relative(root, &config.file_source.file_path);
            config.output_settings.output_file = match config.output_settings.output_file {
                Some(p) if p == "stdout" || p.is_empty() => Some(p),
                Some(p) => Some(resolve_relative(root, &p)),
                None => None,
            };
            config.output_settings.export_file = config
                .output_settings
                .export_file
                .map(|p| resolve_relative(root, &p));
            config
        }
        None => ReportConfig::default(),
    };

    if let Some(input) = &args.input {
        config.file_source.file_path = input.clone();
    }
    if let Some(t) = &args.input_type {
        config.file_source.provider = Some(t.clone());
    }
    if let Some(n) = &args.excel_worksheet_name {
        config.file_source.excel_worksheet_name = Some(n.clone());
    }
    if let Some(kw) = &args.header_keyword {
        config.file_source.header_keyword = Some(kw.clone());
    }
    if let Some(w) = &args.weights {
        config.scoring.weights = Some(parse_weights(w)?);
    }
    if let Some(d) = &args.direction {
        config.scoring.direction = Some(d.clone());
    }
    if let Some(n) = args.top {
        config.scoring.top_n = Some(n);
    }
    if let Some(g) = &args.group_by {
        config.scoring.group_by = Some(g.split(',').map(|s| s.trim().to_string()).collect());
    }
    if !args.province.is_empty() {
        config.filter.provinces = Some(args.province.clone());
    }
    if !args.guild.is_empty() {
        config.filter.guilds = Some(args.guild.clone());
    }
    if !args.provider.is_empty() {
        config.filter.providers = Some(args.provider.clone());
    }
    if let Some(o) = &args.out {
        config.output_settings.output_file = Some(o.clone());
    }
    if let Some(e) = &args.export {
        config.output_settings.export_file = Some(e.clone());
    }
    debug!("config_from_args: {:?}", config);
    Ok(config)
}

fn opt_label(l: Option<&Label>) -> JSValue {
    match l {
        Some(l) => json!(l.display()),
        None => JSValue::Null,
    }
}

fn record_to_json(r: &CanonicalRecord) -> JSValue {
    json!({
        "sourceRow": r.source_row,
        "provider": r.provider.display(),
        "province": opt_label(r.province.as_ref()),
        "guild": opt_label(r.guild.as_ref()),
        "price": r.price,
        "speed": r.speed,
        "quality": r.quality,
        "documentation": r.documentation,
        "finalScore": r.final_score,
    })
}

fn ranked_to_json(r: &Ranked) -> JSValue {
    json!({ "value": r.value, "record": record_to_json(r.record) })
}

fn key_to_json(key: &[Label]) -> Vec<String> {
    key.iter().map(|l| l.display().to_string()).collect()
}

fn summary_to_json(s: &Summary) -> JSValue {
    json!({
        "records": s.records,
        "providers": s.providers,
        "provinces": s.provinces,
        "guilds": s.guilds,
        "meanFinalScore": s.mean_final_score,
        "meanCompositeScore": s.mean_composite,
    })
}

fn groups_to_json(agg: &GroupedAggregate) -> JSValue {
    let values: Vec<JSValue> = agg
        .groups
        .iter()
        .map(|g| {
            let mut means: JSMap<String, JSValue> = JSMap::new();
            for (metric, mean) in agg.metrics.iter().zip(g.means.iter()) {
                means.insert(metric.name().to_string(), json!(mean));
            }
            json!({ "key": key_to_json(&g.key), "records": g.records, "means": means })
        })
        .collect();
    let by: Vec<&str> = agg.keys.fields().iter().map(|f| f.name()).collect();
    json!({ "by": by, "values": values })
}

fn resolution_to_json(table: &CanonicalTable) -> JSValue {
    let columns: Vec<JSValue> = table
        .bindings()
        .iter()
        .map(|b| {
            json!({
                "field": b.field.name(),
                "column": b.column_index,
                "header": b.original_name,
                "alias": b.alias,
            })
        })
        .collect();
    json!({
        "headerRow": table.header_row(),
        "records": table.len(),
        "unreadableNumbers": table.coercion_issues(),
        "columns": columns,
    })
}

fn columns_to_json(table: &CanonicalTable, weights: Option<&Weights>) -> JSValue {
    let mut res: JSMap<String, JSValue> = JSMap::new();
    for c in table_columns(table, weights) {
        let values = match c.values {
            ColumnValues::Text(v) => json!(v),
            ColumnValues::Numeric(v) => json!(v),
        };
        res.insert(c.name, values);
    }
    JSValue::Object(res)
}

/// An aggregate that has nothing to work on becomes a null section of the report.
fn section<T, F>(name: &str, res: Result<T, ScorecardError>, f: F) -> ReportResult<JSValue>
where
    F: FnOnce(T) -> JSValue,
{
    match res {
        Ok(x) => Ok(f(x)),
        Err(ScorecardError::EmptyResult { operation }) => {
            warn!("section {}: no data ({})", name, operation);
            Ok(JSValue::Null)
        }
        Err(e) => Err(e.into()),
    }
}

fn build_report_js(
    config: &ReportConfig,
    plan: &ScoringPlan,
    table: &CanonicalTable,
    filtered: &CanonicalTable,
) -> ReportResult<JSValue> {
    let weights = if plan.weights.is_empty() {
        None
    } else {
        Some(&plan.weights)
    };
    let mut weights_js: JSMap<String, JSValue> = JSMap::new();
    for (field, w) in plan.weights.entries() {
        weights_js.insert(field.name().to_string(), json!(w));
    }
    let group_fields = plan.group_keys.fields();
    let group_names: Vec<&str> = group_fields.iter().map(|f| f.name()).collect();

    let mut js: JSMap<String, JSValue> = JSMap::new();
    js.insert(
        "report".to_string(),
        json!({
            "name": config.output_settings.report_name,
            "source": simplify_file_name(&config.file_source.file_path),
            "rankMetric": plan.rank_metric.name(),
            "direction": plan.direction.name(),
            "topN": plan.top_n,
            "groupBy": group_names,
            "weights": weights_js,
        }),
    );
    js.insert("resolution".to_string(), resolution_to_json(table));

    if filtered.is_empty() {
        warn!(
            "build_report_js: the selection is empty ({} records before filtering)",
            table.len()
        );
        js.insert("status".to_string(), json!("empty"));
        js.insert(
            "message".to_string(),
            json!("No data for this selection"),
        );
        return Ok(JSValue::Object(js));
    }
    js.insert("status".to_string(), json!("ok"));

    js.insert(
        "summary".to_string(),
        section("summary", summarize(filtered, weights), |s| {
            summary_to_json(&s)
        })?,
    );

    let ranking = top_n(filtered, &plan.rank_metric, plan.direction, plan.top_n);
    let profile = match &ranking {
        Ok(r) if !r.is_empty() => {
            let metrics = [
                NumericField::Price,
                NumericField::Speed,
                NumericField::Quality,
                NumericField::Documentation,
            ];
            let pairs: Vec<JSValue> = profile_series(r[0].record, &metrics)
                .into_iter()
                .map(|(name, value)| json!({ "metric": name, "value": value }))
                .collect();
            json!({ "provider": r[0].record.provider.display(), "values": pairs })
        }
        _ => JSValue::Null,
    };
    js.insert(
        "ranking".to_string(),
        section("ranking", ranking, |r| {
            JSValue::Array(r.iter().map(ranked_to_json).collect())
        })?,
    );

    js.insert(
        "bestPerGroup".to_string(),
        section(
            "bestPerGroup",
            best_per_group(filtered, plan.group_keys, &plan.rank_metric, plan.direction),
            |l| {
                JSValue::Array(
                    l.iter()
                        .map(|b| {
                            json!({
                                "key": key_to_json(&b.key),
                                "value": b.value,
                                "record": record_to_json(b.record),
                            })
                        })
                        .collect(),
                )
            },
        )?,
    );

    js.insert(
        "bestProvider".to_string(),
        section(
            "bestProvider",
            extremal_record(
                filtered,
                &Metric::Field(NumericField::FinalScore),
                Direction::Descending,
            ),
            |r| ranked_to_json(&r),
        )?,
    );

    js.insert(
        "groups".to_string(),
        section(
            "groups",
            mean_by_group(filtered, plan.group_keys, &NumericField::ALL),
            |agg| groups_to_json(&agg),
        )?,
    );

    let bar = section(
        "bar",
        bar_series(filtered, group_fields[0], NumericField::FinalScore),
        |l| {
            JSValue::Array(
                l.into_iter()
                    .map(|(category, value)| json!({ "category": category, "value": value }))
                    .collect(),
            )
        },
    )?;
    let scatter: Vec<JSValue> = scatter_series(
        filtered,
        NumericField::Price,
        NumericField::Speed,
        GroupField::Guild,
    )
    .into_iter()
    .map(|p| json!({ "x": p.x, "y": p.y, "category": p.category, "provider": p.provider }))
    .collect();
    js.insert(
        "charts".to_string(),
        json!({ "bar": bar, "profile": profile, "scatter": scatter }),
    );

    js.insert("table".to_string(), columns_to_json(filtered, weights));
    Ok(JSValue::Object(js))
}

/// Runs one report: resolution, filtering, scoring, output and the optional comparison.
pub fn run_report(
    session: &mut Session,
    config: &ReportConfig,
    reference_path: Option<&str>,
) -> ReportResult<JSValue> {
    let aliases = validate_aliases(&config.columns)?;
    let plan = validate_scoring(&config.scoring)?;
    let filter = validate_filter(&config.filter)?;
    info!(
        "run_report: {:?} rank metric: {} direction: {}",
        config.output_settings.report_name,
        plan.rank_metric.name(),
        plan.direction.name()
    );

    let table = session.load_table(&config.file_source, &aliases)?;
    let filtered = filter.apply(table);
    info!(
        "run_report: {} records, {} after filtering",
        table.len(),
        filtered.len()
    );

    let result_js = build_report_js(config, &plan, table, &filtered)?;
    let pretty_js = serde_json::to_string_pretty(&result_js).context(SerializingJsonSnafu {})?;

    match config.output_settings.output_file.as_deref() {
        None | Some("") | Some("stdout") => println!("{}", pretty_js),
        Some(path) => {
            fs::write(path, &pretty_js).context(WritingOutputSnafu { path })?;
            info!("run_report: report written to {:?}", path);
        }
    }

    if let Some(path) = config.output_settings.export_file.as_deref() {
        let weights = if plan.weights.is_empty() {
            None
        } else {
            Some(&plan.weights)
        };
        write_export(path, &filtered, weights)?;
    }

    // The reference report, if provided for comparison
    if let Some(path) = reference_path {
        let reference = read_reference(path)?;
        let pretty_reference =
            serde_json::to_string_pretty(&reference).context(SerializingJsonSnafu {})?;
        if pretty_reference != pretty_js {
            warn!("Found differences with the reference report");
            print_diff(pretty_reference.as_str(), pretty_js.as_str(), "\n");
            return ReferenceMismatchSnafu { path }.fail();
        }
        info!("run_report: the report matches {:?}", path);
    }

    Ok(result_js)
}

/// Runs every report given on the command line.
pub fn run(args: &Args) -> ReportResult<()> {
    let config_paths: Vec<Option<&str>> = if args.config.is_empty() {
        vec![None]
    } else {
        args.config.iter().map(|c| Some(c.as_str())).collect()
    };
    if args.reference.is_some() && config_paths.len() > 1 {
        whatever!("--reference can only be used with a single report");
    }

    let mut session = Session::new();
    for config_path in config_paths {
        let config = config_from_args(args, config_path)?;
        run_report(&mut session, &config, args.reference.as_deref())?;
    }
    debug!("run: {} cached resolutions reused", session.cache_hits());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROVIDERS_CSV: &str = "Informe de proveedores;;;;;;;
Colaborador;Provincia;Gremio;Puntuación precio;Puntuación velocidad;Calidad;Documentación;Nota final
Reformas Sur;Sevilla;Pintura;4;2;8;7;8,5
Electra;Madrid;Electricidad;3;5;6;6;6
Aguas Claras;sevilla;Fontanería;2;3;9;8;9
";

    fn fixture(name: &str, contents: &str) -> String {
        let p = std::env::temp_dir().join(format!("scorecard_{}", name));
        fs::write(&p, contents).unwrap();
        p.display().to_string()
    }

    fn temp_path(name: &str) -> String {
        std::env::temp_dir()
            .join(format!("scorecard_{}", name))
            .display()
            .to_string()
    }

    fn config_for(input: &str, output: &str) -> ReportConfig {
        let mut config = ReportConfig::default();
        config.file_source.file_path = input.to_string();
        config.output_settings.output_file = Some(output.to_string());
        config
    }

    #[test]
    fn composite_ranking() {
        let input = fixture("composite.csv", PROVIDERS_CSV);
        let mut config = config_for(&input, &temp_path("composite_out.json"));
        config.scoring.weights = Some(parse_weights("Speed=0.5,Price=0.5").unwrap());

        let js = run_report(&mut Session::new(), &config, None).unwrap();
        assert_eq!(js["status"], json!("ok"));
        assert_eq!(js["resolution"]["headerRow"], json!(1));
        assert_eq!(js["report"]["rankMetric"], json!("CompositeScore"));
        assert_eq!(js["report"]["direction"], json!("ascending"));
        let ranking = js["ranking"].as_array().unwrap();
        assert_eq!(ranking.len(), 3);
        assert_eq!(ranking[0]["record"]["provider"], json!("Aguas Claras"));
        assert_eq!(ranking[0]["value"], json!(2.5));
        assert_eq!(ranking[2]["record"]["provider"], json!("Electra"));

        let best = js["bestPerGroup"].as_array().unwrap();
        assert_eq!(best.len(), 2);
        assert_eq!(best[0]["key"], json!(["Sevilla"]));
        assert_eq!(best[0]["record"]["provider"], json!("Aguas Claras"));
        assert_eq!(js["bestProvider"]["record"]["provider"], json!("Aguas Claras"));
        assert_eq!(js["summary"]["provinces"], json!(2));
        assert_eq!(js["charts"]["profile"]["provider"], json!("Aguas Claras"));
    }

    #[test]
    fn final_score_is_the_default_metric() {
        let input = fixture("default_metric.csv", PROVIDERS_CSV);
        let config = config_for(&input, &temp_path("default_metric_out.json"));
        let js = run_report(&mut Session::new(), &config, None).unwrap();
        assert_eq!(js["report"]["rankMetric"], json!("FinalScore"));
        assert_eq!(js["ranking"][0]["record"]["provider"], json!("Aguas Claras"));
        assert_eq!(js["ranking"][0]["value"], json!(9.0));
        let bar = js["charts"]["bar"].as_array().unwrap();
        assert_eq!(bar[0], json!({ "category": "Sevilla", "value": 8.75 }));
        assert_eq!(bar[1], json!({ "category": "Madrid", "value": 6.0 }));
    }

    #[test]
    fn empty_selection_is_not_an_error() {
        let input = fixture("empty_selection.csv", PROVIDERS_CSV);
        let mut config = config_for(&input, &temp_path("empty_selection_out.json"));
        config.filter.provinces = Some(vec!["Cádiz".to_string()]);
        let js = run_report(&mut Session::new(), &config, None).unwrap();
        assert_eq!(js["status"], json!("empty"));
        assert!(js.get("ranking").is_none());
        assert_eq!(js["resolution"]["records"], json!(3));
    }

    #[test]
    fn reference_comparison() {
        let input = fixture("reference.csv", PROVIDERS_CSV);
        let output = temp_path("reference_out.json");
        let config = config_for(&input, &output);
        let mut session = Session::new();
        run_report(&mut session, &config, None).unwrap();

        // The same report, compared against itself.
        run_report(&mut session, &config, Some(&output)).unwrap();
        assert_eq!(session.cache_hits(), 1);

        let other = fixture("reference_other.json", r#"{ "status": "ok" }"#);
        let res = run_report(&mut session, &config, Some(&other));
        assert!(matches!(res, Err(ReportError::ReferenceMismatch { .. })));
    }

    #[test]
    fn missing_columns_are_reported() {
        let input = fixture(
            "missing_columns.csv",
            "Colaborador;Provincia\nElectra;Madrid\n",
        );
        let config = config_for(&input, &temp_path("missing_columns_out.json"));
        let res = run_report(&mut Session::new(), &config, None);
        match res {
            Err(ReportError::Scoring {
                source: ScorecardError::SchemaResolution { missing, .. },
            }) => {
                assert_eq!(missing.len(), 6);
                assert!(missing.contains(&CanonicalField::Guild));
            }
            x => panic!("unexpected result {:?}", x),
        }
    }

    #[test]
    fn unknown_extensions_are_unsupported() {
        let input = fixture("datos.pdf", "%PDF");
        let config = config_for(&input, &temp_path("pdf_out.json"));
        let res = run_report(&mut Session::new(), &config, None);
        assert!(matches!(res, Err(ReportError::UnsupportedFile { .. })));
    }

    #[test]
    fn export_writes_the_filtered_table() {
        let input = fixture("export.csv", PROVIDERS_CSV);
        let export = temp_path("export_filtered.csv");
        let mut config = config_for(&input, &temp_path("export_out.json"));
        config.output_settings.export_file = Some(export.clone());
        config.filter.provinces = Some(vec!["SEVILLA".to_string()]);
        config.scoring.weights = Some(parse_weights("Price=1").unwrap());
        run_report(&mut Session::new(), &config, None).unwrap();
        let contents = fs::read_to_string(&export).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with("Nota final,CompositeScore"));
        assert!(lines[1].starts_with("Reformas Sur,Sevilla,Pintura,4,"));
    }

    #[test]
    fn config_paths_are_relative_to_the_config() {
        let dir = std::env::temp_dir().join("scorecard_config_dir");
        fs::create_dir_all(&dir).unwrap();
        let config_path = dir.join("report.json");
        fs::write(
            &config_path,
            r#"{ "fileSource": { "filePath": "datos.csv" },
                 "outputSettings": { "reportName": "Sur", "outputFile": "stdout" },
                 "scoring": { "topN": 2 } }"#,
        )
        .unwrap();
        let args = Args {
            top: Some(3),
            province: vec!["Sevilla".to_string()],
            ..Args::default()
        };
        let config =
            config_from_args(&args, Some(config_path.display().to_string().as_str())).unwrap();
        assert_eq!(
            config.file_source.file_path,
            dir.join("datos.csv").display().to_string()
        );
        assert_eq!(config.output_settings.output_file, Some("stdout".to_string()));
        assert_eq!(config.scoring.top_n, Some(3));
        assert_eq!(config.filter.provinces, Some(vec!["Sevilla".to_string()]));
    }
}
