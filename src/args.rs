use clap::Parser;

/// This is a reporting program for service-provider spreadsheets.
#[derive(Parser, Debug, Clone, Default)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional, repeatable) A JSON report description. Several reports may be
    /// run in one invocation; reports reading the same spreadsheet resolve it only once.
    /// For more information about the file format, read the manual of scorecard_core.
    #[clap(short, long, value_parser)]
    pub config: Vec<String>,

    /// (file path) A reference file containing the expected report in JSON format. If provided,
    /// scorecard will check that the computed report matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the report will be written in JSON format to the given
    /// location. Setting this option overrides the path that may be specified with the --config option.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path or empty) The spreadsheet to read. Setting this option overrides what may be
    /// specified with the --config option. Defaults to proveedores_principales_provincias.xlsx.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (excel or csv) The type of the input. Guessed from the file extension if not specified.
    #[clap(long, value_parser)]
    pub input_type: Option<String>,

    /// When using a spreadsheet with several worksheets, indicates the name of the worksheet to use.
    #[clap(long, value_parser)]
    pub excel_worksheet_name: Option<String>,

    /// (default Colaborador) The text that identifies the header row.
    #[clap(long, value_parser)]
    pub header_keyword: Option<String>,

    /// (list of comma-separated FIELD=WEIGHT) The weights of the composite score, for example
    /// Speed=0.7,Price=0.3.
    #[clap(long, value_parser)]
    pub weights: Option<String>,

    /// (ascending or descending) Whether lower or higher scores are better.
    #[clap(long, value_parser)]
    pub direction: Option<String>,

    /// (default 5) The number of records in the ranking.
    #[clap(long, value_parser)]
    pub top: Option<usize>,

    /// (one or two comma-separated fields, default Province) The fields to group on.
    #[clap(long, value_parser)]
    pub group_by: Option<String>,

    /// (repeatable) Keep only the records of these provinces.
    #[clap(long, value_parser)]
    pub province: Vec<String>,

    /// (repeatable) Keep only the records of these guilds.
    #[clap(long, value_parser)]
    pub guild: Vec<String>,

    /// (repeatable) Keep only the records of these providers.
    #[clap(long, value_parser)]
    pub provider: Vec<String>,

    /// (file path) If specified, the filtered table will be written to this location in CSV format.
    #[clap(long, value_parser)]
    pub export: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
