// Primitives for reading and writing CSV files.

use scorecard_core::builder::RawTableBuilder;
use scorecard_core::views::export_rows;

use crate::report::{
    io_common::{guess_delimiter, text_cell},
    *,
};

pub fn read_csv_table(path: &str, bytes: &[u8], cfs: &FileSource) -> ReportResult<RawTable> {
    let delimiter = match cfs.csv_delimiter_byte()? {
        Some(d) => d,
        None => guess_delimiter(bytes),
    };
    debug!(
        "read_csv_table: path: {:?} delimiter: {:?}",
        path, delimiter as char
    );
    let rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(bytes);

    let mut builder = RawTableBuilder::new();
    for (idx, line_r) in rdr.into_records().enumerate() {
        let line = match line_r {
            Ok(l) => l,
            Err(e) => {
                return UnsupportedFileSnafu {
                    path,
                    reason: format!("line {}: {}", idx + 1, e),
                }
                .fail();
            }
        };
        builder.push_row(line.iter().map(text_cell).collect());
    }
    info!(
        "read_csv_table: read {} rows from {:?}",
        builder.num_rows(),
        path
    );
    Ok(builder.build())
}

/// Writes the table with the display names as header.
pub fn write_export(
    path: &str,
    table: &CanonicalTable,
    weights: Option<&Weights>,
) -> ReportResult<()> {
    let (header, rows) = export_rows(table, weights);
    let mut wtr = csv::Writer::from_path(path).context(WritingExportSnafu { path })?;
    wtr.write_record(&header)
        .context(WritingExportSnafu { path })?;
    for row in rows.iter() {
        wtr.write_record(row).context(WritingExportSnafu { path })?;
    }
    wtr.flush().context(WritingOutputSnafu { path })?;
    info!("write_export: wrote {} rows to {:?}", rows.len(), path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn semicolon_files_are_read() {
        let bytes = "Informe;;\nColaborador;Provincia;Precio\nReformas Sur;Sevilla;4,5\n";
        let table = read_csv_table("x.csv", bytes.as_bytes(), &FileSource::default()).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.rows[2][2], Cell::Text("4,5".to_string()));
        assert_eq!(table.rows[0][1], Cell::Empty);
    }

    #[test]
    fn ragged_rows_are_kept() {
        let bytes = "a,b,c\n1,2\n";
        let table = read_csv_table("x.csv", bytes.as_bytes(), &FileSource::default()).unwrap();
        assert_eq!(table.rows[1].len(), 2);
    }

    #[test]
    fn invalid_utf8_is_unsupported() {
        let bytes: &[u8] = b"Colaborador,Precio\n\xff\xfe,1\n";
        let res = read_csv_table("x.csv", bytes, &FileSource::default());
        assert!(matches!(res, Err(ReportError::UnsupportedFile { .. })));
    }

    #[test]
    fn export_has_display_header() {
        let p = std::env::temp_dir().join("scorecard_export_test.csv");
        let path = p.display().to_string();
        let mut r = CanonicalRecord::new(Label::new("Electra").unwrap());
        r.price = Some(4.5);
        let table = CanonicalTable::from_records(vec![r]);
        write_export(&path, &table, None).unwrap();
        let contents = std::fs::read_to_string(&p).unwrap();
        let mut lines = contents.lines();
        assert_eq!(
            lines.next(),
            Some("Colaborador,Provincia,Gremio,Precio,Velocidad,Calidad,Documentación,Nota final")
        );
        assert_eq!(lines.next(), Some("Electra,,,4.5,,,,"));
    }
}
