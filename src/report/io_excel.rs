// Primitives for reading spreadsheet files.

use calamine::{open_workbook_auto, DataType, Range, Reader};

use scorecard_core::builder::RawTableBuilder;
use scorecard_core::resolver::detect_header_row;

use crate::report::{io_common::text_cell, *};

pub fn read_excel_table(path: &str, cfs: &FileSource) -> ReportResult<RawTable> {
    let wrange = get_range(path, cfs)?;
    debug!(
        "read_excel_table: path: {:?} size: {:?}",
        path,
        wrange.get_size()
    );

    let table = range_to_table(&wrange);
    info!(
        "read_excel_table: read {} rows from {:?}",
        table.len(),
        path
    );
    Ok(table)
}

fn read_cell(cell: &DataType) -> Cell {
    match cell {
        DataType::Empty => Cell::Empty,
        DataType::String(s) => text_cell(s),
        DataType::Float(f) => Cell::Number(*f),
        DataType::Int(i) => Cell::Number(*i as f64),
        DataType::Bool(b) => Cell::Text(b.to_string()),
        // Dates are serial numbers.
        DataType::DateTime(f) => Cell::Number(*f),
        // Formula errors (#DIV/0!, #N/A...) end up as unreadable numbers.
        other => Cell::Text(format!("{:?}", other)),
    }
}

fn get_range(path: &str, cfs: &FileSource) -> ReportResult<Range<DataType>> {
    let worksheet_name_o = cfs.excel_worksheet_name.clone();
    debug!(
        "get_range: path: {:?} worksheet: {:?}",
        path, &worksheet_name_o
    );
    let mut workbook = match open_workbook_auto(path) {
        Ok(wb) => wb,
        Err(e) => {
            return UnsupportedFileSnafu {
                path,
                reason: e.to_string(),
            }
            .fail();
        }
    };

    // A worksheet name was provided, use it.
    if let Some(worksheet_name) = worksheet_name_o {
        match workbook.worksheet_range(&worksheet_name) {
            Some(Ok(wrange)) => Ok(wrange),
            Some(Err(e)) => UnsupportedFileSnafu {
                path,
                reason: e.to_string(),
            }
            .fail(),
            None => MissingWorksheetSnafu {
                name: worksheet_name,
                path,
            }
            .fail(),
        }
    } else {
        let all_worksheets = workbook.worksheets();
        match all_worksheets.as_slice() {
            [] => EmptyWorkbookSnafu { path }.fail(),
            [(worksheet_name, wrange)] => {
                debug!("get_range: using the only worksheet {:?}", worksheet_name);
                Ok(wrange.clone())
            }
            [(first_name, first_range), ..] => {
                // Pick the sheet that carries the header keyword.
                let keyword = cfs.header_keyword();
                let candidates: Vec<&(String, Range<DataType>)> = all_worksheets
                    .iter()
                    .filter(|(_, wrange)| {
                        detect_header_row(&range_to_table(wrange), keyword).is_some()
                    })
                    .collect();
                match candidates.as_slice() {
                    [(worksheet_name, wrange)] => {
                        info!(
                            "get_range: worksheet {:?} contains the header keyword {:?}",
                            worksheet_name, keyword
                        );
                        Ok(wrange.clone())
                    }
                    [] => {
                        warn!(
                            "get_range: no worksheet of {:?} contains {:?}, using the first one ({:?})",
                            path, keyword, first_name
                        );
                        Ok(first_range.clone())
                    }
                    _ => AmbiguousWorksheetSnafu {
                        path,
                        names: candidates
                            .iter()
                            .map(|(n, _)| n.clone())
                            .collect::<Vec<String>>(),
                    }
                    .fail(),
                }
            }
        }
    }
}

fn range_to_table(wrange: &Range<DataType>) -> RawTable {
    let mut builder = RawTableBuilder::new();
    for row in wrange.rows() {
        builder.push_row(row.iter().map(read_cell).collect());
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells_keep_their_type() {
        assert_eq!(read_cell(&DataType::Int(3)), Cell::Number(3.0));
        assert_eq!(read_cell(&DataType::Float(2.5)), Cell::Number(2.5));
        assert_eq!(read_cell(&DataType::String(" ".to_string())), Cell::Empty);
        assert_eq!(
            read_cell(&DataType::String("Madrid".to_string())),
            Cell::Text("Madrid".to_string())
        );
        assert_eq!(read_cell(&DataType::Empty), Cell::Empty);
    }

    #[test]
    fn unreadable_files_are_unsupported() {
        let p = std::env::temp_dir().join("scorecard_not_a_workbook.xlsx");
        std::fs::write(&p, b"this is not a zip archive").unwrap();
        let path = p.display().to_string();
        let res = read_excel_table(&path, &FileSource::default());
        assert!(matches!(res, Err(ReportError::UnsupportedFile { .. })));
    }
}
