use std::path::Path;

use scorecard_core::Cell;

/// The kinds of files the readers understand.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum InputKind {
    Excel,
    Csv,
}

impl InputKind {
    pub fn parse(s: &str) -> Option<InputKind> {
        match s.trim().to_lowercase().as_str() {
            "excel" | "xlsx" | "xls" | "ods" => Some(InputKind::Excel),
            "csv" => Some(InputKind::Csv),
            _ => None,
        }
    }

    /// Guesses the kind of a file from its extension.
    pub fn from_path(path: &str) -> Option<InputKind> {
        let ext = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())?;
        match ext.as_str() {
            "xlsx" | "xlsm" | "xlsb" | "xls" | "xla" | "ods" => Some(InputKind::Excel),
            "csv" | "txt" => Some(InputKind::Csv),
            _ => None,
        }
    }
}

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
        .to_string()
}

pub fn text_cell(s: &str) -> Cell {
    if s.trim().is_empty() {
        Cell::Empty
    } else {
        Cell::Text(s.to_string())
    }
}

/// Semicolons are the usual separator of CSV files exported with a Spanish locale.
pub fn guess_delimiter(bytes: &[u8]) -> u8 {
    let first_line = bytes.split(|b| *b == b'\n').next().unwrap_or(&[]);
    let count = |c: u8| first_line.iter().filter(|b| **b == c).count();
    if count(b';') > count(b',') {
        b';'
    } else if count(b'\t') > count(b',') {
        b'\t'
    } else {
        b','
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_extensions() {
        assert_eq!(InputKind::from_path("a/b/datos.XLSX"), Some(InputKind::Excel));
        assert_eq!(InputKind::from_path("datos.csv"), Some(InputKind::Csv));
        assert_eq!(InputKind::from_path("datos.pdf"), None);
        assert_eq!(InputKind::from_path("datos"), None);
        assert_eq!(InputKind::parse("Excel"), Some(InputKind::Excel));
    }

    #[test]
    fn delimiter_is_guessed_from_first_line() {
        assert_eq!(guess_delimiter(b"a;b;c\n1,5;2;3"), b';');
        assert_eq!(guess_delimiter(b"a,b,c\n1;2;3"), b',');
        assert_eq!(guess_delimiter(b"a\tb\tc"), b'\t');
        assert_eq!(simplify_file_name("/tmp/x/datos.csv"), "datos.csv");
    }
}
