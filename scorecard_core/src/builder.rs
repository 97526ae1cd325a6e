pub use crate::config::*;

/// A builder for raw tables.
///
/// The file readers push rows cell by cell; tests and callers that already
/// hold text can use the shortcuts.
///
/// ```
/// use scorecard_core::builder::RawTableBuilder;
/// use scorecard_core::resolver::resolve_table;
/// use scorecard_core::{AliasTable, ScorecardError};
///
/// let raw = RawTableBuilder::new()
///     .text_row(&["Listado de proveedores 2025"])
///     .text_row(&["Colaborador", "Provincia", "Gremio", "Precio", "Velocidad",
///                 "Calidad", "Documentación", "Nota final"])
///     .text_row(&["Reformas Sur", "Sevilla", "Pintura", "20", "10", "8", "7", "8,5"])
///     .build();
///
/// let table = resolve_table(&raw, "Colaborador", &AliasTable::default())?;
/// assert_eq!(table.len(), 1);
/// # Ok::<(), ScorecardError>(())
/// ```
#[derive(Debug, Default)]
pub struct RawTableBuilder {
    rows: Vec<Vec<Cell>>,
}

impl RawTableBuilder {
    pub fn new() -> RawTableBuilder {
        RawTableBuilder { rows: Vec::new() }
    }

    /// Adds a row of text cells. Empty strings are blank cells.
    pub fn text_row(mut self, cells: &[&str]) -> RawTableBuilder {
        self.rows.push(cells.iter().map(|s| Cell::from(*s)).collect());
        self
    }

    pub fn push_row(&mut self, cells: Vec<Cell>) {
        self.rows.push(cells);
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn build(self) -> RawTable {
        RawTable::new(self.rows)
    }
}
