use log::{debug, info};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::config::*;
use crate::resolver::resolve_table;

/// Resolved tables, keyed by the content of the file they came from.
///
/// The key also covers the header keyword and the alias table, since both
/// change the outcome of a resolution.
#[derive(Debug, Default)]
pub struct ResolutionCache {
    entries: HashMap<String, CanonicalTable>,
    hits: usize,
}

impl ResolutionCache {
    pub fn new() -> ResolutionCache {
        ResolutionCache::default()
    }

    pub fn cache_key(bytes: &[u8], keyword: &str, aliases: &AliasTable) -> String {
        let settings = format!("{}|{:?}", keyword, aliases);
        format!(
            "{}-{}",
            sha256::digest(bytes),
            sha256::digest(settings.as_str())
        )
    }

    /// Returns the table resolved from these bytes, loading and resolving it on first use.
    ///
    /// `load` turns the bytes into a raw table. It is only called on a miss.
    pub fn get_or_resolve<E, F>(
        &mut self,
        bytes: &[u8],
        keyword: &str,
        aliases: &AliasTable,
        load: F,
    ) -> Result<&CanonicalTable, E>
    where
        F: FnOnce() -> Result<RawTable, E>,
        E: From<ScorecardError>,
    {
        let key = ResolutionCache::cache_key(bytes, keyword, aliases);
        match self.entries.entry(key) {
            Entry::Occupied(e) => {
                self.hits += 1;
                debug!("ResolutionCache: hit for {}", e.key());
                Ok(e.into_mut())
            }
            Entry::Vacant(e) => {
                info!("ResolutionCache: resolving {} bytes", bytes.len());
                let raw = load()?;
                let table = resolve_table(&raw, keyword, aliases)?;
                Ok(e.insert(table))
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::RawTableBuilder;

    fn raw() -> RawTable {
        RawTableBuilder::new()
            .text_row(&[
                "Colaborador",
                "Provincia",
                "Gremio",
                "Precio",
                "Velocidad",
                "Calidad",
                "Documentación",
                "Nota final",
            ])
            .text_row(&["A", "Madrid", "Pintura", "1", "2", "3", "4", "5"])
            .build()
    }

    #[test]
    fn same_bytes_are_resolved_once() {
        let mut cache = ResolutionCache::new();
        let aliases = AliasTable::default();
        let mut loads = 0;
        for _ in 0..3 {
            let table = cache
                .get_or_resolve::<ScorecardError, _>(b"file-1", "Colaborador", &aliases, || {
                    loads += 1;
                    Ok(raw())
                })
                .unwrap();
            assert_eq!(table.len(), 1);
        }
        assert_eq!(loads, 1);
        assert_eq!(cache.hits(), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn keyword_is_part_of_the_key() {
        let aliases = AliasTable::default();
        assert_ne!(
            ResolutionCache::cache_key(b"x", "Colaborador", &aliases),
            ResolutionCache::cache_key(b"x", "Proveedor", &aliases)
        );
    }

    #[test]
    fn failed_resolutions_are_not_cached() {
        let mut cache = ResolutionCache::new();
        let aliases = AliasTable::default();
        let res = cache.get_or_resolve::<ScorecardError, _>(b"bad", "Colaborador", &aliases, || {
            Ok(RawTableBuilder::new().text_row(&["Colaborador"]).build())
        });
        assert!(matches!(res, Err(ScorecardError::SchemaResolution { .. })));
        assert!(cache.is_empty());
    }
}
