//! Locates the header of a loosely structured table and maps its columns to the
//! canonical schema.

use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::config::*;

/// The lookup form of a column name.
///
/// Lower-cased, without diacritics, and with every run of punctuation or
/// whitespace collapsed into a single space.
pub fn normalize_name(raw: &str) -> String {
    let mut res = String::new();
    let mut pending_separator = false;
    // Lower-casing first: some lower-case forms introduce combining marks.
    for c in raw.to_lowercase().nfd().filter(|c| !is_combining_mark(*c)) {
        if c.is_alphanumeric() {
            if pending_separator && !res.is_empty() {
                res.push(' ');
            }
            pending_separator = false;
            res.push(c);
        } else {
            pending_separator = true;
        }
    }
    res
}

/// Returns the index of the row that has a cell matching the keyword.
///
/// A cell equal to the keyword beats a cell containing it as whole words,
/// which beats a cell containing it as a substring. Among rows of the same
/// strength the first one wins. This keeps a title such as "Listado de
/// colaboradores" from being taken for the header.
pub fn detect_header_row(raw: &RawTable, keyword: &str) -> Option<usize> {
    let needle = normalize_name(keyword);
    if needle.is_empty() {
        return None;
    }
    let mut best: Option<(u8, usize)> = None;
    for (idx, row) in raw.rows.iter().enumerate() {
        let strength = row
            .iter()
            .filter_map(|c| c.as_text())
            .map(|s| keyword_strength(&normalize_name(&s), &needle))
            .max()
            .unwrap_or(0);
        if strength == 3 {
            return Some(idx);
        }
        if strength > 0 && best.map_or(true, |(b, _)| strength > b) {
            best = Some((strength, idx));
        }
    }
    best.map(|(_, idx)| idx)
}

fn keyword_strength(name: &str, needle: &str) -> u8 {
    if name == needle {
        3
    } else if word_match(name, needle).is_some() {
        2
    } else if name.contains(needle) {
        1
    } else {
        0
    }
}

/// Given the header of a table, finds the column bound to each canonical field.
///
/// Exact names are bound first for every field, then the remaining fields
/// look for their aliases as whole words among the remaining columns. A
/// column is bound to at most one field. If some required fields cannot be
/// found, the error lists all of them.
pub fn resolve_columns(
    header: &[Cell],
    aliases: &AliasTable,
) -> Result<Vec<ColumnBinding>, ScorecardError> {
    // (normalized name, index, original name), in column order.
    let columns: Vec<(String, usize, String)> = header
        .iter()
        .enumerate()
        .filter_map(|(idx, c)| c.as_text().map(|s| (normalize_name(&s), idx, s)))
        .filter(|(n, _, _)| !n.is_empty())
        .collect();

    // The first column wins when two columns normalize to the same name.
    let mut by_name: HashMap<&str, (usize, &str)> = HashMap::new();
    for (n, idx, orig) in columns.iter() {
        by_name.entry(n.as_str()).or_insert((*idx, orig.as_str()));
    }
    debug!("resolve_columns: columns: {:?}", columns);

    let normalized: Vec<Vec<String>> = aliases
        .entries()
        .iter()
        .map(|entry| {
            entry
                .aliases
                .iter()
                .map(|a| normalize_name(a))
                .filter(|a| !a.is_empty())
                .collect()
        })
        .collect();

    // (column index, original name, alias) per entry.
    let mut found: Vec<Option<(usize, &str, String)>> = vec![None; normalized.len()];
    let mut bound: HashSet<usize> = HashSet::new();

    // Exact names first, for every field.
    for (eidx, entry_aliases) in normalized.iter().enumerate() {
        let exact = entry_aliases.iter().find_map(|a| {
            by_name
                .get(a.as_str())
                .filter(|(idx, _)| !bound.contains(idx))
                .map(|(idx, orig)| (*idx, *orig, a.clone()))
        });
        if let Some((idx, orig, alias)) = exact {
            bound.insert(idx);
            found[eidx] = Some((idx, orig, alias));
        }
    }

    // Then whole-word containment over the columns left. A column that starts
    // with the alias is preferred, then the one with the fewest extra words.
    // (starts elsewhere, extra words, alias rank, entry, column)
    let mut candidates: Vec<(bool, usize, usize, usize, usize)> = Vec::new();
    for (eidx, entry_aliases) in normalized.iter().enumerate() {
        if found[eidx].is_some() {
            continue;
        }
        for (rank, a) in entry_aliases.iter().enumerate() {
            for (cidx, (n, idx, _)) in columns.iter().enumerate() {
                if bound.contains(idx) {
                    continue;
                }
                if let Some((position, extra)) = word_match(n, a) {
                    candidates.push((position > 0, extra, rank, eidx, cidx));
                }
            }
        }
    }
    candidates.sort();
    for (_, _, rank, eidx, cidx) in candidates {
        let (_, idx, orig) = &columns[cidx];
        if found[eidx].is_some() || bound.contains(idx) {
            continue;
        }
        bound.insert(*idx);
        found[eidx] = Some((*idx, orig.as_str(), normalized[eidx][rank].clone()));
    }

    let mut bindings: Vec<ColumnBinding> = Vec::new();
    let mut missing: Vec<CanonicalField> = Vec::new();
    for (entry, f) in aliases.entries().iter().zip(found.into_iter()) {
        match f {
            Some((column_index, original_name, alias)) => {
                debug!(
                    "resolve_columns: {} -> column {} {:?} (alias {:?})",
                    entry.field, column_index, original_name, alias
                );
                bindings.push(ColumnBinding {
                    field: entry.field,
                    column_index,
                    original_name: original_name.to_string(),
                    alias,
                });
            }
            None if entry.required => {
                missing.push(entry.field);
            }
            None => {
                info!(
                    "resolve_columns: optional field {} not found, it will be left empty",
                    entry.field
                );
            }
        }
    }

    if !missing.is_empty() {
        return Err(ScorecardError::SchemaResolution {
            missing,
            observed: columns.into_iter().map(|(_, _, orig)| orig).collect(),
        });
    }
    Ok(bindings)
}

// Where the words of `alias` appear consecutively in `name`, as
// (word position, number of words of `name` outside the match).
fn word_match(name: &str, alias: &str) -> Option<(usize, usize)> {
    let name_words: Vec<&str> = name.split(' ').collect();
    let alias_words: Vec<&str> = alias.split(' ').collect();
    if alias_words.is_empty() || alias_words.len() > name_words.len() {
        return None;
    }
    name_words
        .windows(alias_words.len())
        .position(|w| w == alias_words.as_slice())
        .map(|position| (position, name_words.len() - alias_words.len()))
}

/// Reads a number out of a cell.
///
/// The outer option is None when the cell is blank. The inner option is None
/// when the cell has content that is not a number.
pub fn coerce_number(cell: &Cell) -> Option<Option<f64>> {
    match cell {
        Cell::Empty => None,
        Cell::Number(n) if n.is_finite() => Some(Some(*n)),
        Cell::Number(_) => Some(None),
        Cell::Text(s) if s.trim().is_empty() => None,
        Cell::Text(s) => Some(parse_number(s)),
    }
}

/// Parses numbers as they are typed in spreadsheets: decimal comma, thousands
/// separators, trailing percent or euro signs.
///
/// With both `.` and `,` present, the last one is the decimal separator. A
/// separator that repeats must split the number into groups of three digits
/// and is a thousands separator (`"1.234.567"`). A single separator followed
/// by exactly three digits, after a non-zero integer part, is also a
/// thousands separator (`"1.500"` is 1500, as in Spanish exports).
/// Otherwise it is the decimal separator (`"8,5"`, `"0,125"`).
pub fn parse_number(s: &str) -> Option<f64> {
    let trimmed = s
        .trim()
        .trim_end_matches(|c: char| c == '%' || c == '€' || c.is_whitespace());
    let compact: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
    let (sign, digits) = match compact.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", compact.strip_prefix('+').unwrap_or(&compact)),
    };
    if digits.is_empty() {
        return None;
    }
    let cleaned = match (digits.rfind(','), digits.rfind('.')) {
        (Some(comma), Some(dot)) => {
            let (decimal, thousands) = if comma > dot { (',', '.') } else { ('.', ',') };
            let split = digits.rfind(decimal)?;
            if digits.matches(decimal).count() > 1
                || !is_grouped(&digits[..split], thousands)
            {
                return None;
            }
            digits.replace(thousands, "").replace(decimal, ".")
        }
        (Some(_), None) => single_separator(digits, ',')?,
        (None, Some(_)) => single_separator(digits, '.')?,
        (None, None) => digits.to_string(),
    };
    format!("{}{}", sign, cleaned)
        .parse::<f64>()
        .ok()
        .filter(|x| x.is_finite())
}

fn single_separator(digits: &str, sep: char) -> Option<String> {
    let parts: Vec<&str> = digits.split(sep).collect();
    match parts.as_slice() {
        [head, tail]
            if (1..=3).contains(&head.len())
                && !head.starts_with('0')
                && tail.len() == 3
                && is_digits(head)
                && is_digits(tail) =>
        {
            Some(format!("{}{}", head, tail))
        }
        [_, _] => Some(digits.replace(sep, ".")),
        _ if is_grouped(digits, sep) => Some(digits.replace(sep, "")),
        _ => None,
    }
}

// "1.234.567": one to three digits, then groups of exactly three.
fn is_grouped(s: &str, sep: char) -> bool {
    let mut parts = s.split(sep);
    let head = parts.next().unwrap_or("");
    (1..=3).contains(&head.len())
        && is_digits(head)
        && parts.all(|g| g.len() == 3 && is_digits(g))
}

fn is_digits(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_digit())
}

/// Runs the full resolution: header detection, column binding and record construction.
///
/// Rows above the header are dropped. Rows without a provider are dropped.
/// Numeric cells that cannot be read are left missing and counted.
pub fn resolve_table(
    raw: &RawTable,
    keyword: &str,
    aliases: &AliasTable,
) -> Result<CanonicalTable, ScorecardError> {
    if raw.is_empty() {
        return Err(ScorecardError::SchemaResolution {
            missing: aliases.required_fields(),
            observed: vec![],
        });
    }

    let header_row = match detect_header_row(raw, keyword) {
        Some(idx) => {
            debug!("resolve_table: header found at row {}", idx);
            idx
        }
        None => {
            warn!(
                "resolve_table: no row contains {:?}, using the first row as the header",
                keyword
            );
            0
        }
    };

    let bindings = resolve_columns(&raw.rows[header_row], aliases)?;
    let column_of = |field: CanonicalField| -> Option<usize> {
        bindings
            .iter()
            .find(|b| b.field == field)
            .map(|b| b.column_index)
    };
    let provider_col = column_of(CanonicalField::Provider);
    let province_col = column_of(CanonicalField::Province);
    let guild_col = column_of(CanonicalField::Guild);
    let numeric_cols: Vec<(NumericField, usize)> = NumericField::ALL
        .iter()
        .filter_map(|nf| column_of(nf.field()).map(|idx| (*nf, idx)))
        .collect();

    let read_label = |row: &[Cell], col: Option<usize>| -> Option<Label> {
        col.and_then(|idx| row.get(idx))
            .and_then(|c| c.as_text())
            .and_then(|s| Label::new(&s))
    };

    let mut records: Vec<CanonicalRecord> = Vec::new();
    let mut coercion_issues: usize = 0;
    for (row_idx, row) in raw.rows.iter().enumerate().skip(header_row + 1) {
        let provider = match read_label(row, provider_col) {
            Some(p) => p,
            None => {
                debug!("resolve_table: row {}: no provider, skipping", row_idx);
                continue;
            }
        };
        let mut record = CanonicalRecord::new(provider);
        record.source_row = row_idx;
        record.province = read_label(row, province_col);
        record.guild = read_label(row, guild_col);
        for (nf, col) in numeric_cols.iter() {
            let value = match row.get(*col).and_then(coerce_number) {
                Some(Some(x)) => Some(x),
                Some(None) => {
                    debug!(
                        "resolve_table: row {}: {} is not a number: {:?}",
                        row_idx, nf, row[*col]
                    );
                    coercion_issues += 1;
                    None
                }
                None => None,
            };
            record.set_value(*nf, value);
        }
        records.push(record);
    }

    info!(
        "resolve_table: {} records, header at row {}, {} unreadable numeric cells",
        records.len(),
        header_row,
        coercion_issues
    );
    Ok(CanonicalTable::new(
        records,
        bindings,
        header_row,
        coercion_issues,
    ))
}
