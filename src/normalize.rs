//! Format normalization: raw tabular uploads -> canonical sample-by-feature datasets

use crate::dataset::Dataset;
use crate::error::{DeckError, Result};
use crate::orientation::Orientation;
use csv::ReaderBuilder;
use std::collections::{HashMap, HashSet};

/// Delimiters tried, in order, when sniffing a raw upload
const CANDIDATE_DELIMITERS: [u8; 4] = [b',', b'\t', b';', b'|'];

/// Outcome of normalization: the canonical dataset plus the shape each input
/// had after orientation, before any join narrowed the sample set
#[derive(Debug, Clone)]
pub struct Normalized {
    pub dataset: Dataset,
    /// `[n_samples, n_features]` per input file, in file order
    pub original_shapes: Vec<[usize; 2]>,
}

/// Normalize one or more raw uploads into a single canonical dataset.
///
/// Each file is parsed, oriented to sample-major, and given positional ids on
/// any unnamed axis; multiple files are merged by an inner join on sample id
/// with column-wise feature concatenation.
///
/// # Errors
/// Returns `Parse` when no parse strategy succeeds on a file, `EmptyResult`
/// when the result has zero rows or zero columns
pub fn normalize(raw_files: &[Vec<u8>], orientation: Orientation) -> Result<Normalized> {
    if raw_files.is_empty() {
        return Err(DeckError::EmptyResult("no files supplied".into()));
    }

    let mut parts = Vec::with_capacity(raw_files.len());
    let mut original_shapes = Vec::with_capacity(raw_files.len());
    for (i, raw) in raw_files.iter().enumerate() {
        let part = normalize_single(raw, orientation)
            .map_err(|e| annotate_file(e, i, raw_files.len()))?;
        original_shapes.push([part.n_samples(), part.n_features()]);
        parts.push(part);
    }

    // Single files skip the join so duplicate sample ids survive for the
    // validator to report instead of being collapsed by the key map
    let merged = if parts.len() == 1 {
        parts.remove(0)
    } else {
        merge_inner(parts)?
    };

    if merged.n_samples() == 0 {
        return Err(DeckError::EmptyResult("no samples after normalization".into()));
    }
    if merged.n_features() == 0 {
        return Err(DeckError::EmptyResult("no features after normalization".into()));
    }
    Ok(Normalized {
        dataset: merged,
        original_shapes,
    })
}

fn annotate_file(e: DeckError, index: usize, total: usize) -> DeckError {
    if total == 1 {
        return e;
    }
    match e {
        DeckError::Parse(msg) => DeckError::Parse(format!("file {}: {msg}", index + 1)),
        other => other,
    }
}

/// Normalize a single raw upload to sample-major with identifiers on both axes
fn normalize_single(raw: &[u8], orientation: Orientation) -> Result<Dataset> {
    let text = String::from_utf8_lossy(raw);
    let grid = parse_grid(&text)?;
    let layout = orientation.layout();

    let (col_names, row_names, mut cells) = split_names(grid, layout.has_header, layout.has_index)?;

    let (mut sample_names, mut feature_names) = (row_names, col_names);
    if layout.transpose {
        cells = transpose(&cells);
        std::mem::swap(&mut sample_names, &mut feature_names);
    }

    let n_samples = cells.len();
    let n_features = cells.first().map_or(0, Vec::len);

    let sample_ids = sample_names.unwrap_or_else(|| positional_ids(n_samples));
    let feature_names = feature_names.unwrap_or_else(|| positional_ids(n_features));

    Ok(Dataset {
        sample_ids,
        feature_names,
        cells,
    })
}

fn positional_ids(n: usize) -> Vec<String> {
    (0..n).map(|i| i.to_string()).collect()
}

/// Parse raw text into a rectangular grid of strings.
///
/// Strategy order: delimiter sniffing over the candidate set, then a
/// whitespace-run fallback for space-padded spreadsheet exports.
fn parse_grid(text: &str) -> Result<Vec<Vec<String>>> {
    for delimiter in CANDIDATE_DELIMITERS {
        if let Some(grid) = try_delimited(text, delimiter) {
            return Ok(grid);
        }
    }
    if let Some(grid) = try_whitespace(text) {
        return Ok(grid);
    }
    Err(DeckError::Parse(
        "no parse strategy produced a consistent table".into(),
    ))
}

/// Parse with one delimiter; accept only a consistent multi-column table
fn try_delimited(text: &str, delimiter: u8) -> Option<Vec<Vec<String>>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut grid: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        let record = record.ok()?;
        grid.push(record.iter().map(str::to_string).collect());
    }

    let width = grid.first().map_or(0, Vec::len);
    if width < 2 || grid.iter().any(|row| row.len() != width) {
        return None;
    }
    Some(grid)
}

/// Whitespace-run fallback; accepts single-column tables too
fn try_whitespace(text: &str) -> Option<Vec<Vec<String>>> {
    let grid: Vec<Vec<String>> = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.split_whitespace().map(str::to_string).collect())
        .collect();

    let width = grid.first().map_or(0, Vec::len);
    if width == 0 || grid.iter().any(|row| row.len() != width) {
        return None;
    }
    Some(grid)
}

type SplitGrid = (Option<Vec<String>>, Option<Vec<String>>, Vec<Vec<String>>);

/// Peel the header row and/or index column off a raw grid
fn split_names(grid: Vec<Vec<String>>, has_header: bool, has_index: bool) -> Result<SplitGrid> {
    let mut rows = grid.into_iter();

    let mut col_names = if has_header {
        let header = rows
            .next()
            .ok_or_else(|| DeckError::Parse("table has no header row".into()))?;
        Some(header)
    } else {
        None
    };

    let mut row_names = if has_index { Some(Vec::new()) } else { None };
    let mut cells = Vec::new();
    for mut row in rows {
        if has_index {
            if row.is_empty() {
                return Err(DeckError::Parse("row missing its identifier".into()));
            }
            let name = row.remove(0);
            if let Some(names) = row_names.as_mut() {
                names.push(name);
            }
        }
        cells.push(row);
    }

    // A named row axis means the header's corner cell labels the index, not a column
    if has_index {
        if let Some(names) = col_names.as_mut() {
            if names.is_empty() {
                return Err(DeckError::Parse("header row is empty".into()));
            }
            names.remove(0);
        }
    }

    let width = cells.first().map_or_else(
        || col_names.as_ref().map_or(0, Vec::len),
        Vec::len,
    );
    if cells.iter().any(|row| row.len() != width) {
        return Err(DeckError::Parse("ragged table body".into()));
    }
    if let Some(names) = &col_names {
        if !cells.is_empty() && names.len() != width {
            return Err(DeckError::Parse(format!(
                "header names {} columns but body has {width}",
                names.len()
            )));
        }
    }

    Ok((col_names, row_names, cells))
}

fn transpose(cells: &[Vec<String>]) -> Vec<Vec<String>> {
    let n_rows = cells.len();
    let n_cols = cells.first().map_or(0, Vec::len);
    (0..n_cols)
        .map(|j| (0..n_rows).map(|i| cells[i][j].clone()).collect())
        .collect()
}

/// Inner-join merge: sample set is the conjunction across parts, ordered by
/// the first part; features concatenate in file order.
fn merge_inner(parts: Vec<Dataset>) -> Result<Dataset> {
    let first = parts
        .first()
        .ok_or_else(|| DeckError::EmptyResult("no files to merge".into()))?;

    // First-occurrence row index per part; duplicate sample ids inside one
    // part resolve to their first row and are reported by the validator
    let index_maps: Vec<HashMap<&str, usize>> = parts
        .iter()
        .map(|part| {
            let mut map = HashMap::with_capacity(part.n_samples());
            for (i, id) in part.sample_ids.iter().enumerate() {
                map.entry(id.as_str()).or_insert(i);
            }
            map
        })
        .collect();

    let mut seen = HashSet::new();
    let shared: Vec<&str> = first
        .sample_ids
        .iter()
        .map(String::as_str)
        .filter(|id| seen.insert(*id))
        .filter(|id| index_maps.iter().all(|map| map.contains_key(id)))
        .collect();

    if shared.is_empty() {
        return Err(DeckError::EmptyResult(
            "no sample identifiers shared by every file".into(),
        ));
    }

    let feature_names: Vec<String> = parts
        .iter()
        .flat_map(|part| part.feature_names.iter().cloned())
        .collect();

    let cells: Vec<Vec<String>> = shared
        .iter()
        .map(|id| {
            parts
                .iter()
                .zip(&index_maps)
                .flat_map(|(part, map)| part.cells[map[id]].iter().cloned())
                .collect()
        })
        .collect();

    Ok(Dataset {
        sample_ids: shared.into_iter().map(String::from).collect(),
        feature_names,
        cells,
    })
}
