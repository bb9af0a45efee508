//! Table detection from text positions (stream mode).
//!
//! No ruling lines are needed: words are grouped into rows by their top
//! coordinate, column edges are found where left edges line up across rows,
//! and a table is any run of at least `min_rows` consecutive rows whose words
//! mostly sit on those edges. Each word is then assigned to the column whose
//! span contains its left edge.
//!
//! Cells no word landed in are reported as `None`; the extractor turns them
//! into empty strings.

use super::words::WordToken;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Tuning knobs for [`detect_tables`].
#[derive(Debug, Clone)]
pub struct TableDetectorConfig {
    /// Minimum consecutive aligned rows for a table.
    pub min_rows: usize,
    /// Minimum column count for a table.
    pub min_columns: usize,
    /// Above this many columns the "table" is most likely justified prose.
    pub max_columns: usize,
    /// Rows are words whose tops lie within this distance.
    pub row_tolerance: f32,
    /// Left edges are bucketed at this width before counting.
    pub bucket_size: f32,
    /// Share of a row's words that must sit on a column edge.
    pub min_alignment_ratio: f32,
    /// Column edges closer than this are merged.
    pub min_column_gap: f32,
}

impl Default for TableDetectorConfig {
    fn default() -> Self {
        Self {
            min_rows: 2,
            min_columns: 2,
            max_columns: 12,
            row_tolerance: 3.0,
            bucket_size: 5.0,
            min_alignment_ratio: 0.75,
            min_column_gap: 15.0,
        }
    }
}

/// A table grid: rows of optional cell strings.
pub type CellGrid = Vec<Vec<Option<String>>>;

struct Row<'a> {
    words: Vec<&'a WordToken>,
}

/// Detect tables among a page's word tokens, top to bottom.
pub fn detect_tables(words: &[WordToken], config: &TableDetectorConfig) -> Vec<CellGrid> {
    if words.len() < config.min_rows * config.min_columns {
        return Vec::new();
    }

    let rows = group_rows(words, config.row_tolerance);
    let mut tables = Vec::new();
    let mut start = 0;

    // Candidate regions are runs of rows with two or more words; a single-word
    // row (a heading, a paragraph line) always ends a table.
    while start < rows.len() {
        if rows[start].words.len() < 2 {
            start += 1;
            continue;
        }
        let mut end = start;
        while end + 1 < rows.len() && rows[end + 1].words.len() >= 2 {
            end += 1;
        }
        tables.extend(tables_in_region(&rows[start..=end], config));
        start = end + 1;
    }

    debug!("Detected {} table(s) among {} words", tables.len(), words.len());
    tables
}

fn group_rows(words: &[WordToken], tolerance: f32) -> Vec<Row<'_>> {
    let mut sorted: Vec<&WordToken> = words.iter().collect();
    sorted.sort_by(|a, b| a.top.total_cmp(&b.top));

    let mut rows: Vec<Row<'_>> = Vec::new();
    let mut row_top = f32::NAN;
    for word in sorted {
        match rows.last_mut() {
            Some(row) if (word.top - row_top).abs() <= tolerance => row.words.push(word),
            _ => {
                row_top = word.top;
                rows.push(Row { words: vec![word] });
            }
        }
    }
    for row in &mut rows {
        row.words.sort_by(|a, b| a.left.total_cmp(&b.left));
    }
    rows
}

fn tables_in_region(rows: &[Row<'_>], config: &TableDetectorConfig) -> Vec<CellGrid> {
    if rows.len() < config.min_rows {
        return Vec::new();
    }
    let columns = column_edges(rows, config);
    if columns.len() < config.min_columns || columns.len() > config.max_columns {
        return Vec::new();
    }

    let mut tables = Vec::new();
    let mut run: Vec<&Row<'_>> = Vec::new();
    for row in rows {
        if alignment(row, &columns, config.bucket_size) >= config.min_alignment_ratio {
            run.push(row);
        } else {
            flush_run(&mut run, &columns, config, &mut tables);
        }
    }
    flush_run(&mut run, &columns, config, &mut tables);
    tables
}

fn flush_run(
    run: &mut Vec<&Row<'_>>,
    columns: &[f32],
    config: &TableDetectorConfig,
    out: &mut Vec<CellGrid>,
) {
    if run.len() >= config.min_rows {
        out.push(run.iter().map(|row| build_cells(row, columns)).collect());
    }
    run.clear();
}

/// Left edges shared by at least two rows, merged when closer than the gap.
fn column_edges(rows: &[Row<'_>], config: &TableDetectorConfig) -> Vec<f32> {
    let mut counts: BTreeMap<i32, usize> = BTreeMap::new();
    for row in rows {
        let buckets: HashSet<i32> = row
            .words
            .iter()
            .map(|w| (w.left / config.bucket_size).round() as i32)
            .collect();
        for bucket in buckets {
            *counts.entry(bucket).or_insert(0) += 1;
        }
    }

    let min_occurrences = ((rows.len() as f32 * 0.5) as usize).max(2);
    let mut merged: Vec<f32> = Vec::new();
    for (bucket, count) in counts {
        if count < min_occurrences {
            continue;
        }
        let edge = bucket as f32 * config.bucket_size;
        match merged.last() {
            Some(&last) if edge - last < config.min_column_gap => {}
            _ => merged.push(edge),
        }
    }
    merged
}

fn alignment(row: &Row<'_>, columns: &[f32], tolerance: f32) -> f32 {
    if row.words.is_empty() {
        return 0.0;
    }
    let aligned = row
        .words
        .iter()
        .filter(|w| columns.iter().any(|c| (w.left - c).abs() <= tolerance))
        .count();
    aligned as f32 / row.words.len() as f32
}

fn build_cells(row: &Row<'_>, columns: &[f32]) -> Vec<Option<String>> {
    let mut cells: Vec<Option<String>> = vec![None; columns.len()];
    for word in &row.words {
        let col = column_for(word.left, columns);
        match &mut cells[col] {
            Some(text) => {
                text.push(' ');
                text.push_str(&word.text);
            }
            slot @ None => *slot = Some(word.text.clone()),
        }
    }
    cells
}

/// The last column whose edge lies left of `x` (with some slack), else the first.
fn column_for(x: f32, columns: &[f32]) -> usize {
    columns
        .iter()
        .rposition(|&edge| x >= edge - 5.0)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(text: &str, left: f32, top: f32) -> WordToken {
        WordToken::new(text, left, top, left + 6.0 * text.len() as f32, top + 10.0)
    }

    fn grid(rows: &[&[Option<&str>]]) -> CellGrid {
        rows.iter()
            .map(|r| r.iter().map(|c| c.map(str::to_string)).collect())
            .collect()
    }

    #[test]
    fn aligned_rows_form_a_table() {
        let words = vec![
            word("Name", 50.0, 100.0),
            word("Age", 200.0, 100.0),
            word("City", 300.0, 100.0),
            word("Ada", 50.0, 115.0),
            word("36", 200.0, 115.0),
            word("London", 300.0, 115.0),
            word("Alan", 50.0, 130.0),
            word("41", 200.0, 130.0),
            word("Wilmslow", 300.0, 130.0),
        ];
        let tables = detect_tables(&words, &TableDetectorConfig::default());
        assert_eq!(tables.len(), 1);
        assert_eq!(
            tables[0],
            grid(&[
                &[Some("Name"), Some("Age"), Some("City")],
                &[Some("Ada"), Some("36"), Some("London")],
                &[Some("Alan"), Some("41"), Some("Wilmslow")],
            ])
        );
    }

    #[test]
    fn missing_cells_are_none() {
        let words = vec![
            word("Item", 50.0, 100.0),
            word("Qty", 200.0, 100.0),
            word("Price", 300.0, 100.0),
            word("Pen", 50.0, 115.0),
            word("1.50", 300.0, 115.0),
            word("Ink", 50.0, 130.0),
            word("3", 200.0, 130.0),
            word("9.00", 300.0, 130.0),
        ];
        let tables = detect_tables(&words, &TableDetectorConfig::default());
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0][1], vec![Some("Pen".to_string()), None, Some("1.50".to_string())]);
    }

    #[test]
    fn prose_lines_are_not_tables() {
        let words = vec![
            word("A single paragraph line of text", 50.0, 100.0),
            word("and another line below it", 50.0, 115.0),
            word("and a third", 50.0, 130.0),
        ];
        assert!(detect_tables(&words, &TableDetectorConfig::default()).is_empty());
    }

    #[test]
    fn heading_splits_two_tables() {
        let mut words = Vec::new();
        for (i, top) in [100.0, 115.0].iter().enumerate() {
            words.push(word(&format!("a{i}"), 50.0, *top));
            words.push(word(&format!("b{i}"), 200.0, *top));
        }
        words.push(word("Second table", 50.0, 150.0));
        for (i, top) in [180.0, 195.0].iter().enumerate() {
            words.push(word(&format!("c{i}"), 50.0, *top));
            words.push(word(&format!("d{i}"), 200.0, *top));
        }
        let tables = detect_tables(&words, &TableDetectorConfig::default());
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0][0][0].as_deref(), Some("a0"));
        assert_eq!(tables[1][1][1].as_deref(), Some("d1"));
    }

    #[test]
    fn too_few_words_short_circuits() {
        let words = vec![word("x", 50.0, 100.0), word("y", 200.0, 100.0)];
        assert!(detect_tables(&words, &TableDetectorConfig::default()).is_empty());
    }
}
