//! Dataset cleaning: missing values, PII masking, deduplication, quality
//! scoring and optional outlier removal. Produces `cleaned_data` artifacts.

use once_cell::sync::Lazy;
use regex::{NoExpand, Regex};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::HashSet;

/// One dataset row: column name → cell.
pub type Row = Map<String, Value>;

pub const QUALITY_COLUMN: &str = "_quality_score";
const MIN_QUALITY: f64 = 0.3;
const IQR_FENCE: f64 = 3.0;

static PII_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"\b\d{3}-\d{2}-\d{4}\b", "SSN"),
        (r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b", "EMAIL"),
        (r"\b(?:\+?1[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}\b", "PHONE"),
        (r"\b\d{16}\b", "CREDIT_CARD"),
        (r"\b(?:19|20)\d{2}[-/]\d{1,2}[-/]\d{1,2}\b", "DATE"),
    ]
    .into_iter()
    .map(|(pattern, kind)| (Regex::new(pattern).expect("valid regex"), kind))
    .collect()
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningOptions {
    pub mask_pii: bool,
    pub dedup: bool,
    /// Drop rows whose quality score is below 0.3
    pub quality_filter: bool,
    /// Drop rows outside `[Q1 - 3·IQR, Q3 + 3·IQR]` on numeric columns
    pub outlier_filter: bool,
    /// Column scored for quality; defaults to the first text column
    pub text_column: Option<String>,
}

impl Default for CleaningOptions {
    fn default() -> Self {
        Self {
            mask_pii: true,
            dedup: true,
            quality_filter: true,
            outlier_filter: false,
            text_column: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleaningReport {
    pub original_rows: usize,
    pub empty_rows_removed: usize,
    pub pii_found: usize,
    pub duplicates_removed: usize,
    pub low_quality_removed: usize,
    pub outliers_removed: usize,
    pub final_rows: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CleanedData {
    pub rows: Vec<Row>,
    pub report: CleaningReport,
}

/// Rows from a JSON array of objects, or from `{"rows": [...]}`.
pub fn rows_from_value(value: Value) -> Result<Vec<Row>, String> {
    let rows = match value {
        Value::Array(rows) => rows,
        Value::Object(mut map) => match map.remove("rows") {
            Some(Value::Array(rows)) => rows,
            _ => return Err("expected an array of rows or an object with a \"rows\" array".into()),
        },
        _ => return Err("expected an array of rows".into()),
    };
    rows.into_iter()
        .enumerate()
        .map(|(i, row)| match row {
            Value::Object(row) => Ok(row),
            other => Err(format!("row {} is not an object: {}", i + 1, other)),
        })
        .collect()
}

pub fn clean_rows(rows: Vec<Row>, options: &CleaningOptions) -> CleanedData {
    let mut report = CleaningReport {
        original_rows: rows.len(),
        ..CleaningReport::default()
    };

    let mut rows: Vec<Row> = rows
        .into_iter()
        .filter(|row| row.values().any(|v| !v.is_null()))
        .map(|mut row| {
            for value in row.values_mut() {
                if value.is_null() {
                    *value = Value::String(String::new());
                }
            }
            row
        })
        .collect();
    report.empty_rows_removed = report.original_rows - rows.len();

    if options.mask_pii {
        for row in &mut rows {
            for value in row.values_mut() {
                if let Value::String(text) = value {
                    let (masked, found) = mask_pii(text);
                    report.pii_found += found;
                    *text = masked;
                }
            }
        }
    }

    if options.dedup {
        let before = rows.len();
        let mut seen = HashSet::new();
        // Maps are key-sorted, so equal rows serialize identically.
        rows.retain(|row| seen.insert(Value::Object(row.clone()).to_string()));
        report.duplicates_removed = before - rows.len();
    }

    let text_column = options
        .text_column
        .clone()
        .or_else(|| first_text_column(&rows));
    if let Some(column) = text_column {
        for row in &mut rows {
            let score = quality_score(row.get(&column).and_then(Value::as_str).unwrap_or(""));
            row.insert(QUALITY_COLUMN.to_string(), json!(score));
        }
        if options.quality_filter {
            let before = rows.len();
            rows.retain(|row| {
                row.get(QUALITY_COLUMN)
                    .and_then(Value::as_f64)
                    .is_some_and(|s| s >= MIN_QUALITY)
            });
            report.low_quality_removed = before - rows.len();
        }
    }

    if options.outlier_filter {
        let before = rows.len();
        for column in numeric_columns(&rows) {
            rows = drop_outliers(rows, &column);
        }
        report.outliers_removed = before - rows.len();
    }

    report.final_rows = rows.len();
    log::info!(
        "cleaned {} rows → {} (pii {}, duplicates {}, low quality {}, outliers {})",
        report.original_rows,
        report.final_rows,
        report.pii_found,
        report.duplicates_removed,
        report.low_quality_removed,
        report.outliers_removed
    );
    CleanedData { rows, report }
}

/// Replace PII with `[KIND_REDACTED]`. Returns the masked text and the number of matches.
pub fn mask_pii(text: &str) -> (String, usize) {
    let mut masked = text.to_string();
    let mut found = 0;
    for (pattern, kind) in PII_PATTERNS.iter() {
        let count = pattern.find_iter(&masked).count();
        if count > 0 {
            found += count;
            let replacement = format!("[{kind}_REDACTED]");
            masked = pattern
                .replace_all(&masked, NoExpand(&replacement))
                .into_owned();
        }
    }
    (masked, found)
}

/// Heuristic text quality in `0.0..=1.0`: penalises very short, repetitive and
/// very long text.
pub fn quality_score(text: &str) -> f64 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    let mut score: f64 = 1.0;
    if trimmed.chars().count() < 5 {
        score -= 0.5;
    }
    let words: Vec<&str> = text.split_whitespace().collect();
    let unique: HashSet<&str> = words.iter().copied().collect();
    if (unique.len() as f64) / (words.len() as f64) < 0.3 {
        score -= 0.3;
    }
    if text.chars().count() > 10_000 {
        score -= 0.1;
    }
    score.clamp(0.0, 1.0)
}

fn first_text_column(rows: &[Row]) -> Option<String> {
    let first = rows.first()?;
    first
        .iter()
        .find(|(key, value)| value.is_string() && key.as_str() != QUALITY_COLUMN)
        .map(|(key, _)| key.clone())
}

/// Columns whose every cell is a number.
fn numeric_columns(rows: &[Row]) -> Vec<String> {
    let Some(first) = rows.first() else {
        return Vec::new();
    };
    first
        .keys()
        .filter(|key| key.as_str() != QUALITY_COLUMN)
        .filter(|key| rows.iter().all(|row| row.get(*key).is_some_and(Value::is_number)))
        .cloned()
        .collect()
}

fn drop_outliers(rows: Vec<Row>, column: &str) -> Vec<Row> {
    let mut values: Vec<f64> = rows
        .iter()
        .filter_map(|row| row.get(column).and_then(Value::as_f64))
        .collect();
    if values.is_empty() {
        return rows;
    }
    values.sort_by(f64::total_cmp);
    let q1 = quantile(&values, 0.25);
    let q3 = quantile(&values, 0.75);
    let iqr = q3 - q1;
    let (low, high) = (q1 - IQR_FENCE * iqr, q3 + IQR_FENCE * iqr);
    rows.into_iter()
        .filter(|row| {
            row.get(column)
                .and_then(Value::as_f64)
                .is_some_and(|v| v >= low && v <= high)
        })
        .collect()
}

/// Linear-interpolated quantile of sorted values.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    sorted[lower] + (sorted[upper] - sorted[lower]) * (position - lower as f64)
}
