//! Cell values, rows, and sheets.
//!
//! Every cell is a closed scalar [`CellValue`]. Rows are ordered
//! name → value mappings whose key sets may differ from row to row; looking up
//! a name a row does not carry yields [`CellValue::Absent`], never zero or an
//! empty string.
//!
//! Two conversions are shared by every engine component and live here so they
//! behave identically everywhere:
//!
//! - [`CellValue::to_number`]: total numeric coercion, falling back to `0.0`.
//! - [`CellValue::key_string`]: the bucket identity used by grouping and pivots.

use std::{cmp::Ordering, fmt};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use serde::{Serialize, Serializer};

/// Label used for absent values wherever a string key is required.
pub const MISSING_LABEL: &str = "N/A";

static ABSENT: CellValue = CellValue::Absent;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    String(String),
    Number(f64),
    Boolean(bool),
    Date(NaiveDate),
    #[default]
    Absent,
}

impl CellValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, CellValue::Absent)
    }

    /// Coerces the cell to a number.
    ///
    /// Booleans map to `1.0`/`0.0`, numeric text is parsed after trimming, and
    /// everything else (absent cells, blank or non-numeric text, dates, `NaN`)
    /// becomes `0.0`. Never fails.
    pub fn to_number(&self) -> f64 {
        match self {
            CellValue::Number(n) if n.is_nan() => 0.0,
            CellValue::Number(n) => *n,
            CellValue::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            CellValue::String(s) => parse_number(s).unwrap_or(0.0),
            CellValue::Date(_) | CellValue::Absent => 0.0,
        }
    }

    /// String identity of the cell. `Number(10.0)` and `String("10")` produce
    /// the same key and therefore share a bucket.
    pub fn key_string(&self) -> String {
        match self {
            CellValue::String(s) => s.clone(),
            CellValue::Number(n) => format_key_number(*n),
            CellValue::Boolean(b) => b.to_string(),
            CellValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            CellValue::Absent => MISSING_LABEL.to_string(),
        }
    }

    /// Ordering used for group axes: numbers first in numeric order, then all
    /// other values by their key string in [`text_cmp`] order.
    pub fn axis_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (CellValue::Number(a), CellValue::Number(b)) => a.total_cmp(b),
            (CellValue::Number(_), _) => Ordering::Less,
            (_, CellValue::Number(_)) => Ordering::Greater,
            _ => text_cmp(&self.key_string(), &other.key_string()),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            CellValue::String(s) => serde_json::Value::String(s.clone()),
            CellValue::Number(n) => number_to_json(*n),
            CellValue::Boolean(b) => serde_json::Value::Bool(*b),
            CellValue::Date(d) => serde_json::Value::String(d.format("%Y-%m-%d").to_string()),
            CellValue::Absent => serde_json::Value::Null,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Absent => Ok(()),
            other => write!(f, "{}", other.key_string()),
        }
    }
}

impl Serialize for CellValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_json().serialize(serializer)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::String(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::String(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Number(value as f64)
    }
}

impl From<i32> for CellValue {
    fn from(value: i32) -> Self {
        CellValue::Number(f64::from(value))
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Boolean(value)
    }
}

impl From<NaiveDate> for CellValue {
    fn from(value: NaiveDate) -> Self {
        CellValue::Date(value)
    }
}

impl<T> From<Option<T>> for CellValue
where
    T: Into<CellValue>,
{
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: IndexMap<String, CellValue>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name` to `value`, replacing an existing cell in place so the
    /// original key order is kept.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<CellValue>) {
        self.cells.insert(name.into(), value.into());
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<CellValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> &CellValue {
        self.cells.get(name).unwrap_or(&ABSENT)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.cells.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.cells.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Row
where
    K: Into<String>,
    V: Into<CellValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut row = Row {
            cells: IndexMap::with_capacity(iter.size_hint().0),
        };
        for (name, value) in iter {
            row.insert(name, value);
        }
        row
    }
}

/// One named sheet of rows, as handed over by ingestion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Row>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, rows: Vec<Row>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Column names as declared by the first row.
    pub fn columns(&self) -> Vec<String> {
        self.rows
            .first()
            .map(|row| row.keys().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

/// Parses trimmed numeric text. Blank text and non-finite results are
/// rejected.
pub fn parse_number(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Parses text as a calendar date, accepting plain dates, year-month
/// periods (read as the first of the month), datetimes, and RFC 3339
/// timestamps.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    const DATE_FORMATS: &[&str] = &[
        "%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y", "%m-%d-%Y", "%d-%b-%Y",
    ];
    const MONTH_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%d/%m/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    let trimmed = value.trim();
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Some(parsed);
        }
    }
    if starts_with_year(trimmed) {
        let separator = if trimmed.contains('/') { "/" } else { "-" };
        let first_of_month = format!("{trimmed}{separator}01");
        for fmt in MONTH_FORMATS {
            if let Ok(parsed) = NaiveDate::parse_from_str(&first_of_month, fmt) {
                return Some(parsed);
            }
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(parsed.date());
        }
    }
    DateTime::parse_from_rfc3339(trimmed)
        .ok()
        .map(|parsed| parsed.date_naive())
}

fn starts_with_year(value: &str) -> bool {
    value
        .split(['-', '/'])
        .next()
        .is_some_and(|year| year.len() == 4 && year.bytes().all(|b| b.is_ascii_digit()))
}

/// Date sniffing for text cells: longer than five characters, contains a `-`
/// or `/` separator, and parses as a date.
pub fn looks_like_date(value: &str) -> bool {
    value.chars().count() > 5 && value.contains(['-', '/']) && parse_date(value).is_some()
}

pub fn number_to_json(value: f64) -> serde_json::Value {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 9.0e15 {
        serde_json::Value::from(value as i64)
    } else {
        serde_json::Number::from_f64(value)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

/// Case-insensitive text order; values equal ignoring case put lowercase
/// before uppercase, so `apple < Apple < banana`.
pub fn text_cmp(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.chars().map(case_rank).cmp(b.chars().map(case_rank)))
}

fn case_rank(ch: char) -> (bool, char) {
    (ch.is_uppercase(), ch)
}

fn format_key_number(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.fract() == 0.0 && value.abs() < 9.0e15 {
        (value as i64).to_string()
    } else {
        value.to_string()
    }
}
