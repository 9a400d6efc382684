//! Column type inference and per-column summary statistics.
//!
//! Profiling needs no declared schema. For every column named by the first
//! row of a sheet the profiler collects the non-absent values across all rows
//! and derives:
//!
//! - an inferred [`ColumnType`], decided from the **first** non-absent value
//!   only (mixed columns are classified by that value, never by majority);
//! - up to [`SAMPLE_LIMIT`] distinct sample values in first-seen order;
//! - the number of distinct values, compared by value equality;
//! - `min`/`max` for numeric columns, over every value coerced with
//!   [`CellValue::to_number`].
//!
//! Profiles feed column pickers and the plain-text summary returned by
//! [`SheetProfile::describe`].

use std::{collections::HashSet, fmt};

use anyhow::Result;
use chrono::NaiveDate;
use itertools::Itertools;
use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    cli::ProfileArgs,
    data::{CellValue, Row, Sheet, looks_like_date, parse_number},
    io_utils, table,
};

pub const SAMPLE_LIMIT: usize = 5;

pub fn execute(args: &ProfileArgs) -> Result<()> {
    let sheets = io_utils::load_input(&args.input)?;
    let sheets = match &args.input.sheet {
        Some(name) => vec![io_utils::select_sheet(sheets, Some(name))?],
        None => sheets,
    };

    let profiles = sheets.iter().map(profile_sheet).collect::<Vec<_>>();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&profiles)?);
    } else if args.summary {
        let text = profiles.iter().map(SheetProfile::describe).join("\n");
        print!("{text}");
    } else {
        let headers = PROFILE_HEADERS.map(str::to_string);
        for profile in &profiles {
            if profiles.len() > 1 {
                println!("{} ({} rows)", profile.sheet_name, profile.row_count);
            }
            table::print_table(&headers, &profile_rows_table(profile));
        }
    }
    info!(
        "Profiled {} column(s) across {} sheet(s)",
        profiles.iter().map(|p| p.columns.len()).sum::<usize>(),
        profiles.len()
    );
    Ok(())
}

const PROFILE_HEADERS: [&str; 6] = ["column", "type", "distinct", "min", "max", "samples"];

fn profile_rows_table(profile: &SheetProfile) -> Vec<Vec<String>> {
    profile
        .columns
        .iter()
        .map(|column| {
            vec![
                column.name.clone(),
                column.column_type.to_string(),
                column.distinct_count.to_string(),
                column.min.map(table::format_metric).unwrap_or_default(),
                column.max.map(table::format_metric).unwrap_or_default(),
                column.sample_values.iter().join(", "),
            ]
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    String,
    Number,
    Boolean,
    Date,
}

impl ColumnType {
    /// Classifies a single value. Numeric text counts as a number and is
    /// never mistaken for a date.
    pub fn sniff(value: &CellValue) -> Self {
        match value {
            CellValue::Boolean(_) => ColumnType::Boolean,
            CellValue::Number(_) => ColumnType::Number,
            CellValue::Date(_) => ColumnType::Date,
            CellValue::String(text) if parse_number(text).is_some() => ColumnType::Number,
            CellValue::String(text) if looks_like_date(text) => ColumnType::Date,
            CellValue::String(_) | CellValue::Absent => ColumnType::String,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::String => "string",
            ColumnType::Number => "number",
            ColumnType::Boolean => "boolean",
            ColumnType::Date => "date",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnProfile {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    pub sample_values: Vec<CellValue>,
    pub distinct_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetProfile {
    pub sheet_name: String,
    pub row_count: usize,
    pub columns: Vec<ColumnProfile>,
}

impl SheetProfile {
    pub fn column(&self, name: &str) -> Option<&ColumnProfile> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn numeric_columns(&self) -> Vec<&str> {
        self.columns_of(ColumnType::Number)
    }

    pub fn date_columns(&self) -> Vec<&str> {
        self.columns_of(ColumnType::Date)
    }

    /// Columns suitable as group or breakdown keys: everything that is not
    /// numeric.
    pub fn categorical_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|column| column.column_type != ColumnType::Number)
            .map(|column| column.name.as_str())
            .collect()
    }

    fn columns_of(&self, column_type: ColumnType) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|column| column.column_type == column_type)
            .map(|column| column.name.as_str())
            .collect()
    }

    /// Compact plain-text description of the sheet, one line per column.
    pub fn describe(&self) -> String {
        let mut text = format!(
            "Sheet \"{}\" ({} rows, {} columns)\n",
            self.sheet_name,
            self.row_count,
            self.columns.len()
        );
        for column in &self.columns {
            text.push_str(&format!(
                "- {}: {}, {} distinct",
                column.name, column.column_type, column.distinct_count
            ));
            if let (Some(min), Some(max)) = (column.min, column.max) {
                text.push_str(&format!(
                    ", range {}..{}",
                    table::format_metric(min),
                    table::format_metric(max)
                ));
            }
            if !column.sample_values.is_empty() {
                text.push_str(&format!(
                    ", samples: {}",
                    column.sample_values.iter().join(", ")
                ));
            }
            text.push('\n');
        }
        text
    }
}

pub fn profile_sheet(sheet: &Sheet) -> SheetProfile {
    SheetProfile {
        sheet_name: sheet.name.clone(),
        row_count: sheet.row_count(),
        columns: profile_rows(&sheet.rows),
    }
}

/// Profiles every column named by the first row, in that row's key order.
/// Returns an empty list for empty input.
pub fn profile_rows(rows: &[Row]) -> Vec<ColumnProfile> {
    let Some(first) = rows.first() else {
        return Vec::new();
    };
    first
        .keys()
        .map(|name| {
            let mut accumulator = ColumnAccumulator::default();
            for row in rows {
                accumulator.record(row.get(name));
            }
            accumulator.finalize(name)
        })
        .collect()
}

/// Value-equality identity for distinct counting. `Number(1.0)` and
/// `String("1")` stay distinct; `-0.0` equals `0.0` and all NaNs are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum DistinctKey {
    Text(String),
    Number(u64),
    Boolean(bool),
    Date(NaiveDate),
}

impl DistinctKey {
    fn of(value: &CellValue) -> Option<Self> {
        match value {
            CellValue::String(s) => Some(DistinctKey::Text(s.clone())),
            CellValue::Number(n) => {
                let canonical = if *n == 0.0 {
                    0.0
                } else if n.is_nan() {
                    f64::NAN
                } else {
                    *n
                };
                Some(DistinctKey::Number(canonical.to_bits()))
            }
            CellValue::Boolean(b) => Some(DistinctKey::Boolean(*b)),
            CellValue::Date(d) => Some(DistinctKey::Date(*d)),
            CellValue::Absent => None,
        }
    }
}

#[derive(Default)]
struct ColumnAccumulator {
    first: Option<CellValue>,
    seen: HashSet<DistinctKey>,
    samples: Vec<CellValue>,
    min: Option<f64>,
    max: Option<f64>,
}

impl ColumnAccumulator {
    fn record(&mut self, value: &CellValue) {
        let Some(key) = DistinctKey::of(value) else {
            return;
        };
        if self.first.is_none() {
            self.first = Some(value.clone());
        }
        let numeric = value.to_number();
        self.min = Some(self.min.map_or(numeric, |current| current.min(numeric)));
        self.max = Some(self.max.map_or(numeric, |current| current.max(numeric)));
        if self.seen.insert(key) && self.samples.len() < SAMPLE_LIMIT {
            self.samples.push(value.clone());
        }
    }

    fn finalize(self, name: &str) -> ColumnProfile {
        let column_type = self
            .first
            .as_ref()
            .map(ColumnType::sniff)
            .unwrap_or(ColumnType::String);
        let numeric = column_type == ColumnType::Number;
        ColumnProfile {
            name: name.to_string(),
            column_type,
            sample_values: self.samples,
            distinct_count: self.seen.len(),
            min: if numeric { self.min } else { None },
            max: if numeric { self.max } else { None },
        }
    }
}
