//! Two-dimensional cross tabulation.
//!
//! Every row contributes its coerced value to the cell addressed by the key
//! strings of its row-label and column-label values (absent labels become
//! `N/A`). Without a column key all rows share the single column `Total`.
//! Axis labels are sorted so a pivot renders identically across reruns. A cell
//! nothing contributed to is a hole (`None`), which is not the same as zero.

use std::collections::{BTreeSet, HashMap};

use anyhow::Result;
use log::{debug, info};
use serde_json::{Value as JsonValue, json};

use crate::{
    cli::PivotArgs,
    data::{Row, number_to_json},
    io_utils,
    reducer::Reducer,
    table,
    view::{ChartConfig, PivotRequest},
};

pub const TOTAL_LABEL: &str = "Total";
pub const HOLE_MARKER: &str = "-";

pub fn execute(args: &PivotArgs) -> Result<()> {
    let config = ChartConfig::resolve(args.view.as_deref(), args.overrides())?;
    let request = config.pivot_request()?;
    let sheets = io_utils::load_input(&args.input)?;
    let sheet_name = args.input.sheet.as_deref().or(config.sheet.as_deref());
    let sheet = io_utils::select_sheet(sheets, sheet_name)?;
    debug!("Pivoting {} row(s) from sheet '{}'", sheet.row_count(), sheet.name);

    let pivot_table = pivot_request(&sheet.rows, &request);
    info!(
        "Pivoted '{}' into {} row label(s) by {} column label(s) ({})",
        pivot_table.value_key,
        pivot_table.row_labels().len(),
        pivot_table.col_labels().len(),
        pivot_table.reducer
    );
    if args.json {
        println!("{}", serde_json::to_string_pretty(&pivot_table.to_json())?);
    } else {
        let mut headers = vec![pivot_table.row_key.clone()];
        headers.extend(pivot_table.col_labels().iter().cloned());
        table::print_table(&headers, &pivot_table.to_rows(HOLE_MARKER));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct PivotTable {
    pub row_key: String,
    pub col_key: Option<String>,
    pub value_key: String,
    pub reducer: Reducer,
    row_labels: Vec<String>,
    col_labels: Vec<String>,
    cells: HashMap<(String, String), Vec<f64>>,
}

impl PivotTable {
    pub fn row_labels(&self) -> &[String] {
        &self.row_labels
    }

    pub fn col_labels(&self) -> &[String] {
        &self.col_labels
    }

    /// Values that fell into a cell, in input order.
    pub fn contributions(&self, row: &str, col: &str) -> &[f64] {
        self.cells
            .get(&(row.to_string(), col.to_string()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Reduced cell value, or `None` for a hole.
    pub fn cell(&self, row: &str, col: &str) -> Option<f64> {
        let values = self.contributions(row, col);
        if values.is_empty() {
            return None;
        }
        self.reducer.reduce(values)
    }

    /// Grid of formatted cells, one line per row label prefixed by the label.
    pub fn to_rows(&self, hole: &str) -> Vec<Vec<String>> {
        self.row_labels
            .iter()
            .map(|row| {
                let mut line = Vec::with_capacity(self.col_labels.len() + 1);
                line.push(row.clone());
                line.extend(self.col_labels.iter().map(|col| {
                    self.cell(row, col)
                        .map(table::format_metric)
                        .unwrap_or_else(|| hole.to_string())
                }));
                line
            })
            .collect()
    }

    pub fn to_json(&self) -> JsonValue {
        let cells = self
            .row_labels
            .iter()
            .map(|row| {
                self.col_labels
                    .iter()
                    .map(|col| self.cell(row, col).map(number_to_json).unwrap_or(JsonValue::Null))
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();
        json!({
            "rowLabels": self.row_labels,
            "colLabels": self.col_labels,
            "cells": cells,
        })
    }
}

pub fn pivot_request(rows: &[Row], request: &PivotRequest) -> PivotTable {
    pivot(
        rows,
        &request.row_key,
        request.col_key.as_deref(),
        &request.value_key,
        request.reducer,
    )
}

pub fn pivot(
    rows: &[Row],
    row_key: &str,
    col_key: Option<&str>,
    value_key: &str,
    reducer: Reducer,
) -> PivotTable {
    let mut row_labels = BTreeSet::new();
    let mut col_labels = BTreeSet::new();
    let mut cells: HashMap<(String, String), Vec<f64>> = HashMap::new();

    for row in rows {
        let row_label = row.get(row_key).key_string();
        let col_label = match col_key {
            Some(key) => row.get(key).key_string(),
            None => TOTAL_LABEL.to_string(),
        };
        row_labels.insert(row_label.clone());
        col_labels.insert(col_label.clone());
        cells
            .entry((row_label, col_label))
            .or_default()
            .push(row.get(value_key).to_number());
    }

    PivotTable {
        row_key: row_key.to_string(),
        col_key: col_key.map(str::to_string),
        value_key: value_key.to_string(),
        reducer,
        row_labels: row_labels.into_iter().collect(),
        col_labels: col_labels.into_iter().collect(),
        cells,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::CellValue;

    fn orders() -> Vec<Row> {
        vec![
            Row::new().with("region", "West").with("quarter", "Q2").with("amt", 5),
            Row::new().with("region", "East").with("quarter", "Q1").with("amt", 10),
            Row::new().with("region", "East").with("quarter", "Q1").with("amt", 4),
            Row::new().with("region", "East").with("quarter", "Q2").with("amt", 0),
        ]
    }

    #[test]
    fn labels_are_sorted() {
        let table = pivot(&orders(), "region", Some("quarter"), "amt", Reducer::Sum);
        assert_eq!(table.row_labels(), ["East", "West"]);
        assert_eq!(table.col_labels(), ["Q1", "Q2"]);
    }

    #[test]
    fn cells_reduce_matching_rows() {
        let table = pivot(&orders(), "region", Some("quarter"), "amt", Reducer::Sum);
        assert_eq!(table.cell("East", "Q1"), Some(14.0));
        assert_eq!(table.contributions("East", "Q1"), [10.0, 4.0]);
        let avg = pivot(&orders(), "region", Some("quarter"), "amt", Reducer::Avg);
        assert_eq!(avg.cell("East", "Q1"), Some(7.0));
    }

    #[test]
    fn missing_cells_are_holes_not_zero() {
        let table = pivot(&orders(), "region", Some("quarter"), "amt", Reducer::Sum);
        assert_eq!(table.cell("West", "Q1"), None);
        assert_eq!(table.cell("East", "Q2"), Some(0.0));
        assert_eq!(
            table.to_rows(HOLE_MARKER),
            vec![
                vec!["East".to_string(), "14".to_string(), "0".to_string()],
                vec!["West".to_string(), "-".to_string(), "5".to_string()],
            ]
        );
    }

    #[test]
    fn without_column_key_everything_is_total() {
        let table = pivot(&orders(), "region", None, "amt", Reducer::Count);
        assert_eq!(table.col_labels(), [TOTAL_LABEL]);
        assert_eq!(table.cell("East", TOTAL_LABEL), Some(3.0));
        assert_eq!(table.cell("West", TOTAL_LABEL), Some(1.0));
    }

    #[test]
    fn absent_labels_become_not_available() {
        let rows = vec![
            Row::new().with("region", CellValue::Absent).with("amt", 2),
            Row::new().with("amt", "x"),
        ];
        let table = pivot(&rows, "region", Some("quarter"), "amt", Reducer::Sum);
        assert_eq!(table.row_labels(), ["N/A"]);
        assert_eq!(table.col_labels(), ["N/A"]);
        assert_eq!(table.cell("N/A", "N/A"), Some(2.0));
    }

    #[test]
    fn empty_input_has_no_labels() {
        let table = pivot(&[], "region", None, "amt", Reducer::Sum);
        assert!(table.row_labels().is_empty());
        assert!(table.col_labels().is_empty());
        assert_eq!(table.to_json()["cells"], json!([]));
    }

    #[test]
    fn json_marks_holes_as_null() {
        let table = pivot(&orders(), "region", Some("quarter"), "amt", Reducer::Sum);
        assert_eq!(
            table.to_json(),
            json!({
                "rowLabels": ["East", "West"],
                "colLabels": ["Q1", "Q2"],
                "cells": [[14, 0], [null, 5]],
            })
        );
    }
}
