//! Single-key grouping with an optional stacked breakdown.
//!
//! Rows are bucketed by the [`CellValue::key_string`] of their group value;
//! rows without a group value are dropped. Each bucket keeps its row count, the
//! coerced metric values, and, when a breakdown column is named, an additive
//! running sum per breakdown label. Buckets are recomputed from scratch on
//! every call.

use std::collections::{BTreeSet, HashMap};

use anyhow::Result;
use log::{debug, info};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use crate::{
    cli::SeriesArgs,
    data::{CellValue, Row, number_to_json},
    io_utils,
    reducer::Reducer,
    table,
    view::{ChartConfig, SeriesRequest},
};

pub fn execute(args: &SeriesArgs) -> Result<()> {
    let (_, series) = build_series(args)?;
    info!(
        "Aggregated {} group(s) of '{}' by '{}' ({})",
        series.len(),
        series.metric_key,
        series.group_key,
        series.reducer
    );
    if args.json {
        println!("{}", serde_json::to_string_pretty(&series.to_records())?);
    } else {
        let (headers, rows) = series_table(&series);
        table::print_table(&headers, &rows);
    }
    Ok(())
}

/// Loads the input sheet named by `args` and aggregates it with the resolved
/// chart configuration.
pub(crate) fn build_series(args: &SeriesArgs) -> Result<(ChartConfig, Series)> {
    let config = ChartConfig::resolve(args.view.as_deref(), args.overrides())?;
    let request = config.series_request()?;
    let sheets = io_utils::load_input(&args.input)?;
    let sheet_name = args.input.sheet.as_deref().or(config.sheet.as_deref());
    let sheet = io_utils::select_sheet(sheets, sheet_name)?;
    debug!("Aggregating {} row(s) from sheet '{}'", sheet.row_count(), sheet.name);
    let series = aggregate_request(&sheet.rows, &request);
    Ok((config, series))
}

fn series_table(series: &Series) -> (Vec<String>, Vec<Vec<String>>) {
    let labels = series.breakdown_labels();
    let mut headers = vec![series.group_key.clone()];
    if series.breakdown_key.is_some() {
        headers.extend(labels.iter().cloned());
    } else {
        headers.push(series.metric_key.clone());
    }
    let rows = series
        .points
        .iter()
        .map(|point| {
            let mut row = vec![point.group.to_string()];
            if series.breakdown_key.is_some() {
                row.extend(labels.iter().map(|label| {
                    point
                        .breakdown_value(label)
                        .map(table::format_metric)
                        .unwrap_or_default()
                }));
            } else {
                row.push(point.metric.map(table::format_metric).unwrap_or_default());
            }
            row
        })
        .collect();
    (headers, rows)
}

/// One bucket of the aggregated series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedPoint {
    /// Group value as first seen in the input.
    pub group: CellValue,
    /// Number of rows that fell into the bucket.
    pub count: usize,
    /// Reduced metric; `None` when the series is broken down.
    pub metric: Option<f64>,
    /// Per-label sums in first-seen order.
    pub breakdown: Vec<(String, f64)>,
}

impl AggregatedPoint {
    pub fn breakdown_value(&self, label: &str) -> Option<f64> {
        self.breakdown
            .iter()
            .find(|(existing, _)| existing == label)
            .map(|(_, sum)| *sum)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub group_key: String,
    pub metric_key: String,
    pub reducer: Reducer,
    pub breakdown_key: Option<String>,
    pub points: Vec<AggregatedPoint>,
}

impl Series {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Sorted union of the breakdown labels across all points.
    pub fn breakdown_labels(&self) -> Vec<String> {
        self.points
            .iter()
            .flat_map(|point| point.breakdown.iter().map(|(label, _)| label.clone()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Projects each point to a record keyed by column names: the group key,
    /// then either the metric key or one field per breakdown label.
    pub fn to_records(&self) -> Vec<Map<String, JsonValue>> {
        self.points
            .iter()
            .map(|point| {
                let mut record = Map::new();
                record.insert(self.group_key.clone(), point.group.to_json());
                write_measures(
                    &mut record,
                    &self.metric_key,
                    self.breakdown_key.is_some(),
                    point.metric,
                    &point.breakdown,
                );
                record
            })
            .collect()
    }
}

pub(crate) fn write_measures(
    record: &mut Map<String, JsonValue>,
    metric_key: &str,
    broken_down: bool,
    metric: Option<f64>,
    breakdown: &[(String, f64)],
) {
    if broken_down {
        for (label, sum) in breakdown {
            record.insert(label.clone(), number_to_json(*sum));
        }
    } else {
        let value = metric.map(number_to_json).unwrap_or(JsonValue::Null);
        record.insert(metric_key.to_string(), value);
    }
}

pub fn aggregate_request(rows: &[Row], request: &SeriesRequest) -> Series {
    aggregate(
        rows,
        &request.group_key,
        &request.metric_key,
        request.reducer,
        request.breakdown_key.as_deref(),
    )
}

/// Groups `rows` by `group_key` and reduces `metric_key` per group.
///
/// Points are ordered ascending by group value (see
/// [`CellValue::axis_cmp`]); groups that compare equal keep first-seen order.
pub fn aggregate(
    rows: &[Row],
    group_key: &str,
    metric_key: &str,
    reducer: Reducer,
    breakdown_key: Option<&str>,
) -> Series {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut buckets: Vec<Bucket> = Vec::new();
    let mut dropped = 0usize;

    for row in rows {
        let group = row.get(group_key);
        if group.is_absent() {
            dropped += 1;
            continue;
        }
        let slot = *index.entry(group.key_string()).or_insert_with(|| {
            buckets.push(Bucket::new(group.clone()));
            buckets.len() - 1
        });
        let bucket = &mut buckets[slot];
        let value = row.get(metric_key).to_number();
        bucket.count += 1;
        bucket.values.push(value);
        if let Some(key) = breakdown_key {
            bucket.add_breakdown(row.get(key).key_string(), value);
        }
    }
    if dropped > 0 {
        debug!("Dropped {dropped} row(s) without a '{group_key}' value");
    }

    buckets.sort_by(|a, b| a.group.axis_cmp(&b.group));

    let points = buckets
        .into_iter()
        .map(|bucket| bucket.finish(reducer, breakdown_key.is_some()))
        .collect();

    Series {
        group_key: group_key.to_string(),
        metric_key: metric_key.to_string(),
        reducer,
        breakdown_key: breakdown_key.map(str::to_string),
        points,
    }
}

struct Bucket {
    group: CellValue,
    count: usize,
    values: Vec<f64>,
    breakdown: Vec<(String, f64)>,
}

impl Bucket {
    fn new(group: CellValue) -> Self {
        Self {
            group,
            count: 0,
            values: Vec::new(),
            breakdown: Vec::new(),
        }
    }

    fn add_breakdown(&mut self, label: String, value: f64) {
        match self.breakdown.iter_mut().find(|(existing, _)| *existing == label) {
            Some((_, sum)) => *sum += value,
            None => self.breakdown.push((label, value)),
        }
    }

    fn finish(self, reducer: Reducer, broken_down: bool) -> AggregatedPoint {
        let metric = if broken_down {
            None
        } else if reducer == Reducer::Count {
            Some(self.count as f64)
        } else {
            reducer.reduce(&self.values)
        };
        AggregatedPoint {
            group: self.group,
            count: self.count,
            metric,
            breakdown: self.breakdown,
        }
    }
}
