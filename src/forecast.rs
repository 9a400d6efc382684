//! Splicing a forecast tail onto an aggregated series.
//!
//! The spliced series carries two value channels: the historical metric and
//! `<metric>_forecast`. The last historical point repeats its own metric in
//! the forecast channel, so the historical line and the forecast line meet at
//! one shared junction point and render as a single continuous path.

use anyhow::Result;
use log::{info, warn};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use crate::{
    aggregate::{self, Series},
    cli::SpliceArgs,
    data::{CellValue, number_to_json},
    io_utils, table,
};

pub const FORECAST_SUFFIX: &str = "_forecast";

pub fn execute(args: &SpliceArgs) -> Result<()> {
    let (config, series) = aggregate::build_series(&args.series)?;
    let forecast_path = args.forecast.as_deref().or(config.forecast.as_deref());
    let forecast = match forecast_path {
        Some(path) => io_utils::load_forecast(path, &series.group_key, &series.metric_key),
        None => {
            warn!("No forecast supplied; emitting the historical series unchanged");
            Vec::new()
        }
    };

    let spliced = splice(&series, &forecast);
    info!(
        "Spliced {} historical point(s) with {} forecast point(s)",
        series.len(),
        forecast.len()
    );
    if args.series.json {
        println!("{}", serde_json::to_string_pretty(&spliced.to_records())?);
    } else {
        let (headers, rows) = spliced_table(&spliced);
        table::print_table(&headers, &rows);
    }
    Ok(())
}

fn spliced_table(spliced: &SplicedSeries) -> (Vec<String>, Vec<Vec<String>>) {
    let mut headers = vec![spliced.group_key.clone(), spliced.metric_key.clone()];
    if let Some(key) = spliced.forecast_key() {
        headers.push(key);
    }
    let rows = spliced
        .points
        .iter()
        .map(|point| {
            let mut row = vec![
                point.group.to_string(),
                point.metric.map(table::format_metric).unwrap_or_default(),
            ];
            if spliced.has_forecast() {
                row.push(point.forecast.map(table::format_metric).unwrap_or_default());
            }
            row
        })
        .collect();
    (headers, rows)
}

/// One predicted point as delivered by the forecast service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub x: CellValue,
    pub value: f64,
}

impl ForecastPoint {
    pub fn new(x: impl Into<CellValue>, value: f64) -> Self {
        Self { x: x.into(), value }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PointOrigin {
    Historical,
    Forecast,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplicedPoint {
    pub group: CellValue,
    pub metric: Option<f64>,
    pub forecast: Option<f64>,
    pub breakdown: Vec<(String, f64)>,
    pub origin: PointOrigin,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SplicedSeries {
    pub group_key: String,
    pub metric_key: String,
    pub breakdown_key: Option<String>,
    pub points: Vec<SplicedPoint>,
    has_forecast: bool,
}

impl SplicedSeries {
    pub fn has_forecast(&self) -> bool {
        self.has_forecast
    }

    /// Name of the forecast channel, present only when a forecast was spliced.
    pub fn forecast_key(&self) -> Option<String> {
        self.has_forecast.then(|| forecast_field(&self.metric_key))
    }

    /// The point shared by both channels.
    pub fn junction(&self) -> Option<&SplicedPoint> {
        if !self.has_forecast {
            return None;
        }
        self.points
            .iter()
            .rev()
            .find(|point| point.origin == PointOrigin::Historical)
    }

    pub fn to_records(&self) -> Vec<Map<String, JsonValue>> {
        let forecast_key = self.forecast_key();
        self.points
            .iter()
            .map(|point| {
                let mut record = Map::new();
                record.insert(self.group_key.clone(), point.group.to_json());
                match point.origin {
                    PointOrigin::Historical => aggregate::write_measures(
                        &mut record,
                        &self.metric_key,
                        self.breakdown_key.is_some(),
                        point.metric,
                        &point.breakdown,
                    ),
                    PointOrigin::Forecast => {
                        record.insert(self.metric_key.clone(), JsonValue::Null);
                    }
                }
                if let Some(key) = &forecast_key {
                    let value = point.forecast.map(number_to_json).unwrap_or(JsonValue::Null);
                    record.insert(key.clone(), value);
                }
                record
            })
            .collect()
    }
}

pub fn forecast_field(metric_key: &str) -> String {
    format!("{metric_key}{FORECAST_SUFFIX}")
}

/// Appends `forecast` to `historical`, keyed by the series' metric column.
///
/// Historical points come first in their original order, followed by the
/// forecast points in theirs; nothing is re-sorted. An empty forecast leaves
/// the series without a forecast channel.
pub fn splice(historical: &Series, forecast: &[ForecastPoint]) -> SplicedSeries {
    let has_forecast = !forecast.is_empty();
    let mut points = historical
        .points
        .iter()
        .map(|point| SplicedPoint {
            group: point.group.clone(),
            metric: point.metric,
            forecast: None,
            breakdown: point.breakdown.clone(),
            origin: PointOrigin::Historical,
        })
        .collect::<Vec<_>>();

    if has_forecast {
        if let Some(junction) = points.last_mut() {
            junction.forecast = junction.metric;
        }
        points.extend(forecast.iter().map(|predicted| SplicedPoint {
            group: predicted.x.clone(),
            metric: None,
            forecast: Some(predicted.value),
            breakdown: Vec::new(),
            origin: PointOrigin::Forecast,
        }));
    }

    SplicedSeries {
        group_key: historical.group_key.clone(),
        metric_key: historical.metric_key.clone(),
        breakdown_key: historical.breakdown_key.clone(),
        points,
        has_forecast,
    }
}
