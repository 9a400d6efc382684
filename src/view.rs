//! Saved chart configuration.
//!
//! A view is a small YAML document naming the sheet, grouping column, metric,
//! reducer, and optional breakdown or pivot column for a chart:
//!
//! ```yaml
//! sheet: Sales
//! group_by: region
//! metric: amount
//! reducer: avg
//! breakdown: product
//! ```
//!
//! Command-line flags override whatever the view file specifies.

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::reducer::Reducer;

/// Metric name used when counting rows without naming a metric column.
pub const COUNT_METRIC: &str = "count";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChartConfig {
    pub sheet: Option<String>,
    pub group_by: Option<String>,
    pub metric: Option<String>,
    pub reducer: Option<Reducer>,
    pub breakdown: Option<String>,
    pub columns: Option<String>,
    pub forecast: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesRequest {
    pub group_key: String,
    pub metric_key: String,
    pub reducer: Reducer,
    pub breakdown_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PivotRequest {
    pub row_key: String,
    pub col_key: Option<String>,
    pub value_key: String,
    pub reducer: Reducer,
}

impl ChartConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening view file {path:?}"))?;
        let config: ChartConfig = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing view file {path:?}"))?;
        debug!("Loaded view {path:?}: {config:?}");
        Ok(config)
    }

    pub fn from_yaml_str(input: &str) -> Result<Self> {
        serde_yaml::from_str(input).context("Parsing view definition")
    }

    /// Loads `view` when given and layers `overrides` on top of it.
    pub fn resolve(view: Option<&Path>, overrides: ChartConfig) -> Result<Self> {
        let base = match view {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        Ok(base.merge(overrides))
    }

    /// Fields set in `overrides` replace the ones in `self`.
    pub fn merge(self, overrides: ChartConfig) -> Self {
        Self {
            sheet: overrides.sheet.or(self.sheet),
            group_by: overrides.group_by.or(self.group_by),
            metric: overrides.metric.or(self.metric),
            reducer: overrides.reducer.or(self.reducer),
            breakdown: overrides.breakdown.or(self.breakdown),
            columns: overrides.columns.or(self.columns),
            forecast: overrides.forecast.or(self.forecast),
        }
    }

    pub fn reducer(&self) -> Reducer {
        self.reducer.unwrap_or_default()
    }

    fn group_key(&self, flag: &str) -> Result<String> {
        self.group_by.clone().ok_or_else(|| {
            anyhow!("No grouping column configured. Supply {flag} or a view file.")
        })
    }

    /// A metric is mandatory unless rows are only being counted.
    fn metric_key(&self, flag: &str) -> Result<String> {
        match (&self.metric, self.reducer()) {
            (Some(metric), _) => Ok(metric.clone()),
            (None, Reducer::Count) => Ok(COUNT_METRIC.to_string()),
            (None, reducer) => Err(anyhow!(
                "No metric column configured for reducer '{reducer}'. Supply {flag} or a view file."
            )),
        }
    }

    pub fn series_request(&self) -> Result<SeriesRequest> {
        Ok(SeriesRequest {
            group_key: self.group_key("--group-by")?,
            metric_key: self.metric_key("--metric")?,
            reducer: self.reducer(),
            breakdown_key: self.breakdown.clone(),
        })
    }

    pub fn pivot_request(&self) -> Result<PivotRequest> {
        Ok(PivotRequest {
            row_key: self.group_key("--rows")?,
            col_key: self.columns.clone(),
            value_key: self.metric_key("--values")?,
            reducer: self.reducer(),
        })
    }
}
