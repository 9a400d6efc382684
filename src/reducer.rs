use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reduction applied to the numeric values collected in a bucket or pivot
/// cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reducer {
    #[default]
    Sum,
    Avg,
    Min,
    Max,
    Count,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown reducer '{0}' (expected one of sum, avg, min, max, count)")]
pub struct ReducerParseError(pub String);

impl Reducer {
    pub const ALL: [Reducer; 5] = [
        Reducer::Sum,
        Reducer::Avg,
        Reducer::Min,
        Reducer::Max,
        Reducer::Count,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Reducer::Sum => "sum",
            Reducer::Avg => "avg",
            Reducer::Min => "min",
            Reducer::Max => "max",
            Reducer::Count => "count",
        }
    }

    /// Reduces `values`. An empty slice has no sum, mean, or extremes and
    /// yields `None`; its count is zero.
    pub fn reduce(self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return match self {
                Reducer::Count => Some(0.0),
                _ => None,
            };
        }
        let reduced = match self {
            Reducer::Sum => values.iter().sum(),
            Reducer::Avg => values.iter().sum::<f64>() / values.len() as f64,
            Reducer::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Reducer::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Reducer::Count => values.len() as f64,
        };
        Some(reduced)
    }
}

impl fmt::Display for Reducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Reducer {
    type Err = ReducerParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let lowered = value.trim().to_ascii_lowercase();
        Reducer::ALL
            .into_iter()
            .find(|reducer| reducer.as_str() == lowered)
            .ok_or_else(|| ReducerParseError(value.to_string()))
    }
}
