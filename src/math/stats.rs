// Stats module - aggregate statistics over numeric sequences

use serde::{Deserialize, Serialize};

/// Range of a sequence
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MinMax {
    pub min: f64,
    pub max: f64,
}

/// Arithmetic mean; `0.0` for empty input.
pub fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation; `0.0` for empty input.
pub fn standard_deviation(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = average(values);
    let variance =
        values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Minimum and maximum; `{0, 0}` for empty input. NaN entries are skipped.
pub fn min_max(values: &[f64]) -> MinMax {
    let mut finite = values.iter().copied().filter(|v| !v.is_nan());
    let Some(first) = finite.next() else {
        return MinMax::default();
    };

    finite.fold(MinMax { min: first, max: first }, |acc, v| MinMax {
        min: acc.min.min(v),
        max: acc.max.max(v),
    })
}
