//! Feature scaling fitted at training time and replayed at serving time

use crate::error::{PredictorError, Result};
use ndarray::{Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

/// Type of scaler to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalerType {
    /// Standard scaling (z-score normalization): (x - mean) / std
    Standard,
    /// Min-Max scaling: (x - min) / (max - min)
    MinMax,
    /// Robust scaling using median and IQR
    Robust,
    /// No scaling
    None,
}

impl std::str::FromStr for ScalerType {
    type Err = PredictorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "standard" => Ok(ScalerType::Standard),
            "minmax" | "min_max" => Ok(ScalerType::MinMax),
            "robust" => Ok(ScalerType::Robust),
            "none" => Ok(ScalerType::None),
            other => Err(PredictorError::InvalidParameter {
                name: "scaler".to_string(),
                value: other.to_string(),
                reason: "expected standard, minmax, robust or none".to_string(),
            }),
        }
    }
}

/// Parameters for one fitted column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    /// mean, min, or median
    pub center: f64,
    /// std, range, or IQR
    pub scale: f64,
}

/// Feature scaler. Parameters are positional and follow the schema order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scaler {
    kind: ScalerType,
    params: Vec<ScalerParams>,
}

impl Scaler {
    /// Fit one parameter pair per column of `x`
    pub fn fit(kind: ScalerType, x: &Array2<f64>) -> Result<Self> {
        if x.nrows() == 0 {
            return Err(PredictorError::Data("cannot fit a scaler on zero rows".to_string()));
        }

        let params = x
            .axis_iter(Axis(1))
            .map(|column| compute_params(kind, column))
            .collect();

        Ok(Self { kind, params })
    }

    /// Rebuild a scaler from persisted parameters
    pub fn from_params(kind: ScalerType, params: Vec<ScalerParams>) -> Result<Self> {
        if let Some(bad) = params.iter().position(|p| p.scale == 0.0 || !p.scale.is_finite()) {
            return Err(PredictorError::Schema(format!(
                "scaler parameter {} has unusable scale {}",
                bad, params[bad].scale
            )));
        }
        Ok(Self { kind, params })
    }

    pub fn kind(&self) -> ScalerType {
        self.kind
    }

    pub fn params(&self) -> &[ScalerParams] {
        &self.params
    }

    pub fn n_features(&self) -> usize {
        self.params.len()
    }

    /// Scale one feature vector in place
    pub fn transform_row(&self, row: &mut [f64]) -> Result<()> {
        self.check_width(row.len())?;
        self.scale_row(row);
        Ok(())
    }

    /// Width-unchecked form of [`Scaler::transform_row`] for callers that
    /// validated the width up front.
    pub(crate) fn scale_row(&self, row: &mut [f64]) {
        for (v, p) in row.iter_mut().zip(&self.params) {
            *v = (*v - p.center) / p.scale;
        }
    }

    /// Scale a whole matrix, one column per fitted parameter
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_width(x.ncols())?;
        let mut out = x.clone();
        for (mut column, p) in out.axis_iter_mut(Axis(1)).zip(&self.params) {
            column.mapv_inplace(|v| (v - p.center) / p.scale);
        }
        Ok(out)
    }

    /// Fit and transform in one step
    pub fn fit_transform(kind: ScalerType, x: &Array2<f64>) -> Result<(Self, Array2<f64>)> {
        let scaler = Self::fit(kind, x)?;
        let scaled = scaler.transform(x)?;
        Ok((scaler, scaled))
    }

    /// Undo the scaling
    pub fn inverse_transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_width(x.ncols())?;
        let mut out = x.clone();
        for (mut column, p) in out.axis_iter_mut(Axis(1)).zip(&self.params) {
            column.mapv_inplace(|v| v * p.scale + p.center);
        }
        Ok(out)
    }

    fn check_width(&self, width: usize) -> Result<()> {
        if width != self.params.len() {
            return Err(PredictorError::Shape {
                expected: format!("{} features", self.params.len()),
                actual: format!("{} features", width),
            });
        }
        Ok(())
    }
}

fn compute_params(kind: ScalerType, column: ArrayView1<f64>) -> ScalerParams {
    let non_zero = |s: f64| if s == 0.0 || !s.is_finite() { 1.0 } else { s };

    match kind {
        ScalerType::Standard => {
            let n = column.len() as f64;
            let mean = column.sum() / n;
            // Sample standard deviation (ddof = 1)
            let std = if column.len() > 1 {
                (column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
            } else {
                0.0
            };
            ScalerParams { center: mean, scale: non_zero(std) }
        }
        ScalerType::MinMax => {
            let min = column.iter().copied().fold(f64::INFINITY, f64::min);
            let max = column.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            ScalerParams { center: min, scale: non_zero(max - min) }
        }
        ScalerType::Robust => {
            let mut sorted = column.to_vec();
            sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            let median = quantile(&sorted, 0.5);
            let iqr = quantile(&sorted, 0.75) - quantile(&sorted, 0.25);
            ScalerParams { center: median, scale: non_zero(iqr) }
        }
        ScalerType::None => ScalerParams { center: 0.0, scale: 1.0 },
    }
}

/// Linear-interpolated quantile of an already sorted slice
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}
