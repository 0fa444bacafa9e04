//! Schema-checked prediction over raw records

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info};

use super::InferenceConfig;
use crate::error::{PredictorError, Result};
use crate::features::{FeatureSchema, FeatureTransformer, RawRecord};
use crate::model::{ModelArtifact, Regressor};

/// A loaded schema and model, ready to price houses
pub struct Predictor {
    schema: Arc<FeatureSchema>,
    transformer: FeatureTransformer,
    model: Arc<dyn Regressor>,
    config: InferenceConfig,
}

impl std::fmt::Debug for Predictor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Predictor")
            .field("model", &self.model.name())
            .field("n_features", &self.schema.len())
            .field("scaled", &self.schema.is_scaled())
            .finish()
    }
}

impl Predictor {
    /// Pair a schema with a fitted model of the same width.
    pub fn new(schema: FeatureSchema, model: Arc<dyn Regressor>) -> Result<Self> {
        let n_model = model.n_features().ok_or(PredictorError::ModelNotFitted)?;
        if n_model != schema.len() {
            return Err(PredictorError::Schema(format!(
                "model expects {} features but schema lists {}",
                n_model,
                schema.len()
            )));
        }
        model.validate()?;

        let schema = Arc::new(schema);
        let transformer = FeatureTransformer::new(Arc::clone(&schema));
        Ok(Self {
            schema,
            transformer,
            model,
            config: InferenceConfig::default(),
        })
    }

    /// Load both artifacts and check that their feature lists match.
    pub fn load(schema_path: impl AsRef<Path>, model_path: impl AsRef<Path>) -> Result<Self> {
        let schema_path = schema_path.as_ref();
        let model_path = model_path.as_ref();

        let schema = FeatureSchema::load(schema_path)?;
        let artifact = ModelArtifact::load(model_path)?;
        artifact.check_schema(&schema)?;

        let predictor = Self::new(schema, Arc::new(artifact.model))?;
        info!(
            schema = %schema_path.display(),
            model = %model_path.display(),
            model_type = predictor.model_kind(),
            n_features = predictor.n_features(),
            scaled = predictor.is_scaled(),
            "Predictor ready"
        );
        Ok(predictor)
    }

    pub fn with_config(mut self, config: InferenceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn transformer(&self) -> &FeatureTransformer {
        &self.transformer
    }

    pub fn model_kind(&self) -> &'static str {
        self.model.name()
    }

    pub fn n_features(&self) -> usize {
        self.schema.len()
    }

    pub fn is_scaled(&self) -> bool {
        self.schema.is_scaled()
    }

    /// Validate and transform records in input order. The first bad record
    /// fails the whole batch.
    pub fn transform(&self, records: &[RawRecord]) -> Result<Vec<Vec<f64>>> {
        records
            .iter()
            .enumerate()
            .map(|(index, record)| {
                self.transformer
                    .transform(record)
                    .map_err(|source| PredictorError::Validation { index, source })
            })
            .collect()
    }

    /// Predict one already-transformed vector.
    pub fn predict_vector(&self, row: &[f64]) -> Result<f64> {
        let value = self
            .model
            .predict_row(row)
            .map_err(|e| PredictorError::Prediction(e.to_string()))?;
        if !value.is_finite() {
            return Err(PredictorError::Prediction(format!(
                "model produced a non-finite value ({})",
                value
            )));
        }
        Ok(value)
    }

    /// One price per record, in input order.
    pub fn predict_records(&self, records: &[RawRecord]) -> Result<Vec<f64>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let rows = self.transform(records)?;

        let predictions = if rows.len() > self.config.parallel_threshold {
            rows.par_iter()
                .map(|row| self.predict_vector(row))
                .collect::<Result<Vec<_>>>()?
        } else {
            rows.iter()
                .map(|row| self.predict_vector(row))
                .collect::<Result<Vec<_>>>()?
        };

        debug!(
            n_records = records.len(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "Batch predicted"
        );
        Ok(predictions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{RecordError, Scaler, ScalerType};
    use crate::model::{FittedModel, LinearRegression};
    use ndarray::{Array1, Array2};
    use serde_json::json;

    fn record(area: f64, qual: f64) -> RawRecord {
        serde_json::from_value(json!({
            "Gr Liv Area": area,
            "Total Bsmt SF": 800,
            "Garage Cars": 2,
            "Overall Qual": qual,
            "Year Built": 1995,
            "Yr Sold": 2010
        }))
        .unwrap()
    }

    /// Linear model over the default features where price tracks living area
    fn predictor(scaled: bool) -> Predictor {
        let schema = FeatureSchema::new(FeatureSchema::default_features()).unwrap();
        let transformer = FeatureTransformer::new(Arc::new(schema.clone()));

        let records: Vec<RawRecord> = (0..20)
            .map(|i| record(1000.0 + 50.0 * i as f64, (i % 10 + 1) as f64))
            .collect();
        let rows: Vec<f64> = records
            .iter()
            .flat_map(|r| transformer.transform_unscaled(r).unwrap())
            .collect();
        let x = Array2::from_shape_vec((records.len(), schema.len()), rows).unwrap();
        let y: Array1<f64> = x.column(0).mapv(|a| 100.0 * a + 5000.0);

        let (schema, x) = if scaled {
            let (scaler, xs) = Scaler::fit_transform(ScalerType::Standard, &x).unwrap();
            (schema.with_scaler(scaler).unwrap(), xs)
        } else {
            (schema, x)
        };

        let mut model = FittedModel::from(LinearRegression::new().with_alpha(1e-6));
        model.fit(&x, &y).unwrap();
        Predictor::new(schema, Arc::new(model)).unwrap()
    }

    #[test]
    fn test_predicts_in_order() {
        let p = predictor(true);
        let out = p
            .predict_records(&[record(1200.0, 5.0), record(1800.0, 7.0), record(1500.0, 3.0)])
            .unwrap();
        assert_eq!(out.len(), 3);
        assert!((out[0] - 125_000.0).abs() < 1.0);
        assert!((out[1] - 185_000.0).abs() < 1.0);
        assert!((out[2] - 155_000.0).abs() < 1.0);
    }

    #[test]
    fn test_empty_batch() {
        assert!(predictor(false).predict_records(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_first_bad_record_rejects_batch() {
        let p = predictor(false);
        let mut bad = record(1500.0, 5.0);
        bad.remove("Garage Cars");
        let mut worse = record(1500.0, 5.0);
        worse.remove("Yr Sold");

        let err = p.predict_records(&[record(1400.0, 5.0), bad, worse]).unwrap_err();
        match err {
            PredictorError::Validation { index, source } => {
                assert_eq!(index, 1);
                assert_eq!(source, RecordError::Missing(vec!["Garage Cars".to_string()]));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parallel_path_matches_sequential() {
        let seq = predictor(true);
        let par = predictor(true).with_config(InferenceConfig::new().with_parallel_threshold(0));
        let records: Vec<RawRecord> = (0..50).map(|i| record(900.0 + i as f64 * 31.0, 6.0)).collect();
        assert_eq!(seq.predict_records(&records).unwrap(), par.predict_records(&records).unwrap());
    }

    #[test]
    fn test_width_mismatch_rejected() {
        let schema = FeatureSchema::new(["Gr Liv Area", "Garage Cars"]).unwrap();
        let mut model = FittedModel::from(LinearRegression::new());
        model
            .fit(&Array2::from_shape_vec((3, 1), vec![1.0, 2.0, 3.0]).unwrap(), &Array1::from_vec(vec![1.0, 2.0, 3.0]))
            .unwrap();
        assert!(matches!(
            Predictor::new(schema, Arc::new(model)),
            Err(PredictorError::Schema(_))
        ));
    }

    #[test]
    fn test_unfitted_model_rejected() {
        let schema = FeatureSchema::new(["Gr Liv Area"]).unwrap();
        let model = FittedModel::from(LinearRegression::new());
        assert!(matches!(
            Predictor::new(schema, Arc::new(model)),
            Err(PredictorError::ModelNotFitted)
        ));
    }

    #[test]
    fn test_load_checks_names() {
        let dir = tempfile::tempdir().unwrap();
        let p = predictor(false);
        let schema_path = dir.path().join("feature_schema.json");
        let model_path = dir.path().join("model.json");

        // Same width, different order
        let mut names = p.schema().features().to_vec();
        names.swap(0, 1);
        FeatureSchema::new(names).unwrap().save(&schema_path).unwrap();

        let mut model = FittedModel::from(LinearRegression::new().with_alpha(1.0));
        let x = Array2::from_shape_fn((10, 8), |(i, j)| (i * (j + 1)) as f64 + (j * j) as f64);
        let y = Array1::from_shape_fn(10, |i| i as f64);
        model.fit(&x, &y).unwrap();
        ModelArtifact::new(model, p.schema().features().to_vec())
            .save(&model_path)
            .unwrap();

        assert!(matches!(
            Predictor::load(&schema_path, &model_path),
            Err(PredictorError::Schema(_))
        ));
    }
}
