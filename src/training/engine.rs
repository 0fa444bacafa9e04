//! End-to-end training: CSV in, serving artifacts out

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2, Axis};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::config::{ModelSpec, TrainingConfig};
use super::cross_validation::{cross_validate, train_test_split, CVResults, KFold};
use crate::error::{PredictorError, Result};
use crate::features::{FeatureSchema, FeatureTransformer, Scaler, ScalerType};
use crate::model::{FittedModel, ModelArtifact, RegressionMetrics, Regressor};
use crate::utils::{dataframe_to_records, numeric_column, DataLoader};

/// Cross-validation outcome for one candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateScore {
    pub label: String,
    pub spec: ModelSpec,
    pub cv: CVResults,
    pub fit_secs: f64,
}

/// Everything a training run decided, written next to the artifacts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub selected: String,
    pub selected_index: usize,
    pub candidates: Vec<CandidateScore>,
    pub train_metrics: RegressionMetrics,
    pub test_metrics: Option<RegressionMetrics>,
    pub features: Vec<String>,
    pub scaler: ScalerType,
    pub n_rows_loaded: usize,
    pub n_rows_dropped: usize,
    pub n_train: usize,
    pub n_test: usize,
    pub trained_at: DateTime<Utc>,
    pub duration_secs: f64,
}

/// Engineered design matrix with its target
#[derive(Debug, Clone)]
pub struct Dataset {
    pub x: Array2<f64>,
    pub y: Array1<f64>,
    pub n_loaded: usize,
    pub n_dropped: usize,
}

/// Result of [`TrainEngine::fit`]: the artifacts plus the report
pub struct TrainOutcome {
    pub schema: FeatureSchema,
    pub artifact: ModelArtifact,
    pub report: TrainingReport,
}

/// Training engine
pub struct TrainEngine {
    config: TrainingConfig,
}

impl TrainEngine {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    fn schema(&self) -> Result<FeatureSchema> {
        match &self.config.features {
            Some(features) => FeatureSchema::new(features.clone()),
            None => FeatureSchema::new(FeatureSchema::default_features()),
        }
    }

    /// Build the unscaled feature matrix. Rows with an invalid record or a
    /// missing target are dropped and counted.
    pub fn prepare(&self, df: &DataFrame, schema: &FeatureSchema) -> Result<Dataset> {
        let target = numeric_column(df, &self.config.target_column)?;
        let records = dataframe_to_records(df)?;
        let transformer = FeatureTransformer::new(Arc::new(schema.clone()));

        let mut values = Vec::with_capacity(records.len() * schema.len());
        let mut targets = Vec::with_capacity(records.len());
        let mut first_error: Option<String> = None;

        for (i, (record, y)) in records.iter().zip(&target).enumerate() {
            let y = match y {
                Some(y) if y.is_finite() => *y,
                _ => continue,
            };
            match transformer.transform_unscaled(record) {
                Ok(row) => {
                    values.extend(row);
                    targets.push(y);
                }
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(format!("row {}: {}", i, e));
                    }
                }
            }
        }

        let n_loaded = records.len();
        let n_dropped = n_loaded - targets.len();
        if n_dropped > 0 {
            warn!(
                dropped = n_dropped,
                loaded = n_loaded,
                first_error = first_error.as_deref().unwrap_or("missing target"),
                "Dropped rows that could not be engineered"
            );
        }
        if targets.is_empty() {
            return Err(PredictorError::Data("no usable rows in dataset".to_string()));
        }

        let x = Array2::from_shape_vec((targets.len(), schema.len()), values)?;
        Ok(Dataset {
            x,
            y: Array1::from_vec(targets),
            n_loaded,
            n_dropped,
        })
    }

    /// Select, refit and evaluate a model on an in-memory frame.
    pub fn fit(&self, df: &DataFrame) -> Result<TrainOutcome> {
        let start = Instant::now();
        if self.config.candidates.is_empty() {
            return Err(PredictorError::InvalidParameter {
                name: "candidates".to_string(),
                value: "[]".to_string(),
                reason: "at least one candidate model is required".to_string(),
            });
        }

        let schema = self.schema()?;
        let data = self.prepare(df, &schema)?;
        info!(rows = data.y.len(), features = schema.len(), "Dataset prepared");

        let split = train_test_split(data.y.len(), self.config.test_size, self.config.seed)?;
        let x_train = data.x.select(Axis(0), &split.train_indices);
        let y_train = data.y.select(Axis(0), &split.train_indices);
        let x_test = data.x.select(Axis(0), &split.test_indices);
        let y_test = data.y.select(Axis(0), &split.test_indices);

        let (scaler, x_train) = Scaler::fit_transform(self.config.scaler, &x_train)?;
        let x_test = scaler.transform(&x_test)?;
        let schema = match self.config.scaler {
            ScalerType::None => schema,
            _ => schema.with_scaler(scaler)?,
        };

        let splits = KFold::new(self.config.cv_folds)
            .with_random_state(self.config.seed)
            .split(x_train.nrows())?;

        let mut candidates = Vec::with_capacity(self.config.candidates.len());
        for spec in &self.config.candidates {
            let label = spec.label();
            let fit_start = Instant::now();
            let cv = cross_validate(&spec.build(self.config.seed), &x_train, &y_train, &splits)?;
            let fit_secs = fit_start.elapsed().as_secs_f64();
            info!(
                candidate = %label,
                cv_rmse = cv.mean_rmse,
                cv_std = cv.std_rmse,
                cv_r2 = cv.mean_r2,
                secs = fit_secs,
                "Candidate evaluated"
            );
            candidates.push(CandidateScore {
                label,
                spec: spec.clone(),
                cv,
                fit_secs,
            });
        }

        let selected_index = select_best(&candidates)?;
        let best = &candidates[selected_index];
        info!(selected = %best.label, cv_rmse = best.cv.mean_rmse, "Model selected");

        let mut model: FittedModel = best.spec.build(self.config.seed);
        model.fit(&x_train, &y_train)?;
        let train_metrics = RegressionMetrics::compute(&y_train, &model.predict(&x_train)?);
        let test_metrics = if y_test.is_empty() {
            None
        } else {
            Some(RegressionMetrics::compute(&y_test, &model.predict(&x_test)?))
        };
        if let Some(m) = &test_metrics {
            info!(rmse = m.rmse, mae = m.mae, r2 = m.r2, n = m.n_samples, "Held-out evaluation");
        }

        let mut artifact = ModelArtifact::new(model, schema.features().to_vec());
        if let Some(m) = test_metrics {
            artifact = artifact.with_metrics(m);
        }

        let report = TrainingReport {
            selected: best.label.clone(),
            selected_index,
            candidates: candidates.clone(),
            train_metrics,
            test_metrics,
            features: schema.features().to_vec(),
            scaler: self.config.scaler,
            n_rows_loaded: data.n_loaded,
            n_rows_dropped: data.n_dropped,
            n_train: split.train_indices.len(),
            n_test: split.test_indices.len(),
            trained_at: Utc::now(),
            duration_secs: start.elapsed().as_secs_f64(),
        };

        Ok(TrainOutcome {
            schema,
            artifact,
            report,
        })
    }

    /// Train from a CSV file and write the artifacts into the output
    /// directory.
    pub fn run(&self, data_path: impl AsRef<Path>) -> Result<TrainingReport> {
        let data_path = data_path.as_ref();
        info!(path = %data_path.display(), target = %self.config.target_column, "Training started");

        let df = DataLoader::new().load_csv(data_path)?;
        let outcome = self.fit(&df)?;
        self.save(&outcome)?;
        Ok(outcome.report)
    }

    /// Write model, schema and report
    pub fn save(&self, outcome: &TrainOutcome) -> Result<()> {
        std::fs::create_dir_all(&self.config.output_dir)?;
        outcome.artifact.save(self.config.model_path())?;
        outcome.schema.save(self.config.schema_path())?;
        std::fs::write(
            self.config.report_path(),
            serde_json::to_string_pretty(&outcome.report)?,
        )?;
        info!(dir = %self.config.output_dir.display(), "Artifacts written");
        Ok(())
    }
}

/// Index of the lowest mean CV RMSE; the earliest candidate wins ties.
pub fn select_best(candidates: &[CandidateScore]) -> Result<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, c) in candidates.iter().enumerate() {
        let rmse = c.cv.mean_rmse;
        if !rmse.is_finite() {
            continue;
        }
        if best.map_or(true, |(_, b)| rmse < b) {
            best = Some((i, rmse));
        }
    }
    best.map(|(i, _)| i)
        .ok_or_else(|| PredictorError::Computation("no candidate produced a finite CV score".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GradientBoostingConfig, MaxFeatures};
    use polars::prelude::*;

    /// Synthetic Ames-like frame with a linear price
    fn frame(n: usize) -> DataFrame {
        let area: Vec<f64> = (0..n).map(|i| 800.0 + (i * 37 % 1500) as f64).collect();
        let bsmt: Vec<f64> = (0..n).map(|i| 400.0 + (i * 53 % 900) as f64).collect();
        let cars: Vec<i64> = (0..n).map(|i| (i % 4) as i64).collect();
        let qual: Vec<i64> = (0..n).map(|i| (i % 10 + 1) as i64).collect();
        let built: Vec<i64> = (0..n).map(|i| 1950 + (i * 7 % 60) as i64).collect();
        let sold: Vec<i64> = (0..n).map(|i| 2006 + (i % 5) as i64).collect();
        let price: Vec<Option<f64>> = (0..n)
            .map(|i| {
                if i == 3 {
                    return None;
                }
                Some(
                    60.0 * area[i] + 30.0 * bsmt[i] + 8000.0 * cars[i] as f64 + 12000.0 * qual[i] as f64
                        - 300.0 * (sold[i] - built[i]) as f64,
                )
            })
            .collect();

        DataFrame::new(vec![
            Column::new("Gr Liv Area".into(), area),
            Column::new("Total Bsmt SF".into(), bsmt),
            Column::new("Garage Cars".into(), cars),
            Column::new("Overall Qual".into(), qual),
            Column::new("Year Built".into(), built),
            Column::new("Yr Sold".into(), sold),
            Column::new("SalePrice".into(), price),
        ])
        .unwrap()
    }

    fn small_candidates() -> Vec<ModelSpec> {
        vec![
            ModelSpec::RandomForest {
                n_estimators: 10,
                max_depth: Some(6),
                min_samples_leaf: 1,
                max_features: MaxFeatures::All,
            },
            ModelSpec::Linear { alpha: 0.0 },
            ModelSpec::GradientBoosting(GradientBoostingConfig {
                n_estimators: 30,
                learning_rate: 0.1,
                ..Default::default()
            }),
        ]
    }

    #[test]
    fn test_prepare_drops_missing_target() {
        let engine = TrainEngine::new(TrainingConfig::default());
        let schema = FeatureSchema::new(FeatureSchema::default_features()).unwrap();
        let data = engine.prepare(&frame(20), &schema).unwrap();
        assert_eq!(data.n_loaded, 20);
        assert_eq!(data.n_dropped, 1);
        assert_eq!(data.x.dim(), (19, 8));
    }

    #[test]
    fn test_linear_wins_on_linear_data() {
        let config = TrainingConfig::default()
            .with_candidates(small_candidates())
            .with_cv_folds(3);
        let outcome = TrainEngine::new(config).fit(&frame(120)).unwrap();
        let report = &outcome.report;

        assert_eq!(report.selected, "linear");
        let best = report.candidates[report.selected_index].cv.mean_rmse;
        assert!(report.candidates.iter().all(|c| c.cv.mean_rmse >= best));
        assert!(report.test_metrics.unwrap().r2 > 0.999);
        assert_eq!(report.n_train + report.n_test, 119);
        assert!(outcome.schema.is_scaled());
        assert_eq!(outcome.artifact.feature_names, outcome.schema.features());
    }

    #[test]
    fn test_run_writes_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("ames.csv");
        let mut df = frame(60);
        crate::utils::DataSaver::save_csv(&mut df, &csv_path).unwrap();

        let config = TrainingConfig::default()
            .with_candidates(vec![ModelSpec::Linear { alpha: 0.0 }])
            .with_cv_folds(2)
            .with_output_dir(dir.path().join("models"));
        let engine = TrainEngine::new(config);
        engine.run(&csv_path).unwrap();

        let config = engine.config();
        assert!(config.model_path().exists());
        assert!(config.schema_path().exists());
        let report: TrainingReport =
            serde_json::from_str(&std::fs::read_to_string(config.report_path()).unwrap()).unwrap();
        assert_eq!(report.selected, "linear");
        assert_eq!(report.n_rows_dropped, 1);
    }

    fn scored(label: &str, mean_rmse: f64) -> CandidateScore {
        CandidateScore {
            label: label.to_string(),
            spec: ModelSpec::Linear { alpha: 0.0 },
            cv: CVResults {
                fold_rmse: vec![mean_rmse],
                mean_rmse,
                std_rmse: 0.0,
                mean_r2: 0.0,
            },
            fit_secs: 0.0,
        }
    }

    #[test]
    fn test_select_best_skips_non_finite_scores() {
        let candidates = vec![
            scored("nan", f64::NAN),
            scored("slow", 900.0),
            scored("inf", f64::INFINITY),
            scored("fast", 400.0),
        ];
        assert_eq!(select_best(&candidates).unwrap(), 3);

        let hopeless = vec![scored("nan", f64::NAN), scored("inf", f64::INFINITY)];
        assert!(matches!(select_best(&hopeless), Err(PredictorError::Computation(_))));
    }

    #[test]
    fn test_select_best_tie_keeps_earliest() {
        let candidates = vec![scored("a", 500.0), scored("b", 250.0), scored("c", 250.0)];
        assert_eq!(select_best(&candidates).unwrap(), 1);
    }

    #[test]
    fn test_empty_candidates_rejected() {
        let config = TrainingConfig::default().with_candidates(vec![]);
        assert!(TrainEngine::new(config).fit(&frame(20)).is_err());
    }

    #[test]
    fn test_missing_target_column() {
        let config = TrainingConfig::new("Price");
        assert!(matches!(
            TrainEngine::new(config).fit(&frame(20)),
            Err(PredictorError::Data(_))
        ));
    }
}
