//! The ordered feature list a model was trained on

use super::record::BASE_FIELDS;
use super::scaler::{Scaler, ScalerType};
use super::transformer::{HOUSE_AGE, TOTAL_SF};
use crate::error::{PredictorError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Feature names (and scaling) fixed at training time.
///
/// Loaded once at startup and shared read-only; nothing mutates a schema
/// after [`FeatureSchema::load`] returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    features: Vec<String>,
    #[serde(default)]
    scaler: Option<Scaler>,
}

impl FeatureSchema {
    /// Create an unscaled schema
    pub fn new<I, S>(features: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let schema = Self {
            features: features.into_iter().map(Into::into).collect(),
            scaler: None,
        };
        schema.validate()?;
        Ok(schema)
    }

    /// The feature set used when nothing else is requested: the six base
    /// attributes followed by the two engineered ones.
    pub fn default_features() -> Vec<String> {
        BASE_FIELDS
            .iter()
            .copied()
            .chain([TOTAL_SF, HOUSE_AGE])
            .map(str::to_string)
            .collect()
    }

    /// Attach fitted scaling parameters
    pub fn with_scaler(mut self, scaler: Scaler) -> Result<Self> {
        self.scaler = Some(scaler);
        self.validate()?;
        Ok(self)
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn scaler(&self) -> Option<&Scaler> {
        self.scaler.as_ref()
    }

    /// Whether scaling does anything at all
    pub fn is_scaled(&self) -> bool {
        matches!(&self.scaler, Some(s) if s.kind() != ScalerType::None)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.features.iter().position(|f| f == name)
    }

    /// Check the schema is internally consistent
    pub fn validate(&self) -> Result<()> {
        if self.features.is_empty() {
            return Err(PredictorError::Schema("feature list is empty".to_string()));
        }

        let mut seen = HashSet::new();
        for name in &self.features {
            if name.trim().is_empty() {
                return Err(PredictorError::Schema("blank feature name".to_string()));
            }
            if !seen.insert(name.as_str()) {
                return Err(PredictorError::Schema(format!("duplicate feature '{}'", name)));
            }
        }

        if let Some(scaler) = &self.scaler {
            if scaler.n_features() != self.features.len() {
                return Err(PredictorError::Schema(format!(
                    "scaler has {} parameter pairs for {} features",
                    scaler.n_features(),
                    self.features.len()
                )));
            }
            // Re-run the parameter checks that deserialization skipped
            Scaler::from_params(scaler.kind(), scaler.params().to_vec())?;
        }

        Ok(())
    }

    /// Save the schema as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load and validate a schema file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let schema: Self = serde_json::from_str(&json)?;
        schema.validate()?;
        Ok(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::scaler::ScalerParams;
    use ndarray::array;

    #[test]
    fn test_default_features_order() {
        let features = FeatureSchema::default_features();
        assert_eq!(features.len(), 8);
        assert_eq!(features[0], "Gr Liv Area");
        assert_eq!(features[6], "TotalSF");
        assert_eq!(features[7], "HouseAge");
    }

    #[test]
    fn test_rejects_duplicates_and_empty() {
        assert!(FeatureSchema::new(Vec::<String>::new()).is_err());
        assert!(FeatureSchema::new(["TotalSF", "TotalSF"]).is_err());
    }

    #[test]
    fn test_scaler_width_must_match() {
        let scaler = Scaler::fit(ScalerType::Standard, &array![[1.0], [2.0]]).unwrap();
        let schema = FeatureSchema::new(["TotalSF", "HouseAge"]).unwrap();
        assert!(matches!(schema.with_scaler(scaler), Err(PredictorError::Schema(_))));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feature_schema.json");

        let scaler = Scaler::from_params(
            ScalerType::Standard,
            vec![
                ScalerParams { center: 2500.0, scale: 700.0 },
                ScalerParams { center: 35.0, scale: 30.0 },
            ],
        )
        .unwrap();
        let schema = FeatureSchema::new(["TotalSF", "HouseAge"])
            .unwrap()
            .with_scaler(scaler)
            .unwrap();
        schema.save(&path).unwrap();

        let loaded = FeatureSchema::load(&path).unwrap();
        assert_eq!(loaded, schema);
        assert!(loaded.is_scaled());
        assert_eq!(loaded.position("HouseAge"), Some(1));
    }

    #[test]
    fn test_load_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feature_schema.json");
        std::fs::write(&path, "{\"features\": [\"TotalSF\"], \"scaler\": {\"kind\": \"standard\", \"params\": [{\"center\": 1.0, \"scale\": 0.0}]}}").unwrap();
        assert!(matches!(FeatureSchema::load(&path), Err(PredictorError::Schema(_))));

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(FeatureSchema::load(&path), Err(PredictorError::Json(_))));
    }
}
