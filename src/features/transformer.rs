//! Raw record → feature vector

use super::record::{check_range, RawRecord, RecordError, BASE_FIELDS, GR_LIV_AREA, TOTAL_BSMT_SF, YEAR_BUILT, YR_SOLD};
use super::schema::FeatureSchema;
use std::collections::HashMap;
use std::sync::Arc;

pub const TOTAL_SF: &str = "TotalSF";
pub const HOUSE_AGE: &str = "HouseAge";

/// Features computed from other fields of the same record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivedFeature {
    /// Above-ground living area plus basement area
    TotalSf,
    /// Years between construction and sale
    HouseAge,
}

impl DerivedFeature {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            TOTAL_SF => Some(DerivedFeature::TotalSf),
            HOUSE_AGE => Some(DerivedFeature::HouseAge),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DerivedFeature::TotalSf => TOTAL_SF,
            DerivedFeature::HouseAge => HOUSE_AGE,
        }
    }

    pub fn inputs(self) -> &'static [&'static str] {
        match self {
            DerivedFeature::TotalSf => &[GR_LIV_AREA, TOTAL_BSMT_SF],
            DerivedFeature::HouseAge => &[YEAR_BUILT, YR_SOLD],
        }
    }

    fn compute(self, values: &HashMap<&str, f64>) -> f64 {
        let v = |name: &str| values.get(name).copied().unwrap_or(f64::NAN);
        match self {
            DerivedFeature::TotalSf => v(GR_LIV_AREA) + v(TOTAL_BSMT_SF),
            DerivedFeature::HouseAge => v(YR_SOLD) - v(YEAR_BUILT),
        }
    }
}

/// Where a schema position takes its value from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeatureSource {
    /// A numeric field copied as-is
    Raw(String),
    /// An engineered feature
    Derived(DerivedFeature),
    /// `Field=Category` one-hot indicator
    Indicator { field: String, category: String },
}

impl FeatureSource {
    pub fn resolve(name: &str) -> Self {
        if let Some(derived) = DerivedFeature::from_name(name) {
            return FeatureSource::Derived(derived);
        }
        match name.split_once('=') {
            Some((field, category)) if !field.trim().is_empty() && !category.trim().is_empty() => {
                FeatureSource::Indicator {
                    field: field.trim().to_string(),
                    category: category.trim().to_string(),
                }
            }
            _ => FeatureSource::Raw(name.to_string()),
        }
    }
}

/// Deterministic mapping from a [`RawRecord`] to the schema-ordered vector
/// the model consumes.
#[derive(Debug, Clone)]
pub struct FeatureTransformer {
    schema: Arc<FeatureSchema>,
    sources: Vec<FeatureSource>,
    numeric_fields: Vec<String>,
    category_fields: Vec<String>,
}

impl FeatureTransformer {
    pub fn new(schema: Arc<FeatureSchema>) -> Self {
        let sources: Vec<FeatureSource> = schema
            .features()
            .iter()
            .map(|name| FeatureSource::resolve(name))
            .collect();

        let mut numeric_fields: Vec<String> = BASE_FIELDS.iter().map(|f| f.to_string()).collect();
        let mut category_fields: Vec<String> = Vec::new();
        for source in &sources {
            match source {
                FeatureSource::Raw(name) => push_unique(&mut numeric_fields, name),
                FeatureSource::Derived(derived) => {
                    for input in derived.inputs() {
                        push_unique(&mut numeric_fields, input);
                    }
                }
                FeatureSource::Indicator { field, .. } => push_unique(&mut category_fields, field),
            }
        }

        Self {
            schema,
            sources,
            numeric_fields,
            category_fields,
        }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn sources(&self) -> &[FeatureSource] {
        &self.sources
    }

    /// Every field a record must carry, numeric fields first
    pub fn required_fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = self.numeric_fields.iter().map(String::as_str).collect();
        for field in &self.category_fields {
            if !fields.contains(&field.as_str()) {
                fields.push(field);
            }
        }
        fields
    }

    /// Validate, engineer and scale one record
    pub fn transform(&self, record: &RawRecord) -> Result<Vec<f64>, RecordError> {
        let mut row = self.transform_unscaled(record)?;
        if let Some(scaler) = self.schema.scaler() {
            // Widths were checked when the schema was built
            scaler.scale_row(&mut row);
        }
        Ok(row)
    }

    /// Validate and engineer one record without applying the scaler.
    /// Training uses this to build the matrix the scaler is fitted on.
    pub fn transform_unscaled(&self, record: &RawRecord) -> Result<Vec<f64>, RecordError> {
        let missing = record.missing(self.required_fields());
        if !missing.is_empty() {
            return Err(RecordError::Missing(missing));
        }

        let mut values: HashMap<&str, f64> = HashMap::with_capacity(self.numeric_fields.len());
        for field in &self.numeric_fields {
            let value = record.number(field)?;
            check_range(field, value)?;
            values.insert(field.as_str(), value);
        }

        let mut row = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            let value = match source {
                FeatureSource::Raw(name) => values[name.as_str()],
                FeatureSource::Derived(derived) => derived.compute(&values),
                FeatureSource::Indicator { field, category } => {
                    if record.category(field)? == *category {
                        1.0
                    } else {
                        0.0
                    }
                }
            };
            row.push(value);
        }

        Ok(row)
    }
}

fn push_unique(fields: &mut Vec<String>, name: &str) {
    if !fields.iter().any(|f| f == name) {
        fields.push(name.to_string());
    }
}
