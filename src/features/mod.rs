//! Feature engineering
//!
//! Turns loosely typed housing records into the fixed-order numeric vectors
//! a model was trained on:
//! - [`RawRecord`] - caller-supplied attributes with numeric coercion
//! - [`FeatureSchema`] - ordered feature names plus fitted scaling
//! - [`FeatureTransformer`] - validation, derived features, scaling

pub mod record;
pub mod scaler;
pub mod schema;
pub mod transformer;

pub use record::{RawRecord, RecordError, BASE_FIELDS};
pub use scaler::{Scaler, ScalerParams, ScalerType};
pub use schema::FeatureSchema;
pub use transformer::{DerivedFeature, FeatureSource, FeatureTransformer, HOUSE_AGE, TOTAL_SF};
