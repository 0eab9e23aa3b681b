//! Seam to the library that actually builds and trains models.

use indexmap::IndexMap;
use serde::Serialize;

use kg_params::LayerLayout;
use kg_types::{ConfigNode, IntoKgError, KgResult};

use crate::estimator::EstimatorKind;
use crate::keywords::CallSignature;

/// Keyword arguments forwarded to `fit`/`predict`.
pub type Keywords = IndexMap<String, ConfigNode>;

/// Everything a backend needs to build and compile one model.
#[derive(Debug, Clone, Serialize)]
pub struct ModelSpec<'a> {
    pub kind: EstimatorKind,
    pub model_type: LayerLayout,
    pub config: &'a ConfigNode,
    pub optimizer: &'a ConfigNode,
    pub loss: &'a str,
    pub metrics: &'a [String],
}

/// Factory for compiled models. Shared between estimator clones.
pub trait ModelBackend: Send + Sync {
    fn build(&self, spec: &ModelSpec<'_>) -> KgResult<Box<dyn CompiledModel>>;

    fn fit_signature(&self) -> CallSignature {
        CallSignature::keras_fit()
    }

    fn predict_signature(&self) -> CallSignature {
        CallSignature::keras_predict()
    }
}

/// A built, compiled model owned by one estimator.
pub trait CompiledModel: Send + Sync {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64], keywords: &Keywords) -> KgResult<()>;

    /// One output row per sample.
    fn predict(&self, x: &[Vec<f64>], keywords: &Keywords) -> KgResult<Vec<Vec<f64>>>;
}

/// Backend for parameter-only use; building a model always fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedBackend;

impl ModelBackend for DetachedBackend {
    fn build(&self, spec: &ModelSpec<'_>) -> KgResult<Box<dyn CompiledModel>> {
        Err(format!("no training backend attached; cannot build {} model", spec.model_type.as_str())
            .into_kg_error())
    }
}
