//! Search-harness compatible estimator over a layer stack.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use kg_params::{Edits, LayerStack, ParamEstimator, Params};
use kg_types::{validation_error, ConfigNode, IntoKgError, KgError, KgResult, ParamError, ParamResult};

use crate::backend::{CompiledModel, Keywords, ModelBackend, ModelSpec};
use crate::hyperparams::{self, Hyperparameters, HYPERPARAMETERS};
use crate::keywords::validate_call_keywords;

/// Key under which the whole architecture tree is exposed.
pub const CONFIG_KEY: &str = "config";

/// What the estimator predicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EstimatorKind {
    #[default]
    Classifier,
    Regressor,
}

impl EstimatorKind {
    pub fn default_loss(self) -> &'static str {
        match self {
            Self::Classifier => "binary_crossentropy",
            Self::Regressor => "mean_squared_error",
        }
    }
}

/// Estimator whose hyperparameters and every architecture field are tunable
/// through flat string keys.
pub struct GalaxyEstimator {
    kind: EstimatorKind,
    hyperparameters: Hyperparameters,
    layers: LayerStack,
    backend: Arc<dyn ModelBackend>,
    model: Option<Box<dyn CompiledModel>>,
}

impl GalaxyEstimator {
    pub fn new(kind: EstimatorKind, config: ConfigNode, backend: Arc<dyn ModelBackend>) -> Self {
        let hyperparameters = Hyperparameters::default().with_loss(kind.default_loss());
        let layers = LayerStack::new(config, hyperparameters.model_type);
        info!(kind = ?kind, layers = layers.len(), "created estimator");
        Self {
            kind,
            hyperparameters,
            layers,
            backend,
            model: None,
        }
    }

    pub fn classifier(config: ConfigNode, backend: Arc<dyn ModelBackend>) -> Self {
        Self::new(EstimatorKind::Classifier, config, backend)
    }

    pub fn regressor(config: ConfigNode, backend: Arc<dyn ModelBackend>) -> Self {
        Self::new(EstimatorKind::Regressor, config, backend)
    }

    pub fn with_hyperparameters(mut self, hyperparameters: Hyperparameters) -> Self {
        self.layers.set_layout(hyperparameters.model_type);
        self.hyperparameters = hyperparameters;
        self
    }

    pub fn kind(&self) -> EstimatorKind {
        self.kind
    }

    pub fn hyperparameters(&self) -> &Hyperparameters {
        &self.hyperparameters
    }

    pub fn layers(&self) -> &LayerStack {
        &self.layers
    }

    pub fn config(&self) -> &ConfigNode {
        self.layers.tree()
    }

    pub fn is_fitted(&self) -> bool {
        self.model.is_some()
    }

    /// Canonical compact JSON of the architecture tree.
    pub fn to_json(&self) -> KgResult<String> {
        Ok(self.layers.tree().to_json()?)
    }

    pub fn to_json_pretty(&self) -> KgResult<String> {
        Ok(self.layers.tree().to_json_pretty()?)
    }

    /// Builds a fresh model from the current parameters and trains it.
    ///
    /// User keywords are checked against the backend's fit signature before
    /// anything is built; `epochs` and `batch_size` come from the
    /// hyperparameters unless overridden.
    pub fn fit(&mut self, x: &[Vec<f64>], y: &[f64], keywords: &Keywords) -> KgResult<&mut Self> {
        let signature = self.backend.fit_signature();
        validate_call_keywords(&[&signature], keywords.keys().map(String::as_str))?;
        if x.len() != y.len() {
            return Err(validation_error!("x has {} samples but y has {}", x.len(), y.len()));
        }

        let optimizer = self.hyperparameters.optimizer_config();
        let spec = ModelSpec {
            kind: self.kind,
            model_type: self.hyperparameters.model_type,
            config: self.layers.tree(),
            optimizer: &optimizer,
            loss: &self.hyperparameters.loss,
            metrics: &self.hyperparameters.metrics,
        };
        info!(
            optimizer = self.hyperparameters.optimizer.as_str(),
            loss = %self.hyperparameters.loss,
            samples = x.len(),
            "fitting model"
        );
        let mut model = self.backend.build(&spec)?;

        let mut fit_keywords = self.hyperparameters.fit_keywords();
        fit_keywords.extend(keywords.iter().map(|(k, v)| (k.clone(), v.clone())));
        model.fit(x, y, &fit_keywords)?;
        self.model = Some(model);
        Ok(self)
    }

    fn raw_predict(&self, x: &[Vec<f64>], keywords: &Keywords, operation: &str) -> KgResult<Vec<Vec<f64>>> {
        let signature = self.backend.predict_signature();
        validate_call_keywords(&[&signature], keywords.keys().map(String::as_str))?;
        let model = self.model.as_ref().ok_or_else(|| KgError::NotFitted {
            operation: operation.to_string(),
        })?;
        let outputs = model.predict(x, keywords)?;
        if outputs.len() != x.len() || outputs.iter().any(Vec::is_empty) {
            return Err(format!("model returned {} output rows for {} samples", outputs.len(), x.len())
                .into_kg_error());
        }
        Ok(outputs)
    }

    /// Class labels for a classifier, values for a regressor.
    pub fn predict(&self, x: &[Vec<f64>], keywords: &Keywords) -> KgResult<Vec<f64>> {
        let outputs = self.raw_predict(x, keywords, "predict")?;
        Ok(match self.kind {
            EstimatorKind::Classifier => outputs.iter().map(|row| class_of(row)).collect(),
            EstimatorKind::Regressor => outputs.iter().map(|row| row[0]).collect(),
        })
    }

    /// Per-class probabilities. A single sigmoid column expands to two.
    pub fn predict_proba(&self, x: &[Vec<f64>], keywords: &Keywords) -> KgResult<Vec<Vec<f64>>> {
        if self.kind != EstimatorKind::Classifier {
            return Err(validation_error!("predict_proba is only available for classifiers"));
        }
        let outputs = self.raw_predict(x, keywords, "predict_proba")?;
        Ok(outputs
            .into_iter()
            .map(|row| if row.len() == 1 { vec![1.0 - row[0], row[0]] } else { row })
            .collect())
    }

    /// Accuracy for a classifier, coefficient of determination for a regressor.
    pub fn score(&self, x: &[Vec<f64>], y: &[f64]) -> KgResult<f64> {
        if x.len() != y.len() {
            return Err(validation_error!("x has {} samples but y has {}", x.len(), y.len()));
        }
        if y.is_empty() {
            return Err(validation_error!("cannot score an empty sample"));
        }
        let predicted = self.predict(x, &Keywords::new())?;
        let n = y.len() as f64;
        Ok(match self.kind {
            EstimatorKind::Classifier => {
                predicted.iter().zip(y).filter(|(p, t)| p == t).count() as f64 / n
            }
            EstimatorKind::Regressor => {
                let mean = y.iter().sum::<f64>() / n;
                let ss_res: f64 = predicted.iter().zip(y).map(|(p, t)| (t - p).powi(2)).sum();
                let ss_tot: f64 = y.iter().map(|t| (t - mean).powi(2)).sum();
                if ss_tot == 0.0 {
                    if ss_res == 0.0 {
                        1.0
                    } else {
                        0.0
                    }
                } else {
                    1.0 - ss_res / ss_tot
                }
            }
        })
    }

    /// Checks keywords against the backend's fit and predict signatures.
    pub fn validate_call_keywords<'k, I>(&self, supplied: I) -> ParamResult<()>
    where
        I: IntoIterator<Item = &'k str>,
    {
        let fit = self.backend.fit_signature();
        let predict = self.backend.predict_signature();
        validate_call_keywords(&[&fit, &predict], supplied)
    }
}

fn class_of(row: &[f64]) -> f64 {
    match row {
        [p] => {
            if *p > 0.5 {
                1.0
            } else {
                0.0
            }
        }
        _ => row
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
            .0 as f64,
    }
}

impl Clone for GalaxyEstimator {
    /// Same parameters and a deep copy of the tree; the backend is shared and
    /// the clone starts unfitted.
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            hyperparameters: self.hyperparameters.clone(),
            layers: self.layers.clone(),
            backend: Arc::clone(&self.backend),
            model: None,
        }
    }
}

impl fmt::Debug for GalaxyEstimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GalaxyEstimator")
            .field("kind", &self.kind)
            .field("hyperparameters", &self.hyperparameters)
            .field("layers", &self.layers)
            .field("fitted", &self.is_fitted())
            .finish()
    }
}

impl ParamEstimator for GalaxyEstimator {
    fn get_params(&self) -> ParamResult<Params<'_>> {
        let mut params: Params<'_> = HYPERPARAMETERS
            .iter()
            .map(|field| (field.name.to_string(), Cow::Owned((field.get)(&self.hyperparameters))))
            .collect();
        params.insert(CONFIG_KEY.to_string(), Cow::Borrowed(self.layers.tree()));

        for (key, node) in self.layers.registry()? {
            if params.contains_key(&key) {
                return Err(ParamError::DuplicateKey { key });
            }
            params.insert(key, Cow::Borrowed(node));
        }
        Ok(params)
    }

    fn set_params(&mut self, edits: Edits) -> ParamResult<&mut Self> {
        let mut tree_edits = Edits::new();
        for (key, value) in edits {
            if key == CONFIG_KEY {
                self.layers.replace_tree(value);
            } else if let Some(field) = hyperparams::field(&key) {
                (field.set)(&mut self.hyperparameters, value)?;
                if key == "model_type" {
                    self.layers.set_layout(self.hyperparameters.model_type);
                }
            } else {
                tree_edits.insert(key, value);
            }
        }

        if !tree_edits.is_empty() {
            debug!(edits = tree_edits.len(), "forwarding edits to layer stack");
            self.layers.apply(tree_edits)?;
        }
        Ok(self)
    }
}

impl From<LayerStack> for GalaxyEstimator {
    /// Classifier over an existing stack with no backend attached.
    fn from(layers: LayerStack) -> Self {
        let hyperparameters = Hyperparameters::default().with_model_type(layers.layout());
        Self {
            kind: EstimatorKind::Classifier,
            hyperparameters,
            layers,
            backend: Arc::new(crate::backend::DetachedBackend),
            model: None,
        }
    }
}
