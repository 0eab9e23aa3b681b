//! # kg-estimator
//!
//! Estimators whose training hyperparameters and every field of a Keras-style
//! architecture tree can be read and tuned through flat string keys, so a
//! hyperparameter search can drive them with the usual get/set/clone cycle.

pub mod backend;
pub mod estimator;
pub mod hyperparams;
pub mod keywords;
pub mod settings;

pub use backend::{CompiledModel, DetachedBackend, Keywords, ModelBackend, ModelSpec};
pub use estimator::{EstimatorKind, GalaxyEstimator, CONFIG_KEY};
pub use hyperparams::{HyperparameterField, Hyperparameters, Optimizer, HYPERPARAMETERS};
pub use keywords::{validate_call_keywords, CallSignature};
pub use settings::EstimatorSettings;

pub use kg_params::{edits, Edits, LayerLayout, LayerStack, ParamEstimator, Params};
pub use kg_types::{ConfigNode, KgError, KgResult, ParamError, ParamResult, ABSENT};
