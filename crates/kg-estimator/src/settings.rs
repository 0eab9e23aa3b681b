//! Estimator settings loaded from JSON files.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use kg_params::{Edits, ParamEstimator};
use kg_types::{config_error, ConfigNode, KgResult};

use crate::backend::ModelBackend;
use crate::estimator::{EstimatorKind, GalaxyEstimator};

/// `{kind, hyperparameters, config, patch}` description of an estimator.
///
/// `hyperparameters` is a flat map applied through the hyperparameter schema
/// on top of the kind's defaults, so partial files are fine. `patch` holds
/// nested keys (`a__b = v`) deep-merged into `config` before the estimator is
/// built; unlike parameter edits they may add fields the tree lacks.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorSettings {
    pub kind: EstimatorKind,
    pub hyperparameters: Edits,
    pub config: ConfigNode,
    pub patch: Edits,
}

impl EstimatorSettings {
    pub fn new(kind: EstimatorKind, config: ConfigNode) -> Self {
        Self {
            kind,
            hyperparameters: Edits::new(),
            config,
            patch: Edits::new(),
        }
    }

    pub fn with_hyperparameter(mut self, name: &str, value: impl Into<ConfigNode>) -> Self {
        self.hyperparameters.insert(name.to_string(), value.into());
        self
    }

    pub fn with_patch(mut self, key: &str, value: impl Into<ConfigNode>) -> Self {
        self.patch.insert(key.to_string(), value.into());
        self
    }

    pub fn from_json(text: &str) -> KgResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> KgResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let settings = Self::from_json(&text)?;
        info!(path = %path.display(), kind = ?settings.kind, "loaded estimator settings");
        Ok(settings)
    }

    /// Builds the estimator. Only schema keys are allowed in `hyperparameters`.
    pub fn build(self, backend: Arc<dyn ModelBackend>) -> KgResult<GalaxyEstimator> {
        if self.config.as_mapping().is_none() {
            return Err(config_error!("config must be a mapping, found {}", self.config.kind()));
        }
        if let Some(key) = self
            .hyperparameters
            .keys()
            .find(|key| crate::hyperparams::field(key).is_none())
        {
            return Err(config_error!("unknown hyperparameter {key:?}"));
        }

        let mut config = self.config;
        for (key, value) in self.patch {
            config.merge(kg_params::nest(&key, value)?);
        }

        let mut estimator = GalaxyEstimator::new(self.kind, config, backend);
        estimator.set_params(self.hyperparameters)?;
        Ok(estimator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DetachedBackend;
    use kg_params::LayerLayout;
    use kg_types::KgError;
    use std::io::Write;

    const SETTINGS: &str = r#"{
        "kind": "regressor",
        "hyperparameters": {"optimizer": "adam", "lr": 0.001, "epochs": 5, "model_type": "functional"},
        "config": {"name": "tiny", "layers": [{"class_name": "Dense", "config": {"units": 1}}]}
    }"#;

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SETTINGS.as_bytes()).unwrap();

        let settings = EstimatorSettings::from_path(file.path()).unwrap();
        assert_eq!(settings.kind, EstimatorKind::Regressor);
        assert_eq!(settings.hyperparameters.len(), 4);

        let est = settings.build(Arc::new(DetachedBackend)).unwrap();
        let hp = est.hyperparameters();
        assert_eq!(hp.lr, 0.001);
        assert_eq!(hp.epochs, 5);
        assert_eq!(hp.loss, "mean_squared_error");
        assert_eq!(est.layers().layout(), LayerLayout::Functional);
        assert_eq!(est.layers().len(), 1);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = EstimatorSettings::from_path(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, KgError::Io(_)));
    }

    #[test]
    fn rejects_tree_keys_and_non_mapping_config() {
        let settings = EstimatorSettings::new(EstimatorKind::Classifier, ConfigNode::mapping().with("name", "m"))
            .with_hyperparameter("layers_0_Dense__config__units", 3);
        assert!(matches!(settings.build(Arc::new(DetachedBackend)), Err(KgError::Config(_))));

        let settings = EstimatorSettings::new(EstimatorKind::Classifier, "m".into());
        assert!(matches!(settings.build(Arc::new(DetachedBackend)), Err(KgError::Config(_))));
    }

    #[test]
    fn patch_merges_nested_fields_into_config() {
        let settings = EstimatorSettings::from_json(SETTINGS)
            .unwrap()
            .with_patch("trainable", false)
            .with_patch("meta__source", "grid")
            .with_patch("meta__round", 2);
        let est = settings.build(Arc::new(DetachedBackend)).unwrap();

        assert_eq!(
            est.to_json().unwrap(),
            r#"{"name":"tiny","layers":[{"class_name":"Dense","config":{"units":1}}],"trainable":false,"meta":{"source":"grid","round":2}}"#
        );
        let params = est.get_params().unwrap();
        assert_eq!(params["meta__round"].as_i64(), Some(2));
    }

    #[test]
    fn patch_keys_are_validated() {
        let settings = EstimatorSettings::from_json(SETTINGS).unwrap().with_patch("meta____x", 1);
        assert!(matches!(settings.build(Arc::new(DetachedBackend)), Err(KgError::Param(_))));
    }

    #[test]
    fn bad_hyperparameter_value_is_param_error() {
        let settings = EstimatorSettings::new(EstimatorKind::Classifier, ConfigNode::mapping())
            .with_hyperparameter("epochs", "many");
        assert!(matches!(settings.build(Arc::new(DetachedBackend)), Err(KgError::Param(_))));
    }
}
