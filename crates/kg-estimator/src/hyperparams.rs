//! Training hyperparameters and the fixed schema that exposes them by name.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use kg_params::LayerLayout;
use kg_types::{ConfigNode, ParamError, ParamResult};

use crate::backend::Keywords;

/// Optimizers understood by the model factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Optimizer {
    #[default]
    Sgd,
    Rmsprop,
    Adagrad,
    Adadelta,
    Adam,
    Adamax,
    Nadam,
}

impl Optimizer {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sgd => "sgd",
            Self::Rmsprop => "rmsprop",
            Self::Adagrad => "adagrad",
            Self::Adadelta => "adadelta",
            Self::Adam => "adam",
            Self::Adamax => "adamax",
            Self::Nadam => "nadam",
        }
    }

    /// Class name the layer library registers the optimizer under.
    pub fn class_name(self) -> &'static str {
        match self {
            Self::Sgd => "SGD",
            Self::Rmsprop => "RMSprop",
            Self::Adagrad => "Adagrad",
            Self::Adadelta => "Adadelta",
            Self::Adam => "Adam",
            Self::Adamax => "Adamax",
            Self::Nadam => "Nadam",
        }
    }

    /// Hyperparameters this optimizer consumes, in constructor order.
    pub fn coefficients(self) -> &'static [&'static str] {
        match self {
            Self::Sgd => &["lr", "momentum", "decay", "nesterov"],
            Self::Rmsprop => &["lr", "rho", "epsilon", "decay"],
            Self::Adagrad => &["lr", "epsilon", "decay"],
            Self::Adadelta => &["lr", "rho", "epsilon", "decay"],
            Self::Adam => &["lr", "beta_1", "beta_2", "epsilon", "decay", "amsgrad"],
            Self::Adamax => &["lr", "beta_1", "beta_2", "epsilon", "decay"],
            Self::Nadam => &["lr", "beta_1", "beta_2", "epsilon", "schedule_decay"],
        }
    }
}

impl FromStr for Optimizer {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sgd" => Ok(Self::Sgd),
            "rmsprop" => Ok(Self::Rmsprop),
            "adagrad" => Ok(Self::Adagrad),
            "adadelta" => Ok(Self::Adadelta),
            "adam" => Ok(Self::Adam),
            "adamax" => Ok(Self::Adamax),
            "nadam" => Ok(Self::Nadam),
            other => Err(ParamError::InvalidValue {
                name: "optimizer".to_string(),
                expected: "one of sgd, rmsprop, adagrad, adadelta, adam, adamax, nadam".to_string(),
                found: format!("{other:?}"),
            }),
        }
    }
}

/// Scalar training settings that live next to the architecture tree.
///
/// `None` means "use the optimizer's own default".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hyperparameters {
    pub amsgrad: Option<bool>,
    pub batch_size: Option<usize>,
    pub beta_1: Option<f64>,
    pub beta_2: Option<f64>,
    pub decay: f64,
    pub epochs: usize,
    pub epsilon: Option<f64>,
    pub loss: String,
    pub lr: f64,
    pub metrics: Vec<String>,
    pub model_type: LayerLayout,
    pub momentum: f64,
    pub nesterov: bool,
    pub optimizer: Optimizer,
    pub rho: Option<f64>,
    pub schedule_decay: Option<f64>,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            amsgrad: None,
            batch_size: None,
            beta_1: None,
            beta_2: None,
            decay: 0.0,
            epochs: 1,
            epsilon: None,
            loss: "binary_crossentropy".to_string(),
            lr: 0.01,
            metrics: Vec::new(),
            model_type: LayerLayout::Sequential,
            momentum: 0.0,
            nesterov: false,
            optimizer: Optimizer::Sgd,
            rho: None,
            schedule_decay: None,
        }
    }
}

impl Hyperparameters {
    pub fn with_optimizer(mut self, optimizer: Optimizer) -> Self {
        self.optimizer = optimizer;
        self
    }

    pub fn with_lr(mut self, lr: f64) -> Self {
        self.lr = lr;
        self
    }

    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn with_loss(mut self, loss: &str) -> Self {
        self.loss = loss.to_string();
        self
    }

    pub fn with_metrics<I, S>(mut self, metrics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metrics = metrics.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_model_type(mut self, model_type: LayerLayout) -> Self {
        self.model_type = model_type;
        self
    }

    /// Value of the named hyperparameter.
    pub fn get(&self, name: &str) -> Option<ConfigNode> {
        field(name).map(|f| (f.get)(self))
    }

    /// Sets the named hyperparameter, checking the value's type.
    pub fn set(&mut self, name: &str, value: ConfigNode) -> ParamResult<()> {
        let field = field(name).ok_or_else(|| ParamError::UnknownParameter { key: name.to_string() })?;
        (field.set)(self, value)
    }

    /// All hyperparameters in declared order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, ConfigNode)> + '_ {
        HYPERPARAMETERS.iter().map(move |f| (f.name, (f.get)(self)))
    }

    /// `{class_name, config}` description of the configured optimizer. Unset
    /// coefficients are left out so the optimizer applies its own defaults.
    pub fn optimizer_config(&self) -> ConfigNode {
        let config = self
            .optimizer
            .coefficients()
            .iter()
            .filter_map(|name| self.get(name).filter(|v| !v.is_null()).map(|v| (*name, v)))
            .fold(ConfigNode::mapping(), |acc, (name, value)| acc.with(name, value));
        ConfigNode::mapping()
            .with("class_name", self.optimizer.class_name())
            .with("config", config)
    }

    /// Keywords every training call receives.
    pub fn fit_keywords(&self) -> Keywords {
        let mut keywords = Keywords::new();
        keywords.insert("epochs".to_string(), self.epochs.into());
        if let Some(batch_size) = self.batch_size {
            keywords.insert("batch_size".to_string(), batch_size.into());
        }
        keywords
    }
}

/// One named entry of the hyperparameter schema.
pub struct HyperparameterField {
    pub name: &'static str,
    pub get: fn(&Hyperparameters) -> ConfigNode,
    pub set: fn(&mut Hyperparameters, ConfigNode) -> ParamResult<()>,
}

impl std::fmt::Debug for HyperparameterField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperparameterField").field("name", &self.name).finish()
    }
}

/// Looks up a schema entry by name.
pub fn field(name: &str) -> Option<&'static HyperparameterField> {
    HYPERPARAMETERS.iter().find(|f| f.name == name)
}

macro_rules! field {
    ($name:ident, $convert:ident) => {
        field!($name, $convert, |h| ConfigNode::from(h.$name.clone()))
    };
    ($name:ident, $convert:ident, $get:expr) => {
        HyperparameterField {
            name: stringify!($name),
            get: $get,
            set: |h, value| {
                h.$name = $convert(stringify!($name), &value)?;
                Ok(())
            },
        }
    };
}

/// The hyperparameter schema, in the order `get_params` reports it.
pub static HYPERPARAMETERS: [HyperparameterField; 16] = [
    field!(amsgrad, opt_bool),
    field!(batch_size, opt_count),
    field!(beta_1, opt_float),
    field!(beta_2, opt_float),
    field!(decay, float),
    field!(epochs, count),
    field!(epsilon, opt_float),
    field!(loss, string),
    field!(lr, float),
    field!(metrics, strings, |h| {
        ConfigNode::Sequence(h.metrics.iter().map(|m| ConfigNode::from(m.as_str())).collect())
    }),
    field!(model_type, parsed, |h| ConfigNode::from(h.model_type.as_str())),
    field!(momentum, float),
    field!(nesterov, boolean),
    field!(optimizer, parsed, |h| ConfigNode::from(h.optimizer.as_str())),
    field!(rho, opt_float),
    field!(schedule_decay, opt_float),
];

fn mismatch(name: &str, expected: &str, found: &ConfigNode) -> ParamError {
    ParamError::InvalidValue {
        name: name.to_string(),
        expected: expected.to_string(),
        found: format!("{} {}", found.kind(), found),
    }
}

fn float(name: &str, value: &ConfigNode) -> ParamResult<f64> {
    value.as_f64().ok_or_else(|| mismatch(name, "number", value))
}

fn opt_float(name: &str, value: &ConfigNode) -> ParamResult<Option<f64>> {
    if value.is_null() {
        return Ok(None);
    }
    float(name, value).map(Some)
}

fn count(name: &str, value: &ConfigNode) -> ParamResult<usize> {
    value
        .as_i64()
        .and_then(|v| usize::try_from(v).ok())
        .ok_or_else(|| mismatch(name, "non-negative integer", value))
}

fn opt_count(name: &str, value: &ConfigNode) -> ParamResult<Option<usize>> {
    if value.is_null() {
        return Ok(None);
    }
    count(name, value).map(Some)
}

fn boolean(name: &str, value: &ConfigNode) -> ParamResult<bool> {
    value.as_bool().ok_or_else(|| mismatch(name, "bool", value))
}

fn opt_bool(name: &str, value: &ConfigNode) -> ParamResult<Option<bool>> {
    if value.is_null() {
        return Ok(None);
    }
    boolean(name, value).map(Some)
}

fn string(name: &str, value: &ConfigNode) -> ParamResult<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| mismatch(name, "string", value))
}

fn strings(name: &str, value: &ConfigNode) -> ParamResult<Vec<String>> {
    value
        .as_sequence()
        .and_then(|items| items.iter().map(|m| m.as_str().map(str::to_string)).collect())
        .ok_or_else(|| mismatch(name, "list of strings", value))
}

fn parsed<T: FromStr<Err = ParamError>>(name: &str, value: &ConfigNode) -> ParamResult<T> {
    value.as_str().ok_or_else(|| mismatch(name, "string", value))?.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_in_declared_order() {
        let hp = Hyperparameters::default();
        let got: Vec<(&str, String)> = hp.iter().map(|(k, v)| (k, v.to_string())).collect();
        let expect = [
            ("amsgrad", "null"),
            ("batch_size", "null"),
            ("beta_1", "null"),
            ("beta_2", "null"),
            ("decay", "0.0"),
            ("epochs", "1"),
            ("epsilon", "null"),
            ("loss", "\"binary_crossentropy\""),
            ("lr", "0.01"),
            ("metrics", "[]"),
            ("model_type", "\"sequential\""),
            ("momentum", "0.0"),
            ("nesterov", "false"),
            ("optimizer", "\"sgd\""),
            ("rho", "null"),
            ("schedule_decay", "null"),
        ];
        let expect: Vec<(&str, String)> = expect.iter().map(|(k, v)| (*k, v.to_string())).collect();
        assert_eq!(got, expect);
    }

    #[test]
    fn setters_convert_and_check_types() {
        let mut hp = Hyperparameters::default();
        hp.set("lr", 0.05.into()).unwrap();
        hp.set("decay", 1.into()).unwrap();
        hp.set("batch_size", 20.into()).unwrap();
        hp.set("metrics", ConfigNode::Sequence(vec!["accuracy".into()])).unwrap();
        hp.set("optimizer", "Adam".into()).unwrap();
        hp.set("model_type", "functional".into()).unwrap();
        hp.set("beta_1", ConfigNode::null()).unwrap();

        assert_eq!(hp.lr, 0.05);
        assert_eq!(hp.decay, 1.0);
        assert_eq!(hp.batch_size, Some(20));
        assert_eq!(hp.metrics, ["accuracy"]);
        assert_eq!(hp.optimizer, Optimizer::Adam);
        assert_eq!(hp.model_type, LayerLayout::Functional);
        assert_eq!(hp.beta_1, None);
    }

    #[test]
    fn setters_reject_bad_values() {
        let mut hp = Hyperparameters::default();
        for (name, value) in [
            ("epochs", ConfigNode::from(-1)),
            ("epochs", ConfigNode::from(2.5)),
            ("lr", ConfigNode::from("fast")),
            ("nesterov", ConfigNode::null()),
            ("metrics", ConfigNode::from("accuracy")),
            ("optimizer", ConfigNode::from("lbfgs")),
        ] {
            let err = hp.set(name, value).unwrap_err();
            assert!(matches!(err, ParamError::InvalidValue { .. }), "{name}: {err}");
        }
        assert_eq!(hp, Hyperparameters::default());
        assert!(matches!(
            hp.set("learning_rate", 0.1.into()),
            Err(ParamError::UnknownParameter { .. })
        ));
    }

    #[test]
    fn optimizer_config_skips_unset_coefficients() {
        let hp = Hyperparameters::default()
            .with_optimizer(Optimizer::Adam)
            .with_lr(0.001);
        let mut hp = hp;
        hp.beta_1 = Some(0.9);
        assert_eq!(
            hp.optimizer_config().to_string(),
            r#"{"class_name":"Adam","config":{"lr":0.001,"beta_1":0.9,"decay":0.0}}"#
        );

        let sgd = Hyperparameters::default().optimizer_config();
        assert_eq!(
            sgd.to_string(),
            r#"{"class_name":"SGD","config":{"lr":0.01,"momentum":0.0,"decay":0.0,"nesterov":false}}"#
        );
    }

    #[test]
    fn fit_keywords_follow_settings() {
        let hp = Hyperparameters::default().with_epochs(60);
        assert_eq!(hp.fit_keywords().len(), 1);
        let hp = hp.with_batch_size(20);
        let keywords = hp.fit_keywords();
        assert_eq!(keywords["epochs"], ConfigNode::from(60));
        assert_eq!(keywords["batch_size"], ConfigNode::from(20));
    }

    #[test]
    fn deserializes_partial_settings() {
        let hp: Hyperparameters =
            serde_json::from_str(r#"{"optimizer": "adam", "lr": 0.03, "model_type": "functional"}"#).unwrap();
        assert_eq!(hp.optimizer, Optimizer::Adam);
        assert_eq!(hp.lr, 0.03);
        assert_eq!(hp.model_type, LayerLayout::Functional);
        assert_eq!(hp.epochs, 1);
    }
}
