//! Keyword gating for training and inference calls.

use serde::{Deserialize, Serialize};

use kg_types::{ParamError, ParamResult};

/// Name and accepted keywords of a callable the estimator forwards to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSignature {
    pub name: String,
    pub keywords: Vec<String>,
}

impl CallSignature {
    pub fn new<I, S>(name: &str, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.to_string(),
            keywords: keywords.into_iter().map(Into::into).collect(),
        }
    }

    /// Keywords of a Sequential model's `fit`.
    pub fn keras_fit() -> Self {
        Self::new(
            "fit",
            [
                "x",
                "y",
                "batch_size",
                "epochs",
                "verbose",
                "callbacks",
                "validation_split",
                "validation_data",
                "shuffle",
                "class_weight",
                "sample_weight",
                "initial_epoch",
                "steps_per_epoch",
                "validation_steps",
            ],
        )
    }

    /// Keywords of a Sequential model's `predict`.
    pub fn keras_predict() -> Self {
        Self::new("predict", ["x", "batch_size", "verbose", "steps"])
    }

    pub fn accepts(&self, keyword: &str) -> bool {
        self.keywords.iter().any(|k| k == keyword)
    }
}

/// Checks that every supplied keyword is accepted by at least one callable.
///
/// The first offending keyword is reported together with the callable names
/// and the union of what they accept.
pub fn validate_call_keywords<'k, I>(accepted: &[&CallSignature], supplied: I) -> ParamResult<()>
where
    I: IntoIterator<Item = &'k str>,
{
    for keyword in supplied {
        if accepted.iter().any(|sig| sig.accepts(keyword)) {
            continue;
        }
        let callables = accepted.iter().map(|sig| sig.name.as_str()).collect::<Vec<_>>().join(", ");
        let mut union: Vec<String> = Vec::new();
        for k in accepted.iter().flat_map(|sig| sig.keywords.iter()) {
            if !union.contains(k) {
                union.push(k.clone());
            }
        }
        return Err(ParamError::UnsupportedKeyword {
            keyword: keyword.to_string(),
            callables,
            accepted: union,
        });
    }
    Ok(())
}
