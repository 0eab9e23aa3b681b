use anyhow::{bail, Context};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use kg_estimator::{ConfigNode, DetachedBackend, Edits, EstimatorSettings, ParamEstimator};

fn parse_edit(arg: &str) -> anyhow::Result<(String, ConfigNode)> {
    let Some((key, raw)) = arg.split_once('=') else {
        bail!("expected key=value, got {arg:?}");
    };
    let value = ConfigNode::from_json(raw).unwrap_or_else(|_| ConfigNode::from(raw));
    Ok((key.to_string(), value))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        bail!("usage: kg-inspect <settings.json> [key=value | +nested__key=value ...]");
    };
    let mut settings =
        EstimatorSettings::from_path(&path).with_context(|| format!("failed to load settings from {path}"))?;

    // `+` entries add fields to the config before the estimator is built.
    let mut edits = Edits::new();
    for arg in args {
        match arg.strip_prefix('+') {
            Some(patch) => {
                let (key, value) = parse_edit(patch)?;
                settings.patch.insert(key, value);
            }
            None => {
                let (key, value) = parse_edit(&arg)?;
                edits.insert(key, value);
            }
        }
    }

    let mut estimator = settings.build(Arc::new(DetachedBackend))?;

    if !edits.is_empty() {
        estimator.set_params(edits).context("failed to apply edits")?;
    }

    let params = estimator.get_params()?;
    for (key, value) in params.iter().filter(|(_, v)| v.is_leaf()) {
        println!("{key} = {value}");
    }
    println!("# {} parameters, {} layers", params.len(), estimator.layers().len());
    println!("{}", estimator.to_json_pretty()?);
    Ok(())
}
