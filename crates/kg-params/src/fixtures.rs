//! Keras-shaped architecture trees used across the test suites.

use kg_types::{ConfigNode, Scalar};
use serde_json::json;

fn variance_scaling() -> ConfigNode {
    ConfigNode::from(json!({
        "class_name": "VarianceScaling",
        "config": {"scale": 1.0, "mode": "fan_avg", "distribution": "uniform", "seed": null}
    }))
}

fn zeros() -> ConfigNode {
    ConfigNode::from(json!({"class_name": "Zeros", "config": {}}))
}

fn with_regularizers(config: ConfigNode) -> ConfigNode {
    [
        "kernel_regularizer",
        "bias_regularizer",
        "activity_regularizer",
        "kernel_constraint",
        "bias_constraint",
    ]
    .into_iter()
    .fold(config, |config, field| config.with(field, ConfigNode::null()))
}

/// Config of a `Dense` layer as a Keras model reports it.
pub fn dense_config(name: &str, units: i64, activation: &str) -> ConfigNode {
    let config = ConfigNode::mapping()
        .with("name", name)
        .with("trainable", true)
        .with("units", units)
        .with("activation", activation)
        .with("use_bias", true)
        .with("kernel_initializer", variance_scaling())
        .with("bias_initializer", zeros());
    with_regularizers(config)
}

fn activation_config(name: &str, activation: &str) -> ConfigNode {
    ConfigNode::mapping()
        .with("name", name)
        .with("trainable", true)
        .with("activation", activation)
}

fn sequential_layer(class_name: &str, config: ConfigNode) -> ConfigNode {
    ConfigNode::mapping().with("class_name", class_name).with("config", config)
}

/// `Dense(64) → Activation(tanh) → Activation(tanh) → Dense(32)`.
pub fn sequential_model() -> ConfigNode {
    ConfigNode::mapping().with("name", "sequential_1").with(
        "layers",
        vec![
            sequential_layer("Dense", dense_config("dense_1", 64, "linear")),
            sequential_layer("Activation", activation_config("activation_1", "tanh")),
            sequential_layer("Activation", activation_config("activation_2", "tanh")),
            sequential_layer("Dense", dense_config("dense_2", 32, "linear")),
        ],
    )
}

/// Two-layer binary classifier over eight inputs.
pub fn train_model() -> ConfigNode {
    let first = dense_config("dense_3", 12, "relu")
        .with("batch_input_shape", ConfigNode::tuple([Scalar::Null, Scalar::Int(8)]))
        .with("dtype", "float32");
    ConfigNode::mapping().with("name", "sequential_2").with(
        "layers",
        vec![
            sequential_layer("Dense", first),
            sequential_layer("Dense", dense_config("dense_4", 1, "sigmoid")),
        ],
    )
}

fn pair(v: i64) -> ConfigNode {
    ConfigNode::tuple([v, v])
}

/// Config of a `Conv2D` layer as a Keras model reports it.
pub fn conv2d_config(name: &str, filters: i64, padding: &str) -> ConfigNode {
    let config = ConfigNode::mapping()
        .with("name", name)
        .with("trainable", true)
        .with("filters", filters)
        .with("kernel_size", pair(3))
        .with("strides", pair(1))
        .with("padding", padding)
        .with("data_format", "channels_last")
        .with("dilation_rate", pair(1))
        .with("activation", "relu")
        .with("use_bias", true)
        .with("kernel_initializer", variance_scaling())
        .with("bias_initializer", zeros());
    with_regularizers(config)
}

fn inbound(sources: &[&str]) -> ConfigNode {
    let links = sources
        .iter()
        .map(|source| ConfigNode::from(json!([source, 0, 0, {}])))
        .collect::<Vec<_>>();
    ConfigNode::Sequence(vec![ConfigNode::Sequence(links)])
}

fn graph_layer(class_name: &str, config: ConfigNode, sources: &[&str]) -> ConfigNode {
    let name = config.get("name").cloned().unwrap_or_default();
    ConfigNode::mapping()
        .with("name", name)
        .with("class_name", class_name)
        .with("config", config)
        .with("inbound_nodes", inbound(sources))
}

/// A small residual network expressed as a functional (graph) model.
pub fn functional_model() -> ConfigNode {
    let input = ConfigNode::mapping()
        .with("batch_input_shape", ConfigNode::tuple([Scalar::Null, 32.into(), 32.into(), 3.into()]))
        .with("dtype", "float32")
        .with("sparse", false)
        .with("name", "img");
    let pool = ConfigNode::mapping()
        .with("name", "max_pooling2d_1")
        .with("trainable", true)
        .with("pool_size", pair(3))
        .with("padding", "valid")
        .with("strides", pair(3))
        .with("data_format", "channels_last");
    let add = ConfigNode::mapping().with("name", "add_1").with("trainable", true);
    let dropout = ConfigNode::mapping()
        .with("name", "dropout_1")
        .with("trainable", true)
        .with("rate", 0.5)
        .with("noise_shape", ConfigNode::null())
        .with("seed", ConfigNode::null());

    let layers = vec![
        graph_layer("InputLayer", input, &[]),
        graph_layer("Conv2D", conv2d_config("conv2d_1", 32, "valid"), &["img"]),
        graph_layer("Conv2D", conv2d_config("conv2d_2", 64, "valid"), &["conv2d_1"]),
        graph_layer("MaxPooling2D", pool, &["conv2d_2"]),
        graph_layer("Conv2D", conv2d_config("conv2d_3", 64, "same"), &["max_pooling2d_1"]),
        graph_layer("Add", add, &["conv2d_3", "max_pooling2d_1"]),
        graph_layer("Dense", dense_config("dense_5", 256, "relu"), &["add_1"]),
        graph_layer("Dropout", dropout, &["dense_5"]),
        graph_layer("Dense", dense_config("dense_6", 10, "softmax"), &["dropout_1"]),
    ];

    ConfigNode::mapping()
        .with("name", "toy_resnet")
        .with("layers", layers)
        .with("input_layers", ConfigNode::from(json!([["img", 0, 0]])))
        .with("output_layers", ConfigNode::from(json!([["dense_6", 0, 0]])))
}
