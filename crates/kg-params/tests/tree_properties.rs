//! Flatten/update properties over fixed and randomly generated trees.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;

use kg_params::{edits, flatten, lookup, resolve, FlattenOptions, TreeUpdater};
use kg_types::{ConfigNode, Mapping, ParamError, Scalar, ABSENT};

const FIELDS: &[&str] = &["alpha", "beta", "units", "rate", "config", "kernel_initializer"];
const TAGS: &[&str] = &["Dense", "Conv2D", "Dropout", "BatchNormalization"];

fn random_leaf(rng: &mut StdRng) -> ConfigNode {
    match rng.random_range(0..6) {
        0 => ConfigNode::null(),
        1 => rng.random_bool(0.5).into(),
        2 => rng.random_range(-100i64..100).into(),
        3 => (f64::from(rng.random_range(0u32..1000)) / 8.0).into(),
        4 => format!("s{}", rng.random_range(0..50)).into(),
        _ => ConfigNode::tuple([rng.random_range(1i64..5), rng.random_range(1i64..5)]),
    }
}

fn random_tree(rng: &mut StdRng, depth: usize) -> ConfigNode {
    if depth == 0 {
        return random_leaf(rng);
    }
    match rng.random_range(0..4) {
        0 => random_leaf(rng),
        1 => {
            let len = rng.random_range(0..4);
            let items = (0..len)
                .map(|_| {
                    if rng.random_bool(0.7) {
                        let tag = TAGS[rng.random_range(0..TAGS.len())];
                        random_mapping(rng, depth - 1).with("class_name", tag)
                    } else {
                        random_tree(rng, depth - 1)
                    }
                })
                .collect::<Vec<_>>();
            ConfigNode::Sequence(items)
        }
        _ => random_mapping(rng, depth - 1),
    }
}

fn random_mapping(rng: &mut StdRng, depth: usize) -> ConfigNode {
    let mut map = Mapping::new();
    for _ in 0..rng.random_range(0..4) {
        let field = FIELDS[rng.random_range(0..FIELDS.len())];
        map.insert(field.to_string(), random_tree(rng, depth));
    }
    ConfigNode::Mapping(map)
}

fn random_trees(count: usize) -> Vec<ConfigNode> {
    let mut rng = StdRng::seed_from_u64(0x6b67);
    (0..count)
        .map(|_| {
            let mut map = Mapping::new();
            map.insert("name".into(), "model".into());
            map.insert("layers".into(), random_tree(&mut rng, 4));
            map.insert("config".into(), random_mapping(&mut rng, 3));
            ConfigNode::Mapping(map)
        })
        .collect()
}

#[test]
fn flattening_is_deterministic() {
    for tree in random_trees(64) {
        let first: Vec<String> = flatten(&tree, "").unwrap().into_keys().collect();
        let second: Vec<String> = flatten(&tree.clone(), "").unwrap().into_keys().collect();
        assert_eq!(first, second);
    }
}

#[test]
fn every_key_resolves_to_its_value() {
    let options = FlattenOptions::default();
    for tree in random_trees(64) {
        for prefix in ["", "root"] {
            for (key, node) in flatten(&tree, prefix).unwrap() {
                let found = lookup(&tree, prefix, &key, &options).unwrap();
                assert!(std::ptr::eq(found, node), "{key} resolved to another node");
            }
        }
    }
}

#[test]
fn leaf_edit_touches_only_its_ancestors() {
    let options = FlattenOptions::default();
    let mut rng = StdRng::seed_from_u64(17);

    for tree in random_trees(48) {
        let before = flatten(&tree, "").unwrap();
        // Editing a discriminator renames the element's keys; covered separately.
        let leaves: Vec<&String> = before
            .iter()
            .filter(|(k, n)| n.is_leaf() && !k.ends_with(&format!("__{}", options.discriminator)))
            .map(|(k, _)| k)
            .collect();
        let target = leaves[rng.random_range(0..leaves.len())].clone();
        let target_path = resolve(&tree, "", &target, &options).unwrap();

        let mut edited = tree.clone();
        TreeUpdater::new(&options)
            .apply(&mut edited, [(target.as_str(), ConfigNode::from("edited"))])
            .unwrap();
        let after = flatten(&edited, "").unwrap();

        assert_eq!(after[target.as_str()].as_str(), Some("edited"));
        for (key, old) in &before {
            let path = resolve(&tree, "", key, &options).unwrap();
            if target_path.starts_with(&path) {
                continue;
            }
            assert_eq!(after.get(key.as_str()).copied(), Some(*old), "{key} changed");
        }
    }
}

#[test]
fn discriminator_edit_renames_element_block() {
    let options = FlattenOptions::default();
    let mut tree = ConfigNode::from(json!({
        "name": "model",
        "layers": [
            {"class_name": "Dense", "config": {"units": 8}},
            {"class_name": "Dropout", "config": {"rate": 0.5}}
        ]
    }));
    TreeUpdater::new(&options)
        .apply(&mut tree, [("layers_1_Dropout__class_name", ConfigNode::from("SpatialDropout1D"))])
        .unwrap();

    let after = flatten(&tree, "").unwrap();
    assert!(after.keys().all(|k| !k.starts_with("layers_1_Dropout")));
    assert_eq!(after["layers_1_SpatialDropout1D__config__rate"].as_f64(), Some(0.5));
    assert_eq!(after["layers_0_Dense__config__units"].as_i64(), Some(8));
    assert!(matches!(
        lookup(&tree, "", "layers_1_Dropout__config__rate", &options),
        Err(ParamError::UnknownParameter { .. })
    ));
}

#[test]
fn removing_a_last_element_drops_its_keys() {
    let options = FlattenOptions::default();
    for tree in random_trees(48) {
        let registry = flatten(&tree, "").unwrap();
        let last_elements: Vec<String> = registry
            .iter()
            .filter_map(|(key, node)| {
                let items = node.as_sequence()?;
                let last = items.len().checked_sub(1)?;
                let tag = options.tag_of(&items[last]);
                kg_params::element_key(key, last, tag).ok()
            })
            .collect();
        let Some(target) = last_elements.first() else {
            continue;
        };

        let mut edited = tree.clone();
        let summary = TreeUpdater::new(&options)
            .apply(&mut edited, [(target.as_str(), ABSENT)])
            .unwrap();
        assert_eq!(summary.removed, 1);

        let after = flatten(&edited, "").unwrap();
        assert!(!after.contains_key(target.as_str()));
        assert!(after.keys().all(|k| !k.starts_with(&format!("{target}__"))));
    }
}

#[test]
fn unknown_keys_are_rejected() {
    let options = FlattenOptions::default();
    for mut tree in random_trees(16) {
        let before = tree.clone();
        let err = TreeUpdater::new(&options)
            .apply(&mut tree, [("does_not_exist", ConfigNode::from(1))])
            .unwrap_err();
        assert_eq!(err, ParamError::UnknownParameter { key: "does_not_exist".into() });
        assert_eq!(tree, before);
    }
}

#[test]
fn scenario_nested_scalar_edit_keeps_siblings() {
    let mut tree = ConfigNode::from(json!({
        "name": "sequential_1",
        "layers": [{
            "class_name": "Dense",
            "config": {
                "units": 64,
                "kernel_initializer": {
                    "class_name": "VarianceScaling",
                    "config": {"scale": 1.0, "mode": "fan_avg", "distribution": "uniform", "seed": null}
                }
            }
        }]
    }));
    let before: Vec<(String, String)> = flatten(&tree, "")
        .unwrap()
        .into_iter()
        .map(|(k, v)| (k, v.to_string()))
        .collect();

    let options = FlattenOptions::default();
    TreeUpdater::new(&options)
        .apply(
            &mut tree,
            edits([("layers_0_Dense__config__kernel_initializer__config__scale", 2.0)]),
        )
        .unwrap();

    let after = flatten(&tree, "").unwrap();
    assert_eq!(
        after["layers_0_Dense__config__kernel_initializer__config__scale"],
        &ConfigNode::Leaf(Scalar::Float(2.0))
    );
    for (key, text) in &before {
        if key.ends_with("__mode") || key.ends_with("__distribution") || key.ends_with("__seed") {
            assert_eq!(&after[key.as_str()].to_string(), text);
        }
    }
}

#[test]
fn round_trip_text_without_semantic_edits() {
    let text = r#"{"name":"sequential_1","layers":[{"class_name":"Dense","config":{"name":"dense_1","units":64,"use_bias":true,"kernel_initializer":{"class_name":"VarianceScaling","config":{"scale":1.0,"mode":"fan_avg","seed":null}},"bias_initializer":{"class_name":"Zeros","config":{}}}},{"class_name":"Activation","config":{"activation":"tanh"}}]}"#;
    let mut tree = ConfigNode::from_json(text).unwrap();
    let same: Vec<(String, ConfigNode)> = flatten(&tree, "")
        .unwrap()
        .into_iter()
        .filter(|(_, node)| node.is_leaf() && !node.is_null())
        .map(|(k, v)| (k, v.clone()))
        .collect();

    TreeUpdater::new(&FlattenOptions::default()).apply(&mut tree, same).unwrap();
    assert_eq!(tree.to_json().unwrap(), text);
}
