// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

use rstest::rstest;

use super::*;
use crate::bundle::{ApplicationSpec, BundleData};

#[rstest]
#[case(Node::Null, true)]
#[case(Node::Scalar(Value::Bool(false)), true)]
#[case(Node::Scalar(Value::Bool(true)), false)]
#[case(Node::Scalar(Value::from(0)), true)]
#[case(Node::Scalar(Value::from(-1)), false)]
#[case(Node::Scalar(Value::from(0.0)), true)]
#[case(Node::Scalar(Value::from(-0.0)), false)]
#[case(Node::Scalar(Value::from("")), true)]
#[case(Node::Scalar(Value::from("x")), false)]
#[case(Node::List(Vec::new()), true)]
#[case(Node::Map(IndexMap::new()), true)]
#[case(Node::Optional(Box::new(Node::Scalar(Value::from(0)))), false)]
fn test_is_zero(#[case] node: Node, #[case] expected: bool) {
    assert_eq!(node.is_zero(), expected);
}

#[rstest]
fn test_record_is_zero_when_all_fields_are() {
    assert!(ApplicationSpec::default().to_node().is_zero());
    let app = ApplicationSpec {
        num_units: 1,
        ..Default::default()
    };
    assert!(!app.to_node().is_zero());
}

#[rstest]
fn test_to_value_omits_zero_fields_but_keeps_entries() {
    let mut bundle = BundleData::default();
    bundle
        .applications
        .insert("empty".to_string(), ApplicationSpec::default());
    bundle.applications.insert(
        "app".to_string(),
        ApplicationSpec {
            charm: "app".to_string(),
            revision: Some(0),
            ..Default::default()
        },
    );

    let value = bundle.to_node().to_value();
    let expected: Value = serde_yaml::from_str(
        "applications:\n  empty: {}\n  app:\n    charm: app\n    revision: 0\n",
    )
    .unwrap();
    assert_eq!(value, expected);
}

#[rstest]
fn test_decode_round_trip() {
    let bundle = BundleData::from_yaml(
        "series: jammy\napplications:\n  a:\n    charm: a\n    num_units: 2\n    to: [\"0\", \"1\"]\n",
    )
    .unwrap();
    let decoded: BundleData = bundle.to_node().decode().unwrap();
    assert_eq!(decoded, bundle);
}

#[rstest]
fn test_clear() {
    let mut node = Node::Scalar(Value::from("x"));
    node.clear();
    assert_eq!(node, Node::Null);
}

#[rstest]
fn test_record_fields_carry_classification() {
    let Node::Record(fields) = ApplicationSpec::default().to_node() else {
        panic!("applications are records");
    };
    let offers = fields.iter().find(|f| f.def.name == "offers").unwrap();
    assert!(offers.def.is_overlay_only());
    let charm = fields.iter().find(|f| f.def.name == "charm").unwrap();
    assert!(!charm.def.is_overlay_only());
}
