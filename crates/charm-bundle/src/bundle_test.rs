// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

use rstest::rstest;

use super::*;

#[rstest]
fn test_parse_full_application() {
    let bundle = BundleData::from_yaml(
        r#"
series: jammy
applications:
  wordpress:
    charm: ch:wordpress
    channel: stable
    revision: 12
    num_units: 2
    to: ["lxd:0", "new"]
    expose: true
    options:
      blog-title: My blog
      port: 8080
    annotations:
      gui-x: 100
    constraints: mem=4G
    storage:
      data: ebs,10G
    bindings:
      "": alpha
      db: beta
    trust: true
    resources:
      theme: 3
machines:
  0:
    constraints: cores=2
tags: [cms]
description: Blog
"#,
    )
    .unwrap();

    assert_eq!(bundle.series, "jammy");
    let wp = &bundle.applications["wordpress"];
    assert_eq!(wp.charm, "ch:wordpress");
    assert_eq!(wp.revision, Some(12));
    assert_eq!(wp.num_units, 2);
    assert_eq!(wp.to, vec!["lxd:0", "new"]);
    assert!(wp.expose);
    assert_eq!(wp.options["port"], Value::from(8080));
    assert_eq!(wp.annotations["gui-x"], "100");
    assert_eq!(wp.endpoint_bindings["db"], "beta");
    assert!(wp.requires_trust);
    assert_eq!(wp.resources["theme"], Value::from(3));
    assert_eq!(bundle.machines["0"].constraints, "cores=2");
    assert_eq!(bundle.tags, vec!["cms"]);
}

#[rstest]
fn test_legacy_keys() {
    let bundle = BundleData::from_yaml(
        "bundle: kubernetes\nservices:\n  gitlab:\n    charm: gitlab\n    scale: 3\n",
    )
    .unwrap();
    assert!(bundle.is_kubernetes());
    assert_eq!(bundle.applications["gitlab"].num_units, 3);
}

#[rstest]
fn test_null_entries_are_defaults() {
    let bundle = BundleData::from_yaml("machines:\n  \"0\":\n  \"1\": null\n").unwrap();
    assert_eq!(bundle.machines.len(), 2);
    assert_eq!(bundle.machines["1"], MachineSpec::default());
}

#[rstest]
fn test_integer_placements() {
    let bundle =
        BundleData::from_yaml("applications:\n  a:\n    charm: a\n    num_units: 2\n    to: [0, 1]\n")
            .unwrap();
    assert_eq!(bundle.applications["a"].to, vec!["0", "1"]);
}

#[rstest]
fn test_relations_must_be_lists() {
    let err = BundleData::from_yaml("relations:\n  - wordpress:db\n").unwrap_err();
    assert!(err.to_string().contains("expected a list"), "got {err}");
}

#[rstest]
fn test_to_yaml_round_trip() {
    let bundle = BundleData::from_yaml(
        "applications:\n  a:\n    charm: a\n    num_units: 1\n    offers:\n      o:\n        endpoints: [x]\nrelations:\n  - [a, b]\n",
    )
    .unwrap();
    let yaml = bundle.to_yaml().unwrap();
    assert!(!yaml.contains("expose"), "zero fields are omitted:\n{yaml}");
    assert_eq!(BundleData::from_yaml(yaml).unwrap(), bundle);
}

#[rstest]
fn test_required_charms() {
    let bundle = BundleData::from_yaml(
        "applications:\n  a:\n    charm: mysql\n  b:\n    charm: wordpress\n  c:\n    charm: mysql\n",
    )
    .unwrap();
    assert_eq!(bundle.required_charms(), vec!["mysql", "wordpress"]);
}
