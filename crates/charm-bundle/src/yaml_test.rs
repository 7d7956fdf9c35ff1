// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

use rstest::rstest;

use super::*;

#[rstest]
fn test_split_single_document() {
    let docs = split_documents("applications:\n  a:\n    charm: a\n").unwrap();
    assert_eq!(docs, vec!["applications:\n  a:\n    charm: a"]);
}

#[rstest]
fn test_split_multiple_documents() {
    let stream = "\
series: jammy
---
applications:
  a: null
--- # trailing comment
description: third
";
    let docs = split_documents(stream).unwrap();
    assert_eq!(docs.len(), 3);
    assert_eq!(docs[0], "series: jammy");
    assert_eq!(docs[1], "applications:\n  a: null");
    assert_eq!(docs[2], "# trailing comment\ndescription: third");
}

#[rstest]
fn test_split_skips_directives_and_end_markers() {
    let stream = "\
%YAML 1.2
---
series: jammy
...
---
series: focal
...
";
    let docs = split_documents(stream).unwrap();
    assert_eq!(docs, vec!["series: jammy", "series: focal"]);
}

#[rstest]
fn test_split_ignores_dashes_inside_values() {
    let docs = split_documents("description: ---not-a-marker\n----: x\n").unwrap();
    assert_eq!(docs.len(), 1);
}

#[rstest]
#[case("")]
#[case("\n\n")]
#[case("# only a comment\n---\n# and another\n")]
fn test_split_empty_streams(#[case] stream: &str) {
    assert!(split_documents(stream).unwrap().is_empty());
}

#[rstest]
#[case("series: jammy\n%YAML 1.2\n")]
#[case("series: jammy\n...\nseries: focal\n")]
fn test_split_malformed_boundaries(#[case] stream: &str) {
    let err = split_documents(stream).unwrap_err();
    assert!(matches!(err, Error::MalformedStream(_)), "got {err:?}");
}

#[rstest]
fn test_parse_anchor_across_documents() {
    let docs = [
        "options: &opts\n  debug: true\n",
        "applications:\n  a:\n    options: *opts\n",
    ];
    let values = parse_documents(&docs).unwrap();
    assert_eq!(values.len(), 2);
    let debug = &values[1]["applications"]["a"]["options"]["debug"];
    assert_eq!(debug, &Value::Bool(true));
}

#[rstest]
fn test_parse_applies_merge_keys() {
    let docs = ["base: &base\n  a: 1\n  b: 2\nderived:\n  <<: *base\n  b: 3\n"];
    let values = parse_documents(&docs).unwrap();
    let derived = &values[0]["derived"];
    assert_eq!(derived["a"], Value::from(1));
    assert_eq!(derived["b"], Value::from(3));
}

#[rstest]
fn test_parse_normalises_keys() {
    let docs = ["machines:\n  0:\n    series: jammy\n  1: null\n"];
    let values = parse_documents(&docs).unwrap();
    let Value::Mapping(machines) = &values[0]["machines"] else {
        panic!("machines should be a mapping");
    };
    let keys: Vec<_> = machines.keys().cloned().collect();
    assert_eq!(keys, vec![Value::from("0"), Value::from("1")]);
}

#[rstest]
fn test_parse_reports_part_and_line() {
    let docs = ["series: jammy\n", "description: a: b\nseries: focal\n"];
    let err = parse_documents(&docs).unwrap_err();
    match err {
        Error::InvalidYaml { part, .. } => assert_eq!(part, 1),
        other => panic!("expected invalid yaml, got {other:?}"),
    }
}

#[rstest]
fn test_parse_unknown_alias_fails() {
    let docs = ["options: *missing\n"];
    assert!(matches!(parse_documents(&docs), Err(Error::InvalidYaml { .. })));
}

#[rstest]
fn test_presence_map_tracks_explicit_null() {
    let value: Value = serde_yaml::from_str(
        "applications:\n  wordpress: null\n  mysql:\n    num_units: 2\n",
    )
    .unwrap();
    let presence = PresenceMap::from_value(&value);
    assert!(presence.is_present("applications"));
    assert!(!presence.is_present("machines"));

    let apps = presence.for_field("applications");
    assert_eq!(apps.fields().collect::<Vec<_>>(), vec!["wordpress", "mysql"]);
    assert!(apps.for_field("wordpress").is_empty());
    assert!(apps.for_field("mysql").is_present("num_units"));
    assert!(!apps.for_field("mysql").is_present("charm"));
}

#[rstest]
fn test_into_mapping() {
    assert!(into_mapping(0, Value::Null).unwrap().is_empty());
    let err = into_mapping(3, Value::from("text")).unwrap_err();
    assert_eq!(err.to_string(), "bundle part 3 must be a mapping, found a string");
}
