// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

use charm_bundle::Charm;
use rstest::rstest;
use tempfile::TempDir;

use super::*;

#[rstest]
#[case("wordpress=./charms/wordpress", "wordpress", "./charms/wordpress")]
#[case("db=/srv/mysql", "db", "/srv/mysql")]
fn test_parse_charm_arg(#[case] arg: &str, #[case] application: &str, #[case] dir: &str) {
    let (app, path) = parse_charm_arg(arg).unwrap();
    assert_eq!(app, application);
    assert_eq!(path, PathBuf::from(dir));
}

#[rstest]
#[case("wordpress")]
#[case("=./dir")]
#[case("wordpress=")]
fn test_parse_invalid_charm_arg(#[case] arg: &str) {
    assert!(parse_charm_arg(arg).is_err());
}

#[rstest]
fn test_compose_with_overlay() {
    let tmp = TempDir::new().unwrap();
    let bundle = tmp.path().join("bundle.yaml");
    let overlay = tmp.path().join("overlay.yaml");
    std::fs::write(&bundle, "applications:\n  a:\n    charm: a\n    num_units: 1\n").unwrap();
    std::fs::write(&overlay, "applications:\n  a:\n    num_units: 3\n").unwrap();

    let flags = BundleFlags {
        bundle,
        overlays: vec![overlay],
    };
    let composed = flags.compose().unwrap();
    assert_eq!(composed.part_count, 2);
    assert_eq!(composed.bundle.applications["a"].num_units, 3);
}

#[rstest]
fn test_load_charms_by_application() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("metadata.yaml"), "name: wordpress\n").unwrap();
    let bundle =
        BundleData::from_yaml("applications:\n  blog:\n    charm: cs:wordpress-3\n").unwrap();

    let flags = CharmFlags {
        charms: vec![("blog".to_string(), tmp.path().to_path_buf())],
    };
    let charms = flags.load(&bundle).unwrap();
    assert_eq!(charms["cs:wordpress-3"].meta().name, "wordpress");

    let flags = CharmFlags {
        charms: vec![("missing".to_string(), tmp.path().to_path_buf())],
    };
    assert!(flags.load(&bundle).is_err());
}
