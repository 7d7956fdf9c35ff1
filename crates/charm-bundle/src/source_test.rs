// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

use rstest::rstest;
use tempfile::TempDir;

use super::*;

const BUNDLE: &str = "applications:\n  a:\n    charm: a\n---\napplications:\n  a:\n    num_units: 2\n";

#[rstest]
fn test_open_file() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("my-bundle.yaml");
    std::fs::write(&path, BUNDLE).unwrap();

    let source = BundleSource::open(&path).unwrap();
    assert_eq!(source.parts().len(), 2);
    assert_eq!(source.parts()[1].index, 1);
    assert_eq!(
        source.base_path(),
        dunce::canonicalize(tmp.path()).unwrap().as_path()
    );
    assert!(source.origin().is_some());
}

#[rstest]
fn test_open_directory() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join(BUNDLE_FILENAME), BUNDLE).unwrap();

    let source = BundleSource::open(tmp.path()).unwrap();
    assert_eq!(source.parts().len(), 2);
}

#[rstest]
fn test_open_directory_without_bundle() {
    let tmp = TempDir::new().unwrap();
    let err = BundleSource::open(tmp.path()).unwrap_err();
    assert!(matches!(err, Error::MissingBundleFile(_)), "got {err:?}");
}

#[rstest]
fn test_open_missing_path() {
    let tmp = TempDir::new().unwrap();
    let err = BundleSource::open(tmp.path().join("nope.yaml")).unwrap_err();
    assert!(matches!(err, Error::NotFound(_)), "got {err:?}");
}

#[rstest]
fn test_open_unreadable_path() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("bundle.yaml");
    std::fs::write(&file, "applications: {}\n").unwrap();
    // a path below a regular file fails with something other than not found
    let err = BundleSource::open(file.join("child.yaml")).unwrap_err();
    assert!(matches!(err, Error::ReadFailed { .. }), "got {err:?}");
}

#[rstest]
fn test_from_reader() {
    let source = BundleSource::from_reader(BUNDLE.as_bytes(), "/srv/bundles").unwrap();
    assert_eq!(source.parts().len(), 2);
    assert_eq!(source.base_path(), Path::new("/srv/bundles"));
    assert!(source.origin().is_none());
}

#[rstest]
fn test_empty_stream() {
    let err = BundleSource::from_yaml("# nothing here\n", "/").unwrap_err();
    assert_eq!(err.to_string(), "malformed bundle: bundle is empty");
}

#[rstest]
fn test_resolve_relative_include() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("foo"), "lorem ipsum").unwrap();
    let source = BundleSource::from_yaml(BUNDLE, tmp.path()).unwrap();

    assert_eq!(source.resolve_include("foo").unwrap(), b"lorem ipsum");
}

#[rstest]
fn test_resolve_absolute_include() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("abs.txt");
    std::fs::write(&file, "absolute").unwrap();
    let source = BundleSource::from_yaml(BUNDLE, "/somewhere/else").unwrap();

    let data = source.resolve_include(file.to_str().unwrap()).unwrap();
    assert_eq!(data, b"absolute");
}

#[rstest]
fn test_resolve_include_errors() {
    let tmp = TempDir::new().unwrap();
    std::fs::create_dir(tmp.path().join("folder")).unwrap();
    let source = BundleSource::from_yaml(BUNDLE, tmp.path()).unwrap();

    let err = source.resolve_include("folder").unwrap_err();
    assert!(matches!(err, Error::IncludeIsFolder(_)), "got {err:?}");
    assert!(err.to_string().ends_with("resolves to a folder"));

    let err = source.resolve_include("missing").unwrap_err();
    assert!(matches!(err, Error::IncludeNotFound(_)), "got {err:?}");
    assert!(err.to_string().ends_with("not found"));
}
