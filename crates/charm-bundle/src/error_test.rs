// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

use rstest::rstest;

use super::*;

fn problems(messages: &[&str]) -> Vec<Problem> {
    messages.iter().map(|m| Problem(m.to_string())).collect()
}

#[rstest]
#[case(&[], "no verification errors!")]
#[case(&["first"], "first")]
#[case(&["first", "second"], "first (and 1 more errors)")]
#[case(&["first", "second", "third"], "first (and 2 more errors)")]
fn test_verification_error_summary(#[case] messages: &[&str], #[case] expected: &str) {
    let err = VerificationError::new(problems(messages));
    assert_eq!(err.to_string(), expected);
}

#[rstest]
fn test_verification_error_keeps_every_problem() {
    let err = VerificationError::new(problems(&["a", "b", "c"]));
    assert_eq!(err.len(), 3);
    assert_eq!(err.messages().collect::<Vec<_>>(), vec!["a", "b", "c"]);
}

#[rstest]
fn test_into_result() {
    assert!(VerificationError::into_result(Vec::new()).is_ok());
    let err = VerificationError::into_result(problems(&["boom"])).unwrap_err();
    assert_eq!(err.errors(), &[Problem("boom".to_string())]);
}

#[rstest]
fn test_invalid_yaml_mentions_line() {
    let yaml_err = serde_yaml::from_str::<serde_yaml::Value>("a: [").unwrap_err();
    let err = Error::InvalidYaml {
        part: 2,
        line: Some(7),
        error: yaml_err,
    };
    assert!(err.to_string().starts_with("cannot parse bundle part 2 (line 7): "));
}

#[rstest]
fn test_include_errors() {
    let err = Error::IncludeIsFolder(PathBuf::from("/tmp/dir"));
    assert_eq!(err.to_string(), r#"include path "/tmp/dir" resolves to a folder"#);

    let err = Error::IncludeNotFound(PathBuf::from("missing.txt"));
    assert_eq!(err.to_string(), r#"include file "missing.txt" not found"#);
}
