// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Error types for bundle loading, merging and verification.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[cfg(test)]
#[path = "./error_test.rs"]
mod error_test;

/// Convenience Result type with the bundle Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort loading or merging a bundle.
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Bundle path does not exist
    #[error("bundle path {0:?} not found")]
    #[diagnostic(code(charm_bundle::not_found))]
    NotFound(PathBuf),

    /// Directory does not contain a bundle.yaml
    #[error("directory {0:?} does not contain a bundle.yaml file")]
    #[diagnostic(
        code(charm_bundle::missing_bundle_file),
        help("Point at the bundle file itself or at a directory holding bundle.yaml")
    )]
    MissingBundleFile(PathBuf),

    /// Failed to read file
    #[error("failed to read {path:?}")]
    #[diagnostic(code(charm_bundle::read_failed))]
    ReadFailed {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// The stream contains no YAML documents
    #[error("malformed bundle: bundle is empty")]
    #[diagnostic(code(charm_bundle::empty_bundle))]
    EmptyBundle,

    /// Document boundaries in a multi-document stream are invalid
    #[error("malformed bundle stream: {0}")]
    #[diagnostic(
        code(charm_bundle::malformed_stream),
        help("Directives may only appear before a '---' document marker")
    )]
    MalformedStream(String),

    /// Invalid YAML in one of the bundle parts
    #[error("cannot parse bundle part {part}{}: {error}", line_suffix(.line))]
    #[diagnostic(
        code(charm_bundle::invalid_yaml),
        help("Check the YAML syntax and that every alias refers to an anchor defined earlier")
    )]
    InvalidYaml {
        part: usize,
        line: Option<usize>,
        #[source]
        error: serde_yaml::Error,
    },

    /// A bundle part is not a YAML mapping
    #[error("bundle part {part} must be a mapping, found {found}")]
    #[diagnostic(code(charm_bundle::not_a_mapping))]
    NotAMapping { part: usize, found: &'static str },

    /// Both a current key and its legacy name were used
    #[error("{location} cannot specify both {current} and {legacy}")]
    #[diagnostic(
        code(charm_bundle::conflicting_keys),
        help("'{legacy}' is the legacy name for '{current}', keep only one")
    )]
    ConflictingKeys {
        location: String,
        current: &'static str,
        legacy: &'static str,
    },

    /// Merged document does not fit the bundle model
    #[error("cannot decode bundle: {0}")]
    #[diagnostic(code(charm_bundle::decode_failed))]
    Decode(#[source] serde_yaml::Error),

    /// Bundle could not be rendered as YAML
    #[error("cannot encode bundle: {0}")]
    #[diagnostic(code(charm_bundle::encode_failed))]
    Encode(#[source] serde_yaml::Error),

    /// Include target is missing
    #[error("include file {0:?} not found")]
    #[diagnostic(
        code(charm_bundle::include_not_found),
        help("Relative include paths resolve against the directory of the document using them")
    )]
    IncludeNotFound(PathBuf),

    /// Include target is a directory
    #[error("include path {0:?} resolves to a folder")]
    #[diagnostic(code(charm_bundle::include_is_folder))]
    IncludeIsFolder(PathBuf),

    /// Include resolution failed while processing a specific value
    #[error("processing {context}")]
    #[diagnostic(code(charm_bundle::include_failed))]
    Include {
        context: String,
        #[source]
        error: Box<Error>,
    },

    /// Charm metadata could not be loaded
    #[error("invalid charm metadata in {path:?}: {error}")]
    #[diagnostic(code(charm_bundle::invalid_charm))]
    InvalidCharm {
        path: PathBuf,
        #[source]
        error: serde_yaml::Error,
    },

    /// Verification found one or more problems
    #[error(transparent)]
    #[diagnostic(transparent)]
    Verification(#[from] VerificationError),

    /// IO error passthrough
    #[error(transparent)]
    #[diagnostic(code(charm_bundle::io_error))]
    Io(#[from] std::io::Error),
}

fn line_suffix(line: &Option<usize>) -> String {
    match line {
        Some(line) => format!(" (line {line})"),
        None => String::new(),
    }
}

/// A single problem reported by verification.
#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
#[diagnostic(code(charm_bundle::verification))]
pub struct Problem(pub String);

/// Every problem found during one verification pass, in discovery order.
///
/// Verification never stops at the first problem. The display form is the
/// first problem plus a count. The full list is available through
/// [`VerificationError::errors`] and is rendered as related diagnostics.
#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
#[error("{}", summary(.errors))]
#[diagnostic(code(charm_bundle::verification_failed))]
pub struct VerificationError {
    #[related]
    errors: Vec<Problem>,
}

impl VerificationError {
    pub fn new(errors: Vec<Problem>) -> Self {
        Self { errors }
    }

    /// All problems in the order they were found.
    pub fn errors(&self) -> &[Problem] {
        &self.errors
    }

    /// Problem messages in the order they were found.
    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.errors.iter().map(|p| p.0.as_str())
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Ok when nothing was collected, the aggregate otherwise.
    pub fn into_result(errors: Vec<Problem>) -> std::result::Result<(), Self> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Self::new(errors))
        }
    }
}

fn summary(errors: &[Problem]) -> String {
    match errors {
        [] => "no verification errors!".to_string(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{first} (and {} more errors)", rest.len()),
    }
}
