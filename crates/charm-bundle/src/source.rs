// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Sources of bundle documents: files, bundle directories and streams.

use std::io::Read;
use std::path::{Path, PathBuf};

use crate::yaml::split_documents;
use crate::{BUNDLE_FILENAME, Error};

#[cfg(test)]
#[path = "./source_test.rs"]
mod source_test;

/// One YAML document of a bundle source, before parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleDataPart {
    /// Position of the document within its source.
    pub index: usize,
    /// Raw document text without the `---` marker.
    pub text: String,
}

/// Provider of bundle documents and of the files they include.
pub trait BundleDataSource {
    /// Documents in stream order. The first document of the first source is
    /// the base bundle, every other document is an overlay.
    fn parts(&self) -> &[BundleDataPart];

    /// Directory that relative include paths resolve against.
    fn base_path(&self) -> &Path;

    /// Read the content referenced by an `include-file://` or
    /// `include-base64://` directive found in one of this source's parts.
    fn resolve_include(&self, path: &str) -> crate::Result<Vec<u8>>;

    /// Description of the source used in log messages.
    fn describe(&self) -> String {
        self.base_path().display().to_string()
    }
}

/// Bundle source backed by a local file or an in-memory stream.
#[derive(Debug, Clone)]
pub struct BundleSource {
    base_path: PathBuf,
    origin: Option<PathBuf>,
    parts: Vec<BundleDataPart>,
}

impl BundleSource {
    /// Open a bundle file, or a bundle directory containing `bundle.yaml`.
    pub fn open<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound(path.to_path_buf()),
            _ => Error::ReadFailed {
                path: path.to_path_buf(),
                error: e,
            },
        })?;

        let file = if metadata.is_dir() {
            let file = path.join(BUNDLE_FILENAME);
            if !file.is_file() {
                return Err(Error::MissingBundleFile(path.to_path_buf()));
            }
            file
        } else {
            path.to_path_buf()
        };

        let yaml = std::fs::read_to_string(&file).map_err(|e| Error::ReadFailed {
            path: file.clone(),
            error: e,
        })?;

        let file = dunce::canonicalize(&file).unwrap_or(file);
        let base_path = file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        tracing::debug!(path = %file.display(), "loading bundle source");
        let mut source = Self::from_yaml(yaml, base_path)?;
        source.origin = Some(file);
        Ok(source)
    }

    /// Read a bundle stream, resolving relative includes against `base_path`.
    pub fn from_reader<R: Read, P: Into<PathBuf>>(mut reader: R, base_path: P) -> crate::Result<Self> {
        let mut yaml = String::new();
        reader.read_to_string(&mut yaml)?;
        Self::from_yaml(yaml, base_path)
    }

    /// Use in-memory YAML, resolving relative includes against `base_path`.
    pub fn from_yaml<S: AsRef<str>, P: Into<PathBuf>>(yaml: S, base_path: P) -> crate::Result<Self> {
        let parts: Vec<BundleDataPart> = split_documents(yaml.as_ref())?
            .into_iter()
            .enumerate()
            .map(|(index, text)| BundleDataPart { index, text })
            .collect();
        if parts.is_empty() {
            return Err(Error::EmptyBundle);
        }
        Ok(Self {
            base_path: base_path.into(),
            origin: None,
            parts,
        })
    }

    /// The bundle file this source was read from, if any.
    pub fn origin(&self) -> Option<&Path> {
        self.origin.as_deref()
    }
}

impl BundleDataSource for BundleSource {
    fn parts(&self) -> &[BundleDataPart] {
        &self.parts
    }

    fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn resolve_include(&self, path: &str) -> crate::Result<Vec<u8>> {
        let path = resolve_include_path(path, &self.base_path)?;
        let metadata = std::fs::metadata(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::IncludeNotFound(path.clone()),
            _ => Error::ReadFailed {
                path: path.clone(),
                error: e,
            },
        })?;
        if metadata.is_dir() {
            return Err(Error::IncludeIsFolder(path));
        }
        tracing::debug!(path = %path.display(), "reading include");
        std::fs::read(&path).map_err(|e| Error::ReadFailed { path, error: e })
    }

    fn describe(&self) -> String {
        match &self.origin {
            Some(origin) => origin.display().to_string(),
            None => format!("<stream in {}>", self.base_path.display()),
        }
    }
}

/// Resolve an include path: absolute paths are used as given, `~/` paths
/// are relative to the home directory, anything else is relative to
/// `base_dir`.
fn resolve_include_path(include: &str, base_dir: &Path) -> crate::Result<PathBuf> {
    if let Some(rel) = include.strip_prefix("~/") {
        let home = dirs::home_dir().ok_or_else(|| Error::IncludeNotFound(PathBuf::from(include)))?;
        return Ok(home.join(rel));
    }
    let path = Path::new(include);
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(base_dir.join(path))
}
