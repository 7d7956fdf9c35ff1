// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Raw YAML handling: splitting streams into documents, resolving anchors
//! across documents, and recording which keys each document sets.

use indexmap::IndexMap;
use serde_yaml::{Mapping, Value};

use crate::tree::key_string;
use crate::Error;

#[cfg(test)]
#[path = "./yaml_test.rs"]
mod yaml_test;

const DOCUMENT_START: &str = "---";
const DOCUMENT_END: &str = "...";

/// Split a YAML stream into the text of its documents.
///
/// Directives before a `---` marker are dropped, `...` ends the current
/// document, and content following `---` on the same line starts the new
/// document. Blank or comment-only streams yield no documents.
pub fn split_documents(stream: &str) -> crate::Result<Vec<String>> {
    let mut documents = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    // Set once the current document has content or was explicitly started.
    let mut started = false;
    // Set after `...` until the next `---`; only directives may follow.
    let mut ended = false;

    for (number, line) in stream.lines().enumerate() {
        if let Some(rest) = document_start(line) {
            if started {
                documents.push(current.join("\n"));
            }
            current.clear();
            started = true;
            ended = false;
            let rest = rest.trim_start();
            if !rest.is_empty() {
                current.push(rest);
            }
            continue;
        }
        if line.trim_end() == DOCUMENT_END {
            if started {
                documents.push(current.join("\n"));
            }
            current.clear();
            started = false;
            ended = true;
            continue;
        }
        if line.starts_with('%') {
            if started && has_content(&current) {
                return Err(Error::MalformedStream(format!(
                    "directive on line {} appears inside a document",
                    number + 1
                )));
            }
            // Directives only configure the document that follows.
            continue;
        }
        if ended && !is_blank(line) {
            return Err(Error::MalformedStream(format!(
                "content on line {} follows a document end marker without a '---' marker",
                number + 1
            )));
        }
        if !started && is_blank(line) {
            continue;
        }
        started = true;
        current.push(line);
    }
    if started {
        documents.push(current.join("\n"));
    }

    documents.retain(|doc| !doc.lines().all(is_blank));
    Ok(documents)
}

/// The remainder of a `---` marker line, if `line` is one.
fn document_start(line: &str) -> Option<&str> {
    let rest = line.strip_prefix(DOCUMENT_START)?;
    if rest.is_empty() || rest.starts_with([' ', '\t']) {
        Some(rest)
    } else {
        None
    }
}

fn is_blank(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with('#')
}

fn has_content(lines: &[&str]) -> bool {
    lines.iter().any(|line| !is_blank(line))
}

/// Parse documents in a single YAML pass so that an anchor defined in one
/// document can be used by any document after it.
///
/// Every document becomes one item of a synthetic block sequence, which puts
/// all of them in the same anchor scope. `<<` merge keys are applied and all
/// mapping keys are normalised to strings.
pub fn parse_documents<S: AsRef<str>>(documents: &[S]) -> crate::Result<Vec<Value>> {
    let mut combined = String::new();
    // First line of every document inside `combined`, 1-based.
    let mut starts = Vec::with_capacity(documents.len());
    let mut line = 1;
    for doc in documents {
        combined.push_str("-\n");
        line += 1;
        starts.push(line);
        for text in doc.as_ref().lines() {
            if !text.trim().is_empty() {
                combined.push_str("  ");
                combined.push_str(text);
            }
            combined.push('\n');
            line += 1;
        }
    }

    let parsed: Value = serde_yaml::from_str(&combined).map_err(|error| {
        let (part, line) = locate(&starts, error.location().map(|l| l.line()));
        Error::InvalidYaml { part, line, error }
    })?;

    let mut values = match parsed {
        Value::Sequence(items) => items,
        Value::Null => Vec::new(),
        other => {
            return Err(Error::MalformedStream(format!(
                "expected a sequence of documents, found {}",
                kind_name(&other)
            )));
        }
    };
    for (part, value) in values.iter_mut().enumerate() {
        value
            .apply_merge()
            .map_err(|error| Error::InvalidYaml { part, line: None, error })?;
        normalise_keys(value);
    }
    Ok(values)
}

/// Map a line of the combined stream back to a document index and a line
/// within that document.
fn locate(starts: &[usize], line: Option<usize>) -> (usize, Option<usize>) {
    let Some(line) = line else {
        return (0, None);
    };
    match starts.iter().rposition(|start| *start <= line) {
        Some(part) => (part, Some(line - starts[part] + 1)),
        None => (0, None),
    }
}

/// Replace non-string mapping keys (machine ids written as integers, for
/// example) with their string form, recursively.
fn normalise_keys(value: &mut Value) {
    match value {
        Value::Mapping(map) => {
            let entries = std::mem::take(map);
            for (key, mut child) in entries {
                normalise_keys(&mut child);
                let key = match key {
                    Value::String(_) => key,
                    other => Value::String(key_string(&other)),
                };
                map.insert(key, child);
            }
        }
        Value::Sequence(items) => items.iter_mut().for_each(normalise_keys),
        Value::Tagged(tagged) => normalise_keys(&mut tagged.value),
        _ => {}
    }
}

/// Human readable name of a value's kind.
pub(crate) fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

/// Marker for a key that was present in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presence {
    /// Present with a non-mapping value, including an explicit null.
    Set,
    /// Present with a mapping value whose own keys are recorded.
    Nested(PresenceMap),
}

/// Which keys a parsed document actually set, as opposed to left out.
///
/// This is what lets the merge engine tell "field omitted" (keep the base
/// value) apart from "field set to null" (remove the base value).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresenceMap(IndexMap<String, Presence>);

impl PresenceMap {
    /// Record the keys of `value`. Non-mapping values produce an empty map.
    pub fn from_value(value: &Value) -> Self {
        let mut fields = IndexMap::new();
        if let Value::Mapping(map) = value {
            for (key, child) in map {
                let presence = match child {
                    Value::Mapping(_) => Presence::Nested(Self::from_value(child)),
                    _ => Presence::Set,
                };
                fields.insert(key_string(key), presence);
            }
        }
        Self(fields)
    }

    pub fn is_present(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Presence map of a nested mapping field. Empty when the field is
    /// absent or not a mapping.
    pub fn for_field(&self, field: &str) -> PresenceMap {
        match self.0.get(field) {
            Some(Presence::Nested(nested)) => nested.clone(),
            _ => PresenceMap::default(),
        }
    }

    /// Present keys in document order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Take a document as a top-level mapping; an empty document is an empty
/// mapping.
pub(crate) fn into_mapping(part: usize, value: Value) -> crate::Result<Mapping> {
    match value {
        Value::Mapping(map) => Ok(map),
        Value::Null => Ok(Mapping::new()),
        other => Err(Error::NotAMapping {
            part,
            found: kind_name(&other),
        }),
    }
}
