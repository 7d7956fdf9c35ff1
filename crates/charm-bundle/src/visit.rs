// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Field visitor over the document tree, and the overlay policies built on it.
//!
//! A bundle document may mix fields that belong in the base document with
//! fields that only make sense in an overlay (see [`crate::schema`]). The
//! policies here split such a document in two and check that a base
//! document contains no overlay-only data.

use crate::bundle::BundleData;
use crate::error::{Problem, VerificationError};
use crate::schema::FieldDef;
use crate::tree::{Node, ToNode};

#[cfg(test)]
#[path = "./visit_test.rs"]
mod visit_test;

/// What to do after entering a record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Walk the field's value, then call [`FieldVisitor::exit_field`].
    Descend,
    /// Leave the value alone. The flag reports whether it was retained.
    Skip { retained: bool },
}

/// Position of a collection element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Index<'a> {
    Key(&'a str),
    Position(usize),
}

impl std::fmt::Display for Index<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Index::Key(key) => f.write_str(key),
            Index::Position(pos) => write!(f, "{pos}"),
        }
    }
}

/// Callbacks invoked by [`walk`].
///
/// Retention flows upwards: a field or element is retained when the visitor
/// says so, and every ancestor of a retained value learns about it through
/// the `retained` argument of [`FieldVisitor::exit_field`].
pub trait FieldVisitor {
    /// Called once per record field before its value is walked.
    fn enter_field(&mut self, field: &FieldDef, value: &mut Node) -> Step;

    /// Called after a descended field's value was walked. Returns whether
    /// the field is retained.
    fn exit_field(&mut self, field: &FieldDef, value: &mut Node, retained: bool) -> bool {
        let _ = (field, value);
        retained
    }

    /// Called before walking a map entry or list item.
    fn enter_index(&mut self, _index: Index<'_>) {}

    /// Called after walking a map entry or list item.
    fn leave_index(&mut self, _index: Index<'_>) {}

    /// Whether a walked map entry stays in its map.
    fn keep_entry(&mut self, _retained: bool) -> bool {
        true
    }
}

/// Walk `node` depth first, returning whether anything below it was retained.
///
/// Optional values are transparent, records hand each field to the visitor,
/// maps and lists recurse element-wise between the index hooks, scalars end
/// the traversal.
pub fn walk<V: FieldVisitor + ?Sized>(node: &mut Node, visitor: &mut V) -> bool {
    match node {
        Node::Null | Node::Scalar(_) => false,
        Node::Optional(inner) => walk(inner, visitor),
        Node::Record(fields) => {
            let mut retained = false;
            for field in fields.iter_mut() {
                let kept = match visitor.enter_field(&field.def, &mut field.value) {
                    Step::Skip { retained } => retained,
                    Step::Descend => {
                        let below = walk(&mut field.value, visitor);
                        visitor.exit_field(&field.def, &mut field.value, below)
                    }
                };
                retained |= kept;
            }
            retained
        }
        Node::Map(entries) => {
            let mut retained = false;
            let mut dropped = Vec::new();
            for (key, value) in entries.iter_mut() {
                visitor.enter_index(Index::Key(key));
                let below = walk(value, visitor);
                visitor.leave_index(Index::Key(key));
                if !visitor.keep_entry(below) {
                    dropped.push(key.clone());
                }
                retained |= below;
            }
            entries.retain(|key, _| !dropped.contains(key));
            retained
        }
        Node::List(items) => {
            let mut retained = false;
            for (pos, item) in items.iter_mut().enumerate() {
                visitor.enter_index(Index::Position(pos));
                retained |= walk(item, visitor);
                visitor.leave_index(Index::Position(pos));
            }
            retained
        }
    }
}

/// Clears overlay-only fields, keeping everything else.
#[derive(Debug, Default)]
pub struct ExtractBase;

impl FieldVisitor for ExtractBase {
    fn enter_field(&mut self, field: &FieldDef, value: &mut Node) -> Step {
        if field.is_overlay_only() && !value.is_zero() {
            value.clear();
            return Step::Skip { retained: false };
        }
        Step::Descend
    }

    fn exit_field(&mut self, _field: &FieldDef, value: &mut Node, _retained: bool) -> bool {
        !value.is_zero()
    }
}

/// Keeps overlay-only fields and the path leading to them, clearing
/// everything else.
#[derive(Debug, Default)]
pub struct ExtractOverlay;

impl FieldVisitor for ExtractOverlay {
    fn enter_field(&mut self, field: &FieldDef, value: &mut Node) -> Step {
        if field.is_overlay_only() {
            return Step::Skip {
                retained: !value.is_zero(),
            };
        }
        Step::Descend
    }

    fn exit_field(&mut self, _field: &FieldDef, value: &mut Node, retained: bool) -> bool {
        if !retained {
            value.clear();
        }
        retained
    }

    fn keep_entry(&mut self, retained: bool) -> bool {
        retained
    }
}

/// Records every non-zero overlay-only field as a problem, naming it by its
/// dotted path from the document root.
#[derive(Debug, Default)]
pub struct RejectOverlayFields {
    path: Vec<String>,
    problems: Vec<Problem>,
}

impl RejectOverlayFields {
    pub fn into_problems(self) -> Vec<Problem> {
        self.problems
    }
}

impl FieldVisitor for RejectOverlayFields {
    fn enter_field(&mut self, field: &FieldDef, value: &mut Node) -> Step {
        if field.is_overlay_only() {
            if !value.is_zero() {
                let mut path = self.path.clone();
                path.push(field.name.to_string());
                self.problems.push(Problem(format!(
                    "{} can only appear in an overlay section",
                    path.join(".")
                )));
            }
            return Step::Skip { retained: false };
        }
        self.path.push(field.name.to_string());
        Step::Descend
    }

    fn exit_field(&mut self, _field: &FieldDef, _value: &mut Node, retained: bool) -> bool {
        self.path.pop();
        retained
    }

    fn enter_index(&mut self, index: Index<'_>) {
        self.path.push(index.to_string());
    }

    fn leave_index(&mut self, _index: Index<'_>) {
        self.path.pop();
    }
}

/// Split a bundle into its base part (overlay-only fields removed) and its
/// overlay part (only overlay-only fields and the applications holding them).
///
/// Merging the overlay part onto the base part reproduces the original.
pub fn extract_base_and_overlay_parts(bundle: &BundleData) -> crate::Result<(BundleData, BundleData)> {
    let mut base = bundle.to_node();
    walk(&mut base, &mut ExtractBase);

    let mut overlay = bundle.to_node();
    walk(&mut overlay, &mut ExtractOverlay);

    Ok((base.decode()?, overlay.decode()?))
}

/// Check that a base bundle contains no overlay-only fields.
pub fn verify_no_overlay_fields_present(bundle: &BundleData) -> Result<(), VerificationError> {
    let mut node = bundle.to_node();
    let mut visitor = RejectOverlayFields::default();
    walk(&mut node, &mut visitor);
    VerificationError::into_result(visitor.into_problems())
}
