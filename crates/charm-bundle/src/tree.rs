// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Generic tree view of the document model.
//!
//! The typed model converts into a [`Node`] tree in which every record field
//! carries its [`FieldDef`] classification. The field visitor walks this tree
//! and the result is turned back into YAML and decoded into the typed model,
//! so extraction never needs to know about individual bundle types.

use indexmap::IndexMap;
use serde_yaml::{Mapping, Value};

use crate::schema::{self, FieldDef};

#[cfg(test)]
#[path = "./tree_test.rs"]
mod tree_test;

/// One node of the document tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Absent value.
    Null,
    /// Boolean, number or string.
    Scalar(Value),
    /// A present optional value. Never zero, even when its content is.
    Optional(Box<Node>),
    List(Vec<Node>),
    Map(IndexMap<String, Node>),
    Record(Vec<Field>),
}

/// A classified record field.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub def: FieldDef,
    pub value: Node,
}

impl Node {
    /// Whether this node holds the zero value of its kind.
    ///
    /// This is the only zero test in the crate: extraction decides what to
    /// clear with it, validation decides what to report with it and
    /// [`Node::to_value`] decides which record fields to omit with it.
    pub fn is_zero(&self) -> bool {
        match self {
            Node::Null => true,
            Node::Scalar(value) => is_zero_scalar(value),
            Node::Optional(_) => false,
            Node::List(items) => items.is_empty(),
            Node::Map(entries) => entries.is_empty(),
            Node::Record(fields) => fields.iter().all(|f| f.value.is_zero()),
        }
    }

    /// Reset this node to the zero value.
    pub fn clear(&mut self) {
        *self = Node::Null;
    }

    /// Render the node as YAML. Zero record fields are omitted, map entries
    /// and list items are always kept.
    pub fn to_value(&self) -> Value {
        match self {
            Node::Null => Value::Null,
            Node::Scalar(value) => value.clone(),
            Node::Optional(inner) => inner.to_value(),
            Node::List(items) => Value::Sequence(items.iter().map(Node::to_value).collect()),
            Node::Map(entries) => Value::Mapping(
                entries
                    .iter()
                    .map(|(k, v)| (Value::String(k.clone()), v.to_value()))
                    .collect(),
            ),
            Node::Record(fields) => {
                let mut map = Mapping::new();
                for field in fields.iter().filter(|f| !f.value.is_zero()) {
                    map.insert(Value::String(field.def.name.to_string()), field.value.to_value());
                }
                Value::Mapping(map)
            }
        }
    }

    /// Decode the rendered node into a typed value.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> crate::Result<T> {
        serde_yaml::from_value(self.to_value()).map_err(crate::Error::Decode)
    }
}

fn is_zero_scalar(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i == 0
            } else if let Some(u) = n.as_u64() {
                u == 0
            } else {
                n.as_f64().is_some_and(|f| f.to_bits() == 0)
            }
        }
        Value::String(s) => s.is_empty(),
        Value::Sequence(items) => items.is_empty(),
        Value::Mapping(map) => map.is_empty(),
        Value::Tagged(tagged) => is_zero_scalar(&tagged.value),
    }
}

/// Conversion of a model value into the generic tree.
pub trait ToNode {
    fn to_node(&self) -> Node;
}

/// Builder for [`Node::Record`] values, classifying each field through the
/// record's field table.
pub struct Record {
    table: &'static [FieldDef],
    fields: Vec<Field>,
}

impl Record {
    pub fn new(table: &'static [FieldDef]) -> Self {
        Self {
            table,
            fields: Vec::with_capacity(table.len()),
        }
    }

    pub fn field<T: ToNode + ?Sized>(mut self, name: &'static str, value: &T) -> Self {
        let def = FieldDef {
            name,
            ..schema::lookup(self.table, name)
        };
        debug_assert!(
            self.table.iter().any(|f| f.name == name),
            "field {name} missing from its classification table"
        );
        self.fields.push(Field {
            def,
            value: value.to_node(),
        });
        self
    }

    pub fn build(self) -> Node {
        Node::Record(self.fields)
    }
}

impl ToNode for String {
    fn to_node(&self) -> Node {
        Node::Scalar(Value::String(self.clone()))
    }
}

impl ToNode for bool {
    fn to_node(&self) -> Node {
        Node::Scalar(Value::Bool(*self))
    }
}

impl ToNode for i64 {
    fn to_node(&self) -> Node {
        Node::Scalar(Value::Number((*self).into()))
    }
}

impl<T: ToNode> ToNode for Option<T> {
    fn to_node(&self) -> Node {
        match self {
            Some(value) => Node::Optional(Box::new(value.to_node())),
            None => Node::Null,
        }
    }
}

impl<T: ToNode> ToNode for Vec<T> {
    fn to_node(&self) -> Node {
        Node::List(self.iter().map(ToNode::to_node).collect())
    }
}

impl<T: ToNode> ToNode for IndexMap<String, T> {
    fn to_node(&self) -> Node {
        Node::Map(self.iter().map(|(k, v)| (k.clone(), v.to_node())).collect())
    }
}

impl ToNode for Value {
    fn to_node(&self) -> Node {
        match self {
            Value::Null => Node::Null,
            Value::Sequence(items) => Node::List(items.iter().map(ToNode::to_node).collect()),
            Value::Mapping(map) => Node::Map(
                map.iter()
                    .map(|(k, v)| (key_string(k), v.to_node()))
                    .collect(),
            ),
            Value::Tagged(tagged) => tagged.value.to_node(),
            scalar => Node::Scalar(scalar.clone()),
        }
    }
}

/// String form of a mapping key.
pub(crate) fn key_string(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => "null".to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}
