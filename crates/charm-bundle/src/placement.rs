// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Grammars for placement directives, relation endpoints and names.

use once_cell::sync::Lazy;
use regex::Regex;

#[cfg(test)]
#[path = "./placement_test.rs"]
mod placement_test;

/// A machine id or unit index.
pub(crate) const NUMBER: &str = "(?:0|[1-9][0-9]*)";
/// An application name, also used for storage names.
pub(crate) const APPLICATION_NAME: &str = "[a-z][a-z0-9]*(?:-[a-z0-9]*[a-z][a-z0-9]*)*";
const CONTAINER_TYPE: &str = "[a-z]+";
const SERIES: &str = "[a-z]+(?:[a-z0-9]+)?";
const RELATION_NAME: &str = "[a-z][a-z0-9]*(?:[_-][a-z0-9]+)*";

/// Directive for a new machine.
pub const NEW_MACHINE: &str = "new";

fn anchored(pattern: &str) -> Regex {
    Regex::new(&format!("^{pattern}$")).expect("static regex must compile")
}

static PLACEMENT_RE: Lazy<Regex> = Lazy::new(|| {
    anchored(&format!(
        "(?:({CONTAINER_TYPE}):)?(?:({NUMBER}|{NEW_MACHINE})|({APPLICATION_NAME})(?:/({NUMBER}))?)"
    ))
});
static NUMBER_RE: Lazy<Regex> = Lazy::new(|| anchored(NUMBER));
static APPLICATION_RE: Lazy<Regex> = Lazy::new(|| anchored(APPLICATION_NAME));
static SERIES_RE: Lazy<Regex> = Lazy::new(|| anchored(SERIES));
static RELATION_RE: Lazy<Regex> = Lazy::new(|| anchored(RELATION_NAME));

pub fn is_valid_machine_id(id: &str) -> bool {
    NUMBER_RE.is_match(id)
}

pub fn is_valid_application_name(name: &str) -> bool {
    APPLICATION_RE.is_match(name)
}

pub fn is_valid_series(series: &str) -> bool {
    SERIES_RE.is_match(series)
}

pub fn is_valid_relation_name(name: &str) -> bool {
    RELATION_RE.is_match(name)
}

/// Storage names follow the application name grammar.
pub fn is_valid_storage_name(name: &str) -> bool {
    APPLICATION_RE.is_match(name)
}

/// A parsed placement directive:
/// `[container-type:](machine-id | new | application[/unit])`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitPlacement {
    /// Container to create on the target, e.g. `lxd`.
    pub container_type: String,
    /// Machine id or `new`. Empty when an application is targeted.
    pub machine: String,
    /// Target application. Empty when a machine is targeted.
    pub application: String,
    /// Unit of the target application, `None` for any unit.
    pub unit: Option<usize>,
}

impl UnitPlacement {
    pub fn parse(directive: &str) -> Result<Self, String> {
        let captures = PLACEMENT_RE
            .captures(directive)
            .ok_or_else(|| format!("invalid placement syntax {directive:?}"))?;
        let text = |i: usize| captures.get(i).map(|m| m.as_str().to_string()).unwrap_or_default();
        let unit = match captures.get(4) {
            Some(unit) => Some(
                unit.as_str()
                    .parse()
                    .map_err(|_| format!("invalid placement syntax {directive:?}"))?,
            ),
            None => None,
        };
        // `new` only matches the application branch when a unit follows it.
        if text(3) == NEW_MACHINE {
            return Err(format!("invalid placement syntax {directive:?}"));
        }
        Ok(Self {
            container_type: text(1),
            machine: text(2),
            application: text(3),
            unit,
        })
    }

    /// Whether the directive asks for a new machine.
    pub fn is_new_machine(&self) -> bool {
        self.machine == NEW_MACHINE
    }
}

/// One side of a relation, `application[:relation]`.
///
/// Endpoints order by application then relation, which gives every relation
/// pair a canonical form regardless of the order it was written in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Endpoint {
    pub application: String,
    /// Empty until inferred when omitted.
    pub relation: String,
}

impl Endpoint {
    pub fn new<A: Into<String>, R: Into<String>>(application: A, relation: R) -> Self {
        Self {
            application: application.into(),
            relation: relation.into(),
        }
    }

    /// Parse `application[:relation]`, checking both names.
    pub fn parse(endpoint: &str) -> Result<Self, String> {
        let (application, relation) = match endpoint.split_once(':') {
            Some((application, relation)) => (application, Some(relation)),
            None => (endpoint, None),
        };
        if !is_valid_application_name(application) {
            return Err(format!("invalid application name {application:?}"));
        }
        match relation {
            Some(relation) if !is_valid_relation_name(relation) => {
                Err(format!("invalid relation name {relation:?}"))
            }
            relation => Ok(Self::new(application, relation.unwrap_or_default())),
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.relation.is_empty() {
            f.write_str(&self.application)
        } else {
            write!(f, "{}:{}", self.application, self.relation)
        }
    }
}

/// Render a relation as a bracketed list of quoted endpoints:
/// `["wordpress:db" "mysql:server"]`.
pub fn format_relation<S: AsRef<str>>(endpoints: &[S]) -> String {
    let quoted: Vec<String> = endpoints
        .iter()
        .map(|ep| format!("{:?}", ep.as_ref()))
        .collect();
    format!("[{}]", quoted.join(" "))
}
