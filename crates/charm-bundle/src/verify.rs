// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Structural and semantic checks of a merged bundle.
//!
//! Verification never stops early. Every check runs and every problem found
//! is reported in one [`VerificationError`], in a stable order that follows
//! the order of the bundle document.

use std::collections::HashSet;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::bundle::{ApplicationSpec, BundleData};
use crate::charm::{Charm, CharmMap, CharmUrl, Meta, Relation, is_local_charm_path};
use crate::error::{Problem, VerificationError};
use crate::placement::{
    Endpoint,
    UnitPlacement,
    format_relation,
    is_valid_application_name,
    is_valid_machine_id,
    is_valid_series,
    is_valid_storage_name,
};

#[cfg(test)]
#[path = "./verify_test.rs"]
mod verify_test;

/// Validator for constraint, storage or device strings.
pub type Check<'a> = Box<dyn Fn(&str) -> Result<(), String> + 'a>;

/// Access levels an offer ACL may grant.
const OFFER_ACCESS_LEVELS: &[&str] = &["read", "consume", "admin"];

fn accept_all(_: &str) -> Result<(), String> {
    Ok(())
}

/// Verifies a bundle, optionally against the charms it uses.
///
/// ```
/// use charm_bundle::{BundleData, BundleVerifier};
///
/// let bundle = BundleData::from_yaml(
///     "applications:\n  wordpress:\n    charm: wordpress\n    num_units: 1\n",
/// )
/// .unwrap();
/// BundleVerifier::new(&bundle)
///     .constraints_check(|c| if c.contains('=') { Ok(()) } else { Err("bad".into()) })
///     .verify()
///     .unwrap();
/// ```
pub struct BundleVerifier<'a> {
    bundle: &'a BundleData,
    charms: Option<&'a CharmMap>,
    bundle_dir: Option<PathBuf>,
    constraints_check: Check<'a>,
    storage_check: Check<'a>,
    devices_check: Check<'a>,
}

impl<'a> BundleVerifier<'a> {
    pub fn new(bundle: &'a BundleData) -> Self {
        Self {
            bundle,
            charms: None,
            bundle_dir: None,
            constraints_check: Box::new(accept_all),
            storage_check: Box::new(accept_all),
            devices_check: Box::new(accept_all),
        }
    }

    /// Validate non-empty constraint strings of machines and applications.
    pub fn constraints_check<F>(mut self, check: F) -> Self
    where
        F: Fn(&str) -> Result<(), String> + 'a,
    {
        self.constraints_check = Box::new(check);
        self
    }

    /// Validate the storage constraints of applications.
    pub fn storage_check<F>(mut self, check: F) -> Self
    where
        F: Fn(&str) -> Result<(), String> + 'a,
    {
        self.storage_check = Box::new(check);
        self
    }

    /// Validate the device constraints of applications.
    pub fn devices_check<F>(mut self, check: F) -> Self
    where
        F: Fn(&str) -> Result<(), String> + 'a,
    {
        self.devices_check = Box::new(check);
        self
    }

    /// Check applications against these charms. Without charms, checks
    /// that need charm metadata are skipped.
    pub fn charms(mut self, charms: &'a CharmMap) -> Self {
        self.charms = Some(charms);
        self
    }

    /// Directory that relative local charm paths resolve against.
    pub fn bundle_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.bundle_dir = Some(dir.into());
        self
    }

    /// Run every check, returning all problems found.
    pub fn verify(&self) -> Result<(), VerificationError> {
        let mut pass = Pass::new(self);
        pass.run();
        tracing::debug!(problems = pass.problems.len(), "bundle verification finished");
        VerificationError::into_result(pass.problems)
    }
}

/// State of one verification run.
struct Pass<'v, 'a> {
    verifier: &'v BundleVerifier<'a>,
    bundle: &'a BundleData,
    problems: Vec<Problem>,
    /// Placement references per declared machine.
    machine_refs: IndexMap<&'a str, usize>,
}

impl<'v, 'a> Pass<'v, 'a> {
    fn new(verifier: &'v BundleVerifier<'a>) -> Self {
        let bundle = verifier.bundle;
        Self {
            verifier,
            bundle,
            problems: Vec::new(),
            machine_refs: bundle.machines.keys().map(|id| (id.as_str(), 0)).collect(),
        }
    }

    fn error(&mut self, message: String) {
        tracing::trace!(%message, "verification problem");
        self.problems.push(Problem(message));
    }

    fn run(&mut self) {
        let bundle = self.bundle;
        let series = &bundle.series;
        if !series.is_empty() && !is_valid_series(series) {
            self.error(format!("bundle declares an invalid series {series:?}"));
        }
        if bundle.is_kubernetes() {
            self.verify_kubernetes();
        }
        self.verify_machines();
        self.verify_applications();
        self.verify_saas();
        self.verify_relations();
        self.verify_options();
        self.verify_endpoint_bindings();

        let unreferenced: Vec<&str> = self
            .machine_refs
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(id, _)| *id)
            .collect();
        for id in unreferenced {
            self.error(format!("machine {id:?} is not referred to by a placement directive"));
        }
    }

    /// The charm used by an application, when charms were supplied.
    fn charm(&self, app: &ApplicationSpec) -> Option<&'a dyn Charm> {
        self.verifier
            .charms
            .and_then(|charms| charms.get(&app.charm))
            .map(|charm| charm.as_ref())
    }

    fn meta_for(&self, application: &str) -> Option<&'a Meta> {
        let app = self.bundle.applications.get(application)?;
        self.charm(app).map(|charm| charm.meta())
    }

    fn verify_kubernetes(&mut self) {
        if !self.bundle.machines.is_empty() {
            self.error("expected no machines for kubernetes bundle".to_string());
        }
        let bundle = self.bundle;
        for (name, app) in &bundle.applications {
            if !app.to.is_empty() {
                self.error(format!(
                    "expected no 'to' placement for kubernetes bundle application {name:?}"
                ));
            }
        }
    }

    fn verify_machines(&mut self) {
        let bundle = self.bundle;
        for (id, machine) in &bundle.machines {
            if !is_valid_machine_id(id) {
                self.error(format!("invalid machine id {id:?} found in machines"));
            }
            if !machine.constraints.is_empty() {
                if let Err(err) = (self.verifier.constraints_check)(&machine.constraints) {
                    self.error(format!(
                        "invalid constraints {:?} in machine {id:?}: {err}",
                        machine.constraints
                    ));
                }
            }
            if !machine.series.is_empty() && !is_valid_series(&machine.series) {
                self.error(format!("invalid series {} for machine {id:?}", machine.series));
            }
        }
    }

    fn verify_applications(&mut self) {
        let bundle = self.bundle;
        if bundle.applications.is_empty() {
            self.error("at least one application must be specified".to_string());
        }
        for (name, app) in &bundle.applications {
            self.verify_charm_reference(name, app);

            if !app.constraints.is_empty() {
                if let Err(err) = (self.verifier.constraints_check)(&app.constraints) {
                    self.error(format!(
                        "invalid constraints {:?} in application {name:?}: {err}",
                        app.constraints
                    ));
                }
            }
            for (storage, constraint) in &app.storage {
                if !is_valid_storage_name(storage) {
                    self.error(format!("invalid storage name {storage:?} in application {name:?}"));
                }
                if let Err(err) = (self.verifier.storage_check)(constraint) {
                    self.error(format!("invalid storage {storage:?} in application {name:?}: {err}"));
                }
            }
            for (device, constraint) in &app.devices {
                if let Err(err) = (self.verifier.devices_check)(constraint) {
                    self.error(format!("invalid device {device:?} in application {name:?}: {err}"));
                }
            }

            if self.verifier.charms.is_some() {
                match self.charm(app) {
                    Some(charm) => self.verify_against_charm(name, app, charm.meta()),
                    None => self.error(format!(
                        "application {name:?} refers to non-existent charm {:?}",
                        app.charm
                    )),
                }
            }

            if app.resources.keys().any(String::is_empty) {
                self.error(format!("missing resource name on application {name:?}"));
            }
            if app.num_units < 0 {
                self.error(format!("negative number of units specified on application {name:?}"));
            } else if app.to.len() as i64 > app.num_units {
                self.error(format!(
                    "too many units specified in unit placement for application {name:?}"
                ));
            }
            self.verify_placement(&app.to);
            self.verify_exposed_endpoints(name, app);
        }
    }

    fn verify_charm_reference(&mut self, name: &str, app: &ApplicationSpec) {
        if app.charm.is_empty() {
            self.error("empty charm path".to_string());
            return;
        }
        let mut url_series = String::new();
        if is_local_charm_path(&app.charm) {
            let path = Path::new(&app.charm);
            let path = match &self.verifier.bundle_dir {
                Some(dir) if !path.is_absolute() => dir.join(path),
                _ => path.to_path_buf(),
            };
            if let Err(err) = std::fs::metadata(&path) {
                self.error(format!(
                    "charm path in application {name:?} does not exist: {}: {err}",
                    path.display()
                ));
            }
        } else {
            match CharmUrl::parse(&app.charm) {
                Ok(url) => url_series = url.series,
                Err(err) => self.error(format!("invalid charm URL in application {name:?}: {err}")),
            }
        }

        if !app.series.is_empty() && !is_valid_series(&app.series) {
            self.error(format!(
                "application {name:?} declares an invalid series {:?}",
                app.series
            ));
        }
        if !url_series.is_empty() && !app.series.is_empty() && url_series != app.series {
            self.error(format!(
                "the charm URL for application {name:?} has a series which does not match, \
                 please remove the series from the URL"
            ));
        }
    }

    fn verify_against_charm(&mut self, name: &str, app: &ApplicationSpec, meta: &Meta) {
        if meta.subordinate {
            if !app.to.is_empty() {
                self.error(format!(
                    "application {name:?} is subordinate but specifies unit placement"
                ));
            }
            if app.num_units > 0 {
                self.error(format!(
                    "application {name:?} is subordinate but has non-zero num_units"
                ));
            }
        }
        for storage in app.storage.keys() {
            if !meta.storage.contains(storage) {
                self.error(format!(
                    "application {name:?} refers to storage {storage:?} which is not declared by charm {:?}",
                    app.charm
                ));
            }
        }
        for (offer, spec) in &app.offers {
            for endpoint in &spec.endpoints {
                if !meta.has_endpoint(endpoint) {
                    self.error(format!(
                        "offer {offer:?} of application {name:?} refers to endpoint {endpoint:?} which is not defined by the charm"
                    ));
                }
            }
        }
        for endpoint in app.exposed_endpoints.keys() {
            if !endpoint.is_empty() && !meta.has_endpoint(endpoint) {
                self.error(format!(
                    "application {name:?} wants to expose endpoint {endpoint:?} which is not defined by the charm"
                ));
            }
        }
    }

    fn verify_placement(&mut self, directives: &[String]) {
        let bundle = self.bundle;
        for directive in directives {
            let placement = match UnitPlacement::parse(directive) {
                Ok(placement) => placement,
                Err(err) => {
                    self.error(err);
                    continue;
                }
            };
            if !placement.application.is_empty() {
                let Some(target) = bundle.applications.get(&placement.application) else {
                    self.error(format!(
                        "placement {directive:?} refers to an application not defined in this bundle"
                    ));
                    continue;
                };
                if let Some(unit) = placement.unit {
                    if i64::try_from(unit).map_or(true, |unit| unit >= target.num_units) {
                        self.error(format!(
                            "placement {directive:?} specifies a unit greater than the {} unit(s) started by the target application",
                            target.num_units
                        ));
                    }
                }
            } else if !placement.is_new_machine() {
                match self.machine_refs.get_mut(placement.machine.as_str()) {
                    Some(count) => *count += 1,
                    None => self.error(format!(
                        "placement {directive:?} refers to a machine not defined in this bundle"
                    )),
                }
            }
        }
    }

    fn verify_exposed_endpoints(&mut self, name: &str, app: &ApplicationSpec) {
        if app.exposed_endpoints.is_empty() {
            return;
        }
        if app.expose {
            self.error(format!(
                "exposed-endpoints cannot be specified together with \"expose: true\" in application {name:?}"
            ));
        }
        for (endpoint, spec) in &app.exposed_endpoints {
            for cidr in &spec.expose_to_cidrs {
                if !is_valid_cidr(cidr) {
                    self.error(format!(
                        "invalid CIDR {cidr:?} for expose to CIDRs field for endpoint {endpoint:?} in application {name:?}"
                    ));
                }
            }
        }
    }

    fn verify_saas(&mut self) {
        let bundle = self.bundle;
        for (name, saas) in &bundle.saas {
            if !is_valid_application_name(name) {
                self.error(format!("invalid saas name {name:?}"));
            }
            if bundle.applications.contains_key(name) {
                self.error(format!("application {name:?} and saas {name:?} have the same name"));
            }
            if saas.url.is_empty() {
                self.error(format!("saas {name:?} must specify a url"));
            }
        }
        for (name, app) in &bundle.applications {
            for (offer, spec) in &app.offers {
                if !is_valid_application_name(offer) {
                    self.error(format!("invalid offer name {offer:?} in application {name:?}"));
                }
                for (user, access) in &spec.acl {
                    if !OFFER_ACCESS_LEVELS.contains(&access.as_str()) {
                        self.error(format!(
                            "invalid access level {access:?} for user {user:?} in offer {offer:?}"
                        ));
                    }
                }
            }
        }
    }

    fn verify_relations(&mut self) {
        let bundle = self.bundle;
        let mut seen: HashSet<[Endpoint; 2]> = HashSet::new();
        for pair in &bundle.relations {
            let shown = format_relation(pair);
            let [first, second] = pair.as_slice() else {
                self.error(format!("relation {shown} has {} endpoint(s), not 2", pair.len()));
                continue;
            };

            let mut endpoints = Vec::with_capacity(2);
            for raw in [first, second] {
                match Endpoint::parse(raw) {
                    Ok(endpoint) => {
                        if !bundle.applications.contains_key(&endpoint.application)
                            && !bundle.saas.contains_key(&endpoint.application)
                        {
                            self.error(format!(
                                "relation {shown} refers to application {:?} not defined in this bundle",
                                endpoint.application
                            ));
                        }
                        endpoints.push(endpoint);
                    }
                    Err(err) => self.error(err),
                }
            }
            let [mut ep0, mut ep1] = match <[Endpoint; 2]>::try_from(endpoints) {
                Ok(pair) => pair,
                Err(_) => continue,
            };
            if ep0.application == ep1.application {
                self.error(format!("relation {shown} relates an application to itself"));
            }

            if (ep0.relation.is_empty() || ep1.relation.is_empty()) && self.verifier.charms.is_some() {
                if let (Some(meta0), Some(meta1)) =
                    (self.meta_for(&ep0.application), self.meta_for(&ep1.application))
                {
                    match infer_endpoints(&ep0, meta0, &ep1, meta1) {
                        Ok((inferred0, inferred1)) => {
                            ep0 = inferred0;
                            ep1 = inferred1;
                        }
                        Err(err) => self.error(err),
                    }
                }
            }

            if ep1 < ep0 {
                std::mem::swap(&mut ep0, &mut ep1);
            }
            let key = [ep0, ep1];
            if seen.contains(&key) {
                self.error(format!("relation {shown} is defined more than once"));
            }
            let [ep0, ep1] = &key;
            if self.verifier.charms.is_some() && !ep0.relation.is_empty() && !ep1.relation.is_empty() {
                self.verify_relation(ep0, ep1);
            }
            seen.insert(key);
        }
    }

    /// Check two concrete endpoints against their charms.
    fn verify_relation(&mut self, ep0: &Endpoint, ep1: &Endpoint) {
        let rel0 = self.declared_relation(ep0);
        let rel1 = self.declared_relation(ep1);
        let (Some(rel0), Some(rel1)) = (rel0, rel1) else {
            return;
        };
        if !rel0.role.is_counterpart(rel1.role) {
            self.error(format!(
                "relation {:?} to {:?} relates {} to {}",
                ep0.to_string(),
                ep1.to_string(),
                rel0.role,
                rel1.role
            ));
        }
        if rel0.interface != rel1.interface {
            self.error(format!(
                "mismatched interface between {:?} and {:?} ({:?} vs {:?})",
                ep0.to_string(),
                ep1.to_string(),
                rel0.interface,
                rel1.interface
            ));
        }
    }

    /// The relation an endpoint names, reporting it when the charm lacks it.
    /// None also when the charm is unknown, which is reported elsewhere.
    fn declared_relation(&mut self, endpoint: &Endpoint) -> Option<Relation> {
        let bundle = self.bundle;
        let app = bundle.applications.get(&endpoint.application)?;
        let meta = self.charm(app)?.meta();
        let relation = meta.relation(&endpoint.relation);
        if relation.is_none() {
            self.error(format!(
                "charm {:?} used by application {:?} does not define relation {:?}",
                app.charm, endpoint.application, endpoint.relation
            ));
        }
        relation
    }

    fn verify_options(&mut self) {
        let bundle = self.bundle;
        for (name, app) in &bundle.applications {
            let Some(charm) = self.charm(app) else {
                continue;
            };
            let config = charm.config();
            for (option, value) in &app.options {
                match config.options.get(option) {
                    None => self.error(format!(
                        "cannot validate application {name:?}: configuration option {option:?} not found in charm {:?}",
                        app.charm
                    )),
                    Some(spec) => {
                        if let Err(err) = spec.validate(option, value) {
                            self.error(format!("cannot validate application {name:?}: {err}"));
                        }
                    }
                }
            }
        }
    }

    fn verify_endpoint_bindings(&mut self) {
        let bundle = self.bundle;
        for (name, app) in &bundle.applications {
            let Some(charm) = self.charm(app) else {
                continue;
            };
            let meta = charm.meta();
            for (endpoint, space) in &app.endpoint_bindings {
                // The empty endpoint sets the application's default space.
                if endpoint.is_empty() || meta.has_endpoint(endpoint) {
                    continue;
                }
                self.error(format!(
                    "application {name:?} wants to bind endpoint {endpoint:?} to space {space:?}, \
                     but the endpoint is not defined by the charm"
                ));
            }
        }
    }
}

/// Candidate endpoints of an application for a relation spec: the named
/// relation, or every provided and required relation when none is named.
fn possible_endpoints(spec: &Endpoint, meta: &Meta) -> Vec<(Endpoint, Relation)> {
    meta.relation_candidates()
        .into_iter()
        .filter(|rel| spec.relation.is_empty() || spec.relation == rel.name)
        .map(|rel| (Endpoint::new(spec.application.clone(), rel.name.clone()), rel))
        .collect()
}

/// Fill in omitted relation names by looking for the single compatible
/// pairing of the two applications' relations.
fn infer_endpoints(
    spec0: &Endpoint,
    meta0: &Meta,
    spec1: &Endpoint,
    meta1: &Meta,
) -> Result<(Endpoint, Endpoint), String> {
    let eps0 = possible_endpoints(spec0, meta0);
    let eps1 = possible_endpoints(spec1, meta1);

    let mut candidates = Vec::new();
    for (ep0, rel0) in &eps0 {
        for (ep1, rel1) in &eps1 {
            let compatible = ep0.application != ep1.application
                && rel0.interface == rel1.interface
                && rel0.role.is_counterpart(rel1.role);
            if compatible {
                candidates.push((ep0, rel0, ep1, rel1));
            }
        }
    }

    match candidates.as_slice() {
        [] => {
            return Err(format!(
                "no relations found between {:?} and {:?}",
                spec0.to_string(),
                spec1.to_string()
            ));
        }
        [(ep0, _, ep1, _)] => return Ok(((*ep0).clone(), (*ep1).clone())),
        _ => {}
    }

    let explicit: Vec<_> = candidates
        .iter()
        .filter(|(_, rel0, _, rel1)| !rel0.is_implicit() && !rel1.is_implicit())
        .collect();
    if let [(ep0, _, ep1, _)] = explicit.as_slice() {
        return Ok(((*ep0).clone(), (*ep1).clone()));
    }

    let mut keys: Vec<String> = candidates
        .iter()
        .map(|(ep0, _, ep1, _)| format!("{:?}", relation_key(ep0, ep1)))
        .collect();
    keys.sort();
    Err(format!(
        "ambiguous relation: {:?} could refer to {}",
        format!("{spec0} {spec1}"),
        keys.join("; ")
    ))
}

/// Both endpoints in canonical order, space separated.
fn relation_key(ep0: &Endpoint, ep1: &Endpoint) -> String {
    if ep1 < ep0 {
        format!("{ep1} {ep0}")
    } else {
        format!("{ep0} {ep1}")
    }
}

fn is_valid_cidr(cidr: &str) -> bool {
    let Some((addr, prefix)) = cidr.split_once('/') else {
        return false;
    };
    let Ok(addr) = addr.parse::<IpAddr>() else {
        return false;
    };
    let max = if addr.is_ipv4() { 32 } else { 128 };
    prefix.parse::<u8>().is_ok_and(|p| p <= max)
}
