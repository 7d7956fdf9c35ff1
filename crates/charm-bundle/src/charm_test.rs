// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

use rstest::rstest;
use tempfile::TempDir;

use super::*;

const METADATA: &str = r#"
name: wordpress
summary: Blog engine
provides:
  website: http
  logging:
    interface: logging
    scope: container
requires:
  db:
    interface: mysql
    limit: 1
peers:
  loadbalancer: reversenginx
extra-bindings:
  admin-api:
storage:
  uploads:
    type: filesystem
"#;

const CONFIG: &str = r#"
options:
  blog-title:
    type: string
    default: My blog
  port:
    type: int
  ratio:
    type: float
  debug:
    type: boolean
  api-key:
    type: secret
"#;

#[rstest]
fn test_parse_meta() {
    let meta = Meta::from_yaml(METADATA).unwrap();
    assert_eq!(meta.name, "wordpress");
    assert!(!meta.subordinate);

    let website = &meta.provides["website"];
    assert_eq!(website.role, RelationRole::Provider);
    assert_eq!(website.interface, "http");
    assert_eq!(meta.provides["logging"].scope, RelationScope::Container);
    assert_eq!(meta.requires["db"].limit, 1);
    assert_eq!(meta.peers["loadbalancer"].role, RelationRole::Peer);
    assert_eq!(meta.extra_bindings, vec!["admin-api"]);
    assert_eq!(meta.storage, vec!["uploads"]);
}

#[rstest]
fn test_relation_lookup() {
    let meta = Meta::from_yaml(METADATA).unwrap();
    assert_eq!(meta.relation("db").unwrap().role, RelationRole::Requirer);
    assert!(meta.relation("juju-info").unwrap().is_implicit());
    assert!(meta.relation("missing").is_none());
}

#[rstest]
fn test_relation_candidates_include_juju_info() {
    let meta = Meta::from_yaml(METADATA).unwrap();
    let names: Vec<_> = meta
        .relation_candidates()
        .into_iter()
        .map(|r| r.name)
        .collect();
    assert_eq!(names, vec!["website", "logging", "db", "juju-info"]);
}

#[rstest]
fn test_has_endpoint() {
    let meta = Meta::from_yaml(METADATA).unwrap();
    for endpoint in ["website", "db", "loadbalancer", "admin-api"] {
        assert!(meta.has_endpoint(endpoint), "{endpoint} should be known");
    }
    assert!(!meta.has_endpoint("unknown"));
}

#[rstest]
#[case(OptionType::String, Value::from("text"), Ok(Value::from("text")))]
#[case(OptionType::Secret, Value::from("s3cr3t"), Ok(Value::from("s3cr3t")))]
#[case(OptionType::Int, Value::from(8080), Ok(Value::from(8080)))]
#[case(OptionType::Int, Value::from("42"), Ok(Value::from(42)))]
#[case(OptionType::Int, Value::from(3.0), Ok(Value::from(3)))]
#[case(OptionType::Float, Value::from(2), Ok(Value::from(2.0)))]
#[case(OptionType::Float, Value::from("0.5"), Ok(Value::from(0.5)))]
#[case(OptionType::Boolean, Value::Bool(true), Ok(Value::Bool(true)))]
#[case(OptionType::Boolean, Value::from("false"), Ok(Value::Bool(false)))]
#[case(OptionType::Int, Value::Null, Ok(Value::Null))]
#[case(OptionType::String, Value::from(1), Err(r#"option "opt" expected string, got 1"#))]
#[case(OptionType::Int, Value::from("abc"), Err(r#"option "opt" expected int, got "abc""#))]
#[case(OptionType::Int, Value::from(1.5), Err(r#"option "opt" expected int, got 1.5"#))]
#[case(OptionType::Boolean, Value::from("yes"), Err(r#"option "opt" expected boolean, got "yes""#))]
fn test_option_validation(
    #[case] option_type: OptionType,
    #[case] value: Value,
    #[case] expected: std::result::Result<Value, &str>,
) {
    let option = ConfigOption::new(option_type);
    let result = option.validate("opt", &value);
    assert_eq!(result, expected.map_err(String::from));
}

#[rstest]
fn test_parse_config() {
    let config = Config::from_yaml(CONFIG).unwrap();
    assert_eq!(config.options.len(), 5);
    assert_eq!(config.options["port"].option_type, OptionType::Int);
    assert_eq!(config.options["blog-title"].default, Some(Value::from("My blog")));
    assert!(Config::from_yaml("").unwrap().options.is_empty());
}

#[rstest]
fn test_read_charm_dir() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join(METADATA_FILENAME), METADATA).unwrap();
    std::fs::write(tmp.path().join(CONFIG_FILENAME), CONFIG).unwrap();

    let charm = CharmData::read_dir(tmp.path()).unwrap();
    assert_eq!(charm.meta().name, "wordpress");
    assert_eq!(charm.config().options.len(), 5);
}

#[rstest]
fn test_read_charm_dir_without_config() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join(METADATA_FILENAME), "name: tiny\n").unwrap();

    let charm = CharmData::read_dir(tmp.path()).unwrap();
    assert!(charm.config().options.is_empty());
}

#[rstest]
fn test_read_charm_dir_errors() {
    let tmp = TempDir::new().unwrap();
    let err = CharmData::read_dir(tmp.path()).unwrap_err();
    assert!(matches!(err, Error::NotFound(_)), "got {err:?}");

    std::fs::write(tmp.path().join(METADATA_FILENAME), "provides: [oops]\n").unwrap();
    let err = CharmData::read_dir(tmp.path()).unwrap_err();
    assert!(matches!(err, Error::InvalidCharm { .. }), "got {err:?}");
}

#[rstest]
#[case("wordpress", "", "", "", "wordpress", None)]
#[case("cs:apache2-26", "cs", "", "", "apache2", Some(26))]
#[case("cs:~bob/trusty/django-12", "cs", "bob", "trusty", "django", Some(12))]
#[case("ch:mysql-server", "ch", "", "", "mysql-server", None)]
fn test_parse_charm_url(
    #[case] url: &str,
    #[case] schema: &str,
    #[case] user: &str,
    #[case] series: &str,
    #[case] name: &str,
    #[case] revision: Option<u64>,
) {
    let parsed = CharmUrl::parse(url).unwrap();
    assert_eq!(parsed.schema, schema);
    assert_eq!(parsed.user, user);
    assert_eq!(parsed.series, series);
    assert_eq!(parsed.name, name);
    assert_eq!(parsed.revision, revision);
}

#[rstest]
#[case("")]
#[case("bogus:wordpress")]
#[case("cs:Wordpress")]
#[case("cs:wordpress/")]
fn test_parse_invalid_charm_url(#[case] url: &str) {
    assert!(CharmUrl::parse(url).is_err());
}

#[rstest]
#[case("./charms/wordpress", true)]
#[case("/srv/charms/wordpress", true)]
#[case("cs:wordpress", false)]
#[case("wordpress", false)]
fn test_local_charm_path(#[case] charm: &str, #[case] local: bool) {
    assert_eq!(is_local_charm_path(charm), local);
}
