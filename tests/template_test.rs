//! Integration tests for loading record templates from TOML.

use timerec::error::ErrorKind;
use timerec::state::TemplateProvider;
use timerec::templates::TemplateRegistry;

fn write(dir: &std::path::Path, file: &str, content: &str) {
    std::fs::write(dir.join(file), content).unwrap();
}

#[tokio::test]
async fn loads_templates_from_directory() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "standup.toml",
        r#"
[template]
name = "standup"
project = "internal"
task = "meetings"
title = "Daily standup"
description = "Team sync"
"#,
    );
    write(
        dir.path(),
        "support.toml",
        r#"
[template]
project = "customers"
task = "tickets"
"#,
    );
    write(dir.path(), "README.md", "not a template");

    let registry = TemplateRegistry::load_from_dir(dir.path()).unwrap();
    assert_eq!(registry.len(), 2);

    let standup = registry.get_template("standup").await.unwrap();
    assert_eq!(standup.title, "Daily standup");

    // Name falls back to the file stem.
    let support = registry.get_template("support").await.unwrap();
    assert_eq!(support.project, "customers");
    assert_eq!(support.title, "");

    assert!(registry.has_template("support").await.unwrap());
    assert!(!registry.has_template("nope").await.unwrap());
    let err = registry.get_template("nope").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn malformed_template_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "bad.toml", "[template\nname = ");

    let err = TemplateRegistry::load_from_dir(dir.path()).unwrap_err();
    assert!(err.to_string().contains("bad template"));
}

#[test]
fn missing_directory_is_a_config_error() {
    let err = TemplateRegistry::load_from_dir(std::path::Path::new("/nonexistent/templates"))
        .unwrap_err();
    assert!(err.to_string().contains("cannot read template dir"));
}

#[test]
fn empty_registry_has_no_templates() {
    assert!(TemplateRegistry::empty().is_empty());
}
