//! Provenance records inside existing config documents.

use std::fs;

use chrono::DateTime;
use rstest::rstest;
use tempfile::TempDir;

use mproj_core::{context_from_json, read_provenance, DocumentKind, MetadataStore, Revision};

const PYPROJECT: &str = r#"# project settings
[project]
name = "foo"  # keep me

[tool.ruff]
line-length = 100
"#;

const CARGO_PACKAGE: &str = r#"[package]
name = "foo"
version = "0.1.0"

[dependencies]
serde = "1" # pinned
"#;

const CARGO_WORKSPACE: &str = r#"[workspace]
members = ["a", "b"]
"#;

#[rstest]
#[case("pyproject.toml", PYPROJECT, DocumentKind::PyProject, "[manageprojects]")]
#[case("Cargo.toml", CARGO_PACKAGE, DocumentKind::CargoManifest, "[package.metadata.manageprojects]")]
#[case("Cargo.toml", CARGO_WORKSPACE, DocumentKind::CargoManifest, "[workspace.metadata.manageprojects]")]
fn record_is_added_without_touching_existing_content(
    #[case] file_name: &str,
    #[case] original: &str,
    #[case] kind: DocumentKind,
    #[case] header: &str,
) {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join(file_name);
    fs::write(&path, original).unwrap();

    let date = DateTime::parse_from_rfc3339("2024-01-02T10:00:00+01:00").unwrap();
    let mut store = MetadataStore::open(tmp.path()).unwrap();
    assert_eq!(store.kind(), kind);
    assert!(!store.has_record());
    store.init(&Revision::from("abc1234"), date, "gh:someone/tpl", Some("python")).unwrap();
    store
        .set_replay_context(&context_from_json(&serde_json::json!({
            "cookiecutter": {"project_name": "Foo Bar", "_output_dir": "/tmp/x"}
        })))
        .unwrap();
    store.save().unwrap();

    let text = fs::read_to_string(&path).unwrap();
    for line in original.lines() {
        assert!(text.contains(line), "lost {line:?}:\n{text}");
    }
    assert_eq!(text.lines().next(), original.lines().next());
    assert!(text.contains(header), "missing {header}:\n{text}");
    assert!(!text.contains("_output_dir"));

    let provenance = read_provenance(tmp.path()).unwrap();
    assert_eq!(provenance.document, path);
    assert_eq!(provenance.initial_revision, Some(Revision::from("abc1234")));
    assert_eq!(provenance.initial_date, Some(date));
    assert_eq!(provenance.template_reference.as_deref(), Some("gh:someone/tpl"));
    assert_eq!(provenance.template_subdirectory.as_deref(), Some("python"));
    let context = provenance.replay_context.unwrap();
    assert_eq!(
        context["cookiecutter"].as_map().unwrap()["project_name"].as_str(),
        Some("Foo Bar")
    );
}

#[test]
fn migrations_accumulate_across_saves() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("pyproject.toml"), PYPROJECT).unwrap();
    let d0 = DateTime::parse_from_rfc3339("2024-01-01T00:00:00+00:00").unwrap();
    let d1 = DateTime::parse_from_rfc3339("2024-02-01T00:00:00+00:00").unwrap();
    let d2 = DateTime::parse_from_rfc3339("2024-03-01T12:30:00+01:00").unwrap();

    let mut store = MetadataStore::open(tmp.path()).unwrap();
    store.init(&Revision::from("r0"), d0, "/tpl", None).unwrap();
    store.save().unwrap();

    for (revision, date) in [("r1", d1), ("r2", d2)] {
        let mut store = MetadataStore::open(tmp.path()).unwrap();
        store.append_migration(&Revision::from(revision), date).unwrap();
        store.save().unwrap();
    }

    let provenance = read_provenance(tmp.path()).unwrap();
    let migrations: Vec<_> = provenance
        .applied_migrations
        .iter()
        .map(|m| (m.revision.as_str().to_string(), m.date))
        .collect();
    assert_eq!(
        migrations,
        vec![("r1".to_string(), Some(d1)), ("r2".to_string(), Some(d2))]
    );
    assert_eq!(provenance.current_revision(), Some(&Revision::from("r2")));
    assert_eq!(provenance.initial_revision, Some(Revision::from("r0")));
}
