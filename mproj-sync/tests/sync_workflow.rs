//! End-to-end synchronization against real git repositories.

use std::fs;
use std::path::{Path, PathBuf};

use assert_fs::TempDir;
use predicates::prelude::*;

use mproj_core::{context_from_json, read_provenance, ContextMap, UserConfig};
use mproj_git::Git;
use mproj_renderer::{RenderRequest, Renderer};
use mproj_sync::{
    clone_project, reverse, start_project, update, FileUpdate, StartRequest, SyncError,
    SyncOptions, SyncResult,
};

const COOKIECUTTER_JSON: &str = r#"{
    "dir_name": "my_project",
    "file_name": "a_file_name",
    "value": "default"
}"#;

const PY_FILE: &str = "{{ cookiecutter.dir_name }}/{{ cookiecutter.file_name }}.py";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct TemplateRepo {
    dir: TempDir,
    git: Git,
}

impl TemplateRepo {
    fn new(files: &[(&str, &str)]) -> Self {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "cookiecutter.json", COOKIECUTTER_JSON);
        let git = Git::init(dir.path()).unwrap();
        let repo = Self { dir, git };
        repo.commit(files, &[], "revision 1");
        repo
    }

    fn commit(&self, files: &[(&str, &str)], removed: &[&str], message: &str) {
        for (path, body) in files {
            write(self.dir.path(), path, body);
        }
        for path in removed {
            fs::remove_file(self.dir.path().join(path)).unwrap();
        }
        self.git.add_all().unwrap();
        self.git.commit(message).unwrap();
    }

    fn reference(&self) -> String {
        self.dir.path().to_string_lossy().into_owned()
    }
}

fn write(root: &Path, relative: &str, body: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

fn renderer(home: &Path) -> Renderer {
    Renderer::new(UserConfig::default(), home.to_path_buf())
}

fn foobar() -> ContextMap {
    context_from_json(&serde_json::json!({"value": "FooBar"}))
}

/// `start` a project from `template` and commit it in its own repository.
fn started_project(template: &TemplateRepo, work: &TempDir) -> PathBuf {
    let request = StartRequest {
        template: template.reference(),
        output_dir: work.path().to_path_buf(),
        extra_context: foobar(),
        ..StartRequest::default()
    };
    let project = start_project(&renderer(work.path()), &request).unwrap();
    let git = Git::init(&project.project_path).unwrap();
    git.add_all().unwrap();
    git.commit("start").unwrap();
    project.project_path
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

// ---------------------------------------------------------------------------
// start / clone
// ---------------------------------------------------------------------------

#[test]
fn start_records_provenance() {
    let template = TemplateRepo::new(&[(PY_FILE, "# Revision 1\n\nprint('Test: {{ cookiecutter.value }}')\n")]);
    let work = TempDir::new().unwrap();
    let project = started_project(&template, &work);

    assert_eq!(project, work.path().join("my_project"));
    assert_eq!(read(&project.join("a_file_name.py")), "# Revision 1\n\nprint('Test: FooBar')\n");

    let provenance = read_provenance(&project).unwrap();
    let head = template.git.current_revision().unwrap();
    assert_eq!(provenance.initial_revision.as_ref(), Some(&head));
    assert_eq!(provenance.current_revision(), Some(&head));
    assert_eq!(provenance.template_reference, Some(template.reference()));
    let stored = provenance.replay_context.unwrap();
    let inner = stored["cookiecutter"].as_map().unwrap();
    assert_eq!(inner["value"].as_str(), Some("FooBar"));
    assert!(!inner.contains_key("_output_dir"));
    assert!(inner.contains_key("_template"));
}

#[test]
fn clone_replays_context_into_new_destination() {
    let template = TemplateRepo::new(&[(PY_FILE, "print('{{ cookiecutter.value }}')\n")]);
    let work = TempDir::new().unwrap();
    let project = started_project(&template, &work);

    let destination = work.path().join("clone");
    let cloned = clone_project(&renderer(work.path()), &project, &destination, None).unwrap();
    assert_eq!(cloned.project_path, destination.join("my_project"));
    assert_eq!(read(&cloned.project_path.join("a_file_name.py")), "print('FooBar')\n");
    assert_eq!(
        read_provenance(&cloned.project_path).unwrap().template_reference,
        Some(template.reference())
    );

    let err = clone_project(&renderer(work.path()), &project, &destination, None).unwrap_err();
    assert!(matches!(err, SyncError::DestinationExists { .. }), "got: {err}");
}

// ---------------------------------------------------------------------------
// update: patch mode
// ---------------------------------------------------------------------------

#[test]
fn patch_update_keeps_local_changes() {
    let template = TemplateRepo::new(&[(PY_FILE, "# Revision 1\n\nprint('Test: {{ cookiecutter.value }}')\n")]);
    let work = TempDir::new().unwrap();
    let project = started_project(&template, &work);

    let file = project.join("a_file_name.py");
    fs::write(&file, format!("{}# local addition\n", read(&file))).unwrap();

    template.commit(
        &[(PY_FILE, "# Revision 2\n\nprint('Test: {{ cookiecutter.value }}')\n")],
        &[],
        "revision 2",
    );
    let head = template.git.current_revision().unwrap();

    let result = update(&renderer(work.path()), &project, false, &SyncOptions::default())
        .unwrap()
        .expect("template changed");
    let SyncResult::Patch { patch, rejects, .. } = &result else {
        panic!("expected a patch result, got {result:?}");
    };
    assert!(rejects.is_empty(), "{rejects:?}");
    assert_eq!(patch.to_revision, head);

    let patch_text = read(&patch.patch_path);
    assert!(patch.patch_path.starts_with(project.join(".manageprojects/patches")));
    assert_eq!(patch_text.matches("\n@@ ").count(), 1, "{patch_text}");
    assert!(patch_text.contains("--- a/a_file_name.py"), "{patch_text}");
    assert!(patch_text.contains("-# Revision 1\n+# Revision 2\n"), "{patch_text}");

    assert_eq!(
        read(&file),
        "# Revision 2\n\nprint('Test: FooBar')\n# local addition\n"
    );

    let provenance = read_provenance(&project).unwrap();
    assert_eq!(provenance.current_revision(), Some(&head));
    assert_eq!(provenance.applied_migrations.len(), 1);
    assert!(provenance.applied_migrations[0].date.is_some());
}

#[test]
fn second_update_is_a_no_op() {
    let template = TemplateRepo::new(&[(PY_FILE, "# Revision 1\n")]);
    let work = TempDir::new().unwrap();
    let project = started_project(&template, &work);
    template.commit(&[(PY_FILE, "# Revision 2\n")], &[], "revision 2");

    let renderer = renderer(work.path());
    update(&renderer, &project, false, &SyncOptions::default())
        .unwrap()
        .expect("first update applies");
    let document = read(&project.join("pyproject.toml"));

    for _ in 0..2 {
        let again = update(&renderer, &project, false, &SyncOptions::default()).unwrap();
        assert!(again.is_none(), "{again:?}");
        assert_eq!(read(&project.join("pyproject.toml")), document);
    }
}

#[test]
fn applying_patch_to_untouched_render_reproduces_head() {
    let template = TemplateRepo::new(&[
        (PY_FILE, "value = '{{ cookiecutter.value }}'\nA = 1\n"),
        ("{{ cookiecutter.dir_name }}/OLD.txt", "to be removed\n"),
        ("{{ cookiecutter.dir_name }}/keep.txt", "one\ntwo\nthree\nfour\nfive\n"),
    ]);
    let work = TempDir::new().unwrap();
    let project = started_project(&template, &work);

    template.commit(
        &[
            (PY_FILE, "value = '{{ cookiecutter.value }}'\nA = 2\n"),
            ("{{ cookiecutter.dir_name }}/docs/{{ cookiecutter.file_name }}.md", "# {{ cookiecutter.value }}\n"),
            ("{{ cookiecutter.dir_name }}/keep.txt", "one\ntwo\nTHREE\nfour\nfive\n"),
        ],
        &["{{ cookiecutter.dir_name }}/OLD.txt"],
        "revision 2",
    );

    let result = update(&renderer(work.path()), &project, false, &SyncOptions::default())
        .unwrap()
        .expect("template changed");
    assert!(!result.has_conflicts());

    let fresh = TempDir::new().unwrap();
    let head = renderer(work.path())
        .render(
            &RenderRequest::new(template.reference(), fresh.path().to_path_buf())
                .extra_context(foobar()),
        )
        .unwrap();
    for relative in ["a_file_name.py", "keep.txt", "docs/a_file_name.md"] {
        assert_eq!(
            read(&project.join(relative)),
            read(&head.project_path.join(relative)),
            "{relative}"
        );
    }
    assert!(!project.join("OLD.txt").exists());
}

#[test]
fn conflicting_hunk_leaves_reject_and_still_advances() {
    let template = TemplateRepo::new(&[(PY_FILE, "# Revision 1\n")]);
    let work = TempDir::new().unwrap();
    let project = started_project(&template, &work);
    fs::write(project.join("a_file_name.py"), "# rewritten locally\n").unwrap();
    template.commit(&[(PY_FILE, "# Revision 2\n")], &[], "revision 2");

    let result = update(&renderer(work.path()), &project, false, &SyncOptions::default())
        .unwrap()
        .expect("template changed");
    assert!(result.has_conflicts());
    let SyncResult::Patch { rejects, .. } = &result else {
        panic!("expected a patch result");
    };
    assert_eq!(rejects, &vec![project.join("a_file_name.py.rej")]);
    assert_eq!(read(&project.join("a_file_name.py")), "# rewritten locally\n");
    assert_eq!(
        read_provenance(&project).unwrap().current_revision(),
        Some(&template.git.current_revision().unwrap())
    );
}

// ---------------------------------------------------------------------------
// update: overwrite mode
// ---------------------------------------------------------------------------

#[test]
fn overwrite_refuses_dirty_tree() {
    let template = TemplateRepo::new(&[(PY_FILE, "# Revision 1\n")]);
    let work = TempDir::new().unwrap();
    let project = started_project(&template, &work);
    template.commit(&[(PY_FILE, "# Revision 2\n")], &[], "revision 2");

    fs::write(project.join("a_file_name.py"), "# uncommitted\n").unwrap();
    let document = read(&project.join("pyproject.toml"));

    let err = update(&renderer(work.path()), &project, true, &SyncOptions::default()).unwrap_err();
    let SyncError::DirtyWorkingTree { entries, .. } = &err else {
        panic!("expected dirty tree, got {err}");
    };
    assert!(entries.iter().any(|e| e.path == "a_file_name.py"), "{entries:?}");
    assert_eq!(read(&project.join("a_file_name.py")), "# uncommitted\n");
    assert_eq!(read(&project.join("pyproject.toml")), document);
}

#[test]
fn overwrite_copies_changed_and_new_files() {
    let template = TemplateRepo::new(&[(PY_FILE, "# Revision 1\n")]);
    let work = TempDir::new().unwrap();
    let project = started_project(&template, &work);
    template.commit(
        &[
            (PY_FILE, "# Revision 2\n"),
            ("{{ cookiecutter.dir_name }}/NEW.md", "new\n"),
        ],
        &[],
        "revision 2",
    );

    let result = update(&renderer(work.path()), &project, true, &SyncOptions::default())
        .unwrap()
        .expect("files changed");
    let SyncResult::Overwrite(overwrite) = &result else {
        panic!("expected overwrite result");
    };
    assert_eq!(
        overwrite.files,
        vec![
            FileUpdate::New { path: PathBuf::from("NEW.md") },
            FileUpdate::Updated { path: PathBuf::from("a_file_name.py"), added: 1, removed: 1 },
        ]
    );
    assert_eq!(read(&project.join("a_file_name.py")), "# Revision 2\n");
    assert_eq!(
        read_provenance(&project).unwrap().current_revision(),
        Some(&template.git.current_revision().unwrap())
    );
}

// ---------------------------------------------------------------------------
// reverse
// ---------------------------------------------------------------------------

#[test]
fn reversed_template_renders_back_to_project() {
    let template = TemplateRepo::new(&[(PY_FILE, "# Revision 1\n\nprint('Test: {{ cookiecutter.value }}')\n")]);
    let work = TempDir::new().unwrap();
    let project = started_project(&template, &work);
    write(&project, ".github/workflows/ci.yml", "ref: ${{ github.ref }} for FooBar\n");
    let git = Git::open(&project).unwrap();
    git.add_all().unwrap();
    git.commit("add workflow").unwrap();
    fs::write(project.join("untracked.txt"), "FooBar\n").unwrap();

    let destination = work.path().join("reversed");
    let report = reverse(&project, &destination, false).unwrap();

    assert!(report.template_dir.ends_with("{{ cookiecutter.dir_name }}"));
    let reversed_py = report.template_dir.join("{{ cookiecutter.file_name }}.py");
    assert_eq!(
        read(&reversed_py),
        "# Revision 1\n\nprint('Test: {{ cookiecutter.value }}')\n"
    );
    assert!(!report.template_dir.join("untracked.txt").exists());
    let context_file = destination.join("cookiecutter.json");
    assert!(predicate::str::contains("\"value\": \"FooBar\"").eval(&read(&context_file)));
    assert!(!read(&context_file).contains("_template"));

    let out = TempDir::new().unwrap();
    let rendered = renderer(work.path())
        .render(&RenderRequest::new(
            destination.to_string_lossy(),
            out.path().to_path_buf(),
        ))
        .unwrap();
    assert_eq!(rendered.project_path, out.path().join("my_project"));
    assert_eq!(
        read(&rendered.project_path.join("a_file_name.py")),
        read(&project.join("a_file_name.py"))
    );
    assert_eq!(
        read(&rendered.project_path.join(".github/workflows/ci.yml")),
        "ref: ${{ github.ref }} for FooBar\n"
    );

    let err = reverse(&project, &destination, false).unwrap_err();
    assert!(matches!(err, SyncError::DestinationExists { .. }));
}
