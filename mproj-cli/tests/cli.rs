//! `mproj` binary end to end, against real git repositories.

use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use assert_fs::TempDir;
use predicates::str::contains;

use mproj_git::Git;

const COOKIECUTTER_JSON: &str = r#"{"dir_name": "my_project", "value": "default"}"#;
const PY_FILE: &str = "{{ cookiecutter.dir_name }}/main.py";

fn mproj_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("mproj"));
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env_remove("MPROJ_CONFIG")
        .env_remove("RUST_LOG");
    cmd
}

fn write(root: &Path, relative: &str, body: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

fn template_repo(dir: &Path) -> Git {
    write(dir, "cookiecutter.json", COOKIECUTTER_JSON);
    write(dir, PY_FILE, "# Revision 1\n\nprint('{{ cookiecutter.value }}')\n");
    let git = Git::init(dir).unwrap();
    git.add_all().unwrap();
    git.commit("revision 1").unwrap();
    git
}

fn start(home: &TempDir, template: &TempDir, work: &TempDir) {
    mproj_cmd(home.path())
        .arg("start")
        .arg(template.path())
        .arg(work.path())
        .args(["-c", "value=FooBar"])
        .assert()
        .success()
        .stdout(contains("my_project"));
    let project = work.path().join("my_project");
    let git = Git::init(&project).unwrap();
    git.add_all().unwrap();
    git.commit("start").unwrap();
}

#[test]
fn start_then_info_shows_provenance() {
    let home = TempDir::new().unwrap();
    let template = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let head = template_repo(template.path()).current_revision().unwrap();
    start(&home, &template, &work);

    let project = work.path().join("my_project");
    assert_eq!(
        fs::read_to_string(project.join("main.py")).unwrap(),
        "# Revision 1\n\nprint('FooBar')\n"
    );
    mproj_cmd(home.path())
        .arg("info")
        .arg(&project)
        .assert()
        .success()
        .stdout(contains(head.as_str()))
        .stdout(contains("No migrations applied."))
        .stdout(contains("FooBar"));
}

#[test]
fn update_applies_template_change_and_records_migration() {
    let home = TempDir::new().unwrap();
    let template = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let git = template_repo(template.path());
    start(&home, &template, &work);
    let project = work.path().join("my_project");

    mproj_cmd(home.path())
        .arg("update")
        .arg(&project)
        .assert()
        .success()
        .stdout(contains("up to date"));

    write(
        template.path(),
        PY_FILE,
        "# Revision 2\n\nprint('{{ cookiecutter.value }}')\n",
    );
    git.add_all().unwrap();
    git.commit("revision 2").unwrap();
    let head = git.current_revision().unwrap();

    mproj_cmd(home.path())
        .arg("update")
        .arg(&project)
        .assert()
        .success()
        .stdout(contains(head.as_str()));
    assert_eq!(
        fs::read_to_string(project.join("main.py")).unwrap(),
        "# Revision 2\n\nprint('FooBar')\n"
    );

    mproj_cmd(home.path())
        .args(["info", "--json"])
        .arg(&project)
        .assert()
        .success()
        .stdout(contains(format!("\"current_revision\": \"{head}\"")));
}

#[test]
fn overwrite_update_lists_uncommitted_changes() {
    let home = TempDir::new().unwrap();
    let template = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    template_repo(template.path());
    start(&home, &template, &work);
    let project = work.path().join("my_project");
    fs::write(project.join("scratch.txt"), "local\n").unwrap();

    mproj_cmd(home.path())
        .args(["update", "--overwrite"])
        .arg(&project)
        .assert()
        .failure()
        .stderr(contains("scratch.txt"));
}

#[test]
fn info_without_record_fails() {
    let home = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    mproj_cmd(home.path())
        .arg("info")
        .arg(work.path())
        .assert()
        .failure();
}
