//! Integration tests against a real `git` binary in temp directories.

use std::fs;
use std::path::Path;

use mproj_git::{ApplyMode, Git, GitError};
use tempfile::TempDir;

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

fn repo_with_commit(dir: &Path) -> Git {
    let git = Git::init(dir).unwrap();
    write(dir, "README.md", "# Revision 1\n");
    git.add_all().unwrap();
    git.commit("initial").unwrap();
    git
}

#[test]
fn commit_and_resolve_revision() {
    let tmp = TempDir::new().unwrap();
    let git = repo_with_commit(tmp.path());

    let rev = git.current_revision().unwrap();
    assert!(rev.as_str().len() >= 7, "short hash: {rev}");
    assert_eq!(git.resolve_revision("HEAD").unwrap(), rev);
    git.commit_date("HEAD").unwrap();
}

#[test]
fn diff_between_commits_uses_canonical_prefixes() {
    let tmp = TempDir::new().unwrap();
    let git = repo_with_commit(tmp.path());
    write(tmp.path(), "README.md", "# Revision 2\n");
    git.add_all().unwrap();
    git.commit("second").unwrap();

    let patch = String::from_utf8(git.diff("HEAD~1", "HEAD").unwrap()).unwrap();
    assert!(patch.contains("--- a/README.md"), "{patch}");
    assert!(patch.contains("+++ b/README.md"), "{patch}");
    assert!(patch.contains("-# Revision 1"));
    assert!(patch.contains("+# Revision 2"));
}

#[test]
fn empty_commit_is_allowed() {
    let tmp = TempDir::new().unwrap();
    let git = repo_with_commit(tmp.path());
    let before = git.current_revision().unwrap();
    git.commit("nothing").unwrap();
    assert_ne!(git.current_revision().unwrap(), before);
    assert!(git.diff("HEAD~1", "HEAD").unwrap().is_empty());
}

#[test]
fn status_reports_untracked_and_modified() {
    let tmp = TempDir::new().unwrap();
    let git = repo_with_commit(tmp.path());
    assert!(git.is_clean().unwrap());

    write(tmp.path(), "README.md", "changed\n");
    write(tmp.path(), "new/file.txt", "x\n");
    let status = git.status().unwrap();
    assert!(status.iter().any(|e| e.flag == "M" && e.path == "README.md"), "{status:?}");
    assert!(status.iter().any(|e| e.flag == "??" && e.path == "new/file.txt"), "{status:?}");
    assert!(!git.is_clean().unwrap());
}

#[test]
fn status_paths_are_unquoted_and_renames_report_new_path() {
    let tmp = TempDir::new().unwrap();
    let git = repo_with_commit(tmp.path());
    write(tmp.path(), "old name.txt", "same content\nfor rename detection\n");
    git.add_all().unwrap();
    git.commit("add file").unwrap();

    fs::rename(tmp.path().join("old name.txt"), tmp.path().join("neu café.txt")).unwrap();
    git.add_all().unwrap();
    write(tmp.path(), "with space.txt", "x\n");

    let status = git.status().unwrap();
    assert_eq!(status.len(), 2, "{status:?}");
    assert!(status.iter().any(|e| e.flag == "R" && e.path == "neu café.txt"), "{status:?}");
    assert!(status.iter().any(|e| e.flag == "??" && e.path == "with space.txt"), "{status:?}");
}

#[test]
fn tracked_files_exclude_untracked() {
    let tmp = TempDir::new().unwrap();
    let git = repo_with_commit(tmp.path());
    write(tmp.path(), "scratch.txt", "untracked\n");

    let files = git.list_tracked_files().unwrap();
    assert_eq!(files, vec![Path::new("README.md").to_path_buf()]);
}

#[test]
fn tolerant_apply_writes_reject_instead_of_failing() {
    let tmp = TempDir::new().unwrap();
    let git = repo_with_commit(tmp.path());
    write(tmp.path(), "README.md", "# Revision 2\n");
    git.add_all().unwrap();
    git.commit("second").unwrap();
    let patch = git.diff("HEAD~1", "HEAD").unwrap();

    let target = TempDir::new().unwrap();
    let target_git = Git::init(target.path()).unwrap();
    write(target.path(), "README.md", "completely different\n");
    target_git.add_all().unwrap();
    target_git.commit("base").unwrap();

    let patch_path = tmp.path().join("change.patch");
    fs::write(&patch_path, patch).unwrap();

    let strict = target_git.apply(&patch_path, ApplyMode::Strict).unwrap_err();
    assert!(matches!(strict, GitError::CommandFailed { .. }));

    let outcome = target_git.apply(&patch_path, ApplyMode::Tolerant).unwrap();
    assert!(!outcome.is_clean());
    assert!(target.path().join("README.md.rej").exists());
}

#[test]
fn apply_in_subdirectory_reroots_paths() {
    let tmp = TempDir::new().unwrap();
    let git = repo_with_commit(tmp.path());
    write(tmp.path(), "README.md", "# Revision 2\n");
    git.add_all().unwrap();
    git.commit("second").unwrap();
    let patch_path = tmp.path().join("change.patch");
    fs::write(&patch_path, git.diff("HEAD~1", "HEAD").unwrap()).unwrap();

    let outer = TempDir::new().unwrap();
    let outer_git = Git::init(outer.path()).unwrap();
    write(outer.path(), "sub/project/README.md", "# Revision 1\n");
    outer_git.add_all().unwrap();
    outer_git.commit("base").unwrap();

    let nested = Git::open(&outer.path().join("sub/project")).unwrap();
    let outcome = nested.apply(&patch_path, ApplyMode::Tolerant).unwrap();
    assert!(outcome.is_clean(), "{}", outcome.stderr);
    assert_eq!(
        fs::read_to_string(outer.path().join("sub/project/README.md")).unwrap(),
        "# Revision 2\n"
    );
}

#[test]
fn shared_clone_checks_out_old_revision_without_touching_source() {
    let tmp = TempDir::new().unwrap();
    let git = repo_with_commit(tmp.path());
    let first = git.current_revision().unwrap();
    write(tmp.path(), "README.md", "# Revision 2\n");
    git.add_all().unwrap();
    git.commit("second").unwrap();

    let scratch = TempDir::new().unwrap();
    let clone = git.clone_shared(&scratch.path().join("pinned")).unwrap();
    clone.checkout(first.as_str()).unwrap();

    assert_eq!(
        fs::read_to_string(clone.root().join("README.md")).unwrap(),
        "# Revision 1\n"
    );
    assert_eq!(
        fs::read_to_string(tmp.path().join("README.md")).unwrap(),
        "# Revision 2\n"
    );
}
