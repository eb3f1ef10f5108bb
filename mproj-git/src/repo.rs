//! [`Git`]: the handful of version-control primitives mproj needs.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::Duration;

use chrono::{DateTime, FixedOffset};

use mproj_core::Revision;

use crate::command::{default_timeout, describe, run_with_timeout};
use crate::error::{io_err, GitError};

/// Identity used for commits in throwaway repositories.
const COMMIT_IDENTITY: &[&str] = &[
    "-c",
    "user.name=mproj",
    "-c",
    "user.email=mproj@localhost",
    "-c",
    "commit.gpgsign=false",
];

/// Flags that make `git apply` tolerate drift in the target tree: one line of
/// context is enough, whitespace differences are ignored, hunk headers are
/// recounted and hunks that still do not fit land in `<file>.rej`.
const TOLERANT_APPLY: &[&str] = &[
    "--reject",
    "--ignore-space-change",
    "--ignore-whitespace",
    "--whitespace=nowarn",
    "-C1",
    "--recount",
];

/// How [`Git::apply`] treats hunks that do not match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyMode {
    /// Fail the whole apply on the first mismatch.
    Strict,
    /// Apply what fits, write the rest as `.rej` fragments.
    Tolerant,
}

/// Result of a tolerant apply. A non-zero exit code means some hunks were
/// rejected; that is reported, not raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ApplyOutcome {
    pub fn is_clean(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// One entry of `git status --porcelain`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// Two-letter status code, trimmed (`M`, `??`, `A`, …).
    pub flag: String,
    /// Path relative to the repository root.
    pub path: String,
}

/// Handle on a git work tree.
///
/// `cwd` is the directory the handle was opened for; `root` is the top level
/// of the enclosing repository. They differ when a managed project lives in a
/// subdirectory of a larger repository.
#[derive(Debug, Clone)]
pub struct Git {
    bin: PathBuf,
    cwd: PathBuf,
    root: PathBuf,
    timeout: Duration,
}

impl Git {
    /// Open the repository containing `path`.
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let bin = git_binary()?;
        let cwd = path
            .canonicalize()
            .map_err(|e| io_err(path, e))?;
        let timeout = default_timeout();
        let output = run(&bin, &cwd, &["rev-parse", "--show-toplevel"], timeout)?;
        if !output.status.success() {
            return Err(GitError::NotARepository { path: path.to_path_buf() });
        }
        let top = stdout_line(&output);
        if top.is_empty() {
            return Err(GitError::NotARepository { path: path.to_path_buf() });
        }
        let root = PathBuf::from(top)
            .canonicalize()
            .map_err(|e| io_err(path, e))?;
        Ok(Self { bin, cwd, root, timeout })
    }

    /// `git init` a new repository at `path` (created if missing).
    pub fn init(path: &Path) -> Result<Self, GitError> {
        std::fs::create_dir_all(path).map_err(|e| io_err(path, e))?;
        let bin = git_binary()?;
        let timeout = default_timeout();
        check(run(&bin, path, &["init", "--quiet"], timeout)?, &bin, &["init"])?;
        tracing::debug!("initialized git repository at {}", path.display());
        Self::open(path)
    }

    /// Clone `source` into `dest`. With `shared`, objects are borrowed from a
    /// local source instead of copied.
    pub fn clone_into(source: &str, dest: &Path, shared: bool) -> Result<Self, GitError> {
        let bin = git_binary()?;
        let parent = dest.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        let mut args: Vec<OsString> = vec!["clone".into(), "--quiet".into()];
        if shared {
            args.push("--shared".into());
        }
        args.push(source.into());
        args.push(dest.as_os_str().to_owned());
        tracing::info!("clone {source} -> {}", dest.display());
        check(run(&bin, parent, &args, default_timeout())?, &bin, &args)?;
        Self::open(dest)
    }

    /// Cheap local clone of this repository into `dest`, sharing its objects.
    pub fn clone_shared(&self, dest: &Path) -> Result<Self, GitError> {
        Self::clone_into(&self.root.to_string_lossy(), dest, true)
    }

    /// `true` when `path` is inside a git work tree.
    pub fn is_repository(path: &Path) -> bool {
        Self::open(path).is_ok()
    }

    /// Override the per-command time bound.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Top level of the work tree.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory this handle was opened for.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    // -----------------------------------------------------------------------
    // History
    // -----------------------------------------------------------------------

    /// Short hash of `HEAD`.
    pub fn current_revision(&self) -> Result<Revision, GitError> {
        self.resolve_revision("HEAD")
    }

    /// Short hash of any revision expression.
    pub fn resolve_revision(&self, rev: &str) -> Result<Revision, GitError> {
        let out = self.output(&["rev-parse", "--short", rev])?;
        let line = stdout_line(&out);
        if line.is_empty() {
            return Err(GitError::InvalidOutput {
                command: format!("git rev-parse --short {rev}"),
                detail: "empty output".to_string(),
            });
        }
        Ok(Revision::from(line))
    }

    /// Committer date of `rev`.
    pub fn commit_date(&self, rev: &str) -> Result<DateTime<FixedOffset>, GitError> {
        let out = self.output(&["show", "-s", "--format=%cI", rev])?;
        let line = stdout_line(&out);
        DateTime::parse_from_rfc3339(&line).map_err(|e| GitError::InvalidOutput {
            command: format!("git show -s --format=%cI {rev}"),
            detail: format!("'{line}': {e}"),
        })
    }

    /// Stage everything below the root, deletions included.
    pub fn add_all(&self) -> Result<(), GitError> {
        self.output_in(&self.root, &["add", "--all"]).map(drop)
    }

    /// Commit the index. Empty commits are allowed so callers do not need to
    /// special-case "nothing changed".
    pub fn commit(&self, message: &str) -> Result<(), GitError> {
        let mut args: Vec<&str> = COMMIT_IDENTITY.to_vec();
        args.extend(["commit", "--quiet", "--allow-empty", "--no-verify", "-m", message]);
        self.output_in(&self.root, &args).map(drop)
    }

    /// Set a repository-local config value.
    pub fn config(&self, key: &str, value: &str) -> Result<(), GitError> {
        self.output(&["config", key, value]).map(drop)
    }

    pub fn fetch(&self) -> Result<(), GitError> {
        self.output(&["fetch", "--quiet"]).map(drop)
    }

    /// Force the work tree to `rev` (detached).
    pub fn checkout(&self, rev: &str) -> Result<(), GitError> {
        self.output_in(&self.root, &["checkout", "--quiet", "--force", "--detach", rev])
            .map(drop)
    }

    pub fn reset_hard(&self, rev: &str) -> Result<(), GitError> {
        self.output_in(&self.root, &["reset", "--quiet", "--hard", rev])
            .map(drop)
    }

    // -----------------------------------------------------------------------
    // Diff / apply
    // -----------------------------------------------------------------------

    /// Unified diff `from..to` with rename detection and binary hunks.
    ///
    /// Prefixes are pinned to `a/` and `b/` so user settings such as
    /// `diff.noprefix` or `diff.mnemonicPrefix` cannot change the patch shape.
    ///
    /// Returned as raw bytes: text files in other encodings must reach
    /// `git apply` unchanged.
    pub fn diff(&self, from: &str, to: &str) -> Result<Vec<u8>, GitError> {
        let out = self.output_in(
            &self.root,
            &[
                "-c",
                "core.quotepath=false",
                "diff",
                "--no-color",
                "--no-ext-diff",
                "--binary",
                "--find-renames",
                "--src-prefix=a/",
                "--dst-prefix=b/",
                from,
                to,
            ],
        )?;
        Ok(out.stdout)
    }

    /// Apply `patch` to the work tree below [`Git::cwd`].
    ///
    /// Patch paths are relative to `cwd`; when `cwd` is a subdirectory of the
    /// repository they are re-rooted with `--directory`.
    pub fn apply(&self, patch: &Path, mode: ApplyMode) -> Result<ApplyOutcome, GitError> {
        let mut args: Vec<OsString> = vec!["apply".into(), "-p1".into()];
        if mode == ApplyMode::Tolerant {
            args.extend(TOLERANT_APPLY.iter().map(OsString::from));
        }
        if let Some(prefix) = self.cwd_prefix() {
            let mut flag = OsString::from("--directory=");
            flag.push(prefix.as_os_str());
            args.push(flag);
        }
        args.push(patch.as_os_str().to_owned());

        let out = run(&self.bin, &self.root, &args, self.timeout)?;
        let outcome = ApplyOutcome {
            exit_code: out.status.code(),
            stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
        };
        match mode {
            ApplyMode::Strict if !outcome.is_clean() => Err(GitError::CommandFailed {
                command: describe(&self.bin, &args),
                code: outcome.exit_code,
                stderr: outcome.stderr,
            }),
            _ => {
                if !outcome.is_clean() {
                    tracing::warn!(
                        "patch {} applied with conflicts (exit code {:?})",
                        patch.display(),
                        outcome.exit_code
                    );
                }
                Ok(outcome)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Work tree state
    // -----------------------------------------------------------------------

    /// Pending changes below `cwd`: staged, unstaged and untracked.
    ///
    /// Parsed from `--porcelain -z`, so paths arrive unquoted. A rename or
    /// copy reports its new path.
    pub fn status(&self) -> Result<Vec<StatusEntry>, GitError> {
        let out = self.output(&[
            "status",
            "--porcelain",
            "-z",
            "--untracked-files=all",
            "--",
            ".",
        ])?;
        let mut records = out.stdout.split(|b| *b == 0).filter(|r| !r.is_empty());
        let mut entries = Vec::new();
        while let Some(record) = records.next() {
            if record.len() < 4 {
                continue;
            }
            let flag = String::from_utf8_lossy(&record[..2]).trim().to_string();
            let path = String::from_utf8_lossy(&record[3..]).into_owned();
            if flag.contains(['R', 'C']) {
                // The source path follows as its own record.
                records.next();
            }
            entries.push(StatusEntry { flag, path });
        }
        Ok(entries)
    }

    pub fn is_clean(&self) -> Result<bool, GitError> {
        Ok(self.status()?.is_empty())
    }

    /// Tracked files below `cwd`, relative to `cwd`.
    pub fn list_tracked_files(&self) -> Result<Vec<PathBuf>, GitError> {
        let out = self.output(&["ls-files", "-z"])?;
        Ok(out
            .stdout
            .split(|b| *b == 0)
            .filter(|entry| !entry.is_empty())
            .map(|entry| PathBuf::from(String::from_utf8_lossy(entry).into_owned()))
            .collect())
    }

    // -----------------------------------------------------------------------
    // Private helpers
    // -----------------------------------------------------------------------

    fn cwd_prefix(&self) -> Option<PathBuf> {
        self.cwd
            .strip_prefix(&self.root)
            .ok()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
    }

    fn output<S: AsRef<OsStr>>(&self, args: &[S]) -> Result<Output, GitError> {
        self.output_in(&self.cwd, args)
    }

    fn output_in<S: AsRef<OsStr>>(&self, dir: &Path, args: &[S]) -> Result<Output, GitError> {
        let out = run(&self.bin, dir, args, self.timeout)?;
        check(out, &self.bin, args)
    }
}

fn git_binary() -> Result<PathBuf, GitError> {
    which::which("git").map_err(|_| GitError::BinaryNotFound)
}

fn run<S: AsRef<OsStr>>(
    bin: &Path,
    dir: &Path,
    args: &[S],
    timeout: Duration,
) -> Result<Output, GitError> {
    let description = describe(bin, args);
    tracing::debug!("{}$ {description}", dir.display());
    let mut command = Command::new(bin);
    command
        .args(args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .env("LC_ALL", "C");
    run_with_timeout(command, &description, timeout)
}

fn check<S: AsRef<OsStr>>(out: Output, bin: &Path, args: &[S]) -> Result<Output, GitError> {
    if out.status.success() {
        Ok(out)
    } else {
        Err(GitError::CommandFailed {
            command: describe(bin, args),
            code: out.status.code(),
            stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
        })
    }
}

fn stdout_line(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).trim().to_string()
}
