//! Build-time version capture.
//!
//! Mirrors the external "version-capture step" from the spec: at compile time we
//! try to read the current git commit so `env!("GIT_COMMIT")` is available to the
//! binary. When the crate isn't checked out inside a git repository (vendored
//! tarball, container build context, etc.) we fall back to a stable placeholder
//! instead of failing the build.

use std::process::Command;

fn git_output(args: &[&str]) -> Option<String> {
    let out = Command::new("git").args(args).output().ok()?;
    if !out.status.success() {
        return None;
    }
    let s = String::from_utf8(out.stdout).ok()?;
    let s = s.trim().to_string();
    if s.is_empty() { None } else { Some(s) }
}

fn main() {
    let commit = git_output(&["rev-parse", "--short=12", "HEAD"]).unwrap_or_else(|| "unknown".to_string());
    let branch =
        git_output(&["rev-parse", "--abbrev-ref", "HEAD"]).unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=GIT_COMMIT={commit}");
    println!("cargo:rustc-env=GIT_BRANCH={branch}");
    println!("cargo:rerun-if-changed=.git/HEAD");
}
