//! Stamps the bridge binary with its version and commit.
//!
//! `FBB_VERSION` wins; otherwise the nearest `v*` git tag, then the crate
//! version. `FBB_GIT_SHA` wins; otherwise CI's `GITHUB_SHA`, then `git
//! rev-parse`. Outside a checkout both fall back without failing the build.

use std::process::Command;

fn main() {
    let version = std::env::var("FBB_VERSION")
        .ok()
        .or_else(|| git(&["describe", "--tags", "--match", "v*", "--abbrev=0"]))
        .map(|tag| tag.trim_start_matches('v').to_string())
        .or_else(|| std::env::var("CARGO_PKG_VERSION").ok())
        .unwrap_or_else(|| "unknown".into());
    println!("cargo:rustc-env=FBB_VERSION={}", version);

    let git_sha = std::env::var("FBB_GIT_SHA")
        .ok()
        .or_else(|| {
            std::env::var("GITHUB_SHA")
                .ok()
                .map(|sha| sha.chars().take(7).collect())
        })
        .or_else(|| git(&["rev-parse", "--short", "HEAD"]))
        .unwrap_or_else(|| "unknown".into());
    println!("cargo:rustc-env=FBB_GIT_SHA={}", git_sha);

    for var in ["FBB_VERSION", "FBB_GIT_SHA", "GITHUB_SHA"] {
        println!("cargo:rerun-if-env-changed={}", var);
    }
}

/// Trimmed stdout of a successful git invocation
fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}
