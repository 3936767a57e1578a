//! Stamps the binary with a build id shown by `ekstre --version`.
//!
//! `EKSTRE_BUILD_ID` in the environment wins (source tarballs have no
//! `.git`); otherwise `git describe` of the workspace, else "unknown".

use std::path::Path;
use std::process::Command;

const OVERRIDE: &str = "EKSTRE_BUILD_ID";

fn describe(workspace: &Path) -> Option<String> {
    let out = Command::new("git")
        .arg("-C")
        .arg(workspace)
        .args(["describe", "--always", "--dirty", "--abbrev=10"])
        .output()
        .ok()?;
    if !out.status.success() {
        return None;
    }
    let id = String::from_utf8(out.stdout).ok()?.trim().to_string();
    (!id.is_empty()).then_some(id)
}

fn main() {
    let manifest = std::env::var_os("CARGO_MANIFEST_DIR").unwrap_or_else(|| ".".into());
    let workspace = Path::new(&manifest).join("..");

    println!("cargo:rerun-if-env-changed={OVERRIDE}");
    let head = workspace.join(".git").join("HEAD");
    if head.exists() {
        println!("cargo:rerun-if-changed={}", head.display());
    }

    let id = std::env::var(OVERRIDE)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| describe(&workspace))
        .unwrap_or_else(|| "unknown".to_string());
    println!("cargo:rustc-env={OVERRIDE}={id}");
}
