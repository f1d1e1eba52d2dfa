//! Build script for dcr-review
//!
//! Embeds build identification (`GIT_HASH`, `BUILD_TIMESTAMP`,
//! `BUILD_PROFILE`) for the startup log line and `/api/buildinfo`.

use std::process::Command;

/// Short commit hash, `None` outside a git checkout or without git
fn git_short_hash() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short=8", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let hash = String::from_utf8(output.stdout).ok()?;
    Some(hash.trim().to_string())
}

fn emit(key: &str, value: &str) {
    println!("cargo:rustc-env={}={}", key, value);
}

fn main() {
    emit("GIT_HASH", &git_short_hash().unwrap_or_else(|| "unknown".into()));
    emit(
        "BUILD_TIMESTAMP",
        &chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
    );
    emit(
        "BUILD_PROFILE",
        &std::env::var("PROFILE").unwrap_or_else(|_| "unknown".into()),
    );

    println!("cargo:rerun-if-changed=ui");
    println!("cargo:rerun-if-changed=../.git/HEAD");
}
