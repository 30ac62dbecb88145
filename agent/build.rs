//! Stamps the agent binary with the commit and build time reported by
//! `--version` and the health endpoint.

use chrono::Utc;
use std::process::Command;

/// Packagers building from a tarball set this instead of relying on git.
const HASH_OVERRIDE: &str = "WCD_GIT_HASH";

fn commit_hash() -> String {
    if let Ok(hash) = std::env::var(HASH_OVERRIDE) {
        if !hash.trim().is_empty() {
            return hash.trim().to_string();
        }
    }

    Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|hash| hash.trim().to_string())
        .filter(|hash| !hash.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

fn main() {
    let build_time = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");

    println!("cargo:rustc-env=GIT_HASH={}", commit_hash());
    println!("cargo:rustc-env=BUILD_TIME={}", build_time);

    println!("cargo:rerun-if-env-changed={}", HASH_OVERRIDE);
    println!("cargo:rerun-if-changed=.git/HEAD");
}
