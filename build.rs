//! Embeds build metadata reported by the local health endpoint.
//!
//! Sets `FRONTDOOR_GIT_SHORT` and `FRONTDOOR_BUILD_PROFILE` for `env!()`.
//! Container builds without `.git` pass the commit through
//! `FRONTDOOR_GIT_SHORT_OVERRIDE`; otherwise it falls back to `"unknown"`.

use std::process::Command;

fn git_short() -> String {
    std::env::var("FRONTDOOR_GIT_SHORT_OVERRIDE")
        .ok()
        .filter(|s| !s.is_empty() && s != "unknown")
        .unwrap_or_else(|| {
            Command::new("git")
                .args(["rev-parse", "--short", "HEAD"])
                .output()
                .ok()
                .filter(|o| o.status.success())
                .and_then(|o| String::from_utf8(o.stdout).ok())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "unknown".into())
        })
}

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs");
    println!("cargo:rerun-if-env-changed=FRONTDOOR_GIT_SHORT_OVERRIDE");

    println!("cargo:rustc-env=FRONTDOOR_GIT_SHORT={}", git_short());

    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "unknown".into());
    println!("cargo:rustc-env=FRONTDOOR_BUILD_PROFILE={profile}");
}
