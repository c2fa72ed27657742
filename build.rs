//! Build script: embeds the git short hash for `voxrelay --version`.

use std::process::Command;

fn main() {
    if let Ok(output) = Command::new("git")
        .args(["rev-parse", "--short=7", "HEAD"])
        .output()
    {
        if output.status.success() {
            let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
            println!("cargo:rustc-env=GIT_HASH={}", hash);
        }
    }
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads/");

    if cfg!(feature = "opus") {
        check_opus();
    }
}

/// libopus is either found through pkg-config or built from source with cmake.
fn check_opus() {
    let has_pkg_config = Command::new("pkg-config")
        .args(["--exists", "opus"])
        .status()
        .map(|s| s.success())
        .unwrap_or(false);
    if has_pkg_config {
        return;
    }

    let has_cmake = Command::new("cmake")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false);
    if !has_cmake {
        println!("cargo::warning=Feature 'opus' enabled but neither libopus (pkg-config) nor cmake was found.");
        println!("cargo::warning=Install libopus-dev (Debian/Ubuntu) or opus-devel (Fedora), or cmake.");
    }
}
