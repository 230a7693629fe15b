use std::process::Command;

/// Run git and return its trimmed stdout, if it succeeded
fn git(args: &[&str]) -> Option<String> {
    Command::new("git")
        .args(args)
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
}

fn main() {
    // Build metadata logged by the daemon at startup
    if let Some(desc) = git(&["describe", "--always", "--dirty", "--tags"]) {
        println!("cargo:rustc-env=GIT_DESC={}", desc);
    }
    if let Some(hash) = git(&["rev-parse", "--short", "HEAD"]) {
        println!("cargo:rustc-env=GIT_HASH={}", hash);
    }

    println!("cargo:rustc-env=BUILD_TIME={}", chrono::Utc::now().to_rfc3339());
    println!("cargo:rerun-if-changed=build.rs");
}
