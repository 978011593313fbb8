use std::env;
use std::process::Command;

/// Trimmed stdout of a command, if it ran and succeeded
fn command_output(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn set_env(key: &str, value: &str) {
    println!("cargo:rustc-env={}={}", key, value);
}

fn report_build_profile() {
    let profile = env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());
    set_env("BUILD_PROFILE", &profile);
}

fn report_enabled_features() {
    let mut features: Vec<String> = env::vars()
        .filter_map(|(key, _)| key.strip_prefix("CARGO_FEATURE_").map(|f| f.to_lowercase()))
        .collect();
    features.sort();

    let features = if features.is_empty() {
        "none".to_string()
    } else {
        features.join(",")
    };
    set_env("BUILD_FEATURES", &features);
}

fn report_repository_version() {
    let version = env::var("CI_BUILD_REF")
        .ok()
        .filter(|v| !v.is_empty())
        .or_else(|| command_output("git", &["describe", "--always", "--dirty", "--long", "--tags"]))
        .or_else(|| command_output("git", &["rev-parse", "--short", "HEAD"]))
        .unwrap_or_else(|| env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "unknown".to_string()));
    set_env("REPO_VERSION", &version);
}

fn report_build_timestamp() {
    set_env("BUILD_TIMESTAMP", &chrono::Utc::now().to_rfc3339());
}

fn report_rust_version() {
    let rust_version = command_output("rustc", &["--version"]).unwrap_or_else(|| "unknown".to_string());
    set_env("RUST_VERSION", &rust_version);
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=migrations");
    println!("cargo:rerun-if-changed=.git/HEAD");

    report_build_profile();
    report_enabled_features();
    report_repository_version();
    report_build_timestamp();
    report_rust_version();
}
