use serde::Serialize;

/// Compile time facts about the running binary
///
/// Built with [`build_info!`](crate::build_info) in the binary crate so the
///  values come from that crate's build script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildInfo {
    pub version: &'static str,
    pub repo_version: &'static str,
    pub build_profile: &'static str,
    pub build_features: &'static str,
    pub build_timestamp: &'static str,
    pub rust_version: &'static str,
}

impl std::fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}, {} build, features: {}, built {} with {})",
            self.version,
            self.repo_version,
            self.build_profile,
            self.build_features,
            self.build_timestamp,
            self.rust_version
        )
    }
}

/// Collect [`BuildInfo`] from the calling crate's build environment.
///  Values its build script did not set read as `unknown`.
#[macro_export]
macro_rules! build_info {
    () => {
        $crate::version::BuildInfo {
            version: env!("CARGO_PKG_VERSION"),
            repo_version: match option_env!("REPO_VERSION") {
                Some(v) => v,
                None => "unknown",
            },
            build_profile: match option_env!("BUILD_PROFILE") {
                Some(v) => v,
                None => "unknown",
            },
            build_features: match option_env!("BUILD_FEATURES") {
                Some(v) => v,
                None => "none",
            },
            build_timestamp: match option_env!("BUILD_TIMESTAMP") {
                Some(v) => v,
                None => "unknown",
            },
            rust_version: match option_env!("RUST_VERSION") {
                Some(v) => v,
                None => "unknown",
            },
        }
    };
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_build_info_falls_back() {
        let info = crate::build_info!();
        assert_eq!(info.version, env!("CARGO_PKG_VERSION"));
        assert!(info.to_string().starts_with(info.version));
    }
}
