pub mod aws;
pub mod azure;
pub mod browser;
pub mod config;
pub mod console;
pub mod credentials;
pub mod error;
pub mod http_client;
pub mod profile_file;
pub mod saml;
pub mod ui;

pub use error::AuthError;

/// Identifiers stamped into the binary at compile time.
#[derive(Debug, Clone, Copy)]
pub struct BuildInfo {
    pub version: &'static str,
    pub commit: &'static str,
    pub date: &'static str,
}

pub const BUILD_INFO: BuildInfo = BuildInfo {
    version: env!("CARGO_PKG_VERSION"),
    commit: match option_env!("AWS_AZURE_AUTH_COMMIT") {
        Some(commit) => commit,
        None => "none",
    },
    date: match option_env!("AWS_AZURE_AUTH_BUILD_DATE") {
        Some(date) => date,
        None => "unknown",
    },
};

impl std::fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "version: {}, commit: {}, date: {}",
            self.version, self.commit, self.date
        )
    }
}
