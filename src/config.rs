//! Runtime configuration.
//!
//! The teacher's examples hardcode their listen address as a `const`; this server keeps that
//! shape (sane compiled-in defaults) but layers environment-variable overrides on top, since a
//! server meant to actually run somewhere needs that much configurability without reaching for a
//! CLI-argument framework the rest of the crate has no other use for.

use std::path::PathBuf;

/// Default TCP port, per spec §6.
pub const DEFAULT_PORT: u16 = 9000;
/// Default idle-connection keep-alive timeout, in milliseconds, per spec §6.
pub const DEFAULT_KEEPALIVE_MS: u64 = 10_000;
/// Default worker threads per CPU core, per spec §4.3.
pub const DEFAULT_THREADS_PER_CORE: usize = 64;
/// Default static-file document root.
pub const DEFAULT_DOCUMENT_ROOT: &str = ".";

/// Server configuration, resolved once at startup from compiled-in defaults overridden by
/// environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// TCP port to listen on.
    pub port: u16,
    /// Idle-connection timeout, in milliseconds.
    pub keepalive_ms: u64,
    /// Worker pool size, expressed as threads per CPU core.
    pub threads_per_core: usize,
    /// Root directory static file requests are resolved against.
    pub document_root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: DEFAULT_PORT,
            keepalive_ms: DEFAULT_KEEPALIVE_MS,
            threads_per_core: DEFAULT_THREADS_PER_CORE,
            document_root: PathBuf::from(DEFAULT_DOCUMENT_ROOT),
        }
    }
}

impl Config {
    /// Builds a `Config` from compiled-in defaults, overridden by `MAESTRO_PORT`,
    /// `MAESTRO_KEEPALIVE_MS`, `MAESTRO_THREADS_PER_CORE`, and `MAESTRO_DOCUMENT_ROOT` when set
    /// and parseable. An unparseable override is ignored, falling back to the default rather
    /// than failing startup over it.
    pub fn from_env() -> Self {
        let defaults = Config::default();
        Config {
            port: env_parsed("MAESTRO_PORT").unwrap_or(defaults.port),
            keepalive_ms: env_parsed("MAESTRO_KEEPALIVE_MS").unwrap_or(defaults.keepalive_ms),
            threads_per_core: env_parsed("MAESTRO_THREADS_PER_CORE")
                .unwrap_or(defaults.threads_per_core),
            document_root: std::env::var("MAESTRO_DOCUMENT_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.document_root),
        }
    }
}

fn env_parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_values() {
        let config = Config::default();
        assert_eq!(config.port, 9000);
        assert_eq!(config.keepalive_ms, 10_000);
        assert_eq!(config.threads_per_core, 64);
    }

    #[test]
    fn unset_env_vars_fall_back_to_defaults() {
        std::env::remove_var("MAESTRO_PORT");
        let config = Config::from_env();
        assert_eq!(config.port, DEFAULT_PORT);
    }
}
