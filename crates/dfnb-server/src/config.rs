//! Server configuration from environment variables.
//!
//! - `DFNB_HOST`: listen address (default: "0.0.0.0")
//! - `DFNB_PORT`: listen port (default: 3000)
//! - `DFNB_RECORD_TIMING`: record execution timing metadata (default: false)
//! - `DFNB_ENABLE_TAGS`: send tag references to the backend (default: true)
//! - `DFNB_VIEW_CHANNEL_CAPACITY`: view notification buffer (default: 256)
//! - `DFNB_BACKEND_URL`: kernel bridge new sessions connect to (default: none)
//!
//! Unparseable values fall back to the default with a warning.

use std::str::FromStr;

/// Runtime configuration for the server and the execution coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub record_timing: bool,
    pub enable_tags: bool,
    pub view_channel_capacity: usize,
    /// Base URL of the kernel bridge. Sessions start without a backend if unset.
    pub backend_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 3000,
            record_timing: false,
            enable_tags: true,
            view_channel_capacity: 256,
            backend_url: None,
        }
    }
}

impl ServerConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ServerConfig::default();
        ServerConfig {
            host: lookup("DFNB_HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "DFNB_PORT", defaults.port),
            record_timing: flag_or(&lookup, "DFNB_RECORD_TIMING", defaults.record_timing),
            enable_tags: flag_or(&lookup, "DFNB_ENABLE_TAGS", defaults.enable_tags),
            view_channel_capacity: parse_or(
                &lookup,
                "DFNB_VIEW_CHANNEL_CAPACITY",
                defaults.view_channel_capacity,
            ),
            backend_url: lookup("DFNB_BACKEND_URL")
                .map(|url| url.trim().to_string())
                .filter(|url| !url.is_empty()),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("ignoring invalid {}={:?}", key, raw);
            default
        }),
        None => default,
    }
}

fn flag_or<F>(lookup: &F, key: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
        Some(v) => {
            tracing::warn!("ignoring invalid {}={:?}", key, v);
            default
        }
        None => default,
    }
}
