//! Startup configuration for the adapter.

use std::time::Duration;

use crate::error::Error;

/// 50 MiB, the default cap on request bodies.
pub const DEFAULT_BODY_LIMIT: usize = 50 * 1024 * 1024;

/// Adapter-wide settings. Per-route values take precedence.
#[derive(Clone, Debug)]
pub struct AdapterConfig {
    pub(crate) base_path: String,
    pub(crate) timeout: Option<Duration>,
    pub(crate) body_limit: usize,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self { base_path: String::new(), timeout: None, body_limit: DEFAULT_BODY_LIMIT }
    }
}

impl AdapterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefix joined onto every route path.
    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    /// Timeout applied to routes that do not set their own.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }

    pub fn base_path(&self) -> &str { &self.base_path }
    pub fn timeout(&self) -> Option<Duration> { self.timeout }
    pub fn body_limit(&self) -> usize { self.body_limit }

    /// Reads `MEDIAROUTE_BASE_PATH`, `MEDIAROUTE_TIMEOUT_MS` and
    /// `MEDIAROUTE_BODY_LIMIT` from the environment.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom variable source.
    /// Unset variables keep their defaults; unparsable numbers are an error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let mut config = Self::default();
        if let Some(base_path) = lookup("MEDIAROUTE_BASE_PATH") {
            config.base_path = base_path;
        }
        if let Some(ms) = lookup("MEDIAROUTE_TIMEOUT_MS") {
            config.timeout = Some(Duration::from_millis(parse_number("MEDIAROUTE_TIMEOUT_MS", &ms)?));
        }
        if let Some(bytes) = lookup("MEDIAROUTE_BODY_LIMIT") {
            config.body_limit = parse_number("MEDIAROUTE_BODY_LIMIT", &bytes)?;
        }
        Ok(config)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, Error> {
    raw.trim()
        .parse()
        .map_err(|_| Error::Configuration(format!("{key}: `{raw}` is not a valid number")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn lookup_overrides_defaults() {
        let vars = HashMap::from([
            ("MEDIAROUTE_BASE_PATH", "/api"),
            ("MEDIAROUTE_TIMEOUT_MS", "1500"),
        ]);
        let config = AdapterConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.base_path(), "/api");
        assert_eq!(config.timeout(), Some(Duration::from_millis(1500)));
        assert_eq!(config.body_limit(), DEFAULT_BODY_LIMIT);
    }

    #[test]
    fn bad_numbers_are_rejected() {
        let err = AdapterConfig::from_lookup(|k| (k == "MEDIAROUTE_BODY_LIMIT").then(|| "lots".to_owned()));
        assert!(matches!(err, Err(Error::Configuration(msg)) if msg.contains("MEDIAROUTE_BODY_LIMIT")));
    }
}
