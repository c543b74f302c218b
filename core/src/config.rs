//! Session configuration.
//!
//! A `Config` is supplied once when a session is built and is immutable
//! afterwards. It deserializes with per-field defaults, so hosts can load it
//! from whatever serde format they already use, or from the environment via
//! `Config::from_env`.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "https://api.shop.example.com/api/v1/";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Where the authentication token is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TokenStorage {
    /// Lost when the session is dropped.
    Memory,
    /// `<dir>/<namespace>.json`; `dir` defaults to the platform data directory.
    File {
        #[serde(default)]
        dir: Option<PathBuf>,
        #[serde(default = "default_namespace")]
        namespace: String,
    },
}

impl Default for TokenStorage {
    fn default() -> Self {
        TokenStorage::File {
            dir: None,
            namespace: default_namespace(),
        }
    }
}

fn default_namespace() -> String {
    crate::token_store::DEFAULT_NAMESPACE.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    /// Accepted but never sent with any request.
    pub api_key: Option<String>,
    /// Applied to connecting and to each whole request.
    pub timeout_seconds: u64,
    /// Log request and response bodies at debug level.
    pub debug: bool,
    pub storage: TokenStorage,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            debug: false,
            storage: TokenStorage::default(),
        }
    }
}

impl Config {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            ..Self::default()
        }
    }

    /// Defaults overridden by `SHOP_SDK_BASE_URL`, `SHOP_SDK_API_KEY`,
    /// `SHOP_SDK_TIMEOUT_SECONDS` and `SHOP_SDK_DEBUG`. Unparsable numeric or
    /// boolean values keep the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(url) = lookup("SHOP_SDK_BASE_URL") {
            config.base_url = url;
        }
        config.api_key = lookup("SHOP_SDK_API_KEY").filter(|k| !k.is_empty());
        if let Some(secs) = lookup("SHOP_SDK_TIMEOUT_SECONDS").and_then(|v| v.parse().ok()) {
            config.timeout_seconds = secs;
        }
        if let Some(debug) = lookup("SHOP_SDK_DEBUG") {
            config.debug = matches!(debug.as_str(), "1" | "true" | "TRUE" | "yes");
        }
        config
    }

    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.api_key = Some(api_key.to_string());
        self
    }

    pub fn with_timeout_seconds(mut self, secs: u64) -> Self {
        self.timeout_seconds = secs;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_storage(mut self, storage: TokenStorage) -> Self {
        self.storage = storage;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}
