//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries the
//! server, resolver, cache, playback and catalog sections. Every section
//! defaults sensibly so a completely empty `{}` file is valid. Deployment
//! environment variables are layered on top by [`Config::apply_env`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::{Error, Policy};

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub resolver: ResolverConfig,
    pub cache: CacheConfig,
    pub playback: PlaybackConfig,
    pub catalog: CatalogConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Overlay deployment environment variables on top of this config.
    pub fn apply_env(&mut self) {
        self.apply_vars(|name| std::env::var(name).ok());
    }

    /// Overlay variables from an arbitrary lookup. Empty values are ignored
    /// and unparsable numbers leave the current value in place.
    pub fn apply_vars<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(port) = get("PORT").and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }
        if let Some(provider) = get("BACKEND_PROVIDER") {
            self.catalog.provider = provider.to_ascii_lowercase();
        }
        if let Some(base) = get("BACKEND_BASE") {
            self.catalog.base_url = base.trim_end_matches('/').to_string();
        }
        if let Some(mode) = get("YTDLP_MODE") {
            self.resolver.mode = mode.to_ascii_lowercase();
        }
        // YTDLP_BIN wins over YTDLP_CMD when both are set.
        if let Some(cmd) = get("YTDLP_BIN").or_else(|| get("YTDLP_CMD")) {
            self.resolver.tool_path = PathBuf::from(cmd);
        }
        if let Some(url) = get("YTDLP_REMOTE_URL") {
            self.resolver.remote_url = Some(url);
        }
        if let Some(cookies) = get("YTDLP_COOKIES") {
            self.resolver.cookies_file = Some(PathBuf::from(cookies));
        }
        if let Some(net) = get("YTDLP_NET") {
            self.resolver.net = net.to_ascii_lowercase();
        }
        if let Some(args) = get("YTDLP_ARGS") {
            self.resolver.extra_args = Some(args);
        }
        if let Some(sb) = get("SPONSORBLOCK") {
            self.resolver.sponsorblock = matches!(sb.to_ascii_lowercase().as_str(), "true" | "1" | "yes");
        }
        if let Some(ttl) = get("CACHE_TTL").and_then(|v| v.parse().ok()) {
            self.cache.lifetime_secs = ttl;
        }
        if let Some(mode) = get("STREAM_MODE") {
            self.playback.mode = mode.to_ascii_lowercase();
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0; a random port will be assigned".into());
        }

        match self.resolver.mode.as_str() {
            "local" => {}
            "remote" => {
                if self.resolver.remote_url.is_none() {
                    warnings.push("resolver.mode is remote but resolver.remote_url is not set".into());
                }
            }
            other => warnings.push(format!(
                "resolver.mode '{other}' is not recognized (valid: local, remote)"
            )),
        }

        let nets = ["ipv4", "ipv6", "auto"];
        if !nets.contains(&self.resolver.net.as_str()) {
            warnings.push(format!(
                "resolver.net '{}' is not recognized (valid: {})",
                self.resolver.net,
                nets.join(", ")
            ));
        }

        if let Some(ref cookies) = self.resolver.cookies_file {
            if !cookies.exists() {
                warnings.push(format!(
                    "resolver.cookies_file {} does not exist",
                    cookies.display()
                ));
            }
        }

        if self.resolver.timeout_secs == 0 {
            warnings.push("resolver.timeout_secs is 0; every resolution will time out".into());
        }

        if self.cache.lifetime_secs == 0 {
            warnings.push("cache.lifetime_secs is 0; resolutions will never be reused".into());
        } else if self.cache.lifetime_secs > MAX_LIFETIME_SECS {
            warnings.push(format!(
                "cache.lifetime_secs {} exceeds the {MAX_LIFETIME_SECS}s link lifetime; clamped",
                self.cache.lifetime_secs
            ));
        }

        if self.playback.default_policy.parse::<Policy>().is_err() {
            warnings.push(format!(
                "playback.default_policy '{}' is not a known policy",
                self.playback.default_policy
            ));
        }

        let modes = ["proxy", "redirect"];
        if !modes.contains(&self.playback.mode.as_str()) {
            warnings.push(format!(
                "playback.mode '{}' is not recognized (valid: {})",
                self.playback.mode,
                modes.join(", ")
            ));
        }

        let providers = ["invidious", "piped", "none"];
        if !providers.contains(&self.catalog.provider.as_str()) {
            warnings.push(format!(
                "catalog.provider '{}' is not recognized (valid: {})",
                self.catalog.provider,
                providers.join(", ")
            ));
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
        }
    }
}

/// External resolver tool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// `local` runs the tool as a subprocess, `remote` delegates over HTTP.
    pub mode: String,
    pub tool_path: PathBuf,
    pub remote_url: Option<String>,
    /// Cookie jar passed to the tool for gated content.
    pub cookies_file: Option<PathBuf>,
    /// Ask the tool to mark sponsor segments as chapters.
    pub sponsorblock: bool,
    /// `ipv4`, `ipv6` or `auto`.
    pub net: String,
    /// Extra tool arguments, shell-quoted.
    pub extra_args: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            mode: "local".into(),
            tool_path: PathBuf::from("yt-dlp"),
            remote_url: None,
            cookies_file: None,
            sponsorblock: true,
            net: "ipv4".into(),
            extra_args: None,
            timeout_secs: 60,
        }
    }
}

impl ResolverConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Upper bound on a cached resolution's lifetime. Signed media links stop
/// working after roughly six hours.
pub const MAX_LIFETIME_SECS: u64 = 6 * 3600;

/// Resolution cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub lifetime_secs: u64,
    pub purge_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            lifetime_secs: 5 * 3600,
            purge_interval_secs: 300,
        }
    }
}

impl CacheConfig {
    /// The record lifetime, clamped to [`MAX_LIFETIME_SECS`].
    pub fn lifetime(&self) -> chrono::TimeDelta {
        let secs = self.lifetime_secs.min(MAX_LIFETIME_SECS);
        i64::try_from(secs)
            .ok()
            .and_then(chrono::TimeDelta::try_seconds)
            .unwrap_or_else(|| chrono::TimeDelta::seconds(MAX_LIFETIME_SECS as i64))
    }
}

/// Playback proxy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub default_policy: String,
    /// `proxy` relays bytes, `redirect` answers with a 302 to the source.
    pub mode: String,
    pub connect_timeout_secs: u64,
    pub response_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            default_policy: Policy::default().to_string(),
            mode: "proxy".into(),
            connect_timeout_secs: 10,
            response_timeout_secs: 20,
            idle_timeout_secs: 30,
        }
    }
}

impl PlaybackConfig {
    /// The configured default policy, or the built-in one if the name is
    /// not in the policy table.
    pub fn default_policy(&self) -> Policy {
        self.default_policy.parse().unwrap_or_default()
    }

    pub fn redirect(&self) -> bool {
        self.mode == "redirect"
    }
}

/// Catalog lookup service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// `invidious`, `piped` or `none`.
    pub provider: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            provider: "invidious".into(),
            base_url: "https://yewtu.be".into(),
            timeout_secs: 15,
        }
    }
}
