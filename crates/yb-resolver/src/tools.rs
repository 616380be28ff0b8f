//! Resolver tool discovery.
//!
//! In local mode the configured tool path may be a bare name looked up on
//! `PATH` (the default `yt-dlp`) or an explicit path. [`check_tool`] reports
//! what was found for the `check-tools` command and for diagnostics.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use yb_core::config::ResolverConfig;

/// Availability information for the resolver tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    /// Tool name as configured.
    pub name: String,
    /// Whether the tool was found.
    pub available: bool,
    /// Version string (first line of `--version` output), if available.
    pub version: Option<String>,
    /// Resolved path to the executable.
    pub path: Option<PathBuf>,
}

/// Locate the tool: an explicit path is used if it exists, anything else is
/// searched on `PATH` with [`which::which`].
pub fn locate_tool(configured: &Path) -> Option<PathBuf> {
    let explicit = configured.components().count() > 1 || configured.is_absolute();
    if explicit {
        return configured.exists().then(|| configured.to_path_buf());
    }
    which::which(configured).ok()
}

/// Check the configured resolver tool.
///
/// In remote mode the local binary is irrelevant; the remote URL is reported
/// as the path and availability reflects whether one is configured.
pub fn check_tool(cfg: &ResolverConfig) -> ToolInfo {
    let name = cfg
        .tool_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| cfg.tool_path.to_string_lossy().to_string());

    if cfg.mode == "remote" {
        return ToolInfo {
            name: "remote".into(),
            available: cfg.remote_url.is_some(),
            version: None,
            path: cfg.remote_url.as_ref().map(PathBuf::from),
        };
    }

    match locate_tool(&cfg.tool_path) {
        Some(path) => ToolInfo {
            name,
            available: true,
            version: detect_version(&path),
            path: Some(path),
        },
        None => ToolInfo {
            name,
            available: false,
            version: None,
            path: None,
        },
    }
}

/// Run `<tool> --version` and return the first line of stdout.
fn detect_version(path: &Path) -> Option<String> {
    let output = std::process::Command::new(path)
        .arg("--version")
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
