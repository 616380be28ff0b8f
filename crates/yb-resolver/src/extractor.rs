//! Obtaining the tool's video description, locally or from a remote service.
//!
//! Local mode runs the tool as a subprocess with a fixed quiet argument set
//! so stdout carries only JSON. Remote mode asks an HTTP service wrapping the
//! same tool and expects the same JSON back.

use std::path::PathBuf;
use std::time::Duration;

use yb_core::config::ResolverConfig;
use yb_core::{Error, Result};

use crate::classify::{classify, looks_like_network_failure};
use crate::command::ToolCommand;
use crate::info::{parse_tool_output, VideoInfo};

/// Arguments that keep stdout clean JSON.
const QUIET_ARGS: &[&str] = &["-J", "--ignore-config", "--no-warnings", "--no-progress"];

/// Characters of stderr kept in error messages.
const STDERR_TAIL: usize = 220;

/// Canonical watch page URL for a video identifier.
pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={video_id}")
}

// ---------------------------------------------------------------------------
// Network preference
// ---------------------------------------------------------------------------

/// IP family forced on the tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpFamily {
    V4,
    V6,
}

impl IpFamily {
    fn flag(self) -> &'static str {
        match self {
            IpFamily::V4 => "--force-ipv4",
            IpFamily::V6 => "--force-ipv6",
        }
    }
}

/// `ipv4` runs once over IPv4. `ipv6` and `auto` try one family and fall
/// back to the other on a network failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetPreference {
    #[default]
    Ipv4,
    Ipv6,
    Auto,
}

impl NetPreference {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "ipv6" => NetPreference::Ipv6,
            "auto" => NetPreference::Auto,
            _ => NetPreference::Ipv4,
        }
    }

    /// Attempts in order. `None` means no family flag is passed.
    fn attempts(self, extra_args: &[String]) -> Vec<Option<IpFamily>> {
        // Explicit flags in the extra args are respected as given.
        if extra_args
            .iter()
            .any(|a| a == "--force-ipv4" || a == "--force-ipv6")
        {
            return vec![None];
        }
        match self {
            NetPreference::Ipv4 => vec![Some(IpFamily::V4)],
            NetPreference::Ipv6 => vec![Some(IpFamily::V6), Some(IpFamily::V4)],
            NetPreference::Auto => vec![Some(IpFamily::V4), Some(IpFamily::V6)],
        }
    }
}

// ---------------------------------------------------------------------------
// Local
// ---------------------------------------------------------------------------

/// Runs the tool as a subprocess.
#[derive(Debug, Clone)]
pub struct LocalExtractor {
    pub tool_path: PathBuf,
    pub cookies_file: Option<PathBuf>,
    pub sponsorblock: bool,
    pub net: NetPreference,
    pub extra_args: Vec<String>,
    pub timeout: Duration,
}

impl LocalExtractor {
    pub fn from_config(cfg: &ResolverConfig) -> Result<Self> {
        let extra_args = match cfg.extra_args.as_deref() {
            Some(raw) => shell_words::split(raw)
                .map_err(|e| Error::Validation(format!("resolver.extra_args: {e}")))?,
            None => Vec::new(),
        };
        Ok(Self {
            tool_path: cfg.tool_path.clone(),
            cookies_file: cfg.cookies_file.clone(),
            sponsorblock: cfg.sponsorblock,
            net: NetPreference::parse(&cfg.net),
            extra_args,
            timeout: cfg.timeout(),
        })
    }

    /// Build the command for one attempt.
    pub fn command(&self, video_id: &str, family: Option<IpFamily>) -> ToolCommand {
        let mut cmd = ToolCommand::new(self.tool_path.clone());
        cmd.args(QUIET_ARGS.iter().copied()).timeout(self.timeout);
        if let Some(family) = family {
            cmd.arg(family.flag());
        }
        cmd.args(self.extra_args.iter().cloned());
        if let Some(ref cookies) = self.cookies_file {
            cmd.arg("--cookies").arg(cookies.to_string_lossy());
        }
        if self.sponsorblock {
            cmd.arg("--sponsorblock-mark").arg("all");
        }
        cmd.arg(watch_url(video_id));
        cmd
    }

    pub async fn dump(&self, video_id: &str) -> Result<VideoInfo> {
        let attempts = self.net.attempts(&self.extra_args);
        let last = attempts.len() - 1;

        for (i, family) in attempts.into_iter().enumerate() {
            match self.run(video_id, family).await {
                Err(Error::UpstreamUnavailable(msg)) if i < last => {
                    tracing::warn!(video_id, ?family, error = %msg, "network failure, retrying with other IP family");
                }
                other => return other,
            }
        }
        Err(Error::Internal("no resolver attempts were made".into()))
    }

    async fn run(&self, video_id: &str, family: Option<IpFamily>) -> Result<VideoInfo> {
        let cmd = self.command(video_id, family);
        let tool = cmd.program_name();
        tracing::debug!(video_id, args = ?cmd.get_args(), "invoking resolver tool");

        let output = cmd.execute().await?;
        let tail = output.stderr_tail(STDERR_TAIL);

        let stdout = output.stdout.trim();
        if stdout.is_empty() || stdout == "null" {
            let hint = if looks_like_network_failure(&output.stderr) {
                "network error"
            } else {
                "no output"
            };
            return Err(match classify(&tool, &output.stderr, &tail) {
                Error::ToolFailure { .. } => Error::tool(
                    tool,
                    format!("returned no data ({hint}, {}). {tail}", output.status),
                ),
                classified => classified,
            });
        }

        match parse_tool_output(&tool, stdout) {
            Ok(info) => Ok(info),
            Err(_) if !output.status.success() && !tail.is_empty() => {
                Err(classify(&tool, &output.stderr, &tail))
            }
            Err(e) => Err(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Remote
// ---------------------------------------------------------------------------

/// Delegates to an HTTP service: `GET {url}?url=…&cookies=…&sponsorblock=all`.
#[derive(Debug, Clone)]
pub struct RemoteExtractor {
    client: reqwest::Client,
    url: String,
    cookies_file: Option<PathBuf>,
    sponsorblock: bool,
}

impl RemoteExtractor {
    pub fn from_config(cfg: &ResolverConfig) -> Result<Self> {
        let url = cfg
            .remote_url
            .clone()
            .ok_or_else(|| Error::Validation("resolver.remote_url is not set for remote mode".into()))?;
        let client = reqwest::Client::builder()
            .timeout(cfg.timeout())
            .build()
            .map_err(|e| Error::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url,
            cookies_file: cfg.cookies_file.clone(),
            sponsorblock: cfg.sponsorblock,
        })
    }

    pub async fn dump(&self, video_id: &str) -> Result<VideoInfo> {
        let mut query = vec![("url".to_string(), watch_url(video_id))];
        if let Some(ref cookies) = self.cookies_file {
            query.push(("cookies".into(), cookies.to_string_lossy().to_string()));
        }
        if self.sponsorblock {
            query.push(("sponsorblock".into(), "all".into()));
        }

        tracing::debug!(video_id, url = %self.url, "querying remote resolver");
        let resp = self
            .client
            .get(&self.url)
            .query(&query)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(format!("remote resolver: {e}"))
                } else {
                    Error::upstream(format!("remote resolver: {e}"))
                }
            })?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::upstream(format!("remote resolver body: {e}")))?;

        if !status.is_success() {
            let snippet: String = body.chars().take(200).collect();
            return Err(match classify("remote", &body, &snippet) {
                Error::ToolFailure { .. } if status.as_u16() == 404 => Error::NotFound(snippet),
                Error::ToolFailure { .. } => {
                    Error::upstream(format!("remote resolver status {status}: {snippet}"))
                }
                classified => classified,
            });
        }

        parse_tool_output("remote", &body)
    }
}

// ---------------------------------------------------------------------------
// Extractor
// ---------------------------------------------------------------------------

/// The configured way of obtaining a [`VideoInfo`].
#[derive(Debug, Clone)]
pub enum Extractor {
    Local(LocalExtractor),
    Remote(RemoteExtractor),
}

impl Extractor {
    pub fn from_config(cfg: &ResolverConfig) -> Result<Self> {
        match cfg.mode.as_str() {
            "remote" => Ok(Extractor::Remote(RemoteExtractor::from_config(cfg)?)),
            "local" => Ok(Extractor::Local(LocalExtractor::from_config(cfg)?)),
            other => Err(Error::Validation(format!(
                "resolver.mode '{other}' is not recognized (valid: local, remote)"
            ))),
        }
    }

    pub async fn dump(&self, video_id: &str) -> Result<VideoInfo> {
        match self {
            Extractor::Local(local) => local.dump(video_id).await,
            Extractor::Remote(remote) => remote.dump(video_id).await,
        }
    }
}
