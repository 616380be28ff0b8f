mod cli;

use std::path::Path;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use yb_core::config::Config;
use yb_core::Selector;
use yb_resolver::{check_tool, Resolver, ToolResolver};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise the verbose flag picks the level.
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "ytbridge=trace,yb_server=debug,yb_resolver=debug,yb_core=debug,tower_http=debug".to_string()
        } else {
            "ytbridge=info,yb_server=info,yb_resolver=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt().with_env_filter(&env_filter).init();

    match cli.command {
        Commands::Start { host, port } => {
            let mut config = load_config(cli.config.as_deref());
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(yb_server::start(config))?;
            Ok(())
        }
        Commands::Resolve { id, policy, itag } => {
            let config = load_config(cli.config.as_deref());
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(resolve(&config, &id, policy.as_deref(), itag.as_deref()))
        }
        Commands::Formats { id } => {
            let config = load_config(cli.config.as_deref());
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(formats(&config, &id))
        }
        Commands::CheckTools => check_tools(&load_config(cli.config.as_deref())),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("ytbridge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// File (if any), then environment overrides.
fn load_config(path: Option<&Path>) -> Config {
    let mut config = Config::load_or_default(path);
    config.apply_env();
    config
}

async fn resolve(config: &Config, id: &str, policy: Option<&str>, itag: Option<&str>) -> Result<()> {
    let selector = Selector::from_query(policy, itag, config.playback.default_policy())?;
    let resolver = ToolResolver::from_config(&config.resolver, &config.cache)?;

    let record = resolver.resolve(id, &selector).await?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

async fn formats(config: &Config, id: &str) -> Result<()> {
    let resolver = ToolResolver::from_config(&config.resolver, &config.cache)?;
    let listing = resolver.list_formats(id).await?;

    if let Some(title) = &listing.title {
        println!("{title}");
    }
    for f in &listing.formats {
        let kind = match (f.has_video, f.has_audio) {
            (true, true) => "av",
            (true, false) => "v",
            (false, true) => "a",
            (false, false) => "-",
        };
        println!(
            "{:>8}  {:<5} {:<3} {:>5}  {:>8}  {}",
            f.itag,
            f.ext.as_deref().unwrap_or("?"),
            kind,
            f.height.map(|h| format!("{h}p")).unwrap_or_default(),
            f.tbr.map(|t| format!("{t:.0}k")).unwrap_or_default(),
            f.quality_label.as_deref().unwrap_or(""),
        );
    }
    Ok(())
}

fn check_tools(config: &Config) -> Result<()> {
    println!("Checking resolver tool...\n");

    let tool = check_tool(&config.resolver);
    let status = if tool.available { "✓" } else { "✗" };
    print!("{} {}", status, tool.name);
    if let Some(ref version) = tool.version {
        print!(" ({version})");
    }
    if let Some(ref path) = tool.path {
        print!(" - {}", path.display());
    }
    println!();

    if let Some(ref cookies) = config.resolver.cookies_file {
        let present = cookies.is_file();
        println!(
            "{} cookies - {}",
            if present { "✓" } else { "✗" },
            cookies.display()
        );
    }

    println!();
    if tool.available {
        println!("Resolver is available.");
    } else {
        println!("Resolver is missing. Install yt-dlp or set YTDLP_MODE=remote.");
    }
    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {}", p.display());
            let contents = std::fs::read_to_string(p)?;
            let mut config = Config::from_json(&contents)?;
            config.apply_env();
            config
        }
        None => {
            println!("No config file specified, using defaults and environment");
            load_config(None)
        }
    };

    let warnings = config.validate();
    if warnings.is_empty() {
        println!("✓ Configuration is valid");
    } else {
        for w in &warnings {
            println!("⚠ {w}");
        }
    }
    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!("  Resolver: {} ({})", config.resolver.mode, config.resolver.tool_path.display());
    println!("  Catalog: {} ({})", config.catalog.provider, config.catalog.base_url);
    println!("  Playback: {} (default policy {})", config.playback.mode, config.playback.default_policy());
    println!("  Cache lifetime: {}s", config.cache.lifetime_secs);
    Ok(())
}
