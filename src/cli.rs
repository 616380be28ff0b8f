use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ytbridge")]
#[command(author, version, about = "Stream resolution and range-seekable playback proxy")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Start {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config and PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Resolve a video once and print the stream description
    Resolve {
        /// Video identifier
        #[arg(required = true)]
        id: String,

        /// Format policy (h264_mp4, best, webm, data_saver)
        #[arg(long)]
        policy: Option<String>,

        /// Exact format id; overrides the policy
        #[arg(long)]
        itag: Option<String>,
    },

    /// List every format the resolver reports for a video
    Formats {
        /// Video identifier
        #[arg(required = true)]
        id: String,
    },

    /// Check that the resolver tool is available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses --config if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
