//! yb-resolver: external resolver tool invocation and format selection.
//!
//! - [`command`]: subprocess builder with timeouts.
//! - [`tools`]: locating the tool and reporting its version.
//! - [`info`]: the tool's JSON description and tolerant parsing.
//! - [`select`]: policy evaluation and the normalized format listing.
//! - [`classify`]: mapping tool diagnostics onto the error taxonomy.
//! - [`extractor`]: local subprocess and remote HTTP extraction.
//! - [`invoker`]: the [`Resolver`] trait and the tool-backed [`ToolResolver`].

pub mod classify;
pub mod command;
pub mod extractor;
pub mod info;
pub mod invoker;
pub mod select;
pub mod tools;

pub use command::{ToolCommand, ToolOutput};
pub use extractor::{Extractor, LocalExtractor, NetPreference, RemoteExtractor};
pub use invoker::{validate_video_id, FormatListing, Resolver, ToolResolver, DEFAULT_USER_AGENT};
pub use select::FormatEntry;
pub use tools::{check_tool, locate_tool, ToolInfo};
