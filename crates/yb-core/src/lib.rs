//! yb-core: shared types, errors, configuration, and format policies.
//!
//! This crate is the foundational dependency for the other yb-* crates. It
//! defines the unified error type, the resolved [`StreamRecord`] and the
//! [`ResolutionKey`] it is cached under, the closed [`Policy`] table with its [`Selector`], and the
//! application configuration.

pub mod config;
pub mod error;
pub mod policy;
pub mod stream;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use policy::{Policy, Selector};
pub use stream::*;
