#[cfg(feature = "logger")]
/// This module provides a logging item writer, handy to inspect rows flowing through a step.
pub mod logger;

/// This module provides the dialect-driven CSV reader and writer.
pub mod csv;
