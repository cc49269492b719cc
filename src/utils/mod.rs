//! Utility functions for string formatting.

pub mod format;

pub use format::{format_age, mask_secret, truncate_string};
