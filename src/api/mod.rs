//! REST API client module for the authentication backend.
//!
//! This module provides the `ApiClient` for the single login exchange
//! (`POST {backend}/authentication`) and the `ApiError` type describing
//! how that exchange can fail.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::{ApiError, ErrorBody};
