//! Authentication module for managing user sessions.
//!
//! This module provides:
//! - `Credentials`: the per-attempt identifier/secret pair
//! - `SessionStore`: durable token storage, with file and in-memory backends
//! - `AuthClient`: the login exchange and local logout
//!
//! Sessions never expire locally; the backend decides whether a token is
//! still good on every protected request.

pub mod client;
pub mod credentials;
pub mod session;

pub use client::{AuthClient, AuthError};
pub use credentials::Credentials;
pub use session::{FileSessionStore, MemorySessionStore, Session, SessionStore, StoreError};
