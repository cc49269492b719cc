//! Gatekeeper - login, session storage and navigation gating for a backend
//! reached over a single authentication endpoint.
//!
//! - `auth`: credentials, the session store, and the login/logout client
//! - `api`: the HTTP exchange with the backend
//! - `routes`: route table, guard and router
//! - `app` / `ui`: terminal front-end state and rendering
//! - `config`: persisted settings

pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod routes;
pub mod ui;
pub mod utils;

pub use app::{App, AppState, LoginForm, Sidebar, ValidationError};
pub use auth::{AuthClient, AuthError, Credentials, FileSessionStore, MemorySessionStore, Session, SessionStore};
pub use config::Config;
pub use routes::{Navigation, Route, RouteGuard, Router, View};
