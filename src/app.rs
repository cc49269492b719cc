//! Application state management for Gatekeeper.
//!
//! This module contains the core `App` struct that owns the current view, the
//! login form, the sidebar, and the channel the background login task reports
//! back on.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::auth::{AuthClient, AuthError, Credentials, Session, SessionStore};
use crate::config::Config;
use crate::routes::{Navigation, Route, RouteGuard, Router, View, HOME_PATH, LOGIN_PATH};

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the background login channel.
/// At most one login is in flight, so a handful of slots is plenty.
const CHANNEL_BUFFER_SIZE: usize = 4;

/// Maximum length for identifier input (longest valid email address).
const MAX_IDENTIFIER_LENGTH: usize = 254;

/// Maximum length for secret input.
/// 128 chars accommodates password managers and passphrases.
const MAX_SECRET_LENGTH: usize = 128;

/// Minimum secret length accepted by the login form.
pub const MIN_SECRET_LENGTH: usize = 8;

/// Maximum length for the go-to-path prompt.
const MAX_PATH_INPUT_LENGTH: usize = 256;

// ============================================================================
// UI State Types
// ============================================================================

/// Overall application state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Normal,
    EnteringPath,
    ShowingHelp,
    ConfirmingQuit,
    Quitting,
}

/// Login form focus state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginFocus {
    Identifier,
    Secret,
    Button,
}

impl LoginFocus {
    pub fn next(&self) -> Self {
        match self {
            LoginFocus::Identifier => LoginFocus::Secret,
            LoginFocus::Secret => LoginFocus::Button,
            LoginFocus::Button => LoginFocus::Identifier,
        }
    }

    pub fn prev(&self) -> Self {
        match self {
            LoginFocus::Identifier => LoginFocus::Button,
            LoginFocus::Secret => LoginFocus::Identifier,
            LoginFocus::Button => LoginFocus::Secret,
        }
    }
}

// ============================================================================
// Login Form
// ============================================================================

/// Client-side form constraint that is not met.
///
/// Advisory only; the backend remains the authority on credentials.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Email is required")]
    IdentifierRequired,

    #[error("Password is required")]
    SecretRequired,

    #[error("Password must be at least {} characters", MIN_SECRET_LENGTH)]
    SecretTooShort,
}

/// Result of pressing the login button
#[derive(Debug)]
pub enum SubmitOutcome {
    /// Constraints pass; the credentials should be sent.
    Ready(Credentials),
    /// Constraints fail; nothing is sent.
    Invalid(Vec<ValidationError>),
    /// A login is already in flight.
    Busy,
    /// The previous failure is still displayed and must be cleared first.
    ErrorPending,
}

#[derive(Debug, Clone)]
pub struct LoginForm {
    pub identifier: String,
    pub secret: String,
    pub focus: LoginFocus,
    /// Set on the first submit; field errors are only shown afterwards.
    pub submitted: bool,
    /// Failure message from the last attempt
    pub error: Option<String>,
    in_flight: bool,
}

impl LoginForm {
    pub fn new(identifier: String) -> Self {
        let focus = if identifier.is_empty() {
            LoginFocus::Identifier
        } else {
            LoginFocus::Secret
        };
        Self {
            identifier,
            secret: String::new(),
            focus,
            submitted: false,
            error: None,
            in_flight: false,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn validate(&self) -> Result<Credentials, Vec<ValidationError>> {
        let mut errors = Vec::new();
        if self.identifier.is_empty() {
            errors.push(ValidationError::IdentifierRequired);
        }
        if self.secret.is_empty() {
            errors.push(ValidationError::SecretRequired);
        } else if self.secret.chars().count() < MIN_SECRET_LENGTH {
            errors.push(ValidationError::SecretTooShort);
        }

        if errors.is_empty() {
            Ok(Credentials::new(self.identifier.clone(), self.secret.clone()))
        } else {
            Err(errors)
        }
    }

    /// Field errors to display (none before the first submit)
    pub fn field_errors(&self) -> Vec<ValidationError> {
        if !self.submitted {
            return Vec::new();
        }
        self.validate().err().unwrap_or_default()
    }

    /// Whether pressing the button would send a request right now
    pub fn can_submit(&self) -> bool {
        !self.in_flight && self.error.is_none() && self.validate().is_ok()
    }

    pub fn submit(&mut self) -> SubmitOutcome {
        if self.in_flight {
            return SubmitOutcome::Busy;
        }
        if self.error.is_some() {
            return SubmitOutcome::ErrorPending;
        }

        self.submitted = true;
        match self.validate() {
            Ok(credentials) => {
                self.in_flight = true;
                SubmitOutcome::Ready(credentials)
            }
            Err(errors) => SubmitOutcome::Invalid(errors),
        }
    }

    /// Record the outcome of the in-flight login.
    pub fn complete(&mut self, result: &Result<Session, AuthError>) {
        self.in_flight = false;
        match result {
            Ok(_) => {
                self.secret.clear();
                self.submitted = false;
                self.error = None;
            }
            Err(e) => {
                self.error = Some(e.user_message());
            }
        }
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Type into the focused field. Returns false if the character was refused.
    pub fn push_char(&mut self, c: char) -> bool {
        if self.in_flight {
            return false;
        }
        let accepted = match self.focus {
            LoginFocus::Identifier => {
                if can_add_identifier_char(self.identifier.chars().count(), c) {
                    self.identifier.push(c);
                    true
                } else {
                    false
                }
            }
            LoginFocus::Secret => {
                if can_add_secret_char(self.secret.chars().count(), c) {
                    self.secret.push(c);
                    true
                } else {
                    false
                }
            }
            LoginFocus::Button => false,
        };
        if accepted {
            self.clear_error();
        }
        accepted
    }

    pub fn pop_char(&mut self) {
        if self.in_flight {
            return;
        }
        let removed = match self.focus {
            LoginFocus::Identifier => self.identifier.pop(),
            LoginFocus::Secret => self.secret.pop(),
            LoginFocus::Button => None,
        };
        if removed.is_some() {
            self.clear_error();
        }
    }

    /// Start over, keeping only the identifier.
    pub fn reset(&mut self) {
        *self = Self::new(std::mem::take(&mut self.identifier));
    }
}

// ============================================================================
// Sidebar
// ============================================================================

/// What the sidebar shows about the signed-in user
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sidebar {
    pub user_identifier: Option<String>,
    pub signed_in_at: Option<DateTime<Utc>>,
}

impl Sidebar {
    pub fn from_store(store: &dyn SessionStore) -> Self {
        match store.session() {
            Some(session) => Self {
                user_identifier: Some(session.user_identifier),
                signed_in_at: Some(session.created_at),
            },
            None => Self::default(),
        }
    }
}

// ============================================================================
// Main Application Struct
// ============================================================================

/// Main application state container
pub struct App {
    pub config: Config,
    pub auth: AuthClient,
    pub router: Router,

    // UI State
    pub state: AppState,
    pub route: Route,
    pub login: LoginForm,
    pub sidebar: Sidebar,
    pub path_input: String,

    // Status message
    pub status_message: Option<String>,

    // Background login channel
    login_rx: mpsc::Receiver<Result<Session, AuthError>>,
    login_tx: mpsc::Sender<Result<Session, AuthError>>,

    // Whether the last identifier is written back to the config file
    persist_config: bool,
}

impl App {
    /// Create a new application instance and route to the home screen
    /// (which redirects to login without a session).
    pub fn new(config: Config, store: Arc<dyn SessionStore>) -> Result<Self> {
        let api = ApiClient::new(&config.backend_uri, config.request_timeout())?;
        let auth = AuthClient::new(api, store.clone());
        let router = Router::new(RouteGuard::new(store));

        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);

        let login = LoginForm::new(config.last_identifier.clone().unwrap_or_default());
        let route = router.resolve(HOME_PATH);

        let mut app = Self {
            config,
            auth,
            router,
            state: AppState::Normal,
            route,
            login,
            sidebar: Sidebar::default(),
            path_input: String::new(),
            status_message: None,
            login_rx: rx,
            login_tx: tx,
            persist_config: true,
        };
        app.navigate(HOME_PATH);
        Ok(app)
    }

    /// Keep the config file untouched (used for ephemeral sessions).
    pub fn without_config_persistence(mut self) -> Self {
        self.persist_config = false;
        self
    }

    pub fn view(&self) -> View {
        self.route.view
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth.store().is_authenticated()
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// Route to `path`, following the guard's redirect if it is denied.
    pub fn navigate(&mut self, path: &str) -> Navigation {
        let navigation = self.router.navigate(path);
        let destination = navigation.destination();

        if navigation.is_redirect() {
            debug!(requested = path, to = destination.path, "Navigation redirected");
        }

        match destination.view {
            View::Home => self.sidebar = Sidebar::from_store(&**self.auth.store()),
            View::Login => {
                if self.route.view != View::Login && !self.login.is_in_flight() {
                    self.login.reset();
                }
            }
        }

        self.route = destination;
        navigation
    }

    pub fn start_path_input(&mut self) {
        self.path_input.clear();
        self.state = AppState::EnteringPath;
    }

    pub fn push_path_char(&mut self, c: char) {
        if self.path_input.chars().count() < MAX_PATH_INPUT_LENGTH && !c.is_control() {
            self.path_input.push(c);
        }
    }

    pub fn submit_path_input(&mut self) {
        let path = std::mem::take(&mut self.path_input);
        self.state = AppState::Normal;
        let navigation = self.navigate(&path);
        self.status_message = Some(match navigation {
            Navigation::Enter(route) => format!("Now at {}", route.path),
            Navigation::Redirect { denied, to } => {
                format!("{} requires login, showing {}", denied.path, to.path)
            }
        });
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Submit the login form. Valid credentials are sent on a background task;
    /// the result arrives through `check_background_tasks`.
    pub fn submit_login(&mut self) {
        match self.login.submit() {
            SubmitOutcome::Ready(credentials) => {
                info!(user = %credentials.identifier, "Submitting login");
                let auth = self.auth.clone();
                let tx = self.login_tx.clone();
                tokio::spawn(async move {
                    let result = auth.login(credentials).await;
                    if tx.send(result).await.is_err() {
                        warn!("Login finished after the UI went away");
                    }
                });
            }
            SubmitOutcome::Invalid(errors) => {
                debug!(?errors, "Login form invalid, not submitting");
            }
            SubmitOutcome::Busy => {
                debug!("Login already in flight, ignoring submit");
            }
            SubmitOutcome::ErrorPending => {
                debug!("Login error still displayed, ignoring submit");
            }
        }
    }

    /// Apply finished background work.
    pub fn check_background_tasks(&mut self) {
        while let Ok(result) = self.login_rx.try_recv() {
            self.finish_login(result);
        }
    }

    fn finish_login(&mut self, result: Result<Session, AuthError>) {
        self.login.complete(&result);

        if let Ok(session) = result {
            if self.persist_config
                && self.config.last_identifier.as_deref() != Some(session.user_identifier.as_str())
            {
                self.config.last_identifier = Some(session.user_identifier.clone());
                if let Err(e) = self.config.save() {
                    warn!(error = %e, "Failed to save config");
                }
            }
            self.status_message = Some(format!("Signed in as {}", session.user_identifier));
            self.navigate(HOME_PATH);
        }
    }

    /// Sidebar logout: drop the local session and show the login screen.
    pub fn logout(&mut self) {
        match self.auth.logout() {
            Ok(()) => self.status_message = Some("Signed out".to_string()),
            Err(e) => {
                warn!(error = %e, "Failed to clear session");
                self.status_message = Some(format!("Sign out failed: {}", e));
            }
        }
        self.navigate(LOGIN_PATH);
    }
}

// ============================================================================
// Input Validation
// ============================================================================

/// Check if a character is valid for form input (printable, non-control)
fn is_valid_input_char(c: char) -> bool {
    !c.is_control()
}

/// Check if a character can be added to the identifier field
pub fn can_add_identifier_char(current_len: usize, c: char) -> bool {
    current_len < MAX_IDENTIFIER_LENGTH && is_valid_input_char(c)
}

/// Check if a character can be added to the secret field
pub fn can_add_secret_char(current_len: usize, c: char) -> bool {
    current_len < MAX_SECRET_LENGTH && is_valid_input_char(c)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::auth::MemorySessionStore;
    use crate::routes::{HOME_ROUTE, LOGIN_ROUTE};
    use reqwest::StatusCode;

    /// Nothing listens on the discard port, so any request would fail fast.
    const UNREACHABLE_BACKEND: &str = "http://127.0.0.1:9/api/v1";

    fn config_for(backend_uri: &str) -> Config {
        Config {
            backend_uri: backend_uri.to_string(),
            ..Config::default()
        }
    }

    fn app_with(store: Arc<dyn SessionStore>, backend_uri: &str) -> App {
        App::new(config_for(backend_uri), store)
            .unwrap()
            .without_config_persistence()
    }

    fn filled_form(identifier: &str, secret: &str) -> LoginForm {
        let mut form = LoginForm::new(identifier.to_string());
        form.secret = secret.to_string();
        form
    }

    async fn spawn_backend(status: StatusCode, body: &'static str) -> String {
        let router = axum::Router::new().route(
            "/api/v1/authentication",
            axum::routing::post(move || async move { (status, body) }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/api/v1", addr)
    }

    // -------------------------------------------------------------------------
    // Login Form Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_validate_ok() {
        let credentials = filled_form("alice", "password1").validate().unwrap();
        assert_eq!(credentials.identifier, "alice");
        assert_eq!(credentials.secret, "password1");
    }

    #[test]
    fn test_validate_reports_every_field() {
        let errors = filled_form("", "").validate().unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::IdentifierRequired, ValidationError::SecretRequired]
        );
    }

    #[test]
    fn test_validate_short_secret() {
        let errors = filled_form("alice", "short").validate().unwrap_err();
        assert_eq!(errors, vec![ValidationError::SecretTooShort]);
        // Exactly the minimum is fine
        assert!(filled_form("alice", "12345678").validate().is_ok());
    }

    #[test]
    fn test_secret_length_counts_characters() {
        assert!(filled_form("alice", "ääääääää").validate().is_ok());
    }

    #[test]
    fn test_field_errors_hidden_until_submit() {
        let mut form = filled_form("", "short");
        assert!(form.field_errors().is_empty());
        assert!(matches!(form.submit(), SubmitOutcome::Invalid(_)));
        assert_eq!(
            form.field_errors(),
            vec![ValidationError::IdentifierRequired, ValidationError::SecretTooShort]
        );
        assert!(!form.is_in_flight());
    }

    #[test]
    fn test_second_submit_while_in_flight_is_busy() {
        let mut form = filled_form("alice", "password1");
        assert!(matches!(form.submit(), SubmitOutcome::Ready(_)));
        assert!(form.is_in_flight());
        assert!(!form.can_submit());
        assert!(matches!(form.submit(), SubmitOutcome::Busy));
    }

    #[test]
    fn test_failed_login_blocks_until_error_cleared() {
        let mut form = filled_form("alice", "password1");
        assert!(matches!(form.submit(), SubmitOutcome::Ready(_)));

        let failure: Result<Session, AuthError> = Err(AuthError::Api(ApiError::from_status(
            StatusCode::UNAUTHORIZED,
            r#"{"error":"bad credentials"}"#,
        )));
        form.complete(&failure);

        assert!(!form.is_in_flight());
        assert_eq!(form.error.as_deref(), Some("bad credentials"));
        assert!(matches!(form.submit(), SubmitOutcome::ErrorPending));

        form.clear_error();
        assert!(matches!(form.submit(), SubmitOutcome::Ready(_)));
    }

    #[test]
    fn test_editing_clears_error() {
        let mut form = filled_form("alice", "password1");
        form.error = Some("bad credentials".to_string());
        form.focus = LoginFocus::Secret;
        assert!(form.push_char('x'));
        assert_eq!(form.error, None);
    }

    #[test]
    fn test_successful_login_clears_secret() {
        let mut form = filled_form("alice", "password1");
        assert!(matches!(form.submit(), SubmitOutcome::Ready(_)));
        form.complete(&Ok(Session::new("tok", "alice")));
        assert!(form.secret.is_empty());
        assert_eq!(form.identifier, "alice");
        assert!(!form.submitted);
    }

    #[test]
    fn test_typing_follows_focus() {
        let mut form = LoginForm::new(String::new());
        assert_eq!(form.focus, LoginFocus::Identifier);
        form.push_char('a');
        form.focus = form.focus.next();
        form.push_char('b');
        form.focus = form.focus.next();
        assert!(!form.push_char('c'));
        assert_eq!(form.identifier, "a");
        assert_eq!(form.secret, "b");
        form.focus = LoginFocus::Secret;
        form.pop_char();
        assert!(form.secret.is_empty());
    }

    #[test]
    fn test_prefilled_identifier_focuses_secret() {
        assert_eq!(LoginForm::new("alice".to_string()).focus, LoginFocus::Secret);
    }

    #[test]
    fn test_login_focus_cycle() {
        assert_eq!(LoginFocus::Identifier.next(), LoginFocus::Secret);
        assert_eq!(LoginFocus::Button.next(), LoginFocus::Identifier);
        assert_eq!(LoginFocus::Identifier.prev(), LoginFocus::Button);
        assert_eq!(LoginFocus::Secret.prev(), LoginFocus::Identifier);
    }

    // -------------------------------------------------------------------------
    // Input Validation Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_can_add_identifier_char() {
        assert!(can_add_identifier_char(0, 'a'));
        assert!(can_add_identifier_char(253, '@'));
        assert!(!can_add_identifier_char(254, 'a'));
        assert!(!can_add_identifier_char(0, '\n'));
        assert!(!can_add_identifier_char(0, '\t'));
    }

    #[test]
    fn test_can_add_secret_char() {
        assert!(can_add_secret_char(0, 'a'));
        assert!(can_add_secret_char(127, '!'));
        assert!(!can_add_secret_char(128, 'a'));
        assert!(!can_add_secret_char(0, '\x00'));
    }

    // -------------------------------------------------------------------------
    // Sidebar Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_sidebar_reads_store() {
        let store = MemorySessionStore::with_session(Session::new("tok", "test@example.com"));
        let sidebar = Sidebar::from_store(&store);
        assert_eq!(sidebar.user_identifier.as_deref(), Some("test@example.com"));
        assert!(sidebar.signed_in_at.is_some());

        assert_eq!(Sidebar::from_store(&MemorySessionStore::new()), Sidebar::default());
    }

    // -------------------------------------------------------------------------
    // App Flow Tests
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_fresh_store_starts_on_login() {
        let app = app_with(Arc::new(MemorySessionStore::new()), UNREACHABLE_BACKEND);
        assert_eq!(app.route, LOGIN_ROUTE);
        assert!(!app.is_authenticated());
    }

    #[tokio::test]
    async fn test_existing_session_starts_on_home() {
        let store = Arc::new(MemorySessionStore::with_session(Session::new("tok", "alice")));
        let app = app_with(store, UNREACHABLE_BACKEND);
        assert_eq!(app.route, HOME_ROUTE);
        assert_eq!(app.sidebar.user_identifier.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn test_invalid_form_sends_nothing() {
        let mut app = app_with(Arc::new(MemorySessionStore::new()), UNREACHABLE_BACKEND);
        app.login = filled_form("alice", "short");
        app.submit_login();

        assert!(!app.login.is_in_flight());
        assert!(app.login_rx.try_recv().is_err());
        assert_eq!(app.login.field_errors(), vec![ValidationError::SecretTooShort]);
    }

    #[tokio::test]
    async fn test_logout_returns_to_login() {
        let store = Arc::new(MemorySessionStore::with_session(Session::new("tok", "alice")));
        let mut app = app_with(store.clone(), UNREACHABLE_BACKEND);
        assert_eq!(app.route, HOME_ROUTE);

        app.logout();
        assert_eq!(app.route, LOGIN_ROUTE);
        assert!(!store.is_authenticated());
        assert_eq!(store.current_user_identifier(), None);

        app.navigate("/");
        assert_eq!(app.route, LOGIN_ROUTE);
    }

    #[tokio::test]
    async fn test_path_prompt_soft_404() {
        let store = Arc::new(MemorySessionStore::with_session(Session::new("tok", "alice")));
        let mut app = app_with(store, UNREACHABLE_BACKEND);
        app.start_path_input();
        for c in "/nowhere".chars() {
            app.push_path_char(c);
        }
        app.submit_path_input();
        assert_eq!(app.state, AppState::Normal);
        assert_eq!(app.route, HOME_ROUTE);
    }

    #[tokio::test]
    async fn test_login_round_trip_through_background_task() {
        let backend = spawn_backend(StatusCode::OK, "tok-123").await;
        let store = Arc::new(MemorySessionStore::new());
        let mut app = app_with(store.clone(), &backend);
        app.login = filled_form("alice", "password1");

        app.submit_login();
        assert!(app.login.is_in_flight());
        // A second press while in flight is ignored
        app.submit_login();

        let result = app.login_rx.recv().await.unwrap();
        app.finish_login(result);

        assert!(app.login_rx.try_recv().is_err());
        assert_eq!(app.route, HOME_ROUTE);
        assert_eq!(store.current_token().as_deref(), Some("tok-123"));
        assert_eq!(app.sidebar.user_identifier.as_deref(), Some("alice"));
        assert!(app.login.secret.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_login_shows_message() {
        let backend = spawn_backend(StatusCode::UNAUTHORIZED, r#"{"error":"bad credentials"}"#).await;
        let store = Arc::new(MemorySessionStore::new());
        let mut app = app_with(store.clone(), &backend);
        app.login = filled_form("alice", "password1");

        app.submit_login();
        let result = app.login_rx.recv().await.unwrap();
        app.finish_login(result);

        assert_eq!(app.route, LOGIN_ROUTE);
        assert_eq!(app.login.error.as_deref(), Some("bad credentials"));
        assert!(!store.is_authenticated());
    }
}
