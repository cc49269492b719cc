//! Keyboard input handling for the TUI.
//!
//! This module handles all keyboard events and translates them into
//! application state changes.

use crossterm::event::{KeyCode, KeyEvent};

use crate::app::{App, AppState, LoginFocus};
use crate::routes::View;

/// Handle keyboard input. Returns true if the app should quit.
pub fn handle_input(app: &mut App, key: KeyEvent) -> bool {
    match app.state {
        AppState::ShowingHelp => {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
                app.state = AppState::Normal;
            }
            return false;
        }
        AppState::ConfirmingQuit => {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                    app.state = AppState::Quitting;
                    return true;
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    app.state = AppState::Normal;
                }
                _ => {}
            }
            return false;
        }
        AppState::EnteringPath => {
            handle_path_input(app, key);
            return false;
        }
        AppState::Quitting => return true,
        AppState::Normal => {}
    }

    match app.view() {
        View::Login => handle_login_input(app, key),
        View::Home => handle_home_input(app, key),
    }
    false
}

fn handle_path_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.path_input.clear();
            app.state = AppState::Normal;
        }
        KeyCode::Enter => app.submit_path_input(),
        KeyCode::Backspace => {
            app.path_input.pop();
        }
        KeyCode::Char(c) => app.push_path_char(c),
        _ => {}
    }
}

fn handle_home_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.state = AppState::ConfirmingQuit,
        KeyCode::Char('?') => app.state = AppState::ShowingHelp,
        KeyCode::Char('l') => app.logout(),
        KeyCode::Char('g') => app.start_path_input(),
        _ => {}
    }
}

fn handle_login_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            // First Esc dismisses a failure, the next one offers to quit
            if app.login.error.is_some() {
                app.login.clear_error();
            } else {
                app.state = AppState::ConfirmingQuit;
            }
        }
        KeyCode::Down | KeyCode::Tab => {
            app.login.focus = app.login.focus.next();
        }
        KeyCode::Up | KeyCode::BackTab => {
            app.login.focus = app.login.focus.prev();
        }
        KeyCode::Enter => match app.login.focus {
            LoginFocus::Identifier => app.login.focus = LoginFocus::Secret,
            LoginFocus::Secret => app.login.focus = LoginFocus::Button,
            LoginFocus::Button => app.submit_login(),
        },
        KeyCode::Backspace => app.login.pop_char(),
        KeyCode::Char(c) => {
            app.login.push_char(c);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::auth::{MemorySessionStore, Session, SessionStore};
    use crate::config::Config;
    use crate::routes::{HOME_ROUTE, LOGIN_ROUTE};

    fn app_with(store: Arc<dyn SessionStore>) -> App {
        let config = Config {
            backend_uri: "http://127.0.0.1:9/api/v1".to_string(),
            ..Config::default()
        };
        App::new(config, store).unwrap().without_config_persistence()
    }

    fn press(app: &mut App, code: KeyCode) -> bool {
        handle_input(app, KeyEvent::from(code))
    }

    fn type_str(app: &mut App, s: &str) {
        for c in s.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    #[tokio::test]
    async fn test_typing_into_login_form() {
        let mut app = app_with(Arc::new(MemorySessionStore::new()));
        assert_eq!(app.route, LOGIN_ROUTE);

        type_str(&mut app, "alice");
        press(&mut app, KeyCode::Tab);
        type_str(&mut app, "short");
        press(&mut app, KeyCode::Backspace);

        assert_eq!(app.login.identifier, "alice");
        assert_eq!(app.login.secret, "shor");
        assert_eq!(app.login.focus, LoginFocus::Secret);
    }

    #[tokio::test]
    async fn test_enter_walks_fields_then_submits() {
        let mut app = app_with(Arc::new(MemorySessionStore::new()));
        type_str(&mut app, "alice");
        press(&mut app, KeyCode::Enter);
        type_str(&mut app, "short");
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.login.focus, LoginFocus::Button);

        press(&mut app, KeyCode::Enter);
        assert!(app.login.submitted);
        assert!(!app.login.is_in_flight());
        assert!(!app.login.field_errors().is_empty());
    }

    #[tokio::test]
    async fn test_esc_clears_error_before_quitting() {
        let mut app = app_with(Arc::new(MemorySessionStore::new()));
        app.login.error = Some("bad credentials".to_string());

        press(&mut app, KeyCode::Esc);
        assert_eq!(app.login.error, None);
        assert_eq!(app.state, AppState::Normal);

        press(&mut app, KeyCode::Esc);
        assert_eq!(app.state, AppState::ConfirmingQuit);
        assert!(press(&mut app, KeyCode::Char('y')));
    }

    #[tokio::test]
    async fn test_home_logout_key() {
        let store = Arc::new(MemorySessionStore::with_session(Session::new("tok", "alice")));
        let mut app = app_with(store.clone());
        assert_eq!(app.route, HOME_ROUTE);

        press(&mut app, KeyCode::Char('l'));
        assert_eq!(app.route, LOGIN_ROUTE);
        assert!(!store.is_authenticated());
    }

    #[tokio::test]
    async fn test_go_to_login_path_from_home() {
        let store = Arc::new(MemorySessionStore::with_session(Session::new("tok", "alice")));
        let mut app = app_with(store);

        press(&mut app, KeyCode::Char('g'));
        assert_eq!(app.state, AppState::EnteringPath);
        type_str(&mut app, "/login");
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.state, AppState::Normal);
        assert_eq!(app.route, LOGIN_ROUTE);
    }

    #[tokio::test]
    async fn test_help_toggle() {
        let store = Arc::new(MemorySessionStore::with_session(Session::new("tok", "alice")));
        let mut app = app_with(store);
        press(&mut app, KeyCode::Char('?'));
        assert_eq!(app.state, AppState::ShowingHelp);
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.state, AppState::Normal);
    }
}
