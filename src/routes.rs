//! Route table and navigation guard.
//!
//! Routing rules:
//! - `/` is the home view and requires a session
//! - `/login` is public
//! - anything else resolves to `/`

use std::sync::Arc;

use tracing::debug;

use crate::auth::SessionStore;

pub const HOME_PATH: &str = "/";
pub const LOGIN_PATH: &str = "/login";

/// Screen rendered for a route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Home,
    Login,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub path: &'static str,
    pub view: View,
    pub required_auth: bool,
}

pub const HOME_ROUTE: Route = Route {
    path: HOME_PATH,
    view: View::Home,
    required_auth: true,
};

pub const LOGIN_ROUTE: Route = Route {
    path: LOGIN_PATH,
    view: View::Login,
    required_auth: false,
};

pub const ROUTES: &[Route] = &[HOME_ROUTE, LOGIN_ROUTE];

/// Decides whether a route may be entered.
#[derive(Clone)]
pub struct RouteGuard {
    store: Arc<dyn SessionStore>,
}

impl RouteGuard {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Public routes always pass; protected ones need a stored token.
    pub fn can_enter(&self, route: &Route) -> bool {
        !route.required_auth || self.store.is_authenticated()
    }
}

/// Outcome of a navigation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Enter(Route),
    Redirect { denied: Route, to: Route },
}

impl Navigation {
    /// Route that ends up on screen
    pub fn destination(&self) -> Route {
        match *self {
            Navigation::Enter(route) => route,
            Navigation::Redirect { to, .. } => to,
        }
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self, Navigation::Redirect { .. })
    }
}

pub struct Router {
    routes: &'static [Route],
    guard: RouteGuard,
}

impl Router {
    pub fn new(guard: RouteGuard) -> Self {
        Self {
            routes: ROUTES,
            guard,
        }
    }

    /// Map a path to a route. Unknown paths resolve to home.
    pub fn resolve(&self, path: &str) -> Route {
        let path = normalize(path);
        self.routes
            .iter()
            .copied()
            .find(|route| route.path == path)
            .unwrap_or(HOME_ROUTE)
    }

    /// Resolve `path` and consult the guard. A denied route redirects to the
    /// login screen, whatever was requested.
    pub fn navigate(&self, path: &str) -> Navigation {
        let route = self.resolve(path);
        if self.guard.can_enter(&route) {
            Navigation::Enter(route)
        } else {
            debug!(requested = path, denied = route.path, "Route requires login, redirecting");
            Navigation::Redirect {
                denied: route,
                to: LOGIN_ROUTE,
            }
        }
    }
}

/// Canonical form of a path: leading slash, no query or fragment, no empty
/// or trailing segments.
pub fn normalize(path: &str) -> String {
    let path = path.trim();
    let path = path.split(['?', '#']).next().unwrap_or_default();

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", segments.join("/"))
}
