//! Authentication/session store.
//!
//! # Design
//! Session state lives in an explicitly owned `SessionState` handle rather
//! than a global: the store writes it, any number of clones read snapshots
//! of it. Whether the process can hold a session at all (an interactive
//! host versus a prerender pass) is a `HostContext` capability handed to the
//! store at construction.
//!
//! Phases: `Loading` → `Authenticated` | `Anonymous`; `logout` moves
//! `Authenticated` → `Anonymous`; `login` / `load_user` can move back.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info, warn};

use crate::api::Api;
use crate::error::ApiError;
use crate::transport::Transport;
use crate::types::{LoginResponse, RegisterRequest, RegisterResponse, User};

/// Current session: who is signed in, and whether that is still being
/// determined.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user: Option<User>,
    pub loading: bool,
}

impl Default for Session {
    /// Nothing is known before the first `load_user`.
    fn default() -> Self {
        Self {
            user: None,
            loading: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Loading,
    Authenticated,
    Anonymous,
}

impl Session {
    pub fn phase(&self) -> Phase {
        match (&self.user, self.loading) {
            (Some(_), _) => Phase::Authenticated,
            (None, true) => Phase::Loading,
            (None, false) => Phase::Anonymous,
        }
    }
}

/// Shared handle to the session. Clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    inner: Arc<RwLock<Session>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Session {
        self.read().clone()
    }

    pub fn user(&self) -> Option<User> {
        self.read().user.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.read().loading
    }

    pub fn phase(&self) -> Phase {
        self.read().phase()
    }

    fn set_user(&self, user: Option<User>) {
        self.write().user = user;
    }

    fn set_loading(&self, loading: bool) {
        self.write().loading = loading;
    }

    // Writers never panic while holding the lock, so a poisoned lock still
    // holds a consistent `Session`.
    fn read(&self) -> RwLockReadGuard<'_, Session> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Session> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// What the embedding host can do for the session store.
pub trait HostContext {
    /// False while rendering ahead of time (no user, no cookies); session
    /// lookups are skipped.
    fn is_interactive(&self) -> bool;

    /// Leave the current view for the home route with a full reload, so no
    /// state from the old session survives. Hosts with a router override this.
    fn navigate_home(&self) {}
}

impl<H: HostContext + ?Sized> HostContext for &H {
    fn is_interactive(&self) -> bool {
        (**self).is_interactive()
    }

    fn navigate_home(&self) {
        (**self).navigate_home();
    }
}

/// A live, interactive host.
#[derive(Debug, Clone, Copy, Default)]
pub struct Interactive;

impl HostContext for Interactive {
    fn is_interactive(&self) -> bool {
        true
    }
}

/// An ahead-of-time render with no session.
#[derive(Debug, Clone, Copy, Default)]
pub struct Prerender;

impl HostContext for Prerender {
    fn is_interactive(&self) -> bool {
        false
    }
}

/// Result of `AuthStore::load_user`. The session state records the first
/// three variants the same way (no user); this only tells callers why.
#[derive(Debug)]
pub enum LoadOutcome {
    /// The host is not interactive; nothing was requested.
    Skipped,
    Authenticated,
    /// The server answered and rejected the session (401/403).
    Anonymous,
    /// The session could not be determined (network, 5xx, bad payload).
    Unavailable(ApiError),
}

/// Session store: keeps `SessionState` in step with the server.
pub struct AuthStore<T, H> {
    api: Api<T>,
    host: H,
    state: SessionState,
}

impl<T: Transport, H: HostContext> AuthStore<T, H> {
    pub fn new(api: Api<T>, host: H) -> Self {
        Self::with_state(api, host, SessionState::new())
    }

    /// Build a store that writes into an existing, possibly shared, state.
    pub fn with_state(api: Api<T>, host: H, state: SessionState) -> Self {
        Self { api, host, state }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn api(&self) -> &Api<T> {
        &self.api
    }

    pub fn api_mut(&mut self) -> &mut Api<T> {
        &mut self.api
    }

    /// Ask the server who is signed in and record the answer.
    ///
    /// Never fails: any error leaves the session anonymous. `loading` is
    /// always false on return (unless the host is not interactive, in which
    /// case the state is untouched).
    pub fn load_user(&self) -> LoadOutcome {
        if !self.host.is_interactive() {
            debug!("host is not interactive; skipping session load");
            return LoadOutcome::Skipped;
        }

        self.state.set_loading(true);
        let outcome = match self.api.get_me() {
            Ok(user) => {
                info!(username = %user.username, "session authenticated");
                self.state.set_user(Some(user));
                LoadOutcome::Authenticated
            }
            Err(e) if e.is_unauthorized() => {
                debug!(error = %e, "no active session");
                self.state.set_user(None);
                LoadOutcome::Anonymous
            }
            Err(e) => {
                warn!(error = %e, "session lookup failed; treating as anonymous");
                self.state.set_user(None);
                LoadOutcome::Unavailable(e)
            }
        };
        self.state.set_loading(false);
        outcome
    }

    /// Sign in with a password. The returned user becomes the session user;
    /// the full response (including any issued token) goes back to the caller.
    pub fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let result = self.api.login(username, password)?;
        info!(username = %result.user.username, "logged in");
        self.state.set_user(Some(result.user.clone()));
        Ok(result)
    }

    /// Create an account. Human accounts are signed in by the server, so the
    /// session is reloaded; agents authenticate with their API key later.
    pub fn register(&self, input: &RegisterRequest) -> Result<RegisterResponse, ApiError> {
        let result = self.api.register(input)?;
        info!(username = %result.user.username, is_agent = input.is_agent, "registered");
        if !input.is_agent {
            self.load_user();
        }
        Ok(result)
    }

    /// Forget the session locally. No request is made.
    pub fn logout(&mut self) {
        self.state.set_user(None);
        self.api.set_token(None);
        if self.host.is_interactive() {
            self.api.transport().clear_credentials();
            self.host.navigate_home();
        }
        info!("logged out");
    }
}
