use tracing::warn;

use crate::store::{SessionStore, StorageTier, TOKEN_KEY};
use crate::types::{Session, UserPatch, UserProfile};

/// Central authentication state.
///
/// Fields are private on purpose: every change goes through a named
/// transition, and `is_authenticated` is always derived from session
/// presence rather than stored as its own flag.
#[derive(Debug, Default)]
pub struct AuthStore {
    session: Option<Session>,
    loading: bool,
    error: Option<String>,
}

impl AuthStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn user(&self) -> Option<&UserProfile> {
        self.session.as_ref().map(|s| &s.user)
    }

    pub fn access_token(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.access_token.as_str())
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// A login attempt has started: mark busy, clear any stale error.
    pub fn login_start(&mut self) {
        self.loading = true;
        self.error = None;
    }

    /// A login attempt succeeded. The session is mirrored into storage so
    /// restoration can find it after a restart; a mirror failure is logged
    /// but never fails the login itself.
    ///
    /// The durable tier is chosen when the profile carries a user id, which
    /// in practice is every successful login.
    pub fn login_success(&mut self, session: Session, store: &SessionStore) {
        let tier = mirror_tier(&session.user);
        if let Err(err) = store.write_session(tier, &session) {
            warn!(%err, "failed to mirror session into storage");
        }
        self.session = Some(session);
        self.loading = false;
        self.error = None;
    }

    /// A login attempt failed: no session, remember the message.
    pub fn login_failure(&mut self, message: impl Into<String>) {
        self.session = None;
        self.loading = false;
        self.error = Some(message.into());
    }

    /// Log out: drop the in-memory session and purge both storage tiers.
    pub fn logout(&mut self, store: &SessionStore) {
        self.session = None;
        self.loading = false;
        self.error = None;
        store.clear_both();
    }

    /// Adopt a session recovered from storage at startup. Storage already
    /// holds it, so nothing is written back.
    pub fn restore_auth(&mut self, session: Session) {
        self.session = Some(session);
        self.loading = false;
        self.error = None;
    }

    /// Swap in a refreshed access token and re-mirror it. No-op when there
    /// is no current session.
    pub fn refresh_token_success(&mut self, token: impl Into<String>, store: &SessionStore) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.access_token = token.into();
        let tier = mirror_tier(&session.user);
        if let Err(err) = store.set(tier, TOKEN_KEY, &session.access_token) {
            warn!(%err, "failed to mirror refreshed token into storage");
        }
    }

    /// Merge updated profile fields into the current session and re-mirror
    /// the profile. No-op when unauthenticated.
    pub fn update_user(&mut self, patch: &UserPatch, store: &SessionStore) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        patch.apply_to(&mut session.user);
        let tier = mirror_tier(&session.user);
        if let Err(err) = store.write_user(tier, &session.user) {
            warn!(%err, "failed to mirror updated profile into storage");
        }
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }
}

fn mirror_tier(user: &UserProfile) -> StorageTier {
    if user.user_id.is_empty() {
        StorageTier::Ephemeral
    } else {
        StorageTier::Durable
    }
}
