use tracing::{debug, info, warn};

use crate::state::AuthStore;
use crate::store::SessionStore;
use crate::token::decode_expiry;
use crate::types::{Session, UserProfile};

/// What happened during startup session restoration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// A stored session was adopted into the auth state.
    Restored,
    /// No complete session was found in either tier.
    Absent,
    /// A session was found but its token had expired; storage was purged.
    PurgedExpired,
    /// Stored session data could not be decoded; storage was purged.
    PurgedCorrupt,
}

/// Attempt to recover a session persisted by a previous run.
///
/// All three keys must come from a single tier, the token payload must
/// decode to an `exp` claim, and that claim must still be in the future.
/// Anything less purges both tiers unconditionally.
pub fn restore_session(store: &SessionStore, auth: &mut AuthStore, now: i64) -> RestoreOutcome {
    let raw = match store.read_same_tier() {
        Ok(Some((_, raw))) => raw,
        Ok(None) => {
            debug!("no stored session to restore");
            return RestoreOutcome::Absent;
        }
        Err(err) => {
            warn!(%err, "stored session unreadable; purging both tiers");
            store.clear_both();
            return RestoreOutcome::PurgedCorrupt;
        }
    };

    let user: UserProfile = match serde_json::from_str(&raw.user_json) {
        Ok(user) => user,
        Err(err) => {
            warn!(%err, "stored profile unreadable; purging both tiers");
            store.clear_both();
            return RestoreOutcome::PurgedCorrupt;
        }
    };

    let Some(exp) = decode_expiry(&raw.token) else {
        warn!("stored token has no readable expiry; purging both tiers");
        store.clear_both();
        return RestoreOutcome::PurgedCorrupt;
    };
    if exp <= now {
        info!("stored session expired; purging both tiers");
        store.clear_both();
        return RestoreOutcome::PurgedExpired;
    }

    auth.restore_auth(Session {
        access_token: raw.token,
        refresh_token: raw.refresh_token,
        user,
        expires_at: exp,
    });
    RestoreOutcome::Restored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{StorageTier, TOKEN_KEY, USER_KEY};
    use crate::token::encode_unsigned;
    use tempfile::tempdir;

    const NOW: i64 = 1_700_000_000;

    fn stored_session(token: &str) -> Session {
        Session {
            access_token: token.to_string(),
            refresh_token: "r1".to_string(),
            user: UserProfile {
                user_id: "hong".to_string(),
                user_name: "홍길동".to_string(),
                phone_number: "010-1234-5678".to_string(),
                customer_id: "CUST0001".to_string(),
                line_number: "010-1234-5678".to_string(),
                permissions: vec!["BILL_INQUIRY".to_string()],
            },
            expires_at: 0,
        }
    }

    #[test]
    fn restores_valid_stored_session() {
        let dir = tempdir().expect("tempdir");
        let store = SessionStore::open(dir.path());
        let token = encode_unsigned(NOW + 3600);
        store
            .write_session(StorageTier::Durable, &stored_session(&token))
            .expect("write");

        let mut auth = AuthStore::new();
        let outcome = restore_session(&store, &mut auth, NOW);

        assert_eq!(outcome, RestoreOutcome::Restored);
        assert!(auth.is_authenticated());
        assert_eq!(auth.user().map(|u| u.user_id.as_str()), Some("hong"));
        assert_eq!(auth.session().map(|s| s.expires_at), Some(NOW + 3600));
    }

    #[test]
    fn undecodable_token_purges_both_tiers() {
        let dir = tempdir().expect("tempdir");
        let store = SessionStore::open(dir.path());
        store
            .write_session(StorageTier::Durable, &stored_session("opaque-not-a-jwt"))
            .expect("write");

        let mut auth = AuthStore::new();
        let outcome = restore_session(&store, &mut auth, NOW);

        assert_eq!(outcome, RestoreOutcome::PurgedCorrupt);
        assert!(!auth.is_authenticated());
        assert!(store.read_same_tier().expect("read").is_none());
    }

    #[test]
    fn token_without_exp_claim_purges_both_tiers() {
        let dir = tempdir().expect("tempdir");
        let store = SessionStore::open(dir.path());
        // "e30" is url-safe base64 for "{}": a payload that decodes but
        // carries no exp claim.
        store
            .write_session(StorageTier::Durable, &stored_session("h.e30.s"))
            .expect("write");

        let mut auth = AuthStore::new();
        let outcome = restore_session(&store, &mut auth, NOW);

        assert_eq!(outcome, RestoreOutcome::PurgedCorrupt);
        assert!(!auth.is_authenticated());
        assert!(store.read_same_tier().expect("read").is_none());
    }

    #[test]
    fn expired_token_purges_both_tiers() {
        let dir = tempdir().expect("tempdir");
        let store = SessionStore::open(dir.path());
        let token = encode_unsigned(NOW - 1);
        store
            .write_session(StorageTier::Durable, &stored_session(&token))
            .expect("write");
        store
            .write_session(StorageTier::Ephemeral, &stored_session(&token))
            .expect("write");

        let mut auth = AuthStore::new();
        let outcome = restore_session(&store, &mut auth, NOW);

        assert_eq!(outcome, RestoreOutcome::PurgedExpired);
        assert!(!auth.is_authenticated());
        assert!(store.read_same_tier().expect("read").is_none());
    }

    #[test]
    fn corrupt_profile_purges_both_tiers() {
        let dir = tempdir().expect("tempdir");
        let store = SessionStore::open(dir.path());
        store
            .write_session(StorageTier::Durable, &stored_session("t1"))
            .expect("write");
        store
            .set(StorageTier::Durable, USER_KEY, "not json")
            .expect("set");

        let mut auth = AuthStore::new();
        let outcome = restore_session(&store, &mut auth, NOW);

        assert_eq!(outcome, RestoreOutcome::PurgedCorrupt);
        assert!(!auth.is_authenticated());
        assert!(store.read_same_tier().expect("read").is_none());
    }

    #[test]
    fn incomplete_session_is_absent() {
        let dir = tempdir().expect("tempdir");
        let store = SessionStore::open(dir.path());
        store
            .set(StorageTier::Durable, TOKEN_KEY, "t1")
            .expect("set");

        let mut auth = AuthStore::new();
        assert_eq!(
            restore_session(&store, &mut auth, NOW),
            RestoreOutcome::Absent
        );
        assert!(!auth.is_authenticated());
    }
}
