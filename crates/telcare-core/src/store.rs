use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;
use tracing::warn;

use crate::config::config_directory;
use crate::types::{Session, UserProfile};

pub const TOKEN_KEY: &str = "token";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
pub const USER_KEY: &str = "user";

const SESSION_FILE_NAME: &str = "session.json";

/// The two mirrored storage tiers.
///
/// The durable tier survives process restarts; the ephemeral tier lives only
/// as long as the store instance itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageTier {
    Durable,
    Ephemeral,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("stored session data is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Raw session keys read back from one tier, before any decoding.
#[derive(Debug, Clone)]
pub struct RawSession {
    pub token: String,
    pub refresh_token: String,
    pub user_json: String,
}

/// Two-tier key/value store for the persisted session mirror.
///
/// All mutations originate from the single UI thread; the inner mutex exists
/// only to satisfy shared access, not to coordinate writers.
#[derive(Debug)]
pub struct SessionStore {
    durable_path: PathBuf,
    ephemeral: Mutex<HashMap<String, String>>,
}

impl SessionStore {
    /// Store rooted at the default config directory.
    pub fn open_default() -> Self {
        Self::open(&config_directory())
    }

    /// Store rooted at an explicit directory (used by tests).
    pub fn open(base: &Path) -> Self {
        Self {
            durable_path: base.join(SESSION_FILE_NAME),
            ephemeral: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, tier: StorageTier, key: &str) -> Result<Option<String>, StoreError> {
        match tier {
            StorageTier::Durable => Ok(self.durable_map()?.remove(key)),
            StorageTier::Ephemeral => Ok(self.ephemeral_map().get(key).cloned()),
        }
    }

    pub fn set(&self, tier: StorageTier, key: &str, value: &str) -> Result<(), StoreError> {
        match tier {
            StorageTier::Durable => {
                let mut map = self.durable_map()?;
                map.insert(key.to_string(), value.to_string());
                self.write_durable(&map)
            }
            StorageTier::Ephemeral => {
                self.ephemeral_map()
                    .insert(key.to_string(), value.to_string());
                Ok(())
            }
        }
    }

    pub fn remove(&self, tier: StorageTier, key: &str) -> Result<(), StoreError> {
        match tier {
            StorageTier::Durable => {
                let mut map = self.durable_map()?;
                if map.remove(key).is_some() {
                    self.write_durable(&map)?;
                }
                Ok(())
            }
            StorageTier::Ephemeral => {
                self.ephemeral_map().remove(key);
                Ok(())
            }
        }
    }

    /// Mirror a session into one tier as the three flat keys.
    pub fn write_session(&self, tier: StorageTier, session: &Session) -> Result<(), StoreError> {
        let user_json = serde_json::to_string(&session.user)?;
        match tier {
            StorageTier::Durable => {
                let mut map = self.durable_map()?;
                map.insert(TOKEN_KEY.to_string(), session.access_token.clone());
                map.insert(
                    REFRESH_TOKEN_KEY.to_string(),
                    session.refresh_token.clone(),
                );
                map.insert(USER_KEY.to_string(), user_json);
                self.write_durable(&map)
            }
            StorageTier::Ephemeral => {
                let mut map = self.ephemeral_map();
                map.insert(TOKEN_KEY.to_string(), session.access_token.clone());
                map.insert(
                    REFRESH_TOKEN_KEY.to_string(),
                    session.refresh_token.clone(),
                );
                map.insert(USER_KEY.to_string(), user_json);
                Ok(())
            }
        }
    }

    /// Re-mirror the profile into the tier that currently holds it.
    pub fn write_user(&self, tier: StorageTier, user: &UserProfile) -> Result<(), StoreError> {
        let user_json = serde_json::to_string(user)?;
        self.set(tier, USER_KEY, &user_json)
    }

    /// Read all three session keys from a single tier, durable first.
    ///
    /// Restoration never mixes tiers: a token in one tier and a profile in
    /// the other is treated as no session at all.
    pub fn read_same_tier(&self) -> Result<Option<(StorageTier, RawSession)>, StoreError> {
        for tier in [StorageTier::Durable, StorageTier::Ephemeral] {
            let token = self.get(tier, TOKEN_KEY)?;
            let refresh_token = self.get(tier, REFRESH_TOKEN_KEY)?;
            let user_json = self.get(tier, USER_KEY)?;
            if let (Some(token), Some(refresh_token), Some(user_json)) =
                (token, refresh_token, user_json)
            {
                return Ok(Some((
                    tier,
                    RawSession {
                        token,
                        refresh_token,
                        user_json,
                    },
                )));
            }
        }
        Ok(None)
    }

    /// Access token from whichever tier holds one, durable first.
    /// A corrupt durable file degrades to "no token" rather than failing a
    /// request that would otherwise go out unauthenticated.
    pub fn token_from_either(&self) -> Option<String> {
        self.lookup_either(TOKEN_KEY)
    }

    pub fn refresh_token_from_either(&self) -> Option<String> {
        self.lookup_either(REFRESH_TOKEN_KEY)
    }

    fn lookup_either(&self, key: &str) -> Option<String> {
        for tier in [StorageTier::Durable, StorageTier::Ephemeral] {
            match self.get(tier, key) {
                Ok(Some(value)) => return Some(value),
                Ok(None) => {}
                Err(err) => {
                    warn!(%key, %err, "session store read failed; treating as absent");
                }
            }
        }
        None
    }

    /// Unconditionally purge both tiers. Missing files are not an error and
    /// there is no partial state: the durable file goes away as a whole.
    pub fn clear_both(&self) {
        self.ephemeral_map().clear();
        match fs::remove_file(&self.durable_path) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                warn!(path = %self.durable_path.display(), %err, "failed to clear durable session file");
            }
        }
    }

    fn durable_map(&self) -> Result<HashMap<String, String>, StoreError> {
        let raw = match fs::read_to_string(&self.durable_path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(err) => return Err(StoreError::Io(err)),
        };
        Ok(serde_json::from_str(&raw)?)
    }

    fn write_durable(&self, map: &HashMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.durable_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let encoded = serde_json::to_string(map)?;
        fs::write(&self.durable_path, encoded)?;
        Ok(())
    }

    fn ephemeral_map(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.ephemeral.lock().unwrap_or_else(|e| e.into_inner())
    }
}
