//! Session registry and nickname directory.
//!
//! The registry owns every joined session, keyed by the transport-assigned
//! [`Identity`]. Nicknames are unique case-insensitively across all active
//! sessions; the uniqueness check runs on the sanitized form that is stored.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ban::BanRegistry;
use super::nick::{nick_key, sanitize_nick, validate_format};
use super::role::Role;

/// Opaque per-connection token assigned by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Wrap an existing token.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random identity.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Borrow the token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Server-side record of one joined client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Connection identity.
    #[serde(rename = "id")]
    pub identity: Identity,
    /// Sanitized nickname.
    pub nick: String,
    /// Current role.
    pub role: Role,
    /// When the session joined.
    #[serde(rename = "connected")]
    pub connected_at: DateTime<Utc>,
    /// Last inbound message, command or keep-alive.
    #[serde(rename = "lastActivity")]
    pub last_activity_at: DateTime<Utc>,
    #[serde(skip)]
    seq: u64,
}

impl Session {
    /// Whether this session holds the admin role.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Time since the last recorded activity.
    pub fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        now - self.last_activity_at
    }
}

/// Reasons a join attempt is rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JoinError {
    /// Nickname fails format validation.
    #[error("Invalid nickname (1-20 characters: letters, digits and _@-[]\\^{{}}|`)")]
    InvalidFormat,
    /// Nickname is in the ban registry.
    #[error("You are banned from this chat")]
    Banned,
    /// Another session already uses this nickname.
    #[error("This nickname is already in use")]
    NickTaken,
    /// The connection already has a session.
    #[error("You have already joined")]
    AlreadyJoined,
}

/// Reasons a nickname change is rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NickError {
    /// Nickname fails format validation.
    #[error("Invalid nickname")]
    InvalidFormat,
    /// Another session already uses this nickname.
    #[error("This nickname is already taken")]
    NickTaken,
    /// Nickname is in the ban registry.
    #[error("This nickname is banned")]
    Banned,
    /// Nickname is reserved for the administrator.
    #[error("This nickname is reserved")]
    Reserved,
}

/// A successful rename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NickChange {
    /// Nickname before the change.
    pub old_nick: String,
    /// Nickname after the change.
    pub new_nick: String,
}

/// Registry of all active sessions.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: HashMap<Identity, Session>,
    admin_key: String,
    next_seq: u64,
}

impl SessionRegistry {
    /// Create an empty registry for the given admin nickname.
    pub fn new(admin_nick: &str) -> Self {
        Self {
            sessions: HashMap::new(),
            admin_key: nick_key(admin_nick),
            next_seq: 0,
        }
    }

    /// Whether a nickname is the configured admin nickname.
    pub fn is_admin_nick(&self, nick: &str) -> bool {
        nick_key(nick) == self.admin_key
    }

    /// Number of active sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session is active.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Get a session by identity.
    pub fn get(&self, identity: &Identity) -> Option<&Session> {
        self.sessions.get(identity)
    }

    /// Check whether an identity has joined.
    pub fn contains(&self, identity: &Identity) -> bool {
        self.sessions.contains_key(identity)
    }

    /// Find a session by nickname, case-insensitively.
    pub fn lookup_by_nick(&self, nick: &str) -> Option<&Session> {
        let key = nick_key(nick);
        self.sessions.values().find(|s| nick_key(&s.nick) == key)
    }

    fn nick_in_use(&self, key: &str, except: Option<&Identity>) -> bool {
        self.sessions
            .values()
            .any(|s| Some(&s.identity) != except && nick_key(&s.nick) == key)
    }

    fn admin_present(&self) -> bool {
        self.sessions.values().any(Session::is_admin)
    }

    /// Snapshot of all sessions in join order.
    pub fn snapshot(&self) -> Vec<Session> {
        let mut sessions: Vec<Session> = self.sessions.values().cloned().collect();
        sessions.sort_by_key(|s| s.seq);
        sessions
    }

    /// Identities of all sessions in join order.
    pub fn identities(&self) -> Vec<Identity> {
        self.snapshot().into_iter().map(|s| s.identity).collect()
    }

    /// Register a new session.
    ///
    /// The role is `admin` iff the nickname equals the configured admin
    /// nickname (case-insensitive), otherwise `guest`.
    pub fn join(
        &mut self,
        identity: Identity,
        raw_nick: &str,
        bans: &BanRegistry,
        now: DateTime<Utc>,
    ) -> Result<Session, JoinError> {
        if self.contains(&identity) {
            return Err(JoinError::AlreadyJoined);
        }
        if !validate_format(raw_nick) {
            return Err(JoinError::InvalidFormat);
        }
        let nick = sanitize_nick(raw_nick);
        if nick.is_empty() {
            return Err(JoinError::InvalidFormat);
        }
        if bans.is_banned(raw_nick) || bans.is_banned(&nick) {
            return Err(JoinError::Banned);
        }
        let key = nick_key(&nick);
        if self.nick_in_use(&key, None) {
            return Err(JoinError::NickTaken);
        }

        let role = if key == self.admin_key || nick_key(raw_nick) == self.admin_key {
            // A renamed admin still holds the role; only one admin at a time.
            if self.admin_present() {
                return Err(JoinError::NickTaken);
            }
            Role::Admin
        } else {
            Role::Guest
        };

        let session = Session {
            identity: identity.clone(),
            nick,
            role,
            connected_at: now,
            last_activity_at: now,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.sessions.insert(identity, session.clone());
        Ok(session)
    }

    /// Rename a session.
    pub fn change_nick(
        &mut self,
        identity: &Identity,
        new_nick: &str,
        bans: &BanRegistry,
    ) -> Result<NickChange, NickError> {
        if !validate_format(new_nick) {
            return Err(NickError::InvalidFormat);
        }
        let nick = sanitize_nick(new_nick);
        if nick.is_empty() {
            return Err(NickError::InvalidFormat);
        }
        if bans.is_banned(new_nick) || bans.is_banned(&nick) {
            return Err(NickError::Banned);
        }
        let key = nick_key(&nick);
        if self.nick_in_use(&key, Some(identity)) {
            return Err(NickError::NickTaken);
        }

        let admin_key = self.admin_key.clone();
        let session = self
            .sessions
            .get_mut(identity)
            .ok_or(NickError::InvalidFormat)?;
        if key == admin_key && !session.is_admin() {
            return Err(NickError::Reserved);
        }

        let old_nick = std::mem::replace(&mut session.nick, nick.clone());
        Ok(NickChange {
            old_nick,
            new_nick: nick,
        })
    }

    /// Set a session's role, returning the previous role.
    pub fn set_role(&mut self, identity: &Identity, role: Role) -> Option<Role> {
        self.sessions
            .get_mut(identity)
            .map(|s| std::mem::replace(&mut s.role, role))
    }

    /// Record activity for a session. Returns false if the identity has not joined.
    pub fn touch(&mut self, identity: &Identity, now: DateTime<Utc>) -> bool {
        match self.sessions.get_mut(identity) {
            Some(session) => {
                session.last_activity_at = now;
                true
            }
            None => false,
        }
    }

    /// Remove a session. The caller broadcasts the departure.
    pub fn remove(&mut self, identity: &Identity) -> Option<Session> {
        self.sessions.remove(identity)
    }

    /// Sessions idle strictly longer than `timeout`, in join order.
    pub fn idle_sessions(&self, now: DateTime<Utc>, timeout: Duration) -> Vec<Identity> {
        self.snapshot()
            .into_iter()
            .filter(|s| s.idle_for(now) > timeout)
            .map(|s| s.identity)
            .collect()
    }
}
