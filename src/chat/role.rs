//! Role model for chat sessions.
//!
//! Roles are ordered by permission level: `guest < user < mod = op < admin`.
//! `mod` and `op` are peers with distinct labels. `admin` satisfies every
//! threshold.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Privilege label of a chat session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Freshly joined session.
    #[default]
    Guest,
    /// Promoted regular user.
    User,
    /// Moderator.
    Mod,
    /// Operator (same privilege as moderator).
    Op,
    /// The configured administrator.
    Admin,
}

impl Role {
    /// String representation used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Guest => "guest",
            Role::User => "user",
            Role::Mod => "mod",
            Role::Op => "op",
            Role::Admin => "admin",
        }
    }

    /// Numeric permission level.
    pub fn permission_level(&self) -> u8 {
        match self {
            Role::Guest => 0,
            Role::User => 1,
            Role::Mod | Role::Op => 2,
            Role::Admin => 3,
        }
    }

    /// Check if this role meets the given threshold.
    ///
    /// # Examples
    ///
    /// ```
    /// use parlor::chat::Role;
    ///
    /// assert!(Role::Op.at_least(Role::Mod));
    /// assert!(Role::Mod.at_least(Role::Op));
    /// assert!(!Role::User.at_least(Role::Mod));
    /// assert!(Role::Admin.at_least(Role::Admin));
    /// ```
    pub fn at_least(&self, threshold: Role) -> bool {
        *self == Role::Admin || self.permission_level() >= threshold.permission_level()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
