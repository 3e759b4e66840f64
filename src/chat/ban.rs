//! Ban registry keyed by lowercase nickname.

use std::collections::HashSet;

use super::nick::nick_key;

/// Set of banned nicknames.
///
/// Bans are independent of whether the nickname is currently connected.
#[derive(Debug, Default, Clone)]
pub struct BanRegistry {
    banned: HashSet<String>,
}

impl BanRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ban a nickname. Returns false if it was already banned.
    pub fn ban(&mut self, nick: &str) -> bool {
        self.banned.insert(nick_key(nick))
    }

    /// Lift a ban. Returns false if the nickname was not banned.
    pub fn unban(&mut self, nick: &str) -> bool {
        self.banned.remove(&nick_key(nick))
    }

    /// Check whether a nickname is banned (case-insensitive).
    pub fn is_banned(&self, nick: &str) -> bool {
        self.banned.contains(&nick_key(nick))
    }

    /// Number of banned nicknames.
    pub fn len(&self) -> usize {
        self.banned.len()
    }

    /// Whether no nickname is banned.
    pub fn is_empty(&self) -> bool {
        self.banned.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ban_is_case_insensitive() {
        let mut bans = BanRegistry::new();
        assert!(bans.ban("Troll"));
        assert!(bans.is_banned("troll"));
        assert!(bans.is_banned("TROLL"));
        assert!(!bans.is_banned("trolls"));
    }

    #[test]
    fn test_ban_twice() {
        let mut bans = BanRegistry::new();
        assert!(bans.ban("troll"));
        assert!(!bans.ban("TROLL"));
        assert_eq!(bans.len(), 1);
    }

    #[test]
    fn test_unban() {
        let mut bans = BanRegistry::new();
        bans.ban("troll");
        assert!(bans.unban("Troll"));
        assert!(!bans.is_banned("troll"));
        assert!(!bans.unban("troll"));
        assert!(bans.is_empty());
    }
}
