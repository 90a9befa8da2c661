//! Last nickname used by each identity, offered back on the nickname screen.

use dashmap::DashMap;

use crate::state::player::PlayerId;

/// Local persistence of the last nickname a player typed.
pub trait NicknameMemory: Send + Sync {
    /// Nickname saved for `player`, if any.
    fn load_last_nickname(&self, player: &PlayerId) -> Option<String>;

    /// Remember `nickname` for `player`, replacing the previous one.
    fn save_last_nickname(&self, player: &PlayerId, nickname: &str);
}

/// Process-local nickname memory.
#[derive(Default)]
pub struct InMemoryNicknameMemory {
    entries: DashMap<PlayerId, String>,
}

impl InMemoryNicknameMemory {
    /// Empty memory.
    pub fn new() -> Self {
        Self::default()
    }
}

impl NicknameMemory for InMemoryNicknameMemory {
    fn load_last_nickname(&self, player: &PlayerId) -> Option<String> {
        self.entries.get(player).map(|entry| entry.value().clone())
    }

    fn save_last_nickname(&self, player: &PlayerId, nickname: &str) {
        self.entries.insert(player.clone(), nickname.to_owned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_latest_nickname_per_player() {
        let memory = InMemoryNicknameMemory::new();
        let ann = PlayerId::generate();
        let bob = PlayerId::generate();

        assert_eq!(memory.load_last_nickname(&ann), None);
        memory.save_last_nickname(&ann, "ann");
        memory.save_last_nickname(&ann, "annie");
        memory.save_last_nickname(&bob, "bob");

        assert_eq!(memory.load_last_nickname(&ann).as_deref(), Some("annie"));
        assert_eq!(memory.load_last_nickname(&bob).as_deref(), Some("bob"));
    }
}
