//! Conversation context store.
//!
//! Keeps a rolling window of turns per session in process memory. A session
//! expires after an idle period. Expiry is checked whenever the session is
//! touched, and writes sweep every expired session at most once per idle
//! period, so nothing runs in the background.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use wayfarer_core::config::ConversationConfig;
use wayfarer_core::types::ConversationTurn;

struct SessionEntry {
    turns: Vec<ConversationTurn>,
    last_active: Instant,
}

impl SessionEntry {
    fn is_expired(&self, idle_ttl: Duration, now: Instant) -> bool {
        now.duration_since(self.last_active) >= idle_ttl
    }
}

struct Sessions {
    entries: HashMap<String, SessionEntry>,
    last_sweep: Instant,
}

impl Sessions {
    fn get(&self, session_id: &str) -> Option<&SessionEntry> {
        self.entries.get(session_id)
    }

    fn remove(&mut self, session_id: &str) {
        self.entries.remove(session_id);
    }

    fn sweep(&mut self, idle_ttl: Duration, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(idle_ttl, now));
        self.last_sweep = now;
        before - self.entries.len()
    }
}

/// Per-session turn history with a length cap and idle expiry.
pub struct ConversationStore {
    /// Maximum turns kept per session. Older turns are dropped first.
    max_turns: usize,
    idle_ttl: Duration,
    sessions: Mutex<Sessions>,
}

impl ConversationStore {
    pub fn new(max_turns: usize, idle_ttl: Duration) -> Self {
        Self {
            max_turns,
            idle_ttl,
            sessions: Mutex::new(Sessions {
                entries: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }

    pub fn from_config(config: &ConversationConfig) -> Self {
        Self::new(config.max_turns, Duration::from_secs(config.idle_ttl_secs))
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// Turns for `session_id`, oldest first. Unknown or expired sessions are empty.
    pub fn get(&self, session_id: &str) -> Vec<ConversationTurn> {
        let mut sessions = match self.sessions.lock() {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("Session lock poisoned: {}", e);
                return Vec::new();
            }
        };

        let expired = match sessions.get(session_id) {
            Some(entry) => entry.is_expired(self.idle_ttl, Instant::now()),
            None => return Vec::new(),
        };
        if expired {
            sessions.remove(session_id);
            tracing::debug!(session_id, "Session expired");
            return Vec::new();
        }
        sessions
            .get(session_id)
            .map(|entry| entry.turns.clone())
            .unwrap_or_default()
    }

    /// Append a user/assistant exchange, then trim to the cap.
    ///
    /// Refreshes the idle timer. An expired session starts over empty.
    /// Sessions that nobody revisits are dropped by the periodic sweep.
    pub fn append(&self, session_id: &str, user: ConversationTurn, assistant: ConversationTurn) {
        let mut sessions = match self.sessions.lock() {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("Session lock poisoned: {}", e);
                return;
            }
        };

        let now = Instant::now();
        if now.duration_since(sessions.last_sweep) >= self.idle_ttl {
            let removed = sessions.sweep(self.idle_ttl, now);
            if removed > 0 {
                tracing::debug!(removed, "Expired sessions swept");
            }
        }

        let entry = sessions
            .entries
            .entry(session_id.to_string())
            .or_insert_with(|| SessionEntry {
                turns: Vec::new(),
                last_active: now,
            });
        if entry.is_expired(self.idle_ttl, now) {
            entry.turns.clear();
        }

        entry.turns.push(user);
        entry.turns.push(assistant);
        if entry.turns.len() > self.max_turns {
            let overflow = entry.turns.len() - self.max_turns;
            entry.turns.drain(..overflow);
        }
        entry.last_active = now;
    }

    /// Number of sessions that have not expired.
    pub fn active_sessions(&self) -> usize {
        let Ok(sessions) = self.sessions.lock() else {
            return 0;
        };
        let now = Instant::now();
        sessions
            .entries
            .values()
            .filter(|entry| !entry.is_expired(self.idle_ttl, now))
            .count()
    }

    /// Drop every expired session. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let Ok(mut sessions) = self.sessions.lock() else {
            return 0;
        };
        sessions.sweep(self.idle_ttl, Instant::now())
    }

    #[cfg(test)]
    pub(crate) fn backdate(&self, session_id: &str, by: Duration) {
        let mut sessions = self.sessions.lock().unwrap();
        if let Some(entry) = sessions.entries.get_mut(session_id) {
            entry.last_active = entry
                .last_active
                .checked_sub(by)
                .expect("instant underflow in test");
        }
    }

    /// Sessions held in memory, expired or not.
    #[cfg(test)]
    pub(crate) fn held(&self) -> usize {
        self.sessions.lock().unwrap().entries.len()
    }
}

// =============================================================================
// Tests
// =============================================================================
