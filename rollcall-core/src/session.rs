//! Identity transition tracking.
//!
//! Decides when accumulated store content must be wiped versus preserved
//! across login/logout and auth-token flicker. The guard itself holds no
//! attendance data; the engine acts on its decisions.

use serde::{Deserialize, Serialize};

/// What the store should do in response to an observed transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionDecision {
    Preserve,
    Wipe,
}

/// Tracks the last observed identity and whether any load succeeded for it.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct SessionGuard {
    last_identity: Option<String>,
    loaded: bool,
}

impl SessionGuard {
    pub fn new() -> SessionGuard {
        SessionGuard::default()
    }

    /// Observe a (possibly transient) identity signal.
    ///
    /// A different identity always wipes. A `None` after a successful load
    /// is treated as token-refresh flicker and preserved; the identity is
    /// kept so the same user reappearing does not wipe either. Confirmed
    /// logout goes through [`SessionGuard::confirm_logout`] instead.
    pub fn observe_identity(&mut self, identity: Option<&str>) -> SessionDecision {
        match (self.last_identity.as_deref(), identity) {
            (Some(last), Some(current)) if last == current => SessionDecision::Preserve,
            (Some(_), Some(current)) => {
                self.last_identity = Some(current.to_string());
                self.loaded = false;
                SessionDecision::Wipe
            }
            (None, Some(current)) => {
                self.last_identity = Some(current.to_string());
                self.loaded = false;
                // Nothing accumulated under a previous identity; a wipe is
                // the empty-but-valid baseline for the new one.
                SessionDecision::Wipe
            }
            (Some(_), None) if self.loaded => SessionDecision::Preserve,
            (Some(_), None) | (None, None) => SessionDecision::Wipe,
        }
    }

    /// The user explicitly logged out: always wipe.
    pub fn confirm_logout(&mut self) -> SessionDecision {
        self.last_identity = None;
        self.loaded = false;
        SessionDecision::Wipe
    }

    /// Record that a fetch for the current identity succeeded.
    pub fn mark_loaded(&mut self) {
        self.loaded = true;
    }

    /// Whether any fetch has succeeded since the last identity change.
    /// Governs the fetch-failure policy: preserve existing content if so,
    /// fall back to empty defaults if not.
    pub fn has_loaded(&self) -> bool {
        self.loaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_change_wipes() {
        let mut guard = SessionGuard::new();
        guard.observe_identity(Some("alice"));
        guard.mark_loaded();
        assert_eq!(guard.observe_identity(Some("bob")), SessionDecision::Wipe);
        assert!(!guard.has_loaded());
    }

    #[test]
    fn test_same_identity_preserves() {
        let mut guard = SessionGuard::new();
        guard.observe_identity(Some("alice"));
        guard.mark_loaded();
        assert_eq!(
            guard.observe_identity(Some("alice")),
            SessionDecision::Preserve
        );
        assert!(guard.has_loaded());
    }

    #[test]
    fn test_transient_null_after_load_preserves() {
        let mut guard = SessionGuard::new();
        guard.observe_identity(Some("alice"));
        guard.mark_loaded();
        // Token refresh flicker: identity momentarily unavailable
        assert_eq!(guard.observe_identity(None), SessionDecision::Preserve);
        assert_eq!(
            guard.observe_identity(Some("alice")),
            SessionDecision::Preserve
        );
    }

    #[test]
    fn test_null_before_any_load_wipes() {
        let mut guard = SessionGuard::new();
        guard.observe_identity(Some("alice"));
        assert_eq!(guard.observe_identity(None), SessionDecision::Wipe);
    }

    #[test]
    fn test_confirmed_logout_always_wipes() {
        let mut guard = SessionGuard::new();
        guard.observe_identity(Some("alice"));
        guard.mark_loaded();
        assert_eq!(guard.confirm_logout(), SessionDecision::Wipe);
        assert!(!guard.has_loaded());
    }
}
