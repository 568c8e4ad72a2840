//! Shared application state
//!
//! One UI-owning thread holds this state; background work (store
//! calls, session events, lookups) reports back and the owner applies
//! the results here before re-rendering.

use crate::config::AppConfig;
use crate::recognition::RecognitionMatch;
use crate::storage::records::Profile;
use crate::tabs::TabLinks;

/// Central application state
#[derive(Debug, Clone, Default)]
pub struct SharedAppState {
    /// Application configuration
    pub config: AppConfig,
    /// Profile all history and bookmark operations are scoped to
    pub active_profile: Option<Profile>,
    /// Runtime state (not persisted)
    pub runtime: RuntimeState,
}

impl SharedAppState {
    /// Create a new shared state with the given configuration
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            active_profile: None,
            runtime: RuntimeState::default(),
        }
    }

    /// Id of the active profile, if one is selected
    pub fn active_profile_id(&self) -> Option<&str> {
        self.active_profile.as_ref().map(|p| p.id.as_str())
    }

    /// Switch the active profile and remember it in the config
    pub fn set_active_profile(&mut self, profile: Option<Profile>) {
        self.config.general.active_profile = profile.as_ref().map(|p| p.id.clone());
        self.active_profile = profile;
    }
}

/// Runtime state that is not persisted
#[derive(Debug, Clone, Default)]
pub struct RuntimeState {
    /// Whether a recognition session is currently listening
    pub is_listening: bool,
    /// The most recent match, if any
    pub current_match: Option<RecognitionMatch>,
    /// Derived tab search links for the current match
    pub tab_links: Option<TabLinks>,
    /// Whether the guitar link is bookmarked for the current match
    pub guitar_tab_saved: bool,
    /// Whether the piano link is bookmarked for the current match
    pub piano_tab_saved: bool,
    /// User-visible message for a failed tab save
    pub tab_save_error: Option<String>,
    /// User-visible message for a failed history write
    pub history_error: Option<String>,
    /// Last session-level error message (if any)
    pub last_error: Option<String>,
}

impl RuntimeState {
    /// Clear match state when a new session starts
    pub fn reset_for_new_session(&mut self) {
        self.current_match = None;
        self.tab_links = None;
        self.guitar_tab_saved = false;
        self.piano_tab_saved = false;
        self.tab_save_error = None;
        self.history_error = None;
        self.last_error = None;
    }

    /// Set an error message
    pub fn set_error(&mut self, error: impl Into<String>) {
        self.last_error = Some(error.into());
    }

    /// Clear any error state
    pub fn clear_error(&mut self) {
        self.last_error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_active_profile_updates_config() {
        let mut state = SharedAppState::new(AppConfig::default());
        let profile = Profile::new("Alice");
        let id = profile.id.clone();

        state.set_active_profile(Some(profile));
        assert_eq!(state.active_profile_id(), Some(id.as_str()));
        assert_eq!(state.config.general.active_profile, Some(id));

        state.set_active_profile(None);
        assert!(state.active_profile_id().is_none());
        assert!(state.config.general.active_profile.is_none());
    }

    #[test]
    fn test_reset_for_new_session_clears_match_state() {
        let mut runtime = RuntimeState {
            current_match: Some(RecognitionMatch::default()),
            guitar_tab_saved: true,
            tab_save_error: Some("oops".to_string()),
            ..Default::default()
        };
        runtime.reset_for_new_session();
        assert!(runtime.current_match.is_none());
        assert!(!runtime.guitar_tab_saved);
        assert!(runtime.tab_save_error.is_none());
    }
}
