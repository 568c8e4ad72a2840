//! Application Coordinator
//!
//! Owns the database, the recognition session, and the shared state.
//! Session events arrive on a channel and are applied on the caller's
//! thread, which keeps all observable state mutations on the thread
//! that owns the UI.

use crossbeam_channel::Receiver;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::recognition::{
    FingerprintEngine, MicAccess, RecognitionMatch, RecognitionSession, SessionEvent, SessionState,
};
use crate::shared::SharedAppState;
use crate::storage::database::{Database, StoreError};
use crate::storage::records::{HistoryRecord, Profile, SavedTabRecord, TabType};
use crate::tabs::TabLinks;

/// Coordinator-level errors
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A save was attempted without the state it needs
    #[error("missing context: {0}")]
    MissingContext(&'static str),
    /// Persistence failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of a save-tab action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// A new bookmark row was written
    Saved,
    /// The (profile, url) pair was already bookmarked; nothing written
    AlreadySaved,
}

/// Main application coordinator
pub struct App {
    /// Shared state; the owning thread applies all mutations
    pub shared_state: Arc<RwLock<SharedAppState>>,
    db: Arc<Database>,
    session: RecognitionSession,
    events: Receiver<SessionEvent>,
}

impl App {
    /// Create the coordinator, restoring the active profile remembered
    /// in the config (a stale id silently resolves to no profile)
    pub fn new(config: AppConfig, db: Arc<Database>, mic: Box<dyn MicAccess>) -> Self {
        let session = RecognitionSession::new(mic);
        let events = session.events();
        let mut state = SharedAppState::new(config);

        if let Some(id) = state.config.general.active_profile.clone() {
            match db.get_profile(&id) {
                Ok(Some(profile)) => {
                    info!("Restored active profile '{}'", profile.name);
                    state.active_profile = Some(profile);
                }
                Ok(None) => {
                    warn!("Remembered profile {} no longer exists", id);
                    state.config.general.active_profile = None;
                }
                Err(e) => warn!("Could not restore active profile: {}", e),
            }
        }

        Self {
            shared_state: Arc::new(RwLock::new(state)),
            db,
            session,
            events,
        }
    }

    /// Get current shared state
    pub fn state(&self) -> Arc<RwLock<SharedAppState>> {
        self.shared_state.clone()
    }

    // --- Profiles ---

    /// Create a profile and make it active
    pub fn create_profile(&self, name: &str) -> Result<Profile, AppError> {
        let profile = Profile::new(name);
        self.db.upsert_profile(&profile)?;
        self.shared_state
            .write()
            .set_active_profile(Some(profile.clone()));
        info!("Created profile '{}' ({})", profile.name, profile.id);
        Ok(profile)
    }

    /// Make an existing profile active
    pub fn activate_profile(&self, id: &str) -> Result<Profile, AppError> {
        let profile = self
            .db
            .get_profile(id)?
            .ok_or_else(|| StoreError::ProfileNotFound(id.to_string()))?;
        self.shared_state
            .write()
            .set_active_profile(Some(profile.clone()));
        Ok(profile)
    }

    /// Delete a profile; dependent history and tabs cascade
    pub fn delete_profile(&self, id: &str) -> Result<(), AppError> {
        self.db.delete_profile(id)?;
        let mut state = self.shared_state.write();
        if state.active_profile_id() == Some(id) {
            state.set_active_profile(None);
        }
        Ok(())
    }

    // --- Recognition ---

    /// Start a recognition session with the given engine
    pub fn start_listening(&mut self, engine: Box<dyn FingerprintEngine>) {
        self.shared_state.write().runtime.reset_for_new_session();
        self.session.start(engine);
    }

    /// Cancel a session without waiting for a result
    pub fn stop_listening(&mut self) {
        self.session.stop();
        self.shared_state.write().runtime.is_listening = false;
    }

    /// Current session state
    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    /// Drain pending session events, applying each to the shared state.
    /// Call from the thread that owns the state.
    pub fn poll_events(&self) -> Vec<SessionEvent> {
        let drained: Vec<SessionEvent> = self.events.try_iter().collect();
        for event in &drained {
            self.apply_event(event);
        }
        drained
    }

    /// Block until the session reaches a terminal event or the timeout
    /// elapses, applying every event seen along the way
    pub fn wait_for_result(&self, timeout: Duration) -> Option<SessionEvent> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.checked_duration_since(Instant::now())?;
            let event = self.events.recv_timeout(remaining).ok()?;
            self.apply_event(&event);
            match event {
                SessionEvent::Started => continue,
                terminal => return Some(terminal),
            }
        }
    }

    fn apply_event(&self, event: &SessionEvent) {
        match event {
            SessionEvent::Started => {
                let mut state = self.shared_state.write();
                state.runtime.reset_for_new_session();
                state.runtime.is_listening = true;
            }
            SessionEvent::Matched(m) => {
                self.shared_state.write().runtime.is_listening = false;
                self.handle_match(m);
            }
            SessionEvent::NoMatch => {
                self.shared_state.write().runtime.is_listening = false;
            }
            SessionEvent::Failed(e) => {
                let mut state = self.shared_state.write();
                state.runtime.is_listening = false;
                state.runtime.set_error(e.to_string());
            }
        }
    }

    /// A match arrived: derive tab links, check existing bookmarks,
    /// and append a history record for the active profile
    fn handle_match(&self, m: &RecognitionMatch) {
        let (search_url, profile_id) = {
            let state = self.shared_state.read();
            (
                state.config.lookup.search_url.clone(),
                state.active_profile_id().map(String::from),
            )
        };

        let links = TabLinks::derive(&search_url, m.title.as_deref(), m.artist.as_deref());
        let (guitar_saved, piano_saved) = match (&links, &profile_id) {
            (Some(links), Some(pid)) => (
                self.is_tab_saved(pid, &links.guitar),
                self.is_tab_saved(pid, &links.piano),
            ),
            _ => (false, false),
        };

        let history_error = match &profile_id {
            Some(pid) => {
                let mut record =
                    HistoryRecord::new(pid, m.title.as_deref().unwrap_or("Unknown Title"));
                record.artist = m.artist.clone();
                record.artwork_url = m.artwork_url.clone();
                record.provider_track_id = m.provider_track_id.clone();
                match self.db.append_history(record) {
                    Ok(_) => None,
                    Err(e) => {
                        warn!("Failed to save recognition history: {}", e);
                        Some("Couldn't save to history. Please try again later.".to_string())
                    }
                }
            }
            None => {
                warn!("No active profile; match not saved to history");
                Some("No active profile to save history.".to_string())
            }
        };

        let mut state = self.shared_state.write();
        state.runtime.current_match = Some(m.clone());
        state.runtime.tab_links = links;
        state.runtime.guitar_tab_saved = guitar_saved;
        state.runtime.piano_tab_saved = piano_saved;
        state.runtime.history_error = history_error;
    }

    fn is_tab_saved(&self, profile_id: &str, tab_url: &str) -> bool {
        match self.db.find_tab(profile_id, tab_url) {
            Ok(found) => found.is_some(),
            Err(e) => {
                // Possibly a transient store error; leave the flag unset
                warn!("Error checking saved tab: {}", e);
                false
            }
        }
    }

    // --- Save-tab actions ---

    /// Bookmark the guitar link of the current match
    pub fn save_guitar_tab(&self) -> Result<SaveOutcome, AppError> {
        self.save_tab(TabType::Guitar)
    }

    /// Bookmark the piano link of the current match
    pub fn save_piano_tab(&self) -> Result<SaveOutcome, AppError> {
        self.save_tab(TabType::Piano)
    }

    fn save_tab(&self, tab_type: TabType) -> Result<SaveOutcome, AppError> {
        let (profile_id, title, artist, url) = {
            let state = self.shared_state.read();
            let profile_id = state
                .active_profile_id()
                .ok_or(AppError::MissingContext("no active profile"))?
                .to_string();
            let runtime = &state.runtime;
            let title = runtime
                .current_match
                .as_ref()
                .and_then(|m| m.title.clone())
                .ok_or(AppError::MissingContext("no identified song title"))?;
            let artist = runtime.current_match.as_ref().and_then(|m| m.artist.clone());
            let links = runtime
                .tab_links
                .as_ref()
                .ok_or(AppError::MissingContext("no derived tab link"))?;
            let url = match tab_type {
                TabType::Piano => links.piano.clone(),
                _ => links.guitar.clone(),
            };
            (profile_id, title, artist, url)
        };

        // Re-saving an existing bookmark is a no-op success
        if self.db.find_tab(&profile_id, &url)?.is_some() {
            self.mark_tab_saved(tab_type);
            return Ok(SaveOutcome::AlreadySaved);
        }

        let mut record = SavedTabRecord::new(&profile_id, &title, &url, tab_type);
        record.artist = artist;
        match self.db.save_tab(record) {
            Ok(_) => {
                self.mark_tab_saved(tab_type);
                self.shared_state.write().runtime.tab_save_error = None;
                Ok(SaveOutcome::Saved)
            }
            Err(e) => {
                let mut state = self.shared_state.write();
                state.runtime.tab_save_error =
                    Some(format!("Failed to save {} tab.", tab_type));
                Err(e.into())
            }
        }
    }

    fn mark_tab_saved(&self, tab_type: TabType) {
        let mut state = self.shared_state.write();
        match tab_type {
            TabType::Piano => state.runtime.piano_tab_saved = true,
            _ => state.runtime.guitar_tab_saved = true,
        }
    }
}
