//! Recognition session state machine
//!
//! Owns at most one listening worker at a time. The worker drives the
//! fingerprint engine on a background thread and reports a single
//! terminal event per session over a channel; subscribers drain the
//! channel from their own thread.

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

use super::{FingerprintEngine, MicAccess, RecognitionMatch, SessionError, Verdict};

/// Lifecycle state of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No capture in progress
    Idle,
    /// Audio is being captured and fed to the engine
    Listening,
}

/// Tagged session result, delivered over the event channel
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Capture started; the engine is accumulating audio
    Started,
    /// The engine identified a song; session is back to idle
    Matched(RecognitionMatch),
    /// The engine is confident there is no match; back to idle
    NoMatch,
    /// The session failed; back to idle
    Failed(SessionError),
}

struct Worker {
    cancel: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Controller for song recognition sessions
pub struct RecognitionSession {
    mic: Box<dyn MicAccess>,
    state: Arc<Mutex<SessionState>>,
    events_tx: Sender<SessionEvent>,
    events_rx: Receiver<SessionEvent>,
    worker: Option<Worker>,
}

impl RecognitionSession {
    /// Create an idle session using the given permission source
    pub fn new(mic: Box<dyn MicAccess>) -> Self {
        let (events_tx, events_rx) = unbounded();
        Self {
            mic,
            state: Arc::new(Mutex::new(SessionState::Idle)),
            events_tx,
            events_rx,
            worker: None,
        }
    }

    /// Channel carrying this session's events
    pub fn events(&self) -> Receiver<SessionEvent> {
        self.events_rx.clone()
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Start listening with the given engine.
    ///
    /// If a previous session is still live it is torn down first; the
    /// audio input is an exclusive resource. A denied microphone grant
    /// emits `Failed(PermissionDenied)` without ever opening capture.
    pub fn start(&mut self, mut engine: Box<dyn FingerprintEngine>) {
        self.teardown_worker();

        if !self.mic.ensure_granted() {
            warn!("Microphone access denied; recognition session not started");
            let _ = self.events_tx.send(SessionEvent::Failed(SessionError::PermissionDenied));
            return;
        }

        let cancel = Arc::new(AtomicBool::new(false));
        let state = self.state.clone();
        let events = self.events_tx.clone();
        let cancel_flag = cancel.clone();

        *self.state.lock() = SessionState::Listening;
        info!("Recognition session starting");

        let handle = std::thread::spawn(move || {
            run_session(engine.as_mut(), &events, &cancel_flag);
            *state.lock() = SessionState::Idle;
        });

        self.worker = Some(Worker { cancel, handle });
    }

    /// Stop listening. Valid from any state; a live session is torn
    /// down without emitting a terminal event.
    pub fn stop(&mut self) {
        self.teardown_worker();
    }

    fn teardown_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.cancel.store(true, Ordering::SeqCst);
            let _ = worker.handle.join();
            *self.state.lock() = SessionState::Idle;
            debug!("Previous recognition worker torn down");
        }
    }
}

impl Drop for RecognitionSession {
    fn drop(&mut self) {
        self.teardown_worker();
    }
}

/// Worker loop: one terminal event per session, unless cancelled first
fn run_session(
    engine: &mut dyn FingerprintEngine,
    events: &Sender<SessionEvent>,
    cancel: &AtomicBool,
) {
    if let Err(e) = engine.begin() {
        warn!("Audio capture failed to start: {}", e);
        let _ = events.send(SessionEvent::Failed(SessionError::Engine(e)));
        return;
    }

    let _ = events.send(SessionEvent::Started);

    let terminal = loop {
        if cancel.load(Ordering::SeqCst) {
            break None;
        }
        match engine.advance() {
            // Not enough audio yet; stay listening
            Ok(Verdict::Insufficient) => continue,
            Ok(Verdict::Match(m)) => {
                info!(
                    "Matched '{}' by '{}'",
                    m.title.as_deref().unwrap_or("?"),
                    m.artist.as_deref().unwrap_or("?")
                );
                break Some(SessionEvent::Matched(m));
            }
            Ok(Verdict::NoMatch) => {
                info!("Engine reported no match");
                break Some(SessionEvent::NoMatch);
            }
            Err(e) => {
                warn!("Engine fault during session: {}", e);
                break Some(SessionEvent::Failed(SessionError::Engine(e)));
            }
        }
    };

    engine.finish();

    // A cancelled session ends silently
    if let Some(event) = terminal {
        if !cancel.load(Ordering::SeqCst) {
            let _ = events.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognition::demo::ScriptedEngine;
    use crate::recognition::{EngineError, OpenMicAccess, PermissionStatus};
    use std::time::Duration;

    struct DeniedAccess;

    impl MicAccess for DeniedAccess {
        fn status(&self) -> PermissionStatus {
            PermissionStatus::Denied
        }

        fn request(&self) -> bool {
            false
        }
    }

    /// Engine that counts lifecycle calls; never matches
    struct CountingEngine {
        begun: Arc<AtomicBool>,
    }

    impl FingerprintEngine for CountingEngine {
        fn begin(&mut self) -> Result<(), EngineError> {
            self.begun.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn advance(&mut self) -> Result<Verdict, EngineError> {
            Ok(Verdict::NoMatch)
        }

        fn finish(&mut self) {}
    }

    fn recv(rx: &Receiver<SessionEvent>) -> SessionEvent {
        rx.recv_timeout(Duration::from_secs(5)).expect("session event")
    }

    #[test]
    fn test_match_after_insufficient_attempts() {
        let mut session = RecognitionSession::new(Box::new(OpenMicAccess));
        let events = session.events();

        let matched = RecognitionMatch {
            title: Some("Blackbird".to_string()),
            artist: Some("The Beatles".to_string()),
            ..Default::default()
        };
        session.start(Box::new(ScriptedEngine::new(vec![
            Ok(Verdict::Insufficient),
            Ok(Verdict::Insufficient),
            Ok(Verdict::Insufficient),
            Ok(Verdict::Match(matched.clone())),
        ])));

        assert!(matches!(recv(&events), SessionEvent::Started));
        match recv(&events) {
            SessionEvent::Matched(m) => assert_eq!(m, matched),
            other => panic!("expected Matched, got {:?}", other),
        }

        // Exactly one terminal event, then back to idle
        session.stop();
        assert_eq!(session.state(), SessionState::Idle);
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_no_match_is_terminal_but_not_an_error() {
        let mut session = RecognitionSession::new(Box::new(OpenMicAccess));
        let events = session.events();

        session.start(Box::new(ScriptedEngine::new(vec![Ok(Verdict::NoMatch)])));

        assert!(matches!(recv(&events), SessionEvent::Started));
        assert!(matches!(recv(&events), SessionEvent::NoMatch));
        session.stop();
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_engine_fault_emits_failed() {
        let mut session = RecognitionSession::new(Box::new(OpenMicAccess));
        let events = session.events();

        session.start(Box::new(ScriptedEngine::new(vec![Err(
            EngineError::Engine("signature generator died".to_string()),
        )])));

        assert!(matches!(recv(&events), SessionEvent::Started));
        assert!(matches!(
            recv(&events),
            SessionEvent::Failed(SessionError::Engine(_))
        ));
    }

    #[test]
    fn test_capture_fault_on_begin() {
        let mut session = RecognitionSession::new(Box::new(OpenMicAccess));
        let events = session.events();

        let mut engine = ScriptedEngine::new(vec![]);
        engine.fail_begin("no input device");
        session.start(Box::new(engine));

        // No Started event when capture never opens
        assert!(matches!(
            recv(&events),
            SessionEvent::Failed(SessionError::Engine(EngineError::Capture(_)))
        ));
    }

    #[test]
    fn test_denied_permission_never_opens_capture() {
        let mut session = RecognitionSession::new(Box::new(DeniedAccess));
        let events = session.events();

        let begun = Arc::new(AtomicBool::new(false));
        session.start(Box::new(CountingEngine { begun: begun.clone() }));

        assert!(matches!(
            recv(&events),
            SessionEvent::Failed(SessionError::PermissionDenied)
        ));
        assert_eq!(session.state(), SessionState::Idle);
        assert!(!begun.load(Ordering::SeqCst), "capture must not be opened");
    }

    #[test]
    fn test_stop_while_listening_emits_no_terminal_event() {
        let mut session = RecognitionSession::new(Box::new(OpenMicAccess));
        let events = session.events();

        // Engine that listens forever
        session.start(Box::new(ScriptedEngine::endless()));
        assert!(matches!(recv(&events), SessionEvent::Started));

        session.stop();
        assert_eq!(session.state(), SessionState::Idle);
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_restart_tears_down_previous_session() {
        let mut session = RecognitionSession::new(Box::new(OpenMicAccess));
        let events = session.events();

        session.start(Box::new(ScriptedEngine::endless()));
        assert!(matches!(recv(&events), SessionEvent::Started));

        // Second start replaces the first worker; the first must not
        // produce a terminal event after being displaced
        session.start(Box::new(ScriptedEngine::new(vec![Ok(Verdict::NoMatch)])));
        assert!(matches!(recv(&events), SessionEvent::Started));
        assert!(matches!(recv(&events), SessionEvent::NoMatch));

        session.stop();
        assert!(events.try_recv().is_err());
    }
}
