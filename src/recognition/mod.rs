//! Song Recognition Layer
//!
//! Drives an opaque audio fingerprint engine behind a small session
//! state machine. The engine and the microphone permission prompt are
//! external collaborators; this layer only sequences them and reports
//! tagged results over a channel.

pub mod demo;
pub mod session;

pub use session::{RecognitionSession, SessionEvent, SessionState};

/// Fault reported by the fingerprint engine or the audio input
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    /// The audio input could not be opened or died mid-session
    #[error("audio capture fault: {0}")]
    Capture(String),
    /// The fingerprinting engine itself failed
    #[error("fingerprint engine fault: {0}")]
    Engine(String),
}

/// Terminal failure of a recognition session
#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    /// The user denied microphone access
    #[error("microphone access is required to identify songs")]
    PermissionDenied,
    /// Engine or audio hardware fault
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// A positive identification from the fingerprint engine
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecognitionMatch {
    /// Song title, if the catalog entry carries one
    pub title: Option<String>,
    /// Artist name
    pub artist: Option<String>,
    /// Artwork image URL
    pub artwork_url: Option<String>,
    /// Provider-side track identifier
    pub provider_track_id: Option<String>,
}

/// Outcome of one incremental fingerprint attempt
#[derive(Debug, Clone)]
pub enum Verdict {
    /// Not enough audio accumulated yet; keep listening
    Insufficient,
    /// Positive identification
    Match(RecognitionMatch),
    /// The engine is confident there is no match
    NoMatch,
}

/// Current state of the microphone capture grant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
    Undetermined,
}

/// Microphone capture permission, queried before any session starts
pub trait MicAccess: Send {
    /// Current grant state without prompting
    fn status(&self) -> PermissionStatus;

    /// Prompt the user and block until the grant resolves.
    /// Only called when `status` returns `Undetermined`.
    fn request(&self) -> bool;

    /// Resolve the grant, prompting if needed
    fn ensure_granted(&self) -> bool {
        match self.status() {
            PermissionStatus::Granted => true,
            PermissionStatus::Denied => false,
            PermissionStatus::Undetermined => self.request(),
        }
    }
}

/// Always-granted permission, for environments without a prompt
pub struct OpenMicAccess;

impl MicAccess for OpenMicAccess {
    fn status(&self) -> PermissionStatus {
        PermissionStatus::Granted
    }

    fn request(&self) -> bool {
        true
    }
}

/// Opaque audio fingerprint engine.
///
/// `begin` opens the single exclusive audio input tap, `advance` feeds
/// the next slice of audio and attempts a match, `finish` tears the tap
/// down. The session worker loops `advance` until a terminal verdict.
pub trait FingerprintEngine: Send {
    /// Open the audio input and start accumulating signature data
    fn begin(&mut self) -> Result<(), EngineError>;

    /// Feed the next audio slice and attempt a match
    fn advance(&mut self) -> Result<Verdict, EngineError>;

    /// Release the audio input
    fn finish(&mut self);
}
