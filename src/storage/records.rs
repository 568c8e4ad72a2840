//! Record types for the local database
//!
//! Plain structs mapping 1:1 onto the three tables: user profiles,
//! recognition history, and saved tablature bookmarks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A local user profile scoping all history and bookmark data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// Stable opaque identifier (UUID v4 string)
    pub id: String,
    /// Display name
    pub name: String,
    /// When the profile was created
    pub created_at: DateTime<Utc>,
    /// Serialized preferences document, decoded on demand
    pub preferences_json: Option<String>,
}

impl Profile {
    /// Create a new profile with a fresh id and default preferences
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            created_at: Utc::now(),
            preferences_json: None,
        }
    }
}

/// One recognition event, written once per successful match
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Assigned by the database on insert
    pub id: Option<i64>,
    /// Owning profile
    pub profile_id: String,
    /// Identified song title
    pub song_title: String,
    /// Identified artist, if the engine reported one
    pub artist: Option<String>,
    /// Artwork image URL, if the engine reported one
    pub artwork_url: Option<String>,
    /// When the match occurred
    pub recognized_at: DateTime<Utc>,
    /// Track id from the recognition provider, if available
    pub provider_track_id: Option<String>,
    /// Free-form user notes
    pub notes: Option<String>,
}

impl HistoryRecord {
    /// Build an unsaved record for a fresh match
    pub fn new(profile_id: impl Into<String>, song_title: impl Into<String>) -> Self {
        Self {
            id: None,
            profile_id: profile_id.into(),
            song_title: song_title.into(),
            artist: None,
            artwork_url: None,
            recognized_at: Utc::now(),
            provider_track_id: None,
            notes: None,
        }
    }
}

/// A bookmarked tablature link
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedTabRecord {
    /// Assigned by the database on insert
    pub id: Option<i64>,
    /// Owning profile
    pub profile_id: String,
    /// Song title the tab belongs to
    pub song_title: String,
    /// Artist, if known
    pub artist: Option<String>,
    /// Source URL of the tab; unique per profile by convention
    pub tab_url: String,
    /// Instrument the tab targets
    pub tab_type: TabType,
    /// When the bookmark was created
    pub saved_at: DateTime<Utc>,
    /// Free-form user notes
    pub notes: Option<String>,
}

impl SavedTabRecord {
    /// Build an unsaved bookmark
    pub fn new(
        profile_id: impl Into<String>,
        song_title: impl Into<String>,
        tab_url: impl Into<String>,
        tab_type: TabType,
    ) -> Self {
        Self {
            id: None,
            profile_id: profile_id.into(),
            song_title: song_title.into(),
            artist: None,
            tab_url: tab_url.into(),
            tab_type,
            saved_at: Utc::now(),
            notes: None,
        }
    }
}

/// Instrument a saved tab targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabType {
    Guitar,
    Piano,
    Chords,
}

impl TabType {
    /// Stable string form used in the database column
    pub fn as_str(&self) -> &'static str {
        match self {
            TabType::Guitar => "guitar",
            TabType::Piano => "piano",
            TabType::Chords => "chords",
        }
    }

    /// Parse the database column value; unknown values are rejected
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "guitar" => Some(TabType::Guitar),
            "piano" => Some(TabType::Piano),
            "chords" => Some(TabType::Chords),
            _ => None,
        }
    }
}

impl std::fmt::Display for TabType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-profile preferences, stored as a JSON document on the profile row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Instrument preselected when saving tabs
    pub default_tab_type: TabType,
    /// Append matches to history automatically
    pub auto_save_history: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            default_tab_type: TabType::Guitar,
            auto_save_history: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_ids_are_unique() {
        let a = Profile::new("Alice");
        let b = Profile::new("Alice");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_tab_type_string_roundtrip() {
        for t in [TabType::Guitar, TabType::Piano, TabType::Chords] {
            assert_eq!(TabType::parse(t.as_str()), Some(t));
        }
        assert_eq!(TabType::parse("ukulele"), None);
    }

    #[test]
    fn test_preferences_default_fields() {
        let prefs = Preferences::default();
        assert_eq!(prefs.default_tab_type, TabType::Guitar);
        assert!(prefs.auto_save_history);
    }

    #[test]
    fn test_preferences_json_roundtrip() {
        let prefs = Preferences {
            default_tab_type: TabType::Piano,
            auto_save_history: false,
        };
        let json = serde_json::to_string(&prefs).unwrap();
        let parsed: Preferences = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, prefs);
    }

    #[test]
    fn test_preferences_tolerates_missing_fields() {
        // Older profiles may carry a partial document
        let parsed: Preferences = serde_json::from_str(r#"{"default_tab_type":"piano"}"#).unwrap();
        assert_eq!(parsed.default_tab_type, TabType::Piano);
        assert!(parsed.auto_save_history);
    }
}
