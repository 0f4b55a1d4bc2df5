//! Snap API response types.
//!
//! The `/snap` endpoint answers one photo with a landmark identification,
//! an optional generated guide, and an optional narration audio reference.
//! Field names follow the backend's JSON exactly.

use serde::{Deserialize, Serialize};

/// GPS coordinates captured alongside a photo.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsFix {
    pub lat: f64,
    pub lng: f64,
}

/// Full response to a single snap call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapResult {
    /// Landmark identification outcome
    pub landmark: LandmarkReport,

    /// Generated guide content (absent when identification failed or
    /// needs clarification)
    pub guide: Option<Guide>,

    /// Whether the backend served this from its content cache
    #[serde(default)]
    pub cached: bool,

    /// Narration audio, when the guide was synthesized to speech
    pub audio: Option<AudioRef>,
}

impl SnapResult {
    /// Name of the top-confidence landmark, if any was identified.
    pub fn primary_landmark_name(&self) -> Option<&str> {
        self.landmark
            .landmarks
            .first()
            .map(|l| l.name.as_str())
    }

    /// True when the result carries playable narration audio.
    pub fn has_audio(&self) -> bool {
        self.audio.as_ref().map(|a| !a.url.is_empty()).unwrap_or(false)
    }

    /// Narration audio URL, when present.
    pub fn audio_url(&self) -> Option<&str> {
        self.audio.as_ref().map(|a| a.url.as_str()).filter(|u| !u.is_empty())
    }
}

/// Landmark identification section of a snap result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandmarkReport {
    /// Candidate landmarks, highest confidence first
    pub landmarks: Vec<Landmark>,

    /// True when the vision model could not settle on one landmark
    #[serde(default)]
    pub needs_clarification: bool,

    /// Question to show the user when clarification is needed
    pub clarification_message: Option<String>,
}

/// One identified landmark candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Landmark {
    pub name: String,
    pub confidence: f64,
    pub location: LandmarkLocation,
    pub category: String,
    pub brief_description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandmarkLocation {
    pub city: Option<String>,
    pub country: Option<String>,
}

/// Generated guide content for a landmark.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Guide {
    pub landmark_name: String,
    pub locale: String,
    pub title: String,
    pub summary: String,
    pub facts: Vec<GuideFact>,
    pub narration_script: String,
    pub fun_fact: Option<String>,
    pub confidence_note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuideFact {
    pub heading: String,
    pub body: String,
}

/// Reference to server-side narration audio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioRef {
    #[serde(rename = "audioId")]
    pub audio_id: String,

    /// URL (possibly relative to the API base) of the audio stream
    pub url: String,

    #[serde(default)]
    pub cached: bool,

    /// TTS voice used for synthesis
    pub voice: String,
}
