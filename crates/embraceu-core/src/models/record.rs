//! Typed records for the tables the app writes through the offline queue

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// JSON object written to a remote table
pub type JsonObject = serde_json::Map<String, serde_json::Value>;

/// Remote tables that accept offline writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    /// Daily mood check-ins
    MoodEntries,
    /// Gratitude journal entries
    GratitudeEntries,
    /// Completed guided breathing rituals
    BreathingSessions,
    /// Free-form journal entries
    JournalEntries,
}

impl Destination {
    pub const ALL: [Self; 4] = [
        Self::MoodEntries,
        Self::GratitudeEntries,
        Self::BreathingSessions,
        Self::JournalEntries,
    ];

    /// Remote table name
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MoodEntries => "mood_entries",
            Self::GratitudeEntries => "gratitude_entries",
            Self::BreathingSessions => "breathing_sessions",
            Self::JournalEntries => "journal_entries",
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Destination {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let table = s.trim();
        Self::ALL
            .into_iter()
            .find(|destination| destination.as_str() == table)
            .ok_or_else(|| Error::InvalidInput(format!("unknown table '{table}'")))
    }
}

/// A mood check-in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoodEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub mood: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy_level: Option<u8>,
}

/// A gratitude journal line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GratitudeEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub content: String,
}

/// A finished breathing ritual
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreathingSession {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub pattern: String,
    pub duration_seconds: u32,
}

/// A free-form journal entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub content: String,
}

/// A record bound for one of the known destinations.
///
/// `Raw` keeps a known destination but leaves the record shape to the
/// remote schema.
#[derive(Debug, Clone, PartialEq)]
pub enum WellnessRecord {
    Mood(MoodEntry),
    Gratitude(GratitudeEntry),
    Breathing(BreathingSession),
    Journal(JournalEntry),
    Raw {
        destination: Destination,
        data: JsonObject,
    },
}

impl WellnessRecord {
    pub const fn destination(&self) -> Destination {
        match self {
            Self::Mood(_) => Destination::MoodEntries,
            Self::Gratitude(_) => Destination::GratitudeEntries,
            Self::Breathing(_) => Destination::BreathingSessions,
            Self::Journal(_) => Destination::JournalEntries,
            Self::Raw { destination, .. } => *destination,
        }
    }

    /// Parse a table name and a JSON object into a raw record.
    pub fn from_parts(table: &str, payload: &str) -> Result<Self> {
        let destination = table.parse()?;
        let value: serde_json::Value = serde_json::from_str(payload)?;
        let serde_json::Value::Object(data) = value else {
            return Err(Error::InvalidInput(
                "record payload must be a JSON object".to_string(),
            ));
        };
        Ok(Self::Raw { destination, data })
    }

    /// Split into the destination and the JSON object sent to it.
    pub fn into_parts(self) -> Result<(Destination, JsonObject)> {
        let destination = self.destination();
        let data = match self {
            Self::Mood(entry) => to_object(&entry)?,
            Self::Gratitude(entry) => to_object(&entry)?,
            Self::Breathing(entry) => to_object(&entry)?,
            Self::Journal(entry) => to_object(&entry)?,
            Self::Raw { data, .. } => data,
        };
        Ok((destination, data))
    }
}

impl From<MoodEntry> for WellnessRecord {
    fn from(value: MoodEntry) -> Self {
        Self::Mood(value)
    }
}

impl From<GratitudeEntry> for WellnessRecord {
    fn from(value: GratitudeEntry) -> Self {
        Self::Gratitude(value)
    }
}

impl From<BreathingSession> for WellnessRecord {
    fn from(value: BreathingSession) -> Self {
        Self::Breathing(value)
    }
}

impl From<JournalEntry> for WellnessRecord {
    fn from(value: JournalEntry) -> Self {
        Self::Journal(value)
    }
}

fn to_object<T: Serialize>(value: &T) -> Result<JsonObject> {
    match serde_json::to_value(value)? {
        serde_json::Value::Object(map) => Ok(map),
        _ => Err(Error::InvalidInput(
            "record did not serialize to a JSON object".to_string(),
        )),
    }
}
