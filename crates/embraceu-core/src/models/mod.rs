//! Data models for EmbraceU offline writes

mod entry;
mod record;

pub use entry::{EntryId, QueuedEntry};
pub use record::{
    BreathingSession, Destination, GratitudeEntry, JournalEntry, JsonObject, MoodEntry,
    WellnessRecord,
};
