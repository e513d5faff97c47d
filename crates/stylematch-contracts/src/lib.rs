pub mod analysis;
pub mod events;
pub mod languages;
pub mod modes;
pub mod prefs;
pub mod prompts;
