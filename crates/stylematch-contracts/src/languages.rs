use serde::{Deserialize, Serialize};

/// Display languages the stylist can answer in. The prompt embeds the
/// display name as a textual directive; nothing downstream assumes the
/// model honored it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageCode {
    #[default]
    En,
    Es,
    Fr,
}

impl LanguageCode {
    pub const ALL: [LanguageCode; 3] = [LanguageCode::En, LanguageCode::Es, LanguageCode::Fr];

    pub fn code(self) -> &'static str {
        match self {
            LanguageCode::En => "en",
            LanguageCode::Es => "es",
            LanguageCode::Fr => "fr",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            LanguageCode::En => "English",
            LanguageCode::Es => "Español",
            LanguageCode::Fr => "Français",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "en" => Some(LanguageCode::En),
            "es" => Some(LanguageCode::Es),
            "fr" => Some(LanguageCode::Fr),
            _ => None,
        }
    }
}
