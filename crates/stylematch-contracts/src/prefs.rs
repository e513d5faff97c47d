use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::languages::LanguageCode;

/// The single piece of persisted configuration: the display language.
///
/// Stored as one small JSON object. Loaded once on startup, rewritten on
/// every change; a missing or malformed file falls back to English.
#[derive(Debug, Clone)]
pub struct PreferenceStore {
    path: PathBuf,
    language: LanguageCode,
}

const LANGUAGE_KEY: &str = "language";

impl PreferenceStore {
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let language = read_json_object(&path)
            .and_then(|payload| {
                payload
                    .get(LANGUAGE_KEY)
                    .and_then(Value::as_str)
                    .and_then(LanguageCode::parse)
            })
            .unwrap_or_default();
        Self { path, language }
    }

    pub fn language(&self) -> LanguageCode {
        self.language
    }

    pub fn set_language(&mut self, language: LanguageCode) -> anyhow::Result<()> {
        if self.language == language {
            return Ok(());
        }
        self.language = language;
        self.flush()
    }

    fn flush(&self) -> anyhow::Result<()> {
        let mut payload = Map::new();
        payload.insert(
            LANGUAGE_KEY.to_string(),
            Value::String(self.language.code().to_string()),
        );
        write_json_object(&self.path, &payload)
    }
}

fn read_json_object(path: &Path) -> Option<Map<String, Value>> {
    let raw = std::fs::read_to_string(path).ok()?;
    let parsed: Value = serde_json::from_str(&raw).ok()?;
    parsed.as_object().cloned()
}

fn write_json_object(path: &Path, payload: &Map<String, Value>) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(
        path,
        serde_json::to_string_pretty(&Value::Object(payload.clone()))?,
    )?;
    Ok(())
}
