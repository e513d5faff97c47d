use serde::{Deserialize, Serialize};

/// Structured stylist feedback returned by the remote model.
///
/// The single-outfit flow only populates `verdict` and `feedback`; the
/// try-on flows additionally carry the score and suggestion fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub verdict: String,
    pub feedback: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compatibility_score: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_suggestions: Option<String>,
}

impl AnalysisResult {
    /// Degraded-but-valid result standing in for a text part that could not
    /// be parsed. The raw text is embedded (bounded) so the user can see
    /// what the model actually said.
    pub fn parse_fallback(raw_text: &str, max_chars: usize) -> Self {
        let mut excerpt: String = raw_text.chars().take(max_chars).collect();
        if raw_text.chars().count() > max_chars {
            excerpt.push('…');
        }
        Self {
            verdict: "Analysis Error".to_string(),
            feedback: format!(
                "The AI returned a text response that could not be parsed as valid JSON. \
                 This can sometimes happen with complex images. Please try again. Raw text:\n{excerpt}"
            ),
            compatibility_score: None,
            suggestion: None,
            color_suggestions: None,
        }
    }
}

/// Raw image bytes produced by a try-on request.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub mime_type: Option<String>,
}

/// Uniform result of one analysis invocation. `generated_image` is absent
/// for the text-only mode and may legitimately be absent for the try-on
/// modes when the model returns analysis text without an image.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub analysis: AnalysisResult,
    pub generated_image: Option<GeneratedImage>,
}
