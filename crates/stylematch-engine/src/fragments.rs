use stylematch_contracts::analysis::{AnalysisResult, GeneratedImage};

use crate::error::AnalysisError;

/// Characters of offending raw text preserved in a parse-fallback result.
const FALLBACK_RAW_TEXT_MAX_CHARS: usize = 600;

/// One unit of a multi-part remote response. The producer guarantees
/// neither the ordering nor the cardinality of either kind.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseFragment {
    Text(String),
    InlineImage {
        bytes: Vec<u8>,
        mime_type: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub struct ParsedResponse {
    pub analysis: AnalysisResult,
    pub image: Option<GeneratedImage>,
}

/// Tolerant scan of a fragment sequence into exactly one analysis and at
/// most one generated image.
///
/// Text fragments may wrap the JSON object in prose or markdown fences, so
/// only the substring between the first `{` and the last `}` is parsed.
/// A malformed text fragment degrades into a fallback result instead of
/// failing the operation; the last successfully handled fragment of each
/// kind wins. A sequence with zero text fragments is a contract violation.
pub fn parse_fragments(fragments: &[ResponseFragment]) -> Result<ParsedResponse, AnalysisError> {
    let mut analysis: Option<AnalysisResult> = None;
    let mut image: Option<GeneratedImage> = None;

    for fragment in fragments {
        match fragment {
            ResponseFragment::Text(text) => {
                let parsed = extract_json_span(text)
                    .and_then(|span| serde_json::from_str::<AnalysisResult>(span).ok());
                analysis = Some(parsed.unwrap_or_else(|| {
                    AnalysisResult::parse_fallback(text, FALLBACK_RAW_TEXT_MAX_CHARS)
                }));
            }
            ResponseFragment::InlineImage { bytes, mime_type } => {
                image = Some(GeneratedImage {
                    bytes: bytes.clone(),
                    mime_type: mime_type.clone(),
                });
            }
        }
    }

    let analysis = analysis.ok_or(AnalysisError::MissingAnalysis)?;
    Ok(ParsedResponse { analysis, image })
}

/// Strict single-payload parse for the text-only mode, where the remote
/// call is steered to pure JSON and a malformed body is a hard failure.
pub fn parse_strict(text: &str) -> anyhow::Result<AnalysisResult> {
    serde_json::from_str(text.trim())
        .map_err(|err| anyhow::anyhow!("analysis JSON malformed: {err}"))
}

/// Substring between the first `{` and the last `}`, when the closing brace
/// follows the opening one.
fn extract_json_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}
