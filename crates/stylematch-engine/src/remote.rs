use std::env;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::blocking::Client as HttpClient;
use serde_json::{json, Map, Value};
use stylematch_contracts::prompts::PromptSpec;

use crate::encoder::EncodedImage;
use crate::fragments::ResponseFragment;

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_REQUEST_TIMEOUT_S: f64 = 90.0;

/// One fully resolved remote call: ordered payloads, the instruction, and
/// the structured-output steering for the selected mode.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: PromptSpec,
    pub images: Vec<EncodedImage>,
}

/// Seam between the orchestrator and the remote service, so the analysis
/// flow is exercisable against a stub.
pub trait GenerationTransport {
    fn generate(&self, request: &GenerationRequest) -> Result<Vec<ResponseFragment>>;
}

/// Blocking client for the Gemini `generateContent` endpoint.
///
/// Exactly one request per invocation and no transport retry: the call
/// triggers paid computation, so retrying is left to the user.
pub struct GeminiClient {
    api_base: String,
    api_key: String,
    timeout_s: f64,
    http: HttpClient,
}

impl GeminiClient {
    pub fn from_env() -> Result<Self> {
        let Some(api_key) = api_key_from_env() else {
            bail!("GEMINI_API_KEY or GOOGLE_API_KEY not set");
        };
        Ok(Self {
            api_base: env::var("STYLEMATCH_API_BASE")
                .ok()
                .map(|value| value.trim().trim_end_matches('/').to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            api_key,
            timeout_s: DEFAULT_REQUEST_TIMEOUT_S,
            http: HttpClient::new(),
        })
    }

    fn endpoint_for_model(&self, model: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }
}

impl GenerationTransport for GeminiClient {
    fn generate(&self, request: &GenerationRequest) -> Result<Vec<ResponseFragment>> {
        let endpoint = self.endpoint_for_model(&request.model);
        let payload = build_payload(request);

        let response = self
            .http
            .post(&endpoint)
            .query(&[("key", self.api_key.as_str())])
            .timeout(Duration::from_secs_f64(self.timeout_s))
            .json(&payload)
            .send()
            .with_context(|| format!("generation request failed ({endpoint})"))?;

        let status = response.status();
        let body: Value = response
            .json()
            .context("generation response body was not JSON")?;
        if !status.is_success() {
            bail!(
                "generation request rejected ({status}): {}",
                error_excerpt(&body)
            );
        }

        fragments_from_payload(&body)
    }
}

fn api_key_from_env() -> Option<String> {
    non_empty_env("GEMINI_API_KEY").or_else(|| non_empty_env("GOOGLE_API_KEY"))
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Request body for `generateContent`: the encoded images in slot order,
/// the prompt text last, and the mode's schema/modality hints. The hints
/// are best-effort steering, not a response guarantee.
pub fn build_payload(request: &GenerationRequest) -> Value {
    let mut parts: Vec<Value> = request
        .images
        .iter()
        .map(|image| {
            json!({
                "inlineData": {
                    "mimeType": image.mime_type,
                    "data": image.data,
                }
            })
        })
        .collect();
    parts.push(json!({ "text": request.prompt.text }));

    let mut generation_config = Map::new();
    if let Some(schema) = request.prompt.response_schema.as_ref() {
        generation_config.insert(
            "responseMimeType".to_string(),
            Value::String("application/json".to_string()),
        );
        generation_config.insert("responseSchema".to_string(), schema.clone());
    } else {
        generation_config.insert(
            "responseModalities".to_string(),
            Value::Array(
                request
                    .prompt
                    .modalities
                    .as_strs()
                    .iter()
                    .map(|value| Value::String(value.to_string()))
                    .collect(),
            ),
        );
    }

    json!({
        "contents": [{
            "role": "user",
            "parts": parts,
        }],
        "generationConfig": Value::Object(generation_config),
    })
}

/// Flattens the first candidate's parts into the closed fragment union.
/// Tolerates both key spellings the service has been observed to emit.
pub fn fragments_from_payload(payload: &Value) -> Result<Vec<ResponseFragment>> {
    let parts = payload
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
        .and_then(|candidate| candidate.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut fragments = Vec::new();
    for part in parts {
        if let Some(text) = part.get("text").and_then(Value::as_str) {
            fragments.push(ResponseFragment::Text(text.to_string()));
            continue;
        }
        let Some(inline) = part
            .get("inlineData")
            .or_else(|| part.get("inline_data"))
            .and_then(Value::as_object)
        else {
            continue;
        };
        let data = inline
            .get("data")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if data.is_empty() {
            continue;
        }
        let bytes = BASE64
            .decode(data.as_bytes())
            .context("inline image base64 decode failed")?;
        let mime_type = inline
            .get("mimeType")
            .or_else(|| inline.get("mime_type"))
            .and_then(Value::as_str)
            .map(str::to_string);
        fragments.push(ResponseFragment::InlineImage { bytes, mime_type });
    }
    Ok(fragments)
}

fn error_excerpt(body: &Value) -> String {
    let message = body
        .get("error")
        .and_then(|error| error.get("message"))
        .and_then(Value::as_str)
        .unwrap_or("no error detail provided");
    let mut excerpt: String = message.chars().take(300).collect();
    if message.chars().count() > 300 {
        excerpt.push('…');
    }
    excerpt
}

#[cfg(test)]
mod tests {
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine as _;
    use serde_json::{json, Value};
    use stylematch_contracts::languages::LanguageCode;
    use stylematch_contracts::modes::AnalysisMode;
    use stylematch_contracts::prompts::PromptSpec;

    use super::{build_payload, fragments_from_payload, GenerationRequest};
    use crate::encoder::EncodedImage;
    use crate::fragments::ResponseFragment;

    fn request_for(mode: AnalysisMode) -> GenerationRequest {
        GenerationRequest {
            model: "gemini-2.5-flash".to_string(),
            prompt: PromptSpec::select(mode, LanguageCode::En),
            images: vec![EncodedImage {
                data: "aGVsbG8=".to_string(),
                mime_type: "image/png".to_string(),
            }],
        }
    }

    #[test]
    fn payload_orders_images_before_prompt_text() {
        let payload = build_payload(&request_for(AnalysisMode::SingleOutfit));
        let parts = payload["contents"][0]["parts"]
            .as_array()
            .expect("parts array");
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/png");
        assert!(parts[1]["text"].as_str().expect("text part").len() > 100);
    }

    #[test]
    fn text_only_mode_sends_json_schema_steering() {
        let payload = build_payload(&request_for(AnalysisMode::SingleOutfit));
        let config = &payload["generationConfig"];
        assert_eq!(config["responseMimeType"], "application/json");
        assert_eq!(config["responseSchema"]["required"][0], "verdict");
        assert!(config.get("responseModalities").is_none());
    }

    #[test]
    fn tryon_mode_requests_image_and_text_modalities() {
        let payload = build_payload(&request_for(AnalysisMode::SareeTryOn));
        let config = &payload["generationConfig"];
        assert_eq!(config["responseModalities"], json!(["IMAGE", "TEXT"]));
        assert!(config.get("responseSchema").is_none());
    }

    #[test]
    fn response_parts_flatten_into_fragments_in_order() -> anyhow::Result<()> {
        let payload = json!({
            "candidates": [{
                "content": {
                    "parts": [
                        { "inlineData": { "mimeType": "image/png", "data": BASE64.encode(b"img") } },
                        { "text": "{\"verdict\":\"v\",\"feedback\":\"f\"}" },
                    ]
                }
            }]
        });
        let fragments = fragments_from_payload(&payload)?;
        assert_eq!(fragments.len(), 2);
        assert!(matches!(
            &fragments[0],
            ResponseFragment::InlineImage { bytes, .. } if bytes == b"img"
        ));
        assert!(matches!(&fragments[1], ResponseFragment::Text(_)));
        Ok(())
    }

    #[test]
    fn snake_case_inline_data_keys_are_tolerated() -> anyhow::Result<()> {
        let payload = json!({
            "candidates": [{
                "content": {
                    "parts": [
                        { "inline_data": { "mime_type": "image/jpeg", "data": BASE64.encode(b"jpg") } },
                    ]
                }
            }]
        });
        let fragments = fragments_from_payload(&payload)?;
        match &fragments[0] {
            ResponseFragment::InlineImage { bytes, mime_type } => {
                assert_eq!(bytes, b"jpg");
                assert_eq!(mime_type.as_deref(), Some("image/jpeg"));
            }
            other => panic!("unexpected fragment {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn empty_or_unrecognized_parts_are_skipped() -> anyhow::Result<()> {
        let payload = json!({
            "candidates": [{
                "content": {
                    "parts": [
                        { "inlineData": { "mimeType": "image/png", "data": "" } },
                        { "functionCall": { "name": "noop" } },
                    ]
                }
            }]
        });
        assert!(fragments_from_payload(&payload)?.is_empty());
        Ok(())
    }

    #[test]
    fn missing_candidates_yield_no_fragments() -> anyhow::Result<()> {
        assert!(fragments_from_payload(&Value::Null)?.is_empty());
        assert!(fragments_from_payload(&json!({"candidates": []}))?.is_empty());
        Ok(())
    }
}
