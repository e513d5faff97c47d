use serde_json::{json, Value};

use crate::languages::LanguageCode;
use crate::modes::AnalysisMode;

const PROMPT_OUTFIT: &str = "You are an expert fashion stylist with a friendly and approachable communication style. Your goal is to give advice that is easy to understand and encouraging. Analyze the provided image of a person and their clothing. Focus on the pairing of the top and bottom garments.\n\
Consider color coordination, style compatibility, pattern matching, and how the overall outfit complements the person's presentation, skin tone, and visible facial features.\n\
Provide your response in a JSON format with two keys: \"verdict\" and \"feedback\".\n\
- \"verdict\": A short, catchy title for the analysis (e.g., \"A Perfect Match!\", \"Bold and Stylish!\", \"Good, but could be great!\").\n\
- \"feedback\": A paragraph of constructive feedback and suggestions. Be positive and encouraging in your tone, explaining why the outfit works or offering specific ideas for improvement. **Use clear, simple, and everyday English, avoiding overly technical fashion jargon.**";

const PROMPT_PAIR: &str = "You are an expert personal stylist and digital artist. Your most important task is to create a virtual try-on image. You will receive three images: one of a person's face, and two of clothing items.\n\
You MUST generate a new, photorealistic image showing the exact person from the face photo wearing the two clothing items. It is critical that you preserve the person's exact facial identity. Do not generate a new person or alter their facial features in any way. This is your primary goal.\n\n\
After creating the image, you will also provide a fashion analysis of the outfit as a JSON object.\n\
Your analysis should evaluate how the clothing items work together and if they complement the person's features (skin tone, hair color, etc.).\n\n\
**JSON Analysis Requirements:**\n\
Provide your JSON response with five keys: \"compatibilityScore\", \"verdict\", \"feedback\", \"suggestion\", and \"colorSuggestions\". **All text must be in a friendly, conversational tone using simple, everyday English.**\n\
- \"compatibilityScore\": An integer between 1 (terrible match) and 10 (perfect match).\n\
- \"verdict\": A short, catchy title for the analysis.\n\
- \"feedback\": A detailed paragraph explaining your reasoning, focusing on the harmony between the clothes and the person.\n\
- \"suggestion\": A creative suggestion for a third item (like accessories, shoes, or a jacket) to complete the outfit.\n\
- \"colorSuggestions\": If the pairing is not a good match (score below 6), YOU MUST provide specific, actionable suggestions for alternative color palettes or clothing styles that would be more flattering (e.g., \"These cool tones might wash you out; try warmer earth tones like olive green or rust.\"). If the match is good, state that the colors are an excellent choice.\n\n\
**Image Generation Requirements (Recap):**\n\
- The main output is the generated image.\n\
- The person in the image MUST be the same person from the face photo. Do not change their face. This is the most important instruction.\n\
- The clothing items should be accurately represented and styled on the person.\n\
- The final image must be high-quality and realistic.";

const PROMPT_SAREE: &str = "You are an expert personal stylist and digital artist specializing in traditional Indian attire. Your most important task is to create a virtual try-on image. You will receive two images: one of a person's face and one of a saree.\n\
You MUST generate a new, photorealistic image showing the exact person from the face photo wearing the saree. It is critical that you preserve the person's exact facial identity. Do not generate a new person or alter their facial features in any way. This is your primary goal.\n\n\
After creating the image, you will also provide a fashion analysis of the look as a JSON object.\n\
Your analysis should evaluate how the saree's color, pattern, and fabric complement the person's features (skin tone, hair color, etc.).\n\n\
**JSON Analysis Requirements:**\n\
Provide your JSON response with five keys: \"compatibilityScore\", \"verdict\", \"feedback\", \"suggestion\", and \"colorSuggestions\". **All text must be in a friendly, conversational tone using simple, everyday English.**\n\
- \"compatibilityScore\": An integer between 1 (terrible match) and 10 (perfect match).\n\
- \"verdict\": A short, catchy title for the analysis.\n\
- \"feedback\": A detailed paragraph explaining your reasoning, focusing on the harmony between the saree and the person.\n\
- \"suggestion\": A detailed set of accessory recommendations. You MUST provide specific suggestions for each of the following: 1. **Jewelry**: Recommend specific types of earrings AND a necklace (e.g., \"Jhumka earrings with a matching choker necklace\"). 2. **Clutch Bag**: Suggest a style and color of a clutch bag (e.g., \"A gold sequined clutch\" or \"A traditional potli bag\"). 3. **Footwear**: Recommend an appropriate type of footwear (e.g., \"Elegant stiletto heels\" or \"Embellished juttis\").\n\
- \"colorSuggestions\": If the saree is not a good match (score below 6), YOU MUST provide specific, actionable suggestions for alternative color palettes or saree styles that would be more flattering (e.g., \"This bright color might overwhelm your features; try softer pastel shades or deep jewel tones.\"). If the match is good, state that the colors are an excellent choice.\n\n\
**Image Generation Requirements (Recap):**\n\
- The main output is the generated image.\n\
- The person in the image MUST be the same person from the face photo. Do not change their face. This is the most important instruction.\n\
- The saree should be accurately draped and styled on the person.\n\
- The final image must be high-quality and realistic.";

/// Output channels requested from the remote model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputModalities {
    TextOnly,
    ImageAndText,
}

impl OutputModalities {
    pub fn as_strs(self) -> &'static [&'static str] {
        match self {
            OutputModalities::TextOnly => &["TEXT"],
            OutputModalities::ImageAndText => &["IMAGE", "TEXT"],
        }
    }
}

/// The textual instruction plus the structured-output steering for one
/// analysis mode. Selection is a pure function of mode and language.
#[derive(Debug, Clone)]
pub struct PromptSpec {
    pub text: String,
    pub response_schema: Option<Value>,
    pub modalities: OutputModalities,
}

impl PromptSpec {
    pub fn select(mode: AnalysisMode, language: LanguageCode) -> Self {
        let language_name = language.display_name();
        match mode {
            AnalysisMode::SingleOutfit => Self {
                text: format!(
                    "{PROMPT_OUTFIT}\n\nIMPORTANT: Provide your entire analysis in {language_name}."
                ),
                response_schema: Some(outfit_schema()),
                modalities: OutputModalities::TextOnly,
            },
            AnalysisMode::Pair => Self {
                text: format!(
                    "{PROMPT_PAIR}\n\nIMPORTANT: Provide your entire JSON analysis in {language_name}."
                ),
                response_schema: None,
                modalities: OutputModalities::ImageAndText,
            },
            AnalysisMode::SareeTryOn => Self {
                text: format!(
                    "{PROMPT_SAREE}\n\nIMPORTANT: Provide your entire JSON analysis in {language_name}."
                ),
                response_schema: None,
                modalities: OutputModalities::ImageAndText,
            },
        }
    }
}

fn outfit_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "verdict": { "type": "STRING" },
            "feedback": { "type": "STRING" },
        },
        "required": ["verdict", "feedback"],
    })
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::{OutputModalities, PromptSpec};
    use crate::languages::LanguageCode;
    use crate::modes::AnalysisMode;

    #[test]
    fn outfit_mode_carries_schema_and_text_modality() {
        let spec = PromptSpec::select(AnalysisMode::SingleOutfit, LanguageCode::En);
        assert_eq!(spec.modalities, OutputModalities::TextOnly);
        let schema = spec.response_schema.expect("schema present");
        let required: Vec<&str> = schema
            .get("required")
            .and_then(Value::as_array)
            .expect("required list")
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(required, vec!["verdict", "feedback"]);
    }

    #[test]
    fn tryon_modes_request_image_and_text_without_schema() {
        for mode in [AnalysisMode::Pair, AnalysisMode::SareeTryOn] {
            let spec = PromptSpec::select(mode, LanguageCode::En);
            assert_eq!(spec.modalities, OutputModalities::ImageAndText);
            assert!(spec.response_schema.is_none());
            assert_eq!(spec.modalities.as_strs(), ["IMAGE", "TEXT"]);
        }
    }

    #[test]
    fn prompt_embeds_selected_language_directive() {
        let spec = PromptSpec::select(AnalysisMode::SareeTryOn, LanguageCode::Fr);
        assert!(spec
            .text
            .contains("Provide your entire JSON analysis in Français."));
    }

    #[test]
    fn selection_is_deterministic() {
        let a = PromptSpec::select(AnalysisMode::Pair, LanguageCode::Es);
        let b = PromptSpec::select(AnalysisMode::Pair, LanguageCode::Es);
        assert_eq!(a.text, b.text);
        assert_eq!(a.response_schema, b.response_schema);
    }

    #[test]
    fn saree_prompt_demands_accessory_recommendations() {
        let spec = PromptSpec::select(AnalysisMode::SareeTryOn, LanguageCode::En);
        for needle in ["Jewelry", "Clutch Bag", "Footwear"] {
            assert!(spec.text.contains(needle), "missing {needle}");
        }
    }
}
