use serde_json::{json, Value};
use stylematch_contracts::analysis::AnalysisOutcome;
use stylematch_contracts::events::{EventLog, EventPayload};
use stylematch_contracts::languages::LanguageCode;
use stylematch_contracts::modes::{AnalysisMode, SlotBuffer, SlotSet};
use stylematch_contracts::prompts::PromptSpec;

use crate::encoder::{encode, EncodedImage};
use crate::error::AnalysisError;
use crate::fragments::{parse_fragments, parse_strict, ResponseFragment};
use crate::remote::{GenerationRequest, GenerationTransport};

const TEXT_MODEL: &str = "gemini-2.5-flash";
const IMAGE_MODEL: &str = "gemini-2.5-flash-image-preview";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Encoding,
    Requesting,
    Parsing,
    Succeeded,
    Failed,
}

/// Sequences encode -> request -> parse for one analysis invocation.
///
/// The orchestrator holds no image state of its own; the caller owns the
/// slot buffer and hands over a completed snapshot per invocation. Taking
/// `&mut self` keeps at most one request in flight.
pub struct Orchestrator<T: GenerationTransport> {
    transport: T,
    events: Option<EventLog>,
    phase: Phase,
}

impl<T: GenerationTransport> Orchestrator<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            events: None,
            phase: Phase::Idle,
        }
    }

    pub fn with_events(mut self, events: EventLog) -> Self {
        self.events = Some(events);
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Explicit return to `Idle`, discarding the terminal phase.
    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
    }

    pub fn analyze(
        &mut self,
        mode: AnalysisMode,
        slots: &SlotBuffer,
        language: LanguageCode,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        // A new invocation clears any previous terminal phase and
        // invalidates the previous result on the caller's side.
        self.phase = Phase::Idle;
        self.emit("analysis_started", json!({ "mode": mode.label() }));

        match self.run(mode, slots, language) {
            Ok(outcome) => {
                self.phase = Phase::Succeeded;
                self.emit(
                    "analysis_parsed",
                    json!({
                        "mode": mode.label(),
                        "has_image": outcome.generated_image.is_some(),
                    }),
                );
                Ok(outcome)
            }
            Err(err) => {
                self.phase = Phase::Failed;
                self.emit(
                    "analysis_failed",
                    json!({ "mode": mode.label(), "error": err.to_string() }),
                );
                Err(err)
            }
        }
    }

    fn run(
        &mut self,
        mode: AnalysisMode,
        slots: &SlotBuffer,
        language: LanguageCode,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        // Precondition gate: an incomplete form must never reach the paid
        // remote call.
        let missing = slots.missing_slots(mode);
        if !missing.is_empty() {
            return Err(AnalysisError::IncompleteInput { missing });
        }
        let slot_set = slots
            .as_slot_set(mode)
            .ok_or(AnalysisError::IncompleteInput {
                missing: mode.required_slots().to_vec(),
            })?;

        self.phase = Phase::Encoding;
        let images = encode_slots(&slot_set)?;
        self.emit(
            "slots_encoded",
            json!({ "mode": mode.label(), "count": images.len() }),
        );

        self.phase = Phase::Requesting;
        let request = GenerationRequest {
            model: model_for_mode(mode).to_string(),
            prompt: PromptSpec::select(mode, language),
            images,
        };
        self.emit(
            "request_sent",
            json!({ "mode": mode.label(), "model": request.model }),
        );
        let fragments = self
            .transport
            .generate(&request)
            .map_err(AnalysisError::Request)?;

        self.phase = Phase::Parsing;
        if mode.wants_generated_image() {
            let parsed = parse_fragments(&fragments)?;
            Ok(AnalysisOutcome {
                analysis: parsed.analysis,
                generated_image: parsed.image,
            })
        } else {
            // Only one fragment kind is possible here, so there is nothing
            // to recover tolerantly; malformed JSON is a request failure.
            let text = fragments
                .iter()
                .find_map(|fragment| match fragment {
                    ResponseFragment::Text(text) => Some(text.as_str()),
                    _ => None,
                })
                .ok_or(AnalysisError::MissingAnalysis)?;
            let analysis = parse_strict(text).map_err(AnalysisError::Request)?;
            Ok(AnalysisOutcome {
                analysis,
                generated_image: None,
            })
        }
    }

    fn emit(&self, event: &str, payload: Value) {
        if let Some(events) = &self.events {
            let payload: EventPayload = payload.as_object().cloned().unwrap_or_default();
            // Logging must never take the analysis down with it.
            let _ = events.emit(event, payload);
        }
    }
}

fn model_for_mode(mode: AnalysisMode) -> &'static str {
    if mode.wants_generated_image() {
        IMAGE_MODEL
    } else {
        TEXT_MODEL
    }
}

fn encode_slots(slot_set: &SlotSet) -> Result<Vec<EncodedImage>, AnalysisError> {
    slot_set.ordered_assets().into_iter().map(encode).collect()
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use anyhow::bail;
    use serde_json::Value;
    use stylematch_contracts::events::EventLog;
    use stylematch_contracts::languages::LanguageCode;
    use stylematch_contracts::modes::{AnalysisMode, ImageAsset, SlotBuffer};

    use super::{Orchestrator, Phase};
    use crate::error::AnalysisError;
    use crate::fragments::ResponseFragment;
    use crate::remote::{GenerationRequest, GenerationTransport};

    struct StubTransport {
        fragments: Vec<ResponseFragment>,
        fail: bool,
        calls: Cell<usize>,
        last_request: RefCell<Option<GenerationRequest>>,
    }

    impl StubTransport {
        fn returning(fragments: Vec<ResponseFragment>) -> Self {
            Self {
                fragments,
                fail: false,
                calls: Cell::new(0),
                last_request: RefCell::new(None),
            }
        }

        fn failing() -> Self {
            Self {
                fragments: Vec::new(),
                fail: true,
                calls: Cell::new(0),
                last_request: RefCell::new(None),
            }
        }
    }

    impl GenerationTransport for StubTransport {
        fn generate(&self, request: &GenerationRequest) -> anyhow::Result<Vec<ResponseFragment>> {
            self.calls.set(self.calls.get() + 1);
            *self.last_request.borrow_mut() = Some(request.clone());
            if self.fail {
                bail!("connection reset by peer");
            }
            Ok(self.fragments.clone())
        }
    }

    fn png_asset(tag: u8) -> ImageAsset {
        let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
        bytes.push(tag);
        ImageAsset::new(bytes, "image/png")
    }

    fn outfit_buffer() -> SlotBuffer {
        let mut buffer = SlotBuffer::new();
        buffer.set("outfit", png_asset(1)).expect("known slot");
        buffer
    }

    fn pair_buffer() -> SlotBuffer {
        let mut buffer = SlotBuffer::new();
        buffer.set("face", png_asset(1)).expect("known slot");
        buffer.set("first-item", png_asset(2)).expect("known slot");
        buffer.set("second-item", png_asset(3)).expect("known slot");
        buffer
    }

    #[test]
    fn single_outfit_succeeds_with_exact_analysis_and_no_image() -> anyhow::Result<()> {
        let transport = StubTransport::returning(vec![ResponseFragment::Text(
            r#"{"verdict":"Great Match!","feedback":"Colors line up."}"#.to_string(),
        )]);
        let mut orchestrator = Orchestrator::new(transport);

        let outcome = orchestrator
            .analyze(AnalysisMode::SingleOutfit, &outfit_buffer(), LanguageCode::En)
            .expect("analysis succeeds");
        assert_eq!(outcome.analysis.verdict, "Great Match!");
        assert!(outcome.generated_image.is_none());
        assert_eq!(orchestrator.phase(), Phase::Succeeded);
        Ok(())
    }

    #[test]
    fn pair_mode_returns_parsed_analysis_and_image_bytes() {
        let transport = StubTransport::returning(vec![
            ResponseFragment::InlineImage {
                bytes: vec![9; 16],
                mime_type: Some("image/png".to_string()),
            },
            ResponseFragment::Text(
                "Sure! Here is the breakdown:\n{\"compatibilityScore\":8,\"verdict\":\"Nice\",\"feedback\":\"ok\"}\nHope that helps."
                    .to_string(),
            ),
        ]);
        let mut orchestrator = Orchestrator::new(transport);

        let outcome = orchestrator
            .analyze(AnalysisMode::Pair, &pair_buffer(), LanguageCode::En)
            .expect("analysis succeeds");
        assert_eq!(outcome.analysis.compatibility_score, Some(8));
        assert_eq!(outcome.generated_image.expect("image").bytes, vec![9; 16]);
    }

    #[test]
    fn incomplete_slots_fail_before_any_remote_call() {
        let transport = StubTransport::returning(Vec::new());
        let mut orchestrator = Orchestrator::new(transport);

        let mut buffer = SlotBuffer::new();
        buffer.set("face", png_asset(1)).expect("known slot");
        let err = orchestrator
            .analyze(AnalysisMode::Pair, &buffer, LanguageCode::En)
            .expect_err("must fail");
        match err {
            AnalysisError::IncompleteInput { missing } => {
                assert_eq!(missing, vec!["first-item", "second-item"]);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(orchestrator.transport.calls.get(), 0);
        assert_eq!(orchestrator.phase(), Phase::Failed);
    }

    #[test]
    fn transport_failure_surfaces_as_request_error_and_allows_retry() {
        let mut orchestrator = Orchestrator::new(StubTransport::failing());
        let err = orchestrator
            .analyze(AnalysisMode::SingleOutfit, &outfit_buffer(), LanguageCode::En)
            .expect_err("must fail");
        assert!(matches!(err, AnalysisError::Request(_)));
        assert_eq!(orchestrator.phase(), Phase::Failed);
        // Exactly one attempt per invocation: no automatic retry.
        assert_eq!(orchestrator.transport.calls.get(), 1);

        // The next user-initiated invocation starts cleanly from Idle.
        let err = orchestrator
            .analyze(AnalysisMode::SingleOutfit, &outfit_buffer(), LanguageCode::En)
            .expect_err("still failing");
        assert!(matches!(err, AnalysisError::Request(_)));
        assert_eq!(orchestrator.transport.calls.get(), 2);
    }

    #[test]
    fn image_only_response_is_a_missing_analysis_failure() {
        let transport = StubTransport::returning(vec![ResponseFragment::InlineImage {
            bytes: vec![1; 4],
            mime_type: None,
        }]);
        let mut orchestrator = Orchestrator::new(transport);
        let err = orchestrator
            .analyze(AnalysisMode::Pair, &pair_buffer(), LanguageCode::En)
            .expect_err("must fail");
        assert!(matches!(err, AnalysisError::MissingAnalysis));
    }

    #[test]
    fn strict_mode_treats_malformed_json_as_request_failure() {
        let transport = StubTransport::returning(vec![ResponseFragment::Text(
            "not json".to_string(),
        )]);
        let mut orchestrator = Orchestrator::new(transport);
        let err = orchestrator
            .analyze(AnalysisMode::SingleOutfit, &outfit_buffer(), LanguageCode::En)
            .expect_err("must fail");
        assert!(matches!(err, AnalysisError::Request(_)));
    }

    #[test]
    fn malformed_tryon_text_degrades_into_fallback_success() {
        let transport = StubTransport::returning(vec![ResponseFragment::Text(
            "no structured output today".to_string(),
        )]);
        let mut orchestrator = Orchestrator::new(transport);
        let outcome = orchestrator
            .analyze(AnalysisMode::Pair, &pair_buffer(), LanguageCode::En)
            .expect("fallback is a success");
        assert_eq!(outcome.analysis.verdict, "Analysis Error");
        assert_eq!(orchestrator.phase(), Phase::Succeeded);
    }

    #[test]
    fn models_and_prompts_follow_the_mode() {
        let transport = StubTransport::returning(vec![ResponseFragment::Text(
            r#"{"verdict":"v","feedback":"f"}"#.to_string(),
        )]);
        let mut orchestrator = Orchestrator::new(transport);
        orchestrator
            .analyze(AnalysisMode::SingleOutfit, &outfit_buffer(), LanguageCode::Fr)
            .expect("succeeds");
        let request = orchestrator
            .transport
            .last_request
            .borrow()
            .clone()
            .expect("request captured");
        assert_eq!(request.model, "gemini-2.5-flash");
        assert_eq!(request.images.len(), 1);
        assert!(request.prompt.text.contains("Français"));
    }

    #[test]
    fn events_record_the_invocation_lifecycle_in_order() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let events_path = temp.path().join("session.jsonl");
        let transport = StubTransport::returning(vec![ResponseFragment::Text(
            r#"{"verdict":"v","feedback":"f"}"#.to_string(),
        )]);
        let mut orchestrator =
            Orchestrator::new(transport).with_events(EventLog::new(&events_path, "s1"));
        orchestrator
            .analyze(AnalysisMode::SingleOutfit, &outfit_buffer(), LanguageCode::En)
            .expect("succeeds");

        let raw = std::fs::read_to_string(&events_path)?;
        let kinds: Vec<String> = raw
            .lines()
            .filter_map(|line| serde_json::from_str::<Value>(line).ok())
            .filter_map(|row| row.get("event").and_then(Value::as_str).map(str::to_string))
            .collect();
        assert_eq!(
            kinds,
            vec![
                "analysis_started",
                "slots_encoded",
                "request_sent",
                "analysis_parsed"
            ]
        );
        Ok(())
    }
}
