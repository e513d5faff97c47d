use serde::{Deserialize, Serialize};

/// One selected or captured photograph. Replaced wholesale when the user
/// picks a new image for a slot; never mutated in place.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageAsset {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ImageAsset {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnalysisMode {
    SingleOutfit,
    Pair,
    SareeTryOn,
}

impl AnalysisMode {
    pub fn required_slots(self) -> &'static [&'static str] {
        match self {
            AnalysisMode::SingleOutfit => &["outfit"],
            AnalysisMode::Pair => &["face", "first-item", "second-item"],
            AnalysisMode::SareeTryOn => &["face", "saree"],
        }
    }

    /// Whether this mode asks the model to synthesize a try-on image in
    /// addition to the textual analysis.
    pub fn wants_generated_image(self) -> bool {
        !matches!(self, AnalysisMode::SingleOutfit)
    }

    pub fn label(self) -> &'static str {
        match self {
            AnalysisMode::SingleOutfit => "single-outfit",
            AnalysisMode::Pair => "pair",
            AnalysisMode::SareeTryOn => "saree-try-on",
        }
    }
}

/// A complete, validated set of inputs for one analysis. Each variant
/// carries exactly the slots its mode needs, so an incomplete or
/// over-filled combination cannot be constructed.
#[derive(Debug, Clone)]
pub enum SlotSet {
    SingleOutfit {
        outfit: ImageAsset,
    },
    Pair {
        face: ImageAsset,
        first_item: ImageAsset,
        second_item: ImageAsset,
    },
    SareeTryOn {
        face: ImageAsset,
        saree: ImageAsset,
    },
}

impl SlotSet {
    pub fn mode(&self) -> AnalysisMode {
        match self {
            SlotSet::SingleOutfit { .. } => AnalysisMode::SingleOutfit,
            SlotSet::Pair { .. } => AnalysisMode::Pair,
            SlotSet::SareeTryOn { .. } => AnalysisMode::SareeTryOn,
        }
    }

    /// Assets in the slot order the remote payload expects: face first,
    /// then garments, matching the prompt's description of its inputs.
    pub fn ordered_assets(&self) -> Vec<&ImageAsset> {
        match self {
            SlotSet::SingleOutfit { outfit } => vec![outfit],
            SlotSet::Pair {
                face,
                first_item,
                second_item,
            } => vec![face, first_item, second_item],
            SlotSet::SareeTryOn { face, saree } => vec![face, saree],
        }
    }
}

/// In-progress slot state for the currently selected mode. Owned by the
/// controller layer; the orchestrator only ever sees the completed
/// `SlotSet`.
#[derive(Debug, Clone, Default)]
pub struct SlotBuffer {
    outfit: Option<ImageAsset>,
    face: Option<ImageAsset>,
    first_item: Option<ImageAsset>,
    second_item: Option<ImageAsset>,
}

impl SlotBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, slot: &str, asset: ImageAsset) -> anyhow::Result<()> {
        match slot {
            "outfit" => self.outfit = Some(asset),
            "face" => self.face = Some(asset),
            // In saree mode the first item slot holds the saree.
            "first-item" | "saree" => self.first_item = Some(asset),
            "second-item" => self.second_item = Some(asset),
            other => anyhow::bail!("unknown image slot '{other}'"),
        }
        Ok(())
    }

    /// Clears every slot unconditionally. Used on reset and on mode switch.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn missing_slots(&self, mode: AnalysisMode) -> Vec<&'static str> {
        mode.required_slots()
            .iter()
            .filter(|slot| self.slot_ref(slot).is_none())
            .copied()
            .collect()
    }

    pub fn is_complete(&self, mode: AnalysisMode) -> bool {
        self.missing_slots(mode).is_empty()
    }

    /// Snapshot the buffer into the mode's validated slot set. Returns
    /// `None` while any required slot is still empty.
    pub fn as_slot_set(&self, mode: AnalysisMode) -> Option<SlotSet> {
        match mode {
            AnalysisMode::SingleOutfit => Some(SlotSet::SingleOutfit {
                outfit: self.outfit.clone()?,
            }),
            AnalysisMode::Pair => Some(SlotSet::Pair {
                face: self.face.clone()?,
                first_item: self.first_item.clone()?,
                second_item: self.second_item.clone()?,
            }),
            AnalysisMode::SareeTryOn => Some(SlotSet::SareeTryOn {
                face: self.face.clone()?,
                saree: self.first_item.clone()?,
            }),
        }
    }

    fn slot_ref(&self, slot: &str) -> Option<&ImageAsset> {
        match slot {
            "outfit" => self.outfit.as_ref(),
            "face" => self.face.as_ref(),
            "first-item" | "saree" => self.first_item.as_ref(),
            "second-item" => self.second_item.as_ref(),
            _ => None,
        }
    }
}
