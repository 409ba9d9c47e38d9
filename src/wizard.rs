use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::{debug, info};

use crate::api::ApiError;
use crate::generation::GenerationResult;

pub const PICK_BASE_COLOR: &str = "Pick a Base Color";
pub const DEFAULT_BASE_COLOR: &str = "#b3e5fc";
pub const BASE_COLOR_KEY: &str = "baseColor";

const LENGTH_OPTIONS: &[&str] = &["short", "medium", "long"];
const SHAPE_OPTIONS: &[&str] = &["square", "round", "almond", "squoval", "pointed", "ballerina"];
const STYLE_OPTIONS: &[&str] = &[
    "french",
    "floral",
    "line art",
    "geometric",
    "ombre",
    "abstract",
    "dot nails",
    "glitter",
];
const COLOR_OPTIONS: &[&str] = &[
    PICK_BASE_COLOR,
    "unified",
    "harmonious",
    "contrast",
    "balanced",
    "rich",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WizardStep {
    Length,
    Shape,
    Style,
    Color,
}

impl WizardStep {
    pub const ALL: [WizardStep; 4] = [Self::Length, Self::Shape, Self::Style, Self::Color];

    pub fn id(self) -> &'static str {
        match self {
            Self::Length => "length",
            Self::Shape => "shape",
            Self::Style => "style",
            Self::Color => "color",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Length => "Nail Length",
            Self::Shape => "Nail Shape",
            Self::Style => "Nail Style",
            Self::Color => "Color Palette",
        }
    }

    pub fn options(self) -> &'static [&'static str] {
        match self {
            Self::Length => LENGTH_OPTIONS,
            Self::Shape => SHAPE_OPTIONS,
            Self::Style => STYLE_OPTIONS,
            Self::Color => COLOR_OPTIONS,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Self::Length => 0,
            Self::Shape => 1,
            Self::Style => 2,
            Self::Color => 3,
        }
    }

    pub fn next(self) -> Option<Self> {
        Self::ALL.get(self.index() + 1).copied()
    }

    pub fn is_last(self) -> bool {
        self.next().is_none()
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|step| step.id() == id)
    }
}

impl Display for WizardStep {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionMap {
    choices: BTreeMap<WizardStep, String>,
    base_color: Option<String>,
}

impl SelectionMap {
    pub fn get(&self, step: WizardStep) -> Option<&str> {
        self.choices.get(&step).map(String::as_str)
    }

    pub fn base_color(&self) -> Option<&str> {
        self.base_color.as_deref()
    }

    pub fn contains(&self, step: WizardStep) -> bool {
        self.choices.contains_key(&step)
    }

    pub fn keys(&self) -> Vec<&'static str> {
        let mut keys: Vec<_> = self.choices.keys().map(|step| step.id()).collect();
        if self.base_color.is_some() {
            keys.push(BASE_COLOR_KEY);
        }
        keys
    }

    pub fn len(&self) -> usize {
        self.choices.len() + usize::from(self.base_color.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_complete(&self) -> bool {
        WizardStep::ALL.iter().all(|step| self.contains(*step))
    }

    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(length) = self.get(WizardStep::Length) {
            parts.push(format!("{length} length"));
        }
        if let Some(shape) = self.get(WizardStep::Shape) {
            parts.push(format!("{shape} shape"));
        }
        if let Some(style) = self.get(WizardStep::Style) {
            parts.push(format!("{style} style"));
        }
        if let Some(color) = self.get(WizardStep::Color) {
            parts.push(format!("{color} palette"));
        }
        if let Some(base_color) = self.base_color() {
            parts.push(format!("base color {base_color}"));
        }

        if parts.is_empty() {
            "nail art design".to_owned()
        } else {
            format!("nail art design: {}", parts.join(", "))
        }
    }

    fn insert(&mut self, step: WizardStep, value: &str) {
        self.choices.insert(step, value.to_owned());
    }

    fn set_base_color(&mut self, color: String) {
        self.base_color = Some(color);
    }
}

impl Serialize for SelectionMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (step, value) in &self.choices {
            map.serialize_entry(step.id(), value)?;
        }
        if let Some(base_color) = &self.base_color {
            map.serialize_entry(BASE_COLOR_KEY, base_color)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardPhase {
    Selecting,
    PickingColor { draft: String },
    Submitting,
    Finished,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectOutcome {
    Advanced { next: WizardStep },
    ColorPickerOpened { draft: String },
    ReadyToSubmit(SelectionMap),
    Ignored,
}

#[derive(Debug, thiserror::Error)]
pub enum WizardError {
    #[error("`{value}` is not an option for step `{step}`")]
    UnknownOption { step: WizardStep, value: String },

    #[error("`{0}` is not a #rrggbb hex color")]
    InvalidColor(String),

    #[error("the color picker is not open")]
    ColorPickerClosed,

    #[error("no generation request is in flight")]
    NotSubmitting,

    #[error("Generation Failed: {0}")]
    Generation(#[source] ApiError),
}

#[derive(Debug, Clone)]
pub struct Wizard {
    step: WizardStep,
    selections: SelectionMap,
    phase: WizardPhase,
    result: Option<GenerationResult>,
}

impl Wizard {
    pub fn new() -> Self {
        Self {
            step: WizardStep::Length,
            selections: SelectionMap::default(),
            phase: WizardPhase::Selecting,
            result: None,
        }
    }

    pub fn current_step(&self) -> WizardStep {
        self.step
    }

    pub fn progress(&self) -> (usize, usize) {
        (self.step.index() + 1, WizardStep::ALL.len())
    }

    pub fn selections(&self) -> &SelectionMap {
        &self.selections
    }

    pub fn phase(&self) -> &WizardPhase {
        &self.phase
    }

    pub fn is_submitting(&self) -> bool {
        self.phase == WizardPhase::Submitting
    }

    pub fn result(&self) -> Option<&GenerationResult> {
        self.result.as_ref()
    }

    pub fn select(&mut self, value: &str) -> Result<SelectOutcome, WizardError> {
        if self.phase != WizardPhase::Selecting {
            debug!(phase = ?self.phase, value, "ignoring selection outside selecting phase");
            return Ok(SelectOutcome::Ignored);
        }

        let step = self.step;
        if !step.options().contains(&value) {
            return Err(WizardError::UnknownOption {
                step,
                value: value.to_owned(),
            });
        }

        if step == WizardStep::Color && value == PICK_BASE_COLOR {
            let draft = self
                .selections
                .base_color()
                .unwrap_or(DEFAULT_BASE_COLOR)
                .to_owned();
            self.phase = WizardPhase::PickingColor {
                draft: draft.clone(),
            };
            return Ok(SelectOutcome::ColorPickerOpened { draft });
        }

        self.selections.insert(step, value);

        match step.next() {
            Some(next) => {
                self.step = next;
                Ok(SelectOutcome::Advanced { next })
            }
            None => {
                self.phase = WizardPhase::Submitting;
                info!(selections = ?self.selections.keys(), "wizard complete; submitting");
                Ok(SelectOutcome::ReadyToSubmit(self.selections.clone()))
            }
        }
    }

    pub fn color_draft(&self) -> Option<&str> {
        match &self.phase {
            WizardPhase::PickingColor { draft } => Some(draft),
            WizardPhase::Selecting | WizardPhase::Submitting | WizardPhase::Finished => None,
        }
    }

    pub fn set_color_draft(&mut self, color: &str) -> Result<(), WizardError> {
        let normalized = normalize_hex_color(color)?;
        match &mut self.phase {
            WizardPhase::PickingColor { draft } => {
                *draft = normalized;
                Ok(())
            }
            WizardPhase::Selecting | WizardPhase::Submitting | WizardPhase::Finished => {
                Err(WizardError::ColorPickerClosed)
            }
        }
    }

    pub fn confirm_color(&mut self) -> Result<&str, WizardError> {
        let WizardPhase::PickingColor { draft } = &self.phase else {
            return Err(WizardError::ColorPickerClosed);
        };
        let color = draft.clone();
        self.phase = WizardPhase::Selecting;
        self.selections.set_base_color(color);
        Ok(self.selections.base_color().unwrap_or(DEFAULT_BASE_COLOR))
    }

    pub fn cancel_color_picker(&mut self) {
        if matches!(self.phase, WizardPhase::PickingColor { .. }) {
            self.phase = WizardPhase::Selecting;
        }
    }

    pub fn finish_submission(
        &mut self,
        outcome: Result<GenerationResult, ApiError>,
    ) -> Result<&GenerationResult, WizardError> {
        if self.phase != WizardPhase::Submitting {
            return Err(WizardError::NotSubmitting);
        }

        match outcome {
            Ok(result) => {
                self.phase = WizardPhase::Finished;
                Ok(&*self.result.insert(result))
            }
            Err(error) => {
                self.phase = WizardPhase::Selecting;
                Err(WizardError::Generation(error))
            }
        }
    }
}

impl Default for Wizard {
    fn default() -> Self {
        Self::new()
    }
}

pub fn parse_hex_color(value: &str) -> Option<[u8; 3]> {
    let hex = value.trim().strip_prefix('#')?;
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    let channel = |offset: usize| u8::from_str_radix(&hex[offset..offset + 2], 16).ok();
    Some([channel(0)?, channel(2)?, channel(4)?])
}

pub fn format_hex_color(rgb: [u8; 3]) -> String {
    format!("#{:02x}{:02x}{:02x}", rgb[0], rgb[1], rgb[2])
}

fn normalize_hex_color(value: &str) -> Result<String, WizardError> {
    parse_hex_color(value)
        .map(format_hex_color)
        .ok_or_else(|| WizardError::InvalidColor(value.to_owned()))
}
