use serde::{Deserialize, Serialize};

use crate::tags::TagSelection;

/// Longest prompt any adapter accepts, in characters
pub const MAX_PROMPT_LENGTH: usize = 1000;

/// Output aspect ratio
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "1:1")]
    #[strum(serialize = "1:1")]
    Square,
    #[serde(rename = "16:9")]
    #[strum(serialize = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    #[strum(serialize = "9:16")]
    Portrait,
    #[serde(rename = "4:3")]
    #[strum(serialize = "4:3")]
    Classic,
    #[serde(rename = "3:4")]
    #[strum(serialize = "3:4")]
    ClassicPortrait,
}

impl AspectRatio {
    /// Nominal pixel dimensions (width, height) at roughly one megapixel
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            Self::Square => (1024, 1024),
            Self::Landscape => (1344, 768),
            Self::Portrait => (768, 1344),
            Self::Classic => (1152, 896),
            Self::ClassicPortrait => (896, 1152),
        }
    }
}

/// Encoded image format requested from the provider
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Webp,
    Jpg,
    Png,
}

/// A single generation request
///
/// Bounded fields are checked against the selected adapter's
/// capabilities, never against global limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Natural-language prompt, without tag additions
    pub prompt: String,
    /// Configured model identifier
    pub model: String,
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
    pub num_outputs: u32,
    pub num_inference_steps: u32,
    #[serde(default)]
    pub output_format: OutputFormat,
    /// Structured tag selection appended to the provider prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<TagSelection>,
}

impl GenerationConfig {
    /// Create a config with one square webp output and `steps` inference steps
    pub fn new(prompt: impl Into<String>, model: impl Into<String>, steps: u32) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            aspect_ratio: AspectRatio::default(),
            num_outputs: 1,
            num_inference_steps: steps,
            output_format: OutputFormat::default(),
            tags: None,
        }
    }

    #[must_use]
    pub fn with_outputs(mut self, num_outputs: u32) -> Self {
        self.num_outputs = num_outputs;
        self
    }

    #[must_use]
    pub fn with_steps(mut self, num_inference_steps: u32) -> Self {
        self.num_inference_steps = num_inference_steps;
        self
    }

    #[must_use]
    pub fn with_aspect_ratio(mut self, aspect_ratio: AspectRatio) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }

    #[must_use]
    pub fn with_output_format(mut self, output_format: OutputFormat) -> Self {
        self.output_format = output_format;
        self
    }

    #[must_use]
    pub fn with_tags(mut self, tags: TagSelection) -> Self {
        self.tags = Some(tags);
        self
    }

    /// The literal prompt sent to the provider, base prompt plus tags
    pub fn provider_prompt(&self) -> String {
        crate::tags::build_prompt(&self.prompt, self.tags.as_ref())
    }
}
